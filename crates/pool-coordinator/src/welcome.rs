use pool_primitives::NodeId;
use thiserror::Error;

/// The default template used when the operator hasn't configured one.
pub const DEFAULT_WELCOME_TEMPLATE: &str = "Welcome to the pool, {{NodeID}}!";

const PLACEHOLDER: &str = "{{NodeID}}";

#[derive(Debug, Error)]
pub enum WelcomeTemplateError {
    #[error("unbalanced {{{{ in welcome template")]
    UnbalancedBraces,
}

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    NodeId,
}

/// A text template with exactly one substitution variable, `{{NodeID}}`.
/// Parsed once at construction and shared immutably (§5: "the welcome-message
/// template is immutable after parse; safe to share").
#[derive(Debug, Clone)]
pub struct WelcomeTemplate {
    segments: Vec<Segment>,
}

impl WelcomeTemplate {
    pub fn parse(template: &str) -> Result<Self, WelcomeTemplateError> {
        if template.matches("{{").count() != template.matches("}}").count() {
            return Err(WelcomeTemplateError::UnbalancedBraces);
        }
        let mut segments = Vec::new();
        let mut rest = template;
        while let Some(pos) = rest.find(PLACEHOLDER) {
            if pos > 0 {
                segments.push(Segment::Literal(rest[..pos].to_string()));
            }
            segments.push(Segment::NodeId);
            rest = &rest[pos + PLACEHOLDER.len()..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }
        Ok(Self { segments })
    }

    /// Render with `node_id` bound to `{{NodeID}}`. Kept fallible (rather
    /// than infallible string concatenation) to preserve the documented
    /// behavior at the call site: a render failure is logged and the
    /// caller falls back to an empty message, never a hard error.
    pub fn try_render(&self, node_id: &NodeId) -> Result<String, WelcomeTemplateError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::NodeId => out.push_str(node_id.as_str()),
            }
        }
        Ok(out)
    }
}

impl Default for WelcomeTemplate {
    fn default() -> Self {
        #[allow(clippy::unwrap_used)]
        Self::parse(DEFAULT_WELCOME_TEMPLATE).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_node_id() {
        let tpl = WelcomeTemplate::parse("hi {{NodeID}}, welcome").unwrap();
        assert_eq!(tpl.try_render(&NodeId::new("abc")).unwrap(), "hi abc, welcome");
    }

    #[test]
    fn rejects_unbalanced_braces() {
        assert!(WelcomeTemplate::parse("hi {{NodeID}").is_err());
    }

    #[test]
    fn default_template_renders() {
        let tpl = WelcomeTemplate::default();
        assert!(tpl.try_render(&NodeId::new("x")).unwrap().contains('x'));
    }
}
