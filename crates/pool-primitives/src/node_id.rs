use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a peer endpoint, derived from its long-term public
/// key. Stored in canonical (lowercase) form so that two differently-cased
/// spellings of the same id compare and hash equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Canonicalize and wrap a raw id.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_lowercase())
    }

    /// Borrow the canonical string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for NodeId {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
