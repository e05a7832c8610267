//! Core value types shared by every pool crate: node identifiers, accounts,
//! fixed-precision credit amounts, and a clock abstraction used to keep
//! keepalive-interval accounting deterministic in tests.

mod amount;
mod clock;
mod node_id;

pub use amount::Amount;
pub use clock::{Clock, FixedClock, SystemClock};
pub use node_id::NodeId;

use serde::{Deserialize, Serialize};

/// Unix timestamp, in seconds.
pub type Timestamp = u64;

/// Opaque payout wallet identifier. Empty/anonymous accounts pool credit
/// per-node rather than per-wallet (see [`BalanceKey`]).
pub type Account = String;

/// The key a [`Balance`](crate::BalanceKey) is stored under.
///
/// An empty or absent account means "anonymous": balance is tracked per
/// node rather than pooled across every node that shares the account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BalanceKey {
    /// Balance pooled across every node bound to this account.
    Account(Account),
    /// Balance tracked for a single anonymous node.
    Node(NodeId),
}

impl BalanceKey {
    /// Resolve the balance key a node should bill against, given the
    /// (possibly empty) account it registered with.
    pub fn for_node(account: Option<&str>, node: &NodeId) -> Self {
        match account {
            Some(account) if !account.trim().is_empty() => {
                BalanceKey::Account(account.trim().to_string())
            }
            _ => BalanceKey::Node(node.clone()),
        }
    }
}

impl std::fmt::Display for BalanceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BalanceKey::Account(a) => write!(f, "account:{a}"),
            BalanceKey::Node(n) => write!(f, "node:{n}"),
        }
    }
}

/// Returns true if `candidate` should be included in a query for `query`.
///
/// An empty query matches every kind, matching the Store `ActiveHosts`
/// contract ("kind="" matches all").
pub fn kind_matches(query: &str, candidate: &str) -> bool {
    query.is_empty() || query == candidate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matching() {
        assert!(kind_matches("", "geth"));
        assert!(kind_matches("geth", "geth"));
        assert!(!kind_matches("geth", "parity"));
    }

    #[test]
    fn balance_key_anonymous_vs_named() {
        let node = NodeId::new("0xDEADBEEF");
        assert_eq!(
            BalanceKey::for_node(None, &node),
            BalanceKey::Node(node.clone())
        );
        assert_eq!(
            BalanceKey::for_node(Some(""), &node),
            BalanceKey::Node(node.clone())
        );
        assert_eq!(
            BalanceKey::for_node(Some("0xAAA"), &node),
            BalanceKey::Account("0xAAA".to_string())
        );
    }
}
