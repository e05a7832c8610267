use pool_primitives::NodeId;
use thiserror::Error;

/// Errors surfaced by any [`crate::Store`] backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A nonce was presented that is not strictly greater than the last one
    /// accepted for this node id.
    #[error("stale nonce for {node}: presented {presented}, last accepted {max_seen}")]
    StaleNonce {
        node: NodeId,
        presented: u64,
        max_seen: u64,
    },

    /// The caller referenced a node id with no corresponding record.
    #[error("node not found: {0}")]
    NotFound(NodeId),

    /// The backing storage engine returned an I/O or encoding error.
    #[error("storage error: {0}")]
    StorageFailure(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::StorageFailure(err.to_string())
    }
}
