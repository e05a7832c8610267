use pool_balance::BalanceError;
use pool_primitives::{Amount, NodeId};
use pool_settlement::SettlementError;
use pool_store::StoreError;
use thiserror::Error;

/// Stable discriminant for mapping an error onto an RPC error code,
/// kept separate from the `Display` explanation (spec §7: "all errors
/// originating in the core carry an explanatory payload separate from
/// their kind so operators see actionable remediation without the kind
/// leaking implementation detail").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolErrorKind {
    StaleNonce,
    NotFound,
    InsufficientBalance,
    InvalidRequest,
    TransientRPC,
    NetworkMismatch,
    AddressMismatch,
    NotSupported,
    StorageFailure,
}

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("node not found: {0}")]
    NotFound(NodeId),

    #[error("withdraw amount {amount} is below the minimum of {min}")]
    BelowWithdrawMinimum { amount: Amount, min: Amount },

    #[error(transparent)]
    Settlement(#[from] SettlementError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CoordinatorError {
    pub fn kind(&self) -> PoolErrorKind {
        match self {
            CoordinatorError::NotFound(_) => PoolErrorKind::NotFound,
            CoordinatorError::BelowWithdrawMinimum { .. } => PoolErrorKind::InvalidRequest,
            CoordinatorError::Settlement(SettlementError::NotSupported) => PoolErrorKind::NotSupported,
            CoordinatorError::Settlement(SettlementError::NetworkMismatch { .. }) => {
                PoolErrorKind::NetworkMismatch
            }
            CoordinatorError::Settlement(SettlementError::AddressMismatch { .. }) => {
                PoolErrorKind::AddressMismatch
            }
            CoordinatorError::Settlement(SettlementError::TransientRPC(_)) => PoolErrorKind::TransientRPC,
            CoordinatorError::Store(StoreError::StaleNonce { .. }) => PoolErrorKind::StaleNonce,
            CoordinatorError::Store(StoreError::NotFound(_)) => PoolErrorKind::NotFound,
            CoordinatorError::Store(StoreError::StorageFailure(_)) => PoolErrorKind::StorageFailure,
        }
    }
}

impl From<BalanceError> for CoordinatorError {
    fn from(err: BalanceError) -> Self {
        match err {
            BalanceError::Store(e) => CoordinatorError::Store(e),
            // Callers that need the InsufficientBalance payload handle it
            // before conversion; reaching here means it escaped unhandled.
            BalanceError::InsufficientBalance { .. } => {
                CoordinatorError::Store(StoreError::StorageFailure(err.to_string()))
            }
        }
    }
}
