//! Bridges Store balances to an external settlement authority. Two forms,
//! selectable at construction: [`NoSettlement`] and [`ContractSettlement`],
//! grounded on the bandwidth accounting crate's `SwarmSettlementProvider`
//! shape (a trait object the rest of the system treats uniformly,
//! regardless of whether settlement is wired up at all).

mod authority;

pub use authority::SettlementAuthority;

use alloy_chains::Chain;
use alloy_primitives::Address;
use alloy_signer_local::LocalSigner;
use async_trait::async_trait;
use pool_primitives::Amount;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Receipt of a submitted settlement.
#[derive(Debug, Clone)]
pub struct SettleReceipt {
    pub tx_hash: Option<String>,
    pub settled_amount: Amount,
}

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("settlement is not supported by this pool")]
    NotSupported,
    #[error("authority network {actual} does not match configured network {expected}")]
    NetworkMismatch { expected: Chain, actual: Chain },
    #[error("operator credential {actual} does not match the contract's declared operator {expected}")]
    AddressMismatch { expected: Address, actual: Address },
    #[error("transient settlement RPC failure: {0}")]
    TransientRPC(String),
}

/// Bridges local Store balances to an external settlement authority.
#[async_trait]
pub trait SettlementAdapter: Send + Sync {
    /// Submit a settlement of `amount` for `account`. `nonce` disambiguates
    /// concurrent withdraw requests against the same account.
    async fn settle(
        &self,
        account: &str,
        amount: Amount,
        nonce: u64,
    ) -> Result<SettleReceipt, SettlementError>;

    /// Total funds the authority reports as deposited and backing the pool.
    async fn pending_balance(&self) -> Result<Amount, SettlementError>;

    fn name(&self) -> &'static str;
}

/// No-op settlement: the pool tracks balances locally and never settles
/// them externally. `Withdraw` always fails with `NotSupported`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSettlement;

#[async_trait]
impl SettlementAdapter for NoSettlement {
    async fn settle(
        &self,
        _account: &str,
        _amount: Amount,
        _nonce: u64,
    ) -> Result<SettleReceipt, SettlementError> {
        Err(SettlementError::NotSupported)
    }

    async fn pending_balance(&self) -> Result<Amount, SettlementError> {
        Ok(Amount::ZERO)
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// Contract-backed settlement. Holds the operator credential and the
/// network/contract identity it was configured for; refuses to construct
/// if the authority's reported chain doesn't match.
pub struct ContractSettlement {
    network: Chain,
    contract_address: Address,
    signer: LocalSigner<alloy_signer::k256::ecdsa::SigningKey>,
    authority: Arc<dyn SettlementAuthority>,
}

impl ContractSettlement {
    pub fn new(
        network: Chain,
        contract_address: Address,
        signer: LocalSigner<alloy_signer::k256::ecdsa::SigningKey>,
        authority: Arc<dyn SettlementAuthority>,
    ) -> Result<Self, SettlementError> {
        let actual = authority.reported_chain();
        if actual != network {
            return Err(SettlementError::NetworkMismatch {
                expected: network,
                actual,
            });
        }
        let expected = authority.declared_operator();
        let actual_address = alloy_signer::Signer::address(&signer);
        if actual_address != expected {
            return Err(SettlementError::AddressMismatch {
                expected,
                actual: actual_address,
            });
        }
        Ok(Self {
            network,
            contract_address,
            signer,
            authority,
        })
    }

    pub fn network(&self) -> Chain {
        self.network
    }

    pub fn contract_address(&self) -> Address {
        self.contract_address
    }
}

#[async_trait]
impl SettlementAdapter for ContractSettlement {
    async fn settle(
        &self,
        account: &str,
        amount: Amount,
        nonce: u64,
    ) -> Result<SettleReceipt, SettlementError> {
        let tx_hash = self
            .authority
            .submit_settle(&self.signer, self.contract_address, account, amount, nonce)
            .await?;
        Ok(SettleReceipt {
            tx_hash: Some(tx_hash),
            settled_amount: amount,
        })
    }

    async fn pending_balance(&self) -> Result<Amount, SettlementError> {
        match self.authority.deposited(self.contract_address).await {
            Ok(amount) => Ok(amount),
            Err(SettlementError::TransientRPC(reason)) => {
                warn!(%reason, "retrying pending-balance query once after transient RPC failure");
                self.authority.deposited(self.contract_address).await
            }
            Err(other) => Err(other),
        }
    }

    fn name(&self) -> &'static str {
        "contract"
    }
}
