use crate::SettlementError;
use alloy_chains::Chain;
use alloy_primitives::Address;
use alloy_signer::k256::ecdsa::SigningKey;
use alloy_signer_local::LocalSigner;
use async_trait::async_trait;
use pool_primitives::Amount;

/// The on-chain settlement contract, abstracted to the handful of calls
/// [`crate::ContractSettlement`] needs. The transaction-submission and
/// chain-RPC machinery behind an implementation of this trait is out of
/// scope here; only the interface the core touches is specified.
#[async_trait]
pub trait SettlementAuthority: Send + Sync {
    /// Chain the authority is deployed on, as it reports it.
    fn reported_chain(&self) -> Chain;

    /// Operator address the contract was deployed expecting to trust.
    fn declared_operator(&self) -> Address;

    /// Submit a settlement transaction, signed by `signer`, against
    /// `contract`. Returns the transaction hash.
    async fn submit_settle(
        &self,
        signer: &LocalSigner<SigningKey>,
        contract: Address,
        account: &str,
        amount: Amount,
        nonce: u64,
    ) -> Result<String, SettlementError>;

    /// Total funds currently deposited and backing the pool.
    async fn deposited(&self, contract: Address) -> Result<Amount, SettlementError>;
}
