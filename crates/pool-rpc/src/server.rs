use std::sync::Arc;

use jsonrpsee::core::{async_trait, RpcResult};
use jsonrpsee::types::ErrorObject;
use pool_coordinator::{
    ClientRequest, CoordinatorError, HostRequest, PoolCoordinator, PoolErrorKind, UpdateRequest,
    WithdrawRequest,
};
use pool_primitives::{Amount, NodeId};
use pool_settlement::SettlementAdapter;
use pool_store::Store;
use tracing::warn;

use crate::api::PoolApiServer;
use crate::auth::RequestAuthenticator;
use crate::types::{
    ClientParams, ClientResult, Envelope, HostParams, HostResult, StatusResult, UpdateParams,
    UpdateResult, WithdrawParams, WithdrawResult,
};

fn error_code(kind: PoolErrorKind) -> i32 {
    match kind {
        PoolErrorKind::StaleNonce => -32000,
        PoolErrorKind::NotFound => -32001,
        PoolErrorKind::InsufficientBalance => -32002,
        PoolErrorKind::InvalidRequest => -32602,
        PoolErrorKind::TransientRPC => -32003,
        PoolErrorKind::NetworkMismatch => -32004,
        PoolErrorKind::AddressMismatch => -32005,
        PoolErrorKind::NotSupported => -32006,
        PoolErrorKind::StorageFailure => -32603,
    }
}

fn coordinator_err(err: CoordinatorError) -> ErrorObject<'static> {
    let code = error_code(err.kind());
    ErrorObject::owned(code, err.to_string(), None::<()>)
}

fn auth_err(err: crate::auth::AuthError) -> ErrorObject<'static> {
    ErrorObject::owned(-32000, err.to_string(), None::<()>)
}

/// Implements [`PoolApiServer`] by authenticating each envelope and
/// delegating to a [`PoolCoordinator`]. The listener that would serve
/// this module over HTTP/WebSocket is out of scope; callers obtain a
/// `jsonrpsee::RpcModule` via `into_rpc()` and host it themselves.
pub struct PoolRpcHandler<S, A> {
    coordinator: Arc<PoolCoordinator<S, A>>,
    auth: Arc<RequestAuthenticator<S>>,
}

impl<S, A> PoolRpcHandler<S, A>
where
    S: Store + 'static,
    A: SettlementAdapter,
{
    pub fn new(coordinator: Arc<PoolCoordinator<S, A>>, auth: Arc<RequestAuthenticator<S>>) -> Self {
        Self { coordinator, auth }
    }

    fn authenticate<P: serde::Serialize>(
        &self,
        method: &str,
        envelope: &Envelope,
        params: &P,
    ) -> Result<NodeId, ErrorObject<'static>> {
        let caller = envelope.caller();
        let params_bytes = serde_json::to_vec(params).unwrap_or_default();
        let message = RequestAuthenticator::<S>::signing_message(method, envelope.nonce, &params_bytes);
        self.auth
            .authenticate(&caller, envelope.nonce, &message, &envelope.signature)
            .map_err(auth_err)?;
        Ok(caller)
    }
}

#[async_trait]
impl<S, A> PoolApiServer for PoolRpcHandler<S, A>
where
    S: Store + 'static,
    A: SettlementAdapter + 'static,
{
    async fn vipnode_host(&self, envelope: Envelope, params: HostParams) -> RpcResult<HostResult> {
        let caller = self.authenticate("vipnode_host", &envelope, &params)?;
        let req = HostRequest {
            kind: params.kind,
            payout: params.payout,
            node_uri: params.node_uri,
        };
        self.coordinator
            .host(&caller, req, None)
            .map(Into::into)
            .map_err(coordinator_err)
    }

    async fn vipnode_client(&self, envelope: Envelope, params: ClientParams) -> RpcResult<ClientResult> {
        let caller = self.authenticate("vipnode_client", &envelope, &params)?;
        let req = ClientRequest {
            kind: params.kind,
            num_hosts: params.num_hosts,
        };
        self.coordinator
            .client(&caller, req, None)
            .map(Into::into)
            .map_err(coordinator_err)
    }

    async fn vipnode_update(&self, envelope: Envelope, params: UpdateParams) -> RpcResult<UpdateResult> {
        let caller = self.authenticate("vipnode_update", &envelope, &params)?;
        let req = UpdateRequest {
            peers: params.peers.iter().map(NodeId::new).collect(),
        };
        self.coordinator
            .update(&caller, req)
            .map(Into::into)
            .map_err(coordinator_err)
    }

    async fn vipnode_disconnect(&self, envelope: Envelope) -> RpcResult<()> {
        let caller = self.authenticate("vipnode_disconnect", &envelope, &())?;
        self.coordinator.disconnect(&caller).map_err(coordinator_err)
    }

    async fn pool_withdraw(&self, envelope: Envelope, params: WithdrawParams) -> RpcResult<WithdrawResult> {
        let caller = self.authenticate("pool_withdraw", &envelope, &params)?;
        let req = WithdrawRequest {
            amount: Amount::new(params.amount),
            nonce: params.nonce,
        };
        self.coordinator
            .withdraw(&caller, req)
            .await
            .map(Into::into)
            .map_err(coordinator_err)
    }

    async fn pool_status(&self) -> RpcResult<StatusResult> {
        self.coordinator
            .status()
            .await
            .map(Into::into)
            .map_err(|err| {
                warn!(%err, "pool_status failed");
                coordinator_err(err)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_signer::{Signer, SignerSync};
    use alloy_signer_local::LocalSigner;
    use pool_coordinator::{CoordinatorConfig, PoolCoordinator, WelcomeTemplate};
    use pool_primitives::FixedClock;
    use pool_settlement::{SettleReceipt, SettlementAdapter, SettlementError};
    use pool_store::MemoryStore;

    struct AlwaysSettles;

    #[async_trait::async_trait]
    impl SettlementAdapter for AlwaysSettles {
        async fn settle(&self, _account: &str, amount: Amount, _nonce: u64) -> Result<SettleReceipt, SettlementError> {
            Ok(SettleReceipt { tx_hash: Some("0xdead".into()), settled_amount: amount })
        }

        async fn pending_balance(&self) -> Result<Amount, SettlementError> {
            Ok(Amount::ZERO)
        }

        fn name(&self) -> &'static str {
            "always"
        }
    }

    fn signed_envelope(
        signer: &LocalSigner<alloy_signer::k256::ecdsa::SigningKey>,
        method: &str,
        nonce: u64,
        params: &impl serde::Serialize,
    ) -> Envelope {
        let params_bytes = serde_json::to_vec(params).unwrap();
        let message = RequestAuthenticator::<MemoryStore>::signing_message(method, nonce, &params_bytes);
        let signature = signer.sign_message_sync(&message).unwrap();
        Envelope {
            node_id: signer.address().to_string(),
            nonce,
            signature: hex::encode(signature.as_bytes()),
        }
    }

    /// The envelope's nonce is the only nonce the RPC surface checks
    /// (spec §6, "nonce verification precedes dispatch"): a real client
    /// sends the same nonce in the envelope and in `WithdrawParams`, and
    /// that single value must be enough for the call to succeed. Before
    /// the fix, `authenticate` consumed the nonce via the envelope and
    /// `coordinator::withdraw` consumed it again via `WithdrawParams`,
    /// so this call always failed with a stale-nonce error.
    #[tokio::test]
    async fn pool_withdraw_succeeds_with_one_nonce_shared_by_envelope_and_params() {
        let store = Arc::new(MemoryStore::new());
        let auth = Arc::new(RequestAuthenticator::new(Arc::clone(&store)));
        let coordinator = Arc::new(PoolCoordinator::new(
            Arc::clone(&store),
            Arc::new(AlwaysSettles),
            Arc::new(WelcomeTemplate::default()),
            Arc::new(FixedClock::new(0)),
            CoordinatorConfig::default(),
        ));
        let handler = PoolRpcHandler::new(coordinator, auth);

        let signer = LocalSigner::random();
        let caller = NodeId::new(signer.address().to_string());

        let host_params = HostParams { kind: "geth".into(), payout: None, node_uri: None };
        let envelope = signed_envelope(&signer, "vipnode_host", 1, &host_params);
        handler.vipnode_host(envelope, host_params).await.unwrap();

        let key = pool_primitives::BalanceKey::for_node(None, &caller);
        store.add_balance(&key, Amount::from(5i64)).unwrap();

        let withdraw_params = WithdrawParams { amount: 5, nonce: 2 };
        let envelope = signed_envelope(&signer, "pool_withdraw", 2, &withdraw_params);
        let result = handler.pool_withdraw(envelope, withdraw_params).await.unwrap();
        assert_eq!(result.settled_amount, 5);
    }
}
