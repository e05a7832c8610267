use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;

use crate::types::{
    ClientParams, ClientResult, Envelope, HostParams, HostResult, StatusResult, UpdateParams,
    UpdateResult, WithdrawParams, WithdrawResult,
};

/// The pool's JSON-RPC 2.0 surface (spec §6). Method names are
/// unprefixed on the wire (`vipnode_host`, not `pool_vipnode_host`); the
/// `rpc` macro's default namespacing is disabled for that reason.
#[rpc(server)]
pub trait PoolApi {
    #[method(name = "vipnode_host")]
    async fn vipnode_host(&self, envelope: Envelope, params: HostParams) -> RpcResult<HostResult>;

    #[method(name = "vipnode_client")]
    async fn vipnode_client(&self, envelope: Envelope, params: ClientParams) -> RpcResult<ClientResult>;

    #[method(name = "vipnode_update")]
    async fn vipnode_update(&self, envelope: Envelope, params: UpdateParams) -> RpcResult<UpdateResult>;

    #[method(name = "vipnode_disconnect")]
    async fn vipnode_disconnect(&self, envelope: Envelope) -> RpcResult<()>;

    #[method(name = "pool_withdraw")]
    async fn pool_withdraw(&self, envelope: Envelope, params: WithdrawParams) -> RpcResult<WithdrawResult>;

    /// The one unauthenticated method (spec §6): no envelope.
    #[method(name = "pool_status")]
    async fn pool_status(&self) -> RpcResult<StatusResult>;
}
