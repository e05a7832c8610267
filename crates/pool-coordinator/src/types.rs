use pool_primitives::{Amount, NodeId};
use pool_store::Balance;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct HostRequest {
    pub kind: String,
    pub payout: Option<String>,
    pub node_uri: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HostResponse {
    pub pool_version: String,
}

#[derive(Debug, Clone, Default)]
pub struct ClientRequest {
    pub kind: String,
    pub num_hosts: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct HostInfo {
    pub id: NodeId,
    pub uri: String,
    pub kind: String,
}

#[derive(Debug, Clone)]
pub struct ClientResponse {
    pub hosts: Vec<HostInfo>,
    pub pool_version: String,
    /// Rendered welcome message; empty if no template is configured or if
    /// rendering failed (failure is logged, never surfaced to the caller).
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateRequest {
    pub peers: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct UpdateResponse {
    pub balance: Option<Balance>,
    pub invalid_peers: Vec<NodeId>,
    /// Non-fatal signal (spec §4.E): clients should halt, hosts are never
    /// rejected for balance.
    pub insufficient_balance: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct WithdrawRequest {
    pub amount: Amount,
    pub nonce: u64,
}

#[derive(Debug, Clone)]
pub struct WithdrawResponse {
    pub tx_hash: Option<String>,
    pub settled_amount: Amount,
}

#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub active_hosts_by_kind: HashMap<String, usize>,
    pub total_balance: Amount,
    pub total_deposit: Amount,
    pub pool_version: String,
    pub uptime_secs: u64,
}

pub(crate) fn current_pool_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
