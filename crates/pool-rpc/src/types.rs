//! Wire types for the `vipnode_*`/`pool_*` JSON-RPC surface. These mirror
//! `pool_coordinator`'s request/response structs but use plain strings and
//! numbers so they serialize predictably over JSON-RPC.

use pool_coordinator as core;
use pool_primitives::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Envelope carried by every authenticated call (spec §6): the caller's
/// NodeID, a strictly-increasing nonce, and a signature over
/// `(method, nonce, params)`. `pool_status` is the only method that skips
/// this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub node_id: String,
    pub nonce: u64,
    /// Hex-encoded 65-byte (r, s, v) ECDSA signature, `0x`-prefixed or not.
    pub signature: String,
}

impl Envelope {
    pub fn caller(&self) -> NodeId {
        NodeId::new(&self.node_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostParams {
    pub kind: String,
    pub payout: Option<String>,
    pub node_uri: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostResult {
    pub pool_version: String,
}

impl From<core::HostResponse> for HostResult {
    fn from(r: core::HostResponse) -> Self {
        Self {
            pool_version: r.pool_version,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientParams {
    pub kind: String,
    pub num_hosts: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostInfo {
    pub id: String,
    pub uri: String,
    pub kind: String,
}

impl From<core::HostInfo> for HostInfo {
    fn from(h: core::HostInfo) -> Self {
        Self {
            id: h.id.as_str().to_string(),
            uri: h.uri,
            kind: h.kind,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientResult {
    pub hosts: Vec<HostInfo>,
    pub pool_version: String,
    pub message: String,
}

impl From<core::ClientResponse> for ClientResult {
    fn from(r: core::ClientResponse) -> Self {
        Self {
            hosts: r.hosts.into_iter().map(Into::into).collect(),
            pool_version: r.pool_version,
            message: r.message,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateParams {
    pub peers: Vec<String>,
    /// Carried for wire parity with spec §6; the core doesn't consult it.
    pub block_number: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceView {
    pub credit: i128,
    pub next_withdraw: u64,
}

impl From<pool_store::Balance> for BalanceView {
    fn from(b: pool_store::Balance) -> Self {
        Self {
            credit: b.credit.value(),
            next_withdraw: b.next_withdraw,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateResult {
    pub balance: Option<BalanceView>,
    pub invalid_peers: Vec<String>,
    pub insufficient_balance: bool,
}

impl From<core::UpdateResponse> for UpdateResult {
    fn from(r: core::UpdateResponse) -> Self {
        Self {
            balance: r.balance.map(Into::into),
            invalid_peers: r.invalid_peers.iter().map(|id| id.as_str().to_string()).collect(),
            insufficient_balance: r.insufficient_balance,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawParams {
    pub amount: i128,
    pub nonce: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawResult {
    pub tx: Option<String>,
    pub settled_amount: i128,
}

impl From<core::WithdrawResponse> for WithdrawResult {
    fn from(r: core::WithdrawResponse) -> Self {
        Self {
            tx: r.tx_hash,
            settled_amount: r.settled_amount.value(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResult {
    pub hosts: HashMap<String, usize>,
    pub total_balance: i128,
    pub total_deposit: i128,
    pub pool_version: String,
    pub uptime: u64,
}

impl From<core::StatusSnapshot> for StatusResult {
    fn from(s: core::StatusSnapshot) -> Self {
        Self {
            hosts: s.active_hosts_by_kind,
            total_balance: s.total_balance.value(),
            total_deposit: s.total_deposit.value(),
            pool_version: s.pool_version,
            uptime: s.uptime_secs,
        }
    }
}
