//! The Store: single source of truth for Nodes, Balances, Peers, and
//! Nonces. Two backends are provided — [`MemoryStore`] (no durability) and
//! [`PersistentStore`] (redb-backed) — behind the same [`Store`] trait so
//! the rest of the pool is agnostic to which one is in use.

mod error;
mod memory;
mod persistent;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use persistent::PersistentStore;

use auto_impl::auto_impl;
use pool_primitives::{Amount, BalanceKey, NodeId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A registered peer endpoint, as seen by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub uri: String,
    pub last_seen: Timestamp,
    pub kind: String,
    pub is_host: bool,
    /// Payout account this node is bound to, if any. Empty/absent means the
    /// node bills anonymously (see [`BalanceKey::for_node`]).
    pub account: Option<String>,
    /// Neighbours this node has attested to within the keepalive window.
    pub peers: HashMap<NodeId, Timestamp>,
    /// Carried for data-model parity; the core places no constraints on it
    /// beyond defaulting to `true` for a freshly (re)registered node.
    pub in_sync: bool,
}

impl NodeRecord {
    pub fn new(id: NodeId, uri: String, kind: String, is_host: bool, now: Timestamp) -> Self {
        Self {
            id,
            uri,
            last_seen: now,
            kind,
            is_host,
            account: None,
            peers: HashMap::new(),
            in_sync: true,
        }
    }

    /// A node is expired once it's gone unseen for 2x the keepalive
    /// interval (invariant 5).
    pub fn is_expired(&self, now: Timestamp, keepalive_interval: u64) -> bool {
        now.saturating_sub(self.last_seen) > keepalive_interval.saturating_mul(2)
    }

    pub fn balance_key(&self) -> BalanceKey {
        BalanceKey::for_node(self.account.as_deref(), &self.id)
    }
}

/// A node's current credit balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub credit: Amount,
    pub next_withdraw: Timestamp,
}

impl Default for Balance {
    fn default() -> Self {
        Self {
            credit: Amount::ZERO,
            next_withdraw: 0,
        }
    }
}

/// Durable, concurrency-safe repository of nodes, balances, peering edges,
/// and nonces. Implementations must be safe under concurrent readers and
/// writers; see spec §4.A for the per-operation contract.
#[auto_impl(&, Box, Arc)]
pub trait Store: Send + Sync {
    /// Atomically asserts `nonce > max_seen[node]`; on success, updates
    /// `max_seen`. Must be linearizable per node id.
    fn check_and_save_nonce(&self, node: &NodeId, nonce: u64) -> Result<(), StoreError>;

    /// Current balance for `key`, or a zero-valued balance if none exists.
    /// Absence is never an error; only storage I/O failures are.
    fn get_balance(&self, key: &BalanceKey) -> Result<Balance, StoreError>;

    /// Atomic read-modify-write; `delta` may be negative. Returns the
    /// balance after the delta is applied.
    fn add_balance(&self, key: &BalanceKey, delta: Amount) -> Result<Balance, StoreError>;

    /// Sum of every tracked balance's credit. Used by the Status API; not
    /// part of spec.md's literal §4.A contract but a natural extension of
    /// it since both backends already hold every balance in one table.
    fn total_balance(&self) -> Result<Amount, StoreError>;

    /// Up to `limit` host records of the given `kind` ("" matches all)
    /// that are not expired as of `now`, most-recently-seen first, ties
    /// broken by node id for reproducibility.
    fn active_hosts(
        &self,
        kind: &str,
        limit: usize,
        now: Timestamp,
        keepalive_interval: u64,
    ) -> Result<Vec<NodeRecord>, StoreError>;

    /// Every node record, hosts and clients alike, with no expiry or kind
    /// filtering. Used by callers that need to apply their own expiry
    /// check (e.g. a GC sweep) rather than [`Store::active_hosts`]'s
    /// built-in "not expired, host only" contract.
    fn all_nodes(&self) -> Result<Vec<NodeRecord>, StoreError>;

    /// Upsert a node record in full (including its account binding).
    fn set_node(&self, node: NodeRecord) -> Result<(), StoreError>;

    /// Look up a single node record.
    fn get_node(&self, id: &NodeId) -> Result<Option<NodeRecord>, StoreError>;

    /// Delete a node, purging it from its own record and from every other
    /// node's peer map. Must be atomic. Idempotent: removing an unknown id
    /// is not an error.
    fn remove_node(&self, id: &NodeId) -> Result<(), StoreError>;

    /// Replace `caller`'s peer set with exactly `peer_ids` (each stamped at
    /// `now`), refresh `caller`'s `last_seen`, and return the records of
    /// neighbours that were present before the call but are absent from
    /// `peer_ids` ("inactive"). Neighbours with no record of their own are
    /// silently skipped. Fails with [`StoreError::NotFound`] if `caller`
    /// has no record.
    fn update_node_peers(
        &self,
        caller: &NodeId,
        peer_ids: &[NodeId],
        now: Timestamp,
    ) -> Result<Vec<NodeRecord>, StoreError>;
}

/// Two node ids are a corroborated edge iff each lists the other in its
/// peer map, and both attestations fall within one keepalive interval of
/// each other.
pub fn is_corroborated(
    a: &NodeRecord,
    b: &NodeRecord,
    keepalive_interval: u64,
) -> bool {
    let (Some(&a_saw_b), Some(&b_saw_a)) = (a.peers.get(&b.id), b.peers.get(&a.id)) else {
        return false;
    };
    a_saw_b.abs_diff(b_saw_a) <= keepalive_interval
}
