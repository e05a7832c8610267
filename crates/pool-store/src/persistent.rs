//! redb-backed [`Store`] implementation.
//!
//! Grounded on the chunk store's `Database::create` / `begin_write` /
//! `open_table` / `commit` pattern, generalized to four tables instead of
//! one. Peering edges live in their own table keyed `"<owner>/<peer>"`
//! rather than embedded in the node blob: ASCII `/` (0x2F) sorts before
//! `0` (0x30), so every peer of one owner falls in the contiguous range
//! `"<owner>/".."<owner>0"`, letting a full peer-set replace happen with a
//! single range scan inside one write transaction.

use crate::{Balance, NodeRecord, Store, StoreError};
use pool_primitives::{Amount, BalanceKey, NodeId, Timestamp};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

const NODES: TableDefinition<&str, &[u8]> = TableDefinition::new("nodes");
const BALANCES: TableDefinition<&str, &[u8]> = TableDefinition::new("balances");
const PEERS: TableDefinition<&str, u64> = TableDefinition::new("peers");
const NONCES: TableDefinition<&str, u64> = TableDefinition::new("nonces");

/// On-disk shape of a node record, minus its peer set (which lives in
/// `PEERS`). `extra` preserves fields written by a newer binary so a
/// read-modify-write from an older one doesn't silently drop them.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct NodeWire {
    uri: String,
    last_seen: Timestamp,
    kind: String,
    is_host: bool,
    account: Option<String>,
    in_sync: bool,
    #[serde(flatten)]
    extra: HashMap<String, serde_json::Value>,
}

impl From<&NodeRecord> for NodeWire {
    fn from(n: &NodeRecord) -> Self {
        Self {
            uri: n.uri.clone(),
            last_seen: n.last_seen,
            kind: n.kind.clone(),
            is_host: n.is_host,
            account: n.account.clone(),
            in_sync: n.in_sync,
            extra: HashMap::new(),
        }
    }
}

fn peer_prefix_range(owner: &str) -> (String, String) {
    (format!("{owner}/"), format!("{owner}0"))
}

fn storage_err<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::StorageFailure(e.to_string())
}

/// Persistent [`Store`] backend. Safe for concurrent use: reads never
/// block on redb's MVCC snapshot, and redb itself serializes writers.
pub struct PersistentStore {
    db: Database,
}

impl PersistentStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = Database::create(path).map_err(storage_err)?;
        let write_txn = db.begin_write().map_err(storage_err)?;
        {
            write_txn.open_table(NODES).map_err(storage_err)?;
            write_txn.open_table(BALANCES).map_err(storage_err)?;
            write_txn.open_table(PEERS).map_err(storage_err)?;
            write_txn.open_table(NONCES).map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)?;
        Ok(Self { db })
    }

    fn load_peers(&self, owner: &str) -> Result<HashMap<NodeId, Timestamp>, StoreError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(PEERS).map_err(storage_err)?;
        let (start, end) = peer_prefix_range(owner);
        let mut peers = HashMap::new();
        for entry in table.range(start.as_str()..end.as_str()).map_err(storage_err)? {
            let (key, value) = entry.map_err(storage_err)?;
            if let Some(peer_id) = key.value().split_once('/').map(|(_, p)| p) {
                peers.insert(NodeId::new(peer_id), value.value());
            }
        }
        Ok(peers)
    }

    fn assemble(&self, id: &NodeId, wire: NodeWire) -> Result<NodeRecord, StoreError> {
        Ok(NodeRecord {
            id: id.clone(),
            uri: wire.uri,
            last_seen: wire.last_seen,
            kind: wire.kind,
            is_host: wire.is_host,
            account: wire.account,
            peers: self.load_peers(id.as_str())?,
            in_sync: wire.in_sync,
        })
    }
}

impl Store for PersistentStore {
    fn check_and_save_nonce(&self, node: &NodeId, nonce: u64) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut table = write_txn.open_table(NONCES).map_err(storage_err)?;
            let max_seen = table.get(node.as_str()).map_err(storage_err)?.map(|v| v.value()).unwrap_or(0);
            if nonce <= max_seen {
                return Err(StoreError::StaleNonce {
                    node: node.clone(),
                    presented: nonce,
                    max_seen,
                });
            }
            table.insert(node.as_str(), nonce).map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)?;
        Ok(())
    }

    fn get_balance(&self, key: &BalanceKey) -> Result<Balance, StoreError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(BALANCES).map_err(storage_err)?;
        let key_str = key.to_string();
        match table.get(key_str.as_str()).map_err(storage_err)? {
            Some(bytes) => postcard::from_bytes(bytes.value()).map_err(storage_err),
            None => Ok(Balance::default()),
        }
    }

    fn add_balance(&self, key: &BalanceKey, delta: Amount) -> Result<Balance, StoreError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let updated = {
            let mut table = write_txn.open_table(BALANCES).map_err(storage_err)?;
            let key_str = key.to_string();
            let mut balance: Balance = match table.get(key_str.as_str()).map_err(storage_err)? {
                Some(bytes) => postcard::from_bytes(bytes.value()).map_err(storage_err)?,
                None => Balance::default(),
            };
            balance.credit = balance.credit.checked_add(delta).map_err(storage_err)?;
            let encoded = postcard::to_allocvec(&balance).map_err(storage_err)?;
            table.insert(key_str.as_str(), encoded.as_slice()).map_err(storage_err)?;
            balance
        };
        write_txn.commit().map_err(storage_err)?;
        Ok(updated)
    }

    fn total_balance(&self) -> Result<Amount, StoreError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(BALANCES).map_err(storage_err)?;
        let mut total = Amount::ZERO;
        for entry in table.iter().map_err(storage_err)? {
            let (_, value) = entry.map_err(storage_err)?;
            let balance: Balance = postcard::from_bytes(value.value()).map_err(storage_err)?;
            total = total.checked_add(balance.credit).map_err(storage_err)?;
        }
        Ok(total)
    }

    fn active_hosts(
        &self,
        kind: &str,
        limit: usize,
        now: Timestamp,
        keepalive_interval: u64,
    ) -> Result<Vec<NodeRecord>, StoreError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(NODES).map_err(storage_err)?;
        let mut hosts = Vec::new();
        for entry in table.iter().map_err(storage_err)? {
            let (key, value) = entry.map_err(storage_err)?;
            let wire: NodeWire = postcard::from_bytes(value.value()).map_err(storage_err)?;
            if !wire.is_host || !pool_primitives::kind_matches(kind, &wire.kind) {
                continue;
            }
            if now.saturating_sub(wire.last_seen) > keepalive_interval.saturating_mul(2) {
                continue;
            }
            let id = NodeId::new(key.value());
            hosts.push(self.assemble(&id, wire)?);
        }
        hosts.sort_by(|a, b| b.last_seen.cmp(&a.last_seen).then_with(|| a.id.cmp(&b.id)));
        hosts.truncate(limit);
        Ok(hosts)
    }

    fn all_nodes(&self) -> Result<Vec<NodeRecord>, StoreError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(NODES).map_err(storage_err)?;
        let mut nodes = Vec::new();
        for entry in table.iter().map_err(storage_err)? {
            let (key, value) = entry.map_err(storage_err)?;
            let wire: NodeWire = postcard::from_bytes(value.value()).map_err(storage_err)?;
            let id = NodeId::new(key.value());
            nodes.push(self.assemble(&id, wire)?);
        }
        Ok(nodes)
    }

    fn set_node(&self, node: NodeRecord) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut table = write_txn.open_table(NODES).map_err(storage_err)?;
            let wire = NodeWire::from(&node);
            let encoded = postcard::to_allocvec(&wire).map_err(storage_err)?;
            table.insert(node.id.as_str(), encoded.as_slice()).map_err(storage_err)?;
        }
        {
            let mut peers = write_txn.open_table(PEERS).map_err(storage_err)?;
            for (peer, ts) in &node.peers {
                peers
                    .insert(format!("{}/{}", node.id.as_str(), peer.as_str()).as_str(), *ts)
                    .map_err(storage_err)?;
            }
        }
        write_txn.commit().map_err(storage_err)?;
        Ok(())
    }

    fn get_node(&self, id: &NodeId) -> Result<Option<NodeRecord>, StoreError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(NODES).map_err(storage_err)?;
        let wire = match table.get(id.as_str()).map_err(storage_err)? {
            Some(bytes) => postcard::from_bytes::<NodeWire>(bytes.value()).map_err(storage_err)?,
            None => return Ok(None),
        };
        drop(table);
        drop(read_txn);
        Ok(Some(self.assemble(id, wire)?))
    }

    fn remove_node(&self, id: &NodeId) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut nodes = write_txn.open_table(NODES).map_err(storage_err)?;
            nodes.remove(id.as_str()).map_err(storage_err)?;
        }
        {
            let mut peers = write_txn.open_table(PEERS).map_err(storage_err)?;
            let (start, end) = peer_prefix_range(id.as_str());
            let stale: Vec<String> = peers
                .range(start.as_str()..end.as_str())
                .map_err(storage_err)?
                .filter_map(|e| e.ok().map(|(k, _)| k.value().to_string()))
                .collect();
            for key in stale {
                peers.remove(key.as_str()).map_err(storage_err)?;
            }
            // Drop the reverse edges too: anyone who listed `id` as a peer.
            let reverse_suffix = format!("/{}", id.as_str());
            let reverse_keys: Vec<String> = peers
                .iter()
                .map_err(storage_err)?
                .filter_map(|e| e.ok())
                .map(|(k, _)| k.value().to_string())
                .filter(|k| k.ends_with(&reverse_suffix))
                .collect();
            for key in reverse_keys {
                peers.remove(key.as_str()).map_err(storage_err)?;
            }
        }
        write_txn.commit().map_err(storage_err)?;
        Ok(())
    }

    fn update_node_peers(
        &self,
        caller: &NodeId,
        peer_ids: &[NodeId],
        now: Timestamp,
    ) -> Result<Vec<NodeRecord>, StoreError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let dropped_ids;
        {
            let mut nodes = write_txn.open_table(NODES).map_err(storage_err)?;
            let mut wire: NodeWire = match nodes.get(caller.as_str()).map_err(storage_err)? {
                Some(bytes) => postcard::from_bytes(bytes.value()).map_err(storage_err)?,
                None => return Err(StoreError::NotFound(caller.clone())),
            };
            wire.last_seen = now;
            let encoded = postcard::to_allocvec(&wire).map_err(storage_err)?;
            nodes.insert(caller.as_str(), encoded.as_slice()).map_err(storage_err)?;
        }
        {
            let mut peers = write_txn.open_table(PEERS).map_err(storage_err)?;
            let (start, end) = peer_prefix_range(caller.as_str());
            let existing: Vec<String> = peers
                .range(start.as_str()..end.as_str())
                .map_err(storage_err)?
                .filter_map(|e| e.ok().map(|(k, _)| k.value().to_string()))
                .collect();
            let keep: std::collections::HashSet<&NodeId> = peer_ids.iter().collect();
            dropped_ids = existing
                .iter()
                .filter_map(|k| k.split_once('/').map(|(_, p)| NodeId::new(p)))
                .filter(|p| !keep.contains(p))
                .collect::<Vec<_>>();
            for key in &existing {
                peers.remove(key.as_str()).map_err(storage_err)?;
            }
            for peer in peer_ids {
                peers
                    .insert(format!("{}/{}", caller.as_str(), peer.as_str()).as_str(), now)
                    .map_err(storage_err)?;
            }
        }
        write_txn.commit().map_err(storage_err)?;

        let mut dropped = Vec::with_capacity(dropped_ids.len());
        for id in dropped_ids {
            if let Some(record) = self.get_node(&id)? {
                dropped.push(record);
            }
        }
        Ok(dropped)
    }
}
