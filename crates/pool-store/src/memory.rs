use crate::{Balance, NodeRecord, Store, StoreError};
use parking_lot::RwLock;
use pool_primitives::{Amount, BalanceKey, NodeId, Timestamp};
use std::collections::HashMap;

/// In-memory [`Store`] backend. No durability: state is lost on restart.
/// Grounded on the peer-store memory backend's split-lock shape — one
/// `RwLock` per logical table rather than a single coarse lock, so reads
/// of one table never block writes to another.
#[derive(Debug, Default)]
pub struct MemoryStore {
    nodes: RwLock<HashMap<NodeId, NodeRecord>>,
    balances: RwLock<HashMap<BalanceKey, Balance>>,
    nonces: RwLock<HashMap<NodeId, u64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn check_and_save_nonce(&self, node: &NodeId, nonce: u64) -> Result<(), StoreError> {
        let mut nonces = self.nonces.write();
        let max_seen = nonces.get(node).copied().unwrap_or(0);
        if nonce <= max_seen {
            return Err(StoreError::StaleNonce {
                node: node.clone(),
                presented: nonce,
                max_seen,
            });
        }
        nonces.insert(node.clone(), nonce);
        Ok(())
    }

    fn get_balance(&self, key: &BalanceKey) -> Result<Balance, StoreError> {
        Ok(self.balances.read().get(key).copied().unwrap_or_default())
    }

    fn add_balance(&self, key: &BalanceKey, delta: Amount) -> Result<Balance, StoreError> {
        let mut balances = self.balances.write();
        let entry = balances.entry(key.clone()).or_default();
        entry.credit = entry
            .credit
            .checked_add(delta)
            .map_err(|e| StoreError::StorageFailure(e.to_string()))?;
        Ok(*entry)
    }

    fn total_balance(&self) -> Result<Amount, StoreError> {
        let mut total = Amount::ZERO;
        for balance in self.balances.read().values() {
            total = total
                .checked_add(balance.credit)
                .map_err(|e| StoreError::StorageFailure(e.to_string()))?;
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
        let nodes = self.nodes.read();
        let mut hosts: Vec<NodeRecord> = nodes
            .values()
            .filter(|n| n.is_host)
            .filter(|n| !n.is_expired(now, keepalive_interval))
            .filter(|n| pool_primitives::kind_matches(kind, &n.kind))
            .cloned()
            .collect();
        hosts.sort_by(|a, b| b.last_seen.cmp(&a.last_seen).then_with(|| a.id.cmp(&b.id)));
        hosts.truncate(limit);
        Ok(hosts)
    }

    fn all_nodes(&self) -> Result<Vec<NodeRecord>, StoreError> {
        Ok(self.nodes.read().values().cloned().collect())
    }

    fn set_node(&self, node: NodeRecord) -> Result<(), StoreError> {
        self.nodes.write().insert(node.id.clone(), node);
        Ok(())
    }

    fn get_node(&self, id: &NodeId) -> Result<Option<NodeRecord>, StoreError> {
        Ok(self.nodes.read().get(id).cloned())
    }

    fn remove_node(&self, id: &NodeId) -> Result<(), StoreError> {
        let mut nodes = self.nodes.write();
        nodes.remove(id);
        for other in nodes.values_mut() {
            other.peers.remove(id);
        }
        Ok(())
    }

    fn update_node_peers(
        &self,
        caller: &NodeId,
        peer_ids: &[NodeId],
        now: Timestamp,
    ) -> Result<Vec<NodeRecord>, StoreError> {
        let mut nodes = self.nodes.write();
        let previous_peers = nodes
            .get(caller)
            .ok_or_else(|| StoreError::NotFound(caller.clone()))?
            .peers
            .keys()
            .cloned()
            .collect::<Vec<_>>();

        let new_peer_set: HashMap<NodeId, Timestamp> =
            peer_ids.iter().cloned().map(|p| (p, now)).collect();

        let dropped: Vec<NodeRecord> = previous_peers
            .into_iter()
            .filter(|p| !new_peer_set.contains_key(p))
            .filter_map(|p| nodes.get(&p).cloned())
            .collect();

        if let Some(record) = nodes.get_mut(caller) {
            record.peers = new_peer_set;
            record.last_seen = now;
        }

        Ok(dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(ids: &[&str]) -> MemoryStore {
        let store = MemoryStore::new();
        for id in ids {
            store
                .set_node(NodeRecord::new(
                    NodeId::new(*id),
                    format!("{id}:30303"),
                    "geth".into(),
                    true,
                    0,
                ))
                .unwrap();
        }
        store
    }

    #[test]
    fn nonce_must_strictly_increase() {
        let store = MemoryStore::new();
        let id = NodeId::new("a");
        store.check_and_save_nonce(&id, 1).unwrap();
        store.check_and_save_nonce(&id, 2).unwrap();
        assert!(store.check_and_save_nonce(&id, 2).is_err());
        assert!(store.check_and_save_nonce(&id, 1).is_err());
    }

    #[test]
    fn balance_accumulates() {
        let store = MemoryStore::new();
        let key = BalanceKey::Account("alice".into());
        store.add_balance(&key, Amount::from(100i64)).unwrap();
        let bal = store.add_balance(&key, Amount::from(-30i64)).unwrap();
        assert_eq!(bal.credit.value(), 70);
    }

    #[test]
    fn active_hosts_respects_limit_and_kind() {
        let store = store_with(&["a", "b", "c"]);
        let hosts = store.active_hosts("geth", 2, 10, 60).unwrap();
        assert_eq!(hosts.len(), 2);
        let none = store.active_hosts("parity", 10, 10, 60).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn update_peers_reports_dropped_neighbours() {
        let store = store_with(&["a", "b", "c"]);
        store
            .update_node_peers(&NodeId::new("a"), &[NodeId::new("b"), NodeId::new("c")], 10)
            .unwrap();
        let dropped = store
            .update_node_peers(&NodeId::new("a"), &[NodeId::new("b")], 20)
            .unwrap();
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].id, NodeId::new("c"));
    }

    #[test]
    fn total_balance_sums_all_keys() {
        let store = MemoryStore::new();
        store.add_balance(&BalanceKey::Account("a".into()), Amount::from(10i64)).unwrap();
        store.add_balance(&BalanceKey::Account("b".into()), Amount::from(-3i64)).unwrap();
        assert_eq!(store.total_balance().unwrap().value(), 7);
    }

    #[test]
    fn all_nodes_includes_clients_and_ignores_expiry() {
        let store = store_with(&["a"]);
        store
            .set_node(NodeRecord::new(NodeId::new("b"), "b:30303".into(), "geth".into(), false, 0))
            .unwrap();
        let nodes = store.all_nodes().unwrap();
        assert_eq!(nodes.len(), 2);
        assert!(nodes.iter().any(|n| n.id == NodeId::new("b") && !n.is_host));
    }

    #[test]
    fn remove_node_purges_reverse_edges() {
        let store = store_with(&["a", "b"]);
        store
            .update_node_peers(&NodeId::new("b"), &[NodeId::new("a")], 5)
            .unwrap();
        store.remove_node(&NodeId::new("a")).unwrap();
        let b = store.get_node(&NodeId::new("b")).unwrap().unwrap();
        assert!(b.peers.is_empty());
    }
}
