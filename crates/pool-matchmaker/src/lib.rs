//! Selects a bounded set of live hosts for a client request. Thin and
//! stateless: a read-only query over [`Store::active_hosts`].

use pool_primitives::Timestamp;
use pool_store::{NodeRecord, Store, StoreError};

/// Pool-wide ceiling on hosts a single request may receive, independent of
/// what the caller asks for. Prevents an abusive `num_hosts` from forcing
/// a large scan/response.
#[derive(Debug, Clone, Copy)]
pub struct MatchmakerConfig {
    pub default_num_hosts: usize,
    pub max_request_hosts: usize,
    pub keepalive_interval: u64,
}

impl Default for MatchmakerConfig {
    fn default() -> Self {
        Self {
            default_num_hosts: 3,
            max_request_hosts: 32,
            keepalive_interval: 60,
        }
    }
}

pub struct Matchmaker<S> {
    config: MatchmakerConfig,
    store: S,
}

impl<S: Store> Matchmaker<S> {
    pub fn new(config: MatchmakerConfig, store: S) -> Self {
        Self { config, store }
    }

    /// Up to `min(num_hosts.unwrap_or(default), max_request_hosts)` live
    /// hosts of `kind` ("" matches all).
    pub fn find_hosts(
        &self,
        kind: &str,
        num_hosts: Option<usize>,
        now: Timestamp,
    ) -> Result<Vec<NodeRecord>, StoreError> {
        let requested = num_hosts
            .filter(|&n| n != 0)
            .unwrap_or(self.config.default_num_hosts);
        let limit = requested.min(self.config.max_request_hosts);
        self.store
            .active_hosts(kind, limit, now, self.config.keepalive_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pool_primitives::NodeId;
    use pool_store::MemoryStore;

    fn seed(store: &MemoryStore, kind: &str, count: usize) {
        for i in 0..count {
            let id = format!("{kind}-{i}");
            store
                .set_node(NodeRecord::new(
                    NodeId::new(&id),
                    format!("{id}:30303"),
                    kind.into(),
                    true,
                    i as u64,
                ))
                .unwrap();
        }
    }

    #[test]
    fn caps_at_max_request_hosts() {
        let store = MemoryStore::new();
        seed(&store, "geth", 5);
        seed(&store, "parity", 2);
        let mm = Matchmaker::new(
            MatchmakerConfig {
                default_num_hosts: 3,
                max_request_hosts: 4,
                keepalive_interval: 60,
            },
            store,
        );
        assert_eq!(mm.find_hosts("geth", Some(3), 10).unwrap().len(), 3);
        assert_eq!(mm.find_hosts("geth", Some(99), 10).unwrap().len(), 4);
    }

    #[test]
    fn zero_or_unset_uses_default() {
        let store = MemoryStore::new();
        seed(&store, "geth", 5);
        let mm = Matchmaker::new(MatchmakerConfig::default(), store);
        assert_eq!(mm.find_hosts("geth", None, 10).unwrap().len(), 3);
        assert_eq!(mm.find_hosts("geth", Some(0), 10).unwrap().len(), 3);
    }

    #[test]
    fn kind_filters_strictly() {
        let store = MemoryStore::new();
        seed(&store, "geth", 2);
        seed(&store, "parity", 2);
        let mm = Matchmaker::new(MatchmakerConfig::default(), store);
        let hosts = mm.find_hosts("parity", Some(10), 10).unwrap();
        assert_eq!(hosts.len(), 2);
        assert!(hosts.iter().all(|h| h.kind == "parity"));
    }
}
