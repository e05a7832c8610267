//! Billing policy. Turns the keepalive cadence into credits and debits:
//! tying billing to `Update` means an unresponsive endpoint self-terminates
//! billing, and requiring corroboration blocks a party from unilaterally
//! claiming or foisting a peering relationship.

use metrics::counter;
use pool_primitives::Amount;
use pool_store::{is_corroborated, Balance, NodeRecord, Store, StoreError};
use thiserror::Error;
use tracing::debug;

/// Configuration for one [`BalanceManager`].
#[derive(Debug, Clone)]
pub struct BalanceConfig {
    /// Keepalive interval (seconds); also the corroboration window.
    pub interval: u64,
    pub credit_per_interval: Amount,
    /// Clients below this balance are signalled (never hosts).
    pub min_balance: Option<Amount>,
}

/// Errors from [`BalanceManager::on_peers`].
#[derive(Debug, Error)]
pub enum BalanceError {
    /// The client's balance fell below [`BalanceConfig::min_balance`]. The
    /// balance is carried so the caller can still be told its value.
    #[error("insufficient balance: {credit} is below the minimum of {min}")]
    InsufficientBalance {
        balance: Balance,
        credit: Amount,
        min: Amount,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Transforms corroborated peering edges into periodic credits and debits.
pub struct BalanceManager<S> {
    config: BalanceConfig,
    store: S,
}

impl<S: Store> BalanceManager<S> {
    pub fn new(config: BalanceConfig, store: S) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &BalanceConfig {
        &self.config
    }

    /// Invoked by the coordinator for each authenticated Update from a
    /// client (a host's Update only refreshes its side of the edge; see
    /// the coordinator's `update` for why billing isn't driven from both
    /// ends). `node` must be the caller's record *after* this Update's
    /// peer-set replacement (so its `peers` map reflects what was just
    /// declared, which the corroboration check needs); `elapsed` is the
    /// time since the record's *previous* `last_seen`, i.e. the billing
    /// window this Update closes out. `peers` are the records of the
    /// declared peer ids, fetched after the replacement so their own peer
    /// maps are current too.
    pub fn on_peers(
        &self,
        node: &NodeRecord,
        peers: &[NodeRecord],
        elapsed: u64,
    ) -> Result<Balance, BalanceError> {
        let intervals = elapsed / self.config.interval.max(1);

        if intervals > 0 {
            let per_edge = Amount::new(
                self.config
                    .credit_per_interval
                    .value()
                    .saturating_mul(intervals as i128),
            );
            for peer in peers {
                if !is_corroborated(node, peer, self.config.interval) {
                    continue;
                }
                let (host, client) = if node.is_host { (node, peer) } else { (peer, node) };
                self.store.add_balance(&host.balance_key(), per_edge)?;
                self.store.add_balance(&client.balance_key(), -per_edge)?;
                counter!("pool_balance_credits_total").increment(1);
                debug!(host = %host.id, client = %client.id, amount = %per_edge, "credited corroborated edge");
            }
        }

        let balance = self.store.get_balance(&node.balance_key())?;

        if !node.is_host {
            if let Some(min) = self.config.min_balance {
                if balance.credit < min {
                    return Err(BalanceError::InsufficientBalance {
                        balance,
                        credit: balance.credit,
                        min,
                    });
                }
            }
        }

        Ok(balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pool_primitives::NodeId;
    use pool_store::MemoryStore;

    fn node(id: &str, is_host: bool, last_seen: u64, peers: &[(&str, u64)]) -> NodeRecord {
        let mut n = NodeRecord::new(NodeId::new(id), format!("{id}:1"), "geth".into(), is_host, last_seen);
        for (p, ts) in peers {
            n.peers.insert(NodeId::new(*p), *ts);
        }
        n
    }

    fn manager(interval: u64, credit: i64, min: Option<i64>) -> BalanceManager<MemoryStore> {
        BalanceManager::new(
            BalanceConfig {
                interval,
                credit_per_interval: Amount::from(credit),
                min_balance: min.map(Amount::from),
            },
            MemoryStore::new(),
        )
    }

    #[test]
    fn no_credit_without_corroboration() {
        let mgr = manager(60, 10, None);
        let host = node("h", true, 0, &[]);
        let client = node("c", false, 0, &[("h", 60)]); // client saw host, host hasn't seen client
        let balance = mgr.on_peers(&host, &[client], 60).unwrap();
        assert_eq!(balance.credit.value(), 0);
    }

    #[test]
    fn credits_host_and_debits_client_on_corroborated_edge() {
        let mgr = manager(60, 10, None);
        let host = node("h", true, 0, &[("c", 60)]);
        let client = node("c", false, 0, &[("h", 60)]);
        let host_balance = mgr.on_peers(&host, &[client.clone()], 60).unwrap();
        assert_eq!(host_balance.credit.value(), 10);
        let client_balance = mgr.on_peers(&client, &[host], 60).unwrap();
        assert_eq!(client_balance.credit.value(), -10);
    }

    #[test]
    fn insufficient_balance_signalled_for_clients_only() {
        let mgr = manager(60, 10, Some(-20));
        let host = node("h", true, 0, &[("c", 180)]);
        let client = node("c", false, 0, &[("h", 180)]);

        // 3 intervals of billing (180s / 60s) drives the client to -30.
        let err = mgr.on_peers(&client, &[host], 180).unwrap_err();
        match err {
            BalanceError::InsufficientBalance { credit, .. } => {
                assert_eq!(credit.value(), -30)
            }
            _ => panic!("expected InsufficientBalance"),
        }
    }

    #[test]
    fn hosts_never_signalled_for_insufficient_balance() {
        let mgr = manager(60, 10, Some(1_000_000));
        let host = node("h", true, 0, &[]);
        let balance = mgr.on_peers(&host, &[], 0).unwrap();
        assert_eq!(balance.credit.value(), 0);
    }
}
