//! Pool Coordinator: exposes Host/Client/Update/Disconnect/Withdraw,
//! orchestrates the Store, Balance Manager, Settlement Adapter, and
//! Matchmaker. See the crate's `welcome` module for message rendering and
//! `error` for the RPC-facing error taxonomy.

mod error;
mod types;
mod welcome;

pub use error::{CoordinatorError, PoolErrorKind};
pub use types::{
    ClientRequest, ClientResponse, HostInfo, HostRequest, HostResponse, StatusSnapshot,
    UpdateRequest, UpdateResponse, WithdrawRequest, WithdrawResponse,
};
pub use welcome::{WelcomeTemplate, WelcomeTemplateError, DEFAULT_WELCOME_TEMPLATE};

use metrics::counter;
use parking_lot::RwLock;
use pool_balance::{BalanceConfig, BalanceError, BalanceManager};
use pool_matchmaker::{Matchmaker, MatchmakerConfig};
use pool_primitives::{Amount, Clock, NodeId, Timestamp};
use pool_settlement::SettlementAdapter;
use pool_store::{NodeRecord, Store};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;
use types::current_pool_version;

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub keepalive_interval: u64,
    pub credit_per_interval: Amount,
    pub min_client_balance: Option<Amount>,
    pub matchmaker: MatchmakerConfig,
    pub withdraw_min: Amount,
    pub withdraw_fee: Amount,
    pub status_cache_duration: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            keepalive_interval: 60,
            credit_per_interval: Amount::from(1i64),
            min_client_balance: None,
            matchmaker: MatchmakerConfig::default(),
            withdraw_min: Amount::ZERO,
            withdraw_fee: Amount::ZERO,
            status_cache_duration: Duration::from_secs(60),
        }
    }
}

/// Orchestrates every other component. Stateless beyond what it holds in
/// `Arc`s and the status cache (spec §9: "the coordinator... [is]
/// stateless given the Store").
pub struct PoolCoordinator<S, A> {
    store: Arc<S>,
    balance: BalanceManager<Arc<S>>,
    matchmaker: Matchmaker<Arc<S>>,
    settlement: Arc<A>,
    welcome_template: Arc<WelcomeTemplate>,
    clock: Arc<dyn Clock>,
    config: CoordinatorConfig,
    started_at: Instant,
    status_cache: RwLock<Option<(Instant, StatusSnapshot)>>,
}

impl<S, A> PoolCoordinator<S, A>
where
    S: Store + 'static,
    A: SettlementAdapter,
{
    pub fn new(
        store: Arc<S>,
        settlement: Arc<A>,
        welcome_template: Arc<WelcomeTemplate>,
        clock: Arc<dyn Clock>,
        config: CoordinatorConfig,
    ) -> Self {
        let balance = BalanceManager::new(
            BalanceConfig {
                interval: config.keepalive_interval,
                credit_per_interval: config.credit_per_interval,
                min_balance: config.min_client_balance,
            },
            Arc::clone(&store),
        );
        let matchmaker = Matchmaker::new(config.matchmaker, Arc::clone(&store));
        Self {
            store,
            balance,
            matchmaker,
            settlement,
            welcome_template,
            clock,
            config,
            started_at: Instant::now(),
            status_cache: RwLock::new(None),
        }
    }

    fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn host(
        &self,
        caller: &NodeId,
        req: HostRequest,
        fallback_uri: Option<&str>,
    ) -> Result<HostResponse, CoordinatorError> {
        let now = self.now();
        let uri = req
            .node_uri
            .or_else(|| fallback_uri.map(str::to_string))
            .unwrap_or_else(|| format!("{}:30303", caller.as_str()));
        let mut node = NodeRecord::new(caller.clone(), uri, req.kind, true, now);
        node.account = req.payout.filter(|p| !p.trim().is_empty());
        self.store.set_node(node)?;
        counter!("pool_hosts_registered_total").increment(1);
        Ok(HostResponse {
            pool_version: current_pool_version(),
        })
    }

    pub fn client(
        &self,
        caller: &NodeId,
        req: ClientRequest,
        fallback_uri: Option<&str>,
    ) -> Result<ClientResponse, CoordinatorError> {
        let now = self.now();
        let uri = fallback_uri
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}:30303", caller.as_str()));
        let node = NodeRecord::new(caller.clone(), uri, req.kind.clone(), false, now);
        self.store.set_node(node)?;

        let hosts = self
            .matchmaker
            .find_hosts(&req.kind, req.num_hosts, now)?
            .into_iter()
            .map(|n| HostInfo {
                id: n.id,
                uri: n.uri,
                kind: n.kind,
            })
            .collect();

        let message = match self.welcome_template.try_render(caller) {
            Ok(message) => message,
            Err(err) => {
                warn!(%err, node = %caller, "welcome template render failed, returning empty message");
                String::new()
            }
        };

        Ok(ClientResponse {
            hosts,
            pool_version: current_pool_version(),
            message,
        })
    }

    /// Only the client side of a corroborated edge drives billing: both
    /// endpoints refresh their peer declarations on every `Update`, so
    /// invoking the Balance Manager from both would charge the same
    /// interval twice. A host's `Update` still replaces its peer set and
    /// refreshes `LastSeen` (keeping the edge corroborated for the
    /// client's side) but never itself produces a credit or debit.
    pub fn update(&self, caller: &NodeId, req: UpdateRequest) -> Result<UpdateResponse, CoordinatorError> {
        let now = self.now();
        let previous = self
            .store
            .get_node(caller)?
            .ok_or_else(|| CoordinatorError::NotFound(caller.clone()))?;

        let elapsed = now.saturating_sub(previous.last_seen);
        let inactive = self.store.update_node_peers(caller, &req.peers, now)?;
        let invalid_peers: Vec<NodeId> = inactive.into_iter().map(|n| n.id).collect();

        if previous.is_host {
            let balance = self.store.get_balance(&previous.balance_key())?;
            return Ok(UpdateResponse {
                balance: Some(balance),
                invalid_peers,
                insufficient_balance: false,
            });
        }

        let updated = self
            .store
            .get_node(caller)?
            .ok_or_else(|| CoordinatorError::NotFound(caller.clone()))?;
        let peer_records: Vec<NodeRecord> = req
            .peers
            .iter()
            .filter_map(|id| self.store.get_node(id).ok().flatten())
            .collect();

        match self.balance.on_peers(&updated, &peer_records, elapsed) {
            Ok(balance) => Ok(UpdateResponse {
                balance: Some(balance),
                invalid_peers,
                insufficient_balance: false,
            }),
            Err(BalanceError::InsufficientBalance { balance, .. }) => Ok(UpdateResponse {
                balance: Some(balance),
                invalid_peers,
                insufficient_balance: true,
            }),
            Err(BalanceError::Store(e)) => Err(e.into()),
        }
    }

    pub fn disconnect(&self, caller: &NodeId) -> Result<(), CoordinatorError> {
        self.store.remove_node(caller)?;
        Ok(())
    }

    /// `req.nonce` is not re-checked here: the request envelope's own
    /// nonce already passed through the RPC authenticator before dispatch
    /// (spec §6, "nonce verification precedes dispatch"), and a real
    /// client signs one nonce per call, so a second check against the
    /// same value would always see it as already consumed. `req.nonce`
    /// still flows through to `settlement.settle` to disambiguate
    /// concurrent withdraws at the settlement layer.
    pub async fn withdraw(
        &self,
        caller: &NodeId,
        req: WithdrawRequest,
    ) -> Result<WithdrawResponse, CoordinatorError> {
        if req.amount < self.config.withdraw_min {
            return Err(CoordinatorError::BelowWithdrawMinimum {
                amount: req.amount,
                min: self.config.withdraw_min,
            });
        }

        let node = self
            .store
            .get_node(caller)?
            .ok_or_else(|| CoordinatorError::NotFound(caller.clone()))?;
        let key = node.balance_key();
        let net = req.amount - self.config.withdraw_fee;

        self.store.add_balance(&key, -req.amount)?;

        match self.settlement.settle(&key.to_string(), net, req.nonce).await {
            Ok(receipt) => {
                counter!("pool_withdrawals_total").increment(1);
                Ok(WithdrawResponse {
                    tx_hash: receipt.tx_hash,
                    settled_amount: receipt.settled_amount,
                })
            }
            Err(err) => {
                if let Err(rollback_err) = self.store.add_balance(&key, req.amount) {
                    warn!(error = %rollback_err, node = %caller, "withdraw rollback failed after settlement error");
                }
                Err(err.into())
            }
        }
    }

    pub async fn status(&self) -> Result<StatusSnapshot, CoordinatorError> {
        if let Some((cached_at, snapshot)) = self.status_cache.read().clone() {
            if cached_at.elapsed() < self.config.status_cache_duration {
                return Ok(snapshot);
            }
        }

        let now = self.now();
        let all_hosts = self
            .store
            .active_hosts("", usize::MAX, now, self.config.keepalive_interval)?;
        let mut active_hosts_by_kind: HashMap<String, usize> = HashMap::new();
        for host in &all_hosts {
            *active_hosts_by_kind.entry(host.kind.clone()).or_insert(0) += 1;
        }

        let total_balance = self.store.total_balance()?;
        let total_deposit = self.settlement.pending_balance().await?;

        let snapshot = StatusSnapshot {
            active_hosts_by_kind,
            total_balance,
            total_deposit,
            pool_version: current_pool_version(),
            uptime_secs: self.started_at.elapsed().as_secs(),
        };

        *self.status_cache.write() = Some((Instant::now(), snapshot.clone()));
        Ok(snapshot)
    }

    /// Strictly optional GC sweep (spec §9): not invoked internally by any
    /// operation above. The binary may drive this from a timer. Walks
    /// every node, hosts and clients alike, since `active_hosts` both
    /// pre-filters by expiry and excludes clients by design.
    pub fn sweep_expired(&self) -> usize {
        let now = self.now();
        let expired: Vec<NodeId> = match self.store.all_nodes() {
            Ok(nodes) => nodes
                .into_iter()
                .filter(|n| n.is_expired(now, self.config.keepalive_interval))
                .map(|n| n.id)
                .collect(),
            Err(_) => return 0,
        };
        let count = expired.len();
        for id in expired {
            if let Err(err) = self.store.remove_node(&id) {
                warn!(error = %err, node = %id, "failed to remove expired node during sweep");
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pool_primitives::FixedClock;
    use pool_settlement::{NoSettlement, SettleReceipt, SettlementError};
    use pool_store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn coordinator(
        config: CoordinatorConfig,
        clock: Arc<FixedClock>,
    ) -> PoolCoordinator<MemoryStore, NoSettlement> {
        PoolCoordinator::new(
            Arc::new(MemoryStore::new()),
            Arc::new(NoSettlement),
            Arc::new(WelcomeTemplate::default()),
            clock,
            config,
        )
    }

    /// S1 (happy path).
    #[tokio::test]
    async fn s1_happy_path_credits_and_debits() {
        let clock = Arc::new(FixedClock::new(0));
        let coord = coordinator(CoordinatorConfig::default(), clock.clone());

        let h1 = NodeId::new("h1");
        let c1 = NodeId::new("c1");

        coord
            .host(
                &h1,
                HostRequest {
                    kind: "geth".into(),
                    payout: Some("0xAAA".into()),
                    node_uri: None,
                },
                None,
            )
            .unwrap();
        let client_resp = coord
            .client(
                &c1,
                ClientRequest {
                    kind: "geth".into(),
                    num_hosts: None,
                },
                None,
            )
            .unwrap();
        assert_eq!(client_resp.hosts.len(), 1);
        assert_eq!(client_resp.hosts[0].id, h1);

        coord
            .update(&h1, UpdateRequest { peers: vec![c1.clone()] })
            .unwrap();
        clock.advance(60);
        let update_resp = coord
            .update(&c1, UpdateRequest { peers: vec![h1.clone()] })
            .unwrap();

        let host_balance = coord
            .store
            .get_balance(&pool_primitives::BalanceKey::Account("0xAAA".into()))
            .unwrap();
        assert_eq!(host_balance.credit.value(), 1);
        assert_eq!(update_resp.balance.unwrap().credit.value(), -1);
    }

    /// S2 (no corroboration).
    #[tokio::test]
    async fn s2_no_corroboration_yields_no_credit() {
        let clock = Arc::new(FixedClock::new(0));
        let coord = coordinator(CoordinatorConfig::default(), clock.clone());
        let h1 = NodeId::new("h1");
        let c1 = NodeId::new("c1");

        coord
            .host(&h1, HostRequest { kind: "geth".into(), payout: Some("0xAAA".into()), node_uri: None }, None)
            .unwrap();
        coord
            .client(&c1, ClientRequest { kind: "geth".into(), num_hosts: None }, None)
            .unwrap();

        for _ in 0..3 {
            clock.advance(60);
            coord.update(&h1, UpdateRequest { peers: vec![c1.clone()] }).unwrap();
        }

        let host_balance = coord
            .store
            .get_balance(&pool_primitives::BalanceKey::Account("0xAAA".into()))
            .unwrap();
        assert_eq!(host_balance.credit.value(), 0);
    }

    /// S3 (insufficient balance). A host's `Update` only ever refreshes its
    /// side of the peering edge (see `update`'s host-skip note); billing is
    /// driven entirely by the client's calls. The initial pairing below
    /// closes with zero elapsed time (both sides register at the same
    /// instant) and so is itself a free, corroboration-establishing
    /// "paired Update" with no credit — matching the first of the "3
    /// successful paired Updates" before the threshold is crossed.
    #[tokio::test]
    async fn s3_insufficient_balance_after_three_rounds() {
        let clock = Arc::new(FixedClock::new(0));
        let mut config = CoordinatorConfig::default();
        config.credit_per_interval = Amount::from(10i64);
        config.min_client_balance = Some(Amount::from(-20i64));
        let coord = coordinator(config, clock.clone());

        let h1 = NodeId::new("h1");
        let c1 = NodeId::new("c1");
        coord
            .host(&h1, HostRequest { kind: "geth".into(), payout: None, node_uri: None }, None)
            .unwrap();
        coord
            .client(&c1, ClientRequest { kind: "geth".into(), num_hosts: None }, None)
            .unwrap();

        coord.update(&h1, UpdateRequest { peers: vec![c1.clone()] }).unwrap();
        let free_pairing = coord.update(&c1, UpdateRequest { peers: vec![h1.clone()] }).unwrap();
        assert!(!free_pairing.insufficient_balance);
        assert_eq!(free_pairing.balance.unwrap().credit.value(), 0);

        for round in 1..=3 {
            clock.advance(60);
            coord.update(&h1, UpdateRequest { peers: vec![c1.clone()] }).unwrap();
            let resp = coord.update(&c1, UpdateRequest { peers: vec![h1.clone()] }).unwrap();
            if round < 3 {
                assert!(!resp.insufficient_balance, "round {round} should not yet be insufficient");
            } else {
                assert!(resp.insufficient_balance);
                assert_eq!(resp.balance.unwrap().credit.value(), -30);
            }
        }
    }

    /// S4 (host selection).
    #[tokio::test]
    async fn s4_host_selection_respects_cap_and_kind() {
        let clock = Arc::new(FixedClock::new(0));
        let mut config = CoordinatorConfig::default();
        config.matchmaker.max_request_hosts = 4;
        let coord = coordinator(config, clock);

        for i in 0..5 {
            let id = NodeId::new(&format!("geth-{i}"));
            coord
                .host(&id, HostRequest { kind: "geth".into(), payout: None, node_uri: None }, None)
                .unwrap();
        }
        for i in 0..2 {
            let id = NodeId::new(&format!("parity-{i}"));
            coord
                .host(&id, HostRequest { kind: "parity".into(), payout: None, node_uri: None }, None)
                .unwrap();
        }

        let c1 = NodeId::new("c1");
        let resp = coord
            .client(&c1, ClientRequest { kind: "geth".into(), num_hosts: Some(3) }, None)
            .unwrap();
        assert_eq!(resp.hosts.len(), 3);

        let resp = coord
            .client(&c1, ClientRequest { kind: "geth".into(), num_hosts: Some(99) }, None)
            .unwrap();
        assert_eq!(resp.hosts.len(), 4);
    }

    /// S5 (disconnect idempotence).
    #[tokio::test]
    async fn s5_disconnect_is_idempotent_then_update_fails() {
        let clock = Arc::new(FixedClock::new(0));
        let coord = coordinator(CoordinatorConfig::default(), clock);
        let h1 = NodeId::new("h1");
        coord
            .host(&h1, HostRequest { kind: "geth".into(), payout: None, node_uri: None }, None)
            .unwrap();

        coord.disconnect(&h1).unwrap();
        coord.disconnect(&h1).unwrap();

        let err = coord.update(&h1, UpdateRequest::default()).unwrap_err();
        assert!(matches!(err, CoordinatorError::NotFound(_)));
    }

    /// S6 (withdraw rollback).
    struct FlakySettlement {
        failures_remaining: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl SettlementAdapter for FlakySettlement {
        async fn settle(
            &self,
            _account: &str,
            _amount: Amount,
            _nonce: u64,
        ) -> Result<SettleReceipt, SettlementError> {
            if self.failures_remaining.fetch_sub(1, Ordering::SeqCst) > 0 {
                Err(SettlementError::TransientRPC("unavailable".into()))
            } else {
                Ok(SettleReceipt { tx_hash: Some("0xdead".into()), settled_amount: _amount })
            }
        }

        async fn pending_balance(&self) -> Result<Amount, SettlementError> {
            Ok(Amount::ZERO)
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    #[tokio::test]
    async fn s6_withdraw_rolls_back_on_settlement_failure() {
        let clock = Arc::new(FixedClock::new(0));
        let store = Arc::new(MemoryStore::new());
        let settlement = Arc::new(FlakySettlement {
            failures_remaining: AtomicUsize::new(2),
        });
        let coord = PoolCoordinator::new(
            Arc::clone(&store),
            settlement,
            Arc::new(WelcomeTemplate::default()),
            clock,
            CoordinatorConfig::default(),
        );

        let c1 = NodeId::new("c1");
        coord
            .client(&c1, ClientRequest { kind: "geth".into(), num_hosts: None }, None)
            .unwrap();
        let key = pool_primitives::BalanceKey::Node(c1.clone());
        store.add_balance(&key, Amount::from(1_000_000_000_000_000_000i64)).unwrap();
        let before = store.get_balance(&key).unwrap();

        let err = coord
            .withdraw(&c1, WithdrawRequest { amount: Amount::from(1_000_000_000_000_000_0i64), nonce: 1 })
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::Settlement(SettlementError::TransientRPC(_))));

        let after = store.get_balance(&key).unwrap();
        assert_eq!(before.credit, after.credit);
    }

    /// Regression test for a sweep that used to always return 0: it walked
    /// `active_hosts`, which pre-filters by expiry and excludes clients,
    /// so nothing it returned could ever be expired.
    #[tokio::test]
    async fn sweep_expired_removes_hosts_and_clients_past_twice_keepalive() {
        let clock = Arc::new(FixedClock::new(0));
        let coord = coordinator(CoordinatorConfig::default(), clock.clone());

        let stale_host = NodeId::new("h1");
        let stale_client = NodeId::new("c1");
        let fresh_host = NodeId::new("h2");

        coord
            .host(&stale_host, HostRequest { kind: "geth".into(), payout: None, node_uri: None }, None)
            .unwrap();
        coord
            .client(&stale_client, ClientRequest { kind: "geth".into(), num_hosts: None }, None)
            .unwrap();

        clock.advance(121);
        coord
            .host(&fresh_host, HostRequest { kind: "geth".into(), payout: None, node_uri: None }, None)
            .unwrap();

        let removed = coord.sweep_expired();
        assert_eq!(removed, 2);
        assert!(coord.store.get_node(&stale_host).unwrap().is_none());
        assert!(coord.store.get_node(&stale_client).unwrap().is_none());
        assert!(coord.store.get_node(&fresh_host).unwrap().is_some());
    }
}
