//! Pool coordinator binary.
//!
//! Wires CLI args, config, keystore, store and settlement adapter into a
//! [`pool_coordinator::PoolCoordinator`] and hands it to a
//! [`pool_rpc::PoolRpcHandler`]. Hosting that handler behind an actual
//! HTTP/WebSocket listener is out of scope: this binary builds the
//! `jsonrpsee::RpcModule` and stops there.

use alloy_signer_local::LocalSigner;
use clap::Parser;
use eyre::Result;
use pool_coordinator::{CoordinatorConfig, PoolCoordinator, WelcomeTemplate, DEFAULT_WELCOME_TEMPLATE};
use pool_matchmaker::MatchmakerConfig;
use pool_node::args::resolve_password;
use pool_node::{
    AccountingArgs, DataDirs, FileKeystore, IdentityArgs, LogArgs, MemoryKeystore, PoolConfig,
    SettlementArgs, StorageArgs, WelcomeArgs,
};
use pool_primitives::{Amount, SystemClock};
use pool_rpc::{PoolApiServer, PoolRpcHandler, RequestAuthenticator};
use pool_settlement::NoSettlement;
use pool_store::{MemoryStore, PersistentStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "pool", about = "Run a vipnode-style node pool coordinator")]
struct Cli {
    #[command(flatten)]
    log: LogArgs,

    #[command(flatten)]
    datadir: pool_node::DatadirArgs,

    #[command(flatten)]
    accounting: AccountingArgs,

    #[command(flatten)]
    storage: StorageArgs,

    #[command(flatten)]
    settlement: SettlementArgs,

    #[command(flatten)]
    welcome: WelcomeArgs,

    #[command(flatten)]
    identity: IdentityArgs,
}

fn welcome_template(args: &WelcomeArgs) -> Result<Arc<WelcomeTemplate>> {
    let raw = match &args.template_path {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("failed to read welcome template {path:?}: {e}"))?,
        None => DEFAULT_WELCOME_TEMPLATE.to_string(),
    };
    Ok(Arc::new(WelcomeTemplate::parse(&raw)?))
}

fn coordinator_config(config: &PoolConfig) -> CoordinatorConfig {
    CoordinatorConfig {
        keepalive_interval: config.accounting.keepalive_interval,
        credit_per_interval: Amount::new(config.accounting.credit_per_interval),
        min_client_balance: config.accounting.min_client_balance.map(Amount::new),
        matchmaker: MatchmakerConfig {
            default_num_hosts: config.accounting.default_num_hosts,
            max_request_hosts: config.accounting.max_request_hosts,
            keepalive_interval: config.accounting.keepalive_interval,
        },
        withdraw_min: Amount::ZERO,
        withdraw_fee: Amount::ZERO,
        status_cache_duration: Duration::from_secs(config.status_cache_seconds),
    }
}

/// Checked at wiring time: `pool-settlement::ContractSettlement` needs a
/// live `SettlementAuthority` (chain RPC, tx submission) that this crate
/// doesn't implement. `--settlement.contract` is accepted and validated,
/// but always falls back to [`NoSettlement`] until an authority
/// implementation exists.
fn warn_if_contract_settlement_requested(config: &PoolConfig) {
    if config.settlement.contract_enabled {
        tracing::warn!(
            network = config.settlement.network.as_deref().unwrap_or(""),
            "contract settlement requested but no settlement authority is wired into this binary; falling back to no-op settlement"
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    pool_node::logging::init_logging(&cli.log)?;

    let data_dirs = DataDirs::new(cli.datadir.datadir.clone())?;
    let mut config = PoolConfig::load_or_create(data_dirs.config_file())?;
    config.apply_cli_args(&cli.accounting, &cli.storage, &cli.settlement, &cli.welcome);
    warn_if_contract_settlement_requested(&config);

    let signer = if cli.identity.ephemeral {
        let keystore = MemoryKeystore::new();
        let key = pool_node::load_or_create_operator_key(&keystore, "")?;
        LocalSigner::from_signing_key(key)
    } else {
        let password = resolve_password(&cli.identity)?;
        let keystore = FileKeystore::new(&data_dirs.keystore);
        let key = pool_node::load_or_create_operator_key(&keystore, &password)?;
        LocalSigner::from_signing_key(key)
    };
    info!(operator = %alloy_signer::Signer::address(&signer), "operator identity loaded");

    let template = welcome_template(&cli.welcome)?;
    let coord_config = coordinator_config(&config);
    let settlement = Arc::new(NoSettlement);

    if config.storage.in_memory {
        let store = Arc::new(MemoryStore::new());
        let auth = Arc::new(RequestAuthenticator::new(Arc::clone(&store)));
        let coordinator = Arc::new(PoolCoordinator::new(
            store,
            settlement,
            template,
            Arc::new(SystemClock),
            coord_config,
        ));
        let handler = PoolRpcHandler::new(coordinator, auth);
        let _module = handler.into_rpc();
        info!("pool coordinator built with an in-memory store; no RPC listener is started");
    } else {
        let store = Arc::new(PersistentStore::open(&data_dirs.store)?);
        let auth = Arc::new(RequestAuthenticator::new(Arc::clone(&store)));
        let coordinator = Arc::new(PoolCoordinator::new(
            store,
            settlement,
            template,
            Arc::new(SystemClock),
            coord_config,
        ));
        let handler = PoolRpcHandler::new(coordinator, auth);
        let _module = handler.into_rpc();
        info!(path = %data_dirs.store.display(), "pool coordinator built with a persistent store; no RPC listener is started");
    }

    tokio::signal::ctrl_c().await?;
    Ok(())
}
