//! CLI argument groups, flattened into the top-level pool binary command.

use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Logging configuration.
#[derive(Debug, Args, Clone, Serialize, Deserialize)]
#[command(next_help_heading = "Logging")]
#[serde(default)]
pub struct LogArgs {
    /// Silence all output except errors.
    #[arg(short, long)]
    pub quiet: bool,

    /// Verbose mode (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    #[serde(skip)]
    pub verbosity: u8,

    /// Log filter directive (e.g. "pool_coordinator=debug,pool_rpc=info").
    #[arg(long = "log.filter", value_name = "DIRECTIVE")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

impl Default for LogArgs {
    fn default() -> Self {
        Self { quiet: false, verbosity: 0, filter: None }
    }
}

/// Data directory configuration.
#[derive(Debug, Args, Clone, Default, Serialize, Deserialize)]
#[command(next_help_heading = "Datadir")]
#[serde(default)]
pub struct DatadirArgs {
    /// Root data directory for config, keystore and store files.
    ///
    /// Defaults to the OS-specific data directory:
    ///
    /// - Linux: `$XDG_DATA_HOME/peerpool/` or `$HOME/.local/share/peerpool/`
    /// - macOS: `$HOME/Library/Application Support/peerpool/`
    /// - Windows: `{FOLDERID_RoamingAppData}/peerpool/`
    #[arg(long, value_name = "DATA_DIR", verbatim_doc_comment)]
    #[serde(skip)]
    pub datadir: Option<PathBuf>,
}

/// Pool accounting parameters (spec §4/§8).
#[derive(Debug, Args, Clone, Serialize, Deserialize)]
#[command(next_help_heading = "Accounting")]
#[serde(default)]
pub struct AccountingArgs {
    /// Keepalive interval, in seconds, that one credited billing period covers.
    #[arg(long = "accounting.keepalive-interval", value_name = "SECONDS")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keepalive_interval: Option<u64>,

    /// Credit accrued per completed interval, per corroborated client/host pairing.
    #[arg(long = "accounting.credit-per-interval", value_name = "AMOUNT")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_per_interval: Option<i128>,

    /// Minimum (most negative) balance a client may accrue before hosts stop
    /// being credited for serving it. Unset means no limit.
    #[arg(long = "accounting.min-client-balance", value_name = "AMOUNT")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_client_balance: Option<i128>,

    /// Default number of hosts a client is matched with when it doesn't ask for a specific count.
    #[arg(long = "accounting.default-num-hosts", value_name = "COUNT")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_num_hosts: Option<usize>,

    /// Largest `num_hosts` a client is allowed to request.
    #[arg(long = "accounting.max-request-hosts", value_name = "COUNT")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_request_hosts: Option<usize>,
}

/// Storage backend selection.
#[derive(Debug, Args, Clone, Serialize, Deserialize)]
#[command(next_help_heading = "Storage")]
#[serde(default)]
pub struct StorageArgs {
    /// Use the in-memory store instead of the on-disk one. Loses all state on restart.
    #[arg(long = "storage.in-memory")]
    pub in_memory: bool,
}

impl Default for StorageArgs {
    fn default() -> Self {
        Self { in_memory: false }
    }
}

/// Settlement adapter selection (spec §7).
#[derive(Debug, Args, Clone, Serialize, Deserialize)]
#[command(next_help_heading = "Settlement")]
#[serde(default)]
pub struct SettlementArgs {
    /// Enable contract-backed settlement. Without this flag, `pool_withdraw`
    /// always fails with `NotSupported`.
    #[arg(long = "settlement.contract")]
    pub contract_enabled: bool,

    /// Network the settlement contract is deployed on (e.g. "mainnet", "sepolia").
    #[arg(long = "settlement.network", value_name = "NETWORK")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,

    /// Address of the settlement contract.
    #[arg(long = "settlement.contract-address", value_name = "ADDRESS")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
}

impl Default for SettlementArgs {
    fn default() -> Self {
        Self { contract_enabled: false, network: None, contract_address: None }
    }
}

/// Path to a welcome message template file (spec §5).
#[derive(Debug, Args, Clone, Default, Serialize, Deserialize)]
#[command(next_help_heading = "Pool identity")]
#[serde(default)]
pub struct WelcomeArgs {
    /// Path to a file containing the welcome message template. Falls back
    /// to the built-in default template if unset or unreadable.
    #[arg(long = "welcome.template", value_name = "PATH")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_path: Option<PathBuf>,
}

/// Identity / credential loading (spec §1.4, §6 "Environment").
#[derive(Debug, Args, Clone, Default)]
#[command(next_help_heading = "Identity")]
pub struct IdentityArgs {
    /// Operator keystore passphrase. Prefer `POOL_OPERATOR_PASSWORD` or
    /// `--password-file` over passing this on the command line.
    #[arg(long, env = "POOL_OPERATOR_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Path to a file containing the operator keystore passphrase.
    #[arg(long, conflicts_with = "password", value_name = "PATH")]
    pub password_file: Option<PathBuf>,

    /// Run with an ephemeral in-memory keystore instead of loading one from disk.
    #[arg(long)]
    pub ephemeral: bool,
}

/// Resolve the operator passphrase from `--password`, `--password-file` or
/// `POOL_OPERATOR_PASSWORD` (already captured into `--password` via `env`),
/// in that order.
pub fn resolve_password(args: &IdentityArgs) -> eyre::Result<String> {
    if let Some(password) = &args.password {
        return Ok(password.clone());
    }
    if let Some(path) = &args.password_file {
        return Ok(std::fs::read_to_string(path)?.trim_end().to_string());
    }
    eyre::bail!("no operator password provided: use --password, --password-file, or POOL_OPERATOR_PASSWORD")
}
