//! Pool configuration (spec §1.3): loaded from TOML, overridden by CLI args.

use crate::args::{AccountingArgs, SettlementArgs, StorageArgs, WelcomeArgs};
use eyre::Result;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountingConfig {
    pub keepalive_interval: u64,
    pub credit_per_interval: i128,
    pub min_client_balance: Option<i128>,
    pub default_num_hosts: usize,
    pub max_request_hosts: usize,
}

impl Default for AccountingConfig {
    fn default() -> Self {
        Self {
            keepalive_interval: 60,
            credit_per_interval: 1,
            min_client_balance: None,
            default_num_hosts: 3,
            max_request_hosts: 32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub in_memory: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { in_memory: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    pub contract_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self { contract_enabled: false, network: None, contract_address: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Where the RPC listener would bind. Carried here because this is
    /// where every other pool setting lives, but no listener is started by
    /// this crate (spec §1.3).
    pub bind_address: String,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self { bind_address: "127.0.0.1:8765".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub accounting: AccountingConfig,
    pub storage: StorageConfig,
    pub settlement: SettlementConfig,
    pub rpc: RpcConfig,
    pub status_cache_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub welcome_template_path: Option<std::path::PathBuf>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            accounting: AccountingConfig::default(),
            storage: StorageConfig::default(),
            settlement: SettlementConfig::default(),
            rpc: RpcConfig::default(),
            status_cache_seconds: 60,
            welcome_template_path: None,
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the configuration from `path`, or create a default one if it doesn't exist.
    pub fn load_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let content = fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            let config = Self::new();
            config.save(path)?;
            Ok(config)
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Apply command line overrides on top of a loaded (or default) config.
    pub fn apply_cli_args(
        &mut self,
        accounting_args: &AccountingArgs,
        storage_args: &StorageArgs,
        settlement_args: &SettlementArgs,
        welcome_args: &WelcomeArgs,
    ) {
        if let Some(v) = accounting_args.keepalive_interval {
            self.accounting.keepalive_interval = v;
        }
        if let Some(v) = accounting_args.credit_per_interval {
            self.accounting.credit_per_interval = v;
        }
        if accounting_args.min_client_balance.is_some() {
            self.accounting.min_client_balance = accounting_args.min_client_balance;
        }
        if let Some(v) = accounting_args.default_num_hosts {
            self.accounting.default_num_hosts = v;
        }
        if let Some(v) = accounting_args.max_request_hosts {
            self.accounting.max_request_hosts = v;
        }

        self.storage.in_memory = self.storage.in_memory || storage_args.in_memory;

        if settlement_args.contract_enabled {
            self.settlement.contract_enabled = true;
        }
        if settlement_args.network.is_some() {
            self.settlement.network = settlement_args.network.clone();
        }
        if settlement_args.contract_address.is_some() {
            self.settlement.contract_address = settlement_args.contract_address.clone();
        }

        if welcome_args.template_path.is_some() {
            self.welcome_template_path = welcome_args.template_path.clone();
        }
    }
}
