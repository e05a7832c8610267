//! pool-node
//!
//! The ambient stack around the pool core: CLI argument groups, TOML
//! configuration with CLI overrides, structured logging, an encrypted
//! operator keystore, and data directory resolution. None of this module
//! talks to the network; `bin/pool` wires it to `pool-rpc`'s
//! [`pool_rpc::PoolRpcHandler`].

pub mod args;
pub mod config;
pub mod dirs;
pub mod keystore;
pub mod logging;

pub use args::{
    AccountingArgs, DatadirArgs, IdentityArgs, LogArgs, SettlementArgs, StorageArgs, WelcomeArgs,
};
pub use config::PoolConfig;
pub use dirs::DataDirs;
pub use keystore::{load_or_create_operator_key, FileKeystore, Keystore, MemoryKeystore};
