//! pool-rpc
//!
//! JSON-RPC 2.0 method surface for the pool coordinator (spec §6) and the
//! nonce-signed request envelope that authenticates every method but
//! `pool_status`. The transport (HTTP/WebSocket listener, TLS) is out of
//! scope; this crate only defines the `PoolApi` trait, its wire types, the
//! envelope verification contract, and a `PoolApiServer` implementation
//! that delegates to a `pool_coordinator::PoolCoordinator`.
//!
//! Methods:
//!   vipnode_host       — register as host
//!   vipnode_client     — request hosts
//!   vipnode_update     — keepalive / peer declaration
//!   vipnode_disconnect — leave the pool
//!   pool_withdraw      — settle accrued credit
//!   pool_status        — dashboard snapshot (unauthenticated)

pub mod api;
pub mod auth;
pub mod server;
pub mod types;

pub use api::PoolApiServer;
pub use auth::{AuthError, RequestAuthenticator};
pub use server::PoolRpcHandler;
