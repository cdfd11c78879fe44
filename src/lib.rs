//! Permissioned-ledger gateway library.
//!
//! Wraps a network SDK behind a session, a channel cache, an event hub
//! binder and a retrying transaction pipeline, and relays committed blocks
//! to real-time listeners.

pub mod config;
pub mod fabric;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod relay;
pub mod resilience;

pub use config::GatewayConfig;
pub use fabric::{GatewayError, GatewayResult, NetworkSession, TransactionPipeline};
pub use http::HttpServer;
pub use lifecycle::{GatewayContext, Shutdown};
