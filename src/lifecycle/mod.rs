//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Session (initialize, login) → Channel cache → Pipeline
//!            → Block relay → GatewayContext
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → relay tasks stop, server drains → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: session setup and login errors are fatal
//! - Relay failures are logged and do not abort startup
//! - The HTTP listener starts last, once the context exists

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{bootstrap, GatewayContext};
