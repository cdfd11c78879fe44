//! Block relay subsystem.
//!
//! # Data Flow
//! ```text
//! EventHub (block registration, one per channel)
//!     → block_relay.rs (wrap as ChainBlockEvent, count)
//!     → publisher.rs (broadcast to every listener)
//!     → http/websocket.rs (one JSON text frame per event)
//! ```
//!
//! # Design Decisions
//! - Relay errors are logged; the affected channel stops relaying
//! - Slow listeners skip events instead of blocking the relay

pub mod block_relay;
pub mod publisher;

pub use block_relay::BlockRelay;
pub use publisher::{ChainBlockEvent, ChainBlockPublisher, CHAINBLOCK_EVENT};
