//! Network gateway core.
//!
//! # Data Flow
//! ```text
//! NetworkSession (identity, local peer)
//!     → ChannelCache (one initialized handle per channel id)
//!     → TransactionPipeline
//!           proposal → endorsements → broadcast → EventHubBinder → commit-wait
//!     → LedgerAdmin (queries, channel creation)
//! ```
//!
//! # Design Decisions
//! - All network calls go through the `NetworkSdk` / `EventHub` traits
//! - `sim` provides an in-process network for development and tests

pub mod admin;
pub mod channel;
pub mod events;
pub mod pipeline;
pub mod sdk;
pub mod session;
pub mod sim;
pub mod types;

pub use admin::LedgerAdmin;
pub use channel::{ChannelCache, ChannelHandle};
pub use events::{BoundEventHub, CommitOutcome, EventHubBinder};
pub use pipeline::TransactionPipeline;
pub use sdk::{EventHub, NetworkSdk};
pub use session::NetworkSession;
pub use sim::SimNetwork;
pub use types::{GatewayError, GatewayResult, InvokeRequest, InvokeResult, TransactionId};
