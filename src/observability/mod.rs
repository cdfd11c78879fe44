//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! session / pipeline / relay / http produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters and histograms)
//!
//! Consumers:
//!     → stdout (fmt subscriber, filtered by RUST_LOG or config)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Metric updates are no-ops until a recorder is installed
//! - Transaction ids and channel names travel as structured fields

pub mod logging;
pub mod metrics;
