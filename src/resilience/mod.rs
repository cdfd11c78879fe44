//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Invoke attempt fails (proposal, broadcast or commit-wait):
//!     → retries.rs (budget left? keep the error as the last cause)
//!     → backoff.rs (fixed delay, or exponential with jitter)
//!     → next attempt with a fresh transaction id
//! ```
//!
//! # Design Decisions
//! - The budget belongs to one invoke call; nothing is shared between calls
//! - Exhaustion reports the attempt count and the last underlying error
//! - Queries and administrative calls are never retried

pub mod backoff;
pub mod retries;

pub use retries::RetryPolicy;
