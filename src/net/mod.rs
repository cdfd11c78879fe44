//! Network layer helpers.
//!
//! # Design Decisions
//! - TLS is optional; plain TCP listeners are bound directly with Tokio
//! - Listener TLS material is checked before the server starts

pub mod tls;
