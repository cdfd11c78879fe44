//! HTTP surface of the gateway.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum router, trace/timeout/CORS layers)
//!     → handlers.rs (decode request, call pipeline or ledger surface)
//!     → response.rs (GatewayError → status + JSON body)
//!
//! /socket
//!     → websocket.rs (one JSON text frame per relayed block)
//! ```

pub mod handlers;
pub mod response;
pub mod server;
pub mod websocket;

pub use server::{AppState, HttpServer};
