//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (environment overrides: ORG, DOMAIN, INVOKE_RETRY_COUNT, ...)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is built once at process start and passed into constructors
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::DiscoveryConfig;
pub use schema::GatewayConfig;
pub use schema::InvokeConfig;
pub use schema::ListenerConfig;
pub use schema::NetworkConfig;
pub use schema::ObservabilityConfig;
pub use schema::RelayConfig;
