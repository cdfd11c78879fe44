//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once per process
//! - Resolve the log filter from `RUST_LOG`, falling back to config
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level when set
//! - Noisy transport crates are capped at `warn`

use tracing_subscriber::filter::Directive;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const QUIET: &[&str] = &["hyper=warn", "tungstenite=warn", "tokio_tungstenite=warn"];

/// Build the filter for `level` unless `RUST_LOG` overrides it.
pub fn build_filter(level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let mut filter = EnvFilter::try_new(format!("fabric_gateway={level},tower_http={level}"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    for directive in QUIET {
        if let Ok(d) = directive.parse::<Directive>() {
            filter = filter.add_directive(d);
        }
    }
    filter
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_logging(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(build_filter(level))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_falls_back() {
        let filter = build_filter("not a level ]]");
        assert!(!filter.to_string().is_empty());
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_logging("debug");
        init_logging("info");
    }
}
