//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (retry budget >= 1, timeouts > 0)
//! - Check that peer/orderer endpoints and bind addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a loaded configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.invoke.retry_count == 0 {
        errors.push(ValidationError::new(
            "invoke.retry_count",
            "must allow at least one attempt",
        ));
    }
    if config.invoke.commit_timeout_ms == 0 {
        errors.push(ValidationError::new(
            "invoke.commit_timeout_ms",
            "must be greater than zero",
        ));
    }
    if config.invoke.exponential_backoff && config.invoke.max_delay_ms < config.invoke.retry_delay_ms {
        errors.push(ValidationError::new(
            "invoke.max_delay_ms",
            "must not be smaller than retry_delay_ms",
        ));
    }

    if config.network.org.is_empty() {
        errors.push(ValidationError::new("network.org", "must not be empty"));
    }
    if config.network.enroll_id.is_empty() {
        errors.push(ValidationError::new("network.enroll_id", "must not be empty"));
    }
    for (field, endpoint) in [
        ("network.peer0_port", config.network.peer_url()),
        ("network.orderer_port", config.network.orderer_url()),
    ] {
        match url::Url::parse(&endpoint) {
            Ok(url) if url.host_str().is_some() && url.port().is_some() => {}
            Ok(_) => errors.push(ValidationError::new(
                field,
                format!("endpoint '{}' has no host or port", endpoint),
            )),
            Err(e) => errors.push(ValidationError::new(
                field,
                format!("invalid endpoint '{}': {}", endpoint, e),
            )),
        }
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!(
                "'{}' is not a socket address",
                config.observability.metrics_address
            ),
        ));
    }
    if config.relay.buffer == 0 {
        errors.push(ValidationError::new("relay.buffer", "must be greater than zero"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GatewayConfig::default();
        config.invoke.retry_count = 0;
        config.invoke.commit_timeout_ms = 0;
        config.listener.bind_address = "not-an-address".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.field == "invoke.retry_count"));
        assert!(errors.iter().any(|e| e.field == "listener.bind_address"));
    }

    #[test]
    fn test_bad_domain_rejected() {
        let mut config = GatewayConfig::default();
        config.network.domain = "exa mple.com".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "network.peer0_port"));
    }
}
