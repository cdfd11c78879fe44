//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load, apply environment overrides and validate.
///
/// With no path the defaults are used as the base layer.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
            toml::from_str(&content).map_err(ConfigError::Parse)?
        }
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())
        .map_err(ConfigError::Validation)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay the deployment's environment variables onto `config`.
///
/// `lookup` abstracts the environment so tests don't mutate process state.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), Vec<ValidationError>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut errors = Vec::new();
    let network = &mut config.network;

    if let Some(v) = lookup("ORG") {
        network.org = v;
    }
    if let Some(v) = lookup("DOMAIN") {
        network.domain = v;
    }
    if let Some(v) = lookup("ORDERER_NAME") {
        network.orderer_name = v;
    }
    if let Some(v) = lookup("ORDERER_DOMAIN") {
        network.orderer_domain = Some(v);
    }
    if let Some(v) = lookup("CRYPTO_CONFIG_DIR") {
        network.crypto_config_dir = v;
    }
    if let Some(v) = lookup("TEMPLATES_DIR") {
        network.templates_dir = v;
    }
    if let Some(v) = lookup("ENROLL_ID") {
        network.enroll_id = v;
    }
    if let Some(v) = lookup("ENROLL_SECRET") {
        network.enroll_secret = v;
    }
    parse_into(&lookup, "PEER0_PORT", &mut network.peer0_port, &mut errors);
    parse_into(&lookup, "ORDERER_GENERAL_LISTENPORT", &mut network.orderer_port, &mut errors);

    parse_into(&lookup, "INVOKE_RETRY_COUNT", &mut config.invoke.retry_count, &mut errors);
    parse_into(&lookup, "INVOKE_TIMEOUT", &mut config.invoke.commit_timeout_ms, &mut errors);

    if let Some(v) = lookup("DISCOVER_AS_LOCALHOST") {
        config.discovery.as_localhost = v == "true";
    }

    let mut port: u16 = 0;
    parse_into(&lookup, "PORT", &mut port, &mut errors);
    if port != 0 {
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.listener.bind_address = format!("{}:{}", host, port);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn parse_into<F, T>(lookup: &F, key: &str, target: &mut T, errors: &mut Vec<ValidationError>)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(key) {
        match raw.trim().parse() {
            Ok(value) => *target = value,
            Err(_) => errors.push(ValidationError::new(key, format!("cannot parse '{}'", raw))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("ORG", "org2"),
                ("DOMAIN", "acme.io"),
                ("PEER0_PORT", "8051"),
                ("INVOKE_RETRY_COUNT", "5"),
                ("INVOKE_TIMEOUT", "1500"),
                ("PORT", "4000"),
            ]),
        )
        .unwrap();

        assert_eq!(config.network.peer_address(), "peer0.org2.acme.io:8051");
        assert_eq!(config.invoke.retry_count, 5);
        assert_eq!(config.invoke.commit_timeout_ms, 1500);
        assert_eq!(config.listener.bind_address, "0.0.0.0:4000");
    }

    #[test]
    fn test_localhost_flag_only_on_literal_true() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(&mut config, env(&[("DISCOVER_AS_LOCALHOST", "yes")])).unwrap();
        assert!(!config.discovery.as_localhost);

        apply_env_overrides(&mut config, env(&[("DISCOVER_AS_LOCALHOST", "true")])).unwrap();
        assert!(config.discovery.as_localhost);
    }

    #[test]
    fn test_unparseable_override_reported() {
        let mut config = GatewayConfig::default();
        let errors =
            apply_env_overrides(&mut config, env(&[("INVOKE_RETRY_COUNT", "three")])).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "INVOKE_RETRY_COUNT");
        assert_eq!(config.invoke.retry_count, 3);
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Some(Path::new("does/not/exist.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
