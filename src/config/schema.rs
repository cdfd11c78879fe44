//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Organization, peer and orderer connection profile.
    pub network: NetworkConfig,

    /// Transaction submission settings.
    pub invoke: InvokeConfig,

    /// Channel discovery settings.
    pub discovery: DiscoveryConfig,

    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Block relay settings.
    pub relay: RelayConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Connection profile for one organization.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Organization name (e.g., "org1").
    pub org: String,

    /// Network domain (e.g., "example.com").
    pub domain: String,

    /// Port of the organization's first peer.
    pub peer0_port: u16,

    /// Orderer host name.
    pub orderer_name: String,

    /// Orderer domain; falls back to `domain` when unset.
    pub orderer_domain: Option<String>,

    /// Orderer listen port.
    pub orderer_port: u16,

    /// Root of the crypto material tree.
    pub crypto_config_dir: String,

    /// Directory holding pre-built channel configuration transactions.
    pub templates_dir: String,

    /// Registrar enrollment id.
    pub enroll_id: String,

    /// Registrar enrollment secret.
    pub enroll_secret: String,

    /// MSP id; defaults to `<org>MSP`.
    pub msp_id: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            org: "org1".to_string(),
            domain: "example.com".to_string(),
            peer0_port: 7051,
            orderer_name: "orderer".to_string(),
            orderer_domain: None,
            orderer_port: 7050,
            crypto_config_dir: "../fabric-starter/crypto-config".to_string(),
            templates_dir: "/etc/hyperledger/templates".to_string(),
            enroll_id: "admin".to_string(),
            enroll_secret: "adminpw".to_string(),
            msp_id: None,
        }
    }
}

impl NetworkConfig {
    /// Domain the orderer lives under.
    pub fn orderer_domain(&self) -> &str {
        self.orderer_domain.as_deref().unwrap_or(&self.domain)
    }

    /// MSP id of the organization.
    pub fn msp_id(&self) -> String {
        self.msp_id
            .clone()
            .unwrap_or_else(|| format!("{}MSP", self.org))
    }

    /// Host and port of the organization's first peer.
    pub fn peer_address(&self) -> String {
        format!("peer0.{}.{}:{}", self.org, self.domain, self.peer0_port)
    }

    /// Host and port of the organization's certificate authority.
    pub fn ca_address(&self) -> String {
        format!("ca.{}.{}:7054", self.org, self.domain)
    }

    /// Host and port of the ordering service.
    pub fn orderer_address(&self) -> String {
        format!(
            "{}.{}:{}",
            self.orderer_name,
            self.orderer_domain(),
            self.orderer_port
        )
    }

    pub fn peer_url(&self) -> String {
        format!("grpcs://{}", self.peer_address())
    }

    pub fn orderer_url(&self) -> String {
        format!("grpcs://{}", self.orderer_address())
    }

    /// Path of the orderer's TLS CA certificate (PEM).
    pub fn orderer_tls_cert_path(&self) -> String {
        let od = self.orderer_domain();
        format!(
            "{}/ordererOrganizations/{}/msp/tlscacerts/tlsca.{}-cert.pem",
            self.crypto_config_dir, od, od
        )
    }

    /// Crypto material directory of the given peer organization.
    pub fn org_crypto_dir(&self, org: &str) -> String {
        format!(
            "{}/peerOrganizations/{}.{}",
            self.crypto_config_dir, org, self.domain
        )
    }
}

/// Transaction submission configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InvokeConfig {
    /// Maximum number of attempts per invoke call.
    pub retry_count: u32,

    /// Delay between attempts in milliseconds.
    pub retry_delay_ms: u64,

    /// Grow the delay exponentially (with jitter) instead of keeping it fixed.
    pub exponential_backoff: bool,

    /// Upper bound for exponential back-off in milliseconds.
    pub max_delay_ms: u64,

    /// How long to wait for a commit event in milliseconds.
    pub commit_timeout_ms: u64,
}

impl Default for InvokeConfig {
    fn default() -> Self {
        Self {
            retry_count: 3,
            retry_delay_ms: 3000,
            exponential_backoff: false,
            max_delay_ms: 30_000,
            commit_timeout_ms: 60_000,
        }
    }
}

impl InvokeConfig {
    /// Longest an invoke can run when every attempt waits out its commit
    /// timeout. Exponential delays are counted with their full jitter.
    pub fn worst_case_ms(&self) -> u64 {
        let attempts = u64::from(self.retry_count.max(1));
        let delays: u64 = (1..attempts)
            .map(|failed| {
                if self.exponential_backoff {
                    let exp = 2u64.saturating_pow((failed - 1).min(63) as u32);
                    let capped = self.retry_delay_ms.saturating_mul(exp).min(self.max_delay_ms);
                    capped + capped / 10
                } else {
                    self.retry_delay_ms
                }
            })
            .fold(0, u64::saturating_add);
        attempts
            .saturating_mul(self.commit_timeout_ms)
            .saturating_add(delays)
    }
}

/// Channel discovery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Learn peer/orderer topology dynamically.
    pub enabled: bool,

    /// Rewrite discovered endpoints to localhost (local multi-process topologies only).
    pub as_localhost: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            as_localhost: false,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Request timeout in seconds. Raised to the worst-case invoke time
    /// when that is longer.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            tls: None,
            request_timeout_secs: 120,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Block relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Relay committed blocks to socket listeners.
    pub enabled: bool,

    /// Events buffered per listener before it starts lagging.
    pub buffer: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            buffer: 1024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_addresses() {
        let network = NetworkConfig::default();
        assert_eq!(network.peer_address(), "peer0.org1.example.com:7051");
        assert_eq!(network.ca_address(), "ca.org1.example.com:7054");
        assert_eq!(network.orderer_address(), "orderer.example.com:7050");
        assert_eq!(network.msp_id(), "org1MSP");
        assert!(network
            .orderer_tls_cert_path()
            .ends_with("ordererOrganizations/example.com/msp/tlscacerts/tlsca.example.com-cert.pem"));
    }

    #[test]
    fn test_orderer_domain_override() {
        let network = NetworkConfig {
            orderer_domain: Some("orderers.net".to_string()),
            ..NetworkConfig::default()
        };
        assert_eq!(network.orderer_address(), "orderer.orderers.net:7050");
    }

    #[test]
    fn test_partial_toml() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [invoke]
            retry_count = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.invoke.retry_count, 5);
        assert_eq!(config.invoke.commit_timeout_ms, 60_000);
        assert!(config.discovery.enabled);
        assert!(!config.discovery.as_localhost);
    }

    #[test]
    fn test_invoke_worst_case() {
        assert_eq!(InvokeConfig::default().worst_case_ms(), 186_000);

        let single = InvokeConfig {
            retry_count: 1,
            ..InvokeConfig::default()
        };
        assert_eq!(single.worst_case_ms(), 60_000);

        let exponential = InvokeConfig {
            retry_count: 4,
            retry_delay_ms: 100,
            max_delay_ms: 300,
            exponential_backoff: true,
            commit_timeout_ms: 1000,
        };
        // delays 100, 200, 300 (capped), each plus 10%
        assert_eq!(exponential.worst_case_ms(), 4000 + 110 + 220 + 330);
    }
}
