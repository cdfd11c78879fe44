//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize the session and bind the configured identity
//! - Build the channel cache, pipeline and ledger surface
//! - Start the block relay over every joined channel
//!
//! # Design Decisions
//! - Subsystems initialize in order, not concurrently
//! - The network backend is injected, so tests and dev runs share this path

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::fabric::{
    ChannelCache, GatewayResult, LedgerAdmin, NetworkSdk, NetworkSession, TransactionPipeline,
};
use crate::lifecycle::Shutdown;
use crate::relay::{BlockRelay, ChainBlockPublisher};

/// Everything a request handler needs, built once at startup.
pub struct GatewayContext {
    pub config: Arc<GatewayConfig>,
    pub session: Arc<NetworkSession>,
    pub channels: Arc<ChannelCache>,
    pub pipeline: TransactionPipeline,
    pub admin: LedgerAdmin,
    pub relay: BlockRelay,
    pub shutdown: Arc<Shutdown>,
}

impl GatewayContext {
    pub fn publisher(&self) -> &ChainBlockPublisher {
        self.relay.publisher()
    }
}

/// Build the gateway context on top of `sdk`.
///
/// Logs in with the configured enrollment credentials, registering them
/// first if needed. Relay failures are logged, not returned.
pub async fn bootstrap(
    config: GatewayConfig,
    sdk: Arc<dyn NetworkSdk>,
    shutdown: Arc<Shutdown>,
) -> GatewayResult<GatewayContext> {
    let config = Arc::new(config);

    let session = Arc::new(NetworkSession::new(sdk, config.network.clone())?);
    session.initialize().await?;
    let identity = session
        .login_or_register(&config.network.enroll_id, &config.network.enroll_secret, None)
        .await?;

    let channels = Arc::new(ChannelCache::new(&session, &config.discovery));
    let pipeline = TransactionPipeline::new(session.clone(), channels.clone(), &config.invoke);
    let admin = LedgerAdmin::new(session.clone(), channels.clone());
    let relay = BlockRelay::new(
        session.clone(),
        channels.clone(),
        ChainBlockPublisher::new(config.relay.buffer),
        shutdown.clone(),
    );

    if config.relay.enabled {
        if let Err(e) = relay.start().await {
            tracing::error!(error = %e, "Block relay could not list channels");
        }
    }

    tracing::info!(
        org = %config.network.org,
        peer = %session.local_peer().name,
        enrollment_id = %identity.enrollment_id,
        retry_count = config.invoke.retry_count,
        commit_timeout_ms = config.invoke.commit_timeout_ms,
        "Gateway initialized"
    );

    Ok(GatewayContext {
        config,
        session,
        channels,
        pipeline,
        admin,
        relay,
        shutdown,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fabric::SimNetwork;
    use crate::fabric::GatewayError;

    #[tokio::test]
    async fn test_bootstrap_logs_in_and_relays() {
        let config = GatewayConfig::default();
        let sim = SimNetwork::new(&config.network);
        sim.add_channel("common");

        let ctx = bootstrap(config, Arc::new(sim.clone()), Arc::new(Shutdown::new()))
            .await
            .unwrap();

        assert_eq!(ctx.session.identity().unwrap().enrollment_id, "admin");
        assert!(ctx.relay.is_relaying("common"));
    }

    #[tokio::test]
    async fn test_bootstrap_fails_without_credential_store() {
        let config = GatewayConfig::default();
        let sim = SimNetwork::new(&config.network);
        sim.fail_credential_store(true);

        let err = bootstrap(config, Arc::new(sim), Arc::new(Shutdown::new()))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, GatewayError::Initialization(_)));
    }

    #[tokio::test]
    async fn test_relay_disabled() {
        let mut config = GatewayConfig::default();
        config.relay.enabled = false;
        let sim = SimNetwork::new(&config.network);
        sim.add_channel("common");

        let ctx = bootstrap(config, Arc::new(sim.clone()), Arc::new(Shutdown::new()))
            .await
            .unwrap();
        assert_eq!(ctx.relay.relaying_count(), 0);
        assert_eq!(sim.hub_connections(), 0);
    }
}
