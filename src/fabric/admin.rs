//! Ledger queries and channel administration.
//!
//! None of these calls are retried; errors propagate to the caller as-is.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::fabric::channel::ChannelCache;
use crate::fabric::session::NetworkSession;
use crate::fabric::types::{
    Block, ChaincodeInfo, ChannelCreateRequest, ChannelInfo, GatewayError, GatewayResult,
    LedgerInfo, Organization, PeerRef, ProcessedTransaction, TransactionId,
};

/// Read-only ledger surface plus channel creation.
pub struct LedgerAdmin {
    session: Arc<NetworkSession>,
    channels: Arc<ChannelCache>,
}

impl LedgerAdmin {
    pub fn new(session: Arc<NetworkSession>, channels: Arc<ChannelCache>) -> Self {
        Self { session, channels }
    }

    /// Channels the local peer has joined.
    pub async fn query_channels(&self) -> GatewayResult<Vec<ChannelInfo>> {
        self.session
            .sdk()
            .query_channels(self.session.local_peer())
            .await
            .map_err(GatewayError::from_query)
    }

    pub async fn query_installed_chaincodes(&self) -> GatewayResult<Vec<ChaincodeInfo>> {
        self.session
            .sdk()
            .query_installed_chaincodes(self.session.local_peer())
            .await
            .map_err(GatewayError::from_query)
    }

    pub async fn query_instantiated_chaincodes(
        &self,
        channel_id: &str,
    ) -> GatewayResult<Vec<ChaincodeInfo>> {
        let channel = self.channels.get_channel(channel_id).await?;
        self.session
            .sdk()
            .query_instantiated_chaincodes(channel.id(), self.session.local_peer())
            .await
            .map_err(GatewayError::from_query)
    }

    pub async fn get_organizations(&self, channel_id: &str) -> GatewayResult<Vec<Organization>> {
        let channel = self.channels.get_channel(channel_id).await?;
        self.session
            .sdk()
            .channel_organizations(channel.id())
            .await
            .map_err(GatewayError::from_query)
    }

    /// Peers of the local organization known on a channel.
    pub async fn peers_for_org_on_channel(&self, channel_id: &str) -> GatewayResult<Vec<PeerRef>> {
        let channel = self.channels.get_channel(channel_id).await?;
        Ok(channel.peers_for_org(&self.session.msp_id()))
    }

    pub async fn query_info(&self, channel_id: &str) -> GatewayResult<LedgerInfo> {
        let channel = self.channels.get_channel(channel_id).await?;
        self.session
            .sdk()
            .query_info(channel.id(), self.session.local_peer())
            .await
            .map_err(GatewayError::from_query)
    }

    pub async fn query_block(&self, channel_id: &str, number: u64) -> GatewayResult<Block> {
        let channel = self.channels.get_channel(channel_id).await?;
        self.session
            .sdk()
            .query_block(channel.id(), number, self.session.local_peer())
            .await
            .map_err(GatewayError::from_query)
    }

    pub async fn query_transaction(
        &self,
        channel_id: &str,
        tx_id: &TransactionId,
    ) -> GatewayResult<ProcessedTransaction> {
        let channel = self.channels.get_channel(channel_id).await?;
        self.session
            .sdk()
            .query_transaction(channel.id(), tx_id, self.session.local_peer())
            .await
            .map_err(GatewayError::from_query)
    }

    /// Create a channel from a pre-built configuration transaction.
    ///
    /// An empty `config_tx` falls back to `<templates_dir>/<channel>.tx`.
    pub async fn create_channel(
        &self,
        channel_id: &str,
        config_tx: Vec<u8>,
    ) -> GatewayResult<TransactionId> {
        if channel_id.is_empty() {
            return Err(GatewayError::InvalidRequest("channel id is empty".to_string()));
        }
        let identity = self.session.require_identity()?;
        let network = self.session.network_config();

        let config_tx = if config_tx.is_empty() {
            let path = self.channel_template_path(channel_id);
            fs::read(&path).map_err(|e| {
                GatewayError::InvalidRequest(format!(
                    "no channel configuration given and {} unreadable: {}",
                    path.display(),
                    e
                ))
            })?
        } else {
            config_tx
        };

        let request = ChannelCreateRequest {
            channel_id: channel_id.to_string(),
            tx_id: TransactionId::generate(),
            config_tx,
            orderer_url: network.orderer_url(),
            orderer_tls_pem: load_orderer_tls(Path::new(&network.orderer_tls_cert_path()))?,
        };

        let ack = self
            .session
            .sdk()
            .create_channel(&identity, &request)
            .await
            .map_err(|e| GatewayError::Channel(format!("create {}: {}", channel_id, e)))?;
        if ack.status != "SUCCESS" {
            return Err(GatewayError::Channel(format!(
                "create {}: {} {}",
                channel_id, ack.status, ack.info
            )));
        }

        tracing::info!(channel = %channel_id, tx_id = %request.tx_id, "Channel created");
        Ok(request.tx_id)
    }

    fn channel_template_path(&self, channel_id: &str) -> PathBuf {
        Path::new(&self.session.network_config().templates_dir).join(format!("{}.tx", channel_id))
    }
}

/// Read the orderer TLS CA bundle, checking it holds at least one certificate.
pub fn load_orderer_tls(path: &Path) -> GatewayResult<String> {
    let pem = fs::read_to_string(path).map_err(|e| {
        GatewayError::Channel(format!("orderer TLS certificate {}: {}", path.display(), e))
    })?;

    let certs = rustls_pemfile::certs(&mut pem.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            GatewayError::Channel(format!("orderer TLS certificate {}: {}", path.display(), e))
        })?;
    if certs.is_empty() {
        return Err(GatewayError::Channel(format!(
            "no certificates found in {}",
            path.display()
        )));
    }

    tracing::debug!(path = %path.display(), certificates = certs.len(), "Loaded orderer TLS material");
    Ok(pem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DiscoveryConfig, NetworkConfig};
    use crate::fabric::sim::SimNetwork;

    const TEST_PEM: &str = "-----BEGIN CERTIFICATE-----\nMIIBszCCAVmgAwIBAgIQ\n-----END CERTIFICATE-----\n";

    fn crypto_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("fabric-gateway-{}-{}", name, std::process::id()));
        let tls = dir.join("ordererOrganizations/example.com/msp/tlscacerts");
        fs::create_dir_all(&tls).unwrap();
        fs::write(tls.join("tlsca.example.com-cert.pem"), TEST_PEM).unwrap();
        dir
    }

    async fn admin(config: NetworkConfig) -> (SimNetwork, LedgerAdmin) {
        let sim = SimNetwork::new(&config);
        sim.add_channel("common");
        let session = Arc::new(NetworkSession::new(Arc::new(sim.clone()), config).unwrap());
        session.login("admin", "adminpw").await.unwrap();
        let channels = Arc::new(ChannelCache::new(&session, &DiscoveryConfig::default()));
        (sim, LedgerAdmin::new(session, channels))
    }

    #[tokio::test]
    async fn test_ledger_queries() {
        let (sim, admin) = admin(NetworkConfig::default()).await;
        sim.emit_block("common");

        let channels = admin.query_channels().await.unwrap();
        assert_eq!(channels, vec![ChannelInfo { channel_id: "common".to_string() }]);

        let info = admin.query_info("common").await.unwrap();
        assert_eq!(info.height, 2);

        let block = admin.query_block("common", 1).await.unwrap();
        assert_eq!(block.number, 1);
        assert_eq!(block.channel_id, "common");

        let orgs = admin.get_organizations("common").await.unwrap();
        assert_eq!(orgs[0].msp_id, "org1MSP");

        assert!(!admin.query_installed_chaincodes().await.unwrap().is_empty());
        assert_eq!(admin.query_instantiated_chaincodes("common").await.unwrap()[0].name, "kv");
    }

    #[tokio::test]
    async fn test_peers_for_own_org() {
        let (_sim, admin) = admin(NetworkConfig::default()).await;
        let peers = admin.peers_for_org_on_channel("common").await.unwrap();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].name, "peer0.org1.example.com");

        let err = admin.peers_for_org_on_channel("nope").await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_block_is_not_found() {
        let (_sim, admin) = admin(NetworkConfig::default()).await;
        let err = admin.query_block("common", 99).await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));

        let err = admin
            .query_transaction("common", &TransactionId::generate())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_create_channel() {
        let dir = crypto_dir("create");
        let config = NetworkConfig {
            crypto_config_dir: dir.to_string_lossy().into_owned(),
            ..NetworkConfig::default()
        };
        let (sim, admin) = admin(config).await;

        admin.create_channel("fresh", b"config-envelope".to_vec()).await.unwrap();
        assert!(sim.has_channel("fresh"));

        let err = admin.create_channel("fresh", b"config-envelope".to_vec()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Channel(_)));

        fs::remove_dir_all(dir).unwrap_or_default();
    }

    #[tokio::test]
    async fn test_create_channel_without_tls_material() {
        let config = NetworkConfig {
            crypto_config_dir: "/nonexistent/crypto".to_string(),
            ..NetworkConfig::default()
        };
        let (_sim, admin) = admin(config).await;
        let err = admin.create_channel("fresh", b"tx".to_vec()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Channel(_)));
    }

    #[test]
    fn test_pem_without_certificates() {
        let path = std::env::temp_dir().join(format!("empty-{}.pem", std::process::id()));
        fs::write(&path, "not a pem").unwrap();
        assert!(load_orderer_tls(&path).is_err());
        fs::remove_file(path).unwrap_or_default();
    }
}
