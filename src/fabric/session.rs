//! Network session: one organization, one identity.
//!
//! # Responsibilities
//! - Open the credential store and CA handle
//! - Log in, register (through the configured registrar), or both
//! - Hold the identity every signed request is made with
//! - Expose the organization's peers, the first one being the local peer

use std::sync::{Arc, PoisonError, RwLock};

use crate::config::NetworkConfig;
use crate::fabric::sdk::NetworkSdk;
use crate::fabric::types::{GatewayError, GatewayResult, Identity, PeerRef, RegistrationRequest};

/// Session bound to a single organization of the network.
pub struct NetworkSession {
    sdk: Arc<dyn NetworkSdk>,
    config: NetworkConfig,
    local_peer: PeerRef,
    identity: RwLock<Option<Identity>>,
}

impl NetworkSession {
    /// Create a session; the organization's first peer becomes the local peer.
    pub fn new(sdk: Arc<dyn NetworkSdk>, config: NetworkConfig) -> GatewayResult<Self> {
        let local_peer = sdk
            .peers_for_org(None)
            .into_iter()
            .next()
            .ok_or_else(|| {
                GatewayError::Initialization(format!(
                    "no peers configured for organization {}",
                    config.org
                ))
            })?;

        tracing::info!(
            org = %config.org,
            peer = %local_peer.name,
            "Network session created"
        );

        Ok(Self {
            sdk,
            config,
            local_peer,
            identity: RwLock::new(None),
        })
    }

    /// Open credential storage and the certificate-authority handle.
    pub async fn initialize(&self) -> GatewayResult<()> {
        self.sdk
            .init_credential_stores()
            .await
            .map_err(|e| GatewayError::Initialization(e.to_string()))?;
        tracing::debug!(ca = %self.config.ca_address(), "Credential stores initialized");
        Ok(())
    }

    /// Enroll and bind the resulting identity to this session.
    ///
    /// A session keeps the identity it was first bound to; logging in again
    /// as the same user refreshes it, logging in as another user fails.
    pub async fn login(&self, username: &str, password: &str) -> GatewayResult<Identity> {
        if let Some(current) = self.identity() {
            if current.enrollment_id != username {
                return Err(GatewayError::Authentication(format!(
                    "session already bound to {}",
                    current.enrollment_id
                )));
            }
        }

        let identity = self
            .sdk
            .enroll(username, password)
            .await
            .map_err(|e| GatewayError::Authentication(e.to_string()))?;

        *self.identity.write().unwrap_or_else(PoisonError::into_inner) = Some(identity.clone());
        tracing::info!(enrollment_id = %username, msp_id = %identity.msp_id, "Logged in");
        Ok(identity)
    }

    /// Register a new user through the configured registrar.
    ///
    /// `affiliation` defaults to the session's organization.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        affiliation: Option<&str>,
    ) -> GatewayResult<()> {
        let registrar = self
            .sdk
            .enroll(&self.config.enroll_id, &self.config.enroll_secret)
            .await
            .map_err(|e| {
                GatewayError::Registration(format!(
                    "registrar {} could not enroll: {}",
                    self.config.enroll_id, e
                ))
            })?;

        let request = RegistrationRequest {
            enrollment_id: username.to_string(),
            enrollment_secret: password.to_string(),
            affiliation: affiliation.unwrap_or(&self.config.org).to_string(),
            max_enrollments: -1,
        };

        self.sdk
            .register(&registrar, &request)
            .await
            .map_err(|e| GatewayError::Registration(e.to_string()))?;

        tracing::info!(
            enrollment_id = %username,
            affiliation = %request.affiliation,
            "Registered user"
        );
        Ok(())
    }

    /// Log in, registering the user first if the login fails.
    ///
    /// Only the error of the final step is returned.
    pub async fn login_or_register(
        &self,
        username: &str,
        password: &str,
        affiliation: Option<&str>,
    ) -> GatewayResult<Identity> {
        match self.login(username, password).await {
            Ok(identity) => Ok(identity),
            Err(e) => {
                tracing::debug!(enrollment_id = %username, error = %e, "Login failed, registering");
                self.register(username, password, affiliation).await?;
                self.login(username, password).await
            }
        }
    }

    /// Currently bound identity, if any.
    pub fn identity(&self) -> Option<Identity> {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Bound identity, or an authentication error if nobody logged in.
    pub fn require_identity(&self) -> GatewayResult<Identity> {
        self.identity()
            .ok_or_else(|| GatewayError::Authentication("no identity bound to session".to_string()))
    }

    pub fn local_peer(&self) -> &PeerRef {
        &self.local_peer
    }

    pub fn peers_for_org(&self, msp_id: Option<&str>) -> Vec<PeerRef> {
        self.sdk.peers_for_org(msp_id)
    }

    pub fn organization(&self) -> &str {
        &self.config.org
    }

    pub fn msp_id(&self) -> String {
        self.config.msp_id()
    }

    pub fn network_config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn sdk(&self) -> &Arc<dyn NetworkSdk> {
        &self.sdk
    }
}

impl std::fmt::Debug for NetworkSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkSession")
            .field("org", &self.config.org)
            .field("local_peer", &self.local_peer.name)
            .field("identity", &self.identity().map(|i| i.enrollment_id))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fabric::sim::SimNetwork;

    fn session() -> (SimNetwork, NetworkSession) {
        let config = NetworkConfig::default();
        let sim = SimNetwork::new(&config);
        let session = NetworkSession::new(Arc::new(sim.clone()), config).unwrap();
        (sim, session)
    }

    #[tokio::test]
    async fn test_login_with_registrar_credentials() {
        let (_sim, session) = session();
        session.initialize().await.unwrap();
        let identity = session.login("admin", "adminpw").await.unwrap();
        assert_eq!(identity.msp_id, "org1MSP");
        assert_eq!(session.identity().unwrap().enrollment_id, "admin");
    }

    #[tokio::test]
    async fn test_unknown_user_is_authentication_error() {
        let (_sim, session) = session();
        let err = session.login("mallory", "guess").await.unwrap_err();
        assert!(matches!(err, GatewayError::Authentication(_)));
        assert!(session.identity().is_none());
    }

    #[tokio::test]
    async fn test_login_or_register_registers_new_user() {
        let (sim, session) = session();
        let identity = session.login_or_register("alice", "pw", None).await.unwrap();
        assert_eq!(identity.enrollment_id, "alice");
        assert_eq!(identity.affiliation, "org1");
        assert!(sim.is_registered("alice"));
    }

    #[tokio::test]
    async fn test_duplicate_registration_fails() {
        let (_sim, session) = session();
        session.register("bob", "pw", None).await.unwrap();
        let err = session.register("bob", "pw", None).await.unwrap_err();
        assert!(matches!(err, GatewayError::Registration(_)));
    }

    #[tokio::test]
    async fn test_login_or_register_surfaces_final_error() {
        let (_sim, session) = session();
        session.register("carol", "right", None).await.unwrap();
        // login fails (wrong password), registration fails (duplicate)
        let err = session.login_or_register("carol", "wrong", None).await.unwrap_err();
        assert!(matches!(err, GatewayError::Registration(_)));
    }

    #[tokio::test]
    async fn test_identity_is_fixed_once_bound() {
        let (_sim, session) = session();
        session.login("admin", "adminpw").await.unwrap();
        session.register("dave", "pw", None).await.unwrap();
        let err = session.login("dave", "pw").await.unwrap_err();
        assert!(matches!(err, GatewayError::Authentication(_)));
        assert_eq!(session.identity().unwrap().enrollment_id, "admin");
    }

    #[tokio::test]
    async fn test_broken_credential_store() {
        let (sim, session) = session();
        sim.fail_credential_store(true);
        let err = session.initialize().await.unwrap_err();
        assert!(matches!(err, GatewayError::Initialization(_)));
    }
}
