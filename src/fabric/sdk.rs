//! Boundary to the permissioned-network SDK.
//!
//! Everything behind these traits (endorsement, ordering, validation, the
//! wire protocol, MSP cryptography) is an external collaborator. The
//! gateway only ever talks to the network through [`NetworkSdk`] and the
//! [`EventHub`] connections it hands out.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::fabric::types::{
    Block, BroadcastResponse, ChaincodeInfo, ChannelCreateRequest, ChannelInfo, ChannelTopology,
    DiscoveryOptions, EndorsedProposal, Identity, LedgerInfo, Organization, PeerRef,
    ProcessedTransaction, ProposalRequest, ProposalResponse, QueryRequest, RegistrationRequest,
    SdkError, TransactionId, TxEvent,
};

/// Delivers the single terminal outcome of a transaction registration.
pub type TxEventReceiver = oneshot::Receiver<Result<TxEvent, SdkError>>;

/// Delivers one item per committed block until the hub disconnects.
pub type BlockEventReceiver = mpsc::Receiver<Result<Block, SdkError>>;

/// Client-side view of the network.
#[async_trait]
pub trait NetworkSdk: Send + Sync + 'static {
    /// Open the credential store and certificate-authority handle.
    async fn init_credential_stores(&self) -> Result<(), SdkError>;

    /// Enroll (log in) with the certificate authority.
    async fn enroll(&self, enrollment_id: &str, secret: &str) -> Result<Identity, SdkError>;

    /// Register a new enrollment id, signed by `registrar`.
    async fn register(
        &self,
        registrar: &Identity,
        request: &RegistrationRequest,
    ) -> Result<(), SdkError>;

    /// Peers of an organization from the connection profile; the client's
    /// own organization when `msp_id` is `None`.
    fn peers_for_org(&self, msp_id: Option<&str>) -> Vec<PeerRef>;

    /// (Re)initialize a channel, optionally running discovery from `anchors`.
    async fn initialize_channel(
        &self,
        channel_id: &str,
        anchors: &[PeerRef],
        options: DiscoveryOptions,
    ) -> Result<ChannelTopology, SdkError>;

    /// Send a proposal to its target peers and collect their responses.
    async fn send_proposal(
        &self,
        channel_id: &str,
        identity: &Identity,
        request: &ProposalRequest,
    ) -> Result<Vec<ProposalResponse>, SdkError>;

    /// Submit an endorsed envelope to the ordering service.
    async fn broadcast(
        &self,
        channel_id: &str,
        identity: &Identity,
        endorsed: &EndorsedProposal,
    ) -> Result<BroadcastResponse, SdkError>;

    /// Evaluate a read-only chaincode function; one payload per target.
    async fn query_by_chaincode(
        &self,
        channel_id: &str,
        identity: &Identity,
        request: &QueryRequest,
    ) -> Result<Vec<Vec<u8>>, SdkError>;

    /// Open an event-hub connection to `peer` on a channel.
    async fn connect_event_hub(
        &self,
        channel_id: &str,
        peer: &PeerRef,
    ) -> Result<Arc<dyn EventHub>, SdkError>;

    async fn query_channels(&self, peer: &PeerRef) -> Result<Vec<ChannelInfo>, SdkError>;

    async fn query_installed_chaincodes(&self, peer: &PeerRef)
        -> Result<Vec<ChaincodeInfo>, SdkError>;

    async fn query_instantiated_chaincodes(
        &self,
        channel_id: &str,
        peer: &PeerRef,
    ) -> Result<Vec<ChaincodeInfo>, SdkError>;

    async fn channel_organizations(&self, channel_id: &str) -> Result<Vec<Organization>, SdkError>;

    async fn query_info(&self, channel_id: &str, peer: &PeerRef) -> Result<LedgerInfo, SdkError>;

    async fn query_block(
        &self,
        channel_id: &str,
        number: u64,
        peer: &PeerRef,
    ) -> Result<Block, SdkError>;

    async fn query_transaction(
        &self,
        channel_id: &str,
        tx_id: &TransactionId,
        peer: &PeerRef,
    ) -> Result<ProcessedTransaction, SdkError>;

    /// Submit a signed channel configuration transaction to the orderer.
    async fn create_channel(
        &self,
        identity: &Identity,
        request: &ChannelCreateRequest,
    ) -> Result<BroadcastResponse, SdkError>;
}

/// One event-subscription connection.
#[async_trait]
pub trait EventHub: Send + Sync {
    /// Register for the commit of one transaction. The receiver yields at
    /// most one item.
    async fn register_tx_event(&self, tx_id: &TransactionId) -> Result<TxEventReceiver, SdkError>;

    /// Register for every block committed from now on.
    async fn register_block_event(&self) -> Result<BlockEventReceiver, SdkError>;

    /// Close the connection. Pending registrations are dropped.
    fn disconnect(&self);
}
