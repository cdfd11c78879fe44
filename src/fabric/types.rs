//! Network-facing types and error definitions.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Validation code of a transaction accepted into the ledger.
pub const TX_VALID: &str = "VALID";

/// Enrolled identity the session signs with.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub enrollment_id: String,
    #[serde(skip_serializing, default)]
    pub secret: String,
    pub affiliation: String,
    pub msp_id: String,
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("enrollment_id", &self.enrollment_id)
            .field("affiliation", &self.affiliation)
            .field("msp_id", &self.msp_id)
            .finish_non_exhaustive()
    }
}

/// Transaction id; a fresh one is generated for every submission attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    /// Generate a new, never-before-used transaction id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TransactionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for TransactionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a peer endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerRef {
    /// Host name, e.g. "peer0.org1.example.com".
    pub name: String,
    /// Endpoint URL, e.g. "grpcs://peer0.org1.example.com:7051".
    pub url: String,
    pub msp_id: String,
}

/// Options applied when (re)initializing a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryOptions {
    pub discover: bool,
    pub as_localhost: bool,
}

/// Topology learned while initializing a channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelTopology {
    pub peers: Vec<PeerRef>,
    pub orderers: Vec<String>,
}

/// A chaincode invocation to be endorsed.
#[derive(Debug, Clone, Serialize)]
pub struct ProposalRequest {
    pub chaincode_id: String,
    pub fcn: String,
    pub args: Vec<String>,
    pub tx_id: TransactionId,
    pub targets: Vec<PeerRef>,
}

/// One peer's answer to a proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalResponse {
    pub peer: String,
    pub status: u16,
    pub message: String,
    pub payload: Vec<u8>,
    pub endorsed: bool,
}

impl ProposalResponse {
    pub fn is_endorsement(&self) -> bool {
        self.endorsed && self.status < 400
    }
}

/// Endorsement responses packaged with the proposal they answer.
#[derive(Debug, Clone)]
pub struct EndorsedProposal {
    pub proposal: ProposalRequest,
    pub responses: Vec<ProposalResponse>,
}

/// Ordering service acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastResponse {
    pub status: String,
    pub info: String,
}

/// A read-only chaincode query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryRequest {
    pub chaincode_id: String,
    pub fcn: String,
    pub args: Vec<String>,
    pub targets: Vec<PeerRef>,
}

/// Commit notification for one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxEvent {
    pub tx_id: TransactionId,
    pub status: String,
    pub block_number: u64,
}

/// A committed block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub channel_id: String,
    pub number: u64,
    pub previous_hash: String,
    pub data_hash: String,
    pub transactions: Vec<BlockTransaction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTransaction {
    pub tx_id: TransactionId,
    pub chaincode_id: String,
    pub fcn: String,
    pub args: Vec<String>,
    pub creator_msp_id: String,
    pub validation_code: String,
}

/// A transaction looked up by id, with the block it landed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedTransaction {
    pub block_number: u64,
    pub transaction: BlockTransaction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub channel_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaincodeInfo {
    pub name: String,
    pub version: String,
    pub path: String,
}

/// Ledger height and tip hashes of a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerInfo {
    pub height: u64,
    pub current_block_hash: String,
    pub previous_block_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub msp_id: String,
}

/// CA registration of a new enrollment id.
#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    pub enrollment_id: String,
    pub enrollment_secret: String,
    pub affiliation: String,
    /// `-1` means unlimited.
    pub max_enrollments: i32,
}

/// A signed request to create a channel from a pre-built configuration transaction.
#[derive(Debug, Clone)]
pub struct ChannelCreateRequest {
    pub channel_id: String,
    pub tx_id: TransactionId,
    pub config_tx: Vec<u8>,
    pub orderer_url: String,
    /// Orderer TLS CA certificate, PEM encoded.
    pub orderer_tls_pem: String,
}

/// A chaincode invocation as requested by a caller.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeRequest {
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub chaincode_id: String,
    pub fcn: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Peer names; the local peer when absent.
    #[serde(default)]
    pub targets: Option<Vec<String>>,
    #[serde(default)]
    pub wait_for_transaction_event: bool,
}

/// Outcome of a successful invoke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeResult {
    pub txid: TransactionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
}

/// Errors raised by the network SDK boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SdkError {
    /// Endpoint unreachable or connection dropped.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The remote side refused the request.
    #[error("rejected: {0}")]
    Rejected(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

/// Errors surfaced by the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Credential store or CA handle could not be set up.
    #[error("initialization failed: {0}")]
    Initialization(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("registration failed: {0}")]
    Registration(String),

    /// Endorsement rejected or insufficient.
    #[error("proposal rejected: {0}")]
    Proposal(String),

    /// Ordering service refused the envelope.
    #[error("broadcast rejected: {0}")]
    Broadcast(String),

    #[error("timed out waiting for transaction {tx_id} after {timeout_ms} ms")]
    CommitTimeout { tx_id: TransactionId, timeout_ms: u64 },

    #[error("event hub error: {0}")]
    EventHub(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("channel error: {0}")]
    Channel(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Every attempt of an invoke failed; carries the last cause.
    #[error("transaction failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<GatewayError>,
    },
}

impl GatewayError {
    /// Map an SDK error from a read path, keeping not-found distinct.
    pub fn from_query(e: SdkError) -> Self {
        match e {
            SdkError::NotFound(what) => GatewayError::NotFound(what),
            other => GatewayError::Query(other.to_string()),
        }
    }
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
