//! SimNetwork: in-process simulated network for development and testing.
//!
//! Mirrors the observable behaviour of a single-organization network: a CA
//! with a registrar, one peer running a key/value chaincode (`kv`), and an
//! ordering service that cuts one block per transaction after a configurable
//! delay. Faults can be injected (endorsement failures, broadcast
//! rejections, hub errors, slow commits) and every boundary call is counted.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::config::NetworkConfig;
use crate::fabric::sdk::{BlockEventReceiver, EventHub, NetworkSdk, TxEventReceiver};
use crate::fabric::types::{
    Block, BlockTransaction, BroadcastResponse, ChaincodeInfo, ChannelCreateRequest, ChannelInfo,
    ChannelTopology, DiscoveryOptions, EndorsedProposal, Identity, LedgerInfo, Organization,
    PeerRef, ProcessedTransaction, ProposalRequest, ProposalResponse, QueryRequest,
    RegistrationRequest, SdkError, TransactionId, TxEvent, TX_VALID,
};

/// The chaincode every simulated channel runs.
pub const SIM_CHAINCODE: &str = "kv";

const DEFAULT_COMMIT_DELAY: Duration = Duration::from_millis(5);

/// Simulated network. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SimNetwork {
    inner: Arc<SimInner>,
}

struct SimInner {
    msp_id: String,
    peer: PeerRef,
    peer_port: u16,
    orderer_url: String,
    orderer_port: u16,
    state: Mutex<SimState>,
}

struct SimUser {
    secret: String,
    affiliation: String,
    registrar: bool,
}

struct SimLedger {
    blocks: Vec<Block>,
    hashes: Vec<String>,
    world: HashMap<String, String>,
    tx_index: HashMap<TransactionId, u64>,
    events: broadcast::Sender<Block>,
    initializations: u64,
}

#[derive(Default)]
struct Faults {
    failing_proposals: u32,
    failing_broadcasts: u32,
    failing_inits: u32,
    hub_error: bool,
    credential_store: bool,
    init_delay: Duration,
}

#[derive(Default)]
struct Stats {
    proposal_tx_ids: Vec<TransactionId>,
    broadcasts: u64,
    hub_connections: u64,
    hub_disconnects: u64,
    tx_registrations: u64,
    block_registrations: u64,
}

struct SimState {
    users: HashMap<String, SimUser>,
    channels: HashMap<String, SimLedger>,
    commit_delay: Duration,
    faults: Faults,
    stats: Stats,
}

impl SimNetwork {
    /// Network for the organization described by `config`; the configured
    /// enrollment id/secret is the CA registrar.
    pub fn new(config: &NetworkConfig) -> Self {
        let msp_id = config.msp_id();
        let peer = PeerRef {
            name: format!("peer0.{}.{}", config.org, config.domain),
            url: config.peer_url(),
            msp_id: msp_id.clone(),
        };

        let mut users = HashMap::new();
        users.insert(
            config.enroll_id.clone(),
            SimUser {
                secret: config.enroll_secret.clone(),
                affiliation: config.org.clone(),
                registrar: true,
            },
        );

        Self {
            inner: Arc::new(SimInner {
                msp_id,
                peer,
                peer_port: config.peer0_port,
                orderer_url: config.orderer_url(),
                orderer_port: config.orderer_port,
                state: Mutex::new(SimState {
                    users,
                    channels: HashMap::new(),
                    commit_delay: DEFAULT_COMMIT_DELAY,
                    faults: Faults::default(),
                    stats: Stats::default(),
                }),
            }),
        }
    }

    /// Join the peer to a new channel with a genesis block.
    pub fn add_channel(&self, channel_id: &str) {
        let mut state = self.inner.state();
        if state.channels.contains_key(channel_id) {
            return;
        }
        let (events, _) = broadcast::channel(256);
        let mut ledger = SimLedger {
            blocks: Vec::new(),
            hashes: Vec::new(),
            world: HashMap::new(),
            tx_index: HashMap::new(),
            events,
            initializations: 0,
        };
        ledger.append(channel_id, Vec::new());
        state.channels.insert(channel_id.to_string(), ledger);
        tracing::debug!(channel = %channel_id, "Simulated channel created");
    }

    pub fn has_channel(&self, channel_id: &str) -> bool {
        self.inner.state().channels.contains_key(channel_id)
    }

    pub fn is_registered(&self, enrollment_id: &str) -> bool {
        self.inner.state().users.contains_key(enrollment_id)
    }

    /// Commit an empty block on a channel and return its number.
    pub fn emit_block(&self, channel_id: &str) -> Option<u64> {
        self.inner.commit(channel_id, Vec::new())
    }

    /// The next `n` proposals are answered with a chaincode error.
    pub fn fail_next_proposals(&self, n: u32) {
        self.inner.state().faults.failing_proposals = n;
    }

    /// The next `n` broadcasts are refused by the orderer.
    pub fn fail_next_broadcasts(&self, n: u32) {
        self.inner.state().faults.failing_broadcasts = n;
    }

    /// The next `n` channel initializations fail as if the peer were down.
    pub fn fail_next_initializations(&self, n: u32) {
        self.inner.state().faults.failing_inits = n;
    }

    /// Delay between an accepted broadcast and its block being committed.
    pub fn set_commit_delay(&self, delay: Duration) {
        self.inner.state().commit_delay = delay;
    }

    /// Delay applied to every channel initialization.
    pub fn set_init_delay(&self, delay: Duration) {
        self.inner.state().faults.init_delay = delay;
    }

    /// Make every event registration fail with a hub error.
    pub fn fail_event_hub(&self, fail: bool) {
        self.inner.state().faults.hub_error = fail;
    }

    pub fn fail_credential_store(&self, fail: bool) {
        self.inner.state().faults.credential_store = fail;
    }

    /// Transaction ids of every proposal received, in order.
    pub fn proposal_tx_ids(&self) -> Vec<TransactionId> {
        self.inner.state().stats.proposal_tx_ids.clone()
    }

    pub fn broadcast_count(&self) -> u64 {
        self.inner.state().stats.broadcasts
    }

    pub fn hub_connections(&self) -> u64 {
        self.inner.state().stats.hub_connections
    }

    /// Raw `disconnect` calls received by event hubs.
    pub fn hub_disconnects(&self) -> u64 {
        self.inner.state().stats.hub_disconnects
    }

    pub fn tx_registrations(&self) -> u64 {
        self.inner.state().stats.tx_registrations
    }

    pub fn block_registrations(&self) -> u64 {
        self.inner.state().stats.block_registrations
    }

    pub fn channel_initializations(&self, channel_id: &str) -> u64 {
        self.inner
            .state()
            .channels
            .get(channel_id)
            .map(|l| l.initializations)
            .unwrap_or(0)
    }
}

impl SimInner {
    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cut a block holding `transactions`, apply their writes and notify
    /// subscribers.
    fn commit(&self, channel_id: &str, transactions: Vec<BlockTransaction>) -> Option<u64> {
        let mut state = self.state();
        let ledger = state.channels.get_mut(channel_id)?;
        for tx in &transactions {
            apply_writes(&mut ledger.world, tx);
        }
        let block = ledger.append(channel_id, transactions);
        let number = block.number;
        // no subscribers is fine
        let _ = ledger.events.send(block);
        Some(number)
    }
}

impl SimLedger {
    fn append(&mut self, channel_id: &str, transactions: Vec<BlockTransaction>) -> Block {
        let number = self.blocks.len() as u64;
        let previous_hash = self.hashes.last().cloned().unwrap_or_default();
        let data_hash = digest(&transactions.iter().map(|t| t.tx_id.as_str()).collect::<Vec<_>>());
        for tx in &transactions {
            self.tx_index.insert(tx.tx_id.clone(), number);
        }
        let block = Block {
            channel_id: channel_id.to_string(),
            number,
            previous_hash: previous_hash.clone(),
            data_hash: data_hash.clone(),
            transactions,
        };
        self.hashes.push(digest(&(number, previous_hash, data_hash)));
        self.blocks.push(block.clone());
        block
    }
}

fn digest<T: Hash>(value: &T) -> String {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

fn apply_writes(world: &mut HashMap<String, String>, tx: &BlockTransaction) {
    if tx.chaincode_id != SIM_CHAINCODE || tx.validation_code != TX_VALID {
        return;
    }
    match (tx.fcn.as_str(), tx.args.as_slice()) {
        ("put", [key, value]) => {
            world.insert(key.clone(), value.clone());
        }
        ("delete", [key]) => {
            world.remove(key);
        }
        _ => {}
    }
}

/// Simulate the `kv` chaincode; returns the payload or an error message.
fn execute(
    world: &HashMap<String, String>,
    chaincode_id: &str,
    fcn: &str,
    args: &[String],
) -> Result<Vec<u8>, String> {
    if chaincode_id != SIM_CHAINCODE {
        return Err(format!("chaincode {} is not instantiated", chaincode_id));
    }
    match (fcn, args) {
        ("put", [_, value]) => Ok(value.as_bytes().to_vec()),
        ("delete", [_]) => Ok(Vec::new()),
        ("get", [key]) => Ok(world.get(key).map(|v| v.as_bytes().to_vec()).unwrap_or_default()),
        ("put", _) | ("delete", _) | ("get", _) => {
            Err(format!("incorrect number of arguments for {}: {}", fcn, args.len()))
        }
        _ => Err(format!("unknown function {}", fcn)),
    }
}

fn localhost(url: &str, port: u16) -> String {
    let scheme = url.split("://").next().unwrap_or("grpcs");
    format!("{}://localhost:{}", scheme, port)
}

#[async_trait]
impl NetworkSdk for SimNetwork {
    async fn init_credential_stores(&self) -> Result<(), SdkError> {
        if self.inner.state().faults.credential_store {
            return Err(SdkError::Unavailable("credential store cannot be opened".to_string()));
        }
        Ok(())
    }

    async fn enroll(&self, enrollment_id: &str, secret: &str) -> Result<Identity, SdkError> {
        let state = self.inner.state();
        match state.users.get(enrollment_id) {
            Some(user) if user.secret == secret => Ok(Identity {
                enrollment_id: enrollment_id.to_string(),
                secret: secret.to_string(),
                affiliation: user.affiliation.clone(),
                msp_id: self.inner.msp_id.clone(),
            }),
            _ => Err(SdkError::Unauthorized(format!(
                "enrollment failed for {}",
                enrollment_id
            ))),
        }
    }

    async fn register(
        &self,
        registrar: &Identity,
        request: &RegistrationRequest,
    ) -> Result<(), SdkError> {
        let mut state = self.inner.state();
        let authorized = state
            .users
            .get(&registrar.enrollment_id)
            .map(|u| u.registrar && u.secret == registrar.secret)
            .unwrap_or(false);
        if !authorized {
            return Err(SdkError::Unauthorized(format!(
                "{} may not register identities",
                registrar.enrollment_id
            )));
        }
        if state.users.contains_key(&request.enrollment_id) {
            return Err(SdkError::Rejected(format!(
                "identity {} is already registered",
                request.enrollment_id
            )));
        }
        state.users.insert(
            request.enrollment_id.clone(),
            SimUser {
                secret: request.enrollment_secret.clone(),
                affiliation: request.affiliation.clone(),
                registrar: false,
            },
        );
        Ok(())
    }

    fn peers_for_org(&self, msp_id: Option<&str>) -> Vec<PeerRef> {
        match msp_id {
            None => vec![self.inner.peer.clone()],
            Some(id) if id == self.inner.msp_id => vec![self.inner.peer.clone()],
            Some(_) => Vec::new(),
        }
    }

    async fn initialize_channel(
        &self,
        channel_id: &str,
        anchors: &[PeerRef],
        options: DiscoveryOptions,
    ) -> Result<ChannelTopology, SdkError> {
        let delay = self.inner.state().faults.init_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.inner.state();
        if state.faults.failing_inits > 0 {
            state.faults.failing_inits -= 1;
            return Err(SdkError::Unavailable(format!("peer {}", self.inner.peer.name)));
        }
        let ledger = state
            .channels
            .get_mut(channel_id)
            .ok_or_else(|| SdkError::NotFound(format!("channel {}", channel_id)))?;
        ledger.initializations += 1;

        if !options.discover {
            return Ok(ChannelTopology {
                peers: anchors.to_vec(),
                orderers: vec![self.inner.orderer_url.clone()],
            });
        }

        let mut peer = self.inner.peer.clone();
        let mut orderer = self.inner.orderer_url.clone();
        if options.as_localhost {
            peer.url = localhost(&peer.url, self.inner.peer_port);
            orderer = localhost(&orderer, self.inner.orderer_port);
        }
        Ok(ChannelTopology {
            peers: vec![peer],
            orderers: vec![orderer],
        })
    }

    async fn send_proposal(
        &self,
        channel_id: &str,
        _identity: &Identity,
        request: &ProposalRequest,
    ) -> Result<Vec<ProposalResponse>, SdkError> {
        let mut state = self.inner.state();
        state.stats.proposal_tx_ids.push(request.tx_id.clone());

        let injected = state.faults.failing_proposals > 0;
        if injected {
            state.faults.failing_proposals -= 1;
        }
        let ledger = state
            .channels
            .get(channel_id)
            .ok_or_else(|| SdkError::NotFound(format!("channel {}", channel_id)))?;

        let outcome = if injected {
            Err("simulated endorsement failure".to_string())
        } else {
            execute(&ledger.world, &request.chaincode_id, &request.fcn, &request.args)
        };

        Ok(request
            .targets
            .iter()
            .map(|peer| match &outcome {
                Ok(payload) => ProposalResponse {
                    peer: peer.name.clone(),
                    status: 200,
                    message: "OK".to_string(),
                    payload: payload.clone(),
                    endorsed: true,
                },
                Err(message) => ProposalResponse {
                    peer: peer.name.clone(),
                    status: 500,
                    message: message.clone(),
                    payload: Vec::new(),
                    endorsed: false,
                },
            })
            .collect())
    }

    async fn broadcast(
        &self,
        channel_id: &str,
        identity: &Identity,
        endorsed: &EndorsedProposal,
    ) -> Result<BroadcastResponse, SdkError> {
        let delay = {
            let mut state = self.inner.state();
            state.stats.broadcasts += 1;
            if state.faults.failing_broadcasts > 0 {
                state.faults.failing_broadcasts -= 1;
                return Err(SdkError::Rejected("SERVICE_UNAVAILABLE".to_string()));
            }
            if !state.channels.contains_key(channel_id) {
                return Err(SdkError::NotFound(format!("channel {}", channel_id)));
            }
            state.commit_delay
        };

        let proposal = &endorsed.proposal;
        let tx = BlockTransaction {
            tx_id: proposal.tx_id.clone(),
            chaincode_id: proposal.chaincode_id.clone(),
            fcn: proposal.fcn.clone(),
            args: proposal.args.clone(),
            creator_msp_id: identity.msp_id.clone(),
            validation_code: TX_VALID.to_string(),
        };

        let inner = self.inner.clone();
        let channel_id = channel_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.commit(&channel_id, vec![tx]);
        });

        Ok(BroadcastResponse {
            status: "SUCCESS".to_string(),
            info: String::new(),
        })
    }

    async fn query_by_chaincode(
        &self,
        channel_id: &str,
        _identity: &Identity,
        request: &QueryRequest,
    ) -> Result<Vec<Vec<u8>>, SdkError> {
        let state = self.inner.state();
        let ledger = state
            .channels
            .get(channel_id)
            .ok_or_else(|| SdkError::NotFound(format!("channel {}", channel_id)))?;
        let payload = execute(&ledger.world, &request.chaincode_id, &request.fcn, &request.args)
            .map_err(SdkError::Rejected)?;
        Ok(request.targets.iter().map(|_| payload.clone()).collect())
    }

    async fn connect_event_hub(
        &self,
        channel_id: &str,
        _peer: &PeerRef,
    ) -> Result<Arc<dyn EventHub>, SdkError> {
        let mut state = self.inner.state();
        if !state.channels.contains_key(channel_id) {
            return Err(SdkError::NotFound(format!("channel {}", channel_id)));
        }
        state.stats.hub_connections += 1;
        let (stop, _) = watch::channel(false);
        Ok(Arc::new(SimEventHub {
            inner: self.inner.clone(),
            channel_id: channel_id.to_string(),
            stop,
            connected: AtomicBool::new(true),
        }))
    }

    async fn query_channels(&self, _peer: &PeerRef) -> Result<Vec<ChannelInfo>, SdkError> {
        let state = self.inner.state();
        let mut channels: Vec<ChannelInfo> = state
            .channels
            .keys()
            .map(|id| ChannelInfo {
                channel_id: id.clone(),
            })
            .collect();
        channels.sort_by(|a, b| a.channel_id.cmp(&b.channel_id));
        Ok(channels)
    }

    async fn query_installed_chaincodes(
        &self,
        _peer: &PeerRef,
    ) -> Result<Vec<ChaincodeInfo>, SdkError> {
        Ok(vec![sim_chaincode()])
    }

    async fn query_instantiated_chaincodes(
        &self,
        channel_id: &str,
        _peer: &PeerRef,
    ) -> Result<Vec<ChaincodeInfo>, SdkError> {
        if !self.has_channel(channel_id) {
            return Err(SdkError::NotFound(format!("channel {}", channel_id)));
        }
        Ok(vec![sim_chaincode()])
    }

    async fn channel_organizations(&self, channel_id: &str) -> Result<Vec<Organization>, SdkError> {
        if !self.has_channel(channel_id) {
            return Err(SdkError::NotFound(format!("channel {}", channel_id)));
        }
        Ok(vec![Organization {
            msp_id: self.inner.msp_id.clone(),
        }])
    }

    async fn query_info(&self, channel_id: &str, _peer: &PeerRef) -> Result<LedgerInfo, SdkError> {
        let state = self.inner.state();
        let ledger = state
            .channels
            .get(channel_id)
            .ok_or_else(|| SdkError::NotFound(format!("channel {}", channel_id)))?;
        let height = ledger.blocks.len();
        Ok(LedgerInfo {
            height: height as u64,
            current_block_hash: ledger.hashes.last().cloned().unwrap_or_default(),
            previous_block_hash: height
                .checked_sub(2)
                .and_then(|i| ledger.hashes.get(i).cloned())
                .unwrap_or_default(),
        })
    }

    async fn query_block(
        &self,
        channel_id: &str,
        number: u64,
        _peer: &PeerRef,
    ) -> Result<Block, SdkError> {
        let state = self.inner.state();
        state
            .channels
            .get(channel_id)
            .and_then(|l| l.blocks.get(number as usize).cloned())
            .ok_or_else(|| SdkError::NotFound(format!("block {} on {}", number, channel_id)))
    }

    async fn query_transaction(
        &self,
        channel_id: &str,
        tx_id: &TransactionId,
        _peer: &PeerRef,
    ) -> Result<ProcessedTransaction, SdkError> {
        let state = self.inner.state();
        let ledger = state
            .channels
            .get(channel_id)
            .ok_or_else(|| SdkError::NotFound(format!("channel {}", channel_id)))?;
        let block_number = *ledger
            .tx_index
            .get(tx_id)
            .ok_or_else(|| SdkError::NotFound(format!("transaction {}", tx_id)))?;
        ledger.blocks[block_number as usize]
            .transactions
            .iter()
            .find(|t| &t.tx_id == tx_id)
            .map(|t| ProcessedTransaction {
                block_number,
                transaction: t.clone(),
            })
            .ok_or_else(|| SdkError::NotFound(format!("transaction {}", tx_id)))
    }

    async fn create_channel(
        &self,
        _identity: &Identity,
        request: &ChannelCreateRequest,
    ) -> Result<BroadcastResponse, SdkError> {
        if request.config_tx.is_empty() {
            return Err(SdkError::Rejected("empty channel configuration".to_string()));
        }
        if request.orderer_tls_pem.is_empty() {
            return Err(SdkError::Unauthorized("missing orderer TLS material".to_string()));
        }
        if self.has_channel(&request.channel_id) {
            return Err(SdkError::Rejected(format!(
                "channel {} already exists",
                request.channel_id
            )));
        }
        self.add_channel(&request.channel_id);
        Ok(BroadcastResponse {
            status: "SUCCESS".to_string(),
            info: String::new(),
        })
    }
}

fn sim_chaincode() -> ChaincodeInfo {
    ChaincodeInfo {
        name: SIM_CHAINCODE.to_string(),
        version: "1.0".to_string(),
        path: "github.com/chaincode/kv".to_string(),
    }
}

/// Event hub connection to the simulated peer.
struct SimEventHub {
    inner: Arc<SimInner>,
    channel_id: String,
    stop: watch::Sender<bool>,
    connected: AtomicBool,
}

impl SimEventHub {
    fn subscribe(&self) -> Result<(broadcast::Receiver<Block>, bool), SdkError> {
        let mut state = self.inner.state();
        state.stats.block_registrations += 1;
        let hub_error = state.faults.hub_error;
        let ledger = state
            .channels
            .get(&self.channel_id)
            .ok_or_else(|| SdkError::NotFound(format!("channel {}", self.channel_id)))?;
        Ok((ledger.events.subscribe(), hub_error))
    }
}

#[async_trait]
impl EventHub for SimEventHub {
    async fn register_tx_event(&self, tx_id: &TransactionId) -> Result<TxEventReceiver, SdkError> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(SdkError::Unavailable("event hub is disconnected".to_string()));
        }
        let (reply, rx) = oneshot::channel();

        // subscribe before looking at the ledger so no commit slips in between
        let (mut blocks, committed, hub_error) = {
            let mut state = self.inner.state();
            state.stats.tx_registrations += 1;
            let hub_error = state.faults.hub_error;
            let ledger = state
                .channels
                .get(&self.channel_id)
                .ok_or_else(|| SdkError::NotFound(format!("channel {}", self.channel_id)))?;
            let blocks = ledger.events.subscribe();
            (blocks, ledger.tx_index.get(tx_id).copied(), hub_error)
        };

        if hub_error {
            let _ = reply.send(Err(SdkError::Unavailable(
                "simulated event hub failure".to_string(),
            )));
            return Ok(rx);
        }
        if let Some(block_number) = committed {
            let _ = reply.send(Ok(TxEvent {
                tx_id: tx_id.clone(),
                status: TX_VALID.to_string(),
                block_number,
            }));
            return Ok(rx);
        }

        let tx_id = tx_id.clone();
        let mut stop = self.stop.subscribe();
        let mut reply = reply;
        tokio::spawn(async move {
            loop {
                let received = tokio::select! {
                    received = blocks.recv() => received,
                    _ = reply.closed() => break,
                    _ = stop.changed() => break,
                };
                match received {
                    Ok(block) => {
                        if let Some(tx) = block.transactions.iter().find(|t| t.tx_id == tx_id) {
                            let _ = reply.send(Ok(TxEvent {
                                tx_id: tx.tx_id.clone(),
                                status: tx.validation_code.clone(),
                                block_number: block.number,
                            }));
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(rx)
    }

    async fn register_block_event(&self) -> Result<BlockEventReceiver, SdkError> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(SdkError::Unavailable("event hub is disconnected".to_string()));
        }
        let (mut blocks, hub_error) = self.subscribe()?;

        let (tx, rx) = mpsc::channel(64);
        if hub_error {
            let _ = tx
                .send(Err(SdkError::Unavailable("simulated event hub failure".to_string())))
                .await;
            return Ok(rx);
        }

        let mut stop = self.stop.subscribe();
        tokio::spawn(async move {
            loop {
                let received = tokio::select! {
                    received = blocks.recv() => received,
                    _ = tx.closed() => break,
                    _ = stop.changed() => break,
                };
                match received {
                    Ok(block) => {
                        if tx.send(Ok(block)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped = skipped, "Simulated block stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(rx)
    }

    fn disconnect(&self) {
        self.inner.state().stats.hub_disconnects += 1;
        self.connected.store(false, Ordering::Release);
        let _ = self.stop.send(true);
    }
}
