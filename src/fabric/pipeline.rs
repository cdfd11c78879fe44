//! Transaction pipeline.
//!
//! # States
//! ```text
//! Idle → ProposalSent → Broadcasting → (CommitWait) → Committed
//!   ↑                                                    │
//!   └──── back-off, new transaction id ◀──── Failed ◀────┘ (budget left)
//! ```
//!
//! # Responsibilities
//! - Build a proposal with a fresh transaction id and collect endorsements
//! - Broadcast the endorsed envelope to the ordering service
//! - Optionally race a commit subscription against the configured timeout
//! - Repeat failed attempts within the retry budget
//! - Single-shot read-only queries (no broadcast, no events, no retry)

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::InvokeConfig;
use crate::fabric::channel::{ChannelCache, ChannelHandle};
use crate::fabric::events::{CommitOutcome, EventHubBinder};
use crate::fabric::session::NetworkSession;
use crate::fabric::types::{
    EndorsedProposal, GatewayError, GatewayResult, Identity, InvokeRequest, InvokeResult, PeerRef,
    ProposalRequest, ProposalResponse, QueryRequest, TransactionId,
};
use crate::observability::metrics;
use crate::resilience::RetryPolicy;

/// Ordering service status of an accepted envelope.
const BROADCAST_SUCCESS: &str = "SUCCESS";

/// Submits transactions and evaluates queries on behalf of the session.
pub struct TransactionPipeline {
    session: Arc<NetworkSession>,
    channels: Arc<ChannelCache>,
    binder: EventHubBinder,
    policy: RetryPolicy,
    commit_timeout: Duration,
}

impl TransactionPipeline {
    pub fn new(
        session: Arc<NetworkSession>,
        channels: Arc<ChannelCache>,
        config: &InvokeConfig,
    ) -> Self {
        let binder = EventHubBinder::new(&session);
        Self {
            session,
            channels,
            binder,
            policy: RetryPolicy::from_config(config),
            commit_timeout: Duration::from_millis(config.commit_timeout_ms),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Submit a transaction, retrying failed attempts with a new transaction id.
    pub async fn invoke(&self, request: &InvokeRequest) -> GatewayResult<InvokeResult> {
        let started = Instant::now();
        let identity = self.session.require_identity()?;
        let channel = self.channels.get_channel(&request.channel_id).await?;
        let targets = self.resolve_targets(&channel, request.targets.as_deref())?;

        let identity = &identity;
        let channel = &channel;
        let targets = &targets[..];
        let result = self
            .policy
            .run("invoke", move |attempt| {
                self.attempt(attempt, identity, channel, targets, request)
            })
            .await;

        metrics::record_invoke(if result.is_ok() { "ok" } else { "failed" }, started);
        result
    }

    async fn attempt(
        &self,
        attempt: u32,
        identity: &Identity,
        channel: &ChannelHandle,
        targets: &[PeerRef],
        request: &InvokeRequest,
    ) -> GatewayResult<InvokeResult> {
        metrics::record_invoke_attempt();
        let sdk = self.session.sdk();

        let tx_id = TransactionId::generate();
        let proposal = ProposalRequest {
            chaincode_id: request.chaincode_id.clone(),
            fcn: request.fcn.clone(),
            args: request.args.clone(),
            tx_id: tx_id.clone(),
            targets: targets.to_vec(),
        };

        tracing::trace!(
            channel = %channel.id(),
            chaincode = %proposal.chaincode_id,
            fcn = %proposal.fcn,
            tx_id = %tx_id,
            attempt = attempt,
            "invoke"
        );

        let responses = sdk
            .send_proposal(channel.id(), identity, &proposal)
            .await
            .map_err(|e| GatewayError::Proposal(e.to_string()))?;
        check_endorsements(&responses)?;

        let endorsed = EndorsedProposal {
            proposal,
            responses,
        };
        let ack = sdk
            .broadcast(channel.id(), identity, &endorsed)
            .await
            .map_err(|e| GatewayError::Broadcast(e.to_string()))?;
        if ack.status != BROADCAST_SUCCESS {
            return Err(GatewayError::Broadcast(format!("{}: {}", ack.status, ack.info)));
        }
        tracing::trace!(tx_id = %tx_id, status = %ack.status, "broadcastResponse");

        if !request.wait_for_transaction_event {
            return Ok(InvokeResult {
                txid: tx_id,
                status: None,
                block_number: None,
            });
        }

        let hub = self.binder.bind(channel).await?;
        let wait_started = Instant::now();
        let outcome = hub.wait_for_commit(&tx_id, self.commit_timeout).await;
        metrics::record_commit_wait(outcome.label(), wait_started);

        match outcome {
            CommitOutcome::Committed(event) => Ok(InvokeResult {
                txid: event.tx_id,
                status: Some(event.status),
                block_number: Some(event.block_number),
            }),
            CommitOutcome::TimedOut => Err(GatewayError::CommitTimeout {
                tx_id,
                timeout_ms: self.commit_timeout.as_millis() as u64,
            }),
            CommitOutcome::HubError(e) => Err(GatewayError::EventHub(e)),
        }
    }

    /// Evaluate a read-only chaincode function on the target peers.
    ///
    /// Returns each peer's response decoded as UTF-8 text.
    pub async fn query(
        &self,
        channel_id: &str,
        chaincode_id: &str,
        fcn: &str,
        args: &[String],
        targets: Option<&[String]>,
    ) -> GatewayResult<Vec<String>> {
        let identity = self.session.require_identity()?;
        let channel = self.channels.get_channel(channel_id).await?;

        let request = QueryRequest {
            chaincode_id: chaincode_id.to_string(),
            fcn: fcn.to_string(),
            args: args.to_vec(),
            targets: self.resolve_targets(&channel, targets)?,
        };
        tracing::trace!(channel = %channel_id, chaincode = %chaincode_id, fcn = %fcn, "query");

        let responses = self
            .session
            .sdk()
            .query_by_chaincode(channel.id(), &identity, &request)
            .await
            .map_err(GatewayError::from_query)?;
        metrics::record_query(channel_id);

        Ok(responses
            .iter()
            .map(|r| String::from_utf8_lossy(r).into_owned())
            .collect())
    }

    /// Map requested peer names to peers; the local peer when none are given.
    fn resolve_targets(
        &self,
        channel: &ChannelHandle,
        names: Option<&[String]>,
    ) -> GatewayResult<Vec<PeerRef>> {
        let names = match names {
            Some(names) if !names.is_empty() => names,
            _ => return Ok(vec![self.session.local_peer().clone()]),
        };

        names
            .iter()
            .map(|name| {
                channel
                    .find_peer(name)
                    .or_else(|| {
                        self.session
                            .peers_for_org(None)
                            .into_iter()
                            .find(|p| &p.name == name)
                    })
                    .ok_or_else(|| {
                        GatewayError::InvalidRequest(format!(
                            "unknown peer {} on channel {}",
                            name,
                            channel.id()
                        ))
                    })
            })
            .collect()
    }
}

/// Every targeted peer must have endorsed the proposal.
fn check_endorsements(responses: &[ProposalResponse]) -> GatewayResult<()> {
    if responses.is_empty() {
        return Err(GatewayError::Proposal("no endorsement responses".to_string()));
    }
    let rejected: Vec<String> = responses
        .iter()
        .filter(|r| !r.is_endorsement())
        .map(|r| format!("{} ({}): {}", r.peer, r.status, r.message))
        .collect();
    if rejected.is_empty() {
        Ok(())
    } else {
        Err(GatewayError::Proposal(rejected.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DiscoveryConfig, NetworkConfig};
    use crate::fabric::sim::SimNetwork;
    use crate::fabric::types::TX_VALID;
    use std::collections::HashSet;

    async fn pipeline(invoke: InvokeConfig) -> (SimNetwork, TransactionPipeline) {
        let config = NetworkConfig::default();
        let sim = SimNetwork::new(&config);
        sim.add_channel("common");
        let session = Arc::new(NetworkSession::new(Arc::new(sim.clone()), config).unwrap());
        session.login("admin", "adminpw").await.unwrap();
        let channels = Arc::new(ChannelCache::new(&session, &DiscoveryConfig::default()));
        (sim, TransactionPipeline::new(session, channels, &invoke))
    }

    fn invoke_config(retry_count: u32, commit_timeout_ms: u64) -> InvokeConfig {
        InvokeConfig {
            retry_count,
            retry_delay_ms: 10,
            commit_timeout_ms,
            ..InvokeConfig::default()
        }
    }

    fn put(key: &str, value: &str, wait: bool) -> InvokeRequest {
        InvokeRequest {
            channel_id: "common".to_string(),
            chaincode_id: "kv".to_string(),
            fcn: "put".to_string(),
            args: vec![key.to_string(), value.to_string()],
            targets: None,
            wait_for_transaction_event: wait,
        }
    }

    #[tokio::test]
    async fn test_retries_until_endorsed_and_committed() {
        let (sim, pipeline) = pipeline(invoke_config(3, 5_000)).await;
        sim.fail_next_proposals(2);

        let result = pipeline.invoke(&put("a", "1", true)).await.unwrap();

        assert_eq!(result.status.as_deref(), Some(TX_VALID));
        assert!(result.block_number.is_some());

        let ids = sim.proposal_tx_ids();
        assert_eq!(ids.len(), 3);
        assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 3);
        assert_eq!(ids[2], result.txid);
        assert_eq!(sim.broadcast_count(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_error_with_single_attempt() {
        let (sim, pipeline) = pipeline(invoke_config(1, 5_000)).await;
        sim.fail_next_broadcasts(1);

        let err = pipeline.invoke(&put("a", "1", true)).await.unwrap_err();

        match err {
            GatewayError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 1);
                assert!(matches!(*last, GatewayError::Broadcast(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(sim.hub_connections(), 0);
        assert_eq!(sim.tx_registrations(), 0);
    }

    #[tokio::test]
    async fn test_commit_timeout_disconnects_once() {
        let (sim, pipeline) = pipeline(invoke_config(1, 50)).await;
        sim.set_commit_delay(Duration::from_millis(200));

        let err = pipeline.invoke(&put("a", "1", true)).await.unwrap_err();

        match err {
            GatewayError::RetriesExhausted { last, .. } => {
                assert!(matches!(*last, GatewayError::CommitTimeout { timeout_ms: 50, .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(sim.hub_connections(), 1);
        assert_eq!(sim.hub_disconnects(), 1);
    }

    #[tokio::test]
    async fn test_chaincode_error_exhausts_budget() {
        let (sim, pipeline) = pipeline(invoke_config(3, 5_000)).await;
        let mut request = put("a", "1", false);
        request.args.truncate(1);

        let err = pipeline.invoke(&request).await.unwrap_err();

        match err {
            GatewayError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, GatewayError::Proposal(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(sim.proposal_tx_ids().len(), 3);
        assert_eq!(sim.broadcast_count(), 0);
    }

    #[tokio::test]
    async fn test_invoke_without_wait_returns_txid() {
        let (sim, pipeline) = pipeline(invoke_config(3, 5_000)).await;

        let result = pipeline.invoke(&put("a", "1", false)).await.unwrap();

        assert!(result.status.is_none());
        assert!(result.block_number.is_none());
        assert_eq!(sim.hub_connections(), 0);
    }

    #[tokio::test]
    async fn test_query_reads_committed_state_without_side_effects() {
        let (sim, pipeline) = pipeline(invoke_config(3, 5_000)).await;
        pipeline.invoke(&put("color", "blue", true)).await.unwrap();
        let broadcasts = sim.broadcast_count();
        let hubs = sim.hub_connections();

        let values = pipeline
            .query("common", "kv", "get", &["color".to_string()], None)
            .await
            .unwrap();

        assert_eq!(values, vec!["blue".to_string()]);
        assert_eq!(sim.broadcast_count(), broadcasts);
        assert_eq!(sim.hub_connections(), hubs);
    }

    #[tokio::test]
    async fn test_unknown_target_peer() {
        let (_sim, pipeline) = pipeline(invoke_config(3, 5_000)).await;
        let mut request = put("a", "1", false);
        request.targets = Some(vec!["peer9.org1.example.com".to_string()]);

        let err = pipeline.invoke(&request).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_requires_identity() {
        let config = NetworkConfig::default();
        let sim = SimNetwork::new(&config);
        sim.add_channel("common");
        let session = Arc::new(NetworkSession::new(Arc::new(sim.clone()), config).unwrap());
        let channels = Arc::new(ChannelCache::new(&session, &DiscoveryConfig::default()));
        let pipeline = TransactionPipeline::new(session, channels, &InvokeConfig::default());

        let err = pipeline.invoke(&put("a", "1", false)).await.unwrap_err();
        assert!(matches!(err, GatewayError::Authentication(_)));
        assert!(sim.proposal_tx_ids().is_empty());
    }

    #[test]
    fn test_check_endorsements() {
        let ok = ProposalResponse {
            peer: "peer0".to_string(),
            status: 200,
            message: String::new(),
            payload: Vec::new(),
            endorsed: true,
        };
        let failed = ProposalResponse {
            status: 500,
            message: "chaincode error".to_string(),
            endorsed: false,
            ..ok.clone()
        };

        assert!(check_endorsements(&[ok.clone()]).is_ok());
        assert!(check_endorsements(&[]).is_err());
        let err = check_endorsements(&[ok, failed]).unwrap_err();
        assert!(err.to_string().contains("chaincode error"));
    }
}
