//! Event hub binding and commit-wait.
//!
//! # Responsibilities
//! - Open one event-hub connection per channel interaction
//! - Register for a transaction's commit or for every block
//! - Race a transaction registration against a timeout
//!
//! # Design Decisions
//! - `BoundEventHub` is a scoped guard: it disconnects on drop if nobody
//!   did so explicitly, and forwards at most one disconnect to the hub
//! - Commit-wait completes with a tagged `CommitOutcome` instead of
//!   success/error callbacks

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::fabric::channel::ChannelHandle;
use crate::fabric::sdk::{BlockEventReceiver, EventHub, NetworkSdk, TxEventReceiver};
use crate::fabric::session::NetworkSession;
use crate::fabric::types::{GatewayError, GatewayResult, PeerRef, TransactionId, TxEvent};

/// Terminal outcome of waiting for a transaction to commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The transaction was observed in a committed block.
    Committed(TxEvent),
    /// No event arrived within the window.
    TimedOut,
    /// The subscription failed before an event arrived.
    HubError(String),
}

impl CommitOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CommitOutcome::Committed(_) => "committed",
            CommitOutcome::TimedOut => "timeout",
            CommitOutcome::HubError(_) => "hub_error",
        }
    }
}

/// Opens event-hub connections scoped to the session's local peer.
#[derive(Clone)]
pub struct EventHubBinder {
    sdk: Arc<dyn NetworkSdk>,
    peer: PeerRef,
}

impl EventHubBinder {
    pub fn new(session: &NetworkSession) -> Self {
        Self {
            sdk: session.sdk().clone(),
            peer: session.local_peer().clone(),
        }
    }

    /// Open exactly one event-hub connection on `channel`.
    pub async fn bind(&self, channel: &ChannelHandle) -> GatewayResult<BoundEventHub> {
        let hub = self
            .sdk
            .connect_event_hub(channel.id(), &self.peer)
            .await
            .map_err(|e| GatewayError::EventHub(e.to_string()))?;

        tracing::trace!(channel = %channel.id(), peer = %self.peer.name, "Event hub connected");

        Ok(BoundEventHub {
            channel_id: channel.id().to_string(),
            hub,
            disconnected: AtomicBool::new(false),
        })
    }
}

/// A connected event hub that disconnects when dropped.
pub struct BoundEventHub {
    channel_id: String,
    hub: Arc<dyn EventHub>,
    disconnected: AtomicBool,
}

impl BoundEventHub {
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Register for one transaction; the receiver yields at most once.
    pub async fn register_tx_event(&self, tx_id: &TransactionId) -> GatewayResult<TxEventReceiver> {
        tracing::trace!(channel = %self.channel_id, tx_id = %tx_id, "registerTxEvent");
        self.hub
            .register_tx_event(tx_id)
            .await
            .map_err(|e| GatewayError::EventHub(e.to_string()))
    }

    /// Register for every block committed from now on.
    pub async fn register_block_event(&self) -> GatewayResult<BlockEventReceiver> {
        self.hub
            .register_block_event()
            .await
            .map_err(|e| GatewayError::EventHub(e.to_string()))
    }

    /// Disconnect from the hub. Safe to call any number of times.
    pub fn disconnect(&self) {
        if !self.disconnected.swap(true, Ordering::AcqRel) {
            self.hub.disconnect();
            tracing::trace!(channel = %self.channel_id, "Event hub disconnected");
        }
    }

    pub fn is_connected(&self) -> bool {
        !self.disconnected.load(Ordering::Acquire)
    }

    /// Race the commit of `tx_id` against `timeout`.
    ///
    /// Consumes the binding: the hub is disconnected whichever side wins.
    pub async fn wait_for_commit(self, tx_id: &TransactionId, timeout: Duration) -> CommitOutcome {
        let outcome = match self.register_tx_event(tx_id).await {
            Err(e) => CommitOutcome::HubError(e.to_string()),
            Ok(rx) => match tokio::time::timeout(timeout, rx).await {
                Ok(Ok(Ok(event))) => {
                    tracing::debug!(
                        tx_id = %event.tx_id,
                        status = %event.status,
                        block_number = event.block_number,
                        "Committed transaction"
                    );
                    CommitOutcome::Committed(event)
                }
                Ok(Ok(Err(e))) => {
                    tracing::error!(tx_id = %tx_id, error = %e, "registerTxEvent failed");
                    CommitOutcome::HubError(e.to_string())
                }
                Ok(Err(_)) => CommitOutcome::HubError(
                    "event hub closed before the transaction was observed".to_string(),
                ),
                Err(_) => {
                    tracing::error!(
                        tx_id = %tx_id,
                        timeout_ms = timeout.as_millis() as u64,
                        "Timed out waiting for transaction"
                    );
                    CommitOutcome::TimedOut
                }
            },
        };

        self.disconnect();
        outcome
    }
}

impl Drop for BoundEventHub {
    fn drop(&mut self) {
        self.disconnect();
    }
}
