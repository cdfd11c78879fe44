//! Per-channel block subscriptions feeding the publisher.
//!
//! # Responsibilities
//! - List the joined channels once at startup and subscribe to each
//! - Subscribe channels created later on demand
//! - Republish every committed block as a `ChainBlockEvent`
//! - Disconnect a single channel's event hub on request
//!
//! # Design Decisions
//! - One event-hub binding per channel, held by the relay task
//! - A failed subscription is logged and not retried
//! - Tasks stop on the shutdown broadcast or their own stop signal and
//!   release their hub

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{broadcast, watch};

use crate::fabric::channel::ChannelCache;
use crate::fabric::events::{BoundEventHub, EventHubBinder};
use crate::fabric::sdk::BlockEventReceiver;
use crate::fabric::session::NetworkSession;
use crate::fabric::types::{GatewayError, GatewayResult};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::relay::publisher::{ChainBlockEvent, ChainBlockPublisher};

/// Relays committed blocks of every subscribed channel.
pub struct BlockRelay {
    session: Arc<NetworkSession>,
    channels: Arc<ChannelCache>,
    binder: EventHubBinder,
    publisher: ChainBlockPublisher,
    shutdown: Arc<Shutdown>,
    active: Arc<DashMap<String, ActiveRelay>>,
    next_id: AtomicU64,
}

/// Registration of a relaying channel; dropping `stop` ends its task.
struct ActiveRelay {
    id: u64,
    stop: watch::Sender<bool>,
}

impl BlockRelay {
    pub fn new(
        session: Arc<NetworkSession>,
        channels: Arc<ChannelCache>,
        publisher: ChainBlockPublisher,
        shutdown: Arc<Shutdown>,
    ) -> Self {
        let binder = EventHubBinder::new(&session);
        Self {
            session,
            channels,
            binder,
            publisher,
            shutdown,
            active: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn publisher(&self) -> &ChainBlockPublisher {
        &self.publisher
    }

    /// Subscribe every channel the local peer has joined.
    ///
    /// Returns how many channels are relaying. Individual channel failures
    /// are logged and skipped.
    pub async fn start(&self) -> GatewayResult<usize> {
        let joined = self
            .session
            .sdk()
            .query_channels(self.session.local_peer())
            .await
            .map_err(GatewayError::from_query)?;

        let mut started = 0;
        for info in joined {
            match self.relay_channel(&info.channel_id).await {
                Ok(()) => started += 1,
                Err(e) => tracing::error!(
                    channel = %info.channel_id,
                    error = %e,
                    "Block relay subscription failed"
                ),
            }
        }

        tracing::info!(channels = started, "Block relay started");
        Ok(started)
    }

    /// Start relaying one channel. No-op if it is already relaying.
    pub async fn relay_channel(&self, channel_id: &str) -> GatewayResult<()> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (stop, stopped) = watch::channel(false);
        match self.active.entry(channel_id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => return Ok(()),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(ActiveRelay { id, stop });
            }
        }

        let subscription = self.subscribe(channel_id).await;
        let (hub, blocks) = match subscription {
            Ok(pair) => pair,
            Err(e) => {
                self.active.remove_if(channel_id, |_, relay| relay.id == id);
                return Err(e);
            }
        };

        let task = RelayTask {
            id,
            channel_id: channel_id.to_string(),
            hub,
            blocks,
            publisher: self.publisher.clone(),
            shutdown: self.shutdown.subscribe(),
            stopped,
            active: self.active.clone(),
        };
        tokio::spawn(task.run());

        tracing::debug!(channel = %channel_id, "Relaying blocks");
        Ok(())
    }

    /// Stop relaying one channel and disconnect its event hub.
    ///
    /// Returns `false` if the channel was not relaying. The hub is released
    /// by the relay task shortly after.
    pub fn disconnect_channel(&self, channel_id: &str) -> bool {
        match self.active.remove(channel_id) {
            Some((_, relay)) => {
                let _ = relay.stop.send(true);
                tracing::debug!(channel = %channel_id, "Disconnecting channel event hub");
                true
            }
            None => false,
        }
    }

    pub fn is_relaying(&self, channel_id: &str) -> bool {
        self.active.contains_key(channel_id)
    }

    pub fn relaying_count(&self) -> usize {
        self.active.len()
    }

    async fn subscribe(&self, channel_id: &str) -> GatewayResult<(BoundEventHub, BlockEventReceiver)> {
        let channel = self.channels.get_channel(channel_id).await?;
        let hub = self.binder.bind(&channel).await?;
        let blocks = hub.register_block_event().await?;
        Ok((hub, blocks))
    }
}

struct RelayTask {
    id: u64,
    channel_id: String,
    hub: BoundEventHub,
    blocks: BlockEventReceiver,
    publisher: ChainBlockPublisher,
    shutdown: broadcast::Receiver<()>,
    stopped: watch::Receiver<bool>,
    active: Arc<DashMap<String, ActiveRelay>>,
}

impl RelayTask {
    async fn run(mut self) {
        loop {
            let next = tokio::select! {
                next = self.blocks.recv() => next,
                _ = self.shutdown.recv() => {
                    tracing::debug!(channel = %self.channel_id, "Block relay stopping");
                    break;
                }
                _ = self.stopped.changed() => {
                    tracing::debug!(channel = %self.channel_id, "Block relay disconnected");
                    break;
                }
            };

            match next {
                Some(Ok(block)) => {
                    let number = block.number;
                    let listeners = self.publisher.publish(ChainBlockEvent::new(block));
                    metrics::record_block_relayed(&self.channel_id);
                    tracing::trace!(
                        channel = %self.channel_id,
                        block = number,
                        listeners = listeners,
                        "chainblock"
                    );
                }
                Some(Err(e)) => {
                    tracing::error!(channel = %self.channel_id, error = %e, "Block event error");
                    break;
                }
                None => {
                    tracing::warn!(channel = %self.channel_id, "Block event stream closed");
                    break;
                }
            }
        }

        self.hub.disconnect();
        let id = self.id;
        self.active.remove_if(&self.channel_id, |_, relay| relay.id == id);
    }
}
