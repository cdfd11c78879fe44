//! Channel handle cache.
//!
//! # Responsibilities
//! - Lookup-or-insert one handle per channel id
//! - Refresh discovery on every access (topology can change)
//! - Coalesce concurrent refreshes of the same channel
//!
//! # Design Decisions
//! - The cache is owned by the gateway context, not process-global
//! - Initialized handles are never evicted; refreshing one is idempotent
//! - A handle whose first initialization fails is dropped again, so unknown
//!   channel ids do not accumulate
//! - A caller that waited on an in-flight refresh reuses its result;
//!   failed refreshes are not shared

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::config::DiscoveryConfig;
use crate::fabric::sdk::NetworkSdk;
use crate::fabric::session::NetworkSession;
use crate::fabric::types::{
    ChannelTopology, DiscoveryOptions, GatewayError, GatewayResult, PeerRef, SdkError,
};

/// Client-side handle of one channel.
#[derive(Debug)]
pub struct ChannelHandle {
    id: String,
    options: DiscoveryOptions,
    topology: RwLock<ChannelTopology>,
}

impl ChannelHandle {
    fn new(id: &str, local_peer: PeerRef, options: DiscoveryOptions) -> Self {
        Self {
            id: id.to_string(),
            options,
            topology: RwLock::new(ChannelTopology {
                peers: vec![local_peer],
                orderers: Vec::new(),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn discovery(&self) -> bool {
        self.options.discover
    }

    /// Peers known from the last refresh.
    pub fn peers(&self) -> Vec<PeerRef> {
        self.topology
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .peers
            .clone()
    }

    pub fn orderers(&self) -> Vec<String> {
        self.topology
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .orderers
            .clone()
    }

    /// Look up a known peer by host name.
    pub fn find_peer(&self, name: &str) -> Option<PeerRef> {
        self.topology
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .peers
            .iter()
            .find(|p| p.name == name)
            .cloned()
    }

    /// Known peers that belong to the organization `msp_id`.
    pub fn peers_for_org(&self, msp_id: &str) -> Vec<PeerRef> {
        self.topology
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .peers
            .iter()
            .filter(|p| p.msp_id == msp_id)
            .cloned()
            .collect()
    }

    fn set_topology(&self, topology: ChannelTopology) {
        *self.topology.write().unwrap_or_else(PoisonError::into_inner) = topology;
    }
}

struct ChannelSlot {
    handle: Arc<ChannelHandle>,
    refresh_lock: Mutex<()>,
    /// Completed refreshes.
    refreshes: AtomicU64,
}

/// Map from channel id to channel handle.
pub struct ChannelCache {
    sdk: Arc<dyn NetworkSdk>,
    local_peer: PeerRef,
    options: DiscoveryOptions,
    slots: DashMap<String, Arc<ChannelSlot>>,
}

impl ChannelCache {
    pub fn new(session: &NetworkSession, discovery: &DiscoveryConfig) -> Self {
        Self {
            sdk: session.sdk().clone(),
            local_peer: session.local_peer().clone(),
            options: DiscoveryOptions {
                discover: discovery.enabled,
                as_localhost: discovery.as_localhost,
            },
            slots: DashMap::new(),
        }
    }

    /// Resolve a channel and refresh its topology.
    pub async fn get_channel(&self, channel_id: &str) -> GatewayResult<Arc<ChannelHandle>> {
        if channel_id.is_empty() {
            return Err(GatewayError::InvalidRequest("channel id is empty".to_string()));
        }

        let slot = self.slot(channel_id);
        let seen = slot.refreshes.load(Ordering::Acquire);
        let _refresh = slot.refresh_lock.lock().await;

        if slot.refreshes.load(Ordering::Acquire) != seen {
            tracing::trace!(channel = %channel_id, "Reusing refresh completed while waiting");
            return Ok(slot.handle.clone());
        }

        let anchors = slot.handle.peers();
        let topology = match self
            .sdk
            .initialize_channel(channel_id, &anchors, self.options)
            .await
        {
            Ok(topology) => topology,
            Err(e) => {
                self.discard_uninitialized(channel_id, &slot);
                return Err(match e {
                    SdkError::NotFound(what) => GatewayError::NotFound(what),
                    e => GatewayError::Channel(format!(
                        "failed to initialize {}: {}",
                        channel_id, e
                    )),
                });
            }
        };

        tracing::debug!(
            channel = %channel_id,
            peers = topology.peers.len(),
            orderers = topology.orderers.len(),
            discover = self.options.discover,
            as_localhost = self.options.as_localhost,
            "Channel initialized"
        );

        slot.handle.set_topology(topology);
        slot.refreshes.fetch_add(1, Ordering::Release);
        Ok(slot.handle.clone())
    }

    /// Handle of a channel without refreshing it.
    pub fn cached(&self, channel_id: &str) -> Option<Arc<ChannelHandle>> {
        self.slots.get(channel_id).map(|slot| slot.handle.clone())
    }

    /// Number of channels with a handle.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drop a slot that never initialized, unless other callers still wait on it.
    fn discard_uninitialized(&self, channel_id: &str, slot: &Arc<ChannelSlot>) {
        // one reference in the map, one held by this caller
        let removed = self.slots.remove_if(channel_id, |_, cached| {
            Arc::ptr_eq(cached, slot)
                && cached.refreshes.load(Ordering::Acquire) == 0
                && Arc::strong_count(cached) == 2
        });
        if removed.is_some() {
            tracing::debug!(channel = %channel_id, "Dropped channel handle that failed to initialize");
        }
    }

    fn slot(&self, channel_id: &str) -> Arc<ChannelSlot> {
        self.slots
            .entry(channel_id.to_string())
            .or_insert_with(|| {
                tracing::debug!(channel = %channel_id, "Creating channel handle");
                Arc::new(ChannelSlot {
                    handle: Arc::new(ChannelHandle::new(
                        channel_id,
                        self.local_peer.clone(),
                        self.options,
                    )),
                    refresh_lock: Mutex::new(()),
                    refreshes: AtomicU64::new(0),
                })
            })
            .clone()
    }
}
