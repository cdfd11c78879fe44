//! Fan-out of committed-block events to real-time listeners.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::fabric::types::Block;

/// Event name carried by every relayed block.
pub const CHAINBLOCK_EVENT: &str = "chainblock";

/// A committed block, as delivered to listeners.
///
/// Serializes to `{"event":"chainblock","data":{...block...}}`.
#[derive(Debug, Clone, Serialize)]
pub struct ChainBlockEvent {
    pub event: &'static str,
    #[serde(skip)]
    pub channel_id: String,
    #[serde(skip)]
    pub number: u64,
    #[serde(rename = "data")]
    pub block: Block,
}

impl ChainBlockEvent {
    pub fn new(block: Block) -> Self {
        Self {
            event: CHAINBLOCK_EVENT,
            channel_id: block.channel_id.clone(),
            number: block.number,
            block,
        }
    }

    /// JSON text frame for the socket.
    pub fn to_frame(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Broadcast hub for `ChainBlockEvent`s. Cheap to clone.
#[derive(Clone)]
pub struct ChainBlockPublisher {
    tx: broadcast::Sender<Arc<ChainBlockEvent>>,
}

impl ChainBlockPublisher {
    /// `buffer` is how many events a listener may fall behind before skipping.
    pub fn new(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self { tx }
    }

    /// Publish to every current listener; returns how many received it.
    pub fn publish(&self, event: ChainBlockEvent) -> usize {
        self.tx.send(Arc::new(event)).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ChainBlockEvent>> {
        self.tx.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(number: u64) -> Block {
        Block {
            channel_id: "common".to_string(),
            number,
            previous_hash: String::new(),
            data_hash: "00".to_string(),
            transactions: Vec::new(),
        }
    }

    #[test]
    fn test_frame_shape() {
        let frame = ChainBlockEvent::new(block(4)).to_frame().unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();

        assert_eq!(value["event"], "chainblock");
        assert_eq!(value["data"]["number"], 4);
        assert_eq!(value["data"]["channel_id"], "common");
        assert!(value.get("channel_id").is_none());
    }

    #[tokio::test]
    async fn test_publish_without_listeners() {
        let publisher = ChainBlockPublisher::new(4);
        assert_eq!(publisher.publish(ChainBlockEvent::new(block(1))), 0);

        let mut rx = publisher.subscribe();
        assert_eq!(publisher.listener_count(), 1);
        assert_eq!(publisher.publish(ChainBlockEvent::new(block(2))), 1);
        assert_eq!(rx.recv().await.unwrap().number, 2);
    }

    #[tokio::test]
    async fn test_lagging_listener_skips() {
        let publisher = ChainBlockPublisher::new(2);
        let mut rx = publisher.subscribe();
        for n in 1..=5 {
            publisher.publish(ChainBlockEvent::new(block(n)));
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(3))
        ));
        assert_eq!(rx.recv().await.unwrap().number, 4);
    }
}
