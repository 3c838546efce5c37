//! Publication of derived facts to the message bus.

use crate::Metrics;
use async_trait::async_trait;
use l2scan_types::IndexerEvent;
use std::{fmt::Debug, sync::Arc};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

/// Errors returned by a [`MessageBus`].
#[derive(Debug, Error)]
pub enum BusError {
    /// The bus no longer accepts messages.
    #[error("message bus closed")]
    Closed,

    /// The bus transport rejected the message.
    #[error("publish failed: {0}")]
    Rejected(String),
}

/// Fire-and-forget transport for indexer events.
#[async_trait]
pub trait MessageBus: Debug + Send + Sync {
    /// Publishes a JSON `payload` on `topic`.
    async fn publish(&self, topic: &str, payload: String) -> Result<(), BusError>;
}

/// A message delivered by the [`ChannelBus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Topic the message was published on.
    pub topic: String,
    /// JSON payload.
    pub payload: String,
}

/// In-process [`MessageBus`] that fans messages out to every subscriber.
#[derive(Debug, Clone)]
pub struct ChannelBus {
    sender: broadcast::Sender<BusMessage>,
}

impl ChannelBus {
    /// Creates a bus that buffers up to `capacity` messages per lagging subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribes to every message published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl MessageBus for ChannelBus {
    async fn publish(&self, topic: &str, payload: String) -> Result<(), BusError> {
        if self.sender.receiver_count() == 0 {
            trace!(target: "event_emitter", topic, "No subscribers, message discarded");
            return Ok(());
        }
        self.sender
            .send(BusMessage { topic: topic.to_string(), payload })
            .map(|_| ())
            .map_err(|_| BusError::Closed)
    }
}

/// Serializes [`IndexerEvent`]s and publishes them on their topic.
///
/// Publication never fails the caller. Errors are logged and counted.
#[derive(Debug, Clone)]
pub struct EventEmitter {
    bus: Arc<dyn MessageBus>,
}

impl EventEmitter {
    /// Creates a new [`EventEmitter`].
    pub fn new(bus: Arc<dyn MessageBus>) -> Self {
        Self { bus }
    }

    /// Publishes `event` on its topic.
    pub async fn emit(&self, event: IndexerEvent) {
        let topic = event.topic();
        let payload = match encode(&event) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(target: "event_emitter", topic, %err, "Failed to encode event");
                metrics::counter!(Metrics::EVENTS_FAILED_TOTAL, "topic" => topic).increment(1);
                return;
            }
        };

        match self.bus.publish(topic, payload).await {
            Ok(()) => {
                debug!(target: "event_emitter", topic, "Event published");
                metrics::counter!(Metrics::EVENTS_PUBLISHED_TOTAL, "topic" => topic).increment(1);
            }
            Err(err) => {
                warn!(target: "event_emitter", topic, %err, "Failed to publish event");
                metrics::counter!(Metrics::EVENTS_FAILED_TOTAL, "topic" => topic).increment(1);
            }
        }
    }
}

fn encode(event: &IndexerEvent) -> Result<String, serde_json::Error> {
    match event {
        IndexerEvent::NewBlock(inner) => serde_json::to_string(inner),
        IndexerEvent::DroppedTxs(inner) => serde_json::to_string(inner),
        IndexerEvent::ValidatorSetUpdated(inner) => serde_json::to_string(inner),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::RecordingBus;
    use alloy_primitives::B256;
    use l2scan_types::{DroppedTx, DroppedTxsEvent, NEW_BLOCK_EVENT, NewBlockEvent};

    fn new_block() -> IndexerEvent {
        IndexerEvent::NewBlock(NewBlockEvent {
            block_number: 100,
            block_hash: B256::repeat_byte(1),
            timestamp: 10,
            tx_count: 0,
            finalization_status: l2scan_types::FinalizationStatus::L2NodeSeenProposed,
        })
    }

    #[tokio::test]
    async fn test_emit_publishes_json_on_topic() {
        let bus = Arc::new(RecordingBus::default());
        let emitter = EventEmitter::new(bus.clone());

        emitter
            .emit(IndexerEvent::DroppedTxs(DroppedTxsEvent {
                txs: vec![DroppedTx::new(B256::repeat_byte(2), 1, 2)],
            }))
            .await;

        let published = bus.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, l2scan_types::DROPPED_TXS_EVENT);
        assert_eq!(published[0].1["txs"][0]["createdAsPendingAt"], 1);
    }

    #[tokio::test]
    async fn test_publish_failure_is_swallowed() {
        let bus = Arc::new(RecordingBus::default());
        bus.fail_publishes(true);
        let emitter = EventEmitter::new(bus.clone());

        emitter.emit(new_block()).await;
        assert!(bus.published().is_empty());
    }

    #[tokio::test]
    async fn test_channel_bus_fans_out() {
        let bus = ChannelBus::new(8);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        EventEmitter::new(Arc::new(bus.clone())).emit(new_block()).await;

        let a = first.recv().await.unwrap();
        let b = second.recv().await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.topic, NEW_BLOCK_EVENT);
        assert!(a.payload.contains("\"blockNumber\":100"));
    }

    #[tokio::test]
    async fn test_channel_bus_without_subscribers() {
        let bus = ChannelBus::new(8);
        assert!(bus.publish(NEW_BLOCK_EVENT, "{}".to_string()).await.is_ok());
    }
}
