use crate::{IndexerActor, ServiceError};
use async_trait::async_trait;
use l2scan_core::BusMessage;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Logs every message published on the in-process bus.
#[derive(Debug)]
pub struct EventLogActor {
    messages: broadcast::Receiver<BusMessage>,
    cancel_token: CancellationToken,
}

impl EventLogActor {
    /// Creates a new [`EventLogActor`] draining `messages`.
    pub const fn new(
        messages: broadcast::Receiver<BusMessage>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self { messages, cancel_token }
    }
}

#[async_trait]
impl IndexerActor for EventLogActor {
    type Error = ServiceError;

    fn name(&self) -> String {
        "event_log".to_string()
    }

    async fn start(mut self) -> Result<(), Self::Error> {
        loop {
            tokio::select! {
                message = self.messages.recv() => match message {
                    Ok(message) => {
                        info!(
                            target: "event_bus",
                            topic = %message.topic,
                            payload = %message.payload,
                            "Event published"
                        );
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(target: "event_bus", skipped, "Event log lagging behind the bus");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = self.cancel_token.cancelled() => break,
            }
        }
        Ok(())
    }
}
