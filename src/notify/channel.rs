use crate::notify::Broadcaster;
use anyhow::Result;
use tokio::sync::broadcast;

#[derive(Debug, Clone)]
pub struct BroadcastMessage {
    pub topic: String,
    pub event: String,
    pub payload: serde_json::Value,
}

/// Broadcaster backed by a tokio broadcast channel. Whatever real-time
/// transport fronts the service subscribes here and relays messages for the
/// topic its clients joined.
pub struct ChannelBroadcaster {
    tx: broadcast::Sender<BroadcastMessage>,
}

impl ChannelBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastMessage> {
        self.tx.subscribe()
    }
}

#[async_trait::async_trait]
impl Broadcaster for ChannelBroadcaster {
    async fn broadcast(&self, topic: &str, event: &str, payload: serde_json::Value) -> Result<()> {
        // A send error only means nobody is listening right now.
        let _ = self.tx.send(BroadcastMessage {
            topic: topic.to_string(),
            event: event.to_string(),
            payload,
        });
        Ok(())
    }
}
