use crate::notify::Publisher;
use anyhow::Result;

/// Publishes domain events onto a capped redis stream that downstream
/// consumers (notifications, reporting) read from.
#[derive(Clone)]
pub struct RedisStreamPublisher {
    pub client: redis::Client,
    pub stream_key: String,
}

#[async_trait::async_trait]
impl Publisher for RedisStreamPublisher {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: serde_json::Value,
    ) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let event = serde_json::to_string(&payload)?;

        let _: String = redis::cmd("XADD")
            .arg(&self.stream_key)
            .arg("MAXLEN")
            .arg("~")
            .arg(1_000_000)
            .arg("*")
            .arg("exchange")
            .arg(exchange)
            .arg("routing_key")
            .arg(routing_key)
            .arg("event")
            .arg(event)
            .query_async(&mut conn)
            .await?;

        Ok(())
    }
}
