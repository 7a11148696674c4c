use async_trait::async_trait;
use lapin::{options::BasicPublishOptions, BasicProperties, Channel};
use tracing::debug;

use super::errors::{RabbitMQError, Result};

/// AMQP delivery mode that asks the broker to write the message to disk.
pub const PERSISTENT_DELIVERY_MODE: u8 = 2;

/// Destination for serialized messages.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publish one persistent message. Returns once the broker has accepted it.
    async fn publish(&self, payload: &[u8]) -> Result<()>;

    fn queue(&self) -> &str;
}

/// Publishes straight to a queue through the default exchange.
pub struct QueuePublisher {
    channel: Channel,
    queue: String,
}

impl QueuePublisher {
    pub fn new(channel: Channel, queue: impl Into<String>) -> Self {
        Self {
            channel,
            queue: queue.into(),
        }
    }

    pub fn properties() -> BasicProperties {
        BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(PERSISTENT_DELIVERY_MODE)
            .with_timestamp(chrono::Utc::now().timestamp() as u64)
    }
}

#[async_trait]
impl MessagePublisher for QueuePublisher {
    async fn publish(&self, payload: &[u8]) -> Result<()> {
        let confirm = self
            .channel
            .basic_publish(
                "",
                &self.queue,
                BasicPublishOptions::default(),
                payload,
                Self::properties(),
            )
            .await
            .map_err(|e| RabbitMQError::PublishError(e.to_string()))?;

        // Resolves immediately when the channel is not in confirm mode.
        let confirmation = confirm
            .await
            .map_err(|e| RabbitMQError::PublishError(e.to_string()))?;
        if confirmation.is_nack() {
            return Err(RabbitMQError::PublishNacked(self.queue.clone()));
        }

        debug!("Published {} bytes to '{}'", payload.len(), self.queue);
        Ok(())
    }

    fn queue(&self) -> &str {
        &self.queue
    }
}
