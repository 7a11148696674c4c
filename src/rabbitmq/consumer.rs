use async_trait::async_trait;
use futures_lite::StreamExt;
use lapin::{
    message::Delivery,
    options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions},
    types::{AMQPValue, FieldTable},
    Channel, Consumer,
};
use tracing::info;
use uuid::Uuid;

use super::errors::{RabbitMQError, Result};

/// Header quorum queues set to the number of earlier delivery attempts.
pub const DELIVERY_COUNT_HEADER: &str = "x-delivery-count";

/// Final answer the consumer gives the broker for one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Processed; the broker forgets the message.
    Ack,
    /// Transient failure; the broker redelivers it.
    NackRequeue,
    /// Permanent failure; the broker drops or dead-letters it.
    NackDiscard,
}

impl Disposition {
    pub async fn apply<A: Acknowledger + ?Sized>(self, acker: &A) -> Result<()> {
        match self {
            Disposition::Ack => acker.ack_message().await,
            Disposition::NackRequeue => acker.nack_message(true).await,
            Disposition::NackDiscard => acker.nack_message(false).await,
        }
    }
}

/// Settles a single delivery with the broker.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn ack_message(&self) -> Result<()>;

    async fn nack_message(&self, requeue: bool) -> Result<()>;
}

#[async_trait]
impl Acknowledger for Delivery {
    async fn ack_message(&self) -> Result<()> {
        self.ack(BasicAckOptions::default())
            .await
            .map_err(|e| {
                RabbitMQError::AckError(format!("ack of delivery {}: {}", self.delivery_tag, e))
            })
    }

    async fn nack_message(&self, requeue: bool) -> Result<()> {
        self.nack(BasicNackOptions {
            requeue,
            ..BasicNackOptions::default()
        })
        .await
        .map_err(|e| {
            RabbitMQError::AckError(format!("nack of delivery {}: {}", self.delivery_tag, e))
        })
    }
}

/// Broker metadata about a delivery the handler needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeliveryMeta {
    pub delivery_tag: u64,
    pub redelivered: bool,
    /// Earlier delivery attempts, when the broker reports them.
    pub delivery_count: Option<u32>,
}

impl From<&Delivery> for DeliveryMeta {
    fn from(delivery: &Delivery) -> Self {
        Self {
            delivery_tag: delivery.delivery_tag,
            redelivered: delivery.redelivered,
            delivery_count: delivery
                .properties
                .headers()
                .as_ref()
                .and_then(delivery_count),
        }
    }
}

fn delivery_count(headers: &FieldTable) -> Option<u32> {
    let (_, value) = headers
        .inner()
        .iter()
        .find(|(key, _)| key.as_str() == DELIVERY_COUNT_HEADER)?;

    let count = match value {
        AMQPValue::ShortShortUInt(v) => i64::from(*v),
        AMQPValue::ShortUInt(v) => i64::from(*v),
        AMQPValue::LongUInt(v) => i64::from(*v),
        AMQPValue::ShortShortInt(v) => i64::from(*v),
        AMQPValue::ShortInt(v) => i64::from(*v),
        AMQPValue::LongInt(v) => i64::from(*v),
        AMQPValue::LongLongInt(v) => *v,
        _ => return None,
    };
    u32::try_from(count).ok()
}

/// Manual-ack subscription to one queue.
pub struct QueueConsumer {
    consumer: Consumer,
    queue: String,
    tag: String,
}

impl QueueConsumer {
    pub async fn subscribe(channel: &Channel, queue: &str) -> Result<Self> {
        let tag = format!("consumer-{}", Uuid::new_v4());
        let consumer = channel
            .basic_consume(
                queue,
                &tag,
                BasicConsumeOptions {
                    no_ack: false,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(consume_error)?;

        info!("Started consuming from queue '{}' as {}", queue, tag);
        Ok(Self {
            consumer,
            queue: queue.to_string(),
            tag,
        })
    }

    /// Waits for the next delivery. `None` means the broker cancelled the
    /// subscription or the channel closed.
    pub async fn next_delivery(&mut self) -> Option<Result<Delivery>> {
        let delivery = self.consumer.next().await?;
        Some(delivery.map_err(consume_error))
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

fn consume_error(e: lapin::Error) -> RabbitMQError {
    RabbitMQError::ConsumeError(e.to_string())
}
