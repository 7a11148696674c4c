use std::str::FromStr;

use lapin::{
    options::{ConfirmSelectOptions, QueueDeclareOptions},
    types::{AMQPValue, FieldTable},
    Channel,
};
use tracing::{debug, info};
use uuid::Uuid;

use super::connection::ConnectionManager;
use super::errors::{RabbitMQError, Result};

/// Declare argument selecting the queue implementation.
pub const QUEUE_TYPE_ARGUMENT: &str = "x-queue-type";

/// Configuration options for a RabbitMQ channel
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Whether to use publisher confirms
    pub confirm_mode: bool,

    /// Channel identifier for logging (defaults to a UUID)
    pub id: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            confirm_mode: false,
            id: format!("channel-{}", &Uuid::new_v4().to_string()[..8]),
        }
    }
}

impl ChannelConfig {
    /// Publishing channels wait for the broker to confirm every message.
    pub fn publisher() -> Self {
        Self {
            confirm_mode: true,
            ..Self::default()
        }
    }

    pub fn consumer() -> Self {
        Self::default()
    }
}

/// Opens and configures channels on the process connection.
pub struct ChannelManager {
    config: ChannelConfig,
}

impl ChannelManager {
    pub fn new(config: ChannelConfig) -> Self {
        debug!(
            channel_id = %config.id,
            confirm = %config.confirm_mode,
            "Creating channel manager"
        );
        Self { config }
    }

    pub async fn open(&self, connections: &ConnectionManager) -> Result<Channel> {
        let channel = connections.create_channel().await?;

        if self.config.confirm_mode {
            debug!("Enabling confirm mode for channel {}", self.config.id);
            channel
                .confirm_select(ConfirmSelectOptions::default())
                .await
                .map_err(|e| {
                    RabbitMQError::ChannelError(format!("Failed to enable confirm mode: {}", e))
                })?;
        }

        info!("Channel {} created and configured successfully", self.config.id);
        Ok(channel)
    }

    /// Return the channel ID for logging
    pub fn id(&self) -> &str {
        &self.config.id
    }
}

/// Queue implementations the broker can be asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueType {
    Classic,
    Quorum,
}

impl QueueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueType::Classic => "classic",
            QueueType::Quorum => "quorum",
        }
    }

    /// Only quorum queues stamp redeliveries with `x-delivery-count`.
    pub fn tracks_delivery_count(&self) -> bool {
        matches!(self, QueueType::Quorum)
    }
}

impl FromStr for QueueType {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "classic" => Ok(QueueType::Classic),
            "quorum" => Ok(QueueType::Quorum),
            other => Err(format!("unsupported queue type '{}'", other)),
        }
    }
}

/// Queue declaration parameters. Declaring is idempotent as long as the
/// parameters never change between declarations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSpec {
    pub name: String,
    pub durable: bool,
    /// `None` leaves the choice to the broker's default queue type.
    pub queue_type: Option<QueueType>,
}

/// Broker-reported state right after a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueState {
    pub message_count: u32,
    pub consumer_count: u32,
}

impl QueueSpec {
    pub fn durable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            durable: true,
            queue_type: None,
        }
    }

    pub fn with_queue_type(mut self, queue_type: Option<QueueType>) -> Self {
        self.queue_type = queue_type;
        self
    }

    pub fn options(&self) -> QueueDeclareOptions {
        QueueDeclareOptions {
            durable: self.durable,
            ..QueueDeclareOptions::default()
        }
    }

    pub fn arguments(&self) -> FieldTable {
        let mut arguments = FieldTable::default();
        if let Some(queue_type) = self.queue_type {
            arguments.insert(
                QUEUE_TYPE_ARGUMENT.into(),
                AMQPValue::LongString(queue_type.as_str().into()),
            );
        }
        arguments
    }

    pub async fn declare(&self, channel: &Channel) -> Result<QueueState> {
        let queue = channel
            .queue_declare(&self.name, self.options(), self.arguments())
            .await
            .map_err(|e| RabbitMQError::DeclareError(format!("queue '{}': {}", self.name, e)))?;

        let state = QueueState {
            message_count: queue.message_count(),
            consumer_count: queue.consumer_count(),
        };
        info!(
            "Queue '{}' declared (durable={}) with {} messages and {} consumers",
            self.name, self.durable, state.message_count, state.consumer_count
        );
        Ok(state)
    }
}
