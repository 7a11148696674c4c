// src/rabbitmq/mod.rs
// RabbitMQ plumbing shared by the producer and consumer binaries

pub mod channel_manager;
pub mod connection;
pub mod consumer;
pub mod errors;
pub mod publisher;
pub mod retry;

// Re-export specific items to simplify imports elsewhere
pub use channel_manager::{ChannelConfig, ChannelManager, QueueSpec, QueueState, QueueType};
pub use connection::ConnectionManager;
pub use consumer::{Acknowledger, DeliveryMeta, Disposition, QueueConsumer};
pub use errors::{RabbitMQError, Result};
pub use publisher::{MessagePublisher, QueuePublisher};
pub use retry::RetryPolicy;
