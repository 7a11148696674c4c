// src/rabbitmq/errors.rs

use serde_json::Error as SerdeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RabbitMQError {
    #[error("RabbitMQ connection error: {0}")]
    ConnectionError(String),

    #[error("Not connected to RabbitMQ")]
    NotConnected,

    #[error("RabbitMQ channel error: {0}")]
    ChannelError(String),

    #[error("Queue declaration error: {0}")]
    DeclareError(String),

    #[error("Message serialization error: {0}")]
    SerializationError(#[from] SerdeError),

    #[error("RabbitMQ publish error: {0}")]
    PublishError(String),

    #[error("Broker rejected publish to queue '{0}'")]
    PublishNacked(String),

    #[error("RabbitMQ consume error: {0}")]
    ConsumeError(String),

    #[error("RabbitMQ acknowledge error: {0}")]
    AckError(String),
}

// Custom Result type for RabbitMQ operations
pub type Result<T> = std::result::Result<T, RabbitMQError>;
