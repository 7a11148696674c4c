//! Transaction producer and consumer exchanging JSON messages through a
//! durable RabbitMQ queue.
//!
//! The `producer` binary publishes one persistent message per interval; the
//! `consumer` binary acknowledges good messages, discards undecodable ones and
//! requeues messages that fail processing.

pub mod consumer;
pub mod env;
pub mod logging;
pub mod message;
pub mod producer;
pub mod rabbitmq;

pub use env::{Config, QUEUE_NAME};
pub use logging::LogContext;
pub use message::{TransactionGenerator, TransactionMessage};
