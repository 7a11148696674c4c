use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use crate::logging::LogContext;
use crate::message::{readable_time, TransactionGenerator, TransactionMessage};
use crate::rabbitmq::{MessagePublisher, Result};

/// Publishes one generated transaction per tick.
pub struct Producer<P> {
    publisher: P,
    interval: Duration,
}

impl<P: MessagePublisher> Producer<P> {
    pub fn new(publisher: P, interval: Duration) -> Self {
        Self { publisher, interval }
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Serializes and publishes a single message, then logs it.
    pub async fn publish_transaction(&self, message: &TransactionMessage) -> Result<()> {
        let payload = message.to_bytes()?;
        self.publisher.publish(&payload).await?;

        let readable = readable_time(message.timestamp)
            .unwrap_or_else(|| "invalid".to_string());
        info!(
            "Transaction sent - Order ID: {}, Amount: ${:.2}, Timestamp: {} ({})",
            message.order_id, message.amount, readable, message.timestamp
        );
        Ok(())
    }

    /// Runs until a publish fails; publish errors are never retried.
    pub async fn run(&self, log: &LogContext, generator: &mut TransactionGenerator) -> Result<()> {
        info!(
            "Producer started. Sending messages to '{}' every {:?}...",
            self.publisher.queue(),
            self.interval
        );
        info!("Logging to {}", log.log_file().display());

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let message = generator.next_message();
            self.publish_transaction(&message).await?;
            println!(" [x] Sent Order {}", message.order_id);
        }
    }
}
