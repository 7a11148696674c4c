use tracing::{error, info, warn};

use crate::logging::LogContext;
use crate::message::process_payload;
use crate::rabbitmq::{
    Acknowledger, DeliveryMeta, Disposition, QueueConsumer, RabbitMQError, Result,
};

/// Decides and applies the outcome of each delivered transaction.
#[derive(Debug, Clone, Default)]
pub struct TransactionHandler {
    max_redeliveries: Option<u32>,
}

impl TransactionHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop requeueing once the broker reports this many earlier attempts.
    /// Only quorum queues send the delivery count header this relies on.
    pub fn with_max_redeliveries(mut self, max_redeliveries: Option<u32>) -> Self {
        self.max_redeliveries = max_redeliveries;
        self
    }

    pub fn classify(&self, body: &[u8], meta: &DeliveryMeta) -> Disposition {
        match process_payload(body) {
            Ok(processed) => {
                let tx = &processed.message;
                info!(
                    "Transaction processed - Order ID: {}, Amount: ${:.2}, Timestamp: {} ({})",
                    tx.order_id, tx.amount, processed.readable_time, tx.timestamp
                );
                Disposition::Ack
            }
            Err(e) if e.is_permanent() => {
                error!(
                    delivery_tag = meta.delivery_tag,
                    "Failed to decode message: {}",
                    e
                );
                Disposition::NackDiscard
            }
            Err(e) => {
                error!(
                    delivery_tag = meta.delivery_tag,
                    redelivered = meta.redelivered,
                    "Error processing transaction: {}",
                    e
                );
                if self.redelivery_limit_reached(meta) {
                    error!(
                        delivery_tag = meta.delivery_tag,
                        "Giving up after {} redeliveries, discarding message",
                        meta.delivery_count.unwrap_or_default()
                    );
                    Disposition::NackDiscard
                } else {
                    Disposition::NackRequeue
                }
            }
        }
    }

    fn redelivery_limit_reached(&self, meta: &DeliveryMeta) -> bool {
        match (self.max_redeliveries, meta.delivery_count) {
            (Some(max), Some(count)) => count >= max,
            _ => false,
        }
    }

    /// Classifies the delivery, logs it, then settles it with the broker.
    pub async fn handle<A: Acknowledger + ?Sized>(
        &self,
        body: &[u8],
        meta: &DeliveryMeta,
        acker: &A,
    ) -> Result<Disposition> {
        let disposition = self.classify(body, meta);
        disposition.apply(acker).await?;
        Ok(disposition)
    }
}

/// Handles deliveries one at a time until the subscription ends.
pub async fn run(
    log: &LogContext,
    subscription: &mut QueueConsumer,
    handler: &TransactionHandler,
) -> Result<()> {
    log_start(log, subscription.queue());

    while let Some(delivery) = subscription.next_delivery().await {
        let delivery = delivery?;
        let meta = DeliveryMeta::from(&delivery);
        handler.handle(&delivery.data, &meta, &delivery).await?;
    }

    warn!("Subscription {} was cancelled", subscription.tag());
    Err(RabbitMQError::ConsumeError(format!(
        "consumer {} stopped receiving deliveries",
        subscription.tag()
    )))
}

fn log_start(log: &LogContext, queue: &str) {
    info!("Consumer started. Waiting for messages on '{}'...", queue);
    info!("Logging to {}", log.log_file().display());
}
