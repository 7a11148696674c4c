use anyhow::{Context, Result};
use tracing::{info, warn};

use rabbit_transactions::consumer::{self, TransactionHandler};
use rabbit_transactions::rabbitmq::consumer::DELIVERY_COUNT_HEADER;
use rabbit_transactions::rabbitmq::{
    ChannelConfig, ChannelManager, ConnectionManager, QueueConsumer,
};
use rabbit_transactions::{Config, LogContext};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = Config::load().context("Invalid consumer configuration")?;
    let log = LogContext::init("consumer", &config.log_file)?;

    if config.redelivery_cap_unenforced() {
        warn!(
            "MAX_REDELIVERIES is ignored: only quorum queues report {} (set QUEUE_TYPE=quorum)",
            DELIVERY_COUNT_HEADER
        );
    }

    let mut connections = ConnectionManager::new(config.broker.clone())
        .with_retry_policy(config.retry_policy());
    connections.get_connection().await?;

    let channel = ChannelManager::new(ChannelConfig::consumer())
        .open(&connections)
        .await?;
    config.queue_spec().declare(&channel).await?;

    let handler = TransactionHandler::new()
        .with_max_redeliveries(config.max_redeliveries);
    let mut subscription = QueueConsumer::subscribe(&channel, &config.queue).await?;

    tokio::select! {
        result = consumer::run(&log, &mut subscription, &handler) => {
            result.context("Consuming failed")?
        }
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, shutting down consumer"),
    }

    connections.close().await?;
    Ok(())
}
