use anyhow::{Context, Result};
use tracing::info;

use rabbit_transactions::producer::Producer;
use rabbit_transactions::rabbitmq::{
    ChannelConfig, ChannelManager, ConnectionManager, QueuePublisher,
};
use rabbit_transactions::{Config, LogContext, TransactionGenerator};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = Config::load().context("Invalid producer configuration")?;
    let log = LogContext::init("producer", &config.log_file)?;

    let mut connections = ConnectionManager::new(config.broker.clone())
        .with_retry_policy(config.retry_policy());
    connections.get_connection().await?;

    let channel = ChannelManager::new(ChannelConfig::publisher())
        .open(&connections)
        .await?;
    config.queue_spec().declare(&channel).await?;

    let publisher = QueuePublisher::new(channel, &config.queue);
    let producer = Producer::new(publisher, config.publish_interval);
    let mut generator = TransactionGenerator::new();

    tokio::select! {
        result = producer.run(&log, &mut generator) => result.context("Publishing failed")?,
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, shutting down producer"),
    }

    connections.close().await?;
    Ok(())
}
