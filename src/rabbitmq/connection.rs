use lapin::{Connection, ConnectionProperties};
use tracing::{debug, info};

use super::errors::{RabbitMQError, Result};
use super::retry::RetryPolicy;
use crate::env::BrokerConfig;

/// Owns the single broker connection of a process.
pub struct ConnectionManager {
    broker: BrokerConfig,
    retry_policy: RetryPolicy,
    connection: Option<Connection>,
}

impl ConnectionManager {
    pub fn new(broker: BrokerConfig) -> Self {
        ConnectionManager {
            broker,
            retry_policy: RetryPolicy::default(),
            connection: None,
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Returns the live connection, establishing it first if needed.
    pub async fn get_connection(&mut self) -> Result<&Connection> {
        let connected = self
            .connection
            .as_ref()
            .is_some_and(|conn| conn.status().connected());

        if !connected {
            self.establish_connection().await?;
        }
        self.connection()
    }

    pub fn connection(&self) -> Result<&Connection> {
        self.connection.as_ref().ok_or(RabbitMQError::NotConnected)
    }

    async fn establish_connection(&mut self) -> Result<()> {
        info!("Connecting to RabbitMQ at {}...", self.broker.display_addr());
        let uri = self.broker.amqp_uri();

        let connection = self
            .retry_policy
            .retry(|attempt| {
                debug!(attempt, "Opening AMQP connection");
                Connection::connect_uri(uri.clone(), ConnectionProperties::default())
            })
            .await
            .map_err(|e| RabbitMQError::ConnectionError(e.to_string()))?;

        info!("Successfully connected to RabbitMQ");
        self.connection = Some(connection);
        Ok(())
    }

    pub async fn create_channel(&self) -> Result<lapin::Channel> {
        self.connection()?
            .create_channel()
            .await
            .map_err(|e| RabbitMQError::ChannelError(e.to_string()))
    }

    // Method for properly closing the connection when needed
    pub async fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.connection.take() {
            if conn.status().connected() {
                info!("Closing RabbitMQ connection gracefully");
                conn.close(200, "Closing connection")
                    .await
                    .map_err(|e| RabbitMQError::ConnectionError(e.to_string()))?;
            }
        }
        Ok(())
    }
}
