use dotenv::dotenv;
use lapin::uri::{AMQPAuthority, AMQPUri, AMQPUserInfo};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::rabbitmq::{QueueSpec, QueueType, RetryPolicy};

pub const BROKER_PORT: u16 = 5672;
pub const DEFAULT_VHOST: &str = "/";
pub const QUEUE_NAME: &str = "demo_queue";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Where and as whom to connect.
#[derive(Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    pub port: u16,
    pub vhost: String,
}

impl BrokerConfig {
    pub fn amqp_uri(&self) -> AMQPUri {
        AMQPUri {
            authority: AMQPAuthority {
                userinfo: AMQPUserInfo {
                    username: self.username.clone(),
                    password: self.password.clone(),
                },
                host: self.host.clone(),
                port: self.port,
            },
            vhost: self.vhost.clone(),
            ..AMQPUri::default()
        }
    }

    /// Address safe to log; never contains the password.
    pub fn display_addr(&self) -> String {
        format!(
            "{}@{}:{} (vhost '{}')",
            self.username, self.host, self.port, self.vhost
        )
    }
}

impl fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("port", &self.port)
            .field("vhost", &self.vhost)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub broker: BrokerConfig,
    pub queue: String,
    pub queue_type: Option<QueueType>,
    pub publish_interval: Duration,
    pub log_file: PathBuf,
    pub connect_retry_interval: Duration,
    pub connect_max_attempts: Option<u32>,
    pub max_redeliveries: Option<u32>,
}

fn default_publish_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_log_file() -> PathBuf {
    PathBuf::from("transactions.log")
}

impl Config {
    /// Reads the process environment, after merging any `.env` file.
    pub fn load() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let string_or =
            |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let connect_max_attempts =
            parse_optional_count("CONNECT_MAX_ATTEMPTS", lookup("CONNECT_MAX_ATTEMPTS"))?;
        let max_redeliveries =
            parse_optional_count("MAX_REDELIVERIES", lookup("MAX_REDELIVERIES"))?;

        Ok(Config {
            broker: BrokerConfig {
                host: string_or("BROKER_HOST", "localhost"),
                username: string_or("BROKER_USER", "user"),
                password: string_or("BROKER_PASS", "password"),
                port: BROKER_PORT,
                vhost: DEFAULT_VHOST.to_string(),
            },
            queue: QUEUE_NAME.to_string(),
            queue_type: parse_queue_type(lookup("QUEUE_TYPE"))?,
            publish_interval: match lookup("PUBLISH_INTERVAL") {
                Some(val) => parse_seconds("PUBLISH_INTERVAL", &val)?,
                None => default_publish_interval(),
            },
            log_file: lookup("LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(default_log_file),
            connect_retry_interval: match lookup("CONNECT_RETRY_SECONDS") {
                Some(val) => parse_seconds("CONNECT_RETRY_SECONDS", &val)?,
                None => RetryPolicy::DEFAULT_INTERVAL,
            },
            connect_max_attempts,
            max_redeliveries,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.connect_retry_interval)
            .with_max_attempts(self.connect_max_attempts)
    }

    /// Queue parameters both processes declare; they must agree.
    pub fn queue_spec(&self) -> QueueSpec {
        QueueSpec::durable(&self.queue).with_queue_type(self.queue_type)
    }

    /// True when `MAX_REDELIVERIES` is set on a queue that never reports a
    /// delivery count, so failing messages are requeued without limit anyway.
    pub fn redelivery_cap_unenforced(&self) -> bool {
        let counted = self
            .queue_type
            .is_some_and(|queue_type| queue_type.tracks_delivery_count());
        self.max_redeliveries.is_some() && !counted
    }
}

fn parse_seconds(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason,
    };

    let seconds: f64 = value.trim().parse::<f64>().map_err(|e| invalid(e.to_string()))?;
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(invalid("must be a positive number of seconds".to_string()));
    }
    Duration::try_from_secs_f64(seconds)
        .map_err(|e| invalid(e.to_string()))
}

fn parse_optional_count(
    key: &'static str,
    value: Option<String>,
) -> Result<Option<u32>, ConfigError> {
    let Some(value) = value else {
        return Ok(None);
    };

    match value.trim().parse::<u32>() {
        Ok(0) => Err(ConfigError::InvalidValue {
            key,
            value,
            reason: "must be at least 1".to_string(),
        }),
        Ok(count) => Ok(Some(count)),
        Err(e) => Err(ConfigError::InvalidValue {
            key,
            value,
            reason: e.to_string(),
        }),
    }
}

fn parse_queue_type(value: Option<String>) -> Result<Option<QueueType>, ConfigError> {
    let Some(value) = value else {
        return Ok(None);
    };

    match value.parse() {
        Ok(queue_type) => Ok(Some(queue_type)),
        Err(reason) => Err(ConfigError::InvalidValue {
            key: "QUEUE_TYPE",
            value,
            reason,
        }),
    }
}
