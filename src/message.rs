use chrono::{Local, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const READABLE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A synthetic transaction as it travels over the queue.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct TransactionMessage {
    pub order_id: u64,
    pub amount: f64,
    /// Unix epoch seconds.
    pub timestamp: f64,
}

/// Why a delivered payload could not be turned into a processed transaction.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("{0}")]
    Decode(#[source] serde_json::Error),

    #[error("malformed transaction fields: {0}")]
    MalformedFields(#[source] serde_json::Error),

    #[error("order id must be positive, got {0}")]
    InvalidOrderId(u64),

    #[error("amount {0} is not a finite number")]
    InvalidAmount(f64),

    #[error("timestamp {0} cannot be represented as a local date-time")]
    InvalidTimestamp(f64),
}

impl ProcessingError {
    /// Payloads that are not JSON at all will never succeed on redelivery.
    pub fn is_permanent(&self) -> bool {
        matches!(self, ProcessingError::Decode(_))
    }
}

/// A transaction that passed validation, ready to be logged.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessedTransaction {
    pub message: TransactionMessage,
    pub readable_time: String,
}

impl TransactionMessage {
    pub fn new(order_id: u64, amount: f64, timestamp: f64) -> Self {
        Self {
            order_id,
            amount,
            timestamp,
        }
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Two-step decode: the body must be JSON, and that JSON must carry
    /// well-typed transaction fields. Only the first step is permanent.
    pub fn decode(body: &[u8]) -> Result<Self, ProcessingError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(ProcessingError::Decode)?;
        serde_json::from_value(value)
            .map_err(ProcessingError::MalformedFields)
    }

    pub fn validate(&self) -> Result<(), ProcessingError> {
        if self.order_id == 0 {
            return Err(ProcessingError::InvalidOrderId(self.order_id));
        }
        if !self.amount.is_finite() {
            return Err(ProcessingError::InvalidAmount(self.amount));
        }
        Ok(())
    }

    pub fn readable_time(&self) -> Result<String, ProcessingError> {
        readable_time(self.timestamp)
            .ok_or(ProcessingError::InvalidTimestamp(self.timestamp))
    }

    pub fn process(self) -> Result<ProcessedTransaction, ProcessingError> {
        self.validate()?;
        let readable_time = self.readable_time()?;
        Ok(ProcessedTransaction {
            message: self,
            readable_time,
        })
    }
}

/// Decode, validate and render a raw delivery body.
pub fn process_payload(body: &[u8]) -> Result<ProcessedTransaction, ProcessingError> {
    TransactionMessage::decode(body)?.process()
}

/// Formats epoch seconds in the local timezone, `None` when out of range.
pub fn readable_time(timestamp: f64) -> Option<String> {
    if !timestamp.is_finite() {
        return None;
    }

    let secs = timestamp.floor();
    let nanos = ((timestamp - secs) * 1e9).min(999_999_999.0) as u32;
    Local
        .timestamp_opt(secs as i64, nanos)
        .single()
        .map(|dt| dt.format(READABLE_TIME_FORMAT).to_string())
}

pub fn epoch_seconds_now() -> f64 {
    let now = Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0
}

/// Produces demo transactions: order ids 1000..=9999, amounts 10.00..500.00.
pub struct TransactionGenerator {
    rng: StdRng,
}

impl Default for TransactionGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionGenerator {
    pub const ORDER_IDS: std::ops::RangeInclusive<u64> = 1000..=9999;
    pub const MIN_AMOUNT: f64 = 10.0;
    pub const MAX_AMOUNT: f64 = 500.0;

    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn next_message(&mut self) -> TransactionMessage {
        let order_id = self.rng.random_range(Self::ORDER_IDS);
        let amount = self.rng.random_range(Self::MIN_AMOUNT..=Self::MAX_AMOUNT);

        TransactionMessage::new(order_id, round_cents(amount), epoch_seconds_now())
    }
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
