//! In-memory stand-in for the broker: durable queues with manual
//! acknowledgment, requeue-to-front and a dead-letter list.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rabbit_transactions::rabbitmq::{
    Acknowledger, DeliveryMeta, MessagePublisher, QueueSpec, QueueType, RabbitMQError, Result,
};

#[derive(Clone)]
struct StoredMessage {
    body: Vec<u8>,
    delivery_count: u32,
}

#[derive(Default)]
struct MemoryQueue {
    durable: bool,
    queue_type: Option<QueueType>,
    ready: VecDeque<StoredMessage>,
    unacked: HashMap<u64, StoredMessage>,
    dead_lettered: Vec<StoredMessage>,
}

#[derive(Default)]
struct BrokerState {
    queues: HashMap<String, MemoryQueue>,
    next_tag: u64,
}

#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirrors AMQP semantics: redeclaring with the same parameters is a
    /// no-op, different parameters are a precondition failure.
    pub fn declare(&self, spec: &QueueSpec) -> Result<u32> {
        let mut state = self.state.lock().unwrap();
        match state.queues.get(&spec.name) {
            Some(queue) if !queue.declared_as(spec) => Err(RabbitMQError::DeclareError(format!(
                "PRECONDITION_FAILED - inequivalent args for queue '{}'",
                spec.name
            ))),
            Some(queue) => Ok(queue.ready.len() as u32),
            None => {
                state.queues.insert(
                    spec.name.clone(),
                    MemoryQueue {
                        durable: spec.durable,
                        queue_type: spec.queue_type,
                        ..MemoryQueue::default()
                    },
                );
                Ok(0)
            }
        }
    }

    pub fn publisher(&self, queue: &str) -> MemoryPublisher {
        MemoryPublisher {
            broker: self.clone(),
            queue: queue.to_string(),
        }
    }

    pub fn deliver(&self, queue: &str) -> Option<MemoryDelivery> {
        let mut state = self.state.lock().unwrap();
        state.next_tag += 1;
        let tag = state.next_tag;

        let queue_state = state.queues.get_mut(queue)?;
        let message = queue_state.ready.pop_front()?;
        queue_state.unacked.insert(tag, message.clone());

        Some(MemoryDelivery {
            broker: self.clone(),
            queue: queue.to_string(),
            body: message.body,
            meta: DeliveryMeta {
                delivery_tag: tag,
                redelivered: message.delivery_count > 0,
                delivery_count: Some(message.delivery_count),
            },
        })
    }

    pub fn ready(&self, queue: &str) -> usize {
        self.with_queue(queue, |q| q.ready.len())
    }

    pub fn unacked(&self, queue: &str) -> usize {
        self.with_queue(queue, |q| q.unacked.len())
    }

    pub fn dead_lettered(&self, queue: &str) -> usize {
        self.with_queue(queue, |q| q.dead_lettered.len())
    }

    fn with_queue<T: Default>(&self, queue: &str, f: impl FnOnce(&MemoryQueue) -> T) -> T {
        let state = self.state.lock().unwrap();
        state.queues.get(queue).map(f).unwrap_or_default()
    }

    fn settle(&self, queue: &str, tag: u64, outcome: Settle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let queue_state = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| RabbitMQError::AckError(format!("no queue '{}'", queue)))?;
        let mut message = queue_state
            .unacked
            .remove(&tag)
            .ok_or_else(|| RabbitMQError::AckError(format!("unknown delivery tag {}", tag)))?;

        match outcome {
            Settle::Ack => {}
            Settle::Requeue => {
                message.delivery_count += 1;
                queue_state.ready.push_front(message);
            }
            Settle::Discard => queue_state.dead_lettered.push(message),
        }
        Ok(())
    }
}

impl MemoryQueue {
    fn declared_as(&self, spec: &QueueSpec) -> bool {
        self.durable == spec.durable && self.queue_type == spec.queue_type
    }
}

enum Settle {
    Ack,
    Requeue,
    Discard,
}

pub struct MemoryPublisher {
    broker: MemoryBroker,
    queue: String,
}

#[async_trait]
impl MessagePublisher for MemoryPublisher {
    async fn publish(&self, payload: &[u8]) -> Result<()> {
        let mut state = self.broker.state.lock().unwrap();
        let queue = state
            .queues
            .get_mut(&self.queue)
            .ok_or_else(|| RabbitMQError::PublishError(format!("no queue {}", self.queue)))?;
        queue.ready.push_back(StoredMessage {
            body: payload.to_vec(),
            delivery_count: 0,
        });
        Ok(())
    }

    fn queue(&self) -> &str {
        &self.queue
    }
}

pub struct MemoryDelivery {
    broker: MemoryBroker,
    queue: String,
    pub body: Vec<u8>,
    pub meta: DeliveryMeta,
}

#[async_trait]
impl Acknowledger for MemoryDelivery {
    async fn ack_message(&self) -> Result<()> {
        self.broker.settle(&self.queue, self.meta.delivery_tag, Settle::Ack)
    }

    async fn nack_message(&self, requeue: bool) -> Result<()> {
        let outcome = if requeue {
            Settle::Requeue
        } else {
            Settle::Discard
        };
        self.broker.settle(&self.queue, self.meta.delivery_tag, outcome)
    }
}
