//! Durable event log.

mod memory;
mod postgres;

pub use memory::MemoryBroker;
pub use postgres::PgBroker;

use super::{DomainEvent, Topic};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Buffer between a subscription's reader task and its consumer.
pub const SUBSCRIPTION_BUFFER: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("broker connection failed: {0}")]
    Connect(String),
    #[error("broker publish failed: {0}")]
    Publish(String),
    #[error("broker database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// An event read from the log, with its position for committing.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub event: DomainEvent,
    /// Increases with every append across all topics.
    pub offset: i64,
}

/// An append-only, topic-partitioned event log with per-group offsets.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Verify the broker is reachable.
    async fn connect(&self) -> Result<(), BrokerError>;

    async fn publish(&self, event: &DomainEvent) -> Result<(), BrokerError>;

    /// Stream the events on `topics` that `group` has not committed, oldest
    /// first, then follow new ones. The stream ends when the receiver is
    /// dropped.
    async fn subscribe(
        &self,
        group: &str,
        topics: &[Topic],
    ) -> Result<mpsc::Receiver<Delivery>, BrokerError>;

    /// Mark everything on `topic` up to `offset` as handled by `group`.
    /// Offsets never move backwards.
    async fn commit(&self, group: &str, topic: Topic, offset: i64) -> Result<(), BrokerError>;
}

/// A consumer group's stream plus the handle to commit what it handled.
pub struct Subscription {
    broker: Arc<dyn Broker>,
    group: String,
    deliveries: mpsc::Receiver<Delivery>,
}

impl Subscription {
    pub fn new(
        broker: Arc<dyn Broker>,
        group: String,
        deliveries: mpsc::Receiver<Delivery>,
    ) -> Self {
        Self {
            broker,
            group,
            deliveries,
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub async fn recv(&mut self) -> Option<Delivery> {
        self.deliveries.recv().await
    }

    pub async fn commit(&self, delivery: &Delivery) -> Result<(), BrokerError> {
        self.broker
            .commit(&self.group, delivery.event.topic, delivery.offset)
            .await
    }
}
