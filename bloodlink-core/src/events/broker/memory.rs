use super::{Broker, BrokerError, Delivery, SUBSCRIPTION_BUFFER};
use crate::events::{DomainEvent, Topic};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::{Mutex, mpsc, watch};

/// In-process retained log.
///
/// An event's offset is its position in the log plus one. Subscribers skip
/// what their group has committed and are woken through a watch channel
/// carrying the log length.
pub struct MemoryBroker {
    inner: Arc<Inner>,
}

struct Inner {
    log: Mutex<Vec<DomainEvent>>,
    committed: Mutex<HashMap<(String, Topic), i64>>,
    length_tx: watch::Sender<usize>,
    failing_connects: AtomicU32,
    failing_publishes: AtomicBool,
    connect_attempts: AtomicU32,
}

impl MemoryBroker {
    pub fn new() -> Self {
        let (length_tx, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                log: Mutex::new(Vec::new()),
                committed: Mutex::new(HashMap::new()),
                length_tx,
                failing_connects: AtomicU32::new(0),
                failing_publishes: AtomicBool::new(false),
                connect_attempts: AtomicU32::new(0),
            }),
        }
    }

    /// Fail the next `count` connection attempts.
    pub fn fail_next_connects(&self, count: u32) {
        self.inner.failing_connects.store(count, Ordering::SeqCst);
    }

    pub fn fail_publishes(&self, fail: bool) {
        self.inner.failing_publishes.store(fail, Ordering::SeqCst);
    }

    pub fn connect_attempts(&self) -> u32 {
        self.inner.connect_attempts.load(Ordering::SeqCst)
    }

    /// Snapshot of everything published so far.
    pub async fn retained(&self) -> Vec<DomainEvent> {
        self.inner.log.lock().await.clone()
    }

    pub async fn committed(&self, group: &str, topic: Topic) -> Option<i64> {
        let committed = self.inner.committed.lock().await;
        committed.get(&(group.to_owned(), topic)).copied()
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn connect(&self) -> Result<(), BrokerError> {
        self.inner.connect_attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .inner
            .failing_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match failing {
            Ok(_) => Err(BrokerError::Connect("memory broker refused connection".into())),
            Err(_) => Ok(()),
        }
    }

    async fn publish(&self, event: &DomainEvent) -> Result<(), BrokerError> {
        if self.inner.failing_publishes.load(Ordering::SeqCst) {
            return Err(BrokerError::Publish("memory broker rejected publish".into()));
        }
        let mut log = self.inner.log.lock().await;
        log.push(event.clone());
        self.inner.length_tx.send_replace(log.len());
        Ok(())
    }

    async fn subscribe(
        &self,
        group: &str,
        topics: &[Topic],
    ) -> Result<mpsc::Receiver<Delivery>, BrokerError> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let inner = Arc::clone(&self.inner);
        let topics = topics.to_vec();
        let resume: HashMap<Topic, i64> = {
            let committed = inner.committed.lock().await;
            topics
                .iter()
                .filter_map(|t| committed.get(&(group.to_owned(), *t)).map(|o| (*t, *o)))
                .collect()
        };
        let mut length_rx = inner.length_tx.subscribe();

        tokio::spawn(async move {
            let mut cursor = 0;
            loop {
                let batch: Vec<Delivery> = {
                    let log = inner.log.lock().await;
                    let batch = log[cursor..]
                        .iter()
                        .zip(cursor as i64 + 1..)
                        .filter(|(e, offset)| {
                            topics.contains(&e.topic)
                                && resume.get(&e.topic).is_none_or(|done| offset > done)
                        })
                        .map(|(e, offset)| Delivery {
                            event: e.clone(),
                            offset,
                        })
                        .collect();
                    cursor = log.len();
                    batch
                };
                for delivery in batch {
                    if tx.send(delivery).await.is_err() {
                        return;
                    }
                }
                tokio::select! {
                    _ = tx.closed() => return,
                    changed = length_rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn commit(&self, group: &str, topic: Topic, offset: i64) -> Result<(), BrokerError> {
        let mut committed = self.inner.committed.lock().await;
        let entry = committed.entry((group.to_owned(), topic)).or_insert(0);
        *entry = (*entry).max(offset);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_subscribe_replays_then_follows() {
        let broker = MemoryBroker::new();
        broker
            .publish(&DomainEvent::new(Topic::BloodRequests, json!(1)))
            .await
            .unwrap();
        broker
            .publish(&DomainEvent::new(Topic::EmailNotifications, json!(2)))
            .await
            .unwrap();

        let mut rx = broker
            .subscribe("app", &[Topic::BloodRequests])
            .await
            .unwrap();
        let first = rx.recv().await.unwrap();
        assert_eq!(first.event.payload, json!(1));
        assert_eq!(first.offset, 1);

        broker
            .publish(&DomainEvent::new(Topic::BloodRequests, json!(3)))
            .await
            .unwrap();
        let next = rx.recv().await.unwrap();
        assert_eq!(next.event.payload, json!(3));
        assert_eq!(next.offset, 3);
    }

    #[tokio::test]
    async fn test_resubscribe_skips_committed_events() {
        let broker = MemoryBroker::new();
        for n in 1..=3 {
            broker
                .publish(&DomainEvent::new(Topic::EmailNotifications, json!(n)))
                .await
                .unwrap();
        }

        let mut rx = broker
            .subscribe("app", &[Topic::EmailNotifications])
            .await
            .unwrap();
        for _ in 0..2 {
            let delivery = rx.recv().await.unwrap();
            broker
                .commit("app", delivery.event.topic, delivery.offset)
                .await
                .unwrap();
        }
        drop(rx);

        let mut rx = broker
            .subscribe("app", &[Topic::EmailNotifications])
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap().event.payload, json!(3));

        // Other groups keep their own position.
        let mut other = broker
            .subscribe("audit", &[Topic::EmailNotifications])
            .await
            .unwrap();
        assert_eq!(other.recv().await.unwrap().event.payload, json!(1));
    }

    #[tokio::test]
    async fn test_commit_never_moves_backwards() {
        let broker = MemoryBroker::new();
        broker.commit("app", Topic::BloodRequests, 5).await.unwrap();
        broker.commit("app", Topic::BloodRequests, 2).await.unwrap();
        assert_eq!(broker.committed("app", Topic::BloodRequests).await, Some(5));
        assert_eq!(broker.committed("app", Topic::DonationOffers).await, None);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let broker = MemoryBroker::new();
        broker.fail_next_connects(1);
        assert!(broker.connect().await.is_err());
        assert!(broker.connect().await.is_ok());
        assert_eq!(broker.connect_attempts(), 2);

        broker.fail_publishes(true);
        let event = DomainEvent::new(Topic::DonationOffers, json!({}));
        assert!(matches!(
            broker.publish(&event).await,
            Err(BrokerError::Publish(_))
        ));
        assert!(broker.retained().await.is_empty());
    }
}
