use super::broker::{Broker, Subscription};
use super::realtime::RealtimeBroadcaster;
use super::types::{DomainEvent, Topic};
use crate::config::RetryPolicy;
use crate::email::{EmailMessage, EmailSender};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Delivers an event to its in-process destinations.
///
/// Shared by the fallback path of [`EventBus::publish`] and by the broker
/// consumer loop.
pub struct LocalRouter {
    realtime: Arc<dyn RealtimeBroadcaster>,
    email: Arc<dyn EmailSender>,
}

impl LocalRouter {
    pub fn new(realtime: Arc<dyn RealtimeBroadcaster>, email: Arc<dyn EmailSender>) -> Self {
        Self { realtime, email }
    }

    pub async fn route(&self, event: &DomainEvent) {
        if let Some(name) = event.topic.realtime_event() {
            self.realtime.emit(name, &event.payload);
        }
        if event.topic == Topic::EmailNotifications {
            let message: EmailMessage = match serde_json::from_value(event.payload.clone()) {
                Ok(message) => message,
                Err(e) => {
                    warn!(error = %e, "Dropping malformed email event");
                    return;
                }
            };
            if let Err(e) = self.email.send(&message).await {
                warn!(to = %message.to, error = %e, "Queued email delivery failed");
            }
        }
    }
}

/// Publishes domain events, degrading to local routing without a broker.
pub struct EventBus {
    broker: Option<Arc<dyn Broker>>,
    router: Arc<LocalRouter>,
    connected: AtomicBool,
}

impl EventBus {
    pub fn new(broker: Option<Arc<dyn Broker>>, router: Arc<LocalRouter>) -> Self {
        Self {
            broker,
            router,
            connected: AtomicBool::new(false),
        }
    }

    /// A bus with no broker: every event is routed locally.
    pub fn local(router: Arc<LocalRouter>) -> Self {
        Self::new(None, router)
    }

    /// Try to reach the broker, retrying with a fixed backoff.
    ///
    /// Returns whether the bus ended up connected. Failure is not an error:
    /// the bus keeps working through local routing.
    pub async fn connect(&self, policy: RetryPolicy) -> bool {
        let Some(broker) = &self.broker else {
            info!("No broker configured, events are routed locally");
            return false;
        };
        for attempt in 0..=policy.retries {
            match broker.connect().await {
                Ok(()) => {
                    self.connected.store(true, Ordering::Release);
                    info!(attempt, "Connected to broker");
                    return true;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Broker connection attempt failed");
                    if attempt < policy.retries {
                        tokio::time::sleep(policy.backoff).await;
                    }
                }
            }
        }
        warn!("Broker unreachable, falling back to local routing");
        false
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn router(&self) -> Arc<LocalRouter> {
        Arc::clone(&self.router)
    }

    /// Publish an event. Never fails.
    pub async fn publish(&self, topic: Topic, payload: serde_json::Value) {
        let event = DomainEvent::new(topic, payload);
        if self.is_connected() {
            if let Some(broker) = &self.broker {
                match broker.publish(&event).await {
                    Ok(()) => {
                        debug!(topic = %topic, "Event published to broker");
                        return;
                    }
                    Err(e) => {
                        warn!(topic = %topic, error = %e, "Broker publish failed, routing locally");
                    }
                }
            }
        }
        self.router.route(&event).await;
    }

    pub async fn publish_json<T: Serialize>(&self, topic: Topic, payload: &T) {
        match serde_json::to_value(payload) {
            Ok(value) => self.publish(topic, value).await,
            Err(e) => warn!(topic = %topic, error = %e, "Failed to serialize event payload"),
        }
    }

    /// Subscribe `group` to every topic, resuming after its committed offsets.
    ///
    /// `None` when the bus is not connected or the subscription fails.
    pub async fn subscribe_all(&self, group: &str) -> Option<Subscription> {
        if !self.is_connected() {
            return None;
        }
        let broker = self.broker.as_ref()?;
        match broker.subscribe(group, &Topic::ALL).await {
            Ok(rx) => Some(Subscription::new(Arc::clone(broker), group.to_owned(), rx)),
            Err(e) => {
                warn!(error = %e, "Failed to subscribe to broker topics");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::EmailTemplate;
    use crate::email::testing::RecordingEmailSender as Outbox;
    use crate::events::{BroadcastHub, MemoryBroker};
    use serde_json::json;
    use std::time::Duration;

    fn router(hub: &Arc<BroadcastHub>, outbox: &Arc<Outbox>) -> Arc<LocalRouter> {
        Arc::new(LocalRouter::new(hub.clone(), outbox.clone()))
    }

    #[tokio::test]
    async fn test_disconnected_publish_broadcasts_once() {
        let hub = Arc::new(BroadcastHub::default());
        let outbox = Arc::new(Outbox::default());
        let mut frames = hub.subscribe();
        let bus = EventBus::local(router(&hub, &outbox));

        let payload = json!({"requestId": "r-1", "bloodType": "O-"});
        bus.publish(Topic::BloodRequests, payload.clone()).await;

        let frame = frames.try_recv().unwrap();
        assert_eq!(frame.event, "blood-request-notification");
        assert_eq!(frame.payload, payload);
        assert!(frames.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_retries_then_gives_up() {
        let hub = Arc::new(BroadcastHub::default());
        let outbox = Arc::new(Outbox::default());
        let broker = Arc::new(MemoryBroker::new());
        broker.fail_next_connects(10);
        let bus = EventBus::new(Some(broker.clone()), router(&hub, &outbox));

        let policy = RetryPolicy {
            retries: 3,
            backoff: Duration::from_millis(100),
        };
        assert!(!bus.connect(policy).await);
        assert_eq!(broker.connect_attempts(), 4);
        assert!(!bus.is_connected());
        assert!(bus.subscribe_all("bloodlink").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_succeeds_within_retries() {
        let hub = Arc::new(BroadcastHub::default());
        let outbox = Arc::new(Outbox::default());
        let broker = Arc::new(MemoryBroker::new());
        broker.fail_next_connects(2);
        let bus = EventBus::new(Some(broker.clone()), router(&hub, &outbox));

        assert!(bus.connect(RetryPolicy::default()).await);
        assert_eq!(broker.connect_attempts(), 3);
    }

    #[tokio::test]
    async fn test_connected_publish_goes_to_broker_only() {
        let hub = Arc::new(BroadcastHub::default());
        let outbox = Arc::new(Outbox::default());
        let mut frames = hub.subscribe();
        let broker = Arc::new(MemoryBroker::new());
        let bus = EventBus::new(Some(broker.clone()), router(&hub, &outbox));
        assert!(bus.connect(RetryPolicy::default()).await);

        bus.publish(Topic::DonationOffers, json!({"donorId": "d"})).await;
        assert_eq!(broker.retained().await.len(), 1);
        assert!(frames.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broker_failure_falls_back_to_local() {
        let hub = Arc::new(BroadcastHub::default());
        let outbox = Arc::new(Outbox::default());
        let mut frames = hub.subscribe();
        let broker = Arc::new(MemoryBroker::new());
        let bus = EventBus::new(Some(broker.clone()), router(&hub, &outbox));
        assert!(bus.connect(RetryPolicy::default()).await);
        broker.fail_publishes(true);

        bus.publish(Topic::DonationOffers, json!({"donorId": "d"})).await;
        let frame = frames.try_recv().unwrap();
        assert_eq!(frame.event, "donation-accepted-notification");
    }

    #[tokio::test]
    async fn test_email_topic_routes_to_sender() {
        let hub = Arc::new(BroadcastHub::default());
        let outbox = Arc::new(Outbox::default());
        let mut frames = hub.subscribe();
        let bus = EventBus::local(router(&hub, &outbox));

        let message = EmailMessage::new("donor@example.com", EmailTemplate::BloodRequest)
            .var("bloodType", "AB+");
        bus.publish_json(Topic::EmailNotifications, &message).await;

        assert_eq!(outbox.sent(), vec![message]);
        assert!(frames.try_recv().is_err());
    }
}
