//! Broker consumption loop.
//!
//! Reads every topic from where the consumer group left off and hands each
//! event to the [`LocalRouter`], the same routing the bus uses when it cannot
//! reach the broker. Offsets are committed after each event is routed.

use crate::events::{LocalRouter, Subscription};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Consumer group used by the server.
pub const CONSUMER_GROUP: &str = "bloodlink";

pub struct EventConsumer {
    router: Arc<LocalRouter>,
    subscription: Subscription,
    shutdown_rx: watch::Receiver<bool>,
}

impl EventConsumer {
    pub fn new(
        router: Arc<LocalRouter>,
        subscription: Subscription,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            router,
            subscription,
            shutdown_rx,
        }
    }

    pub async fn run(mut self) {
        info!(group = self.subscription.group(), "EventConsumer started");

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("EventConsumer received shutdown signal");
                        break;
                    }
                }

                Some(delivery) = self.subscription.recv() => {
                    let topic = delivery.event.topic;
                    debug!(%topic, offset = delivery.offset, "Consumed broker event");
                    self.router.route(&delivery.event).await;
                    if let Err(e) = self.subscription.commit(&delivery).await {
                        warn!(
                            %topic,
                            offset = delivery.offset,
                            error = %e,
                            "Failed to commit offset"
                        );
                    }
                }

                else => {
                    info!("Broker subscription closed");
                    break;
                }
            }
        }

        info!("EventConsumer shutdown complete");
    }
}
