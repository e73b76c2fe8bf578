//! Domain events and their delivery.
//!
//! # Event flow
//!
//! 1. A workflow calls [`EventBus::publish`] with a [`Topic`] and payload.
//! 2. When the broker is connected the event is appended to its log;
//!    otherwise it goes straight to the [`LocalRouter`].
//! 3. The consumer loop reads the log from the beginning and feeds every
//!    event to the same router.
//! 4. The router re-emits blood request and donation events to realtime
//!    clients and hands email-topic payloads to the email sender.
//!
//! Events may therefore reach realtime clients more than once; clients
//! tolerate duplicates.

pub mod broker;
mod bus;
mod realtime;
mod types;

pub use broker::{Broker, BrokerError, Delivery, MemoryBroker, PgBroker, Subscription};
pub use bus::{EventBus, LocalRouter};
pub use realtime::{BroadcastHub, RealtimeBroadcaster};
pub use types::{DomainEvent, Topic};
