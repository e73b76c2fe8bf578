//! Application state shared across all request handlers.

use bloodlink_core::config::{ConfigStore, FanoutConfig};
use bloodlink_core::email::EmailSender;
use bloodlink_core::events::{BroadcastHub, EventBus};
use bloodlink_core::matching::DonorMatcher;
use bloodlink_core::processors::{
    AcceptanceCoordinator, DonorLedger, FanoutDispatcher, NotificationInbox, RequestIntake,
};
use bloodlink_core::store::Stores;
use std::sync::Arc;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub intake: Arc<RequestIntake>,
    pub acceptance: Arc<AcceptanceCoordinator>,
    pub ledger: Arc<DonorLedger>,
    pub inbox: Arc<NotificationInbox>,
    pub matcher: DonorMatcher,
    /// Fan-out target of the `/ws` endpoint.
    pub hub: Arc<BroadcastHub>,
}

impl AppState {
    /// Wire the workflows on top of the given stores and event bus.
    ///
    /// `fanout_config` is shared with the SIGHUP handler, so reloaded
    /// notification settings apply to the next fan-out.
    pub fn new(
        stores: Stores,
        hub: Arc<BroadcastHub>,
        email: Arc<dyn EmailSender>,
        bus: Arc<EventBus>,
        fanout_config: ConfigStore<FanoutConfig>,
    ) -> Self {
        let matcher = DonorMatcher::new(stores.users.clone());
        let dispatcher = Arc::new(FanoutDispatcher::new(
            stores.notifications.clone(),
            email,
            bus.clone(),
            fanout_config,
        ));
        let intake = RequestIntake::new(
            stores.requests.clone(),
            matcher.clone(),
            dispatcher,
            bus.clone(),
        );
        let acceptance = AcceptanceCoordinator::new(
            stores.users.clone(),
            stores.requests.clone(),
            stores.notifications.clone(),
            bus,
        );
        let ledger = DonorLedger::new(stores.users.clone(), stores.requests.clone());
        let inbox = NotificationInbox::new(stores.notifications.clone());

        Self {
            intake: Arc::new(intake),
            acceptance: Arc::new(acceptance),
            ledger: Arc::new(ledger),
            inbox: Arc::new(inbox),
            matcher,
            hub,
            stores,
        }
    }
}
