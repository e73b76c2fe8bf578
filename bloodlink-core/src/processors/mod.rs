//! Workflows and background loops.
//!
//! - `RequestIntake`: persists a request, publishes it, matches donors and
//!   hands them to `FanoutDispatcher`
//! - `AcceptanceCoordinator`: records a donor's acceptance and settles the
//!   notifications around it
//! - `DonorLedger`: donation confirmation and availability
//! - `NotificationInbox`: read/status management for a user's notifications
//! - `EventConsumer`: routes broker events to realtime clients and email

pub mod acceptance;
pub mod donation;
pub mod event_consumer;
pub mod fanout;
pub mod inbox;
pub mod intake;

pub use acceptance::{
    AcceptCommand, AcceptError, Acceptance, AcceptanceCoordinator, AcceptingDonor, DonorRef,
    NewDonorProfile,
};
pub use donation::{DonationError, DonorLedger};
pub use event_consumer::{CONSUMER_GROUP, EventConsumer};
pub use fanout::{DispatchReport, FanoutDispatcher};
pub use inbox::{InboxError, NotificationInbox};
pub use intake::{IntakeError, IntakeOutcome, NewRequestCommand, RequestIntake};
