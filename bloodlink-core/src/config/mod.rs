//! Runtime configuration shared between the core workflows and the server.
//!
//! Parsing lives in the server crate; these are the validated values.

mod config_store;
mod fanout;

pub use config_store::ConfigStore;
pub use fanout::{EmailDelivery, FanoutConfig, RetryPolicy};
