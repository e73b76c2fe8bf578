//! HTTP API: routers, handlers and their shared plumbing.

pub mod blood;
mod dto;
pub mod error;
pub mod extractors;
pub mod notifications;
pub mod users;
pub mod ws;
