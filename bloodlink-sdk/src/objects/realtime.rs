//! Real-time channel types.
//!
//! The `GET /ws` endpoint upgrades to a WebSocket and pushes one
//! [`RealtimeFrame`] per broadcast:
//!
//! ```json
//! {"event":"blood-request-notification","payload":{ ... }}
//! ```
//!
//! Delivery is best effort. A client that is not connected when an event is
//! broadcast never sees it, and the same event may arrive twice (once from the
//! broker consumer, once from the publish-time fallback).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::BloodType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeFrame {
    pub event: String,
    pub payload: serde_json::Value,
}

/// Payload published on the `blood-requests` topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BloodRequestCreated {
    pub request_id: Uuid,
    pub seeker_id: Uuid,
    pub blood_type: BloodType,
    pub location: String,
    /// Unix timestamp in milliseconds.
    pub timestamp: i64,
}

/// Payload published on the `donation-offers` topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationAccepted {
    pub request_id: Uuid,
    pub donor_id: Uuid,
    pub donor_name: Option<String>,
    pub seeker_id: Uuid,
    /// Unix timestamp in milliseconds.
    pub timestamp: i64,
}
