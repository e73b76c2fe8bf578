//! Notification endpoint types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{NotificationKind, NotificationStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub related_request_id: Option<Uuid>,
    pub is_read: bool,
    pub status: NotificationStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Body of `PUT /api/notifications/{id}/status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateNotificationStatus {
    pub status: NotificationStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCount {
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}
