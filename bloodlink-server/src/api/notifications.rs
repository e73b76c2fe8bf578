//! Notification inbox handlers.
//!
//! # Endpoints
//!
//! - `GET /{user_id}`                     – a user's notifications, newest first
//! - `PUT /{id}/read`                     – mark one as read
//! - `PUT /{id}/status`                   – move one to another status
//! - `PUT /user/{user_id}/read-all`       – mark all of a user's as read
//! - `GET /user/{user_id}/unread-count`   – number of unread

use axum::{
    Router,
    extract::State,
    routing::{get, put},
};
use bloodlink_sdk::objects::{
    MessageResponse, NotificationResponse, UnreadCount, UpdateNotificationStatus,
};
use uuid::Uuid;

use super::dto::notification_response;
use super::error::ApiError;
use super::extractors::{ApiJson, ApiPath};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{user_id}", get(list_notifications))
        .route("/{id}/read", put(mark_read))
        .route("/{id}/status", put(update_status))
        .route("/user/{user_id}/read-all", put(mark_all_read))
        .route("/user/{user_id}/unread-count", get(unread_count))
}

async fn list_notifications(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> Result<ApiJson<Vec<NotificationResponse>>, ApiError> {
    let notifications = state.inbox.list(user_id).await?;
    Ok(ApiJson(
        notifications.iter().map(notification_response).collect(),
    ))
}

async fn mark_read(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<ApiJson<NotificationResponse>, ApiError> {
    let notification = state.inbox.mark_read(id).await?;
    Ok(ApiJson(notification_response(&notification)))
}

/// Illegal moves (e.g. out of `accepted`) answer 409.
async fn update_status(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<UpdateNotificationStatus>,
) -> Result<ApiJson<NotificationResponse>, ApiError> {
    let notification = state.inbox.update_status(id, body.status.into()).await?;
    Ok(ApiJson(notification_response(&notification)))
}

async fn mark_all_read(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> Result<ApiJson<MessageResponse>, ApiError> {
    let updated = state.inbox.mark_all_read(user_id).await?;
    tracing::debug!(%user_id, updated, "Notifications marked read");
    Ok(ApiJson(MessageResponse {
        message: "All notifications marked as read".into(),
    }))
}

async fn unread_count(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> Result<ApiJson<UnreadCount>, ApiError> {
    let count = state.inbox.unread_count(user_id).await?;
    Ok(ApiJson(UnreadCount { count }))
}
