//! Per-user notification inbox.

use crate::entities::notification::{
    Notification, NotificationFilter, NotificationPatch, NotificationStatus, TransitionError,
};
use crate::store::{NotificationStore, StoreError};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum InboxError {
    #[error("Notification not found")]
    NotFound(Uuid),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

const STATUS_UPDATE_ATTEMPTS: usize = 3;

pub struct NotificationInbox {
    notifications: Arc<dyn NotificationStore>,
}

impl NotificationInbox {
    pub fn new(notifications: Arc<dyn NotificationStore>) -> Self {
        Self { notifications }
    }

    /// Newest first.
    pub async fn list(&self, recipient_id: Uuid) -> Result<Vec<Notification>, InboxError> {
        Ok(self
            .notifications
            .list(NotificationFilter::recipient(recipient_id))
            .await?)
    }

    pub async fn mark_read(&self, id: Uuid) -> Result<Notification, InboxError> {
        self.notifications
            .update_one(
                NotificationFilter::by_id(id),
                NotificationPatch {
                    status: None,
                    is_read: Some(true),
                },
            )
            .await?
            .ok_or(InboxError::NotFound(id))
    }

    /// Returns how many notifications changed.
    pub async fn mark_all_read(&self, recipient_id: Uuid) -> Result<u64, InboxError> {
        Ok(self
            .notifications
            .update_many(
                NotificationFilter::recipient(recipient_id).unread(),
                NotificationPatch {
                    status: None,
                    is_read: Some(true),
                },
            )
            .await?)
    }

    pub async fn unread_count(&self, recipient_id: Uuid) -> Result<u64, InboxError> {
        Ok(self
            .notifications
            .count(NotificationFilter::recipient(recipient_id).unread())
            .await?)
    }

    pub async fn update_status(
        &self,
        id: Uuid,
        status: NotificationStatus,
    ) -> Result<Notification, InboxError> {
        // A status changes at most twice (pending, expired, accepted).
        for _ in 0..STATUS_UPDATE_ATTEMPTS {
            let current = self.get(id).await?;
            let target = current.status.transition(status)?;
            let updated = self
                .notifications
                .update_one(
                    NotificationFilter::by_id(id).statuses(&[current.status]),
                    NotificationPatch {
                        status: Some(target),
                        is_read: None,
                    },
                )
                .await?;
            if let Some(updated) = updated {
                return Ok(updated);
            }
            tracing::debug!(
                %id,
                observed = ?current.status,
                "Notification status changed concurrently, retrying"
            );
        }
        let current = self.get(id).await?;
        Err(TransitionError {
            from: current.status,
            to: status,
        }
        .into())
    }

    async fn get(&self, id: Uuid) -> Result<Notification, InboxError> {
        self.notifications
            .find_by_id(id)
            .await?
            .ok_or(InboxError::NotFound(id))
    }
}
