use crate::framework::DatabaseProcessor;
use bloodlink_sdk::objects::{
    NotificationKind as SdkNotificationKind, NotificationStatus as SdkNotificationStatus,
};
use kanau::processor::Processor;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub message: String,
    pub kind: NotificationKind,
    pub related_request_id: Option<Uuid>,
    pub is_read: bool,
    pub status: NotificationStatus,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "notification_kind")]
pub enum NotificationKind {
    BloodRequest,
    RequestAccepted,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "notification_status")]
pub enum NotificationStatus {
    Pending,
    Accepted,
    Rejected,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("notification cannot move from {from:?} to {to:?}")]
pub struct TransitionError {
    pub from: NotificationStatus,
    pub to: NotificationStatus,
}

impl NotificationStatus {
    /// Validate a status change.
    ///
    /// A pending offer may be accepted, rejected or expired. An expired offer
    /// can still be accepted late. Accepted and rejected are terminal, and
    /// nothing returns to pending. Re-applying the current status is a no-op.
    pub fn transition(self, to: NotificationStatus) -> Result<NotificationStatus, TransitionError> {
        use NotificationStatus::*;
        match (self, to) {
            (a, b) if a == b => Ok(b),
            (Pending, Accepted | Rejected | Expired) => Ok(to),
            (Expired, Accepted) => Ok(to),
            (from, to) => Err(TransitionError { from, to }),
        }
    }
}

impl From<NotificationKind> for SdkNotificationKind {
    fn from(value: NotificationKind) -> Self {
        match value {
            NotificationKind::BloodRequest => SdkNotificationKind::BloodRequest,
            NotificationKind::RequestAccepted => SdkNotificationKind::RequestAccepted,
            NotificationKind::Other => SdkNotificationKind::Other,
        }
    }
}

impl From<SdkNotificationKind> for NotificationKind {
    fn from(value: SdkNotificationKind) -> Self {
        match value {
            SdkNotificationKind::BloodRequest => NotificationKind::BloodRequest,
            SdkNotificationKind::RequestAccepted => NotificationKind::RequestAccepted,
            SdkNotificationKind::Other => NotificationKind::Other,
        }
    }
}

impl From<NotificationStatus> for SdkNotificationStatus {
    fn from(value: NotificationStatus) -> Self {
        match value {
            NotificationStatus::Pending => SdkNotificationStatus::Pending,
            NotificationStatus::Accepted => SdkNotificationStatus::Accepted,
            NotificationStatus::Rejected => SdkNotificationStatus::Rejected,
            NotificationStatus::Expired => SdkNotificationStatus::Expired,
        }
    }
}

impl From<SdkNotificationStatus> for NotificationStatus {
    fn from(value: SdkNotificationStatus) -> Self {
        match value {
            SdkNotificationStatus::Pending => NotificationStatus::Pending,
            SdkNotificationStatus::Accepted => NotificationStatus::Accepted,
            SdkNotificationStatus::Rejected => NotificationStatus::Rejected,
            SdkNotificationStatus::Expired => NotificationStatus::Expired,
        }
    }
}

/// Data for inserting a new notification. New notifications are unread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub recipient_id: Uuid,
    pub message: String,
    pub kind: NotificationKind,
    pub related_request_id: Option<Uuid>,
    pub status: NotificationStatus,
}

// ---------------------------------------------------------------------------
// Filters and patches
// ---------------------------------------------------------------------------

/// Conjunctive notification filter. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationFilter {
    pub id: Option<Uuid>,
    pub recipient_id: Option<Uuid>,
    pub exclude_recipient_id: Option<Uuid>,
    pub related_request_id: Option<Uuid>,
    pub kind: Option<NotificationKind>,
    /// Match any of these; empty means any status.
    pub statuses: Vec<NotificationStatus>,
    pub is_read: Option<bool>,
}

impl NotificationFilter {
    pub fn by_id(id: Uuid) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn recipient(recipient_id: Uuid) -> Self {
        Self {
            recipient_id: Some(recipient_id),
            ..Self::default()
        }
    }

    pub fn for_request(request_id: Uuid) -> Self {
        Self {
            related_request_id: Some(request_id),
            ..Self::default()
        }
    }

    pub fn related_to(mut self, request_id: Uuid) -> Self {
        self.related_request_id = Some(request_id);
        self
    }

    pub fn excluding(mut self, recipient_id: Uuid) -> Self {
        self.exclude_recipient_id = Some(recipient_id);
        self
    }

    pub fn kind(mut self, kind: NotificationKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn statuses(mut self, statuses: &[NotificationStatus]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }

    pub fn unread(mut self) -> Self {
        self.is_read = Some(false);
        self
    }

    pub fn matches(&self, n: &Notification) -> bool {
        self.id.is_none_or(|id| n.id == id)
            && self.recipient_id.is_none_or(|id| n.recipient_id == id)
            && self.exclude_recipient_id.is_none_or(|id| n.recipient_id != id)
            && self
                .related_request_id
                .is_none_or(|id| n.related_request_id == Some(id))
            && self.kind.is_none_or(|k| n.kind == k)
            && (self.statuses.is_empty() || self.statuses.contains(&n.status))
            && self.is_read.is_none_or(|r| n.is_read == r)
    }

    fn push_where(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        builder.push(" WHERE TRUE");
        if let Some(id) = self.id {
            builder.push(" AND id = ").push_bind(id);
        }
        if let Some(id) = self.recipient_id {
            builder.push(" AND recipient_id = ").push_bind(id);
        }
        if let Some(id) = self.exclude_recipient_id {
            builder.push(" AND recipient_id <> ").push_bind(id);
        }
        if let Some(id) = self.related_request_id {
            builder.push(" AND related_request_id = ").push_bind(id);
        }
        if let Some(kind) = self.kind {
            builder.push(" AND kind = ").push_bind(kind);
        }
        if !self.statuses.is_empty() {
            builder.push(" AND status IN (");
            let mut separated = builder.separated(", ");
            for status in &self.statuses {
                separated.push_bind(*status);
            }
            separated.push_unseparated(")");
        }
        if let Some(is_read) = self.is_read {
            builder.push(" AND is_read = ").push_bind(is_read);
        }
    }
}

/// Fields to overwrite on matching notifications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotificationPatch {
    pub status: Option<NotificationStatus>,
    pub is_read: Option<bool>,
}

impl NotificationPatch {
    pub fn apply(&self, n: &mut Notification, now: OffsetDateTime) {
        if let Some(status) = self.status {
            n.status = status;
        }
        if let Some(is_read) = self.is_read {
            n.is_read = is_read;
        }
        n.updated_at = now;
    }

    fn push_set(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        builder.push(" SET updated_at = now()");
        if let Some(status) = self.status {
            builder.push(", status = ").push_bind(status);
        }
        if let Some(is_read) = self.is_read {
            builder.push(", is_read = ").push_bind(is_read);
        }
    }
}

const NOTIFICATION_COLUMNS: &str = "id, recipient_id, message, kind, related_request_id, is_read, \
    status, created_at, updated_at";

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

impl Processor<NewNotification> for DatabaseProcessor {
    type Output = Notification;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertNotification")]
    async fn process(&self, insert: NewNotification) -> Result<Notification, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO notifications
            (id, recipient_id, message, kind, related_request_id, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Notification>(&sql)
            .bind(Uuid::now_v7())
            .bind(insert.recipient_id)
            .bind(insert.message)
            .bind(insert.kind)
            .bind(insert.related_request_id)
            .bind(insert.status)
            .fetch_one(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
pub struct GetNotificationById {
    pub id: Uuid,
}

impl Processor<GetNotificationById> for DatabaseProcessor {
    type Output = Option<Notification>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetNotificationById")]
    async fn process(
        &self,
        query: GetNotificationById,
    ) -> Result<Option<Notification>, sqlx::Error> {
        let sql = format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = $1");
        sqlx::query_as::<_, Notification>(&sql)
            .bind(query.id)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Whole-row write of the mutable columns.
pub struct SaveNotification {
    pub notification: Notification,
}

impl Processor<SaveNotification> for DatabaseProcessor {
    type Output = Notification;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:SaveNotification")]
    async fn process(&self, query: SaveNotification) -> Result<Notification, sqlx::Error> {
        let n = query.notification;
        let sql = format!(
            r#"
            UPDATE notifications SET
                message = $2,
                is_read = $3,
                status = $4,
                updated_at = now()
            WHERE id = $1
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Notification>(&sql)
            .bind(n.id)
            .bind(n.message)
            .bind(n.is_read)
            .bind(n.status)
            .fetch_one(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Patch the oldest notification matching the filter, if any.
pub struct UpdateOneNotification {
    pub filter: NotificationFilter,
    pub patch: NotificationPatch,
}

impl Processor<UpdateOneNotification> for DatabaseProcessor {
    type Output = Option<Notification>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpdateOneNotification")]
    async fn process(
        &self,
        query: UpdateOneNotification,
    ) -> Result<Option<Notification>, sqlx::Error> {
        let mut builder = QueryBuilder::<Postgres>::new("UPDATE notifications");
        query.patch.push_set(&mut builder);
        builder.push(" WHERE id = (SELECT id FROM notifications");
        query.filter.push_where(&mut builder);
        builder.push(" ORDER BY created_at LIMIT 1 FOR UPDATE) RETURNING ");
        builder.push(NOTIFICATION_COLUMNS);
        builder
            .build_query_as::<Notification>()
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Patch every notification matching the filter. Returns the affected count.
pub struct UpdateManyNotifications {
    pub filter: NotificationFilter,
    pub patch: NotificationPatch,
}

impl Processor<UpdateManyNotifications> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpdateManyNotifications")]
    async fn process(&self, query: UpdateManyNotifications) -> Result<u64, sqlx::Error> {
        let mut builder = QueryBuilder::<Postgres>::new("UPDATE notifications");
        query.patch.push_set(&mut builder);
        query.filter.push_where(&mut builder);
        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone)]
pub struct CountNotifications {
    pub filter: NotificationFilter,
}

impl Processor<CountNotifications> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CountNotifications")]
    async fn process(&self, query: CountNotifications) -> Result<u64, sqlx::Error> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM notifications");
        query.filter.push_where(&mut builder);
        let count: i64 = builder.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }
}

#[derive(Debug, Clone)]
/// Matching notifications, newest first.
pub struct ListNotifications {
    pub filter: NotificationFilter,
}

impl Processor<ListNotifications> for DatabaseProcessor {
    type Output = Vec<Notification>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListNotifications")]
    async fn process(&self, query: ListNotifications) -> Result<Vec<Notification>, sqlx::Error> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT ");
        builder.push(NOTIFICATION_COLUMNS).push(" FROM notifications");
        query.filter.push_where(&mut builder);
        builder.push(" ORDER BY created_at DESC");
        builder
            .build_query_as::<Notification>()
            .fetch_all(&self.pool)
            .await
    }
}
