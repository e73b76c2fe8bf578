//! Storage seams for users, blood requests and notifications.
//!
//! Every workflow talks to these traits rather than to a pool, so the same
//! coordinator code runs against Postgres in production and against
//! [`MemoryStore`] in development mode and tests.

mod memory;
mod postgres;

pub use memory::MemoryStore;

use crate::entities::blood_request::{BloodRequest, NewBloodRequest};
use crate::entities::notification::{
    NewNotification, Notification, NotificationFilter, NotificationPatch,
};
use crate::entities::user::{DonorCriteria, NewUser, User};
use crate::framework::DatabaseProcessor;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("a user with this email already exists")]
    DuplicateEmail,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Map a Postgres unique violation on `users.email` to [`StoreError::DuplicateEmail`].
    pub(crate) fn from_insert_user(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateEmail,
            _ => StoreError::Database(err),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of an idempotent add to a request's accepted-donor set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptedDonorUpdate {
    /// The donor was appended by this call.
    Added(BloodRequest),
    /// The donor was already in the set; the request is returned unchanged.
    AlreadyPresent(BloodRequest),
}

impl AcceptedDonorUpdate {
    pub fn request(&self) -> &BloodRequest {
        match self {
            AcceptedDonorUpdate::Added(r) | AcceptedDonorUpdate::AlreadyPresent(r) => r,
        }
    }

    pub fn into_request(self) -> BloodRequest {
        match self {
            AcceptedDonorUpdate::Added(r) | AcceptedDonorUpdate::AlreadyPresent(r) => r,
        }
    }

    pub fn is_first_acceptance(&self) -> bool {
        matches!(self, AcceptedDonorUpdate::Added(_))
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Exact match; callers lower-case before lookup.
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<User>>;
    async fn create(&self, user: NewUser) -> StoreResult<User>;
    async fn save(&self, user: User) -> StoreResult<User>;
    /// Eligible donors in creation order.
    async fn find_donors(&self, criteria: DonorCriteria) -> StoreResult<Vec<User>>;
}

#[async_trait]
pub trait BloodRequestStore: Send + Sync {
    async fn create(&self, request: NewBloodRequest) -> StoreResult<BloodRequest>;
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<BloodRequest>>;
    async fn save(&self, request: BloodRequest) -> StoreResult<BloodRequest>;
    /// Atomically add `donor_id` to `accepted_by` if absent.
    /// Returns `None` if the request does not exist.
    async fn add_accepted_donor(
        &self,
        request_id: Uuid,
        donor_id: Uuid,
    ) -> StoreResult<Option<AcceptedDonorUpdate>>;
    /// Newest first.
    async fn list_recent(&self, limit: usize) -> StoreResult<Vec<BloodRequest>>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn create(&self, notification: NewNotification) -> StoreResult<Notification>;
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Notification>>;
    /// Overwrites the mutable columns. Prefer `update_one` for single-field
    /// changes that may race with other writers.
    async fn save(&self, notification: Notification) -> StoreResult<Notification>;
    /// Patch the oldest match, returning it after the update.
    async fn update_one(
        &self,
        filter: NotificationFilter,
        patch: NotificationPatch,
    ) -> StoreResult<Option<Notification>>;
    /// Patch all matches, returning how many changed.
    async fn update_many(
        &self,
        filter: NotificationFilter,
        patch: NotificationPatch,
    ) -> StoreResult<u64>;
    async fn count(&self, filter: NotificationFilter) -> StoreResult<u64>;
    /// Newest first.
    async fn list(&self, filter: NotificationFilter) -> StoreResult<Vec<Notification>>;
}

/// Handles to every store, shared across workflows.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub requests: Arc<dyn BloodRequestStore>,
    pub notifications: Arc<dyn NotificationStore>,
}

impl Stores {
    pub fn postgres(processor: DatabaseProcessor) -> Self {
        let processor = Arc::new(processor);
        Self {
            users: processor.clone(),
            requests: processor.clone(),
            notifications: processor,
        }
    }

    pub fn in_memory() -> Self {
        Self::from_memory(Arc::new(MemoryStore::default()))
    }

    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            users: store.clone(),
            requests: store.clone(),
            notifications: store,
        }
    }
}
