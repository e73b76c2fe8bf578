use super::{
    AcceptedDonorUpdate, BloodRequestStore, NotificationStore, StoreError, StoreResult, UserStore,
};
use crate::entities::blood_request::{BloodRequest, NewBloodRequest, RequestStatus};
use crate::entities::notification::{
    NewNotification, Notification, NotificationFilter, NotificationPatch,
};
use crate::entities::user::{DonorCriteria, NewUser, User};
use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Process-local store backing development mode and tests.
///
/// Rows are kept in insertion order, which doubles as creation order. A single
/// mutex guards all three collections, so each trait call is atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    requests: Vec<BloodRequest>,
    notifications: Vec<Notification>,
    fail_donor_lookups: bool,
}

impl MemoryStore {
    /// Make every subsequent `find_donors` call fail.
    pub async fn fail_donor_lookups(&self, fail: bool) {
        self.inner.lock().await.fail_donor_lookups = fail;
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.inner.lock().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let tables = self.inner.lock().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<User>> {
        let tables = self.inner.lock().await;
        Ok(tables
            .users
            .iter()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect())
    }

    async fn create(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.inner.lock().await;
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let now = OffsetDateTime::now_utc();
        let created = User {
            id: Uuid::now_v7(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            blood_type: user.blood_type,
            location: user.location,
            phone: user.phone,
            is_available: user.is_available,
            email_notifications: user.email_notifications,
            last_donated_at: None,
            push_subscription: None,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(created.clone());
        Ok(created)
    }

    async fn save(&self, user: User) -> StoreResult<User> {
        let mut tables = self.inner.lock().await;
        let slot = tables
            .users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or_else(|| StoreError::Unavailable(format!("user {} not found", user.id)))?;
        *slot = User {
            email: slot.email.clone(),
            password_hash: slot.password_hash.clone(),
            created_at: slot.created_at,
            updated_at: OffsetDateTime::now_utc(),
            ..user
        };
        Ok(slot.clone())
    }

    async fn find_donors(&self, criteria: DonorCriteria) -> StoreResult<Vec<User>> {
        let tables = self.inner.lock().await;
        if tables.fail_donor_lookups {
            return Err(StoreError::Unavailable("donor lookups disabled".into()));
        }
        Ok(tables
            .users
            .iter()
            .filter(|u| criteria.matches(u))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BloodRequestStore for MemoryStore {
    async fn create(&self, request: NewBloodRequest) -> StoreResult<BloodRequest> {
        let now = OffsetDateTime::now_utc();
        let created = BloodRequest {
            id: Uuid::now_v7(),
            seeker_id: request.seeker_id,
            blood_type: request.blood_type,
            location: request.location,
            location_url: request.location_url,
            patient_name: request.patient_name,
            quantity: request.quantity,
            status: RequestStatus::Pending,
            accepted_by: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.inner.lock().await.requests.push(created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<BloodRequest>> {
        let tables = self.inner.lock().await;
        Ok(tables.requests.iter().find(|r| r.id == id).cloned())
    }

    async fn save(&self, request: BloodRequest) -> StoreResult<BloodRequest> {
        let mut tables = self.inner.lock().await;
        let slot = tables
            .requests
            .iter_mut()
            .find(|r| r.id == request.id)
            .ok_or_else(|| StoreError::Unavailable(format!("request {} not found", request.id)))?;
        *slot = BloodRequest {
            accepted_by: slot.accepted_by.clone(),
            created_at: slot.created_at,
            updated_at: OffsetDateTime::now_utc(),
            ..request
        };
        Ok(slot.clone())
    }

    async fn add_accepted_donor(
        &self,
        request_id: Uuid,
        donor_id: Uuid,
    ) -> StoreResult<Option<AcceptedDonorUpdate>> {
        let mut tables = self.inner.lock().await;
        let Some(request) = tables.requests.iter_mut().find(|r| r.id == request_id) else {
            return Ok(None);
        };
        if request.accepted_by.contains(&donor_id) {
            return Ok(Some(AcceptedDonorUpdate::AlreadyPresent(request.clone())));
        }
        request.accepted_by.push(donor_id);
        request.updated_at = OffsetDateTime::now_utc();
        Ok(Some(AcceptedDonorUpdate::Added(request.clone())))
    }

    async fn list_recent(&self, limit: usize) -> StoreResult<Vec<BloodRequest>> {
        let tables = self.inner.lock().await;
        Ok(tables.requests.iter().rev().take(limit).cloned().collect())
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn create(&self, notification: NewNotification) -> StoreResult<Notification> {
        let now = OffsetDateTime::now_utc();
        let created = Notification {
            id: Uuid::now_v7(),
            recipient_id: notification.recipient_id,
            message: notification.message,
            kind: notification.kind,
            related_request_id: notification.related_request_id,
            is_read: false,
            status: notification.status,
            created_at: now,
            updated_at: now,
        };
        self.inner.lock().await.notifications.push(created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Notification>> {
        let tables = self.inner.lock().await;
        Ok(tables.notifications.iter().find(|n| n.id == id).cloned())
    }

    async fn save(&self, notification: Notification) -> StoreResult<Notification> {
        let mut tables = self.inner.lock().await;
        let slot = tables
            .notifications
            .iter_mut()
            .find(|n| n.id == notification.id)
            .ok_or_else(|| {
                StoreError::Unavailable(format!("notification {} not found", notification.id))
            })?;
        *slot = Notification {
            created_at: slot.created_at,
            updated_at: OffsetDateTime::now_utc(),
            ..notification
        };
        Ok(slot.clone())
    }

    async fn update_one(
        &self,
        filter: NotificationFilter,
        patch: NotificationPatch,
    ) -> StoreResult<Option<Notification>> {
        let mut tables = self.inner.lock().await;
        let now = OffsetDateTime::now_utc();
        Ok(tables
            .notifications
            .iter_mut()
            .find(|n| filter.matches(n))
            .map(|n| {
                patch.apply(n, now);
                n.clone()
            }))
    }

    async fn update_many(
        &self,
        filter: NotificationFilter,
        patch: NotificationPatch,
    ) -> StoreResult<u64> {
        let mut tables = self.inner.lock().await;
        let now = OffsetDateTime::now_utc();
        let mut changed = 0;
        for n in tables.notifications.iter_mut().filter(|n| filter.matches(n)) {
            patch.apply(n, now);
            changed += 1;
        }
        Ok(changed)
    }

    async fn count(&self, filter: NotificationFilter) -> StoreResult<u64> {
        let tables = self.inner.lock().await;
        Ok(tables
            .notifications
            .iter()
            .filter(|n| filter.matches(n))
            .count() as u64)
    }

    async fn list(&self, filter: NotificationFilter) -> StoreResult<Vec<Notification>> {
        let tables = self.inner.lock().await;
        Ok(tables
            .notifications
            .iter()
            .rev()
            .filter(|n| filter.matches(n))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::notification::{NotificationKind, NotificationStatus};
    use crate::entities::{BloodType, UserRole};
    use std::sync::Arc;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Asha".into(),
            email: email.into(),
            password_hash: String::new(),
            role: UserRole::Donor,
            blood_type: Some(BloodType::APositive),
            location: Some("Pune".into()),
            phone: None,
            is_available: true,
            email_notifications: false,
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected() {
        let store = MemoryStore::default();
        UserStore::create(&store, new_user("a@example.com"))
            .await
            .unwrap();
        let err = UserStore::create(&store, new_user("a@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
    }

    #[tokio::test]
    async fn test_concurrent_accepts_add_donor_once() {
        let store = Arc::new(MemoryStore::default());
        let request = BloodRequestStore::create(
            store.as_ref(),
            NewBloodRequest {
                seeker_id: Uuid::now_v7(),
                blood_type: BloodType::APositive,
                location: "Pune".into(),
                location_url: None,
                patient_name: None,
                quantity: None,
            },
        )
        .await
        .unwrap();
        let donor = Uuid::now_v7();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.add_accepted_donor(request.id, donor).await.unwrap()
            }));
        }
        let mut first = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().is_first_acceptance() {
                first += 1;
            }
        }
        assert_eq!(first, 1);
        let stored = BloodRequestStore::find_by_id(store.as_ref(), request.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.accepted_by, vec![donor]);
    }

    #[tokio::test]
    async fn test_add_accepted_donor_missing_request() {
        let store = MemoryStore::default();
        let outcome = store
            .add_accepted_donor(Uuid::now_v7(), Uuid::now_v7())
            .await
            .unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn test_update_one_patches_oldest_match() {
        let store = MemoryStore::default();
        let recipient = Uuid::now_v7();
        for message in ["first", "second"] {
            NotificationStore::create(
                &store,
                NewNotification {
                    recipient_id: recipient,
                    message: message.into(),
                    kind: NotificationKind::BloodRequest,
                    related_request_id: None,
                    status: NotificationStatus::Pending,
                },
            )
            .await
            .unwrap();
        }
        let patched = store
            .update_one(
                NotificationFilter::recipient(recipient),
                NotificationPatch {
                    status: Some(NotificationStatus::Accepted),
                    is_read: Some(true),
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(patched.message, "first");
        assert!(patched.is_read);

        let unread = store
            .count(NotificationFilter::recipient(recipient).unread())
            .await
            .unwrap();
        assert_eq!(unread, 1);

        let listed = store
            .list(NotificationFilter::recipient(recipient))
            .await
            .unwrap();
        assert_eq!(listed[0].message, "second");
    }

    #[tokio::test]
    async fn test_save_overwrites_mutable_columns() {
        let store = MemoryStore::default();
        let created = NotificationStore::create(
            &store,
            NewNotification {
                recipient_id: Uuid::now_v7(),
                message: "draft".into(),
                kind: NotificationKind::Other,
                related_request_id: None,
                status: NotificationStatus::Pending,
            },
        )
        .await
        .unwrap();
        let saved = NotificationStore::save(
            &store,
            Notification {
                message: "final".into(),
                is_read: true,
                ..created.clone()
            },
        )
        .await
        .unwrap();
        assert_eq!(saved.message, "final");
        assert!(saved.is_read);
        assert_eq!(saved.created_at, created.created_at);

        let missing = NotificationStore::save(
            &store,
            Notification {
                id: Uuid::now_v7(),
                ..created
            },
        )
        .await;
        assert!(missing.is_err());
    }
}
