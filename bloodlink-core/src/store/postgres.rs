use super::{
    AcceptedDonorUpdate, BloodRequestStore, NotificationStore, StoreError, StoreResult, UserStore,
};
use crate::entities::blood_request::{
    AddAcceptedDonor, BloodRequest, GetBloodRequestById, ListBloodRequests, NewBloodRequest,
    SaveBloodRequest,
};
use crate::entities::notification::{
    CountNotifications, GetNotificationById, ListNotifications, NewNotification, Notification,
    NotificationFilter, NotificationPatch, SaveNotification, UpdateManyNotifications,
    UpdateOneNotification,
};
use crate::entities::user::{
    DonorCriteria, FindDonors, GetUserByEmail, GetUserById, GetUsersByIds, NewUser, SaveUser, User,
};
use crate::framework::DatabaseProcessor;
use async_trait::async_trait;
use kanau::processor::Processor;
use uuid::Uuid;

#[async_trait]
impl UserStore for DatabaseProcessor {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = email.to_owned();
        Ok(self.process(GetUserByEmail { email }).await?)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.process(GetUserById { id }).await?)
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<User>> {
        let ids = ids.to_vec();
        Ok(self.process(GetUsersByIds { ids }).await?)
    }

    async fn create(&self, user: NewUser) -> StoreResult<User> {
        self.process(user).await.map_err(StoreError::from_insert_user)
    }

    async fn save(&self, user: User) -> StoreResult<User> {
        Ok(self.process(SaveUser { user }).await?)
    }

    async fn find_donors(&self, criteria: DonorCriteria) -> StoreResult<Vec<User>> {
        Ok(self.process(FindDonors { criteria }).await?)
    }
}

#[async_trait]
impl BloodRequestStore for DatabaseProcessor {
    async fn create(&self, request: NewBloodRequest) -> StoreResult<BloodRequest> {
        Ok(self.process(request).await?)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<BloodRequest>> {
        Ok(self.process(GetBloodRequestById { id }).await?)
    }

    async fn save(&self, request: BloodRequest) -> StoreResult<BloodRequest> {
        Ok(self.process(SaveBloodRequest { request }).await?)
    }

    async fn add_accepted_donor(
        &self,
        request_id: Uuid,
        donor_id: Uuid,
    ) -> StoreResult<Option<AcceptedDonorUpdate>> {
        let added = self
            .process(AddAcceptedDonor {
                request_id,
                donor_id,
            })
            .await?;
        if let Some(request) = added {
            return Ok(Some(AcceptedDonorUpdate::Added(request)));
        }
        // Either the donor was already present or the request is missing.
        let existing = self.process(GetBloodRequestById { id: request_id }).await?;
        Ok(existing.map(AcceptedDonorUpdate::AlreadyPresent))
    }

    async fn list_recent(&self, limit: usize) -> StoreResult<Vec<BloodRequest>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        Ok(self.process(ListBloodRequests { limit }).await?)
    }
}

#[async_trait]
impl NotificationStore for DatabaseProcessor {
    async fn create(&self, notification: NewNotification) -> StoreResult<Notification> {
        Ok(self.process(notification).await?)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Notification>> {
        Ok(self.process(GetNotificationById { id }).await?)
    }

    async fn save(&self, notification: Notification) -> StoreResult<Notification> {
        Ok(self.process(SaveNotification { notification }).await?)
    }

    async fn update_one(
        &self,
        filter: NotificationFilter,
        patch: NotificationPatch,
    ) -> StoreResult<Option<Notification>> {
        Ok(self.process(UpdateOneNotification { filter, patch }).await?)
    }

    async fn update_many(
        &self,
        filter: NotificationFilter,
        patch: NotificationPatch,
    ) -> StoreResult<u64> {
        Ok(self.process(UpdateManyNotifications { filter, patch }).await?)
    }

    async fn count(&self, filter: NotificationFilter) -> StoreResult<u64> {
        Ok(self.process(CountNotifications { filter }).await?)
    }

    async fn list(&self, filter: NotificationFilter) -> StoreResult<Vec<Notification>> {
        Ok(self.process(ListNotifications { filter }).await?)
    }
}
