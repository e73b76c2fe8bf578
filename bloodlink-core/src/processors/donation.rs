//! Donation bookkeeping on donor records.

use crate::entities::blood_request::{RequestStatus, RequestTransitionError};
use crate::entities::user::User;
use crate::store::{BloodRequestStore, StoreError, UserStore};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum DonationError {
    #[error("Donor not found")]
    DonorNotFound(Uuid),
    #[error(transparent)]
    Transition(#[from] RequestTransitionError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct DonorLedger {
    users: Arc<dyn UserStore>,
    requests: Arc<dyn BloodRequestStore>,
}

impl DonorLedger {
    pub fn new(users: Arc<dyn UserStore>, requests: Arc<dyn BloodRequestStore>) -> Self {
        Self { users, requests }
    }

    /// Record a completed donation.
    ///
    /// The donor becomes unavailable and enters the cooldown window. When a
    /// request is named and exists it is marked fulfilled; an unknown request
    /// id is ignored.
    pub async fn confirm_donation(
        &self,
        donor_id: Uuid,
        request_id: Option<Uuid>,
        now: OffsetDateTime,
    ) -> Result<User, DonationError> {
        let mut donor = self
            .users
            .find_by_id(donor_id)
            .await?
            .ok_or(DonationError::DonorNotFound(donor_id))?;
        donor.is_available = false;
        donor.last_donated_at = Some(now);
        let donor = self.users.save(donor).await?;
        info!(donor_id = %donor.id, "Donation confirmed");

        if let Some(request_id) = request_id {
            match self.requests.find_by_id(request_id).await? {
                Some(mut request) => {
                    request.status = request.status.transition(RequestStatus::Fulfilled)?;
                    self.requests.save(request).await?;
                    info!(request_id = %request_id, "Blood request fulfilled");
                }
                None => warn!(request_id = %request_id, "Confirmed donation names unknown request"),
            }
        }
        Ok(donor)
    }

    pub async fn set_availability(
        &self,
        donor_id: Uuid,
        is_available: bool,
    ) -> Result<User, DonationError> {
        let mut donor = self
            .users
            .find_by_id(donor_id)
            .await?
            .ok_or(DonationError::DonorNotFound(donor_id))?;
        donor.is_available = is_available;
        Ok(self.users.save(donor).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{BloodType, UserRole};
    use crate::processors::intake::NewRequestCommand;
    use crate::processors::testing::Pipeline;
    use bloodlink_sdk::objects::{BloodType as SdkBloodType, CreateBloodRequest};

    #[tokio::test]
    async fn test_confirm_donation_starts_cooldown_and_fulfils() {
        let p = Pipeline::new();
        let seeker = p.user("Sita", UserRole::Seeker, None).await;
        let donor = p.user("Arun", UserRole::Donor, Some(BloodType::ONegative)).await;
        let command = NewRequestCommand::try_from(CreateBloodRequest {
            seeker_id: Some(seeker.id),
            blood_type: Some(SdkBloodType::ONegative),
            location: Some("Pune".into()),
            ..Default::default()
        })
        .unwrap();
        let request = p.intake.submit(command).await.unwrap().request;

        let now = OffsetDateTime::now_utc();
        let updated = p
            .ledger
            .confirm_donation(donor.id, Some(request.id), now)
            .await
            .unwrap();
        assert!(!updated.is_available);
        assert_eq!(updated.last_donated_at, Some(now));

        let stored = BloodRequestStore::find_by_id(p.store.as_ref(), request.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, RequestStatus::Fulfilled);

        // Confirming again keeps the request fulfilled.
        p.ledger
            .confirm_donation(donor.id, Some(request.id), now)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unknown_donor_and_availability() {
        let p = Pipeline::new();
        let err = p
            .ledger
            .confirm_donation(Uuid::now_v7(), None, OffsetDateTime::now_utc())
            .await
            .unwrap_err();
        assert!(matches!(err, DonationError::DonorNotFound(_)));

        let donor = p.user("Arun", UserRole::Donor, Some(BloodType::ONegative)).await;
        let off = p.ledger.set_availability(donor.id, false).await.unwrap();
        assert!(!off.is_available);
        let on = p.ledger.set_availability(donor.id, true).await.unwrap();
        assert!(on.is_available);
    }
}
