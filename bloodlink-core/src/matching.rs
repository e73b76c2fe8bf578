//! Donor matching.
//!
//! A donor is a candidate for a request when they are available, are not the
//! seeker, share the requested blood type, and have not donated within the
//! cooldown window.

use crate::entities::BloodType;
use crate::entities::user::{DonorCriteria, User};
use crate::store::{StoreError, UserStore};
use crate::utils::calendar::months_before;
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

/// Calendar months a donor rests after donating.
pub const DONATION_COOLDOWN_MONTHS: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("donor lookup failed: {0}")]
    LookupFailed(#[source] StoreError),
}

#[derive(Clone)]
pub struct DonorMatcher {
    users: Arc<dyn UserStore>,
    cooldown_months: u32,
}

impl DonorMatcher {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self {
            users,
            cooldown_months: DONATION_COOLDOWN_MONTHS,
        }
    }

    /// Latest last-donation instant that still disqualifies a donor at `now`.
    pub fn cooldown_cutoff(&self, now: OffsetDateTime) -> OffsetDateTime {
        months_before(now, self.cooldown_months)
    }

    pub async fn find_candidates(
        &self,
        blood_type: BloodType,
        exclude_user_id: Uuid,
    ) -> Result<Vec<User>, MatchError> {
        self.find_candidates_at(blood_type, exclude_user_id, OffsetDateTime::now_utc())
            .await
    }

    pub async fn find_candidates_at(
        &self,
        blood_type: BloodType,
        exclude_user_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<Vec<User>, MatchError> {
        let criteria = DonorCriteria {
            blood_type: Some(blood_type),
            exclude_user_id: Some(exclude_user_id),
            location: None,
            donated_before: self.cooldown_cutoff(now),
        };
        self.lookup(criteria).await
    }

    /// Eligible donors by optional blood type and location substring.
    pub async fn search(
        &self,
        blood_type: Option<BloodType>,
        location: Option<String>,
        now: OffsetDateTime,
    ) -> Result<Vec<User>, MatchError> {
        let criteria = DonorCriteria {
            blood_type,
            exclude_user_id: None,
            location: location.filter(|l| !l.trim().is_empty()),
            donated_before: self.cooldown_cutoff(now),
        };
        self.lookup(criteria).await
    }

    async fn lookup(&self, criteria: DonorCriteria) -> Result<Vec<User>, MatchError> {
        self.users
            .find_donors(criteria)
            .await
            .map_err(MatchError::LookupFailed)
    }
}
