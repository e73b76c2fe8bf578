//! Donor acceptance.
//!
//! Accepting adds the donor to the request's accepted set with an atomic
//! add-if-absent. Everything after that runs only for the call that actually
//! added the donor, which makes repeated accepts idempotent. Later steps are
//! not rolled back if an earlier one succeeded and a later one fails.

use crate::entities::blood_request::BloodRequest;
use crate::entities::notification::{
    NewNotification, NotificationFilter, NotificationKind, NotificationPatch, NotificationStatus,
};
use crate::entities::user::{NewUser, User};
use crate::entities::{BloodType, UserRole};
use crate::events::{EventBus, Topic};
use crate::store::{BloodRequestStore, NotificationStore, StoreError, UserStore};
use crate::utils::calendar::unix_millis;
use crate::utils::credential::{CredentialError, placeholder_credential};
use bloodlink_sdk::objects::{AcceptRequest, DonationAccepted, DonorData};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

const ANONYMOUS_DONOR: &str = "A donor";
const NEW_DONOR_FIELDS: &str =
    "requestId, name, email, bloodType, and location are required for new donor registration";

#[derive(Debug, thiserror::Error)]
pub enum AcceptError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("Request not found")]
    RequestNotFound(Uuid),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

/// Registration details for a donor accepting without an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDonorProfile {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub blood_type: BloodType,
    pub location: String,
    pub email_notifications: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DonorRef {
    Existing {
        donor_id: Uuid,
        donor_name: Option<String>,
    },
    New(NewDonorProfile),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptCommand {
    pub request_id: Uuid,
    pub donor: DonorRef,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

impl TryFrom<DonorData> for NewDonorProfile {
    type Error = AcceptError;

    fn try_from(data: DonorData) -> Result<Self, Self::Error> {
        let (Some(name), Some(email), Some(blood_type), Some(location)) = (
            non_blank(data.name),
            non_blank(data.email),
            data.blood_type,
            non_blank(data.location),
        ) else {
            return Err(AcceptError::InvalidInput(NEW_DONOR_FIELDS.into()));
        };
        Ok(Self {
            name,
            email: email.to_lowercase(),
            phone: non_blank(data.phone),
            blood_type: blood_type.into(),
            location,
            email_notifications: data.email_notifications.unwrap_or(true),
        })
    }
}

impl TryFrom<AcceptRequest> for AcceptCommand {
    type Error = AcceptError;

    fn try_from(body: AcceptRequest) -> Result<Self, Self::Error> {
        if let Some(data) = body.donor_data {
            let profile = NewDonorProfile::try_from(data)?;
            let request_id = body
                .request_id
                .ok_or_else(|| AcceptError::InvalidInput(NEW_DONOR_FIELDS.into()))?;
            return Ok(Self {
                request_id,
                donor: DonorRef::New(profile),
            });
        }
        match (body.request_id, body.donor_id) {
            (Some(request_id), Some(donor_id)) => Ok(Self {
                request_id,
                donor: DonorRef::Existing {
                    donor_id,
                    donor_name: non_blank(body.donor_name),
                },
            }),
            _ => Err(AcceptError::InvalidInput(
                "requestId and donorId are required".into(),
            )),
        }
    }
}

/// The donor as seen by the acceptance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptingDonor {
    pub id: Uuid,
    pub name: String,
    /// `None` when the donor id is unknown to the user store.
    pub user: Option<User>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acceptance {
    pub request: BloodRequest,
    pub donor: AcceptingDonor,
    pub new_donor_created: bool,
    /// False when the donor had already accepted this request.
    pub first_acceptance: bool,
}

pub struct AcceptanceCoordinator {
    users: Arc<dyn UserStore>,
    requests: Arc<dyn BloodRequestStore>,
    notifications: Arc<dyn NotificationStore>,
    bus: Arc<EventBus>,
}

impl AcceptanceCoordinator {
    pub fn new(
        users: Arc<dyn UserStore>,
        requests: Arc<dyn BloodRequestStore>,
        notifications: Arc<dyn NotificationStore>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            users,
            requests,
            notifications,
            bus,
        }
    }

    pub async fn accept(&self, command: AcceptCommand) -> Result<Acceptance, AcceptError> {
        let (donor, new_donor_created) = self.resolve_donor(command.donor).await?;

        if self.requests.find_by_id(command.request_id).await?.is_none() {
            return Err(AcceptError::RequestNotFound(command.request_id));
        }
        let update = self
            .requests
            .add_accepted_donor(command.request_id, donor.id)
            .await?
            .ok_or(AcceptError::RequestNotFound(command.request_id))?;

        let first_acceptance = update.is_first_acceptance();
        let request = update.into_request();
        if first_acceptance {
            self.on_first_acceptance(&request, &donor).await?;
        } else {
            debug!(request_id = %request.id, donor_id = %donor.id, "Donor already accepted");
        }

        Ok(Acceptance {
            request,
            donor,
            new_donor_created,
            first_acceptance,
        })
    }

    async fn resolve_donor(&self, donor: DonorRef) -> Result<(AcceptingDonor, bool), AcceptError> {
        match donor {
            DonorRef::Existing {
                donor_id,
                donor_name,
            } => {
                let user = self.users.find_by_id(donor_id).await?;
                let name = user
                    .as_ref()
                    .map(|u| u.name.clone())
                    .or(donor_name)
                    .unwrap_or_else(|| ANONYMOUS_DONOR.to_owned());
                Ok((
                    AcceptingDonor {
                        id: donor_id,
                        name,
                        user,
                    },
                    false,
                ))
            }
            DonorRef::New(profile) => {
                let email = profile.email.clone();
                if let Some(user) = self.users.find_by_email(&profile.email).await? {
                    debug!(donor_id = %user.id, "Accepting donor matched an existing account");
                    return Ok((accepting(user), false));
                }
                let created = self
                    .users
                    .create(NewUser {
                        name: profile.name,
                        email: profile.email,
                        password_hash: placeholder_credential().await?,
                        role: UserRole::Donor,
                        blood_type: Some(profile.blood_type),
                        location: Some(profile.location),
                        phone: profile.phone,
                        is_available: true,
                        email_notifications: profile.email_notifications,
                    })
                    .await;
                match created {
                    Ok(user) => {
                        info!(donor_id = %user.id, "Donor registered on acceptance");
                        Ok((accepting(user), true))
                    }
                    // Lost a registration race for the same email.
                    Err(StoreError::DuplicateEmail) => {
                        let user = self
                            .users
                            .find_by_email(&email)
                            .await?
                            .ok_or(StoreError::DuplicateEmail)?;
                        Ok((accepting(user), false))
                    }
                    Err(e) => Err(e.into()),
                }
            }
        }
    }

    async fn on_first_acceptance(
        &self,
        request: &BloodRequest,
        donor: &AcceptingDonor,
    ) -> Result<(), AcceptError> {
        self.notifications
            .create(NewNotification {
                recipient_id: request.seeker_id,
                message: format!(
                    "{} has accepted your blood request for {}.",
                    donor.name, request.blood_type
                ),
                kind: NotificationKind::RequestAccepted,
                related_request_id: Some(request.id),
                status: NotificationStatus::Pending,
            })
            .await?;

        let own = NotificationFilter::recipient(donor.id)
            .related_to(request.id)
            .kind(NotificationKind::BloodRequest)
            .statuses(&[NotificationStatus::Pending, NotificationStatus::Expired]);
        let updated = self
            .notifications
            .update_one(
                own,
                NotificationPatch {
                    status: Some(NotificationStatus::Accepted),
                    is_read: Some(true),
                },
            )
            .await?;
        if updated.is_none() {
            debug!(
                request_id = %request.id,
                donor_id = %donor.id,
                "Donor had no offer notification"
            );
        }

        let expired = self
            .notifications
            .update_many(
                NotificationFilter::for_request(request.id)
                    .kind(NotificationKind::BloodRequest)
                    .statuses(&[NotificationStatus::Pending])
                    .excluding(donor.id),
                NotificationPatch {
                    status: Some(NotificationStatus::Expired),
                    is_read: None,
                },
            )
            .await?;

        info!(
            request_id = %request.id,
            donor_id = %donor.id,
            expired,
            "Donor accepted blood request"
        );

        self.bus
            .publish_json(
                Topic::DonationOffers,
                &DonationAccepted {
                    request_id: request.id,
                    donor_id: donor.id,
                    donor_name: Some(donor.name.clone()),
                    seeker_id: request.seeker_id,
                    timestamp: unix_millis(OffsetDateTime::now_utc()),
                },
            )
            .await;
        Ok(())
    }
}

fn accepting(user: User) -> AcceptingDonor {
    AcceptingDonor {
        id: user.id,
        name: user.name.clone(),
        user: Some(user),
    }
}
