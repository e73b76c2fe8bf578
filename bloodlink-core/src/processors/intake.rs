//! Blood request intake: persist, announce, match, fan out.

use super::fanout::{DispatchReport, FanoutDispatcher};
use crate::entities::BloodType;
use crate::entities::blood_request::{BloodRequest, NewBloodRequest};
use crate::events::{EventBus, Topic};
use crate::matching::DonorMatcher;
use crate::store::{BloodRequestStore, StoreError};
use crate::utils::calendar::unix_millis;
use bloodlink_sdk::objects::{BloodRequestCreated, CreateBloodRequest};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{error, info};

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("{0}")]
    InvalidInput(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A validated request submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRequestCommand {
    pub request: NewBloodRequest,
    /// Seeker-side email switch; donors still need to have opted in.
    pub notify_by_email: bool,
}

impl TryFrom<CreateBloodRequest> for NewRequestCommand {
    type Error = IntakeError;

    fn try_from(body: CreateBloodRequest) -> Result<Self, Self::Error> {
        let location = body.location.map(|l| l.trim().to_owned()).filter(|l| !l.is_empty());
        let (Some(seeker_id), Some(blood_type), Some(location)) =
            (body.seeker_id, body.blood_type, location)
        else {
            return Err(IntakeError::InvalidInput(
                "seekerId, bloodType and location are required".into(),
            ));
        };
        Ok(Self {
            request: NewBloodRequest {
                seeker_id,
                blood_type: BloodType::from(blood_type),
                location,
                location_url: body.location_url,
                patient_name: body.patient_name,
                quantity: body.quantity,
            },
            notify_by_email: body.send_email_notifications.unwrap_or(true),
        })
    }
}

#[derive(Debug, Clone)]
pub struct IntakeOutcome {
    pub request: BloodRequest,
    /// `None` when donor lookup failed and nobody was notified.
    pub report: Option<DispatchReport>,
}

pub struct RequestIntake {
    requests: Arc<dyn BloodRequestStore>,
    matcher: DonorMatcher,
    dispatcher: Arc<FanoutDispatcher>,
    bus: Arc<EventBus>,
}

impl RequestIntake {
    pub fn new(
        requests: Arc<dyn BloodRequestStore>,
        matcher: DonorMatcher,
        dispatcher: Arc<FanoutDispatcher>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            requests,
            matcher,
            dispatcher,
            bus,
        }
    }

    /// Create the request and notify matching donors.
    ///
    /// Only persisting the request can fail. Matching and fan-out problems are
    /// logged and the created request is still returned.
    pub async fn submit(&self, command: NewRequestCommand) -> Result<IntakeOutcome, IntakeError> {
        let request = self.requests.create(command.request).await?;
        info!(
            request_id = %request.id,
            seeker_id = %request.seeker_id,
            blood_type = %request.blood_type,
            "Blood request created"
        );

        self.bus
            .publish_json(Topic::BloodRequests, &created_event(&request))
            .await;

        let candidates = match self
            .matcher
            .find_candidates(request.blood_type, request.seeker_id)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                error!(request_id = %request.id, error = %e, "Donor matching failed");
                return Ok(IntakeOutcome {
                    request,
                    report: None,
                });
            }
        };

        let report = self
            .dispatcher
            .dispatch(&request, &candidates, command.notify_by_email)
            .await;
        Ok(IntakeOutcome {
            request,
            report: Some(report),
        })
    }
}

fn created_event(request: &BloodRequest) -> BloodRequestCreated {
    BloodRequestCreated {
        request_id: request.id,
        seeker_id: request.seeker_id,
        blood_type: request.blood_type.into(),
        location: request.location.clone(),
        timestamp: unix_millis(OffsetDateTime::now_utc()),
    }
}
