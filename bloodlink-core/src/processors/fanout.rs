//! Notification fan-out.
//!
//! For every candidate donor the dispatcher writes an in-app notification and,
//! when both the seeker and the donor allow it, emails an accept link. Donors
//! are processed independently: a failure for one is logged and counted, and
//! never stops the others.

use crate::config::{ConfigStore, EmailDelivery, FanoutConfig};
use crate::email::{EmailError, EmailMessage, EmailSender, EmailTemplate};
use crate::entities::blood_request::BloodRequest;
use crate::entities::notification::{NewNotification, NotificationKind, NotificationStatus};
use crate::entities::user::User;
use crate::events::{EventBus, Topic};
use crate::store::{NotificationStore, StoreError};
use futures_util::StreamExt;
use futures_util::stream;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, thiserror::Error)]
enum DonorNotifyError {
    #[error("failed to store notification: {0}")]
    Store(#[from] StoreError),
    #[error("failed to send email: {0}")]
    Email(#[from] EmailError),
}

/// Counts from one fan-out run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// In-app notifications written.
    pub notified: usize,
    /// Emails sent inline or queued on the email topic.
    pub emailed: usize,
    /// Donors for whom some step failed.
    pub failed: usize,
}

enum DonorOutcome {
    Notified { emailed: bool },
    Failed,
}

pub struct FanoutDispatcher {
    notifications: Arc<dyn NotificationStore>,
    email: Arc<dyn EmailSender>,
    bus: Arc<EventBus>,
    config: ConfigStore<FanoutConfig>,
}

impl FanoutDispatcher {
    pub fn new(
        notifications: Arc<dyn NotificationStore>,
        email: Arc<dyn EmailSender>,
        bus: Arc<EventBus>,
        config: ConfigStore<FanoutConfig>,
    ) -> Self {
        Self {
            notifications,
            email,
            bus,
            config,
        }
    }

    pub async fn dispatch(
        &self,
        request: &BloodRequest,
        candidates: &[User],
        notify_by_email: bool,
    ) -> DispatchReport {
        let config = self.config.snapshot().await;
        let concurrency = config.concurrency.max(1);

        // Collected before streaming so the returned future stays `Send`.
        let pending: Vec<_> = candidates
            .iter()
            .map(|donor| self.notify_donor(&config, request, donor, notify_by_email))
            .collect();
        let outcomes: Vec<DonorOutcome> = stream::iter(pending)
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut report = DispatchReport::default();
        for outcome in outcomes {
            match outcome {
                DonorOutcome::Notified { emailed } => {
                    report.notified += 1;
                    if emailed {
                        report.emailed += 1;
                    }
                }
                DonorOutcome::Failed => report.failed += 1,
            }
        }
        info!(
            request_id = %request.id,
            candidates = candidates.len(),
            notified = report.notified,
            emailed = report.emailed,
            failed = report.failed,
            "Fan-out complete"
        );
        report
    }

    async fn notify_donor(
        &self,
        config: &FanoutConfig,
        request: &BloodRequest,
        donor: &User,
        notify_by_email: bool,
    ) -> DonorOutcome {
        match self
            .try_notify_donor(config, request, donor, notify_by_email)
            .await
        {
            Ok(emailed) => DonorOutcome::Notified { emailed },
            Err(e) => {
                warn!(
                    request_id = %request.id,
                    donor_id = %donor.id,
                    error = %e,
                    "Failed to notify donor"
                );
                DonorOutcome::Failed
            }
        }
    }

    /// Returns whether an email went out.
    async fn try_notify_donor(
        &self,
        config: &FanoutConfig,
        request: &BloodRequest,
        donor: &User,
        notify_by_email: bool,
    ) -> Result<bool, DonorNotifyError> {
        self.notifications
            .create(NewNotification {
                recipient_id: donor.id,
                message: format!(
                    "New blood request for {} near {}. Tap to view or accept.",
                    request.blood_type, request.location
                ),
                kind: NotificationKind::BloodRequest,
                related_request_id: Some(request.id),
                status: NotificationStatus::Pending,
            })
            .await?;

        if !(notify_by_email && donor.email_notifications) {
            return Ok(false);
        }

        let accept_link = accept_link(&config.frontend_base_url, request, donor);
        let message = EmailMessage::new(donor.email.clone(), EmailTemplate::BloodRequest)
            .var("donorName", donor_display_name(donor))
            .var("bloodType", request.blood_type.to_string())
            .var("location", request.location.clone())
            .var("patientName", request.patient_name.clone().unwrap_or_default())
            .var("acceptLink", accept_link.as_str());

        match config.email_delivery {
            EmailDelivery::Direct => self.email.send(&message).await?,
            EmailDelivery::Queued => {
                self.bus
                    .publish_json(Topic::EmailNotifications, &message)
                    .await;
                debug!(donor_id = %donor.id, "Donor email queued");
            }
        }
        Ok(true)
    }
}

fn donor_display_name(donor: &User) -> String {
    if donor.name.trim().is_empty() {
        "Donor".to_owned()
    } else {
        donor.name.clone()
    }
}

/// `{base}/respond?requestId={id}&donorId={donor}`
pub fn accept_link(base: &Url, request: &BloodRequest, donor: &User) -> Url {
    let mut link = base.clone();
    if let Ok(mut segments) = link.path_segments_mut() {
        segments.pop_if_empty().push("respond");
    }
    link.query_pairs_mut()
        .clear()
        .append_pair("requestId", &request.id.to_string())
        .append_pair("donorId", &donor.id.to_string());
    link
}
