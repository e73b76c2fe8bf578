//! Conversions from stored records to API response objects.

use bloodlink_core::entities::blood_request::BloodRequest;
use bloodlink_core::entities::notification::Notification;
use bloodlink_core::entities::user::User;
use bloodlink_core::processors::AcceptingDonor;
use bloodlink_sdk::objects::{
    BloodRequestResponse, DonorResponse, DonorSummary, NotificationResponse, SeekerSummary,
};

pub fn request_response(request: &BloodRequest) -> BloodRequestResponse {
    BloodRequestResponse {
        id: request.id,
        seeker_id: request.seeker_id,
        blood_type: request.blood_type.into(),
        location: request.location.clone(),
        location_url: request.location_url.clone(),
        patient_name: request.patient_name.clone(),
        quantity: request.quantity.clone(),
        status: request.status.into(),
        accepted_by: request.accepted_by.clone(),
        created_at: request.created_at.unix_timestamp(),
        updated_at: request.updated_at.unix_timestamp(),
    }
}

/// Full user record minus the password hash.
pub fn donor_response(user: &User) -> DonorResponse {
    DonorResponse {
        id: user.id,
        name: user.name.clone(),
        email: user.email.clone(),
        role: user.role.into(),
        blood_type: user.blood_type.map(Into::into),
        location: user.location.clone(),
        phone: user.phone.clone(),
        is_available: user.is_available,
        email_notifications: user.email_notifications,
        last_donated_date: user.last_donated_at.map(|t| t.unix_timestamp()),
        created_at: user.created_at.unix_timestamp(),
    }
}

pub fn donor_summary(user: &User) -> DonorSummary {
    DonorSummary {
        id: user.id,
        name: user.name.clone(),
        email: Some(user.email.clone()),
        phone: user.phone.clone(),
        location: user.location.clone(),
        blood_type: user.blood_type.map(Into::into),
    }
}

/// The accepting donor; only id and name are known for unregistered ids.
pub fn accepting_donor_summary(donor: &AcceptingDonor) -> DonorSummary {
    match &donor.user {
        Some(user) => donor_summary(user),
        None => DonorSummary {
            id: donor.id,
            name: donor.name.clone(),
            email: None,
            phone: None,
            location: None,
            blood_type: None,
        },
    }
}

pub fn seeker_summary(user: &User) -> SeekerSummary {
    SeekerSummary {
        id: user.id,
        name: user.name.clone(),
        phone: user.phone.clone(),
        location: user.location.clone(),
    }
}

pub fn notification_response(notification: &Notification) -> NotificationResponse {
    NotificationResponse {
        id: notification.id,
        recipient_id: notification.recipient_id,
        message: notification.message.clone(),
        kind: notification.kind.into(),
        related_request_id: notification.related_request_id,
        is_read: notification.is_read,
        status: notification.status.into(),
        created_at: notification.created_at.unix_timestamp(),
        updated_at: notification.updated_at.unix_timestamp(),
    }
}
