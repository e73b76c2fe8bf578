pub mod blood_request;
pub mod notification;
pub mod realtime;
pub mod types;

pub use blood_request::{
    AcceptRequest, AcceptResponse, AvailabilityUpdate, BloodRequestDetail, BloodRequestResponse,
    ConfirmDonation, ConfirmDonationResponse, CreateBloodRequest, DonorData, DonorQuery,
    DonorResponse, DonorSummary, RequestListQuery, SeekerSummary,
};
pub use notification::{
    MessageResponse, NotificationResponse, UnreadCount, UpdateNotificationStatus,
};
pub use realtime::{BloodRequestCreated, DonationAccepted, RealtimeFrame};
pub use types::{BloodType, NotificationKind, NotificationStatus, RequestStatus, UserRole};

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}
