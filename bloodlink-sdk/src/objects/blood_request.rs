//! Request and response types for the blood request endpoints.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{BloodType, RequestStatus, UserRole};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Body of `POST /api/blood/request`.
///
/// Required fields are optional here so the server can answer a missing
/// field with a 400 carrying a readable message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBloodRequest {
    pub seeker_id: Option<Uuid>,
    pub blood_type: Option<BloodType>,
    pub location: Option<String>,
    #[serde(default)]
    pub location_url: Option<String>,
    #[serde(default)]
    pub patient_name: Option<String>,
    #[serde(default)]
    pub quantity: Option<String>,
    /// Seeker-side switch for the email channel. Absent means `true`.
    #[serde(default)]
    pub send_email_notifications: Option<bool>,
}

/// Body of `POST /api/blood/accept`.
///
/// Either `donor_id` (known donor) or `donor_data` (accept-and-register)
/// must be present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptRequest {
    pub request_id: Option<Uuid>,
    #[serde(default)]
    pub donor_id: Option<Uuid>,
    #[serde(default)]
    pub donor_name: Option<String>,
    #[serde(default)]
    pub donor_data: Option<DonorData>,
}

/// Profile supplied by a donor who accepts without an account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorData {
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub blood_type: Option<BloodType>,
    pub location: Option<String>,
    #[serde(default)]
    pub email_notifications: Option<bool>,
}

/// Query string of `GET /api/blood/donors`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorQuery {
    #[serde(default)]
    pub blood_type: Option<BloodType>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Query string of `GET /api/blood/admin/requests`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestListQuery {
    /// Newest requests to return. The server applies a default and a cap.
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Body of `POST /api/blood/confirm-donation`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmDonation {
    pub donor_id: Option<Uuid>,
    #[serde(default)]
    pub request_id: Option<Uuid>,
}

/// Body of `PATCH /api/users/{user_id}/availability`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityUpdate {
    pub is_available: bool,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// A blood request as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BloodRequestResponse {
    pub id: Uuid,
    pub seeker_id: Uuid,
    pub blood_type: BloodType,
    pub location: String,
    pub location_url: Option<String>,
    pub patient_name: Option<String>,
    pub quantity: Option<String>,
    pub status: RequestStatus,
    pub accepted_by: Vec<Uuid>,
    /// Unix timestamp of when the request was created.
    pub created_at: i64,
    pub updated_at: i64,
}

/// Minimal public view of a donor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorSummary {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blood_type: Option<BloodType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeekerSummary {
    pub id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub location: Option<String>,
}

/// `GET /api/blood/requests/{id}` response: the request plus the people on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BloodRequestDetail {
    #[serde(flatten)]
    pub request: BloodRequestResponse,
    pub seeker: Option<SeekerSummary>,
    pub accepted_donors: Vec<DonorSummary>,
}

/// `POST /api/blood/accept` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptResponse {
    pub request: BloodRequestResponse,
    pub donor: DonorSummary,
    pub new_donor_created: bool,
}

/// A user record with the credential stripped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub blood_type: Option<BloodType>,
    pub location: Option<String>,
    pub phone: Option<String>,
    pub is_available: bool,
    pub email_notifications: bool,
    /// Unix timestamp of the last confirmed donation.
    pub last_donated_date: Option<i64>,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmDonationResponse {
    pub message: String,
    pub donor: DonorResponse,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_request_parses_new_donor_payload() {
        let json = r#"{
            "requestId": "0190f3a4-5b6c-7d8e-9f00-112233445566",
            "donorData": {
                "name": "Asha",
                "email": "Asha@Example.com",
                "bloodType": "O-",
                "location": "Pune"
            }
        }"#;
        let parsed: AcceptRequest = serde_json::from_str(json).unwrap();
        assert!(parsed.donor_id.is_none());
        let data = parsed.donor_data.unwrap();
        assert_eq!(data.blood_type, Some(BloodType::ONegative));
        assert_eq!(data.email_notifications, None);
    }

    #[test]
    fn detail_flattens_request_fields() {
        let request = BloodRequestResponse {
            id: Uuid::nil(),
            seeker_id: Uuid::nil(),
            blood_type: BloodType::APositive,
            location: "Mumbai".into(),
            location_url: None,
            patient_name: None,
            quantity: None,
            status: RequestStatus::Pending,
            accepted_by: vec![],
            created_at: 0,
            updated_at: 0,
        };
        let detail = BloodRequestDetail {
            request,
            seeker: None,
            accepted_donors: vec![],
        };
        let value = serde_json::to_value(&detail).unwrap();
        assert_eq!(value["bloodType"], "A+");
        assert_eq!(value["status"], "pending");
        assert!(value["acceptedDonors"].as_array().unwrap().is_empty());
    }
}
