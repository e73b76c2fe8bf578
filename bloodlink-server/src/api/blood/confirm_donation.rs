use axum::extract::State;
use bloodlink_sdk::objects::{ConfirmDonation, ConfirmDonationResponse};
use time::OffsetDateTime;

use crate::api::dto::donor_response;
use crate::api::error::ApiError;
use crate::api::extractors::ApiJson;
use crate::state::AppState;

/// `POST /confirm-donation`: mark a donor as having donated.
///
/// The donor becomes unavailable and enters the cooldown window; a named
/// request is marked fulfilled.
pub(super) async fn confirm_donation(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ConfirmDonation>,
) -> Result<ApiJson<ConfirmDonationResponse>, ApiError> {
    let donor_id = body
        .donor_id
        .ok_or_else(|| ApiError::BadRequest("donorId is required".into()))?;
    let donor = state
        .ledger
        .confirm_donation(donor_id, body.request_id, OffsetDateTime::now_utc())
        .await?;

    Ok(ApiJson(ConfirmDonationResponse {
        message: "Donation confirmed".into(),
        donor: donor_response(&donor),
    }))
}
