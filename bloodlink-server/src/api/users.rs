//! User profile handlers.
//!
//! - `PATCH /{user_id}/availability` – toggle whether the donor can be matched

use axum::{Router, extract::State, routing::patch};
use bloodlink_sdk::objects::{AvailabilityUpdate, DonorResponse};
use uuid::Uuid;

use super::dto::donor_response;
use super::error::ApiError;
use super::extractors::{ApiJson, ApiPath};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/{user_id}/availability", patch(set_availability))
}

async fn set_availability(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<AvailabilityUpdate>,
) -> Result<ApiJson<DonorResponse>, ApiError> {
    let user = state
        .ledger
        .set_availability(user_id, body.is_available)
        .await?;
    tracing::info!(%user_id, is_available = user.is_available, "Availability updated");
    Ok(ApiJson(donor_response(&user)))
}
