use axum::extract::State;
use bloodlink_sdk::objects::{DonorQuery, DonorResponse};
use time::OffsetDateTime;

use crate::api::dto::donor_response;
use crate::api::error::ApiError;
use crate::api::extractors::{ApiJson, ApiQuery};
use crate::state::AppState;

/// `GET /donors?bloodType=&location=`: available donors outside the cooldown.
///
/// `+` in a blood type must be percent-encoded (`O%2B`), otherwise it
/// arrives as a space and the query is rejected.
pub(super) async fn search_donors(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<DonorQuery>,
) -> Result<ApiJson<Vec<DonorResponse>>, ApiError> {
    let location = query
        .location
        .map(|l| l.trim().to_owned())
        .filter(|l| !l.is_empty());
    let donors = state
        .matcher
        .search(
            query.blood_type.map(Into::into),
            location,
            OffsetDateTime::now_utc(),
        )
        .await?;
    Ok(ApiJson(donors.iter().map(donor_response).collect()))
}
