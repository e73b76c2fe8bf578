use axum::extract::State;
use bloodlink_core::entities::blood_request::BloodRequest;
use bloodlink_core::entities::user::User;
use bloodlink_sdk::objects::{
    BloodRequestDetail, BloodRequestResponse, DonorSummary, RequestListQuery,
};
use uuid::Uuid;

use crate::api::dto::{donor_summary, request_response, seeker_summary};
use crate::api::error::ApiError;
use crate::api::extractors::{ApiJson, ApiPath, ApiQuery};
use crate::state::AppState;

/// `GET /requests/{id}`
pub(super) async fn get_request(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<ApiJson<BloodRequestDetail>, ApiError> {
    let request = find_request(&state, id).await?;
    let seeker = state.stores.users.find_by_id(request.seeker_id).await?;
    let donors = accepted_in_order(&state, &request).await?;

    Ok(ApiJson(BloodRequestDetail {
        request: request_response(&request),
        seeker: seeker.as_ref().map(seeker_summary),
        accepted_donors: donors,
    }))
}

/// `GET /requests/{id}/donors`
pub(super) async fn accepted_donors(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<ApiJson<Vec<DonorSummary>>, ApiError> {
    let request = find_request(&state, id).await?;
    Ok(ApiJson(accepted_in_order(&state, &request).await?))
}

const DEFAULT_LIST_LIMIT: usize = 100;
const MAX_LIST_LIMIT: usize = 500;

/// `GET /admin/requests?limit=`: newest first.
pub(super) async fn list_requests(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<RequestListQuery>,
) -> Result<ApiJson<Vec<BloodRequestResponse>>, ApiError> {
    let limit = match query.limit {
        Some(0) => return Err(ApiError::BadRequest("limit must be at least 1".into())),
        Some(limit) => limit.min(MAX_LIST_LIMIT),
        None => DEFAULT_LIST_LIMIT,
    };
    let requests = state.stores.requests.list_recent(limit).await?;
    Ok(ApiJson(requests.iter().map(request_response).collect()))
}

async fn find_request(state: &AppState, id: Uuid) -> Result<BloodRequest, ApiError> {
    state
        .stores
        .requests
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Request not found".into()))
}

/// Registered accepting donors in acceptance order. Ids without an account
/// are skipped.
async fn accepted_in_order(
    state: &AppState,
    request: &BloodRequest,
) -> Result<Vec<DonorSummary>, ApiError> {
    let users = state.stores.users.find_by_ids(&request.accepted_by).await?;
    Ok(request
        .accepted_by
        .iter()
        .filter_map(|id| users.iter().find(|u: &&User| u.id == *id))
        .map(donor_summary)
        .collect())
}
