use axum::extract::State;
use bloodlink_core::processors::AcceptCommand;
use bloodlink_sdk::objects::{AcceptRequest, AcceptResponse};

use crate::api::dto::{accepting_donor_summary, request_response};
use crate::api::error::ApiError;
use crate::api::extractors::ApiJson;
use crate::state::AppState;

/// `POST /accept`: accept a blood request.
///
/// Repeating the call for the same donor returns the current request
/// without producing further notifications.
pub(super) async fn accept_request(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<AcceptRequest>,
) -> Result<ApiJson<AcceptResponse>, ApiError> {
    let command = AcceptCommand::try_from(body)?;
    let acceptance = state.acceptance.accept(command).await?;

    Ok(ApiJson(AcceptResponse {
        request: request_response(&acceptance.request),
        donor: accepting_donor_summary(&acceptance.donor),
        new_donor_created: acceptance.new_donor_created,
    }))
}
