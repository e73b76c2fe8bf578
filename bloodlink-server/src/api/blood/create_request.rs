use axum::{extract::State, http::StatusCode};
use bloodlink_core::processors::NewRequestCommand;
use bloodlink_sdk::objects::{BloodRequestResponse, CreateBloodRequest};

use crate::api::dto::request_response;
use crate::api::error::ApiError;
use crate::api::extractors::ApiJson;
use crate::state::AppState;

/// `POST /request`: create a blood request.
///
/// Donor matching and notification run before the response is sent, but
/// their failures never fail the request: once it is stored the seeker
/// gets a 201.
pub(super) async fn create_request(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateBloodRequest>,
) -> Result<(StatusCode, ApiJson<BloodRequestResponse>), ApiError> {
    let command = NewRequestCommand::try_from(body)?;
    let outcome = state.intake.submit(command).await?;

    match outcome.report {
        Some(report) => tracing::info!(
            request_id = %outcome.request.id,
            notified = report.notified,
            emailed = report.emailed,
            failed = report.failed,
            "Donors notified"
        ),
        None => tracing::warn!(
            request_id = %outcome.request.id,
            "Request stored without notifying donors"
        ),
    }

    Ok((
        StatusCode::CREATED,
        ApiJson(request_response(&outcome.request)),
    ))
}
