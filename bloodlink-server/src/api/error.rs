//! Error type shared by every API handler.
//!
//! Every failure is rendered as `{"message": "..."}`. Internal errors are
//! logged here and reach the client only as a generic message.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bloodlink_core::matching::MatchError;
use bloodlink_core::processors::{AcceptError, DonationError, InboxError, IntakeError};
use bloodlink_core::store::StoreError;
use bloodlink_sdk::objects::ErrorResponse;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "API internal error");
                "Internal server error".to_string()
            }
            ApiError::BadRequest(m) | ApiError::NotFound(m) | ApiError::Conflict(m) => m,
        };
        (status, Json(ErrorResponse { message })).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => ApiError::Conflict(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<IntakeError> for ApiError {
    fn from(err: IntakeError) -> Self {
        match err {
            IntakeError::InvalidInput(m) => ApiError::BadRequest(m),
            IntakeError::Store(e) => e.into(),
        }
    }
}

impl From<AcceptError> for ApiError {
    fn from(err: AcceptError) -> Self {
        match err {
            AcceptError::InvalidInput(m) => ApiError::BadRequest(m),
            AcceptError::RequestNotFound(_) => ApiError::NotFound(err.to_string()),
            AcceptError::Store(e) => e.into(),
            AcceptError::Credential(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<DonationError> for ApiError {
    fn from(err: DonationError) -> Self {
        match err {
            DonationError::DonorNotFound(_) => ApiError::NotFound(err.to_string()),
            DonationError::Transition(e) => ApiError::Conflict(e.to_string()),
            DonationError::Store(e) => e.into(),
        }
    }
}

impl From<InboxError> for ApiError {
    fn from(err: InboxError) -> Self {
        match err {
            InboxError::NotFound(_) => ApiError::NotFound(err.to_string()),
            InboxError::Transition(e) => ApiError::Conflict(e.to_string()),
            InboxError::Store(e) => e.into(),
        }
    }
}

impl From<MatchError> for ApiError {
    fn from(err: MatchError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bloodlink_core::entities::notification::{NotificationStatus, TransitionError};

    #[test]
    fn test_status_mapping() {
        let not_found: ApiError = AcceptError::RequestNotFound(uuid::Uuid::nil()).into();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let invalid: ApiError = IntakeError::InvalidInput("bad".into()).into();
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let transition: ApiError = InboxError::Transition(TransitionError {
            from: NotificationStatus::Accepted,
            to: NotificationStatus::Pending,
        })
        .into();
        assert_eq!(transition.status(), StatusCode::CONFLICT);

        let duplicate: ApiError = StoreError::DuplicateEmail.into();
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_internal_detail_is_hidden() {
        let response = ApiError::Internal("connection refused".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let parsed: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.message, "Internal server error");
    }
}
