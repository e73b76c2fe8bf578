//! Blood request API handlers.
//!
//! # Endpoints
//!
//! - `POST /request`                – create a request and notify matching donors
//! - `POST /accept`                 – accept a request as a known or new donor
//! - `GET  /donors`                 – search eligible donors
//! - `GET  /requests/{id}`          – request with seeker and accepted donors
//! - `GET  /requests/{id}/donors`   – accepted donors of a request
//! - `GET  /admin/requests`         – every request, newest first
//! - `POST /confirm-donation`       – record a completed donation

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

mod accept;
mod confirm_donation;
mod create_request;
mod donors;
mod requests;

/// Build the blood request router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/request", post(create_request::create_request))
        .route("/accept", post(accept::accept_request))
        .route("/donors", get(donors::search_donors))
        .route("/requests/{id}", get(requests::get_request))
        .route("/requests/{id}/donors", get(requests::accepted_donors))
        .route("/admin/requests", get(requests::list_requests))
        .route("/confirm-donation", post(confirm_donation::confirm_donation))
}
