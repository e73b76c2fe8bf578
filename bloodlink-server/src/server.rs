//! Axum server setup and router configuration.

use crate::api;
use crate::shutdown::shutdown_signal;
use crate::state::AppState;
use axum::{Json, Router, response::IntoResponse, routing::get};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Build the main application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(api::ws::realtime_ws))
        .nest("/api/blood", api::blood::router())
        .nest("/api/notifications", api::notifications::router())
        .nest("/api/users", api::users::router())
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Simple health check - returns OK if the server is running.
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Run the server with graceful shutdown support.
pub async fn run_server(router: Router, addr: SocketAddr) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::{TestApp, test_app};
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use bloodlink_core::entities::blood_request::NewBloodRequest;
    use bloodlink_core::entities::notification::{
        NotificationFilter, NotificationKind, NotificationStatus,
    };
    use bloodlink_core::entities::user::{NewUser, User};
    use bloodlink_core::entities::{BloodType, UserRole};
    use bloodlink_core::store::{BloodRequestStore, NotificationStore, UserStore};
    use bloodlink_sdk::objects::{
        AcceptResponse, BloodRequestDetail, BloodRequestResponse, ConfirmDonationResponse,
        DonorResponse, ErrorResponse, NotificationResponse, RequestStatus, UnreadCount,
    };
    use serde::de::DeserializeOwned;
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use uuid::Uuid;

    async fn call(
        app: &TestApp,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Vec<u8>) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = build_router(app.state.clone())
            .oneshot(request)
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    fn parse<T: DeserializeOwned>(bytes: &[u8]) -> T {
        serde_json::from_slice(bytes).unwrap()
    }

    async fn user(
        app: &TestApp,
        name: &str,
        role: UserRole,
        blood_type: Option<BloodType>,
    ) -> User {
        UserStore::create(
            app.store.as_ref(),
            NewUser {
                name: name.into(),
                email: format!("{}@example.com", name.to_lowercase()),
                password_hash: "$argon2id$test".into(),
                role,
                blood_type,
                location: Some("Pune".into()),
                phone: Some("+91 90000 00000".into()),
                is_available: true,
                email_notifications: true,
            },
        )
        .await
        .unwrap()
    }

    async fn create_request(
        app: &TestApp,
        seeker: &User,
        blood_type: &str,
    ) -> BloodRequestResponse {
        let (status, body) = call(
            app,
            Method::POST,
            "/api/blood/request",
            Some(json!({
                "seekerId": seeker.id,
                "bloodType": blood_type,
                "location": "Pune",
                "patientName": "Meera",
                "quantity": "2 units"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        parse(&body)
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app();
        let (status, body) = call(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        let value: Value = parse(&body);
        assert_eq!(value["status"], "healthy");
    }

    #[tokio::test]
    async fn test_create_request_notifies_matching_donors() {
        let app = test_app();
        let seeker = user(&app, "Sita", UserRole::Seeker, None).await;
        let a = user(&app, "Arun", UserRole::Donor, Some(BloodType::ONegative)).await;
        let b = user(&app, "Bina", UserRole::Donor, Some(BloodType::ONegative)).await;
        user(&app, "Chetan", UserRole::Donor, Some(BloodType::APositive)).await;

        let request = create_request(&app, &seeker, "O-").await;
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.quantity.as_deref(), Some("2 units"));
        assert!(request.accepted_by.is_empty());

        let pending = app
            .store
            .count(
                NotificationFilter::for_request(request.id)
                    .kind(NotificationKind::BloodRequest)
                    .statuses(&[NotificationStatus::Pending]),
            )
            .await
            .unwrap();
        assert_eq!(pending, 2);

        let mut emailed: Vec<String> = app.outbox.sent().into_iter().map(|m| m.to).collect();
        emailed.sort();
        assert_eq!(emailed, vec![a.email, b.email]);
    }

    #[tokio::test]
    async fn test_create_request_missing_fields_is_400() {
        let app = test_app();
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/blood/request",
            Some(json!({ "bloodType": "O-", "location": "Pune" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: ErrorResponse = parse(&body);
        assert_eq!(error.message, "seekerId, bloodType and location are required");
    }

    #[tokio::test]
    async fn test_malformed_json_is_400_with_message_body() {
        let app = test_app();
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/blood/request",
            Some(json!({ "seekerId": "not-a-uuid" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: ErrorResponse = parse(&body);
        assert!(!error.message.is_empty());
    }

    #[tokio::test]
    async fn test_accept_scenario_and_idempotency() {
        let app = test_app();
        let seeker = user(&app, "Sita", UserRole::Seeker, None).await;
        let a = user(&app, "Arun", UserRole::Donor, Some(BloodType::ONegative)).await;
        let b = user(&app, "Bina", UserRole::Donor, Some(BloodType::ONegative)).await;
        let request = create_request(&app, &seeker, "O-").await;

        let body = json!({ "requestId": request.id, "donorId": a.id });
        let (status, bytes) = call(
            &app,
            Method::POST,
            "/api/blood/accept",
            Some(body.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let accepted: AcceptResponse = parse(&bytes);
        assert_eq!(accepted.request.accepted_by, vec![a.id]);
        assert_eq!(accepted.donor.name, "Arun");
        assert!(!accepted.new_donor_created);

        let (status, _) = call(&app, Method::POST, "/api/blood/accept", Some(body)).await;
        assert_eq!(status, StatusCode::OK);

        let (_, bytes) = call(
            &app,
            Method::GET,
            &format!("/api/notifications/{}", seeker.id),
            None,
        )
        .await;
        let seeker_inbox: Vec<NotificationResponse> = parse(&bytes);
        assert_eq!(seeker_inbox.len(), 1);
        assert_eq!(seeker_inbox[0].message, "Arun has accepted your blood request for O-.");

        let (_, bytes) = call(
            &app,
            Method::GET,
            &format!("/api/notifications/{}", b.id),
            None,
        )
        .await;
        let b_inbox: Vec<NotificationResponse> = parse(&bytes);
        assert_eq!(b_inbox.len(), 1);
        assert_eq!(
            b_inbox[0].status,
            bloodlink_sdk::objects::NotificationStatus::Expired
        );

        let (status, bytes) = call(
            &app,
            Method::GET,
            &format!("/api/blood/requests/{}", request.id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let detail: BloodRequestDetail = parse(&bytes);
        assert_eq!(detail.request.accepted_by, vec![a.id]);
        assert_eq!(detail.seeker.map(|s| s.id), Some(seeker.id));
        assert_eq!(detail.accepted_donors.len(), 1);
        assert_eq!(detail.accepted_donors[0].id, a.id);
    }

    #[tokio::test]
    async fn test_accept_with_donor_data_registers_donor() {
        let app = test_app();
        let seeker = user(&app, "Sita", UserRole::Seeker, None).await;
        let request = create_request(&app, &seeker, "B+").await;

        let (status, bytes) = call(
            &app,
            Method::POST,
            "/api/blood/accept",
            Some(json!({
                "requestId": request.id,
                "donorData": {
                    "name": "Dev",
                    "email": "Dev@Example.com",
                    "bloodType": "B+",
                    "location": "Pune"
                }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let accepted: AcceptResponse = parse(&bytes);
        assert!(accepted.new_donor_created);
        assert_eq!(accepted.donor.email.as_deref(), Some("dev@example.com"));

        let stored = UserStore::find_by_email(app.store.as_ref(), "dev@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.id, accepted.donor.id);
        assert_eq!(stored.role, UserRole::Donor);
    }

    #[tokio::test]
    async fn test_accept_unknown_request_is_404() {
        let app = test_app();
        let (status, bytes) = call(
            &app,
            Method::POST,
            "/api/blood/accept",
            Some(json!({ "requestId": Uuid::now_v7(), "donorId": Uuid::now_v7() })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let error: ErrorResponse = parse(&bytes);
        assert_eq!(error.message, "Request not found");
    }

    #[tokio::test]
    async fn test_accept_without_donor_is_400() {
        let app = test_app();
        let (status, _) = call(
            &app,
            Method::POST,
            "/api/blood/accept",
            Some(json!({ "requestId": Uuid::now_v7() })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_donor_search_filters_and_strips_credentials() {
        let app = test_app();
        let a = user(&app, "Arun", UserRole::Donor, Some(BloodType::OPositive)).await;
        user(&app, "Bina", UserRole::Donor, Some(BloodType::APositive)).await;

        let (status, bytes) = call(
            &app,
            Method::GET,
            "/api/blood/donors?bloodType=O%2B&location=pun",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let raw: Value = parse(&bytes);
        assert!(raw[0].get("passwordHash").is_none());
        let donors: Vec<DonorResponse> = parse(&bytes);
        assert_eq!(donors.len(), 1);
        assert_eq!(donors[0].id, a.id);

        let (status, _) = call(&app, Method::GET, "/api/blood/donors?bloodType=C%2B", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_confirm_donation_fulfils_and_starts_cooldown() {
        let app = test_app();
        let seeker = user(&app, "Sita", UserRole::Seeker, None).await;
        let donor = user(&app, "Arun", UserRole::Donor, Some(BloodType::ONegative)).await;
        let request = create_request(&app, &seeker, "O-").await;

        let (status, bytes) = call(
            &app,
            Method::POST,
            "/api/blood/confirm-donation",
            Some(json!({ "donorId": donor.id, "requestId": request.id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let confirmed: ConfirmDonationResponse = parse(&bytes);
        assert!(!confirmed.donor.is_available);
        assert!(confirmed.donor.last_donated_date.is_some());

        let (_, bytes) = call(&app, Method::GET, "/api/blood/admin/requests", None).await;
        let all: Vec<BloodRequestResponse> = parse(&bytes);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, RequestStatus::Fulfilled);

        let (_, bytes) = call(&app, Method::GET, "/api/blood/donors?bloodType=O-", None).await;
        let donors: Vec<DonorResponse> = parse(&bytes);
        assert!(donors.is_empty());
    }

    #[tokio::test]
    async fn test_admin_request_list_is_bounded() {
        let app = test_app();
        let seeker = Uuid::now_v7();
        for i in 0..505 {
            BloodRequestStore::create(
                app.store.as_ref(),
                NewBloodRequest {
                    seeker_id: seeker,
                    blood_type: BloodType::ONegative,
                    location: format!("Ward {i}"),
                    location_url: None,
                    patient_name: None,
                    quantity: None,
                },
            )
            .await
            .unwrap();
        }

        let (status, bytes) = call(&app, Method::GET, "/api/blood/admin/requests", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse::<Vec<BloodRequestResponse>>(&bytes).len(), 100);

        let uri = "/api/blood/admin/requests?limit=2";
        let (_, bytes) = call(&app, Method::GET, uri, None).await;
        let newest: Vec<BloodRequestResponse> = parse(&bytes);
        let locations: Vec<&str> = newest.iter().map(|r| r.location.as_str()).collect();
        assert_eq!(locations, vec!["Ward 504", "Ward 503"]);

        let uri = "/api/blood/admin/requests?limit=10000";
        let (_, bytes) = call(&app, Method::GET, uri, None).await;
        assert_eq!(parse::<Vec<BloodRequestResponse>>(&bytes).len(), 500);

        for bad in ["limit=0", "limit=many", "limit=-1"] {
            let uri = format!("/api/blood/admin/requests?{bad}");
            let (status, bytes) = call(&app, Method::GET, &uri, None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{bad}");
            let _: ErrorResponse = parse(&bytes);
        }
    }

    #[tokio::test]
    async fn test_confirm_donation_errors() {
        let app = test_app();
        let (status, _) = call(
            &app,
            Method::POST,
            "/api/blood/confirm-donation",
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/blood/confirm-donation",
            Some(json!({ "donorId": Uuid::now_v7() })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_notification_read_and_status_endpoints() {
        let app = test_app();
        let seeker = user(&app, "Sita", UserRole::Seeker, None).await;
        let donor = user(&app, "Arun", UserRole::Donor, Some(BloodType::ONegative)).await;
        create_request(&app, &seeker, "O-").await;
        create_request(&app, &seeker, "O-").await;

        let unread_uri = format!("/api/notifications/user/{}/unread-count", donor.id);
        let (_, bytes) = call(&app, Method::GET, &unread_uri, None).await;
        assert_eq!(parse::<UnreadCount>(&bytes).count, 2);

        let (_, bytes) = call(
            &app,
            Method::GET,
            &format!("/api/notifications/{}", donor.id),
            None,
        )
        .await;
        let inbox: Vec<NotificationResponse> = parse(&bytes);
        let first = inbox[0].id;

        let (status, bytes) = call(
            &app,
            Method::PUT,
            &format!("/api/notifications/{first}/read"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(parse::<NotificationResponse>(&bytes).is_read);
        let (_, bytes) = call(&app, Method::GET, &unread_uri, None).await;
        assert_eq!(parse::<UnreadCount>(&bytes).count, 1);

        let status_uri = format!("/api/notifications/{first}/status");
        let (status, _) = call(
            &app,
            Method::PUT,
            &status_uri,
            Some(json!({ "status": "rejected" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, bytes) = call(
            &app,
            Method::PUT,
            &status_uri,
            Some(json!({ "status": "pending" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(!parse::<ErrorResponse>(&bytes).message.is_empty());

        let (status, _) = call(
            &app,
            Method::PUT,
            &format!("/api/notifications/user/{}/read-all", donor.id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (_, bytes) = call(&app, Method::GET, &unread_uri, None).await;
        assert_eq!(parse::<UnreadCount>(&bytes).count, 0);

        let (status, _) = call(
            &app,
            Method::PUT,
            &format!("/api/notifications/{}/read", Uuid::now_v7()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_availability_toggle_and_bad_path() {
        let app = test_app();
        let donor = user(&app, "Arun", UserRole::Donor, Some(BloodType::ONegative)).await;

        let (status, bytes) = call(
            &app,
            Method::PATCH,
            &format!("/api/users/{}/availability", donor.id),
            Some(json!({ "isAvailable": false })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(!parse::<DonorResponse>(&bytes).is_available);

        let (status, bytes) = call(
            &app,
            Method::PATCH,
            "/api/users/not-a-uuid/availability",
            Some(json!({ "isAvailable": true })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!parse::<ErrorResponse>(&bytes).message.is_empty());
    }

    #[tokio::test]
    async fn test_request_lookup_unknown_is_404() {
        let app = test_app();
        let (status, _) = call(
            &app,
            Method::GET,
            &format!("/api/blood/requests/{}/donors", Uuid::now_v7()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_request_creation_reaches_realtime_subscribers() {
        let app = test_app();
        let mut frames = app.state.hub.subscribe();
        let seeker = user(&app, "Sita", UserRole::Seeker, None).await;
        let request = create_request(&app, &seeker, "AB-").await;

        let frame = frames.recv().await.unwrap();
        assert_eq!(frame.event, "blood-request-notification");
        assert_eq!(frame.payload["requestId"], json!(request.id));
        assert_eq!(frame.payload["bloodType"], "AB-");
    }
}
