mod common;

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use appointment_cell::services::{BroadcastNotifier, InMemoryAppointmentStore};
use appointment_cell::{appointment_routes, availability_routes, AppointmentState};
use doctor_cell::{InMemoryScheduleStore, UnavailableRange};
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

use common::{at, schedule_store_with_doctor};

struct TestApp {
    router: Router,
    schedules: Arc<InMemoryScheduleStore>,
    secret: String,
    doctor: TestUser,
    patient: TestUser,
}

impl TestApp {
    async fn new() -> Self {
        let config = TestConfig::default();
        let doctor_id = Uuid::new_v4();
        let schedules = schedule_store_with_doctor(doctor_id).await;

        let state = AppointmentState::new(
            config.to_arc(),
            schedules.clone(),
            Arc::new(InMemoryAppointmentStore::new()),
            Arc::new(BroadcastNotifier::new(16)),
        );

        let router = Router::new()
            .nest("/appointments", appointment_routes(state.clone()))
            .nest("/doctors", availability_routes(state));

        Self {
            router,
            schedules,
            secret: config.jwt_secret,
            doctor: TestUser::with_id(doctor_id, "doctor@example.com", "doctor"),
            patient: TestUser::patient("patient@example.com"),
        }
    }

    fn token(&self, user: &TestUser) -> String {
        JwtTestUtils::create_test_token(user, &self.secret, None)
    }

    async fn send(&self, method: &str, uri: &str, user: Option<&TestUser>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", self.token(user)));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn booking(&self, patient_id: &str, start: &str, end: &str) -> Value {
        json!({
            "doctor_id": self.doctor.id,
            "patient_id": patient_id,
            "start_time": start,
            "end_time": end,
            "appointment_type": "follow_up",
            "reason": "Check-up"
        })
    }

    async fn book_as_patient(&self, start: &str, end: &str) -> Value {
        let (status, body) = self
            .send("POST", "/appointments", Some(&self.patient), Some(self.booking(&self.patient.id, start, end)))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["appointment"].clone()
    }
}

#[tokio::test]
async fn test_requests_without_token_are_rejected() {
    let app = TestApp::new().await;

    let uri = format!("/doctors/{}/availability?date=2030-01-07", app.doctor.id);
    let (status, body) = app.send("GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");

    let mut request = Request::builder()
        .method("GET")
        .uri(&uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", JwtTestUtils::create_expired_token(&app.patient, &app.secret)))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    request = Request::builder()
        .method("GET")
        .uri(&uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", JwtTestUtils::create_invalid_signature_token(&app.patient)))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_availability_endpoint() {
    let app = TestApp::new().await;

    let uri = format!("/doctors/{}/availability?date=2030-01-07", app.doctor.id);
    let (status, body) = app.send("GET", &uri, Some(&app.patient), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_slots"], 14);
    assert_eq!(body["available_slots"][0]["start_time"], "2030-01-07T09:00:00Z");

    let uri = format!("/doctors/{}/availability?date=07-01-2030", app.doctor.id);
    let (status, body) = app.send("GET", &uri, Some(&app.patient), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let uri = format!("/doctors/{}/availability?date=2030-01-07", Uuid::new_v4());
    let (status, body) = app.send("GET", &uri, Some(&app.patient), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn test_booking_conflict_is_distinguishable() {
    let app = TestApp::new().await;

    let appointment = app.book_as_patient("2030-01-07T10:00:00Z", "2030-01-07T10:30:00Z").await;
    assert_eq!(appointment["status"], "scheduled");
    assert_eq!(appointment["appointment_type"], "follow_up");

    let (status, body) = app
        .send(
            "POST",
            "/appointments",
            Some(&app.patient),
            Some(app.booking(&app.patient.id, "2030-01-07T10:00:00Z", "2030-01-07T10:30:00Z")),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "slot_conflict");

    let (status, body) = app
        .send(
            "POST",
            "/appointments",
            Some(&app.patient),
            Some(app.booking(&app.patient.id, "2030-01-07T11:00:00Z", "2030-01-07T10:30:00Z")),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let uri = format!("/doctors/{}/availability?date=2030-01-07", app.doctor.id);
    let (_, body) = app.send("GET", &uri, Some(&app.patient), None).await;
    assert_eq!(body["total_slots"], 13);
}

#[tokio::test]
async fn test_patients_only_book_for_themselves() {
    let app = TestApp::new().await;
    let someone_else = Uuid::new_v4().to_string();

    let (status, body) = app
        .send(
            "POST",
            "/appointments",
            Some(&app.patient),
            Some(app.booking(&someone_else, "2030-01-07T10:00:00Z", "2030-01-07T10:30:00Z")),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    // The doctor may book into their own calendar.
    let (status, _) = app
        .send(
            "POST",
            "/appointments",
            Some(&app.doctor),
            Some(app.booking(&someone_else, "2030-01-07T10:00:00Z", "2030-01-07T10:30:00Z")),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_appointment_visibility() {
    let app = TestApp::new().await;
    let appointment = app.book_as_patient("2030-01-07T10:00:00Z", "2030-01-07T10:30:00Z").await;
    let uri = format!("/appointments/{}", appointment["id"].as_str().unwrap());

    let (status, body) = app.send("GET", &uri, Some(&app.patient), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], appointment["id"]);

    let (status, _) = app.send("GET", &uri, Some(&app.doctor), None).await;
    assert_eq!(status, StatusCode::OK);

    let stranger = TestUser::patient("stranger@example.com");
    let (status, _) = app.send("GET", &uri, Some(&stranger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let other_doctor = TestUser::doctor("other@example.com");
    let (status, _) = app.send("GET", &uri, Some(&other_doctor), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = TestUser::admin("admin@example.com");
    let (status, _) = app.send("GET", &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send("GET", &format!("/appointments/{}", Uuid::new_v4()), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_lifecycle_over_http() {
    let app = TestApp::new().await;
    let appointment = app.book_as_patient("2030-01-07T10:00:00Z", "2030-01-07T10:30:00Z").await;
    let id = appointment["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .send("GET", &format!("/appointments/{}/transitions", id), Some(&app.patient), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["allowed_transitions"].as_array().unwrap().len(), 5);

    // Confirming is the doctor's call.
    let transition_uri = format!("/appointments/{}/transition", id);
    let (status, _) = app
        .send("POST", &transition_uri, Some(&app.patient), Some(json!({ "status": "confirmed" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send("POST", &transition_uri, Some(&app.doctor), Some(json!({ "status": "confirmed" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "confirmed");

    let (status, body) = app
        .send("POST", &transition_uri, Some(&app.doctor), Some(json!({ "status": "scheduled" })))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "invalid_transition");

    let (status, body) = app
        .send(
            "PATCH",
            &format!("/appointments/{}/reschedule", id),
            Some(&app.patient),
            Some(json!({ "new_start_time": "2030-01-07T14:00:00Z" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["id"], id.as_str());
    assert_eq!(body["appointment"]["status"], "scheduled");
    assert_eq!(body["appointment"]["end_date_time"], "2030-01-07T14:30:00Z");

    let cancel_uri = format!("/appointments/{}/cancel", id);
    let (status, body) = app.send("POST", &cancel_uri, Some(&app.patient), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, body) = app
        .send("POST", &cancel_uri, Some(&app.patient), Some(json!({ "reason": "Feeling better" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "cancelled");
    assert_eq!(body["appointment"]["cancelled_by"], "patient");

    let (status, body) = app
        .send("POST", &transition_uri, Some(&app.doctor), Some(json!({ "status": "completed" })))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "invalid_transition");
}

#[tokio::test]
async fn test_listings_and_conflict_check() {
    let app = TestApp::new().await;
    app.book_as_patient("2030-01-07T10:00:00Z", "2030-01-07T10:30:00Z").await;

    let doctor_uri = format!(
        "/appointments/doctors/{}?from=2030-01-07T00:00:00Z&to=2030-01-08T00:00:00Z",
        app.doctor.id
    );
    let (status, body) = app.send("GET", &doctor_uri, Some(&app.doctor), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    let (status, _) = app.send("GET", &doctor_uri, Some(&app.patient), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let patient_uri = format!("/appointments/patients/{}", app.patient.id);
    let (status, body) = app.send("GET", &patient_uri, Some(&app.patient), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    let other_doctor = TestUser::doctor("other@example.com");
    let (status, body) = app.send("GET", &patient_uri, Some(&other_doctor), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);

    let conflict_uri = format!(
        "/appointments/conflicts/check?doctor_id={}&start_time=2030-01-07T10:15:00Z&end_time=2030-01-07T10:45:00Z",
        app.doctor.id
    );
    let (status, body) = app.send("GET", &conflict_uri, Some(&app.patient), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["has_conflict"], true);

    let free_uri = format!(
        "/appointments/conflicts/check?doctor_id={}&start_time=2030-01-07T15:00:00Z&end_time=2030-01-07T15:30:00Z",
        app.doctor.id
    );
    let (_, body) = app.send("GET", &free_uri, Some(&app.patient), None).await;
    assert_eq!(body["has_conflict"], false);
    assert_eq!(body["reason"], Value::Null);
}

#[tokio::test]
async fn test_unavailability_notes_stay_with_the_doctor() {
    let app = TestApp::new().await;
    app.schedules
        .add_unavailable_range(UnavailableRange {
            id: Uuid::new_v4(),
            doctor_id: Uuid::parse_str(&app.doctor.id).unwrap(),
            start_date_time: at(15, 0),
            end_date_time: at(16, 0),
            reason: Some("surgery".to_string()),
        })
        .await
        .unwrap();

    let conflict_uri = format!(
        "/appointments/conflicts/check?doctor_id={}&start_time=2030-01-07T15:00:00Z&end_time=2030-01-07T15:30:00Z",
        app.doctor.id
    );

    let (status, body) = app.send("GET", &conflict_uri, Some(&app.patient), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["has_conflict"], true);
    assert_eq!(body["reason"], "doctor is unavailable");

    let (_, body) = app.send("GET", &conflict_uri, Some(&app.doctor), None).await;
    assert_eq!(body["reason"], "doctor is unavailable (surgery)");

    let (status, body) = app
        .send(
            "POST",
            "/appointments",
            Some(&app.patient),
            Some(app.booking(&app.patient.id, "2030-01-07T15:00:00Z", "2030-01-07T15:30:00Z")),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(!body["error"].as_str().unwrap().contains("surgery"));
}

#[tokio::test]
async fn test_out_of_range_dates_are_rejected() {
    let app = TestApp::new().await;

    // `+` must be percent-encoded in a query string.
    let last_date = NaiveDate::MAX.format("%Y-%m-%d").to_string().replace('+', "%2B");
    let uri = format!("/doctors/{}/availability?date={}", app.doctor.id, last_date);
    let (status, body) = app.send("GET", &uri, Some(&app.patient), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let appointment = app.book_as_patient("2030-01-07T10:00:00Z", "2030-01-07T10:30:00Z").await;
    let last_minute = format!("{}T23:59:00Z", NaiveDate::MAX.format("%Y-%m-%d"));
    let (status, body) = app
        .send(
            "PATCH",
            &format!("/appointments/{}/reschedule", appointment["id"].as_str().unwrap()),
            Some(&app.patient),
            Some(json!({ "new_start_time": last_minute })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
}
