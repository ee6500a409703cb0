mod common;

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use serde_json::json;
use uuid::Uuid;

use appointment_cell::models::{BookAppointmentRequest, BookingRules, CancelledBy};
use appointment_cell::services::{
    BookingCoordinator, BroadcastNotifier, CompositeNotifier, InMemoryAppointmentStore, WebhookNotifier,
};

use common::{at, schedule_store_with_doctor};

async fn wait_for_requests(server: &MockServer, expected: usize) -> Vec<wiremock::Request> {
    for _ in 0..50 {
        let received = server.received_requests().await.unwrap_or_default();
        if received.len() >= expected {
            return received;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    server.received_requests().await.unwrap_or_default()
}

async fn coordinator_with_webhook(url: String, doctor_id: Uuid) -> BookingCoordinator {
    let notifier = CompositeNotifier::new()
        .with(Arc::new(BroadcastNotifier::new(8)))
        .with(Arc::new(WebhookNotifier::new(url)));

    BookingCoordinator::new(
        schedule_store_with_doctor(doctor_id).await,
        Arc::new(InMemoryAppointmentStore::new()),
        Arc::new(notifier),
        BookingRules::default(),
    )
}

fn request(doctor_id: Uuid) -> BookAppointmentRequest {
    BookAppointmentRequest {
        doctor_id,
        patient_id: Uuid::new_v4(),
        start_time: at(10, 0),
        end_time: at(10, 30),
        appointment_type: Default::default(),
        reason: None,
    }
}

#[tokio::test]
async fn test_webhook_receives_committed_events() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let doctor_id = Uuid::new_v4();
    let coordinator = coordinator_with_webhook(format!("{}/events", server.uri()), doctor_id).await;

    let appointment = coordinator.book(request(doctor_id)).await.unwrap();
    coordinator
        .cancel(appointment.id, "Double booked elsewhere", CancelledBy::Patient)
        .await
        .unwrap();

    let received = wait_for_requests(&server, 2).await;
    assert_eq!(received.len(), 2);

    let mut events: Vec<String> = received
        .iter()
        .map(|r| {
            let body: serde_json::Value = serde_json::from_slice(&r.body).unwrap();
            assert_eq!(body["appointment"]["id"], appointment.id.to_string());
            body["event"].as_str().unwrap().to_string()
        })
        .collect();
    events.sort();
    assert_eq!(events, vec!["booked".to_string(), "cancelled".to_string()]);
}

#[tokio::test]
async fn test_webhook_failure_does_not_affect_booking() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "event": "booked" })))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let doctor_id = Uuid::new_v4();
    let coordinator = coordinator_with_webhook(server.uri(), doctor_id).await;

    let appointment = coordinator.book(request(doctor_id)).await.unwrap();
    assert_eq!(coordinator.get_appointment(appointment.id).await.unwrap(), appointment);

    wait_for_requests(&server, 1).await;
}

#[tokio::test]
async fn test_unreachable_webhook_does_not_affect_booking() {
    let doctor_id = Uuid::new_v4();
    // Nothing listens on port 9 (discard) in the test environment.
    let coordinator = coordinator_with_webhook("http://127.0.0.1:9/events".to_string(), doctor_id).await;

    assert!(coordinator.book(request(doctor_id)).await.is_ok());
}
