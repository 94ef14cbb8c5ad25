//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use prioritize_action_board::infrastructure::InMemoryActionBoardRepository;
use prioritize_core::clock::Clock;
use prioritize_core::config::EventSettings;
use prioritize_core::consumer::EventConsumer;
use prioritize_core::listener::DestinationCategory;
use prioritize_event_store::InMemoryEventStore;
use prioritize_registry::EventRegistry;
use prioritize_test_support::{FixedClock, RecordingConsumer};
use tower::ServiceExt;

use prioritize_api::state::AppState;

/// Fixed timestamp used across all integration tests.
fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(
        chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 1, 15, 10, 0, 0).unwrap(),
    ))
}

/// A full app over in-memory stores, with recorders for users and documents.
pub struct TestApp {
    pub router: Router,
    pub registry: Arc<EventRegistry>,
    pub users: Arc<RecordingConsumer>,
    pub documents: Arc<RecordingConsumer>,
}

/// Build the full app router with default settings.
pub fn build_test_app() -> TestApp {
    build_test_app_with(EventSettings::default())
}

/// Build the full app router with custom settings.
pub fn build_test_app_with(settings: EventSettings) -> TestApp {
    let users = Arc::new(RecordingConsumer::new());
    let documents = Arc::new(RecordingConsumer::new());
    let registry = Arc::new(
        EventRegistry::initialize(
            settings,
            Arc::new(InMemoryEventStore::new()),
            fixed_clock(),
            [
                (
                    DestinationCategory::User,
                    Arc::clone(&users) as Arc<dyn EventConsumer>,
                ),
                (
                    DestinationCategory::Document,
                    Arc::clone(&documents) as Arc<dyn EventConsumer>,
                ),
            ],
        )
        .unwrap(),
    );
    let app_state = AppState::new(
        Arc::clone(&registry),
        Arc::new(InMemoryActionBoardRepository::new()),
    );

    TestApp {
        router: prioritize_api::app(app_state),
        registry,
        users,
        documents,
    }
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap()
    };

    (status, json)
}

fn json_request(method: &str, uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, json_request("POST", uri, body)).await
}

/// Send a PUT request with a JSON body and return the response.
pub async fn put_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, json_request("PUT", uri, body)).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}

/// Send a DELETE request and return the response.
pub async fn delete(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}
