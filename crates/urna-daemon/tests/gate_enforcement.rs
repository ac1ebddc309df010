//! End-to-end gate enforcement over the panel router.
//!
//! Drives the assembled router with in-memory requests against a mock
//! election API. Proxy routes that pass the gate still fail upstream (there
//! is no upstream here) and answer 502 — which is exactly the signal that
//! the request got past the interception layer instead of being denied.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use tower::util::ServiceExt;

use urna_core::client::types::{ElectionStatus, ElectionSummary};
use urna_core::client::{ElectionApi, MockElectionApi};
use urna_core::clock::{Clock, ManualClock};
use urna_core::gate::SealGate;
use urna_daemon::routes::build_router;
use urna_daemon::AppState;

fn sealed_election(id: u64) -> ElectionSummary {
    let start = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    ElectionSummary {
        id,
        title: format!("Election {id}"),
        status: ElectionStatus::Completed,
        start_date: start,
        end_date: start + chrono::Duration::hours(6),
        company_id: Some(1),
        election_type: None,
    }
}

fn router_over(api: MockElectionApi) -> axum::Router {
    let api: Arc<dyn ElectionApi> = Arc::new(api);
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap(),
    ));
    let gate = Arc::new(SealGate::new(
        Arc::clone(&api),
        clock,
        Duration::from_secs(60),
        1000,
    ));
    // Port 9 is unroutable locally: allowed proxy requests fail fast with
    // 502 instead of hanging.
    let state = AppState::new(gate, reqwest::Client::new(), "http://127.0.0.1:9");
    build_router(state)
}

fn sealed_router() -> axum::Router {
    router_over(MockElectionApi::new().with_elections(vec![sealed_election(7)]))
}

fn unsealed_router() -> axum::Router {
    router_over(MockElectionApi::new())
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn sealed_mutation_denied_with_structured_envelope() {
    let response = sealed_router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/election")
                .header("accept", "application/json")
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["blocked"], true);
    assert_eq!(body["reason"], "sealed_election");
    assert!(body["message"].as_str().unwrap().contains("not allowed"));
}

#[tokio::test]
async fn sealed_mutation_redirects_interactive_callers() {
    let response = sealed_router()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/candidate/3")
                .header("accept", "text/html")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    assert_eq!(
        response.headers().get("location").unwrap(),
        "/candidate?notice=sealed_election"
    );
}

#[tokio::test]
async fn sealed_listing_passes_the_gate() {
    let response = sealed_router()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/election")
                .header("accept", "application/json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // Past the gate, into the proxy, which has no upstream to talk to.
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn sealed_voter_password_reset_passes_the_gate() {
    let response = sealed_router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/voter/5/password-reset")
                .header("accept", "application/json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn unsealed_mutation_passes_the_gate() {
    let response = unsealed_router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/election")
                .header("accept", "application/json")
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn sealed_status_route_reports_gate_state() {
    let response = sealed_router()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/election/sealed-status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["hasSealedElections"], true);
    assert_eq!(body["sealedElectionIds"], serde_json::json!([7]));
}

#[tokio::test]
async fn home_route_serves_service_info() {
    let response = unsealed_router()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["service"], "urna-admin-panel");
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let response = unsealed_router()
        .oneshot(
            Request::builder()
                .uri("/nonexistent")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
