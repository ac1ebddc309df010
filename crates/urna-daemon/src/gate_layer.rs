//! Sealed-election request interception.
//!
//! Runs on every routed panel request, before any proxying or handler
//! logic. When the gate reports a sealed system and the route's
//! `(resource, operation)` pair is not allow-listed, the request is
//! short-circuited: structured callers get a 403 denial envelope,
//! interactive callers get a redirect to the resource's safe view. Allowed
//! requests proceed with advisory seal context attached for downstream
//! handlers.

use std::collections::BTreeSet;

use axum::extract::{MatchedPath, Request, State};
use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Redirect, Response};
use serde_json::json;
use tracing::info;

use urna_core::client::ElectionId;

use crate::routes::resolve;
use crate::AppState;

/// User-facing denial text, shared by both response shapes.
pub const DENIAL_MESSAGE: &str = "This action is not allowed while elections are sealed. \
     Only read-only views and voter password management remain available.";

/// Advisory sealed-state metadata attached to allowed requests.
#[derive(Debug, Clone, Default)]
pub struct SealContext {
    /// Whether any election is sealed right now.
    pub sealed: bool,
    /// The sealed election ids, empty when unsealed.
    pub sealed_ids: BTreeSet<ElectionId>,
}

/// The interception layer itself.
///
/// Installed with `Router::route_layer` so the matched path pattern is
/// available for route-table resolution.
pub async fn enforce_sealed_restrictions(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(matched) = request.extensions().get::<MatchedPath>().cloned() else {
        return next.run(request).await;
    };
    let Some(spec) = resolve(request.method(), matched.as_str()) else {
        return next.run(request).await;
    };

    let sealed = state.gate.is_sealed().await;
    if sealed
        && !state
            .gate
            .is_action_allowed(spec.resource.as_str(), spec.operation)
            .await
    {
        info!(
            resource = spec.resource.as_str(),
            operation = spec.operation,
            "blocking request: sealed elections restrict this action"
        );
        return denial_response(request.headers(), spec.resource.safe_redirect());
    }

    let sealed_ids = if sealed {
        state.gate.sealed_ids().await
    } else {
        BTreeSet::new()
    };
    let mut request = request;
    request
        .extensions_mut()
        .insert(SealContext { sealed, sealed_ids });
    next.run(request).await
}

/// Whether the caller consumes structured responses.
fn wants_json(headers: &HeaderMap) -> bool {
    let header_contains_json = |name| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.contains("application/json"))
    };
    header_contains_json(ACCEPT) || header_contains_json(CONTENT_TYPE)
}

/// 403 envelope for structured callers, safe-view redirect for the rest.
fn denial_response(headers: &HeaderMap, safe_redirect: &str) -> Response {
    if wants_json(headers) {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({
                "success": false,
                "message": DENIAL_MESSAGE,
                "blocked": true,
                "reason": "sealed_election",
            })),
        )
            .into_response();
    }
    Redirect::to(&format!("{safe_redirect}?notice=sealed_election")).into_response()
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers_with(name: axum::http::HeaderName, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn json_accept_header_wants_json() {
        assert!(wants_json(&headers_with(ACCEPT, "application/json")));
        assert!(wants_json(&headers_with(
            ACCEPT,
            "text/html, application/json;q=0.9"
        )));
        assert!(wants_json(&headers_with(
            CONTENT_TYPE,
            "application/json; charset=utf-8"
        )));
        assert!(!wants_json(&headers_with(ACCEPT, "text/html")));
        assert!(!wants_json(&HeaderMap::new()));
    }

    #[test]
    fn structured_denial_is_403() {
        let response = denial_response(&headers_with(ACCEPT, "application/json"), "/election");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn interactive_denial_redirects_to_safe_view() {
        let response = denial_response(&headers_with(ACCEPT, "text/html"), "/election");
        assert!(response.status().is_redirection());
        assert_eq!(
            response.headers().get("location").unwrap(),
            "/election?notice=sealed_election"
        );
    }
}
