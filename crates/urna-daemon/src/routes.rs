//! Panel route table and upstream proxy.
//!
//! Every panel operation is declared once in [`ROUTES`] with the routing
//! metadata the gate middleware resolves: HTTP method, panel path, the
//! upstream path template it forwards to, and its `(resource, operation)`
//! pair. CRUD handlers carry no per-entity logic — one generic handler
//! forwards method, path parameters, query string, JSON body and the
//! caller's bearer token to the upstream API.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{MatchedPath, Path, RawQuery, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, on, MethodFilter};
use axum::{middleware, Router};
use serde_json::json;
use tracing::warn;

use urna_core::gate::ResourceKind;

use crate::gate_layer::enforce_sealed_restrictions;
use crate::{report_export, AppState};

/// One panel route and its gate metadata.
#[derive(Debug, Clone, Copy)]
pub struct RouteSpec {
    /// HTTP method.
    pub method: &'static str,
    /// Panel path pattern (axum syntax).
    pub path: &'static str,
    /// Upstream path template; `None` for routes served by the panel
    /// itself.
    pub upstream: Option<&'static str>,
    /// Resource kind for the permission table.
    pub resource: ResourceKind,
    /// Operation name for the permission table.
    pub operation: &'static str,
}

/// Every operation the panel serves.
pub const ROUTES: &[RouteSpec] = &[
    // home
    RouteSpec {
        method: "GET",
        path: "/",
        upstream: None,
        resource: ResourceKind::Home,
        operation: "index",
    },
    RouteSpec {
        method: "GET",
        path: "/dashboard",
        upstream: Some("report/dashboard"),
        resource: ResourceKind::Home,
        operation: "dashboard",
    },
    // election
    RouteSpec {
        method: "GET",
        path: "/election",
        upstream: Some("election"),
        resource: ResourceKind::Election,
        operation: "list",
    },
    RouteSpec {
        method: "GET",
        path: "/election/sealed-status",
        upstream: None,
        resource: ResourceKind::Election,
        operation: "getsealedelectionsstatus",
    },
    RouteSpec {
        method: "GET",
        path: "/election/:id",
        upstream: Some("election/{id}"),
        resource: ResourceKind::Election,
        operation: "details",
    },
    RouteSpec {
        method: "POST",
        path: "/election",
        upstream: Some("election"),
        resource: ResourceKind::Election,
        operation: "create",
    },
    RouteSpec {
        method: "PUT",
        path: "/election/:id",
        upstream: Some("election/{id}"),
        resource: ResourceKind::Election,
        operation: "edit",
    },
    RouteSpec {
        method: "DELETE",
        path: "/election/:id",
        upstream: Some("election/{id}"),
        resource: ResourceKind::Election,
        operation: "delete",
    },
    RouteSpec {
        method: "PATCH",
        path: "/election/:id/status",
        upstream: Some("election/{id}/status"),
        resource: ResourceKind::Election,
        operation: "updatestatus",
    },
    // voter
    RouteSpec {
        method: "GET",
        path: "/voter",
        upstream: Some("voter"),
        resource: ResourceKind::Voter,
        operation: "list",
    },
    RouteSpec {
        method: "GET",
        path: "/voter/:id",
        upstream: Some("voter/{id}"),
        resource: ResourceKind::Voter,
        operation: "details",
    },
    RouteSpec {
        method: "POST",
        path: "/voter",
        upstream: Some("voter"),
        resource: ResourceKind::Voter,
        operation: "create",
    },
    RouteSpec {
        method: "PUT",
        path: "/voter/:id",
        upstream: Some("voter/{id}"),
        resource: ResourceKind::Voter,
        operation: "edit",
    },
    RouteSpec {
        method: "DELETE",
        path: "/voter/:id",
        upstream: Some("voter/{id}"),
        resource: ResourceKind::Voter,
        operation: "delete",
    },
    RouteSpec {
        method: "POST",
        path: "/voter/:id/password-reset",
        upstream: Some("voter/{id}/password-reset"),
        resource: ResourceKind::Voter,
        operation: "sendpasswordreset",
    },
    RouteSpec {
        method: "POST",
        path: "/voter/password-reset/mass",
        upstream: Some("voter/password-reset/mass"),
        resource: ResourceKind::Voter,
        operation: "sendmasspasswordreset",
    },
    RouteSpec {
        method: "POST",
        path: "/voter/email/test",
        upstream: Some("email/test-configuration"),
        resource: ResourceKind::Voter,
        operation: "testemailconfiguration",
    },
    RouteSpec {
        method: "POST",
        path: "/voter/email/mass",
        upstream: Some("voter/email/mass"),
        resource: ResourceKind::Voter,
        operation: "sendmassemail",
    },
    RouteSpec {
        method: "POST",
        path: "/voter/:id/email",
        upstream: Some("voter/{id}/email"),
        resource: ResourceKind::Voter,
        operation: "sendindividualemail",
    },
    // candidate
    RouteSpec {
        method: "GET",
        path: "/candidate",
        upstream: Some("candidate"),
        resource: ResourceKind::Candidate,
        operation: "list",
    },
    RouteSpec {
        method: "GET",
        path: "/candidate/:id",
        upstream: Some("candidate/{id}"),
        resource: ResourceKind::Candidate,
        operation: "details",
    },
    RouteSpec {
        method: "POST",
        path: "/candidate",
        upstream: Some("candidate"),
        resource: ResourceKind::Candidate,
        operation: "create",
    },
    RouteSpec {
        method: "PUT",
        path: "/candidate/:id",
        upstream: Some("candidate/{id}"),
        resource: ResourceKind::Candidate,
        operation: "edit",
    },
    RouteSpec {
        method: "DELETE",
        path: "/candidate/:id",
        upstream: Some("candidate/{id}"),
        resource: ResourceKind::Candidate,
        operation: "delete",
    },
    // position
    RouteSpec {
        method: "GET",
        path: "/position",
        upstream: Some("position"),
        resource: ResourceKind::Position,
        operation: "list",
    },
    RouteSpec {
        method: "GET",
        path: "/position/:id",
        upstream: Some("position/{id}"),
        resource: ResourceKind::Position,
        operation: "details",
    },
    RouteSpec {
        method: "POST",
        path: "/position",
        upstream: Some("position"),
        resource: ResourceKind::Position,
        operation: "create",
    },
    RouteSpec {
        method: "PUT",
        path: "/position/:id",
        upstream: Some("position/{id}"),
        resource: ResourceKind::Position,
        operation: "edit",
    },
    RouteSpec {
        method: "DELETE",
        path: "/position/:id",
        upstream: Some("position/{id}"),
        resource: ResourceKind::Position,
        operation: "delete",
    },
    // company
    RouteSpec {
        method: "GET",
        path: "/company",
        upstream: Some("company"),
        resource: ResourceKind::Company,
        operation: "list",
    },
    RouteSpec {
        method: "GET",
        path: "/company/:id",
        upstream: Some("company/{id}"),
        resource: ResourceKind::Company,
        operation: "details",
    },
    RouteSpec {
        method: "POST",
        path: "/company",
        upstream: Some("company"),
        resource: ResourceKind::Company,
        operation: "create",
    },
    RouteSpec {
        method: "PUT",
        path: "/company/:id",
        upstream: Some("company/{id}"),
        resource: ResourceKind::Company,
        operation: "edit",
    },
    RouteSpec {
        method: "DELETE",
        path: "/company/:id",
        upstream: Some("company/{id}"),
        resource: ResourceKind::Company,
        operation: "delete",
    },
    // report
    RouteSpec {
        method: "GET",
        path: "/report",
        upstream: Some("report/audit-logs"),
        resource: ResourceKind::Report,
        operation: "index",
    },
    RouteSpec {
        method: "GET",
        path: "/report/audit-logs",
        upstream: Some("report/audit-logs"),
        resource: ResourceKind::Report,
        operation: "auditlogs",
    },
    RouteSpec {
        method: "GET",
        path: "/report/statistics",
        upstream: Some("report/statistics"),
        resource: ResourceKind::Report,
        operation: "statistics",
    },
    RouteSpec {
        method: "GET",
        path: "/report/export",
        upstream: None,
        resource: ResourceKind::Report,
        operation: "export",
    },
];

/// Resolves the route metadata for a matched request.
#[must_use]
pub fn resolve(method: &Method, matched_path: &str) -> Option<&'static RouteSpec> {
    ROUTES
        .iter()
        .find(|spec| spec.method == method.as_str() && spec.path == matched_path)
}

/// Builds the panel router with the gate layer applied to every route.
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(home_index))
        .route("/election/sealed-status", get(sealed_status))
        .route("/report/export", get(report_export::export_audit_logs_pdf));

    for spec in ROUTES.iter().filter(|spec| spec.upstream.is_some()) {
        let filter = match spec.method {
            "GET" => MethodFilter::GET,
            "POST" => MethodFilter::POST,
            "PUT" => MethodFilter::PUT,
            "DELETE" => MethodFilter::DELETE,
            "PATCH" => MethodFilter::PATCH,
            other => unreachable!("unsupported method in route table: {other}"),
        };
        router = router.route(spec.path, on(filter, proxy_handler));
    }

    router
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            enforce_sealed_restrictions,
        ))
        .with_state(state)
}

/// Service info for the panel landing route.
async fn home_index() -> Json<serde_json::Value> {
    Json(json!({
        "service": "urna-admin-panel",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Sealed-state summary straight from the gate.
async fn sealed_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let sealed = state.gate.is_sealed().await;
    let ids: Vec<u64> = state.gate.sealed_ids().await.into_iter().collect();
    Json(json!({
        "hasSealedElections": sealed,
        "sealedElectionIds": ids,
    }))
}

/// Forwards a panel request to the upstream API.
///
/// The caller's bearer token and content type travel with the request; the
/// upstream's status, content type and body travel back unchanged. An
/// unreachable upstream answers 502.
async fn proxy_handler(
    State(state): State<AppState>,
    matched: MatchedPath,
    method: Method,
    Path(params): Path<HashMap<String, String>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(spec) = resolve(&method, matched.as_str()) else {
        // Routing and the table are built from the same array; a miss here
        // is a programming error, not a client error.
        warn!(path = matched.as_str(), %method, "request matched no route table entry");
        return StatusCode::NOT_FOUND.into_response();
    };
    let template = spec.upstream.expect("proxy routes always carry an upstream");

    let mut upstream_path = template.to_string();
    for (name, value) in &params {
        upstream_path = upstream_path.replace(&format!("{{{name}}}"), value);
    }
    let mut url = format!("{}/api/{upstream_path}", state.upstream_base);
    if let Some(query) = query {
        url.push('?');
        url.push_str(&query);
    }

    let reqwest_method = reqwest::Method::from_bytes(method.as_str().as_bytes())
        .expect("axum methods are valid reqwest methods");
    let mut builder = state.http.request(reqwest_method, url);
    if let Some(authorization) = headers.get(AUTHORIZATION) {
        if let Ok(value) = authorization.to_str() {
            builder = builder.header(AUTHORIZATION.as_str(), value);
        }
    }
    if !body.is_empty() {
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("application/json");
        builder = builder
            .header(CONTENT_TYPE.as_str(), content_type)
            .body(body.to_vec());
    }

    match builder.send().await {
        Ok(upstream) => {
            let status = StatusCode::from_u16(upstream.status().as_u16())
                .unwrap_or(StatusCode::BAD_GATEWAY);
            let content_type = upstream
                .headers()
                .get(CONTENT_TYPE.as_str())
                .and_then(|value| value.to_str().ok())
                .unwrap_or("application/json")
                .to_string();
            let bytes = upstream.bytes().await.unwrap_or_default();
            (status, [(CONTENT_TYPE, content_type)], bytes).into_response()
        },
        Err(error) => {
            warn!(%error, "upstream request failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "success": false,
                    "message": "upstream election API is unreachable",
                })),
            )
                .into_response()
        },
    }
}
