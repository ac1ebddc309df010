//! On-demand audit-log PDF export.
//!
//! Fetches the audit-log listing from the upstream API with the caller's
//! own token and renders it through the core PDF builder. Pure
//! presentation; the upstream stays the source of truth for the log data.

use axum::extract::{RawQuery, State};
use axum::http::header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use urna_core::client::types::ApiEnvelope;
use urna_core::report::pdf::PdfBuilder;

use crate::AppState;

/// One page of upstream audit logs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AuditLogPage {
    items: Vec<AuditLogEntry>,
}

/// A single audit-log row; every field optional on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AuditLogEntry {
    id: Option<u64>,
    user_id: Option<String>,
    user_type: Option<String>,
    action: Option<String>,
    entity_type: Option<String>,
    entity_id: Option<u64>,
    details: Option<String>,
    timestamp: Option<DateTime<Utc>>,
    ip_address: Option<String>,
}

impl AuditLogEntry {
    fn row(&self) -> Vec<String> {
        vec![
            self.id.map_or_else(String::new, |id| id.to_string()),
            self.user_id.clone().unwrap_or_default(),
            self.user_type.clone().unwrap_or_default(),
            self.action.clone().unwrap_or_default(),
            self.entity_type.clone().unwrap_or_default(),
            self.entity_id.map_or_else(String::new, |id| id.to_string()),
            self.details.clone().unwrap_or_default(),
            self.timestamp
                .map_or_else(String::new, |t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
            self.ip_address.clone().unwrap_or_default(),
        ]
    }
}

/// GET `/report/export`: audit logs as a downloadable PDF.
pub async fn export_audit_logs_pdf(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    let query = query.unwrap_or_else(|| "page=1&pageSize=1000".to_string());
    let url = format!("{}/api/report/audit-logs?{query}", state.upstream_base);

    let mut builder = state.http.get(url);
    if let Some(authorization) = headers.get(AUTHORIZATION) {
        if let Ok(value) = authorization.to_str() {
            builder = builder.header(AUTHORIZATION.as_str(), value);
        }
    }

    let response = match builder.send().await {
        Ok(response) => response,
        Err(error) => {
            warn!(%error, "audit-log fetch failed");
            return upstream_unreachable();
        },
    };
    if !response.status().is_success() {
        let status = StatusCode::from_u16(response.status().as_u16())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        return (
            status,
            Json(json!({
                "success": false,
                "message": "upstream rejected the audit-log listing",
            })),
        )
            .into_response();
    }

    let envelope: ApiEnvelope<AuditLogPage> = match response.json().await {
        Ok(envelope) => envelope,
        Err(error) => {
            warn!(%error, "audit-log payload malformed");
            return upstream_unreachable();
        },
    };
    let page = envelope.data.unwrap_or_default();

    match render_audit_logs(&page) {
        Ok(bytes) => {
            let file_name = format!("audit_logs_{}.pdf", Utc::now().format("%Y%m%d_%H%M%S"));
            (
                StatusCode::OK,
                [
                    (CONTENT_TYPE, "application/pdf".to_string()),
                    (
                        CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{file_name}\""),
                    ),
                ],
                bytes,
            )
                .into_response()
        },
        Err(error) => {
            warn!(%error, "audit-log pdf rendering failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "message": "failed to render the audit-log export",
                })),
            )
                .into_response()
        },
    }
}

fn render_audit_logs(
    page: &AuditLogPage,
) -> Result<Vec<u8>, urna_core::report::pdf::PdfRenderError> {
    let mut pdf = PdfBuilder::new();
    pdf.title("Audit Logs Report");
    pdf.spacer(10.0);

    let rows: Vec<Vec<String>> = page.items.iter().map(AuditLogEntry::row).collect();
    pdf.table(
        &[
            "ID", "User", "Type", "Action", "Entity", "Entity ID", "Details", "Timestamp", "IP",
        ],
        &[0.05, 0.1, 0.08, 0.14, 0.1, 0.08, 0.2, 0.15, 0.1],
        &rows,
    );
    pdf.finish()
}

fn upstream_unreachable() -> Response {
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({
            "success": false,
            "message": "upstream election API is unreachable",
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_row_defaults_blank() {
        let entry = AuditLogEntry::default();
        let row = entry.row();
        assert_eq!(row.len(), 9);
        assert!(row.iter().all(String::is_empty));
    }

    #[test]
    fn render_handles_empty_page() {
        let bytes = render_audit_logs(&AuditLogPage::default()).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn audit_page_parses_camel_case() {
        let json = r#"{
            "items": [
                {"id": 1, "userId": "u1", "userType": "admin", "action": "login",
                 "entityType": "auth", "ipAddress": "10.0.0.1"}
            ]
        }"#;
        let page: AuditLogPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].user_id.as_deref(), Some("u1"));
        assert_eq!(page.items[0].ip_address.as_deref(), Some("10.0.0.1"));
    }
}
