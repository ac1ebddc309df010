//! reqwest implementation of [`ElectionApi`].
//!
//! All calls go to `{base_url}/api/...` with a bearer token minted by the
//! [`ServiceSession`]. The client itself is constructed with a bounded
//! timeout; a hung upstream turns into [`ApiError::Transport`] instead of a
//! wedged caller.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;

use super::session::ServiceSession;
use super::types::{
    AdminAccount, ApiEnvelope, CompanyInfo, ElectionId, ElectionStatus, ElectionSummary,
    EmailMessage, Page, SealStatus, SystemSeal, VoteReport,
};
use super::{ApiError, ElectionApi};

/// Longest upstream error body echoed back into an [`ApiError`].
const MAX_ERROR_BODY: usize = 512;

/// Production election API client.
pub struct HttpElectionApi {
    http: reqwest::Client,
    base_url: String,
    session: Arc<ServiceSession>,
}

impl HttpElectionApi {
    /// Creates a client for the given upstream base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Configuration`] when the base URL is empty.
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        session: Arc<ServiceSession>,
    ) -> Result<Self, ApiError> {
        let base_url = base_url.into();
        if base_url.is_empty() {
            return Err(ApiError::Configuration(
                "api base_url cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
    ) -> Result<reqwest::RequestBuilder, ApiError> {
        let token = self.session.bearer_token().await?;
        let url = format!("{}/api/{path}", self.base_url);
        Ok(self
            .http
            .request(method, url)
            .bearer_auth(token.expose_secret()))
    }

    /// Sends a request and maps non-2xx statuses to [`ApiError::Api`].
    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            // A 401 on a cached token means it went stale early; the next
            // call will re-login.
            self.session.forget_token();
        }
        let mut message = response.text().await.unwrap_or_default();
        message.truncate(MAX_ERROR_BODY);
        Err(ApiError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// Sends a request and unwraps the `{success, data}` envelope.
    async fn send_enveloped<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = self.send(builder).await?;
        let envelope: ApiEnvelope<T> = response.json().await.map_err(ApiError::from)?;
        if !envelope.success {
            return Err(ApiError::Envelope(envelope.message));
        }
        envelope
            .data
            .ok_or_else(|| ApiError::Parse("successful envelope carried no data".to_string()))
    }
}

#[async_trait]
impl ElectionApi for HttpElectionApi {
    async fn list_elections(
        &self,
        status: Option<&ElectionStatus>,
        page: u32,
        limit: u32,
    ) -> Result<Page<ElectionSummary>, ApiError> {
        let mut builder = self
            .request(Method::GET, "election")
            .await?
            .query(&[("page", page), ("limit", limit)]);
        if let Some(status) = status {
            builder = builder.query(&[("status", status.as_str())]);
        }
        self.send_enveloped(builder).await
    }

    async fn seal_status(&self, election_id: ElectionId) -> Result<SealStatus, ApiError> {
        let builder = self
            .request(Method::GET, &format!("election/{election_id}/seal/status"))
            .await?;
        self.send_enveloped(builder).await
    }

    async fn seal_election(&self, election_id: ElectionId) -> Result<(), ApiError> {
        let builder = self
            .request(Method::POST, &format!("election/{election_id}/seal"))
            .await?;
        self.send(builder).await.map(drop)
    }

    async fn latest_system_seal(&self, election_id: ElectionId) -> Result<SystemSeal, ApiError> {
        let builder = self
            .request(Method::GET, &format!("SystemSeal/latest/{election_id}"))
            .await?;
        self.send_enveloped(builder).await
    }

    async fn validate_election(&self, election_id: ElectionId) -> Result<String, ApiError> {
        let builder = self
            .request(
                Method::GET,
                &format!("voting-portal/elections/{election_id}/validate"),
            )
            .await?;
        let response = self.send(builder).await?;
        response.text().await.map_err(ApiError::from)
    }

    async fn zero_report(&self, election_id: ElectionId) -> Result<VoteReport, ApiError> {
        let builder = self
            .request(Method::POST, &format!("voting/zero-report/{election_id}"))
            .await?;
        self.send_enveloped(builder).await
    }

    async fn final_results(&self, election_id: ElectionId) -> Result<VoteReport, ApiError> {
        let builder = self
            .request(Method::GET, &format!("voting/results/{election_id}"))
            .await?;
        self.send_enveloped(builder).await
    }

    async fn company(&self, company_id: u64) -> Result<CompanyInfo, ApiError> {
        let builder = self
            .request(Method::GET, &format!("company/{company_id}"))
            .await?;
        self.send_enveloped(builder).await
    }

    async fn list_admins(&self) -> Result<Vec<AdminAccount>, ApiError> {
        let builder = self.request(Method::GET, "adminmanagement").await?;
        let page: Page<AdminAccount> = self.send_enveloped(builder).await?;
        Ok(page.items)
    }

    async fn set_election_status(
        &self,
        election_id: ElectionId,
        status: &ElectionStatus,
    ) -> Result<(), ApiError> {
        let builder = self
            .request(Method::PATCH, &format!("election/{election_id}/status"))
            .await?
            .json(&serde_json::json!({ "status": status.as_str() }));
        self.send(builder).await.map(drop)
    }

    async fn send_email(&self, message: &EmailMessage) -> Result<(), ApiError> {
        let builder = self.request(Method::POST, "email/send").await?.json(message);
        self.send(builder).await.map(drop)
    }
}

impl std::fmt::Debug for HttpElectionApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpElectionApi")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use secrecy::SecretString;

    use super::*;
    use crate::clock::SystemClock;

    fn test_session() -> Arc<ServiceSession> {
        Arc::new(ServiceSession::new(
            reqwest::Client::new(),
            "http://localhost:5110",
            "svc@example.com",
            SecretString::new("pw".to_string()),
            Arc::new(SystemClock),
        ))
    }

    #[test]
    fn new_rejects_empty_base_url() {
        let result = HttpElectionApi::new(reqwest::Client::new(), "", test_session());
        assert!(matches!(result, Err(ApiError::Configuration(_))));
    }

    #[test]
    fn new_trims_trailing_slash() {
        let api =
            HttpElectionApi::new(reqwest::Client::new(), "http://host:5110/", test_session())
                .unwrap();
        assert_eq!(api.base_url, "http://host:5110");
    }
}
