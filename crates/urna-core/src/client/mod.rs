//! Typed client for the remote voting/election REST API.
//!
//! Every consumer in this crate talks to the upstream through the
//! [`ElectionApi`] trait so the gate, the scheduler and the report pipeline
//! can be exercised against [`MockElectionApi`] in tests. The production
//! implementation is [`HttpElectionApi`], authenticated via a
//! [`ServiceSession`] machine identity.

use async_trait::async_trait;
use thiserror::Error;

pub mod http;
pub mod mock;
pub mod session;
pub mod types;

pub use http::HttpElectionApi;
pub use mock::MockElectionApi;
pub use session::ServiceSession;
pub use types::{
    AdminAccount, ApiEnvelope, CandidateTally, CompanyInfo, ElectionId, ElectionStatus,
    ElectionSummary, EmailAttachment, EmailMessage, Page, PositionTally, SealStatus, SystemSeal,
    VoteReport,
};

/// Errors emitted by election API clients.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    /// Invalid client configuration.
    #[error("api configuration error: {0}")]
    Configuration(String),

    /// Service-account authentication failed.
    #[error("api authentication error: {0}")]
    Authentication(String),

    /// Request transport failed.
    #[error("api transport error: {0}")]
    Transport(String),

    /// API request failed with a structured status code.
    #[error("api error ({status}): {message}")]
    Api {
        /// HTTP status code returned by the upstream API.
        status: u16,
        /// Error body/message.
        message: String,
    },

    /// API payload parse failed.
    #[error("api parse error: {0}")]
    Parse(String),

    /// The upstream returned 2xx but the response envelope rejected the
    /// request.
    #[error("api rejected request: {0}")]
    Envelope(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value.to_string())
    }
}

impl ApiError {
    /// HTTP status carried by the error, when there is one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the error is an upstream 404.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.status(), Some(404))
    }
}

/// Outbound contract to the voting/election API.
///
/// One method per upstream endpoint the core depends on. Implementations
/// must bound every call with a timeout; none of these may block
/// indefinitely.
#[async_trait]
pub trait ElectionApi: Send + Sync {
    /// Lists elections, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns an error when the listing fails or the payload is malformed.
    async fn list_elections(
        &self,
        status: Option<&ElectionStatus>,
        page: u32,
        limit: u32,
    ) -> Result<Page<ElectionSummary>, ApiError>;

    /// Reads the seal status of an election.
    ///
    /// # Errors
    ///
    /// Returns an error when the election cannot be read.
    async fn seal_status(&self, election_id: ElectionId) -> Result<SealStatus, ApiError>;

    /// Seals an election.
    ///
    /// Callers must check [`ElectionApi::seal_status`] first; sealing an
    /// already-sealed election is an upstream error.
    ///
    /// # Errors
    ///
    /// Returns an error when sealing fails or is unauthorized.
    async fn seal_election(&self, election_id: ElectionId) -> Result<(), ApiError>;

    /// Reads the latest system seal record for an election.
    ///
    /// # Errors
    ///
    /// Returns an error when no seal record exists (404) or the lookup
    /// fails.
    async fn latest_system_seal(&self, election_id: ElectionId) -> Result<SystemSeal, ApiError>;

    /// Runs the upstream consistency validation for an election.
    ///
    /// Returns the raw validation payload for logging.
    ///
    /// # Errors
    ///
    /// Returns an error when validation cannot be performed.
    async fn validate_election(&self, election_id: ElectionId) -> Result<String, ApiError>;

    /// Requests the pre-start zero report data.
    ///
    /// # Errors
    ///
    /// Returns an error when the report cannot be produced upstream.
    async fn zero_report(&self, election_id: ElectionId) -> Result<VoteReport, ApiError>;

    /// Reads the post-end tally data.
    ///
    /// # Errors
    ///
    /// Returns an error when results are unavailable.
    async fn final_results(&self, election_id: ElectionId) -> Result<VoteReport, ApiError>;

    /// Reads a company record.
    ///
    /// # Errors
    ///
    /// Returns an error when the company cannot be read.
    async fn company(&self, company_id: u64) -> Result<CompanyInfo, ApiError>;

    /// Lists the full admin roster.
    ///
    /// # Errors
    ///
    /// Returns an error when the roster cannot be read.
    async fn list_admins(&self) -> Result<Vec<AdminAccount>, ApiError>;

    /// Transitions an election's lifecycle status.
    ///
    /// # Errors
    ///
    /// Returns an error when the transition is rejected.
    async fn set_election_status(
        &self,
        election_id: ElectionId,
        status: &ElectionStatus,
    ) -> Result<(), ApiError>;

    /// Sends an email through the upstream mail relay.
    ///
    /// # Errors
    ///
    /// Returns an error when the relay rejects the message.
    async fn send_email(&self, message: &EmailMessage) -> Result<(), ApiError>;
}
