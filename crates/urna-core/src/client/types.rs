//! Wire types for the election API.
//!
//! The upstream API speaks camelCase JSON and wraps every payload in a
//! `{success, message, data}` envelope. Report and company payloads arrive
//! with whatever fields the upstream happens to know; all of those are
//! modelled as optional fields with defaulting accessors so a missing vote
//! count renders as "0" and a missing company name renders a placeholder
//! instead of failing the pipeline.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Identifier of an election in the upstream API.
pub type ElectionId = u64;

/// Standard response envelope used by every upstream endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope<T> {
    /// Whether the upstream accepted the request.
    #[serde(default)]
    pub success: bool,
    /// Human-readable upstream message.
    #[serde(default)]
    pub message: String,
    /// Payload, absent on failures.
    pub data: Option<T>,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Items on this page.
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    /// Total number of pages.
    #[serde(default)]
    pub total_pages: u32,
    /// Total number of items across all pages.
    #[serde(default)]
    pub total_items: u64,
    /// Page index of this page (1-based).
    #[serde(default)]
    pub current_page: u32,
}

/// Lifecycle status of an election.
///
/// The upstream compares status strings case-insensitively, so parsing is
/// case-insensitive here too; anything unrecognised is preserved as
/// [`ElectionStatus::Unknown`] rather than failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElectionStatus {
    /// Created but not yet started.
    Scheduled,
    /// Voting is open.
    Active,
    /// Voting has ended and results are final; counts as sealed.
    Completed,
    /// Any status string this panel does not know.
    Unknown(String),
}

impl ElectionStatus {
    /// Returns the canonical lowercase wire string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Unknown(other) => other.as_str(),
        }
    }

    /// Whether this status marks the election as sealed on its own.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl FromStr for ElectionStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let status = if s.eq_ignore_ascii_case("scheduled") {
            Self::Scheduled
        } else if s.eq_ignore_ascii_case("active") {
            Self::Active
        } else if s.eq_ignore_ascii_case("completed") {
            Self::Completed
        } else {
            Self::Unknown(s.to_string())
        };
        Ok(status)
    }
}

impl fmt::Display for ElectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ElectionStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ElectionStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.parse() {
            Ok(status) => Ok(status),
            Err(never) => match never {},
        }
    }
}

/// Projection of an election as listed by `GET /election`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionSummary {
    /// Upstream identifier.
    pub id: ElectionId,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Lifecycle status.
    pub status: ElectionStatus,
    /// Scheduled start of voting.
    pub start_date: DateTime<Utc>,
    /// Scheduled end of voting.
    pub end_date: DateTime<Utc>,
    /// Owning company.
    #[serde(default)]
    pub company_id: Option<u64>,
    /// Free-form election type label.
    #[serde(default)]
    pub election_type: Option<String>,
}

/// Seal status of an election, from `GET /election/{id}/seal/status`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SealStatus {
    /// Whether the election is currently sealed.
    pub is_sealed: bool,
    /// Hash of the seal record, when sealed.
    pub seal_hash: Option<String>,
    /// When the seal was applied.
    pub sealed_at: Option<DateTime<Utc>>,
    /// Admin who applied the seal.
    pub sealed_by: Option<u64>,
}

/// Latest system seal record, from `GET /SystemSeal/latest/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemSeal {
    /// Record identifier.
    pub id: u64,
    /// Election the seal belongs to.
    pub election_id: ElectionId,
    /// Whether the seal is still considered valid.
    pub is_valid: bool,
    /// Hash of the sealed system state.
    pub seal_hash: Option<String>,
    /// When the seal was applied.
    pub sealed_at: Option<DateTime<Utc>>,
    /// Admin who applied the seal.
    pub sealed_by: Option<u64>,
}

/// Company record used for report headers.
///
/// Every field is optional on the wire; the accessors pick placeholders so
/// the report renderer never deals with absence directly.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CompanyInfo {
    /// Registered legal name.
    #[serde(rename = "razaoSocial")]
    pub legal_name: Option<String>,
    /// Company tax identifier.
    #[serde(rename = "cnpj")]
    pub tax_id: Option<String>,
    /// Street line of the registered address.
    #[serde(rename = "logradouro")]
    pub street: Option<String>,
    /// Street number.
    #[serde(rename = "numero")]
    pub number: Option<String>,
    /// District.
    #[serde(rename = "bairro")]
    pub district: Option<String>,
    /// City.
    #[serde(rename = "cidade")]
    pub city: Option<String>,
    /// Postal code.
    #[serde(rename = "cep")]
    pub postal_code: Option<String>,
    /// Contact email.
    pub email: Option<String>,
    /// Contact phone.
    #[serde(rename = "telefone")]
    pub phone: Option<String>,
}

impl CompanyInfo {
    /// Display name, with a placeholder when the upstream omitted it.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.legal_name.as_deref().unwrap_or("Company not identified")
    }

    /// Single-line formatted address, or `None` when no street is known.
    #[must_use]
    pub fn address_line(&self) -> Option<String> {
        let street = self.street.as_deref()?;
        let mut line = street.to_string();
        if let Some(number) = &self.number {
            line.push_str(", ");
            line.push_str(number);
        }
        if let Some(district) = &self.district {
            line.push_str(" - ");
            line.push_str(district);
        }
        if let Some(city) = &self.city {
            line.push_str(", ");
            line.push_str(city);
        }
        if let Some(postal_code) = &self.postal_code {
            line.push_str(" - ");
            line.push_str(postal_code);
        }
        Some(line)
    }
}

/// Admin account, from `GET /adminmanagement`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminAccount {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Delivery address for report notifications.
    pub email: String,
}

/// Vote report payload for both the zero report and the final results.
///
/// The zero report carries only the headline counters (all zero by
/// definition); the final results add participation and vote-quality
/// counters. Absent counters render as zero.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VoteReport {
    /// Votes recorded so far.
    pub total_votes: Option<u64>,
    /// Registered voters eligible to vote.
    pub total_registered_voters: Option<u64>,
    /// Positions in the election.
    pub total_positions: Option<u64>,
    /// Candidates across all positions.
    pub total_candidates: Option<u64>,
    /// Turnout percentage (final report only).
    pub participation_percentage: Option<f64>,
    /// Valid votes (final report only).
    pub valid_votes: Option<u64>,
    /// Blank votes (final report only).
    pub blank_votes: Option<u64>,
    /// Null votes (final report only).
    pub null_votes: Option<u64>,
    /// Optional per-position breakdown.
    pub positions: Option<Vec<PositionTally>>,
}

impl VoteReport {
    /// Formats an optional counter, defaulting missing values to "0".
    #[must_use]
    pub fn count(value: Option<u64>) -> String {
        value.unwrap_or(0).to_string()
    }

    /// Formats an optional percentage, defaulting missing values to "0%".
    #[must_use]
    pub fn percent(value: Option<f64>) -> String {
        match value {
            Some(p) => format!("{p:.1}%"),
            None => "0%".to_string(),
        }
    }
}

/// Per-position tally inside a [`VoteReport`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PositionTally {
    /// Position display name.
    pub position_name: Option<String>,
    /// Candidates running for this position.
    pub candidates: Vec<CandidateTally>,
}

/// Per-candidate tally inside a [`PositionTally`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CandidateTally {
    /// Candidate display name.
    pub candidate_name: Option<String>,
    /// Ballot number.
    pub candidate_number: Option<String>,
    /// Votes received.
    pub vote_count: Option<u64>,
    /// Share of the position's votes (final report only).
    pub percentage: Option<f64>,
}

/// Outbound email request for `POST /email/send`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailMessage {
    /// Recipient address.
    pub to_email: String,
    /// Recipient display name.
    pub to_name: String,
    /// Subject line.
    pub subject: String,
    /// Body, HTML when `is_html` is set.
    pub body: String,
    /// Whether the body is HTML.
    pub is_html: bool,
    /// Attachments, base64-encoded.
    pub attachments: Vec<EmailAttachment>,
}

/// Base64-encoded email attachment.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailAttachment {
    /// File name shown to the recipient.
    pub file_name: String,
    /// Base64 of the file bytes.
    pub file_content: String,
}
