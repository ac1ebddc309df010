//! Sealed-mode action policy.
//!
//! While any election is sealed the panel is view-only, with one carve-out:
//! voter password management stays available so voters locked out right
//! before an election can still be helped. Everything not explicitly listed
//! here is blocked, including operations on resource kinds this table has
//! never heard of.

use std::fmt;
use std::str::FromStr;

/// Resource kinds the panel routes operations for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Voter management.
    Voter,
    /// Election management.
    Election,
    /// Candidate management.
    Candidate,
    /// Position management.
    Position,
    /// Reports and audit views.
    Report,
    /// Landing/dashboard pages.
    Home,
    /// Authentication surface.
    Auth,
    /// Company management.
    Company,
}

impl ResourceKind {
    /// Returns the lowercase name used in routing metadata.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Voter => "voter",
            Self::Election => "election",
            Self::Candidate => "candidate",
            Self::Position => "position",
            Self::Report => "report",
            Self::Home => "home",
            Self::Auth => "auth",
            Self::Company => "company",
        }
    }

    /// Safe view to land on when an interactive request is blocked.
    ///
    /// Listing/overview routes are all in the sealed-mode allow-list, so
    /// the redirect target is never itself blocked.
    #[must_use]
    pub const fn safe_redirect(&self) -> &'static str {
        match self {
            Self::Election => "/election",
            Self::Candidate => "/candidate",
            Self::Position => "/position",
            Self::Voter => "/voter",
            Self::Report => "/report",
            _ => "/",
        }
    }
}

impl FromStr for ResourceKind {
    type Err = UnknownResourceKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.to_ascii_lowercase().as_str() {
            "voter" => Self::Voter,
            "election" => Self::Election,
            "candidate" => Self::Candidate,
            "position" => Self::Position,
            "report" => Self::Report,
            "home" => Self::Home,
            "auth" => Self::Auth,
            "company" => Self::Company,
            _ => return Err(UnknownResourceKind(s.to_string())),
        };
        Ok(kind)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse error for resource-kind strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown resource kind: {0}")]
pub struct UnknownResourceKind(pub String);

/// Operations allowed per resource kind while the system is sealed.
///
/// View and password-management only. Notably blocked: all create/edit/
/// delete operations, election status updates, candidate photo and company
/// logo uploads, and general voter mass-mailing.
const SEALED_ALLOWED: &[(ResourceKind, &[&str])] = &[
    (
        ResourceKind::Voter,
        &[
            "list",
            "edit",
            "details",
            "sendpasswordreset",
            "sendmasspasswordreset",
            "testemailconfiguration",
        ],
    ),
    (
        ResourceKind::Election,
        &["list", "getsealedelectionsstatus", "details"],
    ),
    (ResourceKind::Candidate, &["list", "details"]),
    (ResourceKind::Position, &["list", "details"]),
    (
        ResourceKind::Report,
        &[
            "index",
            "auditlogs",
            "statistics",
            "securityreport",
            "useractivity",
            "entityhistory",
            "suspiciousactivity",
            "export",
            "dashboard",
            "zeresima",
        ],
    ),
    (ResourceKind::Home, &["index", "privacy", "dashboard"]),
    (ResourceKind::Auth, &["login", "logout", "accessdenied"]),
    (ResourceKind::Company, &["list", "details"]),
];

/// Returns whether `(kind, operation)` stays allowed in sealed mode.
///
/// Operation names compare case-insensitively. Pairs not in the table are
/// blocked.
#[must_use]
pub fn sealed_mode_allows(kind: ResourceKind, operation: &str) -> bool {
    let operation = operation.to_ascii_lowercase();
    SEALED_ALLOWED
        .iter()
        .find(|(k, _)| *k == kind)
        .map_or(false, |(_, ops)| ops.contains(&operation.as_str()))
}
