//! Report document assembly.
//!
//! Both scheduler pipelines end in the same artifact: a fixed-layout PDF
//! built from a [`ReportDocument`] and mailed to every admin. Assembly here
//! is pure; all upstream fetching happens in the scheduler and all byte
//! production happens in [`pdf`].

use chrono::{DateTime, Utc};

use crate::client::types::{CompanyInfo, ElectionSummary, PositionTally, VoteReport};

pub mod email;
pub mod pdf;

/// Which of the two report pipelines produced a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportPhase {
    /// Pre-start snapshot proving zero recorded votes.
    ZeroReport,
    /// Post-end tally with results and participation statistics.
    FinalReport,
}

impl ReportPhase {
    /// Stable identifier, also the processed-marker key component.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ZeroReport => "zero-report",
            Self::FinalReport => "final-report",
        }
    }

    /// Document heading.
    #[must_use]
    pub const fn heading(&self) -> &'static str {
        match self {
            Self::ZeroReport => "ZERO REPORT",
            Self::FinalReport => "FINAL ELECTION REPORT",
        }
    }

    /// Attachment file-name prefix.
    #[must_use]
    pub const fn file_prefix(&self) -> &'static str {
        match self {
            Self::ZeroReport => "zero_report",
            Self::FinalReport => "final_report",
        }
    }
}

/// Everything needed to render one report.
#[derive(Debug, Clone)]
pub struct ReportDocument {
    /// Pipeline phase.
    pub phase: ReportPhase,
    /// The election the report covers.
    pub election: ElectionSummary,
    /// Company header data, when the lookup succeeded.
    pub company: Option<CompanyInfo>,
    /// Seal hash for the footer, "N/A" when unavailable.
    pub seal_hash: String,
    /// Vote/seal counters from the upstream report endpoint.
    pub report: VoteReport,
    /// Generation timestamp stamped into the document.
    pub generated_at: DateTime<Utc>,
}

impl ReportDocument {
    /// Election metadata rows (label, value).
    #[must_use]
    pub fn detail_rows(&self) -> Vec<(&'static str, String)> {
        let status = match self.phase {
            ReportPhase::ZeroReport => self.election.status.to_string(),
            ReportPhase::FinalReport => "closed".to_string(),
        };
        vec![
            (
                "Start date:",
                self.election.start_date.format("%Y-%m-%d %H:%M").to_string(),
            ),
            (
                "End date:",
                self.election.end_date.format("%Y-%m-%d %H:%M").to_string(),
            ),
            (
                "Election type:",
                self.election
                    .election_type
                    .clone()
                    .unwrap_or_else(|| "N/A".to_string()),
            ),
            ("Status:", status),
        ]
    }

    /// Statistical summary rows (label, value); absent counters render "0".
    #[must_use]
    pub fn summary_rows(&self) -> Vec<(&'static str, String)> {
        let r = &self.report;
        match self.phase {
            ReportPhase::ZeroReport => vec![
                ("Votes recorded:", VoteReport::count(r.total_votes)),
                (
                    "Eligible voters:",
                    VoteReport::count(r.total_registered_voters),
                ),
                ("Positions:", VoteReport::count(r.total_positions)),
                ("Candidates:", VoteReport::count(r.total_candidates)),
            ],
            ReportPhase::FinalReport => vec![
                ("Votes counted:", VoteReport::count(r.total_votes)),
                (
                    "Eligible voters:",
                    VoteReport::count(r.total_registered_voters),
                ),
                (
                    "Participation:",
                    VoteReport::percent(r.participation_percentage),
                ),
                ("Positions:", VoteReport::count(r.total_positions)),
                ("Candidates:", VoteReport::count(r.total_candidates)),
                ("Valid votes:", VoteReport::count(r.valid_votes)),
                ("Blank votes:", VoteReport::count(r.blank_votes)),
                ("Null votes:", VoteReport::count(r.null_votes)),
            ],
        }
    }

    /// Per-position breakdown, empty when the upstream sent none.
    #[must_use]
    pub fn breakdown(&self) -> &[PositionTally] {
        self.report.positions.as_deref().unwrap_or(&[])
    }

    /// Footer attestation line.
    #[must_use]
    pub const fn footer_note(&self) -> &'static str {
        match self.phase {
            ReportPhase::ZeroReport => {
                "This document attests the initial (zero) state of the voting system at \
                 the moment of its generation."
            },
            ReportPhase::FinalReport => {
                "This document attests the final results of the election."
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::client::types::ElectionStatus;

    fn document(phase: ReportPhase, report: VoteReport) -> ReportDocument {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        ReportDocument {
            phase,
            election: ElectionSummary {
                id: 7,
                title: "Board 2025".to_string(),
                status: ElectionStatus::Scheduled,
                start_date: start,
                end_date: start + chrono::Duration::hours(6),
                company_id: Some(1),
                election_type: None,
            },
            company: None,
            seal_hash: "N/A".to_string(),
            report,
            generated_at: start,
        }
    }

    #[test]
    fn zero_report_summary_defaults_to_zero() {
        let doc = document(ReportPhase::ZeroReport, VoteReport::default());
        let rows = doc.summary_rows();
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|(_, value)| value == "0"));
    }

    #[test]
    fn final_report_summary_includes_participation() {
        let report = VoteReport {
            total_votes: Some(120),
            participation_percentage: Some(75.5),
            ..VoteReport::default()
        };
        let doc = document(ReportPhase::FinalReport, report);
        let rows = doc.summary_rows();
        assert_eq!(rows[0].1, "120");
        assert_eq!(rows[2].1, "75.5%");
        assert_eq!(rows.len(), 8);
    }

    #[test]
    fn final_report_status_renders_closed() {
        let doc = document(ReportPhase::FinalReport, VoteReport::default());
        let rows = doc.detail_rows();
        assert_eq!(rows[3].1, "closed");
        assert_eq!(rows[2].1, "N/A");
    }

    #[test]
    fn breakdown_defaults_to_empty() {
        let doc = document(ReportPhase::ZeroReport, VoteReport::default());
        assert!(doc.breakdown().is_empty());
    }
}
