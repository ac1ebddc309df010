//! Admin notification emails for generated reports.
//!
//! Composition only: one [`EmailMessage`] per admin with the rendered PDF
//! attached as base64. Delivery goes through the upstream mail relay and is
//! the scheduler's job.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};

use super::ReportPhase;
use crate::client::types::{AdminAccount, ElectionSummary, EmailAttachment, EmailMessage};

/// Builds the notification for one admin.
#[must_use]
pub fn notification(
    phase: ReportPhase,
    election: &ElectionSummary,
    seal_hash: &str,
    pdf: &[u8],
    admin: &AdminAccount,
    generated_at: DateTime<Utc>,
) -> EmailMessage {
    let subject = match phase {
        ReportPhase::ZeroReport => format!("Zero report - {}", election.title),
        ReportPhase::FinalReport => format!("Final report - {}", election.title),
    };
    let body = match phase {
        ReportPhase::ZeroReport => zero_report_body(election, generated_at),
        ReportPhase::FinalReport => final_report_body(election, seal_hash, generated_at),
    };

    EmailMessage {
        to_email: admin.email.clone(),
        to_name: admin.name.clone(),
        subject,
        body,
        is_html: true,
        attachments: vec![EmailAttachment {
            file_name: attachment_file_name(phase, &election.title, generated_at),
            file_content: BASE64.encode(pdf),
        }],
    }
}

/// Attachment name: phase prefix, sanitised election title, timestamp.
#[must_use]
pub fn attachment_file_name(
    phase: ReportPhase,
    title: &str,
    generated_at: DateTime<Utc>,
) -> String {
    format!(
        "{}_{}_{}.pdf",
        phase.file_prefix(),
        sanitize_title(title),
        generated_at.format("%Y%m%d_%H%M")
    )
}

/// Makes an election title safe for a file name.
fn sanitize_title(title: &str) -> String {
    title.replace(' ', "_").replace('/', "-")
}

fn zero_report_body(election: &ElectionSummary, generated_at: DateTime<Utc>) -> String {
    format!(
        "<h2>Zero Report Generated</h2>\
         <p><strong>Election:</strong> {title}</p>\
         <p><strong>Start:</strong> {start}</p>\
         <p><strong>Status:</strong> sealed for start</p>\
         <ul>\
         <li>This report attests the initial (zero) state of the voting system</li>\
         <li>The election was automatically sealed and is ready to start</li>\
         <li>Keep this document for audit purposes</li>\
         </ul>\
         <p>The attached PDF contains the company data, election information, \
         voter and candidate counts, and the zero vote state.</p>\
         <hr>\
         <p style='font-size: 12px; color: #666;'>\
         Generated automatically by the election management system at {generated}.\
         </p>",
        title = election.title,
        start = election.start_date.format("%Y-%m-%d %H:%M"),
        generated = generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}

fn final_report_body(
    election: &ElectionSummary,
    seal_hash: &str,
    generated_at: DateTime<Utc>,
) -> String {
    format!(
        "<h2>Final Election Report</h2>\
         <p><strong>Election:</strong> {title}</p>\
         <p><strong>End:</strong> {end}</p>\
         <p><strong>Status:</strong> closed</p>\
         <ul>\
         <li>This report contains the final vote count</li>\
         <li>All data has been processed and validated</li>\
         <li>Keep this document for audit purposes</li>\
         </ul>\
         <p>The attached PDF contains the final results per position, the vote \
         count per candidate, overall statistics and the seal hash for \
         verification.</p>\
         <hr>\
         <p style='font-size: 12px; color: #666;'>\
         Generated automatically by the election management system at {generated}.<br>\
         Seal hash: {seal_hash}\
         </p>",
        title = election.title,
        end = election.end_date.format("%Y-%m-%d %H:%M"),
        generated = generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::client::types::ElectionStatus;

    fn sample_election() -> ElectionSummary {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        ElectionSummary {
            id: 7,
            title: "Board 2025 / Round 1".to_string(),
            status: ElectionStatus::Scheduled,
            start_date: start,
            end_date: start + chrono::Duration::hours(6),
            company_id: Some(1),
            election_type: None,
        }
    }

    #[test]
    fn attachment_name_is_sanitized_and_stamped() {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 11, 59, 0).unwrap();
        assert_eq!(
            attachment_file_name(ReportPhase::ZeroReport, "Board 2025 / Round 1", at),
            "zero_report_Board_2025_-_Round_1_20250601_1159.pdf"
        );
        assert_eq!(
            attachment_file_name(ReportPhase::FinalReport, "Plain", at),
            "final_report_Plain_20250601_1159.pdf"
        );
    }

    #[test]
    fn notification_encodes_attachment_base64() {
        let admin = AdminAccount {
            name: "Root Admin".to_string(),
            email: "root@example.com".to_string(),
        };
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 11, 59, 0).unwrap();
        let pdf = b"%PDF-fake";

        let message = notification(
            ReportPhase::ZeroReport,
            &sample_election(),
            "N/A",
            pdf,
            &admin,
            at,
        );

        assert_eq!(message.to_email, "root@example.com");
        assert!(message.is_html);
        assert!(message.subject.contains("Zero report"));
        assert_eq!(message.attachments.len(), 1);
        assert_eq!(
            BASE64.decode(&message.attachments[0].file_content).unwrap(),
            pdf
        );
    }

    #[test]
    fn final_notification_carries_seal_hash() {
        let admin = AdminAccount {
            name: "A".to_string(),
            email: "a@example.com".to_string(),
        };
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 18, 3, 0).unwrap();
        let message = notification(
            ReportPhase::FinalReport,
            &sample_election(),
            "deadbeef",
            b"%PDF-",
            &admin,
            at,
        );
        assert!(message.body.contains("deadbeef"));
        assert!(message.subject.contains("Final report"));
    }
}
