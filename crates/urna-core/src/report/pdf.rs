//! Fixed-layout PDF rendering.
//!
//! A small text-layout builder over `lopdf`: headings, label/value rows and
//! simple column tables on A4 pages with automatic page breaks. This is a
//! pure data-to-bytes transform; nothing here touches the network.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use thiserror::Error;

use super::{ReportDocument, ReportPhase};
use crate::client::types::VoteReport;

/// A4 page width in points.
const PAGE_WIDTH: f32 = 595.0;
/// A4 page height in points.
const PAGE_HEIGHT: f32 = 842.0;
/// Page margin in points.
const MARGIN: f32 = 40.0;
/// Vertical position where a page break is forced.
const BOTTOM_LIMIT: f32 = 60.0;

const FONT_REGULAR: &str = "F1";
const FONT_BOLD: &str = "F2";

/// Errors produced while rendering a PDF.
#[derive(Debug, Error)]
pub enum PdfRenderError {
    /// Underlying PDF library error.
    #[error("pdf encoding error: {0}")]
    Encode(#[from] lopdf::Error),

    /// I/O error while serialising the document.
    #[error("pdf serialisation error: {0}")]
    Io(#[from] std::io::Error),
}

/// Incremental page-by-page text layout.
pub struct PdfBuilder {
    finished_pages: Vec<Vec<Operation>>,
    ops: Vec<Operation>,
    y: f32,
}

impl Default for PdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfBuilder {
    /// Starts an empty document on a fresh page.
    #[must_use]
    pub fn new() -> Self {
        Self {
            finished_pages: Vec::new(),
            ops: Vec::new(),
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    /// Centered document title.
    pub fn title(&mut self, text: &str) {
        self.ensure_space(30.0);
        let x = centered_x(text, 20.0);
        self.text_at(FONT_BOLD, 20.0, x, self.y, text);
        self.y -= 30.0;
    }

    /// Centered subtitle.
    pub fn subtitle(&mut self, text: &str) {
        self.ensure_space(22.0);
        let x = centered_x(text, 14.0);
        self.text_at(FONT_BOLD, 14.0, x, self.y, text);
        self.y -= 22.0;
    }

    /// Left-aligned section heading.
    pub fn heading(&mut self, text: &str) {
        self.ensure_space(24.0);
        self.text_at(FONT_BOLD, 12.0, MARGIN, self.y, text);
        self.y -= 18.0;
    }

    /// Plain body line.
    pub fn line(&mut self, text: &str) {
        self.ensure_space(14.0);
        self.text_at(FONT_REGULAR, 10.0, MARGIN, self.y, text);
        self.y -= 14.0;
    }

    /// Small centered footer-style line.
    pub fn small_centered(&mut self, text: &str) {
        self.ensure_space(12.0);
        let x = centered_x(text, 8.0);
        self.text_at(FONT_REGULAR, 8.0, x, self.y, text);
        self.y -= 12.0;
    }

    /// Bold label with a plain value on the same line.
    pub fn label_value(&mut self, label: &str, value: &str) {
        self.ensure_space(15.0);
        self.text_at(FONT_BOLD, 10.0, MARGIN, self.y, label);
        self.text_at(FONT_REGULAR, 10.0, MARGIN + 160.0, self.y, value);
        self.y -= 15.0;
    }

    /// Simple column table with a bold header row.
    ///
    /// `widths` are fractions of the printable width and must match the
    /// header count; row cells beyond the header count are dropped.
    pub fn table(&mut self, headers: &[&str], widths: &[f32], rows: &[Vec<String>]) {
        let printable = PAGE_WIDTH - 2.0 * MARGIN;
        let offsets: Vec<f32> = widths
            .iter()
            .scan(0.0_f32, |acc, w| {
                let x = MARGIN + *acc * printable;
                *acc += w;
                Some(x)
            })
            .collect();

        self.ensure_space(16.0);
        for (header, x) in headers.iter().zip(&offsets) {
            self.text_at(FONT_BOLD, 9.0, *x, self.y, header);
        }
        self.y -= 14.0;

        for row in rows {
            self.ensure_space(13.0);
            for (cell, x) in row.iter().zip(&offsets) {
                self.text_at(FONT_REGULAR, 9.0, *x, self.y, cell);
            }
            self.y -= 12.0;
        }
        self.y -= 6.0;
    }

    /// Vertical gap.
    pub fn spacer(&mut self, points: f32) {
        self.y -= points;
    }

    /// Serialises the document.
    ///
    /// # Errors
    ///
    /// Returns [`PdfRenderError`] when content encoding or writing fails.
    pub fn finish(mut self) -> Result<Vec<u8>, PdfRenderError> {
        self.finished_pages.push(std::mem::take(&mut self.ops));

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let font_regular = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let font_bold = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                FONT_REGULAR => font_regular,
                FONT_BOLD => font_bold,
            },
        });

        let mut kids: Vec<Object> = Vec::with_capacity(self.finished_pages.len());
        for operations in self.finished_pages {
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            kids.push(page_id.into());
        }

        let count = i64::try_from(kids.len()).unwrap_or(i64::MAX);
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.compress();

        let mut out = Vec::new();
        doc.save_to(&mut out)?;
        Ok(out)
    }

    fn ensure_space(&mut self, needed: f32) {
        if self.y - needed < BOTTOM_LIMIT {
            self.finished_pages.push(std::mem::take(&mut self.ops));
            self.y = PAGE_HEIGHT - MARGIN;
        }
    }

    fn text_at(&mut self, font: &str, size: f32, x: f32, y: f32, text: &str) {
        self.ops.push(Operation::new("BT", vec![]));
        self.ops
            .push(Operation::new("Tf", vec![font.into(), size.into()]));
        self.ops
            .push(Operation::new("Td", vec![x.into(), y.into()]));
        self.ops.push(Operation::new(
            "Tj",
            vec![Object::string_literal(latin1(text))],
        ));
        self.ops.push(Operation::new("ET", vec![]));
    }
}

/// Approximate x-offset that centers `text` at `size` on the page.
fn centered_x(text: &str, size: f32) -> f32 {
    // Helvetica averages roughly half the font size per glyph; close enough
    // for single-line headings.
    let width = text.chars().count() as f32 * size * 0.5;
    ((PAGE_WIDTH - width) / 2.0).max(MARGIN)
}

/// Maps text to Latin-1 bytes, replacing anything outside the range.
fn latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| {
            let code = c as u32;
            if code <= 0xFF {
                code as u8
            } else {
                b'?'
            }
        })
        .collect()
}

/// Renders a complete report document.
///
/// Layout, top to bottom: company header, report title, election title,
/// generation stamp, election details, statistical summary, optional
/// per-position breakdown, attestation footer with the seal hash.
///
/// # Errors
///
/// Returns [`PdfRenderError`] when the document cannot be serialised.
pub fn render(document: &ReportDocument) -> Result<Vec<u8>, PdfRenderError> {
    let mut pdf = PdfBuilder::new();

    match &document.company {
        Some(company) => {
            pdf.heading(company.display_name());
            if let Some(tax_id) = &company.tax_id {
                pdf.line(&format!("Tax ID: {tax_id}"));
            }
            if let Some(address) = company.address_line() {
                pdf.line(&address);
            }
            if let Some(email) = &company.email {
                pdf.line(&format!("Email: {email}"));
            }
            if let Some(phone) = &company.phone {
                pdf.line(&format!("Phone: {phone}"));
            }
        },
        None => pdf.line("Company information not available"),
    }
    pdf.spacer(16.0);

    pdf.title(document.phase.heading());
    pdf.subtitle(&format!("Election: {}", document.election.title));
    pdf.small_centered(&format!(
        "Generated at: {}",
        document.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    pdf.spacer(14.0);

    for (label, value) in document.detail_rows() {
        pdf.label_value(label, &value);
    }
    pdf.spacer(10.0);

    let summary_heading = match document.phase {
        ReportPhase::ZeroReport => "STATISTICAL SUMMARY",
        ReportPhase::FinalReport => "FINAL STATISTICAL SUMMARY",
    };
    pdf.heading(summary_heading);
    for (label, value) in document.summary_rows() {
        pdf.label_value(label, &value);
    }
    pdf.spacer(10.0);

    let breakdown = document.breakdown();
    if !breakdown.is_empty() {
        let breakdown_heading = match document.phase {
            ReportPhase::ZeroReport => "BREAKDOWN BY POSITION",
            ReportPhase::FinalReport => "RESULTS BY POSITION",
        };
        pdf.heading(breakdown_heading);
        for position in breakdown {
            pdf.heading(&format!(
                "Position: {}",
                position.position_name.as_deref().unwrap_or("N/A")
            ));
            let rows: Vec<Vec<String>> = position
                .candidates
                .iter()
                .map(|candidate| {
                    let mut row = vec![
                        candidate
                            .candidate_name
                            .clone()
                            .unwrap_or_else(|| "N/A".to_string()),
                        candidate
                            .candidate_number
                            .clone()
                            .unwrap_or_else(|| "N/A".to_string()),
                        VoteReport::count(candidate.vote_count),
                    ];
                    if document.phase == ReportPhase::FinalReport {
                        row.push(VoteReport::percent(candidate.percentage));
                    }
                    row
                })
                .collect();
            match document.phase {
                ReportPhase::ZeroReport => pdf.table(
                    &["Candidate", "Number", "Votes"],
                    &[0.6, 0.2, 0.2],
                    &rows,
                ),
                ReportPhase::FinalReport => pdf.table(
                    &["Candidate", "Number", "Votes", "Share"],
                    &[0.5, 0.15, 0.15, 0.2],
                    &rows,
                ),
            }
        }
    }

    pdf.spacer(20.0);
    pdf.small_centered(document.footer_note());
    pdf.small_centered(&format!("Seal hash: {}", document.seal_hash));
    pdf.small_centered("Document generated automatically by the election management system.");

    pdf.finish()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono::Utc;

    use super::*;
    use crate::client::types::{
        CandidateTally, CompanyInfo, ElectionStatus, ElectionSummary, PositionTally,
    };

    fn sample_document(phase: ReportPhase) -> ReportDocument {
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
                election_type: Some("board".to_string()),
            },
            company: Some(CompanyInfo {
                legal_name: Some("Acme Ltda".to_string()),
                tax_id: Some("00.000.000/0001-00".to_string()),
                ..CompanyInfo::default()
            }),
            seal_hash: "abc123".to_string(),
            report: VoteReport {
                total_registered_voters: Some(250),
                total_positions: Some(2),
                total_candidates: Some(5),
                positions: Some(vec![PositionTally {
                    position_name: Some("President".to_string()),
                    candidates: vec![CandidateTally {
                        candidate_name: Some("Ana".to_string()),
                        candidate_number: Some("10".to_string()),
                        vote_count: None,
                        percentage: None,
                    }],
                }]),
                ..VoteReport::default()
            },
            generated_at: start,
        }
    }

    #[test]
    fn render_produces_pdf_bytes() {
        let bytes = render(&sample_document(ReportPhase::ZeroReport)).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
        assert!(bytes.len() > 500);
    }

    #[test]
    fn render_final_report_with_percent_column() {
        let bytes = render(&sample_document(ReportPhase::FinalReport)).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn long_tables_break_across_pages() {
        let mut pdf = PdfBuilder::new();
        pdf.title("Page break test");
        let rows: Vec<Vec<String>> = (0..200)
            .map(|i| vec![format!("row {i}"), i.to_string()])
            .collect();
        pdf.table(&["Name", "Value"], &[0.7, 0.3], &rows);
        let bytes = pdf.finish().unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
        // 200 rows at ~12pt cannot fit one A4 page.
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/Count"));
    }

    #[test]
    fn latin1_replaces_out_of_range_chars() {
        assert_eq!(latin1("abc"), b"abc");
        assert_eq!(latin1("votação"), b"vota\xE7\xE3o");
        assert_eq!(latin1("☑ done"), b"? done");
    }
}
