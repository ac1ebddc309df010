//! Recurring report scheduler.
//!
//! An unsupervised worker that scans elections near a state-transition
//! boundary and, for each qualifying election, runs a fixed pipeline
//! exactly once per phase (approximately — see [`marker`]):
//!
//! - **zero-report** (pre-start): seal verification/creation → validation →
//!   PDF generation → admin notification → transition to `active`;
//! - **final-report** (post-end): tally fetch → PDF generation → admin
//!   notification → transition to `completed`.
//!
//! Eligibility is a time window around the boundary (`30..=90s` before
//! start, `60..=180s` after end by default). Failures isolate per election:
//! one failing step logs, skips that election for the cycle, and the window
//! lets the next cycle retry. The loop itself only stops on the shutdown
//! handle; the sleep between passes is the cooperative cancellation point,
//! in-flight pipeline steps are never aborted mid-call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::client::{ApiError, ElectionApi, ElectionStatus, ElectionSummary};
use crate::clock::Clock;
use crate::config::SchedulerSection;
use crate::gate::SealGate;
use crate::report::pdf::PdfRenderError;
use crate::report::{email, pdf, ReportDocument, ReportPhase};

pub mod marker;

pub use marker::{MarkerStoreError, ProcessedMarkerStore};

/// Granularity of the interruptible sleep between passes.
const SLEEP_SLICE: Duration = Duration::from_millis(250);

/// Error from one election's pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An upstream API step failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The report PDF could not be rendered.
    #[error(transparent)]
    Render(#[from] PdfRenderError),
}

/// Scheduler timing configuration.
#[derive(Debug, Clone)]
pub struct ReportSchedulerConfig {
    /// Wait between scheduler cycles.
    pub cycle_interval: Duration,
    /// Wait between the zero-report and final-report passes of one cycle.
    pub pipeline_gap: Duration,
    /// Zero-report window: minimum seconds before election start.
    pub zero_lead_min_secs: i64,
    /// Zero-report window: maximum seconds before election start.
    pub zero_lead_max_secs: i64,
    /// Final-report window: minimum seconds after election end.
    pub final_lag_min_secs: i64,
    /// Final-report window: maximum seconds after election end.
    pub final_lag_max_secs: i64,
    /// Page size for the bounded election listings.
    pub page_limit: u32,
}

impl Default for ReportSchedulerConfig {
    fn default() -> Self {
        Self {
            cycle_interval: Duration::from_secs(60),
            pipeline_gap: Duration::from_secs(5),
            zero_lead_min_secs: 30,
            zero_lead_max_secs: 90,
            final_lag_min_secs: 60,
            final_lag_max_secs: 180,
            page_limit: 1000,
        }
    }
}

impl ReportSchedulerConfig {
    /// Builds the runtime configuration from the parsed config section.
    #[must_use]
    pub fn from_section(section: &SchedulerSection, page_limit: u32) -> Self {
        Self {
            cycle_interval: Duration::from_secs(section.cycle_interval_secs),
            pipeline_gap: Duration::from_secs(section.pipeline_gap_secs),
            zero_lead_min_secs: section.zero_report_lead_min_secs,
            zero_lead_max_secs: section.zero_report_lead_max_secs,
            final_lag_min_secs: section.final_report_lag_min_secs,
            final_lag_max_secs: section.final_report_lag_max_secs,
            page_limit,
        }
    }

    /// Whether a scheduled election is inside its zero-report window.
    #[must_use]
    pub fn zero_report_due(&self, now: DateTime<Utc>, start: DateTime<Utc>) -> bool {
        let lead = (start - now).num_seconds();
        lead >= self.zero_lead_min_secs && lead <= self.zero_lead_max_secs
    }

    /// Whether an active election is inside its final-report window.
    #[must_use]
    pub fn final_report_due(&self, now: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        let lag = (now - end).num_seconds();
        lag >= self.final_lag_min_secs && lag <= self.final_lag_max_secs
    }
}

/// The background report worker.
pub struct ReportScheduler {
    api: Arc<dyn ElectionApi>,
    gate: Arc<SealGate>,
    clock: Arc<dyn Clock>,
    config: ReportSchedulerConfig,
    markers: Option<ProcessedMarkerStore>,
    shutdown: Arc<AtomicBool>,
}

impl ReportScheduler {
    /// Creates a scheduler over the given API, gate and clock.
    #[must_use]
    pub fn new(
        api: Arc<dyn ElectionApi>,
        gate: Arc<SealGate>,
        clock: Arc<dyn Clock>,
        config: ReportSchedulerConfig,
    ) -> Self {
        Self {
            api,
            gate,
            clock,
            config,
            markers: None,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Attaches a persisted processed-marker store.
    #[must_use]
    pub fn with_markers(mut self, markers: ProcessedMarkerStore) -> Self {
        self.markers = Some(markers);
        self
    }

    /// Returns a handle for requesting shutdown.
    #[must_use]
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Runs the scheduler loop until shutdown is requested.
    ///
    /// Pass failures are logged and never propagate; one bad cycle must not
    /// kill the loop.
    pub async fn run(&self) {
        info!(
            cycle_interval_secs = self.config.cycle_interval.as_secs(),
            pipeline_gap_secs = self.config.pipeline_gap.as_secs(),
            markers = self.markers.is_some(),
            "report scheduler starting"
        );

        while !self.shutdown.load(Ordering::Relaxed) {
            if let Err(error) = self.zero_report_pass().await {
                warn!(%error, "zero-report pass failed");
            }

            self.interruptible_sleep(self.config.pipeline_gap).await;
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }

            if let Err(error) = self.final_report_pass().await {
                warn!(%error, "final-report pass failed");
            }

            self.interruptible_sleep(self.config.cycle_interval).await;
        }

        info!("report scheduler shutting down");
    }

    /// One zero-report pass over the scheduled elections.
    ///
    /// # Errors
    ///
    /// Returns an error only when the election listing itself fails;
    /// per-election failures are logged and isolated.
    pub async fn zero_report_pass(&self) -> Result<(), ApiError> {
        let page = self
            .api
            .list_elections(Some(&ElectionStatus::Scheduled), 1, self.config.page_limit)
            .await?;
        debug!(
            candidates = page.items.len(),
            "zero-report pass scanning scheduled elections"
        );

        let now = self.clock.now_utc();
        for election in &page.items {
            if !self.config.zero_report_due(now, election.start_date) {
                continue;
            }
            if self.already_processed(election, ReportPhase::ZeroReport) {
                debug!(election_id = election.id, "zero report already generated, skipping");
                continue;
            }

            info!(
                election_id = election.id,
                title = %election.title,
                "generating zero report"
            );
            match self.run_zero_report(election).await {
                Ok(()) => self.record_processed(election, ReportPhase::ZeroReport),
                Err(error) => {
                    warn!(
                        election_id = election.id,
                        %error,
                        "zero-report pipeline aborted, will retry while eligible"
                    );
                },
            }
        }
        Ok(())
    }

    /// One final-report pass over the active elections.
    ///
    /// # Errors
    ///
    /// Returns an error only when the election listing itself fails;
    /// per-election failures are logged and isolated.
    pub async fn final_report_pass(&self) -> Result<(), ApiError> {
        let page = self
            .api
            .list_elections(Some(&ElectionStatus::Active), 1, self.config.page_limit)
            .await?;
        debug!(
            candidates = page.items.len(),
            "final-report pass scanning active elections"
        );

        let now = self.clock.now_utc();
        for election in &page.items {
            if !self.config.final_report_due(now, election.end_date) {
                continue;
            }
            if self.already_processed(election, ReportPhase::FinalReport) {
                debug!(election_id = election.id, "final report already generated, skipping");
                continue;
            }

            info!(
                election_id = election.id,
                title = %election.title,
                "generating final report"
            );
            match self.run_final_report(election).await {
                Ok(()) => self.record_processed(election, ReportPhase::FinalReport),
                Err(error) => {
                    warn!(
                        election_id = election.id,
                        %error,
                        "final-report pipeline aborted, will retry while eligible"
                    );
                },
            }
        }
        Ok(())
    }

    /// Zero-report pipeline for one election.
    ///
    /// seal (unless already sealed) → validate → report data → PDF →
    /// notify admins → set `active`.
    async fn run_zero_report(&self, election: &ElectionSummary) -> Result<(), PipelineError> {
        let id = election.id;

        // A failing status probe reads as "not sealed"; the seal POST is
        // then attempted and the upstream has the final say.
        let already_sealed = self
            .api
            .seal_status(id)
            .await
            .map(|status| status.is_sealed)
            .unwrap_or(false);

        if already_sealed {
            info!(election_id = id, "election already sealed");
        } else {
            self.api.seal_election(id).await?;
            self.gate.invalidate();
            info!(election_id = id, "election sealed");
        }

        let validation = self.api.validate_election(id).await?;
        info!(election_id = id, %validation, "election state validated after seal");

        let report = self.api.zero_report(id).await?;
        let document = self
            .assemble_document(ReportPhase::ZeroReport, election, report)
            .await;
        let bytes = pdf::render(&document)?;
        info!(election_id = id, size = bytes.len(), "zero-report PDF generated");

        self.notify_admins(&document, &bytes).await?;

        self.api
            .set_election_status(id, &ElectionStatus::Active)
            .await?;
        self.gate.invalidate();
        info!(election_id = id, "election transitioned to active");
        Ok(())
    }

    /// Final-report pipeline for one election.
    ///
    /// fetch results → PDF → notify admins → set `completed`.
    async fn run_final_report(&self, election: &ElectionSummary) -> Result<(), PipelineError> {
        let id = election.id;

        let results = self.api.final_results(id).await?;
        let document = self
            .assemble_document(ReportPhase::FinalReport, election, results)
            .await;
        let bytes = pdf::render(&document)?;
        info!(election_id = id, size = bytes.len(), "final-report PDF generated");

        self.notify_admins(&document, &bytes).await?;

        self.api
            .set_election_status(id, &ElectionStatus::Completed)
            .await?;
        self.gate.invalidate();
        info!(election_id = id, "election transitioned to completed");
        Ok(())
    }

    /// Collects the decorative document context (seal hash, company).
    ///
    /// Both lookups degrade instead of failing: a missing hash renders
    /// "N/A" and a missing company renders a placeholder header.
    async fn assemble_document(
        &self,
        phase: ReportPhase,
        election: &ElectionSummary,
        report: crate::client::VoteReport,
    ) -> ReportDocument {
        let seal_hash = self
            .api
            .seal_status(election.id)
            .await
            .ok()
            .and_then(|status| status.seal_hash)
            .unwrap_or_else(|| "N/A".to_string());

        let company = match election.company_id {
            Some(company_id) => self.api.company(company_id).await.ok(),
            None => None,
        };

        ReportDocument {
            phase,
            election: election.clone(),
            company,
            seal_hash,
            report,
            generated_at: self.clock.now_utc(),
        }
    }

    /// Emails the document to every admin.
    ///
    /// A failing roster fetch aborts (it is a pipeline step); individual
    /// send failures are logged and the remaining admins still get their
    /// attempt.
    async fn notify_admins(
        &self,
        document: &ReportDocument,
        bytes: &[u8],
    ) -> Result<(), PipelineError> {
        let admins = self.api.list_admins().await?;
        for admin in &admins {
            let message = email::notification(
                document.phase,
                &document.election,
                &document.seal_hash,
                bytes,
                admin,
                document.generated_at,
            );
            if let Err(error) = self.api.send_email(&message).await {
                warn!(
                    election_id = document.election.id,
                    admin = %admin.email,
                    %error,
                    "failed to send report email"
                );
            }
        }
        Ok(())
    }

    fn already_processed(&self, election: &ElectionSummary, phase: ReportPhase) -> bool {
        let Some(markers) = &self.markers else {
            return false;
        };
        match markers.is_processed(election.id, phase) {
            Ok(processed) => processed,
            Err(error) => {
                // A broken marker store degrades to the window heuristic.
                warn!(election_id = election.id, %error, "marker lookup failed");
                false
            },
        }
    }

    fn record_processed(&self, election: &ElectionSummary, phase: ReportPhase) {
        let Some(markers) = &self.markers else {
            return;
        };
        let now = self.clock.now_utc().timestamp();
        if let Err(error) = markers.mark_processed(election.id, phase, now) {
            warn!(election_id = election.id, %error, "failed to record processed marker");
        }
    }

    /// Sleeps in small slices so a shutdown request interrupts the wait.
    async fn interruptible_sleep(&self, total: Duration) {
        let mut remaining = total;
        while remaining > Duration::ZERO && !self.shutdown.load(Ordering::Relaxed) {
            let slice = remaining.min(SLEEP_SLICE);
            tokio::time::sleep(slice).await;
            remaining = remaining.saturating_sub(slice);
        }
    }
}

impl std::fmt::Debug for ReportScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportScheduler")
            .field("config", &self.config)
            .field("markers", &self.markers.is_some())
            .finish_non_exhaustive()
    }
}
