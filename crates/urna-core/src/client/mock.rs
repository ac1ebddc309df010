//! Programmable mock election API for tests.
//!
//! Mirrors the shape of the production client but serves canned responses
//! and records every call, so gate and scheduler tests can assert not just
//! outcomes but which upstream endpoints were (or were not) touched.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use super::types::{
    AdminAccount, CompanyInfo, ElectionId, ElectionStatus, ElectionSummary, EmailMessage, Page,
    SealStatus, SystemSeal, VoteReport,
};
use super::{ApiError, ElectionApi};

/// One recorded upstream call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    /// `list_elections` with the requested status filter.
    ListElections(Option<String>),
    /// `seal_status` for an election.
    SealStatus(ElectionId),
    /// `seal_election` for an election.
    SealElection(ElectionId),
    /// `latest_system_seal` for an election.
    LatestSystemSeal(ElectionId),
    /// `validate_election` for an election.
    Validate(ElectionId),
    /// `zero_report` for an election.
    ZeroReport(ElectionId),
    /// `final_results` for an election.
    FinalResults(ElectionId),
    /// `company` lookup.
    Company(u64),
    /// `list_admins`.
    ListAdmins,
    /// `set_election_status` with the requested status.
    SetStatus(ElectionId, String),
    /// `send_email` with the recipient address.
    SendEmail(String),
}

#[derive(Default)]
struct State {
    elections: Vec<ElectionSummary>,
    fail_listing: Option<u16>,
    seal_statuses: HashMap<ElectionId, SealStatus>,
    fail_seal_status: HashSet<ElectionId>,
    system_seals: HashMap<ElectionId, SystemSeal>,
    fail_seal: HashSet<ElectionId>,
    fail_validate: HashSet<ElectionId>,
    zero_reports: HashMap<ElectionId, VoteReport>,
    fail_zero_report: HashSet<ElectionId>,
    final_reports: HashMap<ElectionId, VoteReport>,
    fail_final_results: HashSet<ElectionId>,
    companies: HashMap<u64, CompanyInfo>,
    admins: Vec<AdminAccount>,
    fail_admins: bool,
    fail_email_to: HashSet<String>,
    fail_status_update: HashSet<ElectionId>,
    calls: Vec<RecordedCall>,
    sent_emails: Vec<EmailMessage>,
}

/// Mock implementation of [`ElectionApi`] for testing.
#[derive(Default)]
pub struct MockElectionApi {
    state: Mutex<State>,
}

fn upstream_error(status: u16) -> ApiError {
    ApiError::Api {
        status,
        message: format!("mock upstream failure ({status})"),
    }
}

impl MockElectionApi {
    /// Creates an empty mock: no elections, no admins, every per-election
    /// lookup answering its benign default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the election listing.
    #[must_use]
    pub fn with_elections(self, elections: Vec<ElectionSummary>) -> Self {
        self.state.lock().unwrap().elections = elections;
        self
    }

    /// Makes `list_elections` fail with the given HTTP status.
    #[must_use]
    pub fn with_failing_listing(self, status: u16) -> Self {
        self.state.lock().unwrap().fail_listing = Some(status);
        self
    }

    /// Seeds a seal status for an election.
    #[must_use]
    pub fn with_seal_status(self, election_id: ElectionId, status: SealStatus) -> Self {
        self.state
            .lock()
            .unwrap()
            .seal_statuses
            .insert(election_id, status);
        self
    }

    /// Makes `seal_status` fail for an election.
    #[must_use]
    pub fn with_failing_seal_status(self, election_id: ElectionId) -> Self {
        self.state
            .lock()
            .unwrap()
            .fail_seal_status
            .insert(election_id);
        self
    }

    /// Seeds the latest system seal for an election; elections without one
    /// answer 404.
    #[must_use]
    pub fn with_system_seal(self, election_id: ElectionId, seal: SystemSeal) -> Self {
        self.state
            .lock()
            .unwrap()
            .system_seals
            .insert(election_id, seal);
        self
    }

    /// Makes `seal_election` fail for an election.
    #[must_use]
    pub fn with_failing_seal(self, election_id: ElectionId) -> Self {
        self.state.lock().unwrap().fail_seal.insert(election_id);
        self
    }

    /// Makes `validate_election` fail for an election.
    #[must_use]
    pub fn with_failing_validation(self, election_id: ElectionId) -> Self {
        self.state.lock().unwrap().fail_validate.insert(election_id);
        self
    }

    /// Seeds the zero-report payload for an election.
    #[must_use]
    pub fn with_zero_report(self, election_id: ElectionId, report: VoteReport) -> Self {
        self.state
            .lock()
            .unwrap()
            .zero_reports
            .insert(election_id, report);
        self
    }

    /// Makes `zero_report` fail for an election.
    #[must_use]
    pub fn with_failing_zero_report(self, election_id: ElectionId) -> Self {
        self.state
            .lock()
            .unwrap()
            .fail_zero_report
            .insert(election_id);
        self
    }

    /// Seeds the final results payload for an election.
    #[must_use]
    pub fn with_final_results(self, election_id: ElectionId, report: VoteReport) -> Self {
        self.state
            .lock()
            .unwrap()
            .final_reports
            .insert(election_id, report);
        self
    }

    /// Makes `final_results` fail for an election.
    #[must_use]
    pub fn with_failing_final_results(self, election_id: ElectionId) -> Self {
        self.state
            .lock()
            .unwrap()
            .fail_final_results
            .insert(election_id);
        self
    }

    /// Seeds a company record.
    #[must_use]
    pub fn with_company(self, company_id: u64, company: CompanyInfo) -> Self {
        self.state
            .lock()
            .unwrap()
            .companies
            .insert(company_id, company);
        self
    }

    /// Seeds the admin roster.
    #[must_use]
    pub fn with_admins(self, admins: Vec<AdminAccount>) -> Self {
        self.state.lock().unwrap().admins = admins;
        self
    }

    /// Makes the roster fetch fail.
    #[must_use]
    pub fn with_failing_admins(self) -> Self {
        self.state.lock().unwrap().fail_admins = true;
        self
    }

    /// Makes email sends to one recipient fail.
    #[must_use]
    pub fn with_failing_email_to(self, email: impl Into<String>) -> Self {
        self.state
            .lock()
            .unwrap()
            .fail_email_to
            .insert(email.into());
        self
    }

    /// Makes the status transition fail for an election.
    #[must_use]
    pub fn with_failing_status_update(self, election_id: ElectionId) -> Self {
        self.state
            .lock()
            .unwrap()
            .fail_status_update
            .insert(election_id);
        self
    }

    /// Replaces the seeded election listing mid-test.
    pub fn set_elections(&self, elections: Vec<ElectionSummary>) {
        self.state.lock().unwrap().elections = elections;
    }

    /// Clears or sets the listing failure mid-test.
    pub fn set_failing_listing(&self, status: Option<u16>) {
        self.state.lock().unwrap().fail_listing = status;
    }

    /// Every call recorded so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of recorded calls matching a predicate.
    #[must_use]
    pub fn count_calls(&self, predicate: impl Fn(&RecordedCall) -> bool) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|call| predicate(call))
            .count()
    }

    /// Full messages passed to `send_email`, including ones that failed.
    #[must_use]
    pub fn sent_emails(&self) -> Vec<EmailMessage> {
        self.state.lock().unwrap().sent_emails.clone()
    }

    fn record(&self, call: RecordedCall) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl ElectionApi for MockElectionApi {
    async fn list_elections(
        &self,
        status: Option<&ElectionStatus>,
        _page: u32,
        _limit: u32,
    ) -> Result<Page<ElectionSummary>, ApiError> {
        self.record(RecordedCall::ListElections(
            status.map(|s| s.as_str().to_string()),
        ));
        let state = self.state.lock().unwrap();
        if let Some(code) = state.fail_listing {
            return Err(upstream_error(code));
        }
        let items: Vec<ElectionSummary> = state
            .elections
            .iter()
            .filter(|e| status.map_or(true, |s| &e.status == s))
            .cloned()
            .collect();
        let total = items.len() as u64;
        Ok(Page {
            items,
            total_pages: 1,
            total_items: total,
            current_page: 1,
        })
    }

    async fn seal_status(&self, election_id: ElectionId) -> Result<SealStatus, ApiError> {
        self.record(RecordedCall::SealStatus(election_id));
        let state = self.state.lock().unwrap();
        if state.fail_seal_status.contains(&election_id) {
            return Err(upstream_error(500));
        }
        Ok(state
            .seal_statuses
            .get(&election_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn seal_election(&self, election_id: ElectionId) -> Result<(), ApiError> {
        self.record(RecordedCall::SealElection(election_id));
        let state = self.state.lock().unwrap();
        if state.fail_seal.contains(&election_id) {
            return Err(upstream_error(500));
        }
        Ok(())
    }

    async fn latest_system_seal(&self, election_id: ElectionId) -> Result<SystemSeal, ApiError> {
        self.record(RecordedCall::LatestSystemSeal(election_id));
        let state = self.state.lock().unwrap();
        state
            .system_seals
            .get(&election_id)
            .cloned()
            .ok_or_else(|| upstream_error(404))
    }

    async fn validate_election(&self, election_id: ElectionId) -> Result<String, ApiError> {
        self.record(RecordedCall::Validate(election_id));
        let state = self.state.lock().unwrap();
        if state.fail_validate.contains(&election_id) {
            return Err(upstream_error(500));
        }
        Ok("{\"valid\":true}".to_string())
    }

    async fn zero_report(&self, election_id: ElectionId) -> Result<VoteReport, ApiError> {
        self.record(RecordedCall::ZeroReport(election_id));
        let state = self.state.lock().unwrap();
        if state.fail_zero_report.contains(&election_id) {
            return Err(upstream_error(500));
        }
        Ok(state
            .zero_reports
            .get(&election_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn final_results(&self, election_id: ElectionId) -> Result<VoteReport, ApiError> {
        self.record(RecordedCall::FinalResults(election_id));
        let state = self.state.lock().unwrap();
        if state.fail_final_results.contains(&election_id) {
            return Err(upstream_error(500));
        }
        Ok(state
            .final_reports
            .get(&election_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn company(&self, company_id: u64) -> Result<CompanyInfo, ApiError> {
        self.record(RecordedCall::Company(company_id));
        let state = self.state.lock().unwrap();
        state
            .companies
            .get(&company_id)
            .cloned()
            .ok_or_else(|| upstream_error(404))
    }

    async fn list_admins(&self) -> Result<Vec<AdminAccount>, ApiError> {
        self.record(RecordedCall::ListAdmins);
        let state = self.state.lock().unwrap();
        if state.fail_admins {
            return Err(upstream_error(500));
        }
        Ok(state.admins.clone())
    }

    async fn set_election_status(
        &self,
        election_id: ElectionId,
        status: &ElectionStatus,
    ) -> Result<(), ApiError> {
        self.record(RecordedCall::SetStatus(
            election_id,
            status.as_str().to_string(),
        ));
        let state = self.state.lock().unwrap();
        if state.fail_status_update.contains(&election_id) {
            return Err(upstream_error(500));
        }
        Ok(())
    }

    async fn send_email(&self, message: &EmailMessage) -> Result<(), ApiError> {
        self.record(RecordedCall::SendEmail(message.to_email.clone()));
        let mut state = self.state.lock().unwrap();
        state.sent_emails.push(message.clone());
        if state.fail_email_to.contains(&message.to_email) {
            return Err(upstream_error(502));
        }
        Ok(())
    }
}

impl std::fmt::Debug for MockElectionApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockElectionApi").finish_non_exhaustive()
    }
}
