//! Full report lifecycle over a mocked upstream: a scheduled election gets
//! its zero report right before start, goes active, and gets its final
//! report right after end.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use urna_core::client::mock::RecordedCall;
use urna_core::client::types::{AdminAccount, ElectionStatus, ElectionSummary, SealStatus};
use urna_core::client::{ElectionApi, MockElectionApi};
use urna_core::clock::{Clock, ManualClock};
use urna_core::gate::SealGate;
use urna_core::scheduler::{ProcessedMarkerStore, ReportScheduler, ReportSchedulerConfig};

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

fn election(status: ElectionStatus) -> ElectionSummary {
    ElectionSummary {
        id: 7,
        title: "Board 2025".to_string(),
        status,
        start_date: base_time() + chrono::Duration::seconds(60),
        end_date: base_time() + chrono::Duration::seconds(3660),
        company_id: Some(1),
        election_type: Some("board".to_string()),
    }
}

fn build(api: Arc<MockElectionApi>, clock: Arc<ManualClock>) -> ReportScheduler {
    let gate = Arc::new(SealGate::new(
        Arc::clone(&api) as Arc<dyn ElectionApi>,
        Arc::clone(&clock) as Arc<dyn Clock>,
        Duration::from_secs(60),
        1000,
    ));
    ReportScheduler::new(
        api,
        gate,
        clock,
        ReportSchedulerConfig::default(),
    )
    .with_markers(ProcessedMarkerStore::in_memory().unwrap())
}

#[tokio::test]
async fn election_gets_both_reports_across_its_lifecycle() {
    let clock = Arc::new(ManualClock::new(base_time()));
    let api = Arc::new(
        MockElectionApi::new()
            .with_elections(vec![election(ElectionStatus::Scheduled)])
            .with_admins(vec![
                AdminAccount {
                    name: "First Admin".to_string(),
                    email: "first@example.com".to_string(),
                },
                AdminAccount {
                    name: "Second Admin".to_string(),
                    email: "second@example.com".to_string(),
                },
            ]),
    );
    let scheduler = build(Arc::clone(&api), Arc::clone(&clock));

    // T+0: election starts in 60s, inside the zero-report window.
    scheduler.zero_report_pass().await.unwrap();
    scheduler.final_report_pass().await.unwrap();

    let calls = api.calls();
    assert!(calls.contains(&RecordedCall::SealElection(7)));
    assert!(calls.contains(&RecordedCall::SetStatus(7, "active".to_string())));
    assert!(!calls.contains(&RecordedCall::FinalResults(7)));
    assert_eq!(api.sent_emails().len(), 2);

    // The upstream now reports the election active (and sealed); the clock
    // moves to two minutes past the end.
    api.set_elections(vec![election(ElectionStatus::Active)]);
    clock.set(base_time() + chrono::Duration::seconds(3660 + 120));

    scheduler.zero_report_pass().await.unwrap();
    scheduler.final_report_pass().await.unwrap();

    let calls = api.calls();
    assert!(calls.contains(&RecordedCall::FinalResults(7)));
    assert!(calls.contains(&RecordedCall::SetStatus(7, "completed".to_string())));
    assert_eq!(
        api.count_calls(|c| matches!(c, RecordedCall::SealElection(7))),
        1,
        "the seal is posted exactly once across the lifecycle"
    );
    assert_eq!(
        api.count_calls(|c| matches!(c, RecordedCall::ZeroReport(7))),
        1,
        "marker keeps the zero report from re-running"
    );

    let emails = api.sent_emails();
    assert_eq!(emails.len(), 4);
    assert!(emails[0].subject.contains("Zero report"));
    assert!(emails[3].subject.contains("Final report"));
    assert!(emails.iter().all(|m| m.attachments.len() == 1));
}

#[tokio::test]
async fn already_sealed_election_goes_straight_to_validation() {
    let clock = Arc::new(ManualClock::new(base_time()));
    let api = Arc::new(
        MockElectionApi::new()
            .with_elections(vec![election(ElectionStatus::Scheduled)])
            .with_seal_status(
                7,
                SealStatus {
                    is_sealed: true,
                    seal_hash: Some("f00d".to_string()),
                    ..SealStatus::default()
                },
            )
            .with_admins(vec![AdminAccount {
                name: "Only Admin".to_string(),
                email: "only@example.com".to_string(),
            }]),
    );
    let scheduler = build(Arc::clone(&api), clock);

    scheduler.zero_report_pass().await.unwrap();

    let calls = api.calls();
    assert!(!calls.contains(&RecordedCall::SealElection(7)));
    assert!(calls.contains(&RecordedCall::Validate(7)));
    assert!(calls.contains(&RecordedCall::SetStatus(7, "active".to_string())));
}
