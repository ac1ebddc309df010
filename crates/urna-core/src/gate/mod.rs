//! Sealed-election gate.
//!
//! A process-wide authority answering "is the system sealed?" and "is this
//! operation allowed right now?". The sealed-state snapshot is fetched from
//! the election API and cached for a short TTL; every inbound mutating
//! operation consults the gate through the request-interception layer
//! before reaching its handler.
//!
//! The cache is advisory, not a security boundary: on any upstream failure
//! the gate assumes *unsealed* so the panel stays available, and concurrent
//! refreshes are allowed to race (each one converges to the same upstream
//! ground truth, last writer wins).

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::client::{ElectionApi, ElectionId};
use crate::clock::Clock;

pub mod policy;

pub use policy::{sealed_mode_allows, ResourceKind, UnknownResourceKind};

/// How long a sealed-state snapshot stays valid.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
struct CacheState {
    has_sealed: bool,
    sealed_ids: BTreeSet<ElectionId>,
    /// `None` forces the next read to refresh, regardless of TTL.
    last_refreshed: Option<DateTime<Utc>>,
}

/// TTL-cached sealed-election authority.
///
/// Constructed once at startup and shared by reference across request
/// handlers and the scheduler.
pub struct SealGate {
    api: Arc<dyn ElectionApi>,
    clock: Arc<dyn Clock>,
    cache_ttl: chrono::Duration,
    page_limit: u32,
    cache: RwLock<CacheState>,
}

impl SealGate {
    /// Creates a gate over the given API with the given cache TTL.
    #[must_use]
    pub fn new(
        api: Arc<dyn ElectionApi>,
        clock: Arc<dyn Clock>,
        cache_ttl: Duration,
        page_limit: u32,
    ) -> Self {
        Self {
            api,
            clock,
            cache_ttl: chrono::Duration::from_std(cache_ttl)
                .unwrap_or_else(|_| chrono::Duration::seconds(60)),
            page_limit,
            cache: RwLock::new(CacheState::default()),
        }
    }

    /// Whether any election is currently sealed.
    ///
    /// Refreshes the cache first when it is stale. Never fails: upstream
    /// trouble reads as "not sealed".
    pub async fn is_sealed(&self) -> bool {
        self.refresh_if_stale().await;
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .has_sealed
    }

    /// Identifiers of the sealed elections (defensive copy).
    ///
    /// Same staleness contract as [`SealGate::is_sealed`].
    pub async fn sealed_ids(&self) -> BTreeSet<ElectionId> {
        self.refresh_if_stale().await;
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sealed_ids
            .clone()
    }

    /// Whether `(resource_kind, operation)` may run right now.
    ///
    /// When nothing is sealed everything is allowed and the table is never
    /// consulted. When sealed, both inputs are normalised to lowercase and
    /// looked up; unknown resource kinds are denied.
    pub async fn is_action_allowed(&self, resource_kind: &str, operation: &str) -> bool {
        if !self.is_sealed().await {
            return true;
        }
        resource_kind
            .parse::<ResourceKind>()
            .map_or(false, |kind| sealed_mode_allows(kind, operation))
    }

    /// Forces the next read to fetch fresh state.
    ///
    /// Must be called by any component that just performed a sealing
    /// mutation, so stale "unsealed" answers are not served for up to a
    /// full TTL window afterwards.
    pub fn invalidate(&self) {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.has_sealed = false;
        cache.sealed_ids.clear();
        cache.last_refreshed = None;
        debug!("sealed-election cache invalidated");
    }

    async fn refresh_if_stale(&self) {
        let now = self.clock.now_utc();
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(last) = cache.last_refreshed {
                if now - last < self.cache_ttl {
                    return;
                }
            }
        }

        // Fetch without holding the lock. Concurrent stale readers may
        // refresh redundantly; the snapshot is advisory and last writer
        // wins.
        let (has_sealed, sealed_ids) = self.fetch_sealed_state().await;

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.has_sealed = has_sealed;
        cache.sealed_ids = sealed_ids;
        cache.last_refreshed = Some(self.clock.now_utc());
    }

    /// Fetches the sealed-state snapshot from the upstream API.
    ///
    /// An election counts as sealed when its status is `completed`, or when
    /// a valid system seal record exists for it (checked via a secondary
    /// per-election lookup, skipped for already-completed elections). Any
    /// failure to list elections fails safe to "nothing sealed".
    async fn fetch_sealed_state(&self) -> (bool, BTreeSet<ElectionId>) {
        let page = match self.api.list_elections(None, 1, self.page_limit).await {
            Ok(page) => page,
            Err(error) => {
                warn!(%error, "sealed-state refresh failed, assuming no sealed elections");
                return (false, BTreeSet::new());
            },
        };

        let mut sealed_ids = BTreeSet::new();
        for election in &page.items {
            if election.status.is_completed() {
                sealed_ids.insert(election.id);
                continue;
            }
            match self.api.latest_system_seal(election.id).await {
                Ok(seal) if seal.is_valid => {
                    sealed_ids.insert(election.id);
                },
                Ok(_) => {},
                Err(error) if error.is_not_found() => {},
                Err(error) => {
                    // One election's lookup failing must not poison the
                    // rest of the batch.
                    debug!(election_id = election.id, %error, "seal lookup failed, skipping");
                },
            }
        }

        (!sealed_ids.is_empty(), sealed_ids)
    }
}

impl std::fmt::Debug for SealGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("SealGate")
            .field("has_sealed", &cache.has_sealed)
            .field("sealed_count", &cache.sealed_ids.len())
            .field("last_refreshed", &cache.last_refreshed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::client::mock::RecordedCall;
    use crate::client::types::{ElectionStatus, ElectionSummary, SystemSeal};
    use crate::client::MockElectionApi;
    use crate::clock::ManualClock;

    fn election(id: ElectionId, status: ElectionStatus) -> ElectionSummary {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        ElectionSummary {
            id,
            title: format!("Election {id}"),
            status,
            start_date: start,
            end_date: start + chrono::Duration::hours(6),
            company_id: Some(1),
            election_type: Some("board".to_string()),
        }
    }

    fn gate_over(api: Arc<MockElectionApi>, clock: Arc<ManualClock>) -> SealGate {
        SealGate::new(api, clock, Duration::from_secs(60), 1000)
    }

    fn test_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap(),
        ))
    }

    #[tokio::test]
    async fn completed_election_is_sealed_without_secondary_lookup() {
        let api = Arc::new(
            MockElectionApi::new().with_elections(vec![election(7, ElectionStatus::Completed)]),
        );
        let gate = gate_over(Arc::clone(&api), test_clock());

        assert!(gate.is_sealed().await);
        assert!(gate.sealed_ids().await.contains(&7));
        assert_eq!(
            api.count_calls(|c| matches!(c, RecordedCall::LatestSystemSeal(7))),
            0
        );
    }

    #[tokio::test]
    async fn active_election_with_valid_seal_is_sealed() {
        let api = Arc::new(
            MockElectionApi::new()
                .with_elections(vec![election(9, ElectionStatus::Active)])
                .with_system_seal(
                    9,
                    SystemSeal {
                        id: 1,
                        election_id: 9,
                        is_valid: true,
                        ..SystemSeal::default()
                    },
                ),
        );
        let gate = gate_over(Arc::clone(&api), test_clock());

        assert!(gate.is_sealed().await);
        assert!(gate.sealed_ids().await.contains(&9));
    }

    #[tokio::test]
    async fn active_election_without_seal_record_is_not_sealed() {
        // No seeded system seal: the lookup answers 404.
        let api = Arc::new(
            MockElectionApi::new().with_elections(vec![election(9, ElectionStatus::Active)]),
        );
        let gate = gate_over(Arc::clone(&api), test_clock());

        assert!(!gate.is_sealed().await);
        assert!(gate.sealed_ids().await.is_empty());
        assert_eq!(
            api.count_calls(|c| matches!(c, RecordedCall::LatestSystemSeal(9))),
            1
        );
    }

    #[tokio::test]
    async fn invalid_seal_record_does_not_seal() {
        let api = Arc::new(
            MockElectionApi::new()
                .with_elections(vec![election(9, ElectionStatus::Active)])
                .with_system_seal(
                    9,
                    SystemSeal {
                        id: 1,
                        election_id: 9,
                        is_valid: false,
                        ..SystemSeal::default()
                    },
                ),
        );
        let gate = gate_over(api, test_clock());
        assert!(!gate.is_sealed().await);
    }

    #[tokio::test]
    async fn listing_failure_fails_safe_to_unsealed() {
        let api = Arc::new(MockElectionApi::new().with_failing_listing(500));
        let gate = gate_over(api, test_clock());

        assert!(!gate.is_sealed().await);
        assert!(gate.sealed_ids().await.is_empty());
    }

    #[tokio::test]
    async fn cache_serves_within_ttl_and_refreshes_after() {
        let clock = test_clock();
        let api = Arc::new(
            MockElectionApi::new().with_elections(vec![election(7, ElectionStatus::Completed)]),
        );
        let gate = gate_over(Arc::clone(&api), Arc::clone(&clock));

        assert!(gate.is_sealed().await);
        assert!(gate.is_sealed().await);
        assert_eq!(
            api.count_calls(|c| matches!(c, RecordedCall::ListElections(_))),
            1,
            "second read within TTL must be served from cache"
        );

        clock.advance(chrono::Duration::seconds(61));
        assert!(gate.is_sealed().await);
        assert_eq!(
            api.count_calls(|c| matches!(c, RecordedCall::ListElections(_))),
            2,
            "read past TTL must refresh"
        );
    }

    #[tokio::test]
    async fn invalidate_forces_fresh_fetch_within_ttl() {
        let api = Arc::new(
            MockElectionApi::new().with_elections(vec![election(7, ElectionStatus::Completed)]),
        );
        let gate = gate_over(Arc::clone(&api), test_clock());

        assert!(gate.is_sealed().await);
        gate.invalidate();
        assert!(gate.is_sealed().await);
        assert_eq!(
            api.count_calls(|c| matches!(c, RecordedCall::ListElections(_))),
            2
        );
    }

    #[tokio::test]
    async fn invalidate_then_failure_reads_unsealed() {
        let api = Arc::new(
            MockElectionApi::new().with_elections(vec![election(7, ElectionStatus::Completed)]),
        );
        let gate = gate_over(Arc::clone(&api), test_clock());
        assert!(gate.is_sealed().await);

        api.set_failing_listing(Some(503));
        gate.invalidate();
        assert!(!gate.is_sealed().await);
        assert!(gate.sealed_ids().await.is_empty());
    }

    #[tokio::test]
    async fn actions_allowed_when_not_sealed() {
        let api = Arc::new(MockElectionApi::new());
        let gate = gate_over(api, test_clock());

        assert!(gate.is_action_allowed("election", "create").await);
        assert!(gate.is_action_allowed("voter", "delete").await);
        // Even unknown resource kinds pass when nothing is sealed.
        assert!(gate.is_action_allowed("ballot", "create").await);
    }

    #[tokio::test]
    async fn sealed_mode_blocks_unlisted_actions() {
        let api = Arc::new(
            MockElectionApi::new().with_elections(vec![election(7, ElectionStatus::Completed)]),
        );
        let gate = gate_over(api, test_clock());

        assert!(gate.is_action_allowed("election", "list").await);
        assert!(gate.is_action_allowed("Voter", "SendPasswordReset").await);
        assert!(!gate.is_action_allowed("election", "create").await);
        assert!(!gate.is_action_allowed("voter", "delete").await);
        assert!(!gate.is_action_allowed("ballot", "list").await);
    }

    #[tokio::test]
    async fn per_election_lookup_failure_skips_only_that_election() {
        // Election 3's secondary lookup answers 404 (no seal seeded);
        // election 7 must still be detected.
        let api = Arc::new(MockElectionApi::new().with_elections(vec![
            election(3, ElectionStatus::Active),
            election(7, ElectionStatus::Completed),
        ]));
        let gate = gate_over(api, test_clock());

        let ids = gate.sealed_ids().await;
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![7]);
    }
}
