use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::Serialize;

use crate::cache::{CacheError, RefKind, ReferenceCache};
use crate::jira::{JiraClient, JiraError};
use crate::logging;
use crate::metrics::Metrics;

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("failed to fetch {kind} from jira: {source}")]
    Fetch { kind: RefKind, source: JiraError },
    #[error("failed to store {kind} in cache: {source}")]
    Store { kind: RefKind, source: CacheError },
}

#[derive(Debug, Default)]
pub struct RefreshSummary {
    pub stored: Vec<(RefKind, usize)>,
}

fn fetch_and_store<T: Serialize>(
    cache: &ReferenceCache,
    kind: RefKind,
    fetch: impl FnOnce() -> Result<Vec<T>, JiraError>,
) -> Result<usize, RefreshError> {
    let values = fetch().map_err(|source| RefreshError::Fetch { kind, source })?;
    let count = values.len();
    cache
        .store(kind, &values)
        .map_err(|source| RefreshError::Store { kind, source })?;
    Ok(count)
}

/// Fetches and stores the requested datasets in canonical order,
/// stopping at the first failure. Each dataset is written as soon as
/// it arrives, so earlier successes survive a later failure.
pub fn refresh_reference_data(
    jira: &JiraClient,
    cache: &ReferenceCache,
    kinds: &[RefKind],
) -> Result<RefreshSummary, RefreshError> {
    let mut summary = RefreshSummary::default();
    for kind in RefKind::ALL {
        if !kinds.contains(&kind) {
            continue;
        }
        let count = match kind {
            RefKind::Projects => fetch_and_store(cache, kind, || jira.list_projects())?,
            RefKind::Issuetypes => fetch_and_store(cache, kind, || jira.list_issuetypes())?,
            RefKind::Statuses => fetch_and_store(cache, kind, || jira.list_statuses())?,
        };
        logging::info(format!("refreshed {kind} with {count} entries"));
        summary.stored.push((kind, count));
    }
    Ok(summary)
}

/// Per-dataset staleness thresholds.
#[derive(Debug, Clone)]
pub struct ExpiryPolicy {
    projects_max_age: Duration,
    issuetypes_max_age: Duration,
    statuses_max_age: Duration,
}

impl ExpiryPolicy {
    pub fn new(projects: Duration, issuetypes: Duration, statuses: Duration) -> Self {
        Self {
            projects_max_age: projects,
            issuetypes_max_age: issuetypes,
            statuses_max_age: statuses,
        }
    }

    pub fn uniform(max_age: Duration) -> Self {
        Self::new(max_age, max_age, max_age)
    }

    pub fn max_age(&self, kind: RefKind) -> Duration {
        match kind {
            RefKind::Projects => self.projects_max_age,
            RefKind::Issuetypes => self.issuetypes_max_age,
            RefKind::Statuses => self.statuses_max_age,
        }
    }
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self::uniform(Duration::from_secs(7 * 24 * 60 * 60))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Every watched dataset is fresh enough.
    NoneNeeded,
    /// A background worker was spawned covering the watched datasets.
    Started,
    /// Another process or thread already holds the refresh claim.
    AlreadyRunning,
}

/// Decides when a refresh is due and makes sure at most one runs at a
/// time, across threads and across processes sharing the cache dir.
#[derive(Debug)]
pub struct RefreshCoordinator {
    jira: Arc<JiraClient>,
    cache: Arc<ReferenceCache>,
    policy: ExpiryPolicy,
    metrics: Arc<Metrics>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshCoordinator {
    pub fn new(
        jira: Arc<JiraClient>,
        cache: Arc<ReferenceCache>,
        policy: ExpiryPolicy,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            jira,
            cache,
            policy,
            metrics,
            worker: Mutex::new(None),
        }
    }

    /// Spawns one background refresh covering every watched dataset
    /// once any of them has gone stale, keeping their timestamps in
    /// step. The sentinel claim happens before the spawn, so a second
    /// caller sees AlreadyRunning rather than a duplicate worker. A
    /// claim left behind by a crashed process starves refresh until
    /// its lock blob is removed.
    pub fn check_and_trigger(&self, kinds: &[RefKind]) -> RefreshOutcome {
        let any_stale = kinds
            .iter()
            .any(|&kind| self.cache.is_expired(kind, self.policy.max_age(kind)));
        if !any_stale {
            return RefreshOutcome::NoneNeeded;
        }

        match self.cache.try_claim_refresh() {
            Ok(true) => {}
            Ok(false) => {
                logging::debug("refresh already claimed by another process");
                return RefreshOutcome::AlreadyRunning;
            }
            Err(err) => {
                logging::warn(format!("could not claim refresh sentinel: {err}"));
                return RefreshOutcome::NoneNeeded;
            }
        }

        self.metrics.inc_refresh_started();
        let jira = Arc::clone(&self.jira);
        let cache = Arc::clone(&self.cache);
        let metrics = Arc::clone(&self.metrics);
        let watched = kinds.to_vec();
        let handle = thread::spawn(move || {
            logging::info(format!(
                "starting background refresh of {} dataset(s)...",
                watched.len()
            ));
            match refresh_reference_data(&jira, &cache, &watched) {
                Ok(summary) => {
                    let detail: Vec<String> = summary
                        .stored
                        .iter()
                        .map(|(kind, count)| format!("{kind}={count}"))
                        .collect();
                    logging::info(format!(
                        "background refresh complete: {}",
                        detail.join(" ")
                    ));
                }
                Err(err) => {
                    metrics.inc_refresh_failure();
                    logging::warn(format!("background refresh failed: {err}"));
                }
            }
            cache.release_refresh();
        });

        *self.worker.lock().expect("refresh worker mutex poisoned") = Some(handle);
        RefreshOutcome::Started
    }

    /// Blocks until the worker spawned by this coordinator finishes.
    /// No-op when nothing is running.
    pub fn join_running_refresh(&self) {
        let handle = self
            .worker
            .lock()
            .expect("refresh worker mutex poisoned")
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                logging::warn("refresh worker panicked");
            }
        }
    }
}
