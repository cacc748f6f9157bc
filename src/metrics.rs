use std::sync::atomic::{AtomicU64, Ordering};

use crate::logging;

#[derive(Debug, Default)]
pub struct Metrics {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    api_requests: AtomicU64,
    retries: AtomicU64,
    refreshes_started: AtomicU64,
    refresh_failures: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_api_request(&self) {
        self.api_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_refresh_started(&self) {
        self.refreshes_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_refresh_failure(&self) {
        self.refresh_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> (u64, u64, u64, u64, u64, u64) {
        (
            self.cache_hits.load(Ordering::Relaxed),
            self.cache_misses.load(Ordering::Relaxed),
            self.api_requests.load(Ordering::Relaxed),
            self.retries.load(Ordering::Relaxed),
            self.refreshes_started.load(Ordering::Relaxed),
            self.refresh_failures.load(Ordering::Relaxed),
        )
    }
}

/// One-shot summary for a short-lived process, logged at debug level.
pub fn log_summary(metrics: &Metrics) {
    let (hits, misses, api, retries, started, failed) = metrics.snapshot();
    logging::debug(format!(
        "metrics cache_hit={} cache_miss={} api_requests={} retries={} refreshes_started={} refresh_failures={}",
        hits, misses, api, retries, started, failed
    ));
}
