pub mod store;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::jira::{Issuetype, Project, Status};
use crate::logging;
use crate::metrics::Metrics;
use store::{BlobStore, StoreError};

/// Marker blob claimed by whichever process is currently refreshing.
pub const REFRESH_SENTINEL: &str = "refresh.lock";

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("no cached {0} data")]
    Miss(RefKind),
    #[error("cached {kind} data is not valid json: {source}")]
    Serde {
        kind: RefKind,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// The reference datasets the cache knows about, in refresh order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    Projects,
    Issuetypes,
    Statuses,
}

impl RefKind {
    pub const ALL: [RefKind; 3] = [RefKind::Projects, RefKind::Issuetypes, RefKind::Statuses];

    pub fn blob_name(self) -> &'static str {
        match self {
            RefKind::Projects => "projects.json",
            RefKind::Issuetypes => "issuetypes.json",
            RefKind::Statuses => "statuses.json",
        }
    }
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RefKind::Projects => "projects",
            RefKind::Issuetypes => "issuetypes",
            RefKind::Statuses => "statuses",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of every dataset, with misses degraded to empty
/// lists so lookups never block on the network.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSnapshot {
    pub projects: Vec<Project>,
    pub issuetypes: Vec<Issuetype>,
    pub statuses: Vec<Status>,
    pub fetched_at: HashMap<RefKind, DateTime<Utc>>,
}

#[derive(Debug)]
pub struct ReferenceCache {
    store: Arc<dyn BlobStore>,
    metrics: Arc<Metrics>,
}

impl ReferenceCache {
    pub fn new(store: Arc<dyn BlobStore>, metrics: Arc<Metrics>) -> Self {
        Self { store, metrics }
    }

    /// Whether the dataset has ever been stored. Storage errors read
    /// as absent, matching the load path's treatment of them.
    pub fn exists(&self, kind: RefKind) -> bool {
        matches!(self.store.stored_at(kind.blob_name()), Ok(Some(_)))
    }

    pub fn load<T: DeserializeOwned>(&self, kind: RefKind) -> Result<T, CacheError> {
        let bytes = match self.store.read(kind.blob_name())? {
            Some(bytes) => bytes,
            None => {
                self.metrics.inc_cache_miss();
                return Err(CacheError::Miss(kind));
            }
        };
        let value =
            serde_json::from_slice(&bytes).map_err(|source| CacheError::Serde { kind, source })?;
        self.metrics.inc_cache_hit();
        Ok(value)
    }

    pub fn store<T: Serialize>(&self, kind: RefKind, value: &T) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(value).map_err(|source| CacheError::Serde { kind, source })?;
        self.store.write(kind.blob_name(), &bytes)?;
        Ok(())
    }

    /// Age of the stored blob. Fails with Miss when the dataset has
    /// never been written, mirroring load. A timestamp in the future
    /// clamps to zero.
    pub fn age(&self, kind: RefKind) -> Result<Duration, CacheError> {
        let stored_at = self
            .store
            .stored_at(kind.blob_name())?
            .ok_or(CacheError::Miss(kind))?;
        let age = SystemTime::now()
            .duration_since(stored_at)
            .unwrap_or(Duration::ZERO);
        Ok(age)
    }

    /// Whether the dataset needs refreshing. Absent blobs and storage
    /// errors both count as expired.
    pub fn is_expired(&self, kind: RefKind, max_age: Duration) -> bool {
        match self.age(kind) {
            Ok(age) => age > max_age,
            Err(CacheError::Miss(_)) => true,
            Err(err) => {
                logging::warn(format!("cache age check failed for {kind}: {err}"));
                true
            }
        }
    }

    pub fn fetched_at(&self, kind: RefKind) -> Option<DateTime<Utc>> {
        let stored_at = self.store.stored_at(kind.blob_name()).ok()??;
        Some(DateTime::<Utc>::from(stored_at))
    }

    /// Loads every dataset, mapping misses and corrupt blobs to empty
    /// lists. Corruption is logged but never surfaced to the caller.
    pub fn snapshot(&self) -> ReferenceSnapshot {
        let mut snapshot = ReferenceSnapshot {
            projects: self.load_or_empty(RefKind::Projects),
            issuetypes: self.load_or_empty(RefKind::Issuetypes),
            statuses: self.load_or_empty(RefKind::Statuses),
            fetched_at: HashMap::new(),
        };
        for kind in RefKind::ALL {
            if let Some(at) = self.fetched_at(kind) {
                snapshot.fetched_at.insert(kind, at);
            }
        }
        snapshot
    }

    fn load_or_empty<T: DeserializeOwned>(&self, kind: RefKind) -> Vec<T> {
        match self.load(kind) {
            Ok(values) => values,
            Err(CacheError::Miss(_)) => Vec::new(),
            Err(err) => {
                logging::warn(format!("discarding unreadable {kind} cache: {err}"));
                Vec::new()
            }
        }
    }

    /// Atomically claims the refresh sentinel. Returns false when
    /// another refresh already holds it.
    pub fn try_claim_refresh(&self) -> Result<bool, CacheError> {
        Ok(self.store.try_claim(REFRESH_SENTINEL)?)
    }

    pub fn release_refresh(&self) {
        if let Err(err) = self.store.remove(REFRESH_SENTINEL) {
            logging::warn(format!("failed to release refresh sentinel: {err}"));
        }
    }
}
