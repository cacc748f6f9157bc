use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cache io failed at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Persistence backend for named blobs. A blob is replaced wholesale on
/// every write, so readers never observe a partial value.
pub trait BlobStore: Send + Sync + std::fmt::Debug {
    fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn write(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError>;
    fn stored_at(&self, name: &str) -> Result<Option<SystemTime>, StoreError>;
    /// Creates the named marker iff it does not exist. Returns false
    /// when someone else already holds it.
    fn try_claim(&self, name: &str) -> Result<bool, StoreError>;
    fn remove(&self, name: &str) -> Result<(), StoreError>;
}

#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir).map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn blob_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

impl BlobStore for FileStore {
    fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.blob_path(name);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn write(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        // temp file + rename so readers see either the old value or the
        // new one, never a torn write
        let path = self.blob_path(name);
        let tmp = self.blob_path(&format!("{name}.tmp"));
        fs::write(&tmp, bytes).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| StoreError::Io { path, source })
    }

    fn stored_at(&self, name: &str) -> Result<Option<SystemTime>, StoreError> {
        let path = self.blob_path(name);
        match fs::metadata(&path) {
            Ok(meta) => meta
                .modified()
                .map(Some)
                .map_err(|source| StoreError::Io { path, source }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn try_claim(&self, name: &str) -> Result<bool, StoreError> {
        let path = self.blob_path(name);
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                let _ = write!(file, "{}", std::process::id());
                Ok(true)
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn remove(&self, name: &str) -> Result<(), StoreError> {
        let path = self.blob_path(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, (Vec<u8>, SystemTime)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, HashMap<String, (Vec<u8>, SystemTime)>> {
        self.blobs.lock().expect("memory store mutex poisoned")
    }
}

impl BlobStore for MemoryStore {
    fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.guard().get(name).map(|(bytes, _)| bytes.clone()))
    }

    fn write(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.guard()
            .insert(name.to_string(), (bytes.to_vec(), SystemTime::now()));
        Ok(())
    }

    fn stored_at(&self, name: &str) -> Result<Option<SystemTime>, StoreError> {
        Ok(self.guard().get(name).map(|(_, at)| *at))
    }

    fn try_claim(&self, name: &str) -> Result<bool, StoreError> {
        let mut blobs = self.guard();
        if blobs.contains_key(name) {
            return Ok(false);
        }
        blobs.insert(name.to_string(), (Vec::new(), SystemTime::now()));
        Ok(true)
    }

    fn remove(&self, name: &str) -> Result<(), StoreError> {
        self.guard().remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trips_blobs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(dir.path()).expect("store");

        store.write("projects.json", b"[1,2]").expect("write");
        let got = store.read("projects.json").expect("read");
        assert_eq!(got.as_deref(), Some(b"[1,2]".as_ref()));
        assert!(store
            .stored_at("projects.json")
            .expect("stored_at")
            .is_some());
    }

    #[test]
    fn file_store_reports_absent_blobs_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(dir.path()).expect("store");

        assert!(store.read("missing.json").expect("read").is_none());
        assert!(store.stored_at("missing.json").expect("stored_at").is_none());
    }

    #[test]
    fn file_store_write_replaces_previous_value() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(dir.path()).expect("store");

        store.write("statuses.json", b"old").expect("first write");
        store.write("statuses.json", b"new").expect("second write");
        let got = store.read("statuses.json").expect("read");
        assert_eq!(got.as_deref(), Some(b"new".as_ref()));
    }

    #[test]
    fn file_store_claim_is_exclusive_until_removed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(dir.path()).expect("store");

        assert!(store.try_claim("refresh.lock").expect("first claim"));
        assert!(!store.try_claim("refresh.lock").expect("second claim"));
        store.remove("refresh.lock").expect("remove");
        assert!(store.try_claim("refresh.lock").expect("claim after remove"));
    }

    #[test]
    fn remove_tolerates_absent_blobs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(dir.path()).expect("store");
        store.remove("never-written").expect("remove absent");
    }

    #[test]
    fn memory_store_round_trips_and_claims() {
        let store = MemoryStore::new();

        store.write("issuetypes.json", b"[]").expect("write");
        let got = store.read("issuetypes.json").expect("read");
        assert_eq!(got.as_deref(), Some(b"[]".as_ref()));

        assert!(store.try_claim("refresh.lock").expect("first claim"));
        assert!(!store.try_claim("refresh.lock").expect("second claim"));
        store.remove("refresh.lock").expect("remove");
        assert!(store.try_claim("refresh.lock").expect("claim after remove"));
    }
}
