//! Durable key-value persistence for the document and its history.
//!
//! [`Persistence`] sits between the store and a [`KeyValueBackend`]. Nothing
//! here is allowed to fail loudly: the in-memory document stays authoritative
//! and every storage problem degrades to a logged warning and a return value.

mod file;
mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage quota exceeded: {needed} bytes needed, {available} available")]
    QuotaExceeded { needed: u64, available: u64 },
    #[error("record `{key}` failed its integrity check")]
    Corrupt { key: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    pub fn is_quota(&self) -> bool {
        matches!(self, StorageError::QuotaExceeded { .. })
    }
}

/// Transport for persisted records.
pub trait KeyValueBackend: Send + Sync {
    /// Fetch the record stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    /// Store `value` under `key`, replacing any previous record.
    fn put(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// A persisted sequence that can shed its oldest entries to fit a quota.
pub trait Trimmable: Serialize {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shrink to at most `len` entries, keeping the ones still reachable.
    fn trim_to(&mut self, len: usize);

    fn clear(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// The quota was hit; the sequence was cut from `from` to `to` entries
    /// and then saved.
    Trimmed { from: usize, to: usize },
    /// Even the trimmed sequence did not fit; it was emptied and the stored
    /// record dropped.
    Cleared,
    /// A non-quota failure. The value is unchanged and was not saved.
    Failed,
}

struct Keys {
    document: String,
    history: String,
    structure_version: String,
}

pub struct Persistence {
    backend: Box<dyn KeyValueBackend>,
    keys: Keys,
}

impl Persistence {
    pub fn new(backend: impl KeyValueBackend + 'static, prefix: &str) -> Self {
        Self {
            backend: Box::new(backend),
            keys: Keys {
                document: format!("{}.document", prefix),
                history: format!("{}.history", prefix),
                structure_version: format!("{}.structure_version", prefix),
            },
        }
    }

    /// Persist the current document. A failure is logged and otherwise
    /// ignored: the document cannot be shrunk, and the in-memory copy remains
    /// authoritative for the session.
    pub fn save_document(&self, document: &Value) -> bool {
        let result = serde_json::to_string_pretty(document)
            .map_err(StorageError::from)
            .and_then(|data| self.backend.put(&self.keys.document, &data));
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "document snapshot not persisted");
                false
            }
        }
    }

    pub fn load_document(&self) -> Option<Value> {
        self.load(&self.keys.document)
    }

    /// Persist the history log, shedding entries on quota failure: first down
    /// to half its length, then, if that still does not fit, entirely.
    pub fn save_history<T: Trimmable>(&self, history: &mut T) -> SaveOutcome {
        save_trimmable(self.backend.as_ref(), &self.keys.history, history)
    }

    pub fn load_history<T: DeserializeOwned>(&self) -> Option<T> {
        self.load(&self.keys.history)
    }

    pub fn save_structure_version(&self, version: u64) -> bool {
        match self
            .backend
            .put(&self.keys.structure_version, &version.to_string())
        {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, version, "structure version not persisted");
                false
            }
        }
    }

    pub fn load_structure_version(&self) -> Option<u64> {
        let raw = self.fetch(&self.keys.structure_version)?;
        match raw.trim().parse() {
            Ok(version) => Some(version),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed structure version");
                None
            }
        }
    }

    fn fetch(&self, key: &str) -> Option<String> {
        match self.backend.get(key) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key, error = %e, "ignoring unreadable persisted record");
                None
            }
        }
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.fetch(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "ignoring malformed persisted record");
                None
            }
        }
    }
}

fn put_json<T: Serialize>(
    backend: &dyn KeyValueBackend,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let data = serde_json::to_string(value)?;
    backend.put(key, &data)
}

fn save_trimmable<T: Trimmable>(
    backend: &dyn KeyValueBackend,
    key: &str,
    value: &mut T,
) -> SaveOutcome {
    match put_json(backend, key, value) {
        Ok(()) => return SaveOutcome::Saved,
        Err(e) if e.is_quota() => {}
        Err(e) => {
            tracing::warn!(key, error = %e, "history not persisted");
            return SaveOutcome::Failed;
        }
    }

    let from = value.len();
    let to = from / 2;
    if to > 0 {
        value.trim_to(to);
        let to = value.len();
        match put_json(backend, key, value) {
            Ok(()) => {
                tracing::warn!(key, from, to, "storage quota hit, history trimmed");
                return SaveOutcome::Trimmed { from, to };
            }
            Err(e) if !e.is_quota() => {
                tracing::warn!(key, error = %e, "trimmed history not persisted");
                return SaveOutcome::Failed;
            }
            Err(_) => {}
        }
    }

    value.clear();
    if let Err(e) = backend.remove(key) {
        tracing::warn!(key, error = %e, "could not drop stale history record");
    }
    tracing::warn!(key, from, "storage quota hit, history cleared");
    SaveOutcome::Cleared
}
