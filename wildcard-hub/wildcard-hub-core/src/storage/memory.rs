use super::{KeyValueBackend, StorageError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct Inner {
    records: HashMap<String, String>,
    quota: Option<u64>,
}

impl Inner {
    /// Bytes held by every record except `key`, counting keys and values.
    fn used_excluding(&self, key: &str) -> u64 {
        self.records
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum()
    }
}

/// In-process backend. Clones share the same records, so a test can keep a
/// handle and inspect what the store wrote.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: u64) -> Self {
        let backend = Self::new();
        backend.set_quota(Some(quota));
        backend
    }

    pub fn set_quota(&self, quota: Option<u64>) {
        self.inner.lock().quota = quota;
    }

    /// Stored record, bypassing error handling.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.inner.lock().records.get(key).cloned()
    }

    pub fn used_bytes(&self) -> u64 {
        self.inner.lock().used_excluding("")
    }
}

impl KeyValueBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.raw(key))
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        if let Some(quota) = inner.quota {
            let others = inner.used_excluding(key);
            let needed = others + (key.len() + value.len()) as u64;
            if needed > quota {
                return Err(StorageError::QuotaExceeded {
                    needed,
                    available: quota.saturating_sub(others),
                });
            }
        }
        inner.records.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.lock().records.remove(key);
        Ok(())
    }
}
