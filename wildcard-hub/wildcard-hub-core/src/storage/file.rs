//! One file per key under a data directory.
//!
//! Each record is `crc32:<8 hex digits>\n` followed by the payload. Writes go
//! to a `.tmp` sibling first and are renamed into place, so a crash never
//! leaves a half-written record behind.

use super::{KeyValueBackend, StorageError};
use anyhow::{Context, Result};
use crc32fast::Hasher;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const HEADER_PREFIX: &str = "crc32:";
const EXTENSION: &str = "json";

pub struct FileBackend {
    dir: PathBuf,
    quota: Option<u64>,
}

impl FileBackend {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating data directory {}", dir.display()))?;
        Ok(Self { dir, quota: None })
    }

    /// Cap the total size of the data directory, in bytes.
    pub fn with_quota(mut self, quota: u64) -> Self {
        self.quota = Some(quota);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| match c {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
                _ => '_',
            })
            .collect();
        self.dir.join(format!("{}.{}", name, EXTENSION))
    }

    /// Bytes used by committed records, not counting `skip`.
    fn used_bytes_excluding(&self, skip: &Path) -> u64 {
        WalkDir::new(&self.dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path() != skip)
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some(EXTENSION))
            .filter_map(|e| e.metadata().ok())
            .map(|m| m.len())
            .sum()
    }
}

fn checksum(payload: &str) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(payload.as_bytes());
    hasher.finalize()
}

fn encode(payload: &str) -> String {
    format!("{}{:08x}\n{}", HEADER_PREFIX, checksum(payload), payload)
}

fn decode(key: &str, raw: &str) -> Result<String, StorageError> {
    let corrupt = || StorageError::Corrupt {
        key: key.to_owned(),
    };
    let (header, payload) = raw.split_once('\n').ok_or_else(corrupt)?;
    let expected = header
        .strip_prefix(HEADER_PREFIX)
        .and_then(|hex| u32::from_str_radix(hex.trim(), 16).ok())
        .ok_or_else(corrupt)?;
    if checksum(payload) != expected {
        return Err(corrupt());
    }
    Ok(payload.to_owned())
}

impl KeyValueBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.record_path(key);
        match fs::read_to_string(&path) {
            Ok(raw) => decode(key, &raw).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.record_path(key);
        let data = encode(value);

        if let Some(quota) = self.quota {
            let others = self.used_bytes_excluding(&path);
            let needed = others + data.len() as u64;
            if needed > quota {
                return Err(StorageError::QuotaExceeded {
                    needed,
                    available: quota.saturating_sub(others),
                });
            }
        }

        let temp_path = path.with_extension("tmp");
        {
            let mut temp_file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&temp_path)?;
            temp_file.write_all(data.as_bytes())?;
            temp_file.sync_all()?;
        }
        fs::rename(&temp_path, &path)?;
        tracing::trace!(key, bytes = data.len(), "record written");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.record_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
