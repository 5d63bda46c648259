// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Veilport Systems

//! File-based JSON trust storage.
//!
//! [`FileTrustStore`] persists capability-source trust records to a single
//! JSON file on disk.  Every mutation flushes the file atomically
//! (write-rename) so that a crash mid-write does not corrupt existing data.
//!
//! ## Layout
//!
//! The JSON file has the shape:
//!
//! ```json
//! {
//!   "sources": { "<source_id>": TrustRecord, ... }
//! }
//! ```
//!
//! ## Caveats
//!
//! * [`FileTrustStore`] holds the full in-memory state and flushes on every
//!   mutation.  Trust adjustments are human-paced, so this is fine.
//! * Concurrent access from multiple processes is not supported.  Use a
//!   database-backed [`TrustStore`] implementation for multi-process
//!   deployments.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use warden_core::storage::TrustStore;
use warden_core::types::TrustRecord;

/// Snapshot of all trust state, serialised to / deserialised from disk.
#[derive(Debug, Default, Serialize, Deserialize)]
struct TrustSnapshot {
    sources: HashMap<String, TrustRecord>,
}

/// A file-backed [`TrustStore`] implementation that persists records as
/// JSON.
///
/// # Examples
///
/// ```rust,no_run
/// use warden_std::storage::FileTrustStore;
/// use warden_core::TrustStore;
///
/// let mut storage = FileTrustStore::open("/tmp/warden-trust.json")
///     .expect("could not open trust store");
///
/// assert!(storage.get_source("files").is_none());
/// ```
pub struct FileTrustStore {
    path: PathBuf,
    data: TrustSnapshot,
}

impl FileTrustStore {
    /// Open an existing JSON trust file, or create a new empty store if the
    /// path does not exist.
    ///
    /// # Errors
    ///
    /// Returns an [`io::Error`] if the file exists but cannot be read or if
    /// the JSON is malformed.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw).map_err(|error| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("trust store JSON parse error: {}", error),
                )
            })?
        } else {
            TrustSnapshot::default()
        };

        Ok(Self { path, data })
    }

    /// Flush the current in-memory state to disk using an atomic
    /// write-rename.
    ///
    /// The file is written to `<path>.tmp` first, then renamed over the
    /// target, so a crash during the write never leaves a partial file.
    ///
    /// # Errors
    ///
    /// Returns an [`io::Error`] if serialisation fails or the file cannot be
    /// written or renamed.
    pub fn flush(&self) -> io::Result<()> {
        let json = serde_json::to_string_pretty(&self.data).map_err(|error| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("trust store serialisation error: {}", error),
            )
        })?;

        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl TrustStore for FileTrustStore {
    fn get_source(&self, source_id: &str) -> Option<TrustRecord> {
        self.data.sources.get(source_id).cloned()
    }

    fn put_source(&mut self, source_id: &str, record: TrustRecord) {
        self.data.sources.insert(source_id.to_string(), record);
        // Errors are silently ignored here; callers that need guaranteed
        // durability should call flush() explicitly and handle the Result.
        let _ = self.flush();
    }

    fn remove_source(&mut self, source_id: &str) -> Option<TrustRecord> {
        let removed = self.data.sources.remove(source_id);
        if removed.is_some() {
            let _ = self.flush();
        }
        removed
    }

    fn list_sources(&self) -> Vec<TrustRecord> {
        self.data.sources.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::config::Config;
    use warden_core::registry::TrustRegistry;
    use warden_core::types::TransportKind;

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trust.json");

        {
            let storage = FileTrustStore::open(&path).unwrap();
            let mut registry = TrustRegistry::new(Config::default(), storage);
            registry
                .register_source("files", "stdio://files", TransportKind::Stdio, vec![])
                .unwrap();
            registry.record_rejected("files").unwrap();
        }

        let storage = FileTrustStore::open(&path).unwrap();
        let record = storage.get_source("files").unwrap();
        assert_eq!(record.trust_level, 25);
        assert_eq!(record.rejected_calls, 1);
    }

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileTrustStore::open(dir.path().join("absent.json")).unwrap();
        assert!(storage.list_sources().is_empty());
    }

    #[test]
    fn malformed_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(FileTrustStore::open(&path).is_err());
    }

    #[test]
    fn remove_deletes_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trust.json");

        {
            let storage = FileTrustStore::open(&path).unwrap();
            let mut registry = TrustRegistry::new(Config::default(), storage);
            registry
                .register_source("files", "stdio://files", TransportKind::Stdio, vec![])
                .unwrap();
            registry.unregister_source("files").unwrap();
        }

        let storage = FileTrustStore::open(&path).unwrap();
        assert!(storage.get_source("files").is_none());
    }
}
