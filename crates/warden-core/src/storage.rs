// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Veilport Systems

//! Storage abstraction for trust records.
//!
//! The [`TrustStore`] trait is the single interface between the trust
//! registry and any persistence layer — a key-value store keyed by source
//! id.  This crate ships [`InMemoryTrustStore`] for development and testing.
//! Production implementations (file-based, database, etc.) live in
//! downstream crates so that this core crate remains `no_std`.
//!
//! Escape-hatch state is deliberately *not* persisted: pauses, allow-once
//! tokens, and session trust grants are ephemeral by design.

use alloc::string::String;
use alloc::vec::Vec;
use hashbrown::HashMap;

use crate::types::TrustRecord;

// ---------------------------------------------------------------------------
// TrustStore trait
// ---------------------------------------------------------------------------

/// Pluggable persistence interface for capability-source trust records.
///
/// Implementations MUST be `Send + Sync` so the registry can be shared
/// across threads when wrapped in `Arc<RwLock<...>>`.
pub trait TrustStore: Send + Sync {
    /// Retrieve the trust record for `source_id`, if any.
    fn get_source(&self, source_id: &str) -> Option<TrustRecord>;

    /// Persist or overwrite the trust record for `source_id`.
    fn put_source(&mut self, source_id: &str, record: TrustRecord);

    /// Delete and return the trust record for `source_id`.
    fn remove_source(&mut self, source_id: &str) -> Option<TrustRecord>;

    /// All stored trust records, in unspecified order.
    fn list_sources(&self) -> Vec<TrustRecord>;
}

// ---------------------------------------------------------------------------
// InMemoryTrustStore
// ---------------------------------------------------------------------------

/// A volatile [`TrustStore`] backed by [`hashbrown::HashMap`].
///
/// All data lives in process memory and is lost when the registry is
/// dropped.  Suitable for testing and for deployments where trust
/// persistence is managed outside the engine.
///
/// # Examples
///
/// ```rust
/// use warden_core::storage::{InMemoryTrustStore, TrustStore};
/// use warden_core::types::{TransportKind, TrustRecord};
///
/// let mut store = InMemoryTrustStore::new();
/// store.put_source("files", TrustRecord {
///     source_id:       "files".into(),
///     name:            "files".into(),
///     endpoint:        "stdio://files".into(),
///     transport:       TransportKind::Stdio,
///     capabilities:    vec![],
///     trust_level:     30,
///     is_trusted:      false,
///     total_calls:     0,
///     approved_calls:  0,
///     rejected_calls:  0,
///     registered_at_ms: 0,
/// });
/// assert!(store.get_source("files").is_some());
/// assert!(store.get_source("unknown").is_none());
/// ```
#[derive(Debug, Default, Clone)]
pub struct InMemoryTrustStore {
    sources: HashMap<String, TrustRecord>,
}

impl InMemoryTrustStore {
    /// Create a new, empty [`InMemoryTrustStore`].
    pub fn new() -> Self {
        Self::default()
    }
}

impl TrustStore for InMemoryTrustStore {
    fn get_source(&self, source_id: &str) -> Option<TrustRecord> {
        self.sources.get(source_id).cloned()
    }

    fn put_source(&mut self, source_id: &str, record: TrustRecord) {
        self.sources.insert(source_id.into(), record);
    }

    fn remove_source(&mut self, source_id: &str) -> Option<TrustRecord> {
        self.sources.remove(source_id)
    }

    fn list_sources(&self) -> Vec<TrustRecord> {
        self.sources.values().cloned().collect()
    }
}
