// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Veilport Systems

//! Capability-source trust registry.
//!
//! [`TrustRegistry`] tracks one [`TrustRecord`] per registered capability
//! source (e.g. a connected tool server).  The trust level rises by a small
//! step on every approved call and falls by a larger step on every rejected
//! call — trust is hard-won and easily lost.  Levels are clamped to
//! `[0, 100]` on every update.
//!
//! Tool risk comes from the capability declaration when the source supplied
//! one, otherwise from [`classify_tool_name`], a static name heuristic.

use alloc::vec::Vec;
use log::debug;

use crate::clock::current_time_ms;
use crate::config::Config;
use crate::storage::TrustStore;
use crate::types::{Capability, RegistryError, ToolRisk, TransportKind, TrustRecord};

/// Execution, deletion, and value-transfer verbs mark a tool high-risk.
const HIGH_RISK_VERBS: &[&str] = &[
    "exec", "shell", "spawn", "delete", "remove", "drop", "destroy", "kill",
    "terminate", "transfer", "pay", "withdraw", "wire", "format",
];

/// File and network verbs mark a tool medium-risk.
const MEDIUM_RISK_VERBS: &[&str] = &[
    "write", "read", "file", "fetch", "http", "request", "download", "upload",
    "network", "socket", "mail", "send",
];

/// Classify a tool by its name alone.
///
/// Used only when the capability did not declare its own risk level.
///
/// # Examples
///
/// ```rust
/// use warden_core::registry::classify_tool_name;
/// use warden_core::types::ToolRisk;
///
/// assert_eq!(classify_tool_name("exec_shell"), ToolRisk::High);
/// assert_eq!(classify_tool_name("fs_read"), ToolRisk::Medium);
/// assert_eq!(classify_tool_name("summarize"), ToolRisk::Low);
/// ```
pub fn classify_tool_name(tool_name: &str) -> ToolRisk {
    let lowered = tool_name.to_lowercase();
    if HIGH_RISK_VERBS.iter().any(|verb| lowered.contains(verb)) {
        ToolRisk::High
    } else if MEDIUM_RISK_VERBS.iter().any(|verb| lowered.contains(verb)) {
        ToolRisk::Medium
    } else {
        ToolRisk::Low
    }
}

/// Tracks reputation scores for capability sources.
///
/// Generic over `S: TrustStore` so records can live in memory, on disk, or
/// behind any other key-value backend.
///
/// # Examples
///
/// ```rust
/// use warden_core::config::Config;
/// use warden_core::registry::TrustRegistry;
/// use warden_core::storage::InMemoryTrustStore;
/// use warden_core::types::TransportKind;
///
/// let mut registry = TrustRegistry::new(Config::default(), InMemoryTrustStore::new());
///
/// let record = registry
///     .register_source("files", "stdio://files", TransportKind::Stdio, vec![])
///     .unwrap();
/// assert_eq!(record.trust_level, 30);
///
/// let record = registry.record_approved("files").unwrap();
/// assert_eq!(record.trust_level, 31);
/// ```
pub struct TrustRegistry<S: TrustStore> {
    config: Config,
    storage: S,
}

impl<S: TrustStore> TrustRegistry<S> {
    /// Create a new [`TrustRegistry`] with the given configuration and
    /// storage.
    pub fn new(config: Config, storage: S) -> Self {
        Self { config, storage }
    }

    /// Register a capability source and create its trust record.
    ///
    /// The source name doubles as its stable id.  The record starts at
    /// `Config::initial_trust_level`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DuplicateSource`] when a source with this name is
    /// already registered.
    pub fn register_source(
        &mut self,
        name: &str,
        endpoint: &str,
        transport: TransportKind,
        capabilities: Vec<Capability>,
    ) -> Result<TrustRecord, RegistryError> {
        if self.storage.get_source(name).is_some() {
            return Err(RegistryError::DuplicateSource {
                source_id: name.into(),
            });
        }

        let level = self.config.initial_trust_level.min(100);
        let record = TrustRecord {
            source_id: name.into(),
            name: name.into(),
            endpoint: endpoint.into(),
            transport,
            capabilities,
            trust_level: level,
            is_trusted: level >= self.config.trusted_threshold,
            total_calls: 0,
            approved_calls: 0,
            rejected_calls: 0,
            registered_at_ms: current_time_ms(),
        };
        self.storage.put_source(name, record.clone());
        debug!(
            "capability source '{}' registered at trust {} ({} tools)",
            name,
            record.trust_level,
            record.capabilities.len()
        );
        Ok(record)
    }

    /// Delete a source's trust record.
    ///
    /// The only way a record is ever removed.
    pub fn unregister_source(&mut self, source_id: &str) -> Result<TrustRecord, RegistryError> {
        self.storage
            .remove_source(source_id)
            .ok_or_else(|| RegistryError::UnknownSource {
                source_id: source_id.into(),
            })
    }

    /// The source's current trust record, if registered.
    pub fn get_source(&self, source_id: &str) -> Option<TrustRecord> {
        self.storage.get_source(source_id)
    }

    /// All registered sources.
    pub fn list_sources(&self) -> Vec<TrustRecord> {
        self.storage.list_sources()
    }

    /// Record a human-approved call: counters up, trust up by
    /// `Config::approve_step`, clamped at 100.
    pub fn record_approved(&mut self, source_id: &str) -> Result<TrustRecord, RegistryError> {
        let step = i32::from(self.config.approve_step);
        self.adjust(source_id, step, |record| {
            record.approved_calls += 1;
        })
    }

    /// Record a human-rejected call: counters up, trust down by
    /// `Config::reject_step`, clamped at 0.
    ///
    /// The reject step is larger than the approve step by default, so a
    /// single rejection undoes several approvals.
    pub fn record_rejected(&mut self, source_id: &str) -> Result<TrustRecord, RegistryError> {
        let step = i32::from(self.config.reject_step);
        self.adjust(source_id, -step, |record| {
            record.rejected_calls += 1;
        })
    }

    /// Mark a source as (un)trusted by operator decision.
    ///
    /// Trusting floors the level at `Config::trusted_threshold` but never
    /// lowers an already-higher value.  Untrusting clears the flag without
    /// touching the level.
    pub fn set_trusted(
        &mut self,
        source_id: &str,
        trusted: bool,
    ) -> Result<TrustRecord, RegistryError> {
        let mut record = self.require(source_id)?;
        if trusted {
            record.trust_level = record.trust_level.max(self.config.trusted_threshold);
            record.is_trusted = true;
        } else {
            record.is_trusted = false;
        }
        self.storage.put_source(source_id, record.clone());
        Ok(record)
    }

    /// Risk level of `tool_name`: the declared level when a registered
    /// source declares the capability, else the name heuristic.
    pub fn tool_risk(&self, tool_name: &str) -> ToolRisk {
        self.declared_capability(tool_name)
            .and_then(|capability| capability.risk)
            .unwrap_or_else(|| classify_tool_name(tool_name))
    }

    /// The registered source declaring `tool_name`, if any.
    pub fn source_for_tool(&self, tool_name: &str) -> Option<TrustRecord> {
        self.storage.list_sources().into_iter().find(|record| {
            record
                .capabilities
                .iter()
                .any(|capability| capability.name == tool_name)
        })
    }

    /// Borrow the underlying storage (read-only).
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Mutably borrow the underlying storage.
    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn declared_capability(&self, tool_name: &str) -> Option<Capability> {
        self.source_for_tool(tool_name).and_then(|record| {
            record
                .capabilities
                .into_iter()
                .find(|capability| capability.name == tool_name)
        })
    }

    fn require(&self, source_id: &str) -> Result<TrustRecord, RegistryError> {
        self.storage
            .get_source(source_id)
            .ok_or_else(|| RegistryError::UnknownSource {
                source_id: source_id.into(),
            })
    }

    /// Apply a clamped trust delta plus a counter update.
    fn adjust(
        &mut self,
        source_id: &str,
        delta: i32,
        update: impl FnOnce(&mut TrustRecord),
    ) -> Result<TrustRecord, RegistryError> {
        let mut record = self.require(source_id)?;
        record.total_calls += 1;
        update(&mut record);
        let level = (i32::from(record.trust_level) + delta).clamp(0, 100) as u8;
        record.trust_level = level;
        record.is_trusted = level >= self.config.trusted_threshold;
        self.storage.put_source(source_id, record.clone());
        debug!(
            "trust for source '{}' adjusted by {} to {}",
            source_id, delta, level
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryTrustStore;
    use alloc::vec;

    fn registry() -> TrustRegistry<InMemoryTrustStore> {
        TrustRegistry::new(Config::default(), InMemoryTrustStore::new())
    }

    #[test]
    fn five_rejections_from_thirty_land_on_five() {
        let mut registry = registry();
        registry
            .register_source("files", "stdio://files", TransportKind::Stdio, vec![])
            .unwrap();

        let mut record = registry.get_source("files").unwrap();
        assert_eq!(record.trust_level, 30);
        for _ in 0..5 {
            record = registry.record_rejected("files").unwrap();
        }
        assert_eq!(record.trust_level, 5);
        assert_eq!(record.rejected_calls, 5);
        assert_eq!(record.total_calls, 5);
    }

    #[test]
    fn trust_is_clamped_at_both_ends() {
        let mut registry = registry();
        registry
            .register_source("files", "stdio://files", TransportKind::Stdio, vec![])
            .unwrap();

        for _ in 0..10 {
            registry.record_rejected("files").unwrap();
        }
        assert_eq!(registry.get_source("files").unwrap().trust_level, 0);

        for _ in 0..150 {
            registry.record_approved("files").unwrap();
        }
        assert_eq!(registry.get_source("files").unwrap().trust_level, 100);
    }

    #[test]
    fn set_trusted_floors_but_never_lowers() {
        let mut registry = registry();
        registry
            .register_source("files", "stdio://files", TransportKind::Stdio, vec![])
            .unwrap();

        let record = registry.set_trusted("files", true).unwrap();
        assert_eq!(record.trust_level, 70);
        assert!(record.is_trusted);

        // Push above the floor, then re-trust: the level must not drop.
        for _ in 0..20 {
            registry.record_approved("files").unwrap();
        }
        let record = registry.set_trusted("files", true).unwrap();
        assert_eq!(record.trust_level, 90);
    }

    #[test]
    fn unknown_source_is_a_configuration_error() {
        let mut registry = registry();
        let err = registry.record_approved("ghost").unwrap_err();
        assert_eq!(err.code(), "unknown_source");
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = registry();
        registry
            .register_source("files", "stdio://files", TransportKind::Stdio, vec![])
            .unwrap();
        let err = registry
            .register_source("files", "stdio://files", TransportKind::Stdio, vec![])
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateSource { .. }));
    }

    #[test]
    fn declared_risk_wins_over_heuristic() {
        let mut registry = registry();
        registry
            .register_source(
                "tools",
                "http://localhost:9000",
                TransportKind::Http,
                vec![
                    Capability {
                        name: "summarize".into(),
                        risk: Some(ToolRisk::High),
                    },
                    Capability {
                        name: "exec_shell".into(),
                        risk: None,
                    },
                ],
            )
            .unwrap();

        // Declared: heuristic would say Low.
        assert_eq!(registry.tool_risk("summarize"), ToolRisk::High);
        // Undeclared risk on a known tool: heuristic applies.
        assert_eq!(registry.tool_risk("exec_shell"), ToolRisk::High);
        // Unknown tool entirely: heuristic applies.
        assert_eq!(registry.tool_risk("translate"), ToolRisk::Low);
    }

    #[test]
    fn approvals_recompute_trusted_flag() {
        let config = Config {
            initial_trust_level: 69,
            ..Config::default()
        };
        let mut registry = TrustRegistry::new(config, InMemoryTrustStore::new());
        registry
            .register_source("files", "stdio://files", TransportKind::Stdio, vec![])
            .unwrap();

        let record = registry.record_approved("files").unwrap();
        assert_eq!(record.trust_level, 70);
        assert!(record.is_trusted);
    }
}
