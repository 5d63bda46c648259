// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Veilport Systems

//! Engine-level configuration.
//!
//! [`Config`] is the single entry point for tuning the admission engine at
//! construction time.  All fields have sensible defaults so that
//! `Config::default()` is always a valid starting point.

use serde::{Deserialize, Serialize};

use crate::semantic::SemanticConfig;

/// Top-level configuration for the admission engine.
///
/// # Examples
///
/// ```rust
/// use warden_core::config::Config;
///
/// let config = Config {
///     high_risk_trust_floor: 60,
///     ..Config::default()
/// };
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// A gate passes when its score is at or above this value.
    /// Defaults to `50`.
    pub gate_pass_threshold: u8,

    /// An unsafe verdict escalates to the semantic classifier only when
    /// every failing gate scored at or above this floor; Critical verdicts
    /// never escalate regardless of score.  Defaults to `25`.
    pub escalation_floor: u8,

    /// Trust level assigned to a capability source at registration.
    /// Defaults to `30`.
    pub initial_trust_level: u8,

    /// Trust points gained per approved call.  Defaults to `1`.
    pub approve_step: u8,

    /// Trust points lost per rejected call.  Larger than `approve_step`
    /// so trust is hard-won and easily lost.  Defaults to `5`.
    pub reject_step: u8,

    /// A source is considered trusted at or above this level; `set_trusted`
    /// floors the level here.  Defaults to `70`.
    pub trusted_threshold: u8,

    /// High-risk tools are blocked when their source's trust level is below
    /// this floor, even if the content passes every gate.  Defaults to `50`.
    pub high_risk_trust_floor: u8,

    /// Upper bound applied to the TTL of temporary tool-trust grants.
    /// Defaults to 24 hours.
    pub max_temporary_trust_ttl_ms: u64,

    /// Maximum number of retained audit entries; oldest evicted first.
    /// Defaults to `5000`.
    pub audit_max_entries: usize,

    /// Maximum age of retained audit entries; older entries are evicted.
    /// Defaults to 7 days.
    pub audit_max_age_ms: u64,

    /// Semantic escalation settings; `None` disables escalation entirely.
    pub semantic: Option<SemanticConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gate_pass_threshold: 50,
            escalation_floor: 25,
            initial_trust_level: 30,
            approve_step: 1,
            reject_step: 5,
            trusted_threshold: 70,
            high_risk_trust_floor: 50,
            max_temporary_trust_ttl_ms: 86_400_000,
            audit_max_entries: 5_000,
            audit_max_age_ms: 604_800_000,
            semantic: None,
        }
    }
}
