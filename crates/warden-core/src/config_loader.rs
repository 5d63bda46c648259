// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Veilport Systems

//! Configuration loader for the admission engine.
//!
//! Supports two load strategies:
//!
//! 1. **TOML file** — [`load_config`] reads and deserialises a TOML file into
//!    a [`WardenConfig`] struct.
//! 2. **Environment variables** — [`load_config_from_env`] reads `WARDEN_`-prefixed
//!    environment variables and constructs a [`WardenConfig`].
//!
//! Both loaders are only available when the `config-loader` feature is
//! active.
//!
//! # File format
//!
//! ```toml
//! gate_pass_threshold   = 50
//! high_risk_trust_floor = 50
//! audit_max_entries     = 5000
//! escalation_policy     = "fail_open"   # "fail_open" | "fail_closed"
//! semantic_url          = "https://classifier.internal/v1"
//! semantic_timeout_ms   = 3000
//! ```
//!
//! # Environment variables
//!
//! | Variable                        | Type    | Default     |
//! |---------------------------------|---------|-------------|
//! | `WARDEN_GATE_PASS_THRESHOLD`    | u8      | 50          |
//! | `WARDEN_HIGH_RISK_TRUST_FLOOR`  | u8      | 50          |
//! | `WARDEN_AUDIT_MAX_ENTRIES`      | integer | 5000        |
//! | `WARDEN_ESCALATION_POLICY`      | string  | "fail_open" |
//! | `WARDEN_SEMANTIC_URL`           | string  | unset       |
//! | `WARDEN_SEMANTIC_TIMEOUT_MS`    | integer | 3000        |

// Only compile this module when the "config-loader" feature is enabled.
// "config-loader" implies "std", so std facilities are always available here.
#![cfg(feature = "config-loader")]

use std::fmt;
use std::fs;
use std::num::ParseIntError;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::semantic::{EscalationPolicy, SemanticConfig};

// ---------------------------------------------------------------------------
// WardenConfig
// ---------------------------------------------------------------------------

/// Flat configuration struct for admission engine construction.
///
/// Distinct from the engine-internal [`Config`] to provide a stable,
/// serialisation-friendly representation that can be loaded from TOML files
/// or environment variables.  Convert with `Config::from(loaded)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WardenConfig {
    /// A gate passes at or above this score.
    #[serde(default = "default_gate_pass_threshold")]
    pub gate_pass_threshold: u8,

    /// High-risk tools require source trust at or above this floor.
    #[serde(default = "default_high_risk_trust_floor")]
    pub high_risk_trust_floor: u8,

    /// Maximum retained audit entries.
    #[serde(default = "default_audit_max_entries")]
    pub audit_max_entries: usize,

    /// Policy applied when the semantic collaborator fails.
    #[serde(default)]
    pub escalation_policy: EscalationPolicyName,

    /// Base URL of the semantic classifier; unset disables escalation.
    #[serde(default)]
    pub semantic_url: Option<String>,

    /// Per-call semantic timeout in milliseconds.
    #[serde(default = "default_semantic_timeout_ms")]
    pub semantic_timeout_ms: u64,
}

/// Serialisation-friendly escalation policy name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EscalationPolicyName {
    /// Keep the heuristic verdict on collaborator failure.
    #[default]
    FailOpen,
    /// Treat the text as unsafe on collaborator failure.
    FailClosed,
}

impl From<EscalationPolicyName> for EscalationPolicy {
    fn from(name: EscalationPolicyName) -> Self {
        match name {
            EscalationPolicyName::FailOpen   => EscalationPolicy::FailOpen,
            EscalationPolicyName::FailClosed => EscalationPolicy::FailClosed,
        }
    }
}

impl EscalationPolicyName {
    fn from_str_case_insensitive(s: &str) -> Result<Self, ConfigError> {
        match s.to_ascii_lowercase().as_str() {
            "fail_open"   => Ok(EscalationPolicyName::FailOpen),
            "fail_closed" => Ok(EscalationPolicyName::FailClosed),
            other => Err(ConfigError::ParseField {
                field: "escalation_policy".into(),
                value: other.into(),
                reason: "expected one of: fail_open, fail_closed".into(),
            }),
        }
    }
}

fn default_gate_pass_threshold() -> u8 { 50 }
fn default_high_risk_trust_floor() -> u8 { 50 }
fn default_audit_max_entries() -> usize { 5_000 }
fn default_semantic_timeout_ms() -> u64 { 3_000 }

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            gate_pass_threshold:   default_gate_pass_threshold(),
            high_risk_trust_floor: default_high_risk_trust_floor(),
            audit_max_entries:     default_audit_max_entries(),
            escalation_policy:     EscalationPolicyName::FailOpen,
            semantic_url:          None,
            semantic_timeout_ms:   default_semantic_timeout_ms(),
        }
    }
}

impl From<WardenConfig> for Config {
    fn from(loaded: WardenConfig) -> Self {
        let semantic = loaded.semantic_url.map(|base_url| SemanticConfig {
            base_url,
            bearer_token: None,
            timeout_ms: loaded.semantic_timeout_ms,
            policy: loaded.escalation_policy.into(),
        });
        Self {
            gate_pass_threshold: loaded.gate_pass_threshold,
            high_risk_trust_floor: loaded.high_risk_trust_floor,
            audit_max_entries: loaded.audit_max_entries,
            semantic,
            ..Config::default()
        }
    }
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors that can occur while loading or parsing configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// A required file could not be opened.
    FileRead { path: String, source: std::io::Error },
    /// The TOML content could not be deserialised.
    TomlParse { source: toml::de::Error },
    /// A field could not be parsed to its expected type.
    ParseField { field: String, value: String, reason: String },
    /// A field value is outside the permitted range.
    InvalidRange { field: String, value: String, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileRead { path, source } =>
                write!(f, "Failed to read config file \"{path}\": {source}"),
            ConfigError::TomlParse { source } =>
                write!(f, "Failed to parse TOML config: {source}"),
            ConfigError::ParseField { field, value, reason } =>
                write!(f, "Field \"{field}\": cannot parse \"{value}\": {reason}"),
            ConfigError::InvalidRange { field, value, reason } =>
                write!(f, "Field \"{field}\": value \"{value}\" out of range: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::FileRead { source, .. } => Some(source),
            ConfigError::TomlParse { source }    => Some(source),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// TOML loader
// ---------------------------------------------------------------------------

/// Load a [`WardenConfig`] from a TOML file.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read or if the TOML
/// content does not match the expected schema.
///
/// # Example
///
/// ```rust,no_run
/// use warden_core::config_loader::load_config;
///
/// let config = load_config("/etc/warden/warden.toml").unwrap();
/// println!("Pass threshold: {}", config.gate_pass_threshold);
/// ```
pub fn load_config(path: &str) -> Result<WardenConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
        path: path.to_owned(),
        source,
    })?;

    let loaded = toml::from_str::<WardenConfig>(&content)
        .map_err(|source| ConfigError::TomlParse { source })?;
    validate(&loaded)?;
    Ok(loaded)
}

// ---------------------------------------------------------------------------
// Environment variable loader
// ---------------------------------------------------------------------------

/// Load a [`WardenConfig`] from `WARDEN_`-prefixed environment variables.
///
/// Unset variables fall back to their defaults.  Type conversion errors are
/// reported as [`ConfigError::ParseField`], out-of-range values as
/// [`ConfigError::InvalidRange`].
pub fn load_config_from_env() -> Result<WardenConfig, ConfigError> {
    let gate_pass_threshold =
        read_env_u8("WARDEN_GATE_PASS_THRESHOLD", default_gate_pass_threshold())?;
    let high_risk_trust_floor =
        read_env_u8("WARDEN_HIGH_RISK_TRUST_FLOOR", default_high_risk_trust_floor())?;
    let audit_max_entries =
        read_env_usize("WARDEN_AUDIT_MAX_ENTRIES", default_audit_max_entries())?;

    let escalation_policy = match std::env::var("WARDEN_ESCALATION_POLICY") {
        Ok(val) => EscalationPolicyName::from_str_case_insensitive(&val)?,
        Err(_)  => EscalationPolicyName::default(),
    };

    let semantic_url = std::env::var("WARDEN_SEMANTIC_URL").ok();
    let semantic_timeout_ms =
        read_env_u64("WARDEN_SEMANTIC_TIMEOUT_MS", default_semantic_timeout_ms())?;

    let loaded = WardenConfig {
        gate_pass_threshold,
        high_risk_trust_floor,
        audit_max_entries,
        escalation_policy,
        semantic_url,
        semantic_timeout_ms,
    };
    validate(&loaded)?;
    Ok(loaded)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn validate(config: &WardenConfig) -> Result<(), ConfigError> {
    if config.gate_pass_threshold > 100 {
        return Err(ConfigError::InvalidRange {
            field: "gate_pass_threshold".into(),
            value: config.gate_pass_threshold.to_string(),
            reason: "must be in range 0-100".into(),
        });
    }
    if config.high_risk_trust_floor > 100 {
        return Err(ConfigError::InvalidRange {
            field: "high_risk_trust_floor".into(),
            value: config.high_risk_trust_floor.to_string(),
            reason: "must be in range 0-100".into(),
        });
    }
    if config.audit_max_entries == 0 {
        return Err(ConfigError::InvalidRange {
            field: "audit_max_entries".into(),
            value: "0".into(),
            reason: "must be at least 1".into(),
        });
    }
    Ok(())
}

fn read_env_u8(key: &str, default: u8) -> Result<u8, ConfigError> {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u8>().map_err(|source: ParseIntError| {
            ConfigError::ParseField {
                field: key.to_owned(),
                value: val,
                reason: source.to_string(),
            }
        }),
        Err(_) => Ok(default),
    }
}

fn read_env_u64(key: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u64>().map_err(|source: ParseIntError| {
            ConfigError::ParseField {
                field: key.to_owned(),
                value: val,
                reason: source.to_string(),
            }
        }),
        Err(_) => Ok(default),
    }
}

fn read_env_usize(key: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<usize>().map_err(|source: ParseIntError| {
            ConfigError::ParseField {
                field: key.to_owned(),
                value: val,
                reason: source.to_string(),
            }
        }),
        Err(_) => Ok(default),
    }
}
