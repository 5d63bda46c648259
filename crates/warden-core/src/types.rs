// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Veilport Systems

//! Shared data types used across all admission sub-systems.
//!
//! All types implement [`Clone`], [`Debug`], [`serde::Serialize`], and
//! [`serde::Deserialize`] so they can be serialised to JSON, stored, and
//! transmitted across process boundaries without additional conversion steps.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use serde::{Deserialize, Serialize};

/// Reserved session id meaning "all sessions".
///
/// A pause or trust grant recorded under this id applies to every session;
/// lookups consult it in addition to the caller's own session id.
pub const GLOBAL_SESSION: &str = "*";

// ---------------------------------------------------------------------------
// Gates
// ---------------------------------------------------------------------------

/// The five content gates, as a closed enum.
///
/// There is exactly one evaluator, parameterized by this value — gates are
/// data, not types.  [`GateName::PRIORITY`] lists the gates in quick-check
/// order: the gate most likely to be decisive is evaluated first.
///
/// # Examples
///
/// ```rust
/// use warden_core::types::GateName;
///
/// assert_eq!(GateName::Jailbreak.display_name(), "Jailbreak");
/// assert_eq!(GateName::PRIORITY[0], GateName::Jailbreak);
/// ```
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GateName {
    /// Overclaiming and fabrication markers.
    Truth = 0,
    /// Destructive or abusive operations.
    Harm = 1,
    /// Actions beyond the declared operating scope.
    Scope = 2,
    /// Drift away from the user's stated purpose.
    Purpose = 3,
    /// Instruction-override and persona-hijack attempts.
    Jailbreak = 4,
}

impl GateName {
    /// All five gates in quick-check priority order.
    pub const PRIORITY: [GateName; 5] = [
        GateName::Jailbreak,
        GateName::Harm,
        GateName::Truth,
        GateName::Scope,
        GateName::Purpose,
    ];

    /// Human-readable display name for logging and summaries.
    pub fn display_name(self) -> &'static str {
        match self {
            GateName::Truth     => "Truth",
            GateName::Harm      => "Harm",
            GateName::Scope     => "Scope",
            GateName::Purpose   => "Purpose",
            GateName::Jailbreak => "Jailbreak",
        }
    }

    /// Try to construct a [`GateName`] from its raw `u8` discriminant.
    ///
    /// Returns `None` for values outside `0..=4`.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(GateName::Truth),
            1 => Some(GateName::Harm),
            2 => Some(GateName::Scope),
            3 => Some(GateName::Purpose),
            4 => Some(GateName::Jailbreak),
            _ => None,
        }
    }
}

/// Overall risk classification of a validated text.
///
/// Derived from the failing gates, never settable directly: a Jailbreak
/// failure is Critical, a Harm failure High, a Truth or Scope failure Medium,
/// and a Purpose-only failure (or no failure) Low.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    /// No failure, or Purpose-only drift.
    Low = 0,
    /// Truth or Scope failure.
    Medium = 1,
    /// Harm failure.
    High = 2,
    /// Jailbreak failure or invalid input.
    Critical = 3,
}

impl RiskLevel {
    /// Human-readable display name.
    pub fn display_name(self) -> &'static str {
        match self {
            RiskLevel::Low      => "low",
            RiskLevel::Medium   => "medium",
            RiskLevel::High     => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

/// Optional caller-supplied context for a validation request.
///
/// Created per call, never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationContext {
    /// Where the text came from (e.g. `"model-output"`, `"tool:search"`).
    pub source: Option<String>,
    /// The action the caller intends to take with the text.
    pub action: Option<String>,
}

/// Outcome of evaluating one gate against one text.
///
/// Created fresh on every evaluation and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateResult {
    /// The gate that produced this result.
    pub gate: GateName,
    /// `true` when `score` is at or above the configured pass threshold.
    pub passed: bool,
    /// Penalty-adjusted score, clamped to `[0, 100]`.
    pub score: u8,
    /// One message per matched rule, in catalog order.
    pub violations: Vec<String>,
}

/// Aggregated outcome of running all five gates.
///
/// Invariant: `overall_safe` is `true` iff every gate's `passed` is `true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Truth gate outcome.
    pub truth: GateResult,
    /// Harm gate outcome.
    pub harm: GateResult,
    /// Scope gate outcome.
    pub scope: GateResult,
    /// Purpose gate outcome.
    pub purpose: GateResult,
    /// Jailbreak gate outcome.
    pub jailbreak: GateResult,
    /// AND of all five gates' `passed` flags.
    pub overall_safe: bool,
    /// Risk level derived from the failing gates.
    pub risk_level: RiskLevel,
    /// Human-readable one-line digest of the verdict.
    pub summary: String,
}

impl ValidationResult {
    /// Borrow the result of a single gate by name.
    pub fn gate(&self, name: GateName) -> &GateResult {
        match name {
            GateName::Truth     => &self.truth,
            GateName::Harm      => &self.harm,
            GateName::Scope     => &self.scope,
            GateName::Purpose   => &self.purpose,
            GateName::Jailbreak => &self.jailbreak,
        }
    }

    /// All failing gates, in [`GateName::PRIORITY`] order.
    pub fn failing(&self) -> Vec<&GateResult> {
        GateName::PRIORITY
            .iter()
            .map(|name| self.gate(*name))
            .filter(|result| !result.passed)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Capability sources & trust
// ---------------------------------------------------------------------------

/// Transport used to reach a capability source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportKind {
    /// Local child process over stdio.
    Stdio,
    /// Plain HTTP request/response.
    Http,
    /// Server-sent events stream.
    Sse,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Stdio => write!(f, "stdio"),
            TransportKind::Http  => write!(f, "http"),
            TransportKind::Sse   => write!(f, "sse"),
        }
    }
}

/// Risk classification of a single tool.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ToolRisk {
    /// Read-only or informational.
    Low = 0,
    /// Touches files or the network.
    Medium = 1,
    /// Executes, deletes, or moves value.
    High = 2,
}

impl ToolRisk {
    /// Human-readable display name.
    pub fn display_name(self) -> &'static str {
        match self {
            ToolRisk::Low    => "low",
            ToolRisk::Medium => "medium",
            ToolRisk::High   => "high",
        }
    }
}

/// A tool declared by a capability source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    /// Tool name as declared by the source.
    pub name: String,
    /// Risk level declared by the source; when `None`, the registry falls
    /// back to the static name heuristic.
    pub risk: Option<ToolRisk>,
}

/// Reputation record for one capability source.
///
/// Created on registration, updated on every completed call, deleted only on
/// explicit unregister.  `trust_level` is clamped to `[0, 100]` on every
/// update; `is_trusted` is recomputed against the configured threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustRecord {
    /// Stable identifier — the registered source name.
    pub source_id: String,
    /// Display name of the source.
    pub name: String,
    /// Endpoint the source is reached at.
    pub endpoint: String,
    /// Transport used to reach the source.
    pub transport: TransportKind,
    /// Tools the source declared at registration.
    pub capabilities: Vec<Capability>,
    /// Reputation score in `[0, 100]`.
    pub trust_level: u8,
    /// Whether `trust_level` meets the configured trusted threshold.
    pub is_trusted: bool,
    /// Total completed calls.
    pub total_calls: u64,
    /// Calls approved by the human.
    pub approved_calls: u64,
    /// Calls rejected by the human.
    pub rejected_calls: u64,
    /// Unix epoch milliseconds at which the source was registered.
    pub registered_at_ms: u64,
}

// ---------------------------------------------------------------------------
// Escape hatches
// ---------------------------------------------------------------------------

/// What an allow-once token may be spent on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllowOnceScope {
    /// Matches any action kind.
    Any,
    /// Text output only.
    Output,
    /// Tool calls only.
    Tool,
}

impl AllowOnceScope {
    /// Whether a token with this scope covers `requested`.
    ///
    /// `Any` on either side matches everything.
    pub fn permits(self, requested: AllowOnceScope) -> bool {
        self == AllowOnceScope::Any || requested == AllowOnceScope::Any || self == requested
    }
}

/// A single-use bypass token for one session.
///
/// Lifecycle: granted → used | expired.  Terminal states are never reused;
/// a fresh grant is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllowOnceToken {
    /// Session the token belongs to.
    pub session_id: String,
    /// What the token may be spent on.
    pub scope: AllowOnceScope,
    /// Unix epoch milliseconds at which the token was granted.
    pub created_at_ms: u64,
    /// Optional expiry; `None` means the token never times out.
    pub expires_at_ms: Option<u64>,
    /// Set once the token has been consumed.
    pub used: bool,
    /// Operator-supplied reason for the grant.
    pub reason: Option<String>,
}

impl AllowOnceToken {
    /// Whether the token's expiry has passed at `now_ms`.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at_ms.is_some_and(|expiry| now_ms > expiry)
    }

    /// Unused and unexpired.
    pub fn is_active(&self, now_ms: u64) -> bool {
        !self.used && !self.is_expired(now_ms)
    }
}

/// Outcome of granting an allow-once token.
///
/// A grant replaces any existing token for the session (no stacking); if the
/// displaced token was still active it is returned in `replaced` so the
/// caller can surface the override instead of losing it silently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllowOnceGrant {
    /// The freshly granted token.
    pub token: AllowOnceToken,
    /// The previously active token this grant displaced, if any.
    pub replaced: Option<AllowOnceToken>,
}

/// An enforcement pause for one session (or for all sessions, under
/// [`GLOBAL_SESSION`]).
///
/// Lifecycle: active → resumed | expired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PauseRecord {
    /// Session the pause applies to.
    pub session_id: String,
    /// Unix epoch milliseconds at which the pause began.
    pub created_at_ms: u64,
    /// Optional expiry; `None` means paused until explicitly resumed.
    pub expires_at_ms: Option<u64>,
    /// Cleared by `resume`.
    pub active: bool,
    /// Operator-supplied reason for the pause.
    pub reason: Option<String>,
}

impl PauseRecord {
    /// Whether the record's expiry has passed at `now_ms`.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at_ms.is_some_and(|expiry| now_ms > expiry)
    }

    /// Active and unexpired.
    pub fn is_in_effect(&self, now_ms: u64) -> bool {
        self.active && !self.is_expired(now_ms)
    }
}

/// Result of resuming a paused session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeOutcome {
    /// The session that was resumed.
    pub session_id: String,
    /// How long enforcement was paused, in milliseconds.
    pub paused_for_ms: u64,
}

/// Persistence class of a tool-trust grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrustGrantLevel {
    /// No expiry; cleared when the session ends.
    Session,
    /// TTL-bounded, clamped to the configured maximum.
    Temporary,
    /// No expiry; survives session cleanup until explicitly revoked.
    Permanent,
}

/// A per-session (or global) trust grant for tools matching a name pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolTrustGrant {
    /// Session the grant belongs to, or [`GLOBAL_SESSION`].
    pub session_id: String,
    /// Exact tool name or a `*` wildcard pattern.
    pub tool_pattern: String,
    /// Persistence class.
    pub level: TrustGrantLevel,
    /// Unix epoch milliseconds at which the grant was recorded.
    pub created_at_ms: u64,
    /// Optional expiry; only `Temporary` grants carry one.
    pub expires_at_ms: Option<u64>,
}

impl ToolTrustGrant {
    /// Whether the grant's expiry has passed at `now_ms`.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at_ms.is_some_and(|expiry| now_ms > expiry)
    }

    /// Exact-name match (no wildcard semantics).
    pub fn matches_exact(&self, tool_name: &str) -> bool {
        self.tool_pattern == tool_name
    }

    /// Wildcard match: `*` alone matches everything, a trailing `*` matches
    /// a prefix, a leading `*` matches a suffix, and `*x*` matches a
    /// substring.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use warden_core::types::{ToolTrustGrant, TrustGrantLevel};
    ///
    /// let grant = ToolTrustGrant {
    ///     session_id:    "s-1".into(),
    ///     tool_pattern:  "fs_*".into(),
    ///     level:         TrustGrantLevel::Session,
    ///     created_at_ms: 0,
    ///     expires_at_ms: None,
    /// };
    /// assert!(grant.matches_wildcard("fs_read"));
    /// assert!(!grant.matches_wildcard("net_fetch"));
    /// ```
    pub fn matches_wildcard(&self, tool_name: &str) -> bool {
        wildcard_matches(&self.tool_pattern, tool_name)
    }
}

/// `*`-pattern matching for tool names.
fn wildcard_matches(pattern: &str, name: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    match (pattern.strip_prefix('*'), pattern.strip_suffix('*')) {
        (Some(rest), _) if rest.ends_with('*') => {
            let middle = &rest[..rest.len() - 1];
            name.contains(middle)
        }
        (Some(suffix), _) => name.ends_with(suffix),
        (_, Some(prefix)) => name.starts_with(prefix),
        _ => pattern == name,
    }
}

// ---------------------------------------------------------------------------
// Admission decisions
// ---------------------------------------------------------------------------

/// The escape mechanism that produced an allow, when one did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllowMechanism {
    /// Enforcement is paused for the session (or globally).
    Pause,
    /// A one-shot bypass token was consumed.
    AllowOnce,
    /// A tool-trust grant matched the tool.
    Trust,
}

impl AllowMechanism {
    /// Stable lowercase tag for audit details.
    pub fn tag(self) -> &'static str {
        match self {
            AllowMechanism::Pause     => "pause",
            AllowMechanism::AllowOnce => "allow_once",
            AllowMechanism::Trust     => "trust",
        }
    }
}

/// Final verdict of the admission controller for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionDecision {
    /// Whether the action may proceed.
    pub allowed: bool,
    /// The escape mechanism that decided the outcome, or `None` when the
    /// content verdict (combined with trust, for tool calls) decided.
    pub mechanism: Option<AllowMechanism>,
    /// Human-readable explanation of the outcome.
    pub reason: String,
    /// The content verdict, when the decision path evaluated one.  Escape
    /// mechanisms short-circuit validation, so this is `None` for them.
    pub validation: Option<ValidationResult>,
}

// ---------------------------------------------------------------------------
// Audit
// ---------------------------------------------------------------------------

/// What kind of event an audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEvent {
    /// An output admission decision.
    OutputCheck,
    /// A tool-call admission decision.
    ToolCheck,
    /// An allow-once token was granted.
    AllowOnceGranted,
    /// A session pause began.
    SessionPaused,
    /// A session pause ended.
    SessionResumed,
    /// A tool-trust grant was recorded.
    ToolTrusted,
    /// A tool-trust grant was revoked.
    ToolTrustRevoked,
    /// A capability source was registered.
    SourceRegistered,
    /// A capability source was unregistered.
    SourceUnregistered,
    /// A completed call was approved by the human.
    CallApproved,
    /// A completed call was rejected by the human.
    CallRejected,
    /// The rule catalog was swapped.
    CatalogReloaded,
    /// A session's escape state was cleared.
    SessionEnded,
}

/// Outcome classification of an audited event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOutcome {
    /// The action proceeded.
    Allowed,
    /// The action was stopped.
    Blocked,
    /// The action proceeded in altered form.
    Modified,
    /// The action was stopped and flagged for attention (critical risk).
    Alerted,
    /// The operation itself failed (conflict, unknown reference).
    Error,
}

/// One immutable entry in the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Monotonic identifier assigned by the log.
    pub id: String,
    /// Unix epoch milliseconds at which the entry was appended.
    pub timestamp_ms: u64,
    /// What happened.
    pub event: AuditEvent,
    /// How it ended.
    pub outcome: AuditOutcome,
    /// Session the event belongs to.
    pub session_id: String,
    /// Opaque key/value context, in insertion order.
    pub details: Vec<(String, String)>,
}

/// Filter used to narrow the results of an audit query.
///
/// All set fields must match (conjunctive).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditFilter {
    /// If set, only return entries with this event kind.
    pub event: Option<AuditEvent>,
    /// If set, only return entries with this outcome.
    pub outcome: Option<AuditOutcome>,
    /// If set, only return entries for this session.
    pub session_id: Option<String>,
    /// If set, only return entries at or after this Unix epoch millisecond.
    pub since_ms: Option<u64>,
    /// If set, only return entries at or before this Unix epoch millisecond.
    pub until_ms: Option<u64>,
    /// If set, limit the number of returned entries.
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Structured failure of an escape-hatch operation.
///
/// State conflicts carry the conflicting record so callers can surface it
/// instead of silently overwriting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EscapeError {
    /// No allow-once token exists for the session.
    NotGranted {
        /// The session that was queried.
        session_id: String,
    },
    /// The session's token was already consumed.
    AlreadyUsed {
        /// The spent token.
        token: AllowOnceToken,
    },
    /// The session's token expired before use.
    Expired {
        /// The expired token.
        token: AllowOnceToken,
    },
    /// The token's scope does not cover the requested action kind.
    ScopeMismatch {
        /// The live token.
        token: AllowOnceToken,
        /// The scope that was requested.
        requested: AllowOnceScope,
    },
    /// An active, unexpired pause already exists for the session.
    AlreadyPaused {
        /// The conflicting pause record.
        record: PauseRecord,
    },
    /// The pause expired before it was resumed.
    AlreadyExpired {
        /// The expired pause record.
        record: PauseRecord,
    },
    /// The session is not paused.
    NotPaused {
        /// The session that was queried.
        session_id: String,
    },
}

impl EscapeError {
    /// Stable lowercase error code for audit details and API surfaces.
    pub fn code(&self) -> &'static str {
        match self {
            EscapeError::NotGranted { .. }    => "not_granted",
            EscapeError::AlreadyUsed { .. }   => "already_used",
            EscapeError::Expired { .. }       => "expired",
            EscapeError::ScopeMismatch { .. } => "scope_mismatch",
            EscapeError::AlreadyPaused { .. } => "already_paused",
            EscapeError::AlreadyExpired { .. } => "already_expired",
            EscapeError::NotPaused { .. }     => "not_paused",
        }
    }
}

impl fmt::Display for EscapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EscapeError::NotGranted { session_id } =>
                write!(f, "no allow-once token granted for session '{}'", session_id),
            EscapeError::AlreadyUsed { token } =>
                write!(f, "allow-once token for session '{}' was already used", token.session_id),
            EscapeError::Expired { token } =>
                write!(f, "allow-once token for session '{}' expired before use", token.session_id),
            EscapeError::ScopeMismatch { token, .. } =>
                write!(f, "allow-once token for session '{}' does not cover the requested scope", token.session_id),
            EscapeError::AlreadyPaused { record } =>
                write!(f, "session '{}' is already paused", record.session_id),
            EscapeError::AlreadyExpired { record } =>
                write!(f, "pause for session '{}' already expired", record.session_id),
            EscapeError::NotPaused { session_id } =>
                write!(f, "session '{}' is not paused", session_id),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EscapeError {}

/// Failure of a trust-registry operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryError {
    /// The source id does not refer to a registered source.
    UnknownSource {
        /// The id that failed to resolve.
        source_id: String,
    },
    /// A source with this id is already registered.
    DuplicateSource {
        /// The id that collided.
        source_id: String,
    },
}

impl RegistryError {
    /// Stable lowercase error code for audit details and API surfaces.
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::UnknownSource { .. }   => "unknown_source",
            RegistryError::DuplicateSource { .. } => "duplicate_source",
        }
    }
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::UnknownSource { source_id } =>
                write!(f, "no capability source registered under '{}'", source_id),
            RegistryError::DuplicateSource { source_id } =>
                write!(f, "capability source '{}' is already registered", source_id),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RegistryError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_patterns() {
        assert!(wildcard_matches("*", "anything"));
        assert!(wildcard_matches("exec_shell", "exec_shell"));
        assert!(!wildcard_matches("exec_shell", "exec_shell_2"));
        assert!(wildcard_matches("fs_*", "fs_read"));
        assert!(wildcard_matches("*_read", "fs_read"));
        assert!(wildcard_matches("*search*", "web_search_v2"));
        assert!(!wildcard_matches("fs_*", "net_fetch"));
    }

    #[test]
    fn allow_once_scope_matrix() {
        use AllowOnceScope::*;
        assert!(Any.permits(Output));
        assert!(Any.permits(Tool));
        assert!(Output.permits(Output));
        assert!(!Output.permits(Tool));
        assert!(!Tool.permits(Output));
    }

    #[test]
    fn expiry_is_strict_greater() {
        let token = AllowOnceToken {
            session_id:    "s".into(),
            scope:         AllowOnceScope::Any,
            created_at_ms: 0,
            expires_at_ms: Some(1_000),
            used:          false,
            reason:        None,
        };
        assert!(!token.is_expired(1_000));
        assert!(token.is_expired(1_001));
    }
}
