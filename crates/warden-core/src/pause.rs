// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Veilport Systems

//! Enforcement pause.
//!
//! [`PauseManager`] exposes three operations only:
//!
//! * [`pause`](PauseManager::pause)         — suspend enforcement for a session
//! * [`resume`](PauseManager::resume)       — end the pause, reporting its duration
//! * [`is_paused`](PauseManager::is_paused) — query, including the global record
//!
//! Record lifecycle: active → resumed | expired.  A session is paused when
//! its own record **or** the reserved [`GLOBAL_SESSION`] record is active
//! and unexpired — pausing the global session pauses everything.
//!
//! Expiry is enforced at read time on every call; the periodic
//! [`purge_expired`](PauseManager::purge_expired) sweep only reclaims memory.

use alloc::string::String;
use hashbrown::HashMap;
use log::{debug, warn};

use crate::clock::current_time_ms;
use crate::types::{EscapeError, PauseRecord, ResumeOutcome, GLOBAL_SESSION};

/// Manages per-session (and global) enforcement pauses.
///
/// # Examples
///
/// ```rust
/// use warden_core::pause::PauseManager;
///
/// let mut manager = PauseManager::new();
/// assert!(!manager.is_paused("session-1"));
///
/// manager.pause("session-1", None, Some("operator reviewing")).unwrap();
/// assert!(manager.is_paused("session-1"));
///
/// let outcome = manager.resume("session-1").unwrap();
/// assert_eq!(outcome.session_id, "session-1");
/// assert!(!manager.is_paused("session-1"));
/// ```
#[derive(Debug, Default)]
pub struct PauseManager {
    records: HashMap<String, PauseRecord>,
}

impl PauseManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Suspend enforcement for `session_id`, for `ttl_ms` (or until resumed
    /// when `None`).
    ///
    /// Pass [`GLOBAL_SESSION`] to pause every session at once.
    ///
    /// # Errors
    ///
    /// [`EscapeError::AlreadyPaused`] — with the conflicting record attached
    /// — when an active, unexpired pause already exists.  Resumed and
    /// expired records do not conflict; they are replaced.
    pub fn pause(
        &mut self,
        session_id: &str,
        ttl_ms: Option<u64>,
        reason: Option<&str>,
    ) -> Result<PauseRecord, EscapeError> {
        let now = current_time_ms();
        self.pause_until(session_id, ttl_ms.map(|ttl| now + ttl), reason)
    }

    /// Suspend enforcement with an absolute expiry instead of a TTL.
    pub fn pause_until(
        &mut self,
        session_id: &str,
        expires_at_ms: Option<u64>,
        reason: Option<&str>,
    ) -> Result<PauseRecord, EscapeError> {
        let now = current_time_ms();
        if let Some(existing) = self.records.get(session_id) {
            if existing.is_in_effect(now) {
                return Err(EscapeError::AlreadyPaused {
                    record: existing.clone(),
                });
            }
        }

        let record = PauseRecord {
            session_id: session_id.into(),
            created_at_ms: now,
            expires_at_ms,
            active: true,
            reason: reason.map(Into::into),
        };
        self.records.insert(session_id.into(), record.clone());
        warn!(
            "enforcement paused for session '{}' (expires: {:?})",
            session_id, expires_at_ms
        );
        Ok(record)
    }

    /// End the session's pause.
    ///
    /// # Errors
    ///
    /// * [`EscapeError::NotPaused`] — no record, or the record was already
    ///   resumed.
    /// * [`EscapeError::AlreadyExpired`] — the record timed out before it
    ///   was resumed; the elapsed duration is no longer meaningful.
    pub fn resume(&mut self, session_id: &str) -> Result<ResumeOutcome, EscapeError> {
        let now = current_time_ms();
        let record = match self.records.get_mut(session_id) {
            Some(record) if record.active => record,
            _ => {
                return Err(EscapeError::NotPaused {
                    session_id: session_id.into(),
                })
            }
        };

        if record.is_expired(now) {
            return Err(EscapeError::AlreadyExpired {
                record: record.clone(),
            });
        }

        record.active = false;
        let outcome = ResumeOutcome {
            session_id: session_id.into(),
            paused_for_ms: now.saturating_sub(record.created_at_ms),
        };
        debug!(
            "enforcement resumed for session '{}' after {}ms",
            session_id, outcome.paused_for_ms
        );
        Ok(outcome)
    }

    /// Whether enforcement is paused for `session_id`.
    ///
    /// Checks the session's own record and the reserved global record;
    /// either being active and unexpired pauses the session.
    pub fn is_paused(&self, session_id: &str) -> bool {
        let now = current_time_ms();
        let in_effect = |id: &str| {
            self.records
                .get(id)
                .is_some_and(|record| record.is_in_effect(now))
        };
        in_effect(session_id) || in_effect(GLOBAL_SESSION)
    }

    /// The record currently pausing `session_id`, if any.
    ///
    /// Prefers the session's own record over the global one.
    pub fn current(&self, session_id: &str) -> Option<PauseRecord> {
        let now = current_time_ms();
        let pick = |id: &str| {
            self.records
                .get(id)
                .filter(|record| record.is_in_effect(now))
                .cloned()
        };
        pick(session_id).or_else(|| pick(GLOBAL_SESSION))
    }

    /// Remove resumed and expired records.  Advisory only — every read
    /// re-checks expiry itself.  Returns the number of records removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = current_time_ms();
        let before = self.records.len();
        self.records.retain(|_, record| record.is_in_effect(now));
        before - self.records.len()
    }

    /// Drop the session's record, whatever its state.
    pub fn clear_session(&mut self, session_id: &str) {
        self.records.remove(session_id);
    }

    /// Number of tracked records, including ended ones not yet swept.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no records are tracked.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_while_paused_is_a_conflict() {
        let mut manager = PauseManager::new();
        manager.pause("s-1", None, None).unwrap();

        let err = manager.pause("s-1", None, None).unwrap_err();
        assert_eq!(err.code(), "already_paused");
        assert!(matches!(err, EscapeError::AlreadyPaused { .. }));
    }

    #[test]
    fn resume_reports_elapsed_duration() {
        let mut manager = PauseManager::new();
        manager.pause("s-1", None, None).unwrap();
        let outcome = manager.resume("s-1").unwrap();
        // Wall-clock elapsed; just shape-check it.
        assert_eq!(outcome.session_id, "s-1");

        // Resuming again: the record is no longer active.
        let err = manager.resume("s-1").unwrap_err();
        assert_eq!(err.code(), "not_paused");
    }

    #[test]
    fn resume_after_expiry_fails() {
        let mut manager = PauseManager::new();
        manager.pause_until("s-1", Some(1), None).unwrap();

        let err = manager.resume("s-1").unwrap_err();
        assert!(matches!(err, EscapeError::AlreadyExpired { .. }));
        // The expired record also no longer pauses the session.
        assert!(!manager.is_paused("s-1"));
    }

    #[test]
    fn global_pause_covers_every_session() {
        let mut manager = PauseManager::new();
        manager.pause(GLOBAL_SESSION, None, Some("incident response")).unwrap();

        assert!(manager.is_paused("s-1"));
        assert!(manager.is_paused("s-2"));
        assert_eq!(manager.current("s-1").unwrap().session_id, GLOBAL_SESSION);

        manager.resume(GLOBAL_SESSION).unwrap();
        assert!(!manager.is_paused("s-1"));
    }

    #[test]
    fn expired_pause_can_be_replaced() {
        let mut manager = PauseManager::new();
        manager.pause_until("s-1", Some(1), None).unwrap();
        // The expired record does not conflict with a new pause.
        assert!(manager.pause("s-1", None, None).is_ok());
        assert!(manager.is_paused("s-1"));
    }

    #[test]
    fn purge_drops_ended_records() {
        let mut manager = PauseManager::new();
        manager.pause("s-live", None, None).unwrap();
        manager.pause("s-resumed", None, None).unwrap();
        manager.resume("s-resumed").unwrap();
        manager.pause_until("s-expired", Some(1), None).unwrap();

        assert_eq!(manager.purge_expired(), 2);
        assert_eq!(manager.len(), 1);
        assert!(manager.is_paused("s-live"));
    }
}
