// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Veilport Systems

//! Audit log management.
//!
//! [`AuditLog`] is an append-only, bounded record of every admission
//! decision and override.  Two bounds apply, both from [`Config`]: a maximum
//! entry count and a maximum entry age.  When either is exceeded the oldest
//! entries are evicted first.  Writers only ever append; eviction removes
//! from the head — a mutex-protected deque is all the concurrency story the
//! log needs.
//!
//! The log is **recording only** — there is no anomaly detection and no
//! alert delivery.  Queries filter conjunctively and return entries in
//! append order, oldest first.

use alloc::collections::VecDeque;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::clock::current_time_ms;
use crate::config::Config;
use crate::types::{AuditEntry, AuditEvent, AuditFilter, AuditOutcome};

/// Bounded append-only log of admission decisions.
///
/// # Examples
///
/// ```rust
/// use warden_core::audit::AuditLog;
/// use warden_core::config::Config;
/// use warden_core::types::{AuditEvent, AuditFilter, AuditOutcome};
///
/// let mut log = AuditLog::new(&Config::default());
/// log.append(
///     AuditEvent::OutputCheck,
///     AuditOutcome::Allowed,
///     "session-1",
///     vec![("risk".into(), "low".into())],
/// );
///
/// let entries = log.query(&AuditFilter::default());
/// assert_eq!(entries.len(), 1);
/// assert_eq!(entries[0].session_id, "session-1");
/// ```
#[derive(Debug)]
pub struct AuditLog {
    entries: VecDeque<AuditEntry>,
    next_seq: u64,
    max_entries: usize,
    max_age_ms: u64,
}

impl AuditLog {
    /// Create an empty log bounded by the config's audit limits.
    pub fn new(config: &Config) -> Self {
        Self {
            entries: VecDeque::new(),
            next_seq: 0,
            max_entries: config.audit_max_entries,
            max_age_ms: config.audit_max_age_ms,
        }
    }

    /// Append an entry stamped with the current time.
    ///
    /// Returns the assigned entry id.
    pub fn append(
        &mut self,
        event: AuditEvent,
        outcome: AuditOutcome,
        session_id: &str,
        details: Vec<(String, String)>,
    ) -> String {
        self.append_at(current_time_ms(), event, outcome, session_id, details)
    }

    /// Append an entry with an explicit timestamp.
    ///
    /// Exists for replay: importing decisions recorded elsewhere must keep
    /// their original timestamps so age-based eviction stays meaningful.
    pub fn append_at(
        &mut self,
        timestamp_ms: u64,
        event: AuditEvent,
        outcome: AuditOutcome,
        session_id: &str,
        details: Vec<(String, String)>,
    ) -> String {
        let id = format!("audit-{:08}", self.next_seq);
        self.next_seq += 1;
        self.entries.push_back(AuditEntry {
            id: id.clone(),
            timestamp_ms,
            event,
            outcome,
            session_id: session_id.into(),
            details,
        });
        self.evict(timestamp_ms);
        id
    }

    /// Return all entries that satisfy `filter`, oldest first.
    ///
    /// All set filter fields must match.  `limit` truncates from the front
    /// of the matching set.
    pub fn query(&self, filter: &AuditFilter) -> Vec<AuditEntry> {
        self.entries
            .iter()
            .filter(|entry| {
                if let Some(event) = filter.event {
                    if entry.event != event {
                        return false;
                    }
                }
                if let Some(outcome) = filter.outcome {
                    if entry.outcome != outcome {
                        return false;
                    }
                }
                if let Some(ref session_id) = filter.session_id {
                    if &entry.session_id != session_id {
                        return false;
                    }
                }
                if let Some(since_ms) = filter.since_ms {
                    if entry.timestamp_ms < since_ms {
                        return false;
                    }
                }
                if let Some(until_ms) = filter.until_ms {
                    if entry.timestamp_ms > until_ms {
                        return false;
                    }
                }
                true
            })
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    /// Evict entries that outlived the age bound.  Advisory when called from
    /// the sweep — appends evict on their own.
    pub fn purge_aged(&mut self) -> usize {
        let before = self.entries.len();
        self.evict(current_time_ms());
        before - self.entries.len()
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop oldest entries until both bounds hold.
    fn evict(&mut self, now_ms: u64) {
        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
        let cutoff = now_ms.saturating_sub(self.max_age_ms);
        while self
            .entries
            .front()
            .is_some_and(|entry| entry.timestamp_ms < cutoff)
        {
            self.entries.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn log_with(max_entries: usize, max_age_ms: u64) -> AuditLog {
        AuditLog::new(&Config {
            audit_max_entries: max_entries,
            audit_max_age_ms: max_age_ms,
            ..Config::default()
        })
    }

    #[test]
    fn count_bound_evicts_oldest_first() {
        let mut log = log_with(3, u64::MAX / 2);
        for index in 0..5 {
            log.append_at(
                1_000 + index,
                AuditEvent::OutputCheck,
                AuditOutcome::Allowed,
                "s-1",
                vec![],
            );
        }
        assert_eq!(log.len(), 3);
        let entries = log.query(&AuditFilter::default());
        assert_eq!(entries[0].id, "audit-00000002");
        assert_eq!(entries[2].id, "audit-00000004");
    }

    #[test]
    fn age_bound_evicts_stale_entries() {
        let mut log = log_with(100, 1_000);
        log.append_at(1_000, AuditEvent::OutputCheck, AuditOutcome::Allowed, "s-1", vec![]);
        log.append_at(1_500, AuditEvent::OutputCheck, AuditOutcome::Blocked, "s-1", vec![]);
        // This append's timestamp pushes the first entry past the age bound.
        log.append_at(2_100, AuditEvent::ToolCheck, AuditOutcome::Allowed, "s-1", vec![]);

        let entries = log.query(&AuditFilter::default());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].timestamp_ms, 1_500);
    }

    #[test]
    fn filters_are_conjunctive() {
        let mut log = log_with(100, u64::MAX / 2);
        log.append_at(10, AuditEvent::OutputCheck, AuditOutcome::Allowed, "s-1", vec![]);
        log.append_at(20, AuditEvent::OutputCheck, AuditOutcome::Blocked, "s-1", vec![]);
        log.append_at(30, AuditEvent::ToolCheck, AuditOutcome::Blocked, "s-2", vec![]);
        log.append_at(40, AuditEvent::ToolCheck, AuditOutcome::Blocked, "s-1", vec![]);

        let entries = log.query(&AuditFilter {
            outcome: Some(AuditOutcome::Blocked),
            session_id: Some("s-1".into()),
            since_ms: Some(15),
            ..AuditFilter::default()
        });
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|entry| entry.session_id == "s-1"));
        assert!(entries.iter().all(|entry| entry.outcome == AuditOutcome::Blocked));
    }

    #[test]
    fn limit_truncates_matches() {
        let mut log = log_with(100, u64::MAX / 2);
        for index in 0..10 {
            log.append_at(
                index,
                AuditEvent::OutputCheck,
                AuditOutcome::Allowed,
                "s-1",
                vec![],
            );
        }
        let entries = log.query(&AuditFilter {
            limit: Some(4),
            ..AuditFilter::default()
        });
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].timestamp_ms, 0);
    }

    #[test]
    fn entries_keep_append_order() {
        let mut log = log_with(100, u64::MAX / 2);
        log.append(AuditEvent::SessionPaused, AuditOutcome::Allowed, "s-1", vec![]);
        log.append(AuditEvent::SessionResumed, AuditOutcome::Allowed, "s-1", vec![]);
        let entries = log.query(&AuditFilter::default());
        assert_eq!(entries[0].event, AuditEvent::SessionPaused);
        assert_eq!(entries[1].event, AuditEvent::SessionResumed);
    }
}
