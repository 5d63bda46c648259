// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Veilport Systems

//! Tool-level trust overrides.
//!
//! [`ToolTrustManager`] records per-session grants that let a tool (or a
//! `*`-pattern family of tools) bypass the content verdict.  Three
//! persistence classes exist:
//!
//! * [`TrustGrantLevel::Session`]   — no expiry, cleared with the session
//! * [`TrustGrantLevel::Temporary`] — TTL-bounded, clamped to the configured max
//! * [`TrustGrantLevel::Permanent`] — survives session cleanup until revoked
//!
//! Lookups check exact matches before wildcard matches, in the session's own
//! list first and then in the reserved [`GLOBAL_SESSION`] list.  Expiry is
//! enforced at read time; the sweep only reclaims memory.
//!
//! A session grant here is independent of the trust registry's source-level
//! reputation score — revoking one never touches the other.

use alloc::string::String;
use alloc::vec::Vec;
use hashbrown::HashMap;
use log::debug;

use crate::clock::current_time_ms;
use crate::config::Config;
use crate::types::{ToolTrustGrant, TrustGrantLevel, GLOBAL_SESSION};

/// Manages tool-trust grants, keyed by session.
///
/// # Examples
///
/// ```rust
/// use warden_core::config::Config;
/// use warden_core::overrides::ToolTrustManager;
/// use warden_core::types::TrustGrantLevel;
///
/// let mut manager = ToolTrustManager::new(Config::default());
/// manager.trust("session-1", "fs_*", TrustGrantLevel::Session, None);
///
/// assert!(manager.lookup("session-1", "fs_read").is_some());
/// assert!(manager.lookup("session-1", "net_fetch").is_none());
/// assert!(manager.lookup("session-2", "fs_read").is_none());
/// ```
#[derive(Debug)]
pub struct ToolTrustManager {
    config: Config,
    grants: HashMap<String, Vec<ToolTrustGrant>>,
}

impl ToolTrustManager {
    /// Create an empty manager.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            grants: HashMap::new(),
        }
    }

    /// Record a trust grant for tools matching `tool_pattern`.
    ///
    /// A `Temporary` grant's TTL defaults to, and is clamped by,
    /// `Config::max_temporary_trust_ttl_ms`; `Session` and `Permanent`
    /// grants ignore `ttl_ms`.  Re-granting an existing pattern replaces the
    /// previous grant.  Pass [`GLOBAL_SESSION`] to grant across all
    /// sessions.
    pub fn trust(
        &mut self,
        session_id: &str,
        tool_pattern: &str,
        level: TrustGrantLevel,
        ttl_ms: Option<u64>,
    ) -> ToolTrustGrant {
        let now = current_time_ms();
        let expires_at_ms = match level {
            TrustGrantLevel::Temporary => {
                let max = self.config.max_temporary_trust_ttl_ms;
                let ttl = ttl_ms.unwrap_or(max).min(max);
                Some(now + ttl)
            }
            TrustGrantLevel::Session | TrustGrantLevel::Permanent => None,
        };

        let grant = ToolTrustGrant {
            session_id: session_id.into(),
            tool_pattern: tool_pattern.into(),
            level,
            created_at_ms: now,
            expires_at_ms,
        };

        let list = self.grants.entry(session_id.into()).or_default();
        list.retain(|existing| existing.tool_pattern != tool_pattern);
        list.push(grant.clone());
        debug!(
            "tool trust granted: session '{}', pattern '{}', level {:?}",
            session_id, tool_pattern, level
        );
        grant
    }

    /// Find the grant covering `tool_name` for `session_id`, if any.
    ///
    /// Match order: session exact, session wildcard, global exact, global
    /// wildcard.  Expired grants never match, regardless of sweep timing.
    pub fn lookup(&self, session_id: &str, tool_name: &str) -> Option<ToolTrustGrant> {
        let now = current_time_ms();
        let search = |id: &str| -> Option<ToolTrustGrant> {
            let list = self.grants.get(id)?;
            let live = || list.iter().filter(|grant| !grant.is_expired(now));
            live()
                .find(|grant| grant.matches_exact(tool_name))
                .or_else(|| live().find(|grant| grant.matches_wildcard(tool_name)))
                .cloned()
        };
        search(session_id).or_else(|| search(GLOBAL_SESSION))
    }

    /// Remove the grant for `tool_pattern` in `session_id`.
    ///
    /// Returns `true` when a grant was removed.
    pub fn revoke(&mut self, session_id: &str, tool_pattern: &str) -> bool {
        let Some(list) = self.grants.get_mut(session_id) else {
            return false;
        };
        let before = list.len();
        list.retain(|grant| grant.tool_pattern != tool_pattern);
        let removed = list.len() < before;
        if removed {
            debug!(
                "tool trust revoked: session '{}', pattern '{}'",
                session_id, tool_pattern
            );
        }
        removed
    }

    /// Drop the session's grants, keeping `Permanent` ones.
    pub fn clear_session(&mut self, session_id: &str) {
        if let Some(list) = self.grants.get_mut(session_id) {
            list.retain(|grant| grant.level == TrustGrantLevel::Permanent);
            if list.is_empty() {
                self.grants.remove(session_id);
            }
        }
    }

    /// Remove expired grants.  Advisory only — every lookup re-checks expiry
    /// itself.  Returns the number of grants removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = current_time_ms();
        let mut removed = 0;
        self.grants.retain(|_, list| {
            let before = list.len();
            list.retain(|grant| !grant.is_expired(now));
            removed += before - list.len();
            !list.is_empty()
        });
        removed
    }

    /// All live grants for a session, for inspection surfaces.
    pub fn grants_for(&self, session_id: &str) -> Vec<ToolTrustGrant> {
        let now = current_time_ms();
        self.grants
            .get(session_id)
            .map(|list| {
                list.iter()
                    .filter(|grant| !grant.is_expired(now))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ToolTrustManager {
        ToolTrustManager::new(Config::default())
    }

    #[test]
    fn exact_match_wins_over_wildcard() {
        let mut manager = manager();
        manager.trust("s-1", "fs_*", TrustGrantLevel::Session, None);
        manager.trust("s-1", "fs_read", TrustGrantLevel::Permanent, None);

        let hit = manager.lookup("s-1", "fs_read").unwrap();
        assert_eq!(hit.tool_pattern, "fs_read");
        assert_eq!(hit.level, TrustGrantLevel::Permanent);
    }

    #[test]
    fn global_grants_cover_every_session() {
        let mut manager = manager();
        manager.trust(GLOBAL_SESSION, "search_*", TrustGrantLevel::Permanent, None);

        assert!(manager.lookup("s-1", "search_web").is_some());
        assert!(manager.lookup("s-2", "search_docs").is_some());
        assert!(manager.lookup("s-1", "exec_shell").is_none());
    }

    #[test]
    fn session_grant_wins_over_global() {
        let mut manager = manager();
        manager.trust(GLOBAL_SESSION, "fs_read", TrustGrantLevel::Permanent, None);
        manager.trust("s-1", "fs_read", TrustGrantLevel::Session, None);

        let hit = manager.lookup("s-1", "fs_read").unwrap();
        assert_eq!(hit.session_id, "s-1");
    }

    #[test]
    fn temporary_ttl_is_clamped() {
        let config = Config {
            max_temporary_trust_ttl_ms: 10_000,
            ..Config::default()
        };
        let mut manager = ToolTrustManager::new(config);
        let grant = manager.trust("s-1", "fs_read", TrustGrantLevel::Temporary, Some(999_999_999));
        let ttl = grant.expires_at_ms.unwrap() - grant.created_at_ms;
        assert_eq!(ttl, 10_000);
    }

    #[test]
    fn expired_grant_never_matches() {
        let mut manager = manager();
        let mut grant = manager.trust("s-1", "fs_read", TrustGrantLevel::Temporary, None);
        // Rewrite the stored expiry into the past, standing in for elapsed time.
        grant.expires_at_ms = Some(1);
        manager.grants.get_mut("s-1").unwrap()[0] = grant;

        assert!(manager.lookup("s-1", "fs_read").is_none());
        assert_eq!(manager.purge_expired(), 1);
    }

    #[test]
    fn clear_session_keeps_permanent_grants() {
        let mut manager = manager();
        manager.trust("s-1", "fs_read", TrustGrantLevel::Session, None);
        manager.trust("s-1", "deploy_prod", TrustGrantLevel::Permanent, None);
        manager.trust("s-1", "web_search", TrustGrantLevel::Temporary, None);

        manager.clear_session("s-1");

        assert!(manager.lookup("s-1", "fs_read").is_none());
        assert!(manager.lookup("s-1", "web_search").is_none());
        assert!(manager.lookup("s-1", "deploy_prod").is_some());
    }

    #[test]
    fn revoke_removes_the_pattern() {
        let mut manager = manager();
        manager.trust("s-1", "fs_*", TrustGrantLevel::Session, None);
        assert!(manager.revoke("s-1", "fs_*"));
        assert!(!manager.revoke("s-1", "fs_*"));
        assert!(manager.lookup("s-1", "fs_read").is_none());
    }
}
