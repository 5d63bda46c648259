// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Veilport Systems

//! One-shot bypass tokens.
//!
//! [`AllowOnceManager`] exposes three operations only:
//!
//! * [`grant`](AllowOnceManager::grant)     — create a token, replacing any existing one
//! * [`consume`](AllowOnceManager::consume) — spend the token, exactly once
//! * [`peek`](AllowOnceManager::peek)       — inspect the active token without spending it
//!
//! Token lifecycle: granted → used | expired.  Terminal states are never
//! reused — a fresh grant is required.  Exactly one token exists per session
//! at any time.
//!
//! Expiry is enforced at read time on every call; the periodic
//! [`purge_expired`](AllowOnceManager::purge_expired) sweep only reclaims
//! memory and is never needed for correctness.

use alloc::string::String;
use hashbrown::HashMap;
use log::debug;

use crate::clock::current_time_ms;
use crate::types::{AllowOnceGrant, AllowOnceScope, AllowOnceToken, EscapeError};

/// Manages single-use bypass tokens, one per session.
///
/// # Examples
///
/// ```rust
/// use warden_core::allow_once::AllowOnceManager;
/// use warden_core::types::AllowOnceScope;
///
/// let mut manager = AllowOnceManager::new();
/// manager.grant("session-1", AllowOnceScope::Any, None, Some("operator approved"));
///
/// assert!(manager.consume("session-1", AllowOnceScope::Output, "send reply").is_ok());
///
/// // The token is spent; a second consume fails.
/// let err = manager.consume("session-1", AllowOnceScope::Output, "send reply").unwrap_err();
/// assert_eq!(err.code(), "already_used");
/// ```
#[derive(Debug, Default)]
pub struct AllowOnceManager {
    tokens: HashMap<String, AllowOnceToken>,
}

impl AllowOnceManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant a token for `session_id`, valid for `ttl_ms` (or indefinitely
    /// when `None`).
    ///
    /// A grant always replaces the session's existing token — there is no
    /// stacking.  When the displaced token was still active it is returned
    /// in [`AllowOnceGrant::replaced`] so the caller can surface the
    /// override rather than lose it silently.
    pub fn grant(
        &mut self,
        session_id: &str,
        scope: AllowOnceScope,
        ttl_ms: Option<u64>,
        reason: Option<&str>,
    ) -> AllowOnceGrant {
        let now = current_time_ms();
        self.grant_until(session_id, scope, ttl_ms.map(|ttl| now + ttl), reason)
    }

    /// Grant a token with an absolute expiry instead of a TTL.
    pub fn grant_until(
        &mut self,
        session_id: &str,
        scope: AllowOnceScope,
        expires_at_ms: Option<u64>,
        reason: Option<&str>,
    ) -> AllowOnceGrant {
        let now = current_time_ms();
        let token = AllowOnceToken {
            session_id: session_id.into(),
            scope,
            created_at_ms: now,
            expires_at_ms,
            used: false,
            reason: reason.map(Into::into),
        };
        let replaced = self
            .tokens
            .insert(session_id.into(), token.clone())
            .filter(|previous| previous.is_active(now));
        debug!(
            "allow-once granted for session '{}' (replaced active token: {})",
            session_id,
            replaced.is_some()
        );
        AllowOnceGrant { token, replaced }
    }

    /// Spend the session's token for an action of kind `requested`.
    ///
    /// Succeeds only when a token exists, is unused, is unexpired, and its
    /// scope covers `requested` (`Any` covers everything).  Each failure is
    /// structured and carries the token in question.  `description` says
    /// what the bypass was spent on; it is logged and surfaced in audit
    /// details by the engine.
    pub fn consume(
        &mut self,
        session_id: &str,
        requested: AllowOnceScope,
        description: &str,
    ) -> Result<AllowOnceToken, EscapeError> {
        let now = current_time_ms();
        let token = match self.tokens.get_mut(session_id) {
            Some(token) => token,
            None => {
                return Err(EscapeError::NotGranted {
                    session_id: session_id.into(),
                })
            }
        };

        if token.used {
            return Err(EscapeError::AlreadyUsed { token: token.clone() });
        }
        if token.is_expired(now) {
            return Err(EscapeError::Expired { token: token.clone() });
        }
        if !token.scope.permits(requested) {
            return Err(EscapeError::ScopeMismatch {
                token: token.clone(),
                requested,
            });
        }

        token.used = true;
        debug!(
            "allow-once consumed for session '{}': {}",
            session_id, description
        );
        Ok(token.clone())
    }

    /// The session's currently active token, if any.
    ///
    /// Used and expired tokens are reported as absent, regardless of whether
    /// the sweep has reclaimed them yet.
    pub fn peek(&self, session_id: &str) -> Option<AllowOnceToken> {
        let now = current_time_ms();
        self.tokens
            .get(session_id)
            .filter(|token| token.is_active(now))
            .cloned()
    }

    /// Remove used and expired tokens.  Advisory only — every read re-checks
    /// expiry itself.  Returns the number of tokens removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = current_time_ms();
        let before = self.tokens.len();
        self.tokens.retain(|_, token| token.is_active(now));
        before - self.tokens.len()
    }

    /// Drop the session's token, whatever its state.
    pub fn clear_session(&mut self, session_id: &str) {
        self.tokens.remove(session_id);
    }

    /// Number of tracked tokens, including spent ones not yet swept.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether no tokens are tracked.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_use_even_before_expiry() {
        let mut manager = AllowOnceManager::new();
        manager.grant("s-1", AllowOnceScope::Any, Some(60_000), None);

        assert!(manager.consume("s-1", AllowOnceScope::Tool, "call tool").is_ok());
        let err = manager.consume("s-1", AllowOnceScope::Tool, "call tool").unwrap_err();
        assert!(matches!(err, EscapeError::AlreadyUsed { .. }));
    }

    #[test]
    fn expired_token_cannot_be_consumed() {
        let mut manager = AllowOnceManager::new();
        // Absolute expiry in the past stands in for waiting out a TTL.
        manager.grant_until("s-1", AllowOnceScope::Any, Some(1), None);

        let err = manager.consume("s-1", AllowOnceScope::Output, "send").unwrap_err();
        assert!(matches!(err, EscapeError::Expired { .. }));
    }

    #[test]
    fn scope_must_match() {
        let mut manager = AllowOnceManager::new();
        manager.grant("s-1", AllowOnceScope::Output, None, None);

        let err = manager.consume("s-1", AllowOnceScope::Tool, "call").unwrap_err();
        assert!(matches!(err, EscapeError::ScopeMismatch { .. }));
        // The mismatch did not spend the token.
        assert!(manager.consume("s-1", AllowOnceScope::Output, "send").is_ok());
    }

    #[test]
    fn missing_token_is_not_granted() {
        let mut manager = AllowOnceManager::new();
        let err = manager.consume("s-1", AllowOnceScope::Any, "x").unwrap_err();
        assert_eq!(err.code(), "not_granted");
    }

    #[test]
    fn grant_replaces_and_reports_active_token() {
        let mut manager = AllowOnceManager::new();
        manager.grant("s-1", AllowOnceScope::Output, None, None);
        let second = manager.grant("s-1", AllowOnceScope::Tool, None, None);
        assert!(second.replaced.is_some());
        assert_eq!(second.replaced.unwrap().scope, AllowOnceScope::Output);

        // Replacing a spent token reports nothing.
        manager.consume("s-1", AllowOnceScope::Tool, "x").unwrap();
        let third = manager.grant("s-1", AllowOnceScope::Any, None, None);
        assert!(third.replaced.is_none());
    }

    #[test]
    fn purge_drops_spent_and_expired_tokens() {
        let mut manager = AllowOnceManager::new();
        manager.grant("s-live", AllowOnceScope::Any, None, None);
        manager.grant("s-spent", AllowOnceScope::Any, None, None);
        manager.consume("s-spent", AllowOnceScope::Any, "x").unwrap();
        manager.grant_until("s-expired", AllowOnceScope::Any, Some(1), None);

        assert_eq!(manager.purge_expired(), 2);
        assert_eq!(manager.len(), 1);
        assert!(manager.peek("s-live").is_some());
    }
}
