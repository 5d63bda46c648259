// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Veilport Systems

//! Crate-internal wall clock.
//!
//! In `std` mode this delegates to [`std::time::SystemTime`].  In `no_std`
//! mode it returns `0` — callers that need expiry semantics there must use
//! the `*_until` variants that take absolute timestamps.

/// Return current Unix epoch milliseconds.
pub(crate) fn current_time_ms() -> u64 {
    #[cfg(feature = "std")]
    {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
    #[cfg(not(feature = "std"))]
    {
        0
    }
}
