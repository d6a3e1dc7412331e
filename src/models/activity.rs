// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Workout time window.

use crate::time_utils::rfc3339_to_epoch_ms;

/// The interval `[start, start + elapsed]` during which a workout took place.
///
/// Fetched from Strava on demand and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityWindow {
    pub activity_id: u64,
    pub athlete_id: u64,
    /// Start time (Unix epoch milliseconds)
    pub start_time_ms: i64,
    /// End time (Unix epoch milliseconds)
    pub end_time_ms: i64,
}

impl ActivityWindow {
    /// Build a window from Strava's `start_date` and `elapsed_time` (seconds).
    ///
    /// Returns `None` if `start_date` is not a valid RFC3339 timestamp.
    pub fn from_start_and_elapsed(
        activity_id: u64,
        athlete_id: u64,
        start_date: &str,
        elapsed_secs: u64,
    ) -> Option<Self> {
        let start_time_ms = rfc3339_to_epoch_ms(start_date)?;
        let elapsed_ms = i64::try_from(elapsed_secs).ok()?.checked_mul(1000)?;

        Some(Self {
            activity_id,
            athlete_id,
            start_time_ms,
            end_time_ms: start_time_ms.checked_add(elapsed_ms)?,
        })
    }

    pub fn duration_ms(&self) -> i64 {
        self.end_time_ms - self.start_time_ms
    }
}
