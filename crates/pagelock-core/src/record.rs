//! The persisted timer record and its validation.
//!
//! A `TimerRecord` is the single unit of persisted state. It is written as a
//! JSON object with camelCase keys, one record per tracked timer:
//!
//! ```text
//! { startTime: number(ms epoch), duration: number(ms), isActive: bool,
//!   isExpired: bool, remainingTime: number(ms), savedAt: number(ms epoch),
//!   schemaVersion: string }
//! ```
//!
//! Validation is deliberately paranoid: a record that fails any check is
//! discarded and the countdown starts fresh, never propagated as an error
//! to the host page.

use serde::{Deserialize, Serialize};

use crate::error::RecordError;

/// Forward-compatibility tag written into every saved record.
pub const SCHEMA_VERSION: &str = "1";

/// Records whose start lies further in the past are rejected (24 hours).
pub const MAX_RECORD_AGE_MS: u64 = 24 * 60 * 60 * 1000;

/// Tolerated forward clock skew for `startTime` and save ordering (5 minutes).
pub const CLOCK_SKEW_TOLERANCE_MS: u64 = 5 * 60 * 1000;

/// Sane duration bounds: 1 minute to 24 hours.
pub const MIN_DURATION_MS: u64 = 60 * 1000;
pub const MAX_DURATION_MS: u64 = 24 * 60 * 60 * 1000;

/// A record saved longer ago than this gets the sleep/skew check (1 hour).
pub const STALE_SAVE_MS: u64 = 60 * 60 * 1000;

/// Outcome of a successful validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordCheck {
    /// Record is plausible as-is.
    Ok,
    /// Record was saved long ago and its implied elapsed time already covers
    /// the full duration without expiry having been processed. Likely a
    /// system sleep or clock jump; recovery resolves it by forced expiry.
    LikelySleep,
}

/// The persisted representation of timer state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerRecord {
    /// Absolute instant the current countdown began (ms epoch).
    pub start_time: u64,
    /// Total countdown length in milliseconds.
    pub duration: u64,
    /// Timer is currently counting down.
    pub is_active: bool,
    /// Countdown reached zero and expiry has been processed.
    pub is_expired: bool,
    /// Last computed remaining duration, cached for fast reads.
    pub remaining_time: u64,
    /// Wall-clock instant the record was last persisted (ms epoch).
    pub saved_at: u64,
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
}

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

impl TimerRecord {
    /// Brand-new full-duration record starting at `now_ms`.
    pub fn fresh(duration_ms: u64, now_ms: u64) -> Self {
        Self {
            start_time: now_ms,
            duration: duration_ms,
            is_active: true,
            is_expired: false,
            remaining_time: duration_ms,
            saved_at: now_ms,
            schema_version: SCHEMA_VERSION.to_string(),
        }
    }

    /// Remaining time implied by the wall clock at `now_ms`, without
    /// mutating the record. A backward clock jump reads as full duration.
    pub fn remaining_at(&self, now_ms: u64) -> u64 {
        if now_ms < self.start_time {
            self.duration
        } else {
            self.duration.saturating_sub(now_ms - self.start_time)
        }
    }

    /// Validate a candidate loaded from storage against `now_ms`.
    ///
    /// # Errors
    /// Returns the first failed check; the caller discards the record.
    pub fn validate(&self, now_ms: u64) -> Result<RecordCheck, RecordError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(RecordError::UnknownSchema(self.schema_version.clone()));
        }
        if self.is_active && self.is_expired {
            return Err(RecordError::Inconsistent);
        }
        if self.duration < MIN_DURATION_MS || self.duration > MAX_DURATION_MS {
            return Err(RecordError::DurationOutOfRange {
                duration_ms: self.duration,
            });
        }
        if self.start_time > now_ms {
            let ahead_ms = self.start_time - now_ms;
            if ahead_ms > CLOCK_SKEW_TOLERANCE_MS {
                return Err(RecordError::FutureStart { ahead_ms });
            }
        } else {
            let age_ms = now_ms - self.start_time;
            if age_ms > MAX_RECORD_AGE_MS {
                return Err(RecordError::TooOld { age_ms });
            }
        }
        if self.saved_at < self.start_time {
            let gap_ms = self.start_time - self.saved_at;
            if gap_ms > CLOCK_SKEW_TOLERANCE_MS {
                return Err(RecordError::SaveOrdering { gap_ms });
            }
        }

        // Stale-save check: saved over an hour ago and the elapsed time
        // implied by the clock already covers the whole duration, yet expiry
        // was never processed. Flag it for the recovery path.
        let save_age = now_ms.saturating_sub(self.saved_at);
        if save_age > STALE_SAVE_MS
            && !self.is_expired
            && now_ms.saturating_sub(self.start_time) >= self.duration
        {
            return Ok(RecordCheck::LikelySleep);
        }
        Ok(RecordCheck::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_700_000_000_000;
    const TEN_MIN: u64 = 600_000;

    #[test]
    fn fresh_record_validates() {
        let rec = TimerRecord::fresh(TEN_MIN, NOW);
        assert_eq!(rec.validate(NOW).unwrap(), RecordCheck::Ok);
        assert_eq!(rec.remaining_time, TEN_MIN);
        assert!(rec.is_active);
        assert!(!rec.is_expired);
    }

    #[test]
    fn serde_uses_camel_case_keys() {
        let rec = TimerRecord::fresh(TEN_MIN, NOW);
        let json = serde_json::to_value(&rec).unwrap();
        assert!(json.get("startTime").is_some());
        assert!(json.get("remainingTime").is_some());
        assert!(json.get("savedAt").is_some());
        assert!(json.get("schemaVersion").is_some());

        let back: TimerRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, rec);
    }

    #[test]
    fn rejects_record_older_than_max_age() {
        let rec = TimerRecord::fresh(TEN_MIN, NOW - MAX_RECORD_AGE_MS - 1);
        assert!(matches!(
            rec.validate(NOW),
            Err(RecordError::TooOld { .. })
        ));
    }

    #[test]
    fn rejects_far_future_start_but_tolerates_skew() {
        let skewed = TimerRecord::fresh(TEN_MIN, NOW + CLOCK_SKEW_TOLERANCE_MS - 1);
        assert!(skewed.validate(NOW).is_ok());

        let bogus = TimerRecord::fresh(TEN_MIN, NOW + CLOCK_SKEW_TOLERANCE_MS + 1);
        assert!(matches!(
            bogus.validate(NOW),
            Err(RecordError::FutureStart { .. })
        ));
    }

    #[test]
    fn rejects_duration_out_of_bounds() {
        let short = TimerRecord::fresh(MIN_DURATION_MS - 1, NOW);
        assert!(matches!(
            short.validate(NOW),
            Err(RecordError::DurationOutOfRange { .. })
        ));

        let long = TimerRecord::fresh(MAX_DURATION_MS + 1, NOW);
        assert!(matches!(
            long.validate(NOW),
            Err(RecordError::DurationOutOfRange { .. })
        ));
    }

    #[test]
    fn rejects_unknown_schema_version() {
        let mut rec = TimerRecord::fresh(TEN_MIN, NOW);
        rec.schema_version = "99".to_string();
        assert!(matches!(
            rec.validate(NOW),
            Err(RecordError::UnknownSchema(_))
        ));
    }

    #[test]
    fn rejects_active_and_expired_both_set() {
        let mut rec = TimerRecord::fresh(TEN_MIN, NOW);
        rec.is_expired = true;
        assert!(matches!(rec.validate(NOW), Err(RecordError::Inconsistent)));
    }

    #[test]
    fn flags_stale_save_covering_full_duration() {
        let start = NOW - STALE_SAVE_MS - TEN_MIN - 1_000;
        let mut rec = TimerRecord::fresh(TEN_MIN, start);
        rec.saved_at = start;
        assert_eq!(rec.validate(NOW).unwrap(), RecordCheck::LikelySleep);
    }

    #[test]
    fn recently_saved_overdue_record_is_plain_ok() {
        // Overdue, but saved moments ago: the normal recovery path handles it.
        let start = NOW - TEN_MIN - 5_000;
        let mut rec = TimerRecord::fresh(TEN_MIN, start);
        rec.saved_at = NOW - 1_000;
        assert_eq!(rec.validate(NOW).unwrap(), RecordCheck::Ok);
    }

    #[test]
    fn remaining_at_handles_backward_clock() {
        let rec = TimerRecord::fresh(TEN_MIN, NOW);
        assert_eq!(rec.remaining_at(NOW - 50_000), TEN_MIN);
        assert_eq!(rec.remaining_at(NOW + 5_000), TEN_MIN - 5_000);
        assert_eq!(rec.remaining_at(NOW + TEN_MIN + 1), 0);
    }
}
