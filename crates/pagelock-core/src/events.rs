use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::TimerRecord;

/// Every state change in the system produces an Event.
/// The host page polls for events; collaborators are driven from them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    CountdownStarted {
        duration_ms: u64,
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    CountdownTick {
        remaining_ms: u64,
        record: TimerRecord,
        at: DateTime<Utc>,
    },
    /// Countdown reached zero; fires exactly once per expiry.
    CountdownExpired {
        at: DateTime<Utc>,
    },
    CountdownReset {
        duration_ms: u64,
        at: DateTime<Utc>,
    },
    /// A persisted record survived validation and was adopted on load.
    CountdownRecovered {
        remaining_ms: u64,
        is_expired: bool,
        at: DateTime<Utc>,
    },
    /// Cached remaining time drifted past tolerance and was re-derived.
    DriftCorrected {
        remaining_ms: u64,
        discrepancy_ms: u64,
        at: DateTime<Utc>,
    },
    /// New path is inside the tracked section (start point or not).
    SectionEntered {
        path: String,
        is_start_point: bool,
        should_reset: bool,
        at: DateTime<Utc>,
    },
    /// New path is specifically the start point; fires in addition to
    /// `SectionEntered`.
    StartReached {
        path: String,
        should_reset: bool,
        at: DateTime<Utc>,
    },
    /// New path left the tracked section entirely.
    SectionLeft {
        path: String,
        at: DateTime<Utc>,
    },
    /// Section entered below the start point with no existing timer.
    WaitingShown {
        path: String,
        at: DateTime<Utc>,
    },
    /// Timer and persisted state fully cleared after a section exit.
    TornDown {
        at: DateTime<Utc>,
    },
    StateSnapshot {
        is_active: bool,
        is_expired: bool,
        remaining_ms: u64,
        duration_ms: u64,
        progress: f64,
        at: DateTime<Utc>,
    },
}

/// Epoch-millisecond stamp supplied by the host, as a chrono instant.
pub(crate) fn stamp(now_ms: u64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(now_ms as i64).unwrap_or_default()
}
