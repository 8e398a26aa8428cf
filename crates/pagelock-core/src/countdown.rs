//! Persistent countdown engine.
//!
//! The countdown is a wall-clock-based state machine. It does not use
//! internal threads - the caller is responsible for calling `poll()`
//! periodically with the current epoch-millisecond time.
//!
//! Every handler re-derives remaining time from `startTime` instead of
//! decrementing a counter, so ticks, drift checks, and visibility callbacks
//! are idempotent regardless of call order or skipped ticks.
//!
//! ## Usage
//!
//! ```ignore
//! let mut countdown = PersistentCountdown::new(store, &config, now_ms);
//! countdown.initialize(now_ms); // adopt or replace the persisted record
//! countdown.start(now_ms);
//! // In a loop:
//! countdown.poll(now_ms); // Returns events when something changed
//! ```

use tracing::{debug, warn};

use crate::events::{stamp, Event};
use crate::record::{RecordCheck, TimerRecord};
use crate::storage::store::RecordStore;
use crate::storage::CountdownConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recompute {
    /// Clock moved backward; restarted from now with full duration.
    BackwardJump,
    /// Remaining time recomputed, countdown still running.
    Normal,
    /// Elapsed time meets or exceeds the duration.
    Overdue,
}

/// Core countdown engine with crash-persistent recovery.
///
/// Owns the timer record exclusively; the store is an eventually-consistent
/// mirror. Knows nothing about navigation or UI.
pub struct PersistentCountdown<S: RecordStore> {
    store: S,
    record: TimerRecord,
    /// Configured full duration for fresh records.
    duration_ms: u64,
    /// Cadences are scheduled (started and not yet stopped/expired).
    running: bool,
    next_tick_ms: Option<u64>,
    next_drift_check_ms: Option<u64>,
    tick_interval_ms: u64,
    drift_check_interval_ms: u64,
    drift_tolerance_ms: u64,
}

impl<S: RecordStore> PersistentCountdown<S> {
    /// Create an engine holding a fresh full-duration record.
    ///
    /// Nothing is persisted until `initialize` or the first tick.
    pub fn new(store: S, config: &CountdownConfig, now_ms: u64) -> Self {
        let duration_ms = config.duration_ms();
        Self {
            store,
            record: TimerRecord::fresh(duration_ms, now_ms),
            duration_ms,
            running: false,
            next_tick_ms: None,
            next_drift_check_ms: None,
            tick_interval_ms: config.tick_interval_ms,
            drift_check_interval_ms: config.drift_check_interval_ms,
            drift_tolerance_ms: config.drift_tolerance_ms,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Value copy of the current record; no shared mutable reference.
    pub fn state(&self) -> TimerRecord {
        self.record.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether the store holds a record that would survive validation,
    /// without adopting or mutating anything.
    pub fn has_valid_record(&self, now_ms: u64) -> bool {
        matches!(self.store.load(), Ok(Some(rec)) if rec.validate(now_ms).is_ok())
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self, now_ms: u64) -> Event {
        let progress = if self.record.duration == 0 {
            0.0
        } else {
            1.0 - (self.record.remaining_time as f64 / self.record.duration as f64)
        };
        Event::StateSnapshot {
            is_active: self.record.is_active,
            is_expired: self.record.is_expired,
            remaining_ms: self.record.remaining_time,
            duration_ms: self.record.duration,
            progress,
            at: stamp(now_ms),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Load a candidate record from storage, validate and recover it, or
    /// fall back to a fresh full-duration record.
    ///
    /// Storage failures are logged and swallowed: the countdown always
    /// ends up in a usable state.
    pub fn initialize(&mut self, now_ms: u64) -> Vec<Event> {
        let candidate = match self.store.load() {
            Ok(candidate) => candidate,
            Err(e) => {
                warn!(error = %e, "record load failed; starting fresh");
                None
            }
        };

        match candidate {
            Some(stored) => match stored.validate(now_ms) {
                Ok(check) => self.recover(stored, check, now_ms),
                Err(e) => {
                    debug!(reason = %e, "discarding stored record");
                    if let Err(e) = self.store.clear() {
                        warn!(error = %e, "failed to clear rejected record");
                    }
                    self.replace_fresh(now_ms);
                    Vec::new()
                }
            },
            None => {
                self.replace_fresh(now_ms);
                Vec::new()
            }
        }
    }

    /// Begin the periodic tick and drift-check cadences and perform one
    /// immediate tick. No-op if the record is expired or inactive.
    pub fn start(&mut self, now_ms: u64) -> Vec<Event> {
        if !self.record.is_active || self.record.is_expired {
            return Vec::new();
        }
        self.running = true;
        self.next_tick_ms = Some(now_ms + self.tick_interval_ms);
        self.next_drift_check_ms = Some(now_ms + self.drift_check_interval_ms);

        let mut events = vec![Event::CountdownStarted {
            duration_ms: self.record.duration,
            remaining_ms: self.record.remaining_time,
            at: stamp(now_ms),
        }];
        events.extend(self.tick(now_ms));
        events
    }

    /// Recompute remaining time from `now - startTime`, persist, and
    /// transition to expired when it reaches zero.
    pub fn tick(&mut self, now_ms: u64) -> Vec<Event> {
        if !self.record.is_active || self.record.is_expired {
            return Vec::new();
        }
        let outcome = self.recompute(now_ms);
        self.persist(now_ms);

        let mut events = vec![Event::CountdownTick {
            remaining_ms: self.record.remaining_time,
            record: self.record.clone(),
            at: stamp(now_ms),
        }];
        if outcome == Recompute::Overdue {
            events.extend(self.expire(now_ms));
        }
        events
    }

    /// Idempotent expiry. Emits the expire event exactly once per
    /// transition into the expired state.
    pub fn expire(&mut self, now_ms: u64) -> Option<Event> {
        if self.record.is_expired {
            return None;
        }
        self.record.is_expired = true;
        self.record.is_active = false;
        self.record.remaining_time = 0;
        self.persist(now_ms);
        self.stop();
        Some(Event::CountdownExpired { at: stamp(now_ms) })
    }

    /// Discard the current record for a brand-new full-duration one.
    pub fn reset(&mut self, now_ms: u64) -> Event {
        self.stop();
        self.replace_fresh(now_ms);
        Event::CountdownReset {
            duration_ms: self.record.duration,
            at: stamp(now_ms),
        }
    }

    /// Stop all periodic work; the record is left as-is.
    pub fn stop(&mut self) {
        self.running = false;
        self.next_tick_ms = None;
        self.next_drift_check_ms = None;
    }

    /// Stop periodic work and remove the persisted record.
    pub fn destroy(&mut self) {
        self.stop();
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "failed to clear persisted record on destroy");
        }
    }

    /// Caller-driven cadence: runs the tick and drift check when due.
    ///
    /// Safe to call at any frequency; missed polls are absorbed because
    /// every computation re-derives from `startTime`.
    pub fn poll(&mut self, now_ms: u64) -> Vec<Event> {
        if !self.running {
            return Vec::new();
        }
        let mut events = Vec::new();
        if self.next_drift_check_ms.is_some_and(|due| now_ms >= due) {
            events.extend(self.drift_check(now_ms));
            if self.running {
                self.next_drift_check_ms = Some(now_ms + self.drift_check_interval_ms);
            }
        }
        if self.running && self.next_tick_ms.is_some_and(|due| now_ms >= due) {
            events.extend(self.tick(now_ms));
            if self.running {
                self.next_tick_ms = Some(now_ms + self.tick_interval_ms);
            }
        }
        events
    }

    /// Background timers in a suspended page are unreliable; run a drift
    /// check whenever the page transitions from hidden to visible.
    pub fn on_visible(&mut self, now_ms: u64) -> Vec<Event> {
        if !self.running {
            return Vec::new();
        }
        self.drift_check(now_ms)
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Compare the cached remaining time against a recomputation from
    /// `startTime`; re-derive and re-persist past the tolerance.
    fn drift_check(&mut self, now_ms: u64) -> Vec<Event> {
        if !self.record.is_active || self.record.is_expired {
            return Vec::new();
        }
        let expected = self.record.remaining_at(now_ms);
        let discrepancy = self.record.remaining_time.abs_diff(expected);
        if discrepancy <= self.drift_tolerance_ms {
            return Vec::new();
        }
        let outcome = self.recompute(now_ms);
        self.persist(now_ms);
        debug!(discrepancy_ms = discrepancy, "drift correction applied");

        let mut events = vec![Event::DriftCorrected {
            remaining_ms: self.record.remaining_time,
            discrepancy_ms: discrepancy,
            at: stamp(now_ms),
        }];
        if outcome == Recompute::Overdue {
            events.extend(self.expire(now_ms));
        }
        events
    }

    fn recompute(&mut self, now_ms: u64) -> Recompute {
        if now_ms < self.record.start_time {
            // Clock moved backward: treat as a fresh start from now,
            // preserving the full duration.
            self.record.start_time = now_ms;
            self.record.remaining_time = self.record.duration;
            return Recompute::BackwardJump;
        }
        let elapsed = now_ms - self.record.start_time;
        let remaining = self.record.duration.saturating_sub(elapsed);
        self.record.remaining_time = remaining;
        if remaining == 0 {
            Recompute::Overdue
        } else {
            Recompute::Normal
        }
    }

    /// Adopt a validated stored record, recomputing remaining time for the
    /// wall-clock gap and forcing expiry if the absence covered it.
    fn recover(&mut self, stored: TimerRecord, check: RecordCheck, now_ms: u64) -> Vec<Event> {
        self.record = stored;
        let mut overdue = check == RecordCheck::LikelySleep;
        if self.record.is_active {
            overdue |= self.recompute(now_ms) == Recompute::Overdue;
        }
        // Re-persist so the mirror reflects the recovered state.
        self.persist(now_ms);

        let mut events = vec![Event::CountdownRecovered {
            remaining_ms: self.record.remaining_time,
            is_expired: self.record.is_expired,
            at: stamp(now_ms),
        }];
        if overdue && !self.record.is_expired {
            events.extend(self.expire(now_ms));
        }
        events
    }

    fn replace_fresh(&mut self, now_ms: u64) {
        self.record = TimerRecord::fresh(self.duration_ms, now_ms);
        self.persist(now_ms);
    }

    /// Write failures leave the in-memory state authoritative; the next
    /// tick retries the save.
    fn persist(&mut self, now_ms: u64) {
        self.record.saved_at = now_ms;
        if let Err(e) = self.store.save(&self.record) {
            warn!(error = %e, "record save failed; keeping in-memory state");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::storage::MemoryStore;
    use proptest::prelude::*;

    const T0: u64 = 1_700_000_000_000;
    const TEN_MIN: u64 = 600_000;

    fn config(duration_minutes: u64) -> CountdownConfig {
        CountdownConfig {
            duration_minutes,
            ..CountdownConfig::default()
        }
    }

    fn engine() -> (PersistentCountdown<MemoryStore>, MemoryStore) {
        let store = MemoryStore::new();
        let countdown = PersistentCountdown::new(store.clone(), &config(10), T0);
        (countdown, store)
    }

    fn expired_count(events: &[Event]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, Event::CountdownExpired { .. }))
            .count()
    }

    #[test]
    fn start_ticks_immediately_and_persists() {
        let (mut countdown, store) = engine();
        countdown.initialize(T0);
        let events = countdown.start(T0);
        assert!(matches!(events[0], Event::CountdownStarted { .. }));
        assert!(matches!(events[1], Event::CountdownTick { .. }));

        let mirrored = store.load().unwrap().unwrap();
        assert_eq!(mirrored.remaining_time, TEN_MIN);
        assert!(mirrored.is_active);
    }

    #[test]
    fn poll_respects_tick_cadence() {
        let (mut countdown, _store) = engine();
        countdown.initialize(T0);
        countdown.start(T0);

        assert!(countdown.poll(T0 + 500).is_empty());
        let events = countdown.poll(T0 + 1_000);
        assert_eq!(events.len(), 1);
        match &events[0] {
            Event::CountdownTick { remaining_ms, .. } => {
                assert_eq!(*remaining_ms, TEN_MIN - 1_000)
            }
            other => panic!("expected tick, got {other:?}"),
        }
    }

    #[test]
    fn expire_is_idempotent_and_fires_once() {
        let (mut countdown, _store) = engine();
        countdown.initialize(T0);
        countdown.start(T0);

        assert!(countdown.expire(T0 + 1_000).is_some());
        let state_after_first = countdown.state();
        assert!(countdown.expire(T0 + 2_000).is_none());

        let state = countdown.state();
        assert!(state.is_expired);
        assert!(!state.is_active);
        assert_eq!(state.remaining_time, 0);
        assert_eq!(state.is_expired, state_after_first.is_expired);
        assert_eq!(state.remaining_time, state_after_first.remaining_time);
    }

    #[test]
    fn scenario_expiry_applied_exactly_once_with_coinciding_ticks() {
        let (mut countdown, _store) = engine();
        countdown.initialize(T0);
        countdown.start(T0);

        let near_end = countdown.tick(T0 + 595_000);
        match &near_end[0] {
            Event::CountdownTick { remaining_ms, .. } => assert_eq!(*remaining_ms, 5_000),
            other => panic!("expected tick, got {other:?}"),
        }

        let mut expirations = 0;
        expirations += expired_count(&countdown.tick(T0 + 600_000));
        expirations += expired_count(&countdown.tick(T0 + 600_000));
        expirations += expired_count(&countdown.poll(T0 + 600_001));
        assert_eq!(expirations, 1);
        assert_eq!(countdown.state().remaining_time, 0);
    }

    #[test]
    fn roundtrip_recovers_equivalent_record() {
        let (mut countdown, store) = engine();
        countdown.initialize(T0);
        countdown.start(T0);
        let saved = countdown.state();

        let mut reloaded = PersistentCountdown::new(store, &config(10), T0);
        let events = reloaded.initialize(T0);
        assert!(matches!(events[0], Event::CountdownRecovered { .. }));

        let recovered = reloaded.state();
        assert_eq!(recovered.is_active, saved.is_active);
        assert_eq!(recovered.is_expired, saved.is_expired);
        assert_eq!(recovered.duration, saved.duration);
        assert_eq!(recovered.remaining_time, saved.remaining_time);
    }

    #[test]
    fn backward_clock_jump_recovers_full_duration() {
        let (mut countdown, store) = engine();
        countdown.initialize(T0);
        countdown.start(T0);

        // Reload with the clock 50s behind startTime (within skew tolerance).
        let then = T0 - 50_000;
        let mut reloaded = PersistentCountdown::new(store, &config(10), then);
        reloaded.initialize(then);

        let state = reloaded.state();
        assert_eq!(state.remaining_time, TEN_MIN);
        assert_eq!(state.start_time, then);
        assert!(!state.is_expired);
    }

    #[test]
    fn long_absence_recovers_as_expired() {
        let mut store = MemoryStore::new();
        let rec = TimerRecord::fresh(TEN_MIN, T0 - 700_000);
        store.save(&rec).unwrap();

        let mut countdown = PersistentCountdown::new(store, &config(10), T0);
        let events = countdown.initialize(T0);
        assert_eq!(expired_count(&events), 1);

        let state = countdown.state();
        assert!(state.is_expired);
        assert_eq!(state.remaining_time, 0);
    }

    #[test]
    fn stale_record_is_discarded_for_fresh() {
        let mut store = MemoryStore::new();
        let rec = TimerRecord::fresh(TEN_MIN, T0 - 25 * 60 * 60 * 1000);
        store.save(&rec).unwrap();

        let mut countdown = PersistentCountdown::new(store.clone(), &config(10), T0);
        let events = countdown.initialize(T0);
        assert!(events.is_empty());

        let state = countdown.state();
        assert_eq!(state.start_time, T0);
        assert_eq!(state.remaining_time, TEN_MIN);
        // The rejected record was replaced in the store too.
        assert_eq!(store.load().unwrap().unwrap().start_time, T0);
    }

    #[test]
    fn recovering_already_expired_record_does_not_refire() {
        let mut store = MemoryStore::new();
        let mut rec = TimerRecord::fresh(TEN_MIN, T0 - 10_000);
        rec.is_active = false;
        rec.is_expired = true;
        rec.remaining_time = 0;
        store.save(&rec).unwrap();

        let mut countdown = PersistentCountdown::new(store, &config(10), T0);
        let events = countdown.initialize(T0);
        assert_eq!(expired_count(&events), 0);
        match &events[0] {
            Event::CountdownRecovered { is_expired, .. } => assert!(is_expired),
            other => panic!("expected recovery, got {other:?}"),
        }
        assert!(countdown.start(T0).is_empty());
    }

    #[test]
    fn drift_correction_after_missed_ticks() {
        let (mut countdown, _store) = engine();
        countdown.initialize(T0);
        countdown.start(T0);

        // No polls for 40s; cached remaining is stale by 40s.
        let events = countdown.on_visible(T0 + 40_000);
        match &events[0] {
            Event::DriftCorrected {
                remaining_ms,
                discrepancy_ms,
                ..
            } => {
                assert_eq!(*remaining_ms, TEN_MIN - 40_000);
                assert_eq!(*discrepancy_ms, 40_000);
            }
            other => panic!("expected drift correction, got {other:?}"),
        }
    }

    #[test]
    fn drift_check_is_quiet_within_tolerance() {
        let (mut countdown, _store) = engine();
        countdown.initialize(T0);
        countdown.start(T0);
        countdown.tick(T0 + 30_000);
        // Cache is current; the due drift check at 30s finds nothing.
        assert!(countdown.on_visible(T0 + 31_000).is_empty());
    }

    #[test]
    fn destroy_clears_persisted_record() {
        let (mut countdown, store) = engine();
        countdown.initialize(T0);
        countdown.start(T0);
        assert!(store.load().unwrap().is_some());

        countdown.destroy();
        assert!(store.load().unwrap().is_none());
        assert!(!countdown.is_running());
    }

    #[test]
    fn reset_creates_brand_new_record() {
        let (mut countdown, store) = engine();
        countdown.initialize(T0);
        countdown.start(T0);
        countdown.expire(T0 + 1_000);

        let event = countdown.reset(T0 + 2_000);
        assert!(matches!(event, Event::CountdownReset { .. }));
        let state = countdown.state();
        assert!(state.is_active);
        assert!(!state.is_expired);
        assert_eq!(state.remaining_time, TEN_MIN);
        assert_eq!(state.start_time, T0 + 2_000);
        assert_eq!(store.load().unwrap().unwrap().start_time, T0 + 2_000);
    }

    #[test]
    fn snapshot_reports_progress() {
        let (mut countdown, _store) = engine();
        countdown.initialize(T0);
        countdown.start(T0);
        countdown.tick(T0 + 150_000);

        match countdown.snapshot(T0 + 150_000) {
            Event::StateSnapshot {
                is_active,
                is_expired,
                remaining_ms,
                duration_ms,
                progress,
                ..
            } => {
                assert!(is_active);
                assert!(!is_expired);
                assert_eq!(remaining_ms, TEN_MIN - 150_000);
                assert_eq!(duration_ms, TEN_MIN);
                assert!((progress - 0.25).abs() < 1e-9);
            }
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    struct FailingStore;

    impl RecordStore for FailingStore {
        fn load(&self) -> Result<Option<TimerRecord>, StorageError> {
            Err(StorageError::QueryFailed("store offline".into()))
        }
        fn save(&mut self, _record: &TimerRecord) -> Result<(), StorageError> {
            Err(StorageError::QueryFailed("store offline".into()))
        }
        fn clear(&mut self) -> Result<(), StorageError> {
            Err(StorageError::QueryFailed("store offline".into()))
        }
    }

    #[test]
    fn storage_failures_degrade_to_in_memory() {
        let mut countdown = PersistentCountdown::new(FailingStore, &config(10), T0);
        countdown.initialize(T0);
        countdown.start(T0);

        let events = countdown.tick(T0 + 5_000);
        match &events[0] {
            Event::CountdownTick { remaining_ms, .. } => {
                assert_eq!(*remaining_ms, TEN_MIN - 5_000)
            }
            other => panic!("expected tick, got {other:?}"),
        }
        assert!(countdown.expire(T0 + 6_000).is_some());
        assert!(countdown.state().is_expired);
    }

    proptest! {
        #[test]
        fn remaining_matches_wall_clock(
            duration_min in 1u64..120,
            elapsed_ms in 0u64..8_000_000,
        ) {
            let duration_ms = duration_min * 60 * 1000;
            let store = MemoryStore::new();
            let mut countdown =
                PersistentCountdown::new(store, &config(duration_min), T0);
            countdown.initialize(T0);
            countdown.start(T0);
            countdown.tick(T0 + elapsed_ms);

            let state = countdown.state();
            prop_assert_eq!(state.remaining_time, duration_ms.saturating_sub(elapsed_ms));
            prop_assert_eq!(state.is_expired, state.remaining_time == 0);
        }
    }
}
