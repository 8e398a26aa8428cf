//! Lifecycle orchestration over the countdown, keyed by navigation events.
//!
//! The coordinator is rebuilt on every page load, so every decision here is
//! derived purely from (current classification, previous classification,
//! persisted record presence) - never from coordinator-local memory that
//! does not survive a reload. The `Phase` is a cache of those inputs, not
//! a second source of truth.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::countdown::PersistentCountdown;
use crate::events::{stamp, Event};
use crate::navigation::NavigationChange;
use crate::storage::store::RecordStore;
use crate::storage::{CoordinatorConfig, RescanMode};

/// Overlay collaborator. Implementations handle their own "not yet
/// created" bootstrapping; `update` must be callable at any time.
pub trait CountdownDisplay {
    fn update(&mut self, remaining_ms: u64, is_expired: bool);
    /// Section entered below the start point with no existing timer.
    fn show_waiting(&mut self);
    fn clear(&mut self);
}

/// Form-control collaborator for the dependent disabling action.
pub trait ControlDisabler {
    fn disable_all(&mut self);
    fn restore_all(&mut self);
    /// Catch controls that appeared after the initial disable pass.
    fn refresh(&mut self);
}

/// How late-appearing controls are caught while expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RescanStrategy {
    /// Host signals structural changes via `notify_mutation`.
    Observed,
    /// Fixed-interval re-scan during `poll`.
    Polling { interval_ms: u64 },
}

impl RescanStrategy {
    pub fn from_config(config: &CoordinatorConfig) -> Self {
        match config.rescan_mode {
            RescanMode::Observed => RescanStrategy::Observed,
            RescanMode::Polling => RescanStrategy::Polling {
                interval_ms: config.rescan_interval_ms,
            },
        }
    }
}

/// Conceptual coordinator state; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Not shown, no timer.
    Dormant,
    /// Section entered below the start point, no timer ever started.
    Waiting,
    /// Active countdown visible.
    Running,
    /// Countdown finished, dependent action applied.
    Expired,
    /// Section exited, timer fully cleared.
    TornDown,
}

/// Finite-state orchestration layer over `PersistentCountdown`.
pub struct LifecycleCoordinator<S: RecordStore, D: CountdownDisplay, E: ControlDisabler> {
    countdown: PersistentCountdown<S>,
    display: D,
    disabler: E,
    phase: Phase,
    /// Whether the countdown has adopted a record in this page load.
    initialized: bool,
    rescan: RescanStrategy,
    next_rescan_ms: Option<u64>,
}

impl<S: RecordStore, D: CountdownDisplay, E: ControlDisabler> LifecycleCoordinator<S, D, E> {
    pub fn new(
        countdown: PersistentCountdown<S>,
        display: D,
        disabler: E,
        rescan: RescanStrategy,
    ) -> Self {
        Self {
            countdown,
            display,
            disabler,
            phase: Phase::Dormant,
            initialized: false,
            rescan,
            next_rescan_ms: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Value copy of the countdown's current record.
    pub fn timer_state(&self) -> crate::record::TimerRecord {
        self.countdown.state()
    }

    /// Apply one classified navigation change.
    pub fn on_change(&mut self, change: &NavigationChange, now_ms: u64) -> Vec<Event> {
        if !change.classification.is_tracked_section {
            if matches!(self.phase, Phase::Waiting | Phase::Running | Phase::Expired) {
                return self.teardown(now_ms);
            }
            return Vec::new();
        }

        if change.classification.is_start_point {
            if change.should_reset {
                // Reset authority is independent of prior initialization:
                // arriving from outside the section discards any persisted
                // record, whatever state this page load is in.
                return self.begin_fresh(now_ms);
            }
            if !self.initialized {
                return self.adopt_persisted(now_ms);
            }
            return Vec::new();
        }

        // Inside the section, below the start point.
        if !self.initialized {
            if self.countdown.has_valid_record(now_ms) {
                return self.adopt_persisted(now_ms);
            }
            if self.phase != Phase::Waiting {
                self.phase = Phase::Waiting;
                self.display.show_waiting();
                return vec![Event::WaitingShown {
                    path: change.path.clone(),
                    at: stamp(now_ms),
                }];
            }
        }
        Vec::new()
    }

    /// Caller-driven heartbeat: pumps the countdown cadences and, while
    /// expired under the polling strategy, re-applies the disabling action
    /// to catch late-appearing controls.
    pub fn poll(&mut self, now_ms: u64) -> Vec<Event> {
        let events = self.countdown.poll(now_ms);
        let events = self.absorb(events, now_ms);

        if self.phase == Phase::Expired {
            if let RescanStrategy::Polling { interval_ms } = self.rescan {
                if self.next_rescan_ms.is_none_or(|due| now_ms >= due) {
                    self.disabler.refresh();
                    self.next_rescan_ms = Some(now_ms + interval_ms);
                }
            }
        }
        events
    }

    /// Hidden-to-visible transition: force a drift check and push any
    /// correction to the display.
    pub fn on_visible(&mut self, now_ms: u64) -> Vec<Event> {
        let events = self.countdown.on_visible(now_ms);
        self.absorb(events, now_ms)
    }

    /// Host-observed structural change to the rendered content.
    pub fn notify_mutation(&mut self, _now_ms: u64) {
        if self.phase == Phase::Expired && self.rescan == RescanStrategy::Observed {
            self.disabler.refresh();
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Discard any persisted record and force a brand-new full-duration
    /// run.
    fn begin_fresh(&mut self, now_ms: u64) -> Vec<Event> {
        debug!("reset from outside the section; starting fresh countdown");
        if self.phase == Phase::Expired {
            self.disabler.restore_all();
        }
        self.next_rescan_ms = None;
        self.phase = Phase::Running;
        self.initialized = true;

        let mut events = vec![self.countdown.reset(now_ms)];
        events.extend(self.countdown.start(now_ms));
        self.absorb(events, now_ms)
    }

    /// Initialize by recovering whatever is persisted (fresh if absent),
    /// then continue in the state the record actually has.
    fn adopt_persisted(&mut self, now_ms: u64) -> Vec<Event> {
        let mut events = self.countdown.initialize(now_ms);
        self.initialized = true;

        if self.countdown.state().is_expired {
            events = self.absorb(events, now_ms);
            // Recovered an already-expired record: re-apply the dependent
            // action on this page load.
            self.enter_expired(now_ms);
            events
        } else {
            self.phase = Phase::Running;
            events.extend(self.countdown.start(now_ms));
            self.absorb(events, now_ms)
        }
    }

    /// Section exited: clear everything. Re-entering afterward is
    /// indistinguishable from a first-ever entry.
    fn teardown(&mut self, now_ms: u64) -> Vec<Event> {
        debug!("section left; tearing down countdown");
        self.countdown.destroy();
        self.display.clear();
        self.disabler.restore_all();
        self.phase = Phase::TornDown;
        self.initialized = false;
        self.next_rescan_ms = None;
        vec![Event::TornDown { at: stamp(now_ms) }]
    }

    fn enter_expired(&mut self, now_ms: u64) {
        if self.phase == Phase::Expired {
            return;
        }
        self.disabler.disable_all();
        self.display.update(0, true);
        self.phase = Phase::Expired;
        if let RescanStrategy::Polling { interval_ms } = self.rescan {
            self.next_rescan_ms = Some(now_ms + interval_ms);
        }
    }

    /// Apply countdown events to the collaborators, passing them through
    /// for the host.
    fn absorb(&mut self, events: Vec<Event>, now_ms: u64) -> Vec<Event> {
        for event in &events {
            match event {
                Event::CountdownStarted { remaining_ms, .. }
                | Event::CountdownTick { remaining_ms, .. }
                | Event::DriftCorrected { remaining_ms, .. } => {
                    self.display.update(*remaining_ms, false);
                }
                Event::CountdownRecovered {
                    remaining_ms,
                    is_expired,
                    ..
                } => {
                    self.display.update(*remaining_ms, *is_expired);
                }
                Event::CountdownExpired { .. } => {
                    self.enter_expired(now_ms);
                }
                _ => {}
            }
        }
        events
    }
}
