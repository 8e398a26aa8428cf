//! Bounded retry for coordinator construction.
//!
//! Host environments can be slow to expose the containers the overlay and
//! disabler attach to. Instead of failing the whole page load, construction
//! is retried with exponential backoff until it either succeeds or the
//! attempt budget is spent.

use tracing::warn;

use crate::storage::BootstrapConfig;

/// Outcome of one `poll` call.
#[derive(Debug)]
pub enum BootstrapStatus<T> {
    /// Not ready yet, or backing off after a failed attempt.
    Pending { next_attempt_ms: Option<u64> },
    /// Construction succeeded.
    Ready(T),
    /// Attempt budget exhausted; the page runs without the countdown.
    GaveUp { attempts: u32 },
}

/// Driver for the construction attempts. The host calls `poll` from its
/// heartbeat; readiness is re-checked every call, so a prerequisite that
/// appears late costs nothing from the attempt budget.
#[derive(Debug)]
pub struct BootstrapRetry {
    config: BootstrapConfig,
    attempts: u32,
    next_attempt_ms: Option<u64>,
    exhausted: bool,
}

impl BootstrapRetry {
    pub fn new(config: BootstrapConfig) -> Self {
        Self {
            config,
            attempts: 0,
            next_attempt_ms: None,
            exhausted: false,
        }
    }

    /// Attempts consumed so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Try to construct once `ready` holds and any backoff has elapsed.
    /// `ready == false` does not consume an attempt.
    pub fn poll<T, Err, F>(&mut self, now_ms: u64, ready: bool, build: F) -> BootstrapStatus<T>
    where
        Err: std::fmt::Display,
        F: FnOnce() -> Result<T, Err>,
    {
        if self.exhausted {
            return BootstrapStatus::GaveUp {
                attempts: self.attempts,
            };
        }
        if !ready || self.next_attempt_ms.is_some_and(|due| now_ms < due) {
            return BootstrapStatus::Pending {
                next_attempt_ms: self.next_attempt_ms,
            };
        }

        self.attempts += 1;
        match build() {
            Ok(value) => BootstrapStatus::Ready(value),
            Err(err) => {
                warn!(attempt = self.attempts, error = %err, "bootstrap attempt failed");
                if self.attempts >= self.config.max_attempts {
                    self.exhausted = true;
                    return BootstrapStatus::GaveUp {
                        attempts: self.attempts,
                    };
                }
                self.next_attempt_ms = Some(now_ms + self.backoff_delay_ms());
                BootstrapStatus::Pending {
                    next_attempt_ms: self.next_attempt_ms,
                }
            }
        }
    }

    /// Delay after the attempt just recorded: base doubled per failure,
    /// capped at the configured maximum.
    fn backoff_delay_ms(&self) -> u64 {
        let shift = (self.attempts - 1).min(32);
        self.config
            .base_delay_ms
            .saturating_mul(1u64.wrapping_shl(shift))
            .min(self.config.max_delay_ms)
    }
}
