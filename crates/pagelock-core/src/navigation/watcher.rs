//! Navigation-classification state machine.
//!
//! On every detected path change the watcher updates its "current" and
//! "previous" slots synchronously before re-classifying, so `should_reset`
//! is always evaluated against a consistent pair. Only a single previous
//! slot is retained - this is not a history log.

use tracing::debug;

use super::pattern::{Classification, PathPattern};
use super::source::NavigationSource;
use crate::events::{stamp, Event};
use crate::storage::NavigationConfig;

#[derive(Debug, Clone)]
struct PathSlot {
    path: String,
    classification: Classification,
}

/// One classified navigation change.
#[derive(Debug, Clone)]
pub struct NavigationChange {
    pub path: String,
    pub classification: Classification,
    pub previous: Option<Classification>,
    /// True exactly when the new path matches the start pattern and the
    /// retained previous path did not match the section pattern. Internal
    /// navigation and refreshes while already at/after the start never
    /// reset.
    pub should_reset: bool,
}

impl NavigationChange {
    /// Expand into the callback-contract events: section-match fires for
    /// any path inside the section, start-match additionally for the start
    /// point, and no-match when the section is left. Not mutually
    /// exclusive.
    pub fn to_events(&self, now_ms: u64) -> Vec<Event> {
        let mut events = Vec::new();
        if self.classification.is_tracked_section {
            events.push(Event::SectionEntered {
                path: self.path.clone(),
                is_start_point: self.classification.is_start_point,
                should_reset: self.should_reset,
                at: stamp(now_ms),
            });
            if self.classification.is_start_point {
                events.push(Event::StartReached {
                    path: self.path.clone(),
                    should_reset: self.should_reset,
                    at: stamp(now_ms),
                });
            }
        } else {
            events.push(Event::SectionLeft {
                path: self.path.clone(),
                at: stamp(now_ms),
            });
        }
        events
    }
}

/// Classifies locations against the section and start patterns and derives
/// the reset signal from the single-slot history.
pub struct NavigationWatcher {
    section: PathPattern,
    start: PathPattern,
    current: Option<PathSlot>,
    previous: Option<PathSlot>,
    sources: Vec<Box<dyn NavigationSource>>,
}

impl NavigationWatcher {
    pub fn new(section: PathPattern, start: PathPattern) -> Self {
        Self {
            section,
            start,
            current: None,
            previous: None,
            sources: Vec::new(),
        }
    }

    /// Build from configuration.
    ///
    /// # Errors
    /// Returns an error if either pattern fails to compile.
    pub fn from_config(config: &NavigationConfig) -> crate::error::Result<Self> {
        Ok(Self::new(
            PathPattern::parse(&config.section_pattern)?,
            PathPattern::parse(&config.start_pattern)?,
        ))
    }

    /// Compose an additional change-detection mechanism.
    pub fn with_source(mut self, source: impl NavigationSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn classification(&self) -> Option<Classification> {
        self.current.as_ref().map(|slot| slot.classification)
    }

    /// Reset rule: at the start point, arrived from outside the section.
    /// With no retained previous path (fresh page load) this is false.
    pub fn should_reset(&self) -> bool {
        let Some(current) = &self.current else {
            return false;
        };
        current.classification.is_start_point
            && self
                .previous
                .as_ref()
                .is_some_and(|prev| !prev.classification.is_tracked_section)
    }

    /// Feed one detected location directly. Returns `None` when the path
    /// is unchanged (a poller re-reporting the same location).
    pub fn observe(&mut self, location: &str, _now_ms: u64) -> Option<NavigationChange> {
        if self
            .current
            .as_ref()
            .is_some_and(|slot| slot.path == location)
        {
            return None;
        }
        let classification = Classification::classify(&self.section, &self.start, location);
        self.previous = self.current.take();
        self.current = Some(PathSlot {
            path: location.to_string(),
            classification,
        });
        let change = NavigationChange {
            path: location.to_string(),
            classification,
            previous: self.previous.as_ref().map(|slot| slot.classification),
            should_reset: self.should_reset(),
        };
        debug!(
            path = location,
            section = classification.is_tracked_section,
            start = classification.is_start_point,
            reset = change.should_reset,
            "navigation change"
        );
        Some(change)
    }

    /// Drain all composed sources, observing each detected location in
    /// order so the slot pair stays consistent per change.
    pub fn poll(&mut self, now_ms: u64) -> Vec<NavigationChange> {
        let mut sources = std::mem::take(&mut self.sources);
        let mut changes = Vec::new();
        for source in &mut sources {
            while let Some(location) = source.poll(now_ms) {
                if let Some(change) = self.observe(&location, now_ms) {
                    changes.push(change);
                }
            }
        }
        self.sources = sources;
        changes
    }
}
