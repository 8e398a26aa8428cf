//! # Pagelock Core Library
//!
//! This library provides the core logic for Pagelock, a page-embedded
//! session countdown. A countdown started once in a tracked site section
//! survives reloads and in-page navigation through a persisted record, and
//! drives a one-time form-control-disabling action when it expires.
//!
//! ## Architecture
//!
//! - **Countdown Engine**: A wall-clock-based state machine that requires
//!   the caller to periodically invoke `poll()` for progress updates; all
//!   time is passed in explicitly as epoch milliseconds
//! - **Navigation**: Path classification against the tracked section and
//!   its start point, deciding when a navigation resets the countdown
//! - **Storage**: SQLite-backed record persistence and TOML-based
//!   configuration
//! - **Lifecycle**: Orchestration of display and control-disabling
//!   collaborators across section entry, expiry, and exit
//!
//! ## Key Components
//!
//! - [`PersistentCountdown`]: Core countdown state machine with recovery
//! - [`NavigationWatcher`]: Path classification and reset decisions
//! - [`LifecycleCoordinator`]: Phase machine over the countdown
//! - [`BootstrapRetry`]: Bounded retry for coordinator construction

pub mod bootstrap;
pub mod coordinator;
pub mod countdown;
pub mod error;
pub mod events;
pub mod navigation;
pub mod record;
pub mod storage;

pub use bootstrap::{BootstrapRetry, BootstrapStatus};
pub use coordinator::{
    ControlDisabler, CountdownDisplay, LifecycleCoordinator, Phase, RescanStrategy,
};
pub use countdown::PersistentCountdown;
pub use error::{BootstrapError, ConfigError, CoreError, RecordError, Result, StorageError};
pub use events::Event;
pub use navigation::{
    Classification, EventSource, EventSourceHandle, LocationPoller, NavigationChange,
    NavigationSource, NavigationWatcher, PathPattern,
};
pub use record::{RecordCheck, TimerRecord};
pub use storage::{
    BootstrapConfig, Config, CoordinatorConfig, CountdownConfig, MemoryStore, NavigationConfig,
    RecordStore, RescanMode, SqliteStore,
};
