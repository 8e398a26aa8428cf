//! TOML-based application configuration.
//!
//! Stores the knobs the host is allowed to turn:
//! - Countdown duration and cadence intervals
//! - The two navigation path patterns and the location-poll fallback
//! - Bootstrap backoff parameters
//! - Rescan strategy for the control disabler
//!
//! Configuration is stored at `~/.config/pagelock/config.toml`.

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{ConfigError, CoreError};

/// Countdown-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountdownConfig {
    #[serde(default = "default_duration_minutes")]
    pub duration_minutes: u64,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_drift_check_interval_ms")]
    pub drift_check_interval_ms: u64,
    #[serde(default = "default_drift_tolerance_ms")]
    pub drift_tolerance_ms: u64,
}

impl CountdownConfig {
    pub fn duration_ms(&self) -> u64 {
        self.duration_minutes * 60 * 1000
    }
}

/// Navigation-watching configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationConfig {
    /// Broad pattern: any path belonging to the tracked multi-step area.
    #[serde(default = "default_section_pattern")]
    pub section_pattern: String,
    /// Narrow pattern: the first step, where a countdown may begin or reset.
    #[serde(default = "default_start_pattern")]
    pub start_pattern: String,
    /// Fallback poll interval for navigation mechanisms that bypass events.
    #[serde(default = "default_location_poll_interval_ms")]
    pub location_poll_interval_ms: u64,
}

/// How the coordinator catches controls that appear after expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RescanMode {
    /// Host signals structural changes (native change observation).
    Observed,
    /// Fixed-interval re-scan fallback.
    Polling,
}

/// Coordinator-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    #[serde(default = "default_rescan_mode")]
    pub rescan_mode: RescanMode,
    #[serde(default = "default_rescan_interval_ms")]
    pub rescan_interval_ms: u64,
}

/// Bootstrap backoff configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Initial delay before the second attempt; doubles per failure.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Cap on the doubled delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Attempt limit; never retries indefinitely.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/pagelock/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub countdown: CountdownConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

// Default functions
fn default_duration_minutes() -> u64 {
    10
}
fn default_tick_interval_ms() -> u64 {
    1_000
}
fn default_drift_check_interval_ms() -> u64 {
    30_000
}
fn default_drift_tolerance_ms() -> u64 {
    5_000
}
fn default_section_pattern() -> String {
    "/checkout".to_string()
}
fn default_start_pattern() -> String {
    "/checkout/start".to_string()
}
fn default_location_poll_interval_ms() -> u64 {
    2_000
}
fn default_rescan_mode() -> RescanMode {
    RescanMode::Observed
}
fn default_rescan_interval_ms() -> u64 {
    3_000
}
fn default_base_delay_ms() -> u64 {
    1_000
}
fn default_max_delay_ms() -> u64 {
    30_000
}
fn default_max_attempts() -> u32 {
    5
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            duration_minutes: default_duration_minutes(),
            tick_interval_ms: default_tick_interval_ms(),
            drift_check_interval_ms: default_drift_check_interval_ms(),
            drift_tolerance_ms: default_drift_tolerance_ms(),
        }
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            section_pattern: default_section_pattern(),
            start_pattern: default_start_pattern(),
            location_poll_interval_ms: default_location_poll_interval_ms(),
        }
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            rescan_mode: default_rescan_mode(),
            rescan_interval_ms: default_rescan_interval_ms(),
        }
    }
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Config {
    /// Load from disk or return default.
    ///
    /// # Errors
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, CoreError> {
        let path = data_dir()?.join("config.toml");
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content)
                    .map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
                Ok(cfg)
            }
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn save(&self) -> Result<(), CoreError> {
        let path = data_dir()?.join("config.toml");
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.countdown.duration_minutes, 10);
        assert_eq!(parsed.countdown.tick_interval_ms, 1_000);
        assert_eq!(parsed.navigation.section_pattern, "/checkout");
        assert_eq!(parsed.coordinator.rescan_mode, RescanMode::Observed);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let cfg: Config = toml::from_str(
            "[countdown]\nduration_minutes = 15\n\n[navigation]\nsection_pattern = \"/exam\"\n",
        )
        .unwrap();
        assert_eq!(cfg.countdown.duration_minutes, 15);
        assert_eq!(cfg.countdown.drift_tolerance_ms, 5_000);
        assert_eq!(cfg.navigation.section_pattern, "/exam");
        assert_eq!(cfg.navigation.start_pattern, "/checkout/start");
        assert_eq!(cfg.bootstrap.max_attempts, 5);
    }

    #[test]
    fn duration_converts_to_ms() {
        let cfg = CountdownConfig::default();
        assert_eq!(cfg.duration_ms(), 600_000);
    }
}
