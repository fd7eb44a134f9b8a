//! Per-unit throttle delays
//!
//! After each finalized playlist entry or guide channel the worker sleeps for a
//! delay chosen by run mode and speed tier, bounding CPU use on long runs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Who started the run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Started explicitly by the user
    #[default]
    Manual,
    /// Started by a schedule or trigger; always uses longer delays
    Automatic,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Manual => write!(f, "manual"),
            RunMode::Automatic => write!(f, "automatic"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThrottleSpeed {
    #[default]
    Full,
    Balanced,
    Slow,
}

impl ThrottleSpeed {
    pub fn delay(&self, mode: RunMode) -> Duration {
        let millis = match (mode, self) {
            (RunMode::Manual, ThrottleSpeed::Full) => 0,
            (RunMode::Manual, ThrottleSpeed::Balanced) => 2,
            (RunMode::Manual, ThrottleSpeed::Slow) => 10,
            (RunMode::Automatic, ThrottleSpeed::Full) => 1,
            (RunMode::Automatic, ThrottleSpeed::Balanced) => 5,
            (RunMode::Automatic, ThrottleSpeed::Slow) => 25,
        };
        Duration::from_millis(millis)
    }
}

/// Speed selection per run mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleSettings {
    pub manual: ThrottleSpeed,
    pub automatic: ThrottleSpeed,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            manual: ThrottleSpeed::Full,
            automatic: ThrottleSpeed::Balanced,
        }
    }
}

impl ThrottleSettings {
    pub fn delay_for(&self, mode: RunMode) -> Duration {
        match mode {
            RunMode::Manual => self.manual.delay(mode),
            RunMode::Automatic => self.automatic.delay(mode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_manual_has_no_delay() {
        assert_eq!(ThrottleSpeed::Full.delay(RunMode::Manual), Duration::ZERO);
    }

    #[test]
    fn test_automatic_is_slower_at_every_tier() {
        for speed in [ThrottleSpeed::Full, ThrottleSpeed::Balanced, ThrottleSpeed::Slow] {
            assert!(speed.delay(RunMode::Automatic) > speed.delay(RunMode::Manual));
        }
    }

    #[test]
    fn test_tiers_are_ordered() {
        for mode in [RunMode::Manual, RunMode::Automatic] {
            assert!(ThrottleSpeed::Full.delay(mode) < ThrottleSpeed::Balanced.delay(mode));
            assert!(ThrottleSpeed::Balanced.delay(mode) < ThrottleSpeed::Slow.delay(mode));
        }
    }

    #[test]
    fn test_settings_pick_speed_by_mode() {
        let settings = ThrottleSettings {
            manual: ThrottleSpeed::Slow,
            automatic: ThrottleSpeed::Full,
        };
        assert_eq!(settings.delay_for(RunMode::Manual), Duration::from_millis(10));
        assert_eq!(settings.delay_for(RunMode::Automatic), Duration::from_millis(1));
    }
}
