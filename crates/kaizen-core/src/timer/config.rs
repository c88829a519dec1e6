use serde::{Deserialize, Serialize};

use super::fixed::FixedMode;
use crate::error::ValidationError;

pub const DEFAULT_TAG: &str = "Standard";

/// Settings for one fixed-cycle session. Durations are in seconds.
///
/// Fixed at `start_session` and never changed until the session ends.
/// Callers are expected to run [`TimerConfig::validate`] first; the engine
/// itself does not re-check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerConfig {
    pub focus_duration: u64,
    pub break_duration: u64,
    pub long_break_duration: u64,
    pub long_break_interval: u32,
    pub long_break_enabled: bool,
    pub target_iterations: u32,
    pub tag: String,
    /// Count up instead of down; phases never advance on their own.
    #[serde(default)]
    pub stopwatch: bool,
    /// Mode the session opens in. Only meaningful for stopwatch sessions.
    #[serde(default = "default_initial_mode")]
    pub initial_mode: FixedMode,
}

fn default_initial_mode() -> FixedMode {
    FixedMode::Focus
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            focus_duration: 25 * 60,
            break_duration: 5 * 60,
            long_break_duration: 15 * 60,
            long_break_interval: 4,
            long_break_enabled: false,
            target_iterations: 1,
            tag: DEFAULT_TAG.into(),
            stopwatch: false,
            initial_mode: FixedMode::Focus,
        }
    }
}

impl TimerConfig {
    /// Build a config from minute values, the unit settings are kept in.
    pub fn from_minutes(focus: u64, short_break: u64, long_break: u64) -> Self {
        Self {
            focus_duration: focus.saturating_mul(60),
            break_duration: short_break.saturating_mul(60),
            long_break_duration: long_break.saturating_mul(60),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("focus_duration", self.focus_duration),
            ("break_duration", self.break_duration),
            ("long_break_duration", self.long_break_duration),
        ] {
            if value == 0 {
                return Err(ValidationError::ZeroDuration { field });
            }
        }
        for (field, value) in [
            ("long_break_interval", self.long_break_interval),
            ("target_iterations", self.target_iterations),
        ] {
            if value < 1 {
                return Err(ValidationError::BelowMinimum {
                    field,
                    min: 1,
                    value,
                });
            }
        }
        Ok(())
    }

    /// Configured length of `mode` in seconds. Idle has no length.
    pub fn duration_of(&self, mode: FixedMode) -> u64 {
        match mode {
            FixedMode::Idle => 0,
            FixedMode::Focus => self.focus_duration,
            FixedMode::Break => self.break_duration,
            FixedMode::LongBreak => self.long_break_duration,
        }
    }

    /// Whether the break that follows focus number `completed_sets` is long.
    pub fn is_long_break_after(&self, completed_sets: u32) -> bool {
        self.long_break_enabled
            && self.long_break_interval > 0
            && completed_sets % self.long_break_interval == 0
    }
}

/// Check an earn ratio for the elastic engine.
pub fn validate_ratio(ratio: f64) -> Result<(), ValidationError> {
    if ratio.is_finite() && ratio > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::InvalidRatio(ratio))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(TimerConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_durations_are_rejected() {
        let cfg = TimerConfig {
            break_duration: 0,
            ..TimerConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ValidationError::ZeroDuration {
                field: "break_duration"
            })
        );
    }

    #[test]
    fn zero_iterations_are_rejected() {
        let cfg = TimerConfig {
            target_iterations: 0,
            ..TimerConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ValidationError::BelowMinimum {
                field: "target_iterations",
                ..
            })
        ));
    }

    #[test]
    fn long_break_every_interval() {
        let cfg = TimerConfig {
            long_break_enabled: true,
            long_break_interval: 4,
            ..TimerConfig::default()
        };
        let long: Vec<u32> = (1..=12).filter(|n| cfg.is_long_break_after(*n)).collect();
        assert_eq!(long, vec![4, 8, 12]);

        let disabled = TimerConfig::default();
        assert!(!disabled.is_long_break_after(4));
    }

    #[test]
    fn ratio_validation() {
        assert!(validate_ratio(3.0).is_ok());
        assert!(validate_ratio(0.0).is_err());
        assert!(validate_ratio(-1.0).is_err());
        assert!(validate_ratio(f64::NAN).is_err());
    }

    #[test]
    fn from_minutes_converts_to_seconds() {
        let cfg = TimerConfig::from_minutes(25, 5, 15);
        assert_eq!(cfg.focus_duration, 1500);
        assert_eq!(cfg.duration_of(FixedMode::Break), 300);
        assert_eq!(cfg.duration_of(FixedMode::LongBreak), 900);
        assert_eq!(cfg.duration_of(FixedMode::Idle), 0);
    }
}
