//! Balance-debt warnings with a monotonic threshold.
//!
//! The balance is checked on every tick, so warnings are rate-limited by
//! whole minutes of debt rather than by time: one warning per
//! `interval_minutes` of additional debt.

pub const DEFAULT_WARN_INTERVAL_MINUTES: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebtWarner {
    interval_minutes: u64,
    last_warned_minute: u64,
}

impl Default for DebtWarner {
    fn default() -> Self {
        Self::new(DEFAULT_WARN_INTERVAL_MINUTES)
    }
}

impl DebtWarner {
    /// An interval of zero disables warnings.
    pub fn new(interval_minutes: u64) -> Self {
        Self {
            interval_minutes,
            last_warned_minute: 0,
        }
    }

    pub fn interval_minutes(&self) -> u64 {
        self.interval_minutes
    }

    pub fn last_warned_minute(&self) -> u64 {
        self.last_warned_minute
    }

    pub fn set_interval_minutes(&mut self, interval_minutes: u64) {
        self.interval_minutes = interval_minutes;
    }

    pub fn reset(&mut self) {
        self.last_warned_minute = 0;
    }

    /// Returns the whole minutes in debt when a warning is due.
    pub fn check(&mut self, balance_ms: f64) -> Option<u64> {
        if balance_ms >= 0.0 || balance_ms.is_nan() {
            self.last_warned_minute = 0;
            return None;
        }
        if self.interval_minutes == 0 {
            return None;
        }
        let minutes_in_debt = (balance_ms.abs() / 60_000.0).floor() as u64;
        if minutes_in_debt >= self.last_warned_minute + self.interval_minutes {
            self.last_warned_minute =
                (minutes_in_debt / self.interval_minutes) * self.interval_minutes;
            Some(minutes_in_debt)
        } else {
            None
        }
    }
}
