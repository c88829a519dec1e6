//! Drift-corrected tick accounting.
//!
//! Hosts fire the periodic callback roughly once a second, but schedulers
//! throttle background timers. Instead of assuming one second per callback,
//! the ticker measures the real gap since the last applied tick and rounds it
//! to whole seconds.

/// Tracks the timestamp of the last applied tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriftTicker {
    last_tick_ms: Option<u64>,
}

impl DriftTicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin measuring from `now_ms`.
    pub fn start(&mut self, now_ms: u64) {
        self.last_tick_ms = Some(now_ms);
    }

    pub fn stop(&mut self) {
        self.last_tick_ms = None;
    }

    pub fn is_active(&self) -> bool {
        self.last_tick_ms.is_some()
    }

    /// Whole seconds to apply for a callback at `now_ms`.
    ///
    /// Returns `None` while stopped or when the rounded gap is under one
    /// second; in that case the reference point is left untouched so the
    /// fraction is picked up by the next callback.
    pub fn delta_secs(&mut self, now_ms: u64) -> Option<u64> {
        let last = self.last_tick_ms?;
        let elapsed = now_ms.saturating_sub(last);
        let secs = (elapsed + 500) / 1000;
        if secs >= 1 {
            self.last_tick_ms = Some(now_ms);
            Some(secs)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_ticker_yields_nothing() {
        let mut t = DriftTicker::new();
        assert_eq!(t.delta_secs(5_000), None);
    }

    #[test]
    fn delayed_callback_rounds_real_gap() {
        let mut t = DriftTicker::new();
        t.start(10_000);
        assert_eq!(t.delta_secs(13_400), Some(3));
        assert_eq!(t.delta_secs(14_600), Some(1));
        assert_eq!(t.delta_secs(16_500), Some(2));
    }

    #[test]
    fn sub_half_second_gap_keeps_reference_point() {
        let mut t = DriftTicker::new();
        t.start(0);
        assert_eq!(t.delta_secs(400), None);
        assert_eq!(t.delta_secs(1_000), Some(1));
    }

    #[test]
    fn clock_going_backwards_is_ignored() {
        let mut t = DriftTicker::new();
        t.start(5_000);
        assert_eq!(t.delta_secs(1_000), None);
        assert!(t.is_active());
        t.stop();
        assert!(!t.is_active());
    }
}
