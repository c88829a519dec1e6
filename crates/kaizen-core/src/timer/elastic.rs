//! Dual-accumulator accounting for the elastic-ratio timer.
//!
//! Focus time earns break time at `1 / ratio`. The balance is what has been
//! earned minus what has been taken, plus whatever was carried in from earlier
//! sessions. All operations take `now_ms` explicitly, which keeps this type
//! free of any clock and makes every method total.
//!
//! Invariant: before the status changes, the wall time of the open segment is
//! committed to the accumulator of the status it was spent in.

use serde::{Deserialize, Serialize};

pub const DEFAULT_RATIO: f64 = 3.0;
pub const NO_TAG: &str = "No Tag";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElasticStatus {
    Idle,
    Focus,
    Break,
}

impl ElasticStatus {
    pub fn label(self) -> &'static str {
        match self {
            ElasticStatus::Idle => "idle",
            ElasticStatus::Focus => "focus",
            ElasticStatus::Break => "break",
        }
    }
}

/// Read-only projection including the in-flight segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElasticStats {
    pub status: ElasticStatus,
    pub focus_ms: u64,
    pub break_ms: u64,
    pub earned_break_ms: f64,
    pub balance_ms: f64,
    pub carried_ms: i64,
    pub ratio: f64,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElasticState {
    ratio: f64,
    accumulated_focus_ms: u64,
    accumulated_break_ms: u64,
    carried_balance_ms: i64,
    status: ElasticStatus,
    segment_started_at_ms: Option<u64>,
    tag: String,
}

impl Default for ElasticState {
    fn default() -> Self {
        Self::new(DEFAULT_RATIO)
    }
}

impl ElasticState {
    pub fn new(ratio: f64) -> Self {
        Self {
            ratio,
            accumulated_focus_ms: 0,
            accumulated_break_ms: 0,
            carried_balance_ms: 0,
            status: ElasticStatus::Idle,
            segment_started_at_ms: None,
            tag: NO_TAG.to_string(),
        }
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    pub fn status(&self) -> ElasticStatus {
        self.status
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn accumulated_focus_ms(&self) -> u64 {
        self.accumulated_focus_ms
    }

    pub fn accumulated_break_ms(&self) -> u64 {
        self.accumulated_break_ms
    }

    pub fn carried_balance_ms(&self) -> i64 {
        self.carried_balance_ms
    }

    /// Whether wall time is currently flowing into an accumulator.
    pub fn is_segment_open(&self) -> bool {
        self.status != ElasticStatus::Idle && self.segment_started_at_ms.is_some()
    }

    /// Change the earn rate for every later derivation. Already accumulated
    /// time is untouched; only how it converts to earned break changes.
    pub fn set_ratio(&mut self, ratio: f64) {
        self.ratio = ratio;
    }

    pub fn set_tag(&mut self, tag: impl Into<String>) {
        self.tag = tag.into();
    }

    pub fn set_carried_balance(&mut self, ms: i64) {
        self.carried_balance_ms = ms;
    }

    pub fn switch_status(&mut self, status: ElasticStatus, now_ms: u64) {
        self.commit_current_segment(now_ms);
        self.status = status;
        self.segment_started_at_ms = match status {
            ElasticStatus::Idle => None,
            _ => Some(now_ms),
        };
    }

    /// Move the open segment's wall time into its accumulator and restart
    /// the segment at `now_ms`.
    pub fn commit_current_segment(&mut self, now_ms: u64) {
        let Some(started) = self.segment_started_at_ms else {
            return;
        };
        let elapsed = now_ms.saturating_sub(started);
        match self.status {
            ElasticStatus::Focus => {
                self.accumulated_focus_ms = self.accumulated_focus_ms.saturating_add(elapsed)
            }
            ElasticStatus::Break => {
                self.accumulated_break_ms = self.accumulated_break_ms.saturating_add(elapsed)
            }
            ElasticStatus::Idle => {}
        }
        self.segment_started_at_ms = Some(now_ms);
    }

    /// Commit, then stop the segment clock without changing status.
    pub fn suspend(&mut self, now_ms: u64) {
        self.commit_current_segment(now_ms);
        self.segment_started_at_ms = None;
    }

    /// Restart the segment clock of the current status at `now_ms`.
    pub fn unsuspend(&mut self, now_ms: u64) {
        if self.status != ElasticStatus::Idle && self.segment_started_at_ms.is_none() {
            self.segment_started_at_ms = Some(now_ms);
        }
    }

    /// Apply signed manual corrections. Accumulators never drop below zero.
    pub fn adjust_totals(&mut self, focus_delta_ms: i64, break_delta_ms: i64, now_ms: u64) {
        self.commit_current_segment(now_ms);
        self.accumulated_focus_ms = apply_delta(self.accumulated_focus_ms, focus_delta_ms);
        self.accumulated_break_ms = apply_delta(self.accumulated_break_ms, break_delta_ms);
        if self.segment_started_at_ms.is_some() {
            self.segment_started_at_ms = Some(now_ms);
        }
    }

    pub fn stats(&self, now_ms: u64) -> ElasticStats {
        let in_flight = self
            .segment_started_at_ms
            .map(|started| now_ms.saturating_sub(started))
            .unwrap_or(0);
        let mut focus_ms = self.accumulated_focus_ms;
        let mut break_ms = self.accumulated_break_ms;
        match self.status {
            ElasticStatus::Focus => focus_ms = focus_ms.saturating_add(in_flight),
            ElasticStatus::Break => break_ms = break_ms.saturating_add(in_flight),
            ElasticStatus::Idle => {}
        }
        let earned_break_ms = earned_break_ms(focus_ms, self.ratio);
        ElasticStats {
            status: self.status,
            focus_ms,
            break_ms,
            earned_break_ms,
            balance_ms: balance_ms(self.carried_balance_ms, focus_ms, break_ms, self.ratio),
            carried_ms: self.carried_balance_ms,
            ratio: self.ratio,
            tag: self.tag.clone(),
        }
    }

    /// Back to idle with empty accumulators. The carried balance stays.
    pub fn reset(&mut self) {
        self.status = ElasticStatus::Idle;
        self.accumulated_focus_ms = 0;
        self.accumulated_break_ms = 0;
        self.segment_started_at_ms = None;
    }

    /// Rebuild from persisted fields with the segment clock stopped.
    pub(crate) fn from_parts(
        ratio: f64,
        accumulated_focus_ms: u64,
        accumulated_break_ms: u64,
        carried_balance_ms: i64,
        status: ElasticStatus,
        tag: String,
    ) -> Self {
        Self {
            ratio,
            accumulated_focus_ms,
            accumulated_break_ms,
            carried_balance_ms,
            status,
            segment_started_at_ms: None,
            tag,
        }
    }
}

pub fn earned_break_ms(focus_ms: u64, ratio: f64) -> f64 {
    focus_ms as f64 / ratio
}

/// `carried + focus / ratio - break`, in milliseconds.
pub fn balance_ms(carried_ms: i64, focus_ms: u64, break_ms: u64, ratio: f64) -> f64 {
    carried_ms as f64 + earned_break_ms(focus_ms, ratio) - break_ms as f64
}

/// Net balance a committed session contributes: earned minus taken.
pub fn session_net_balance_ms(focus_secs: u64, break_secs: u64, ratio: f64) -> f64 {
    (focus_secs as f64 * 1000.0) / ratio - break_secs as f64 * 1000.0
}

fn apply_delta(value: u64, delta: i64) -> u64 {
    if delta >= 0 {
        value.saturating_add(delta.unsigned_abs())
    } else {
        value.saturating_sub(delta.unsigned_abs())
    }
}
