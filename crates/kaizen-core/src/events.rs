use std::sync::mpsc::{channel, Receiver, Sender};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{ElasticStatus, FixedMode};

/// Every state change in either engine produces an Event.
/// Renderers subscribe to them; the notifier reacts to the completion ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Full projection of the fixed-cycle engine.
    StateSnapshot {
        mode: FixedMode,
        /// Remaining seconds, or elapsed seconds in stopwatch mode.
        display_secs: u64,
        is_running: bool,
        is_paused: bool,
        is_stopwatch: bool,
        completed_sets: u32,
        target_iterations: u32,
        tag: String,
        at: DateTime<Utc>,
    },
    PhaseCompleted {
        completed_mode: FixedMode,
        next_mode: FixedMode,
        completed_sets: u32,
        skipped: bool,
        at: DateTime<Utc>,
    },
    /// Target iteration count reached; the engine is idle again.
    SessionCompleted {
        completed_sets: u32,
        tag: String,
        at: DateTime<Utc>,
    },
    TimerStopped {
        /// Seconds handed to the session store, if the stop produced a record.
        recorded_secs: Option<u64>,
        at: DateTime<Utc>,
    },
    /// Full projection of the elastic-ratio engine.
    BalanceSnapshot {
        status: ElasticStatus,
        is_paused: bool,
        focus_ms: u64,
        break_ms: u64,
        earned_break_ms: f64,
        balance_ms: f64,
        carried_ms: i64,
        ratio: f64,
        tag: String,
        at: DateTime<Utc>,
    },
    BalanceWarning {
        minutes_in_debt: u64,
        balance_ms: f64,
        at: DateTime<Utc>,
    },
    SessionCommitted {
        tag: String,
        focus_secs: u64,
        break_secs: u64,
        carried_balance_ms: i64,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Stable kebab-case name, handy for logs and filters.
    pub fn name(&self) -> &'static str {
        match self {
            Event::StateSnapshot { .. } => "state-snapshot",
            Event::PhaseCompleted { .. } => "phase-completed",
            Event::SessionCompleted { .. } => "session-completed",
            Event::TimerStopped { .. } => "timer-stopped",
            Event::BalanceSnapshot { .. } => "balance-snapshot",
            Event::BalanceWarning { .. } => "balance-warning",
            Event::SessionCommitted { .. } => "session-committed",
        }
    }

    pub fn is_snapshot(&self) -> bool {
        matches!(
            self,
            Event::StateSnapshot { .. } | Event::BalanceSnapshot { .. }
        )
    }
}

/// Typed fan-out of engine events.
///
/// Each subscriber gets its own channel; subscribers whose receiver has been
/// dropped are pruned on the next publish.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Sender<Event>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Receiver<Event> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn publish(&mut self, event: &Event) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
