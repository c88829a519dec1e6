//! Collaborator contracts the engines are written against.
//!
//! Three ports reach outside the engines: the session log
//! ([`SessionStore`]), a generic settings store ([`KeyValueStore`], adapted
//! into a typed [`SnapshotStore`](crate::snapshot::SnapshotStore)) and a
//! [`Notifier`]. All of them are fallible, but engine behaviour never depends
//! on their success: failures are logged and dropped here.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::Result;
use crate::snapshot::SnapshotStore;

/// Which engine (or engine sub-mode) produced a session record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerType {
    Standard,
    Stopwatch,
    Flexible,
}

impl TimerType {
    pub fn as_str(self) -> &'static str {
        match self {
            TimerType::Standard => "standard",
            TimerType::Stopwatch => "stopwatch",
            TimerType::Flexible => "flexible",
        }
    }
}

impl std::str::FromStr for TimerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(TimerType::Standard),
            "stopwatch" => Ok(TimerType::Stopwatch),
            "flexible" => Ok(TimerType::Flexible),
            other => Err(format!("unknown timer type: {other}")),
        }
    }
}

/// One completed session as appended to the session log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPayload {
    pub tag: String,
    pub focus_seconds: u64,
    pub break_seconds: u64,
    pub ratio: f64,
    pub timer_type: TimerType,
}

/// Aggregate totals over the session log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_sessions: u64,
    pub total_focus_secs: u64,
    pub total_break_secs: u64,
    /// Distinct calendar days with at least one session.
    pub total_days: u64,
    pub today_sessions: u64,
    pub today_focus_secs: u64,
}

pub trait SessionStore {
    /// Append a session. Returns the new record id.
    fn record(&self, payload: &SessionPayload) -> Result<i64>;

    fn stats(&self) -> Result<SessionStats>;
}

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn save(&self, key: &str, value: &str) -> Result<()>;
}

pub trait Notifier {
    fn show(&self, title: &str, message: &str, icon: &str) -> Result<()>;
}

/// Writes notifications to the log instead of the desktop.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn show(&self, title: &str, message: &str, icon: &str) -> Result<()> {
        tracing::info!(icon, "{title}: {message}");
        Ok(())
    }
}

/// Drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn show(&self, _title: &str, _message: &str, _icon: &str) -> Result<()> {
        Ok(())
    }
}

/// Everything an engine needs from the outside world.
///
/// Cloning is cheap; both engines of one process usually share a context.
#[derive(Clone)]
pub struct EngineContext {
    pub clock: Rc<dyn Clock>,
    pub sessions: Rc<dyn SessionStore>,
    pub snapshots: Rc<dyn SnapshotStore>,
    pub notifier: Rc<dyn Notifier>,
}

impl EngineContext {
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Fire-and-forget append. Returns whether the store accepted it.
    pub(crate) fn record_session(&self, payload: &SessionPayload) -> bool {
        match self.sessions.record(payload) {
            Ok(id) => {
                tracing::debug!(id, tag = %payload.tag, "session recorded");
                true
            }
            Err(e) => {
                tracing::warn!("failed to record {} session: {e}", payload.timer_type.as_str());
                false
            }
        }
    }

    pub(crate) fn notify(&self, title: &str, message: &str, icon: &str) {
        if let Err(e) = self.notifier.show(title, message, icon) {
            tracing::debug!("notification dropped: {e}");
        }
    }
}
