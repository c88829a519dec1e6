//! In-memory implementation of the storage ports.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::ports::{KeyValueStore, SessionPayload, SessionStats, SessionStore};

/// Session log and key-value store held in memory.
///
/// Useful for headless hosts that persist elsewhere and for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: RefCell<Vec<(SessionPayload, DateTime<Utc>)>>,
    kv: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded session, oldest first.
    pub fn sessions(&self) -> Vec<SessionPayload> {
        self.sessions
            .borrow()
            .iter()
            .map(|(payload, _)| payload.clone())
            .collect()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.borrow().len()
    }
}

impl SessionStore for MemoryStore {
    fn record(&self, payload: &SessionPayload) -> Result<i64> {
        let mut sessions = self.sessions.borrow_mut();
        sessions.push((payload.clone(), Utc::now()));
        Ok(sessions.len() as i64)
    }

    fn stats(&self) -> Result<SessionStats> {
        let today = Utc::now().date_naive();
        let sessions = self.sessions.borrow();
        let mut stats = SessionStats::default();
        let mut days = BTreeSet::new();
        for (payload, at) in sessions.iter() {
            stats.total_sessions += 1;
            stats.total_focus_secs += payload.focus_seconds;
            stats.total_break_secs += payload.break_seconds;
            days.insert(at.date_naive());
            if at.date_naive() == today {
                stats.today_sessions += 1;
                stats.today_focus_secs += payload.focus_seconds;
            }
        }
        stats.total_days = days.len() as u64;
        Ok(stats)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.kv.borrow().get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        self.kv.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }
}
