//! Typed persistence for in-flight engine state.
//!
//! Each engine writes its transient state as one [`EngineSnapshot`] under a
//! single key. On startup the snapshot is read once, before the first tick.
//! A snapshot marked active is always restored as paused: time that passed
//! while the process was down cannot be attributed to any segment.

use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ports::KeyValueStore;
use crate::timer::{ElasticStatus, FixedMode, TimerConfig};

pub const STANDARD_TIMER_KEY: &str = "standardTimerState";
pub const FLEXIBLE_TIMER_KEY: &str = "flexibleTimerState";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Standard,
    Flexible,
}

impl EngineKind {
    pub fn storage_key(self) -> &'static str {
        match self {
            EngineKind::Standard => STANDARD_TIMER_KEY,
            EngineKind::Flexible => FLEXIBLE_TIMER_KEY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedSnapshot {
    pub mode: FixedMode,
    pub is_stopwatch: bool,
    pub seconds_remaining: u64,
    pub seconds_elapsed: u64,
    pub tag: String,
    pub completed_sets: u32,
    pub target_iterations: u32,
    pub session_config: TimerConfig,
    pub is_active_session: bool,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElasticSnapshot {
    pub status: ElasticStatus,
    pub ratio: f64,
    pub accumulated_focus_ms: u64,
    pub accumulated_break_ms: u64,
    /// Kept even for inactive snapshots so carry-over survives restarts.
    pub carried_balance_ms: i64,
    pub tag: String,
    pub is_active_session: bool,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineSnapshot {
    Fixed(FixedSnapshot),
    Elastic(ElasticSnapshot),
}

impl EngineSnapshot {
    pub fn kind(&self) -> EngineKind {
        match self {
            EngineSnapshot::Fixed(_) => EngineKind::Standard,
            EngineSnapshot::Elastic(_) => EngineKind::Flexible,
        }
    }

    pub fn is_active_session(&self) -> bool {
        match self {
            EngineSnapshot::Fixed(s) => s.is_active_session,
            EngineSnapshot::Elastic(s) => s.is_active_session,
        }
    }
}

/// Persistence port for engine snapshots.
pub trait SnapshotStore {
    fn save(&self, snapshot: &EngineSnapshot) -> Result<()>;

    fn load(&self, kind: EngineKind) -> Result<Option<EngineSnapshot>>;
}

/// Stores snapshots as JSON text in a generic key-value settings store.
pub struct KvSnapshotStore<S: KeyValueStore + ?Sized> {
    inner: Rc<S>,
}

impl<S: KeyValueStore + ?Sized> KvSnapshotStore<S> {
    pub fn new(inner: Rc<S>) -> Self {
        Self { inner }
    }
}

impl<S: KeyValueStore + ?Sized> SnapshotStore for KvSnapshotStore<S> {
    fn save(&self, snapshot: &EngineSnapshot) -> Result<()> {
        let json = match snapshot {
            EngineSnapshot::Fixed(s) => serde_json::to_string(s)?,
            EngineSnapshot::Elastic(s) => serde_json::to_string(s)?,
        };
        self.inner.save(snapshot.kind().storage_key(), &json)
    }

    fn load(&self, kind: EngineKind) -> Result<Option<EngineSnapshot>> {
        let Some(json) = self.inner.get(kind.storage_key())? else {
            return Ok(None);
        };
        let snapshot = match kind {
            EngineKind::Standard => EngineSnapshot::Fixed(serde_json::from_str(&json)?),
            EngineKind::Flexible => EngineSnapshot::Elastic(serde_json::from_str(&json)?),
        };
        Ok(Some(snapshot))
    }
}

/// Fire-and-forget write used on every state-changing command.
pub(crate) fn save_quietly(store: &dyn SnapshotStore, snapshot: &EngineSnapshot) {
    if let Err(e) = store.save(snapshot) {
        tracing::warn!("failed to persist {:?} timer state: {e}", snapshot.kind());
    }
}

/// Read-once restore. Any failure yields `None` so the engine starts fresh.
pub(crate) fn load_quietly(store: &dyn SnapshotStore, kind: EngineKind) -> Option<EngineSnapshot> {
    match store.load(kind) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::warn!("discarding unreadable {kind:?} timer state: {e}");
            None
        }
    }
}
