//! # Kaizen Core Library
//!
//! Timing engines for focus sessions. Everything here is host-agnostic: the
//! engines are driven by a periodic callback and talk to the outside world
//! through the ports in [`ports`], so the same core serves the `kaizen` CLI
//! and any other host.
//!
//! ## Architecture
//!
//! - **Fixed-cycle engine**: focus / break / long-break phases with a target
//!   number of focus sets, plus a count-up stopwatch sub-mode
//! - **Elastic engine**: focus earns break time at a configurable ratio, with
//!   a running balance, debt warnings and carry-over between sessions
//! - **Storage**: SQLite session log and key-value store, TOML configuration
//!
//! ## Key Components
//!
//! - [`FixedCycleEngine`]: pomodoro-style phase state machine
//! - [`ElasticEngine`]: ratio-based focus/break accounting
//! - [`Database`]: session log and snapshot persistence
//! - [`Config`]: application configuration management

pub mod clock;
pub mod error;
pub mod events;
pub mod ports;
pub mod snapshot;
pub mod storage;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use events::{Event, EventBus};
pub use ports::{
    EngineContext, KeyValueStore, LogNotifier, Notifier, SessionPayload, SessionStats,
    SessionStore, SilentNotifier, TimerType,
};
pub use snapshot::{EngineKind, EngineSnapshot, KvSnapshotStore, SnapshotStore};
pub use storage::{Config, Database, MemoryStore};
pub use timer::{
    AutoStart, ElasticEngine, ElasticSettings, ElasticStatus, FixedCycleEngine, FixedMode,
    RunState, TimerConfig,
};
