//! Fixed-cycle timer engine.
//!
//! A phase state machine bounded by a target iteration count:
//!
//! ```text
//! Idle -> Focus -> (Break | LongBreak) -> Focus -> ... -> Idle
//! ```
//!
//! The engine has no internal thread. The host calls [`FixedCycleEngine::poll`]
//! about once a second; the elapsed wall-clock gap is measured by a
//! [`DriftTicker`] so throttled callbacks are not under-counted.
//!
//! Run state is one of stopped (idle), running or paused. After a phase
//! completes the engine either keeps running (auto-advance) or waits paused
//! at the start of the next phase.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::config::{TimerConfig, DEFAULT_TAG};
use super::ticker::DriftTicker;
use crate::events::{Event, EventBus};
use crate::ports::{EngineContext, SessionPayload, TimerType};
use crate::snapshot::{self, EngineKind, EngineSnapshot, FixedSnapshot};

/// Stopwatch focus shorter than this is discarded on stop.
pub const MIN_STOPWATCH_RECORD_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FixedMode {
    Idle,
    Focus,
    Break,
    LongBreak,
}

impl FixedMode {
    pub fn is_break(self) -> bool {
        matches!(self, FixedMode::Break | FixedMode::LongBreak)
    }

    pub fn label(self) -> &'static str {
        match self {
            FixedMode::Idle => "idle",
            FixedMode::Focus => "focus",
            FixedMode::Break => "break",
            FixedMode::LongBreak => "long-break",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Stopped,
    Running,
    Paused,
}

/// Which upcoming phases start without user action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoStart {
    pub focus: bool,
    pub breaks: bool,
}

pub struct FixedCycleEngine {
    ctx: EngineContext,
    bus: EventBus,
    config: TimerConfig,
    mode: FixedMode,
    run_state: RunState,
    seconds_remaining: u64,
    seconds_elapsed: u64,
    completed_sets: u32,
    tag: String,
    auto_start: AutoStart,
    ticker: DriftTicker,
}

impl FixedCycleEngine {
    /// Create an idle engine. Call [`restore`](Self::restore) before the
    /// first tick to pick up a session from a previous run.
    pub fn new(ctx: EngineContext) -> Self {
        let config = TimerConfig::default();
        Self {
            ctx,
            bus: EventBus::new(),
            seconds_remaining: config.focus_duration,
            tag: config.tag.clone(),
            config,
            mode: FixedMode::Idle,
            run_state: RunState::Stopped,
            seconds_elapsed: 0,
            completed_sets: 0,
            auto_start: AutoStart::default(),
            ticker: DriftTicker::new(),
        }
    }

    pub fn subscribe(&mut self) -> std::sync::mpsc::Receiver<Event> {
        self.bus.subscribe()
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn mode(&self) -> FixedMode {
        self.mode
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn is_running(&self) -> bool {
        self.run_state == RunState::Running
    }

    pub fn is_paused(&self) -> bool {
        self.run_state == RunState::Paused
    }

    pub fn is_idle(&self) -> bool {
        self.run_state == RunState::Stopped
    }

    pub fn is_stopwatch(&self) -> bool {
        self.config.stopwatch
    }

    pub fn seconds_remaining(&self) -> u64 {
        self.seconds_remaining
    }

    pub fn seconds_elapsed(&self) -> u64 {
        self.seconds_elapsed
    }

    /// What a clock face shows: elapsed in stopwatch mode, remaining otherwise.
    pub fn display_secs(&self) -> u64 {
        if self.config.stopwatch {
            self.seconds_elapsed
        } else {
            self.seconds_remaining
        }
    }

    pub fn completed_sets(&self) -> u32 {
        self.completed_sets
    }

    pub fn target_iterations(&self) -> u32 {
        self.config.target_iterations
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    pub fn auto_start(&self) -> AutoStart {
        self.auto_start
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        Event::StateSnapshot {
            mode: self.mode,
            display_secs: self.display_secs(),
            is_running: self.is_running(),
            is_paused: self.is_paused(),
            is_stopwatch: self.config.stopwatch,
            completed_sets: self.completed_sets,
            target_iterations: self.config.target_iterations,
            tag: self.tag.clone(),
            at: Utc::now(),
        }
    }

    /// Serializable form of the current state.
    pub fn to_snapshot(&self) -> FixedSnapshot {
        FixedSnapshot {
            mode: self.mode,
            is_stopwatch: self.config.stopwatch,
            seconds_remaining: self.seconds_remaining,
            seconds_elapsed: self.seconds_elapsed,
            tag: self.tag.clone(),
            completed_sets: self.completed_sets,
            target_iterations: self.config.target_iterations,
            session_config: self.config.clone(),
            is_active_session: self.run_state != RunState::Stopped,
            saved_at: Some(Utc::now()),
        }
    }

    // ── Settings ─────────────────────────────────────────────────────

    pub fn set_auto_start(&mut self, auto_start: AutoStart) {
        self.auto_start = auto_start;
    }

    /// Change the tag of the next session. A later `start_session` whose
    /// config has no tag of its own uses it. Ignored while a session is active.
    pub fn set_tag(&mut self, tag: impl Into<String>) -> bool {
        if !self.is_idle() {
            return false;
        }
        self.tag = tag.into();
        self.config.tag = self.tag.clone();
        self.emit_snapshot();
        true
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin a session with `config`. Resumes instead when paused, and does
    /// nothing while already running.
    pub fn start_session(&mut self, config: TimerConfig) -> Option<Event> {
        match self.run_state {
            RunState::Running => None,
            RunState::Paused => self.resume(),
            RunState::Stopped => {
                self.mode = if config.stopwatch && config.initial_mode != FixedMode::Idle {
                    config.initial_mode
                } else {
                    FixedMode::Focus
                };
                if !config.tag.trim().is_empty() {
                    self.tag = config.tag.clone();
                } else if self.tag.trim().is_empty() {
                    self.tag = DEFAULT_TAG.to_string();
                }
                self.config = TimerConfig {
                    tag: self.tag.clone(),
                    ..config
                };
                self.completed_sets = 0;
                self.seconds_elapsed = 0;
                self.seconds_remaining = self.config.duration_of(self.mode);
                self.run_state = RunState::Running;
                self.ticker.start(self.ctx.now_ms());
                tracing::debug!(mode = self.mode.label(), tag = %self.tag, "session started");

                self.persist();
                Some(self.emit_snapshot())
            }
        }
    }

    /// The periodic callback. Applies the drift-corrected gap since the
    /// last applied tick.
    pub fn poll(&mut self) -> Option<Event> {
        if !self.is_running() {
            return None;
        }
        let delta = self.ticker.delta_secs(self.ctx.now_ms())?;
        self.tick(delta)
    }

    /// Advance by `delta_secs`. Returns the completion event when the
    /// current phase runs out; time beyond the end of a phase is dropped.
    pub fn tick(&mut self, delta_secs: u64) -> Option<Event> {
        if !self.is_running() || delta_secs == 0 {
            return None;
        }
        if self.config.stopwatch {
            self.seconds_elapsed = self.seconds_elapsed.saturating_add(delta_secs);
            self.emit_snapshot();
            return None;
        }
        self.seconds_remaining = self.seconds_remaining.saturating_sub(delta_secs);
        if self.seconds_remaining == 0 {
            return self.complete_phase(false);
        }
        self.emit_snapshot();
        None
    }

    /// End the current phase early. No alarm, and a skipped focus phase is
    /// not recorded. Stopwatch sessions have no phases to skip.
    pub fn skip_phase(&mut self) -> Option<Event> {
        if self.is_idle() || self.config.stopwatch {
            return None;
        }
        self.complete_phase(true)
    }

    pub fn pause(&mut self) -> Option<Event> {
        if !self.is_running() {
            return None;
        }
        // Whole seconds already due are applied before freezing.
        let mut completion = None;
        if let Some(delta) = self.ticker.delta_secs(self.ctx.now_ms()) {
            completion = self.tick(delta);
        }
        if !self.is_running() {
            return completion;
        }
        self.run_state = RunState::Paused;
        self.ticker.stop();
        self.persist();
        Some(self.emit_snapshot())
    }

    pub fn resume(&mut self) -> Option<Event> {
        if !self.is_paused() {
            return None;
        }
        self.run_state = RunState::Running;
        self.ticker.start(self.ctx.now_ms());
        self.persist();
        Some(self.emit_snapshot())
    }

    pub fn toggle_pause(&mut self) -> Option<Event> {
        match self.run_state {
            RunState::Running => self.pause(),
            RunState::Paused => self.resume(),
            RunState::Stopped => None,
        }
    }

    /// End the session. A stopwatch focus segment longer than
    /// [`MIN_STOPWATCH_RECORD_SECS`] is recorded; everything else is
    /// discarded. Stopping an idle engine does nothing.
    pub fn stop(&mut self) -> Option<Event> {
        if self.is_idle() {
            return None;
        }
        if self.config.stopwatch && self.is_running() {
            if let Some(delta) = self.ticker.delta_secs(self.ctx.now_ms()) {
                self.seconds_elapsed = self.seconds_elapsed.saturating_add(delta);
            }
        }

        let mut recorded_secs = None;
        if self.config.stopwatch
            && self.mode == FixedMode::Focus
            && self.seconds_elapsed > MIN_STOPWATCH_RECORD_SECS
        {
            self.ctx.record_session(&SessionPayload {
                tag: self.tag.clone(),
                focus_seconds: self.seconds_elapsed,
                break_seconds: 0,
                ratio: 1.0,
                timer_type: TimerType::Stopwatch,
            });
            recorded_secs = Some(self.seconds_elapsed);
        }

        self.reset_to_idle();
        self.persist();
        let event = Event::TimerStopped {
            recorded_secs,
            at: Utc::now(),
        };
        self.bus.publish(&event);
        self.emit_snapshot();
        Some(event)
    }

    /// Write the current state. Hosts call this on application close.
    pub fn persist(&self) {
        snapshot::save_quietly(
            self.ctx.snapshots.as_ref(),
            &EngineSnapshot::Fixed(self.to_snapshot()),
        );
    }

    /// Load a session saved by a previous run. An active session always comes
    /// back paused. Returns whether anything was restored.
    pub fn restore(&mut self) -> bool {
        if !self.is_idle() {
            return false;
        }
        let Some(EngineSnapshot::Fixed(saved)) =
            snapshot::load_quietly(self.ctx.snapshots.as_ref(), EngineKind::Standard)
        else {
            return false;
        };
        if !saved.is_active_session || saved.mode == FixedMode::Idle {
            return false;
        }

        let mut config = saved.session_config;
        config.target_iterations = saved.target_iterations.max(1);
        config.stopwatch = saved.is_stopwatch;
        self.completed_sets = saved.completed_sets.min(config.target_iterations);
        self.config = config;
        self.mode = saved.mode;
        self.tag = saved.tag;
        self.seconds_remaining = saved.seconds_remaining;
        self.seconds_elapsed = saved.seconds_elapsed;
        self.run_state = RunState::Paused;
        self.ticker.stop();
        tracing::info!(
            mode = self.mode.label(),
            remaining = self.seconds_remaining,
            "restored standard timer as paused"
        );

        self.emit_snapshot();
        true
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn complete_phase(&mut self, skipped: bool) -> Option<Event> {
        if self.mode == FixedMode::Idle {
            return None;
        }
        self.ticker.stop();
        let previous = self.mode;

        if !skipped && previous == FixedMode::Focus {
            self.ctx.record_session(&SessionPayload {
                tag: self.tag.clone(),
                focus_seconds: self.config.focus_duration,
                break_seconds: 0,
                ratio: 1.0,
                timer_type: TimerType::Standard,
            });
        }

        let next = if previous == FixedMode::Focus {
            self.completed_sets = self.completed_sets.saturating_add(1);
            if self.config.is_long_break_after(self.completed_sets) {
                FixedMode::LongBreak
            } else {
                FixedMode::Break
            }
        } else if self.completed_sets >= self.config.target_iterations {
            return Some(self.finish_session());
        } else {
            FixedMode::Focus
        };

        self.mode = next;
        self.seconds_remaining = self.config.duration_of(next);
        let event = Event::PhaseCompleted {
            completed_mode: previous,
            next_mode: next,
            completed_sets: self.completed_sets,
            skipped,
            at: Utc::now(),
        };
        self.bus.publish(&event);
        if !skipped {
            self.announce_phase(previous, next);
        }

        let auto = if next == FixedMode::Focus {
            self.auto_start.focus
        } else {
            self.auto_start.breaks
        };
        if auto && !self.config.stopwatch {
            self.run_state = RunState::Running;
            self.ticker.start(self.ctx.now_ms());
        } else {
            self.run_state = RunState::Paused;
        }
        tracing::debug!(
            from = previous.label(),
            to = next.label(),
            sets = self.completed_sets,
            skipped,
            "phase completed"
        );

        self.persist();
        self.emit_snapshot();
        Some(event)
    }

    fn finish_session(&mut self) -> Event {
        let completed_sets = self.completed_sets;
        self.reset_to_idle();
        self.persist();

        let event = Event::SessionCompleted {
            completed_sets,
            tag: self.tag.clone(),
            at: Utc::now(),
        };
        self.bus.publish(&event);
        self.ctx.notify(
            "Session Complete!",
            "Congratulations! You've finished your target iterations.",
            "trophy",
        );
        tracing::debug!(completed_sets, "session completed");
        self.emit_snapshot();
        event
    }

    fn announce_phase(&self, completed: FixedMode, next: FixedMode) {
        match completed {
            FixedMode::Focus => {
                let message = if next == FixedMode::LongBreak {
                    "Great job! Time for a long break."
                } else {
                    "Time to take a break."
                };
                self.ctx.notify("Focus Complete", message, "mug-hot");
            }
            FixedMode::Break | FixedMode::LongBreak => {
                self.ctx.notify("Break Over", "Ready to focus again?", "bolt");
            }
            FixedMode::Idle => {}
        }
    }

    fn reset_to_idle(&mut self) {
        self.mode = FixedMode::Idle;
        self.run_state = RunState::Stopped;
        self.ticker.stop();
        self.completed_sets = 0;
        self.seconds_elapsed = 0;
        self.seconds_remaining = self.config.focus_duration;
    }

    fn emit_snapshot(&mut self) -> Event {
        let event = self.snapshot();
        self.bus.publish(&event);
        event
    }
}
