//! Elastic-ratio timer engine.
//!
//! Wraps [`ElasticState`] with a clock, persistence, the session log and debt
//! warnings. The host calls [`ElasticEngine::poll`] about once a second to
//! refresh subscribers; accounting itself never depends on the poll cadence
//! because every figure is derived from segment timestamps.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::debt::{DebtWarner, DEFAULT_WARN_INTERVAL_MINUTES};
use super::elastic::{
    session_net_balance_ms, ElasticState, ElasticStats, ElasticStatus, DEFAULT_RATIO,
};
use crate::events::{Event, EventBus};
use crate::ports::{EngineContext, SessionPayload, TimerType};
use crate::snapshot::{self, ElasticSnapshot, EngineKind, EngineSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElasticSettings {
    /// Minutes of focus per minute of earned break.
    pub ratio: f64,
    /// Keep the net balance of a committed session for the next one.
    pub carry_over: bool,
    pub warn_interval_minutes: u64,
}

impl Default for ElasticSettings {
    fn default() -> Self {
        Self {
            ratio: DEFAULT_RATIO,
            carry_over: true,
            warn_interval_minutes: DEFAULT_WARN_INTERVAL_MINUTES,
        }
    }
}

pub struct ElasticEngine {
    ctx: EngineContext,
    bus: EventBus,
    state: ElasticState,
    carry_over: bool,
    warner: DebtWarner,
    paused: bool,
}

impl ElasticEngine {
    pub fn new(ctx: EngineContext, settings: ElasticSettings) -> Self {
        Self {
            ctx,
            bus: EventBus::new(),
            state: ElasticState::new(settings.ratio),
            carry_over: settings.carry_over,
            warner: DebtWarner::new(settings.warn_interval_minutes),
            paused: false,
        }
    }

    pub fn subscribe(&mut self) -> std::sync::mpsc::Receiver<Event> {
        self.bus.subscribe()
    }

    pub fn state(&self) -> &ElasticState {
        &self.state
    }

    pub fn status(&self) -> ElasticStatus {
        self.state.status()
    }

    pub fn is_active(&self) -> bool {
        self.state.status() != ElasticStatus::Idle
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn carry_over(&self) -> bool {
        self.carry_over
    }

    /// Current figures including the open segment. Pure read.
    pub fn stats(&self) -> ElasticStats {
        self.state.stats(self.ctx.now_ms())
    }

    pub fn snapshot(&self) -> Event {
        let stats = self.stats();
        Event::BalanceSnapshot {
            status: stats.status,
            is_paused: self.paused,
            focus_ms: stats.focus_ms,
            break_ms: stats.break_ms,
            earned_break_ms: stats.earned_break_ms,
            balance_ms: stats.balance_ms,
            carried_ms: stats.carried_ms,
            ratio: stats.ratio,
            tag: stats.tag,
            at: Utc::now(),
        }
    }

    /// Serializable form. Accumulators include the open segment, so a
    /// restored session resumes from exactly the saved totals.
    pub fn to_snapshot(&self) -> ElasticSnapshot {
        let stats = self.stats();
        ElasticSnapshot {
            status: stats.status,
            ratio: stats.ratio,
            accumulated_focus_ms: stats.focus_ms,
            accumulated_break_ms: stats.break_ms,
            carried_balance_ms: stats.carried_ms,
            tag: stats.tag,
            is_active_session: self.is_active(),
            saved_at: Some(Utc::now()),
        }
    }

    // ── Settings ─────────────────────────────────────────────────────

    /// Takes effect for all later derivations; accumulated time is kept
    /// as-is, so past focus is re-valued at the new rate from now on.
    pub fn set_ratio(&mut self, ratio: f64) {
        self.state.set_ratio(ratio);
        self.persist();
        if self.is_active() {
            self.refresh();
        }
    }

    pub fn set_tag(&mut self, tag: impl Into<String>) {
        self.state.set_tag(tag);
        self.persist();
    }

    pub fn set_carry_over(&mut self, carry_over: bool) {
        self.carry_over = carry_over;
    }

    pub fn set_warn_interval_minutes(&mut self, minutes: u64) {
        self.warner.set_interval_minutes(minutes);
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn switch_status(&mut self, status: ElasticStatus) -> Event {
        let now = self.ctx.now_ms();
        self.state.switch_status(status, now);
        self.paused = false;
        tracing::debug!(status = status.label(), "elastic status switched");
        self.persist();
        self.refresh()
    }

    /// Idle and break go to focus; focus goes to break.
    pub fn toggle(&mut self) -> Event {
        let next = match self.state.status() {
            ElasticStatus::Focus => ElasticStatus::Break,
            ElasticStatus::Idle | ElasticStatus::Break => ElasticStatus::Focus,
        };
        self.switch_status(next)
    }

    /// The periodic callback: refreshes subscribers and checks for debt.
    /// Returns a warning event when one fires.
    pub fn poll(&mut self) -> Option<Event> {
        if !self.is_active() || self.paused {
            return None;
        }
        let stats = self.stats();
        self.publish_snapshot();
        self.check_debt(stats.balance_ms)
    }

    pub fn pause(&mut self) -> Option<Event> {
        if !self.is_active() || self.paused {
            return None;
        }
        self.state.suspend(self.ctx.now_ms());
        self.paused = true;
        self.persist();
        Some(self.publish_snapshot())
    }

    pub fn resume(&mut self) -> Option<Event> {
        if !self.paused {
            return None;
        }
        self.state.unsuspend(self.ctx.now_ms());
        self.paused = false;
        self.persist();
        Some(self.publish_snapshot())
    }

    /// Manual correction in signed milliseconds, clamped so neither total
    /// goes below zero.
    pub fn adjust_totals(&mut self, focus_delta_ms: i64, break_delta_ms: i64) -> Event {
        self.state
            .adjust_totals(focus_delta_ms, break_delta_ms, self.ctx.now_ms());
        self.persist();
        self.refresh()
    }

    /// Close the open segment and hold the clock so the caller can review
    /// (and correct) the totals before [`commit_session`](Self::commit_session).
    /// [`resume`](Self::resume) cancels.
    pub fn finish(&mut self) -> ElasticStats {
        let now = self.ctx.now_ms();
        if self.is_active() {
            self.state.suspend(now);
            self.paused = true;
            self.persist();
            self.publish_snapshot();
        }
        self.state.stats(now)
    }

    /// Record the session with exactly the given totals and roll its net
    /// balance into the carried balance.
    pub fn commit_session(&mut self, final_focus_secs: u64, final_break_secs: u64) -> Event {
        let ratio = self.state.ratio();
        self.ctx.record_session(&SessionPayload {
            tag: self.state.tag().to_string(),
            focus_seconds: final_focus_secs,
            break_seconds: final_break_secs,
            ratio,
            timer_type: TimerType::Flexible,
        });

        let net = session_net_balance_ms(final_focus_secs, final_break_secs, ratio);
        let new_carried = (self.state.carried_balance_ms() as f64 + net).round() as i64;
        self.state.reset();
        self.state
            .set_carried_balance(if self.carry_over { new_carried } else { 0 });
        self.warner.reset();
        self.paused = false;
        tracing::debug!(
            focus = final_focus_secs,
            brk = final_break_secs,
            carried = self.state.carried_balance_ms(),
            "elastic session committed"
        );
        self.persist();

        let event = Event::SessionCommitted {
            tag: self.state.tag().to_string(),
            focus_secs: final_focus_secs,
            break_secs: final_break_secs,
            carried_balance_ms: self.state.carried_balance_ms(),
            at: Utc::now(),
        };
        self.bus.publish(&event);
        self.publish_snapshot();
        event
    }

    /// Drop whatever balance was carried in from earlier sessions.
    pub fn reset_balance(&mut self) -> Event {
        self.state.set_carried_balance(0);
        self.warner.reset();
        self.persist();
        self.publish_snapshot()
    }

    /// Write the current state. Hosts call this on application close.
    pub fn persist(&self) {
        snapshot::save_quietly(
            self.ctx.snapshots.as_ref(),
            &EngineSnapshot::Elastic(self.to_snapshot()),
        );
    }

    /// Load state saved by a previous run. The carried balance is always
    /// picked up when carry-over is on; an active session comes back paused.
    /// Returns whether an active session was restored.
    pub fn restore(&mut self) -> bool {
        if self.is_active() {
            return false;
        }
        let Some(EngineSnapshot::Elastic(saved)) =
            snapshot::load_quietly(self.ctx.snapshots.as_ref(), EngineKind::Flexible)
        else {
            return false;
        };
        let carried = if self.carry_over {
            saved.carried_balance_ms
        } else {
            0
        };
        if !saved.is_active_session || saved.status == ElasticStatus::Idle {
            self.state.set_carried_balance(carried);
            self.publish_snapshot();
            return false;
        }

        self.state = ElasticState::from_parts(
            saved.ratio,
            saved.accumulated_focus_ms,
            saved.accumulated_break_ms,
            carried,
            saved.status,
            saved.tag,
        );
        self.paused = true;
        // Debt already warned about before the restart stays quiet.
        let balance_ms = self.stats().balance_ms;
        self.warner.check(balance_ms);
        tracing::info!(
            status = saved.status.label(),
            focus_ms = saved.accumulated_focus_ms,
            break_ms = saved.accumulated_break_ms,
            "restored flexible timer as paused"
        );
        self.publish_snapshot();
        true
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn refresh(&mut self) -> Event {
        let event = self.publish_snapshot();
        let stats = self.stats();
        self.check_debt(stats.balance_ms);
        event
    }

    fn check_debt(&mut self, balance_ms: f64) -> Option<Event> {
        let minutes_in_debt = self.warner.check(balance_ms)?;
        let event = Event::BalanceWarning {
            minutes_in_debt,
            balance_ms,
            at: Utc::now(),
        };
        self.bus.publish(&event);
        self.ctx.notify(
            "Break Debt",
            &format!("You are {minutes_in_debt} minutes over your earned break."),
            "hourglass",
        );
        Some(event)
    }

    fn publish_snapshot(&mut self) -> Event {
        let event = self.snapshot();
        self.bus.publish(&event);
        event
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::clock::ManualClock;
    use crate::ports::SilentNotifier;
    use crate::snapshot::KvSnapshotStore;
    use crate::storage::MemoryStore;

    fn engine_with(
        clock: &Rc<ManualClock>,
        store: &Rc<MemoryStore>,
        settings: ElasticSettings,
    ) -> ElasticEngine {
        let ctx = EngineContext {
            clock: clock.clone(),
            sessions: store.clone(),
            snapshots: Rc::new(KvSnapshotStore::new(store.clone())),
            notifier: Rc::new(SilentNotifier),
        };
        ElasticEngine::new(ctx, settings)
    }

    fn setup() -> (ElasticEngine, Rc<ManualClock>, Rc<MemoryStore>) {
        let clock = Rc::new(ManualClock::new(0));
        let store = Rc::new(MemoryStore::new());
        let engine = engine_with(&clock, &store, ElasticSettings::default());
        (engine, clock, store)
    }

    #[test]
    fn worked_example_carries_balance_forward() {
        let (mut engine, clock, store) = setup();
        engine.switch_status(ElasticStatus::Focus);
        clock.advance_ms(900_000);
        engine.switch_status(ElasticStatus::Break);
        clock.advance_ms(200_000);

        let stats = engine.stats();
        assert_eq!(stats.earned_break_ms, 300_000.0);
        assert_eq!(stats.balance_ms, 100_000.0);

        let reviewed = engine.finish();
        assert_eq!(reviewed.focus_ms, 900_000);
        assert_eq!(reviewed.break_ms, 200_000);
        clock.advance_ms(60_000);

        let event = engine.commit_session(900, 200);
        assert!(matches!(
            event,
            Event::SessionCommitted {
                carried_balance_ms: 100_000,
                ..
            }
        ));
        assert_eq!(engine.state().carried_balance_ms(), 100_000);
        assert_eq!(engine.status(), ElasticStatus::Idle);
        assert_eq!(engine.stats().focus_ms, 0);

        let sessions = store.sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].focus_seconds, 900);
        assert_eq!(sessions[0].break_seconds, 200);
        assert_eq!(sessions[0].ratio, 3.0);
        assert_eq!(sessions[0].timer_type, TimerType::Flexible);
    }

    #[test]
    fn commit_without_carry_over_zeroes_balance() {
        let clock = Rc::new(ManualClock::new(0));
        let store = Rc::new(MemoryStore::new());
        let mut engine = engine_with(
            &clock,
            &store,
            ElasticSettings {
                carry_over: false,
                ..ElasticSettings::default()
            },
        );
        engine.switch_status(ElasticStatus::Focus);
        clock.advance_secs(600);
        engine.finish();
        engine.commit_session(600, 0);
        assert_eq!(engine.state().carried_balance_ms(), 0);
    }

    #[test]
    fn recorded_totals_are_caller_supplied_not_carried() {
        let (mut engine, clock, store) = setup();
        engine.state.set_carried_balance(500_000);
        engine.switch_status(ElasticStatus::Focus);
        clock.advance_secs(300);
        engine.finish();
        engine.commit_session(240, 30);
        let sessions = store.sessions();
        assert_eq!(sessions[0].focus_seconds, 240);
        assert_eq!(sessions[0].break_seconds, 30);
        assert_eq!(engine.state().carried_balance_ms(), 500_000 + 80_000 - 30_000);
    }

    #[test]
    fn debt_warning_fires_once_per_interval() {
        let (mut engine, clock, _store) = setup();
        let rx = engine.subscribe();
        engine.switch_status(ElasticStatus::Break);
        for _ in 0..(11 * 60) {
            clock.advance_secs(1);
            engine.poll();
        }
        let warnings: Vec<u64> = rx
            .try_iter()
            .filter_map(|e| match e {
                Event::BalanceWarning {
                    minutes_in_debt, ..
                } => Some(minutes_in_debt),
                _ => None,
            })
            .collect();
        assert_eq!(warnings, vec![5, 10]);
    }

    #[test]
    fn restored_debt_does_not_repeat_warnings() {
        let (mut engine, clock, store) = setup();
        engine.switch_status(ElasticStatus::Break);
        for _ in 0..(7 * 60) {
            clock.advance_secs(1);
            engine.poll();
        }
        engine.persist();

        let mut restored = engine_with(&clock, &store, ElasticSettings::default());
        let rx = restored.subscribe();
        assert!(restored.restore());
        restored.resume();
        for _ in 0..(4 * 60) {
            clock.advance_secs(1);
            restored.poll();
        }
        let warnings: Vec<u64> = rx
            .try_iter()
            .filter_map(|e| match e {
                Event::BalanceWarning {
                    minutes_in_debt, ..
                } => Some(minutes_in_debt),
                _ => None,
            })
            .collect();
        assert_eq!(warnings, vec![10]);
    }

    #[test]
    fn pause_stops_accumulation() {
        let (mut engine, clock, _store) = setup();
        engine.switch_status(ElasticStatus::Focus);
        clock.advance_secs(60);
        assert!(engine.pause().is_some());
        clock.advance_secs(600);
        assert!(engine.poll().is_none());
        assert_eq!(engine.stats().focus_ms, 60_000);
        engine.resume();
        clock.advance_secs(60);
        assert_eq!(engine.stats().focus_ms, 120_000);
    }

    #[test]
    fn toggle_cycles_focus_and_break() {
        let (mut engine, _clock, _store) = setup();
        engine.toggle();
        assert_eq!(engine.status(), ElasticStatus::Focus);
        engine.toggle();
        assert_eq!(engine.status(), ElasticStatus::Break);
        engine.toggle();
        assert_eq!(engine.status(), ElasticStatus::Focus);
    }

    #[test]
    fn restore_active_session_paused_with_same_totals() {
        let (mut engine, clock, store) = setup();
        engine.set_tag("Thesis");
        engine.switch_status(ElasticStatus::Focus);
        clock.advance_ms(123_456);
        engine.persist();

        let mut restored = engine_with(&clock, &store, ElasticSettings::default());
        assert!(restored.restore());
        assert!(restored.is_paused());
        assert_eq!(restored.status(), ElasticStatus::Focus);
        clock.advance_secs(3600);
        let stats = restored.stats();
        assert_eq!(stats.focus_ms, 123_456);
        assert_eq!(stats.tag, "Thesis");
    }

    #[test]
    fn restore_idle_snapshot_keeps_carried_balance() {
        let (mut engine, clock, store) = setup();
        engine.switch_status(ElasticStatus::Break);
        clock.advance_secs(120);
        engine.finish();
        engine.commit_session(0, 120);

        let mut restored = engine_with(&clock, &store, ElasticSettings::default());
        assert!(!restored.restore());
        assert_eq!(restored.state().carried_balance_ms(), -120_000);
        assert!(!restored.is_active());
    }

    #[test]
    fn reset_balance_clears_carry() {
        let (mut engine, _clock, _store) = setup();
        engine.state.set_carried_balance(-42_000);
        engine.reset_balance();
        assert_eq!(engine.state().carried_balance_ms(), 0);
    }
}
