//! Fixed-cycle engine driven end to end through the public API, with the
//! SQLite store behind the ports.

use std::rc::Rc;

use kaizen_core::{
    AutoStart, Database, EngineContext, Event, FixedCycleEngine, FixedMode, KvSnapshotStore,
    ManualClock, SessionStore, SilentNotifier, TimerConfig, TimerType,
};

struct Rig {
    engine: FixedCycleEngine,
    clock: Rc<ManualClock>,
    db: Rc<Database>,
}

fn rig_with(db: Rc<Database>, clock: Rc<ManualClock>) -> Rig {
    let ctx = EngineContext {
        clock: clock.clone(),
        sessions: db.clone(),
        snapshots: Rc::new(KvSnapshotStore::new(db.clone())),
        notifier: Rc::new(SilentNotifier),
    };
    Rig {
        engine: FixedCycleEngine::new(ctx),
        clock,
        db,
    }
}

fn rig() -> Rig {
    rig_with(
        Rc::new(Database::open_memory().unwrap()),
        Rc::new(ManualClock::new(1_000)),
    )
}

/// Drive the host loop: one callback per second until `secs` have passed.
fn run_for(rig: &mut Rig, secs: u64) -> Vec<Event> {
    let mut completions = Vec::new();
    for _ in 0..secs {
        rig.clock.advance_secs(1);
        if let Some(event) = rig.engine.poll() {
            completions.push(event);
        }
    }
    completions
}

#[test]
fn two_iteration_session_runs_to_completion() {
    let mut rig = rig();
    rig.engine.set_auto_start(AutoStart {
        focus: true,
        breaks: true,
    });
    let rx = rig.engine.subscribe();
    let config = TimerConfig {
        target_iterations: 2,
        tag: "Chapter 3".into(),
        ..TimerConfig::from_minutes(25, 5, 15)
    };
    config.validate().unwrap();
    rig.engine.start_session(config);

    let mut modes = vec![rig.engine.mode()];
    for phase_secs in [1500, 300, 1500, 300] {
        let events = run_for(&mut rig, phase_secs);
        assert_eq!(events.len(), 1, "one completion per phase");
        modes.push(rig.engine.mode());
    }
    assert_eq!(
        modes,
        vec![
            FixedMode::Focus,
            FixedMode::Break,
            FixedMode::Focus,
            FixedMode::Break,
            FixedMode::Idle,
        ]
    );
    assert!(rig.engine.is_idle());

    let completed = rx
        .try_iter()
        .filter(|e| matches!(e, Event::SessionCompleted { .. }))
        .count();
    assert_eq!(completed, 1);

    let stats = rig.db.stats().unwrap();
    assert_eq!(stats.total_sessions, 2);
    assert_eq!(stats.total_focus_secs, 3000);
    let records = rig.db.sessions(10).unwrap();
    assert!(records
        .iter()
        .all(|r| r.tag == "Chapter 3" && r.timer_type == TimerType::Standard && r.ratio == 1.0));

    // Nothing further happens once idle.
    assert!(run_for(&mut rig, 600).is_empty());
    assert_eq!(rig.db.stats().unwrap().total_sessions, 2);
}

#[test]
fn long_break_follows_every_fourth_focus() {
    let mut rig = rig();
    let config = TimerConfig {
        focus_duration: 10,
        break_duration: 2,
        long_break_duration: 5,
        long_break_interval: 4,
        long_break_enabled: true,
        target_iterations: 12,
        ..TimerConfig::default()
    };
    rig.engine.start_session(config);

    let mut long_after = Vec::new();
    while !rig.engine.is_idle() {
        let event = if rig.engine.mode() == FixedMode::Focus {
            rig.engine.tick(10)
        } else {
            rig.engine.skip_phase()
        };
        if let Some(Event::PhaseCompleted {
            next_mode: FixedMode::LongBreak,
            completed_sets,
            ..
        }) = event
        {
            long_after.push(completed_sets);
        }
        rig.engine.resume();
    }
    assert_eq!(long_after, vec![4, 8, 12]);
    assert!(rig.engine.completed_sets() <= 12);
}

#[test]
fn completed_sets_never_exceed_target() {
    let mut rig = rig();
    rig.engine.start_session(TimerConfig {
        target_iterations: 3,
        ..TimerConfig::from_minutes(1, 1, 1)
    });
    let mut max_sets = 0;
    for _ in 0..20 {
        rig.engine.skip_phase();
        max_sets = max_sets.max(rig.engine.completed_sets());
        if rig.engine.is_idle() {
            break;
        }
    }
    assert!(rig.engine.is_idle());
    assert_eq!(max_sets, 3);
    // Skipped focus phases are never logged.
    assert_eq!(rig.db.stats().unwrap().total_sessions, 0);
}

#[test]
fn restart_restores_mid_focus_session_paused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kaizen.db");
    let clock = Rc::new(ManualClock::new(0));

    {
        let mut first = rig_with(Rc::new(Database::open_at(&path).unwrap()), clock.clone());
        first.engine.start_session(TimerConfig {
            tag: "Before restart".into(),
            ..TimerConfig::default()
        });
        run_for(&mut first, 100);
        assert_eq!(first.engine.seconds_remaining(), 1400);
        first.engine.persist();
    }

    clock.advance_secs(3600);
    let mut second = rig_with(Rc::new(Database::open_at(&path).unwrap()), clock.clone());
    assert!(second.engine.restore());
    assert!(second.engine.is_paused());
    assert!(!second.engine.is_running());
    assert_eq!(second.engine.mode(), FixedMode::Focus);
    assert_eq!(second.engine.seconds_remaining(), 1400);
    assert_eq!(second.engine.tag(), "Before restart");

    // Paused: callbacks change nothing until resumed.
    run_for(&mut second, 30);
    assert_eq!(second.engine.seconds_remaining(), 1400);
    second.engine.resume();
    run_for(&mut second, 30);
    assert_eq!(second.engine.seconds_remaining(), 1370);
}

#[test]
fn throttled_callback_catches_up_in_one_step() {
    let mut rig = rig();
    rig.engine.start_session(TimerConfig::default());
    rig.clock.advance_ms(3_400);
    rig.engine.poll();
    assert_eq!(rig.engine.seconds_remaining(), 1500 - 3);
    rig.clock.advance_ms(600);
    rig.engine.poll();
    assert_eq!(rig.engine.seconds_remaining(), 1500 - 4);
}

#[test]
fn stopwatch_session_logs_elapsed_time() {
    let mut rig = rig();
    rig.engine.start_session(TimerConfig {
        stopwatch: true,
        tag: "Open ended".into(),
        ..TimerConfig::default()
    });
    run_for(&mut rig, 125);
    let stopped = rig.engine.stop();
    assert!(matches!(
        stopped,
        Some(Event::TimerStopped {
            recorded_secs: Some(125),
            ..
        })
    ));
    assert!(rig.engine.stop().is_none());

    let records = rig.db.sessions(1).unwrap();
    assert_eq!(records[0].timer_type, TimerType::Stopwatch);
    assert_eq!(records[0].focus_seconds, 125);
}
