use std::sync::mpsc::Receiver;

use clap::Subcommand;
use kaizen_core::{Config, Event, FixedCycleEngine, FixedMode, TimerConfig};

use crate::host::{self, CliResult, Flow, Session};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a fixed-cycle session and run it in the foreground
    Start {
        /// Focus length in minutes
        #[arg(long)]
        focus: Option<u64>,
        /// Short break length in minutes
        #[arg(long = "break")]
        break_minutes: Option<u64>,
        /// Long break length in minutes
        #[arg(long)]
        long_break: Option<u64>,
        /// Focus sets between long breaks
        #[arg(long)]
        interval: Option<u32>,
        /// Enable long breaks
        #[arg(long)]
        long_breaks: bool,
        /// Focus sets before the session completes
        #[arg(long)]
        iterations: Option<u32>,
        /// Tag recorded with the session
        #[arg(long)]
        tag: Option<String>,
        /// Count up instead of down
        #[arg(long)]
        stopwatch: bool,
        /// With --stopwatch, time a break instead of focus
        #[arg(long, requires = "stopwatch")]
        break_mode: bool,
    },
    /// Resume the saved session in the foreground
    Resume,
    /// Pause the saved session
    Pause,
    /// Stop the saved session (a stopwatch focus segment is recorded)
    Stop,
    /// Skip the current phase of the saved session
    Skip,
    /// Print the saved session state as JSON
    Status,
}

/// Keys understood while a session runs in the foreground.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCommand {
    TogglePause,
    Skip,
    Stop,
    Quit,
}

impl TimerCommand {
    pub fn parse(line: &str) -> Result<Self, String> {
        match line {
            "p" | "pause" => Ok(TimerCommand::TogglePause),
            "s" | "skip" => Ok(TimerCommand::Skip),
            "x" | "stop" => Ok(TimerCommand::Stop),
            "q" | "quit" => Ok(TimerCommand::Quit),
            other => Err(format!(
                "unknown command '{other}' (p: pause/resume, s: skip, x: stop, q: save and quit)"
            )),
        }
    }
}

struct ForegroundTimer {
    engine: FixedCycleEngine,
    rx: Receiver<Event>,
}

impl Session for ForegroundTimer {
    fn on_tick(&mut self) -> Flow {
        self.engine.poll();
        if self.engine.is_idle() {
            Flow::Exit
        } else {
            Flow::Continue
        }
    }

    fn on_line(&mut self, line: &str) -> Flow {
        if line.is_empty() {
            return Flow::Continue;
        }
        match TimerCommand::parse(line) {
            Ok(TimerCommand::TogglePause) => {
                self.engine.toggle_pause();
            }
            Ok(TimerCommand::Skip) => {
                self.engine.skip_phase();
            }
            Ok(TimerCommand::Stop) => {
                self.engine.stop();
                return Flow::Exit;
            }
            Ok(TimerCommand::Quit) => {
                self.engine.pause();
                self.engine.persist();
                return Flow::Exit;
            }
            Err(message) => eprintln!("{message}"),
        }
        if self.engine.is_idle() {
            Flow::Exit
        } else {
            Flow::Continue
        }
    }

    fn on_interrupt(&mut self) {
        self.engine.persist();
    }

    fn events(&self) -> &Receiver<Event> {
        &self.rx
    }
}

/// Session settings from the config file with command-line overrides.
#[allow(clippy::too_many_arguments)]
fn session_config(
    config: &Config,
    focus: Option<u64>,
    break_minutes: Option<u64>,
    long_break: Option<u64>,
    interval: Option<u32>,
    long_breaks: bool,
    iterations: Option<u32>,
    tag: Option<String>,
    stopwatch: bool,
    break_mode: bool,
) -> TimerConfig {
    let base = config.timer_config();
    TimerConfig {
        focus_duration: focus.map_or(base.focus_duration, |m| m.saturating_mul(60)),
        break_duration: break_minutes.map_or(base.break_duration, |m| m.saturating_mul(60)),
        long_break_duration: long_break.map_or(base.long_break_duration, |m| m.saturating_mul(60)),
        long_break_interval: interval.unwrap_or(base.long_break_interval),
        long_break_enabled: long_breaks || base.long_break_enabled,
        target_iterations: iterations.unwrap_or(base.target_iterations),
        tag: tag.unwrap_or(base.tag),
        stopwatch,
        initial_mode: if break_mode {
            FixedMode::Break
        } else {
            FixedMode::Focus
        },
    }
}

pub fn run(action: TimerAction) -> CliResult {
    let config = Config::load_or_default();
    let ctx = host::open_context(&config)?;
    let mut engine = FixedCycleEngine::new(ctx);
    engine.set_auto_start(config.auto_start());
    engine.restore();
    let rx = engine.subscribe();

    match action {
        TimerAction::Start {
            focus,
            break_minutes,
            long_break,
            interval,
            long_breaks,
            iterations,
            tag,
            stopwatch,
            break_mode,
        } => {
            let session = session_config(
                &config,
                focus,
                break_minutes,
                long_break,
                interval,
                long_breaks,
                iterations,
                tag,
                stopwatch,
                break_mode,
            );
            session.validate()?;
            if engine.is_paused() {
                eprintln!("resuming the saved session; `kaizen timer stop` discards it");
            }
            engine.start_session(session);
            host::run_foreground(&mut ForegroundTimer { engine, rx })?;
        }
        TimerAction::Resume => {
            if !engine.is_paused() {
                return Err("no paused session to resume".into());
            }
            engine.resume();
            host::run_foreground(&mut ForegroundTimer { engine, rx })?;
        }
        TimerAction::Pause => {
            // Restored sessions are already paused.
            if engine.pause().is_none() {
                host::print_event(&engine.snapshot())?;
            }
            host::drain(&rx)?;
        }
        TimerAction::Stop => {
            if engine.stop().is_none() {
                host::print_event(&engine.snapshot())?;
            }
            host::drain(&rx)?;
        }
        TimerAction::Skip => {
            if engine.skip_phase().is_none() {
                return Err("no session phase to skip".into());
            }
            host::drain(&rx)?;
        }
        TimerAction::Status => {
            host::print_event(&engine.snapshot())?;
        }
    }
    Ok(())
}
