use std::sync::mpsc::Receiver;

use clap::Subcommand;
use kaizen_core::timer::validate_ratio;
use kaizen_core::{Config, ElasticEngine, ElasticStatus, Event};

use crate::host::{self, CliResult, Flow, Session};

const MS_PER_MINUTE: f64 = 60_000.0;

#[derive(Subcommand)]
pub enum FlexAction {
    /// Run an elastic session in the foreground, driven by stdin commands
    Run {
        /// Minutes of focus per minute of earned break
        #[arg(long)]
        ratio: Option<f64>,
        /// Tag recorded with the session
        #[arg(long)]
        tag: Option<String>,
    },
    /// Print the saved balance and totals as JSON
    Status,
    /// Record the saved session with the given totals and roll its balance over
    Commit {
        /// Focus seconds to record
        focus_secs: u64,
        /// Break seconds to record
        break_secs: u64,
    },
    /// Drop the balance carried over from earlier sessions
    ResetBalance,
}

/// Lines understood while an elastic session runs in the foreground.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlexCommand {
    Focus,
    Break,
    Toggle,
    TogglePause,
    /// Signed corrections in minutes.
    Adjust { focus_minutes: f64, break_minutes: f64 },
    Ratio(f64),
    Quit,
}

impl FlexCommand {
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();
        let number = |s: &str| {
            s.parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .ok_or_else(|| format!("'{s}' is not a number"))
        };

        match (command, args.as_slice()) {
            ("f", []) => Ok(FlexCommand::Focus),
            ("b", []) => Ok(FlexCommand::Break),
            ("t", []) => Ok(FlexCommand::Toggle),
            ("p", []) => Ok(FlexCommand::TogglePause),
            ("q", []) => Ok(FlexCommand::Quit),
            ("a", [focus, brk]) => Ok(FlexCommand::Adjust {
                focus_minutes: number(*focus)?,
                break_minutes: number(*brk)?,
            }),
            ("r", [ratio]) => {
                let ratio = number(*ratio)?;
                validate_ratio(ratio).map_err(|e| e.to_string())?;
                Ok(FlexCommand::Ratio(ratio))
            }
            _ => Err(format!(
                "unknown command '{line}' (f: focus, b: break, t: toggle, p: pause/resume, \
                 a <focus_min> <break_min>: adjust, r <ratio>, q: finish and commit)"
            )),
        }
    }
}

struct ForegroundFlex {
    engine: ElasticEngine,
    rx: Receiver<Event>,
}

impl ForegroundFlex {
    fn finish_and_commit(&mut self) {
        let stats = self.engine.finish();
        self.engine
            .commit_session(stats.focus_ms / 1000, stats.break_ms / 1000);
    }
}

impl Session for ForegroundFlex {
    fn on_tick(&mut self) -> Flow {
        self.engine.poll();
        Flow::Continue
    }

    fn on_line(&mut self, line: &str) -> Flow {
        if line.is_empty() {
            return Flow::Continue;
        }
        match FlexCommand::parse(line) {
            Ok(FlexCommand::Focus) => {
                self.engine.switch_status(ElasticStatus::Focus);
            }
            Ok(FlexCommand::Break) => {
                self.engine.switch_status(ElasticStatus::Break);
            }
            Ok(FlexCommand::Toggle) => {
                self.engine.toggle();
            }
            Ok(FlexCommand::TogglePause) => {
                if self.engine.is_paused() {
                    self.engine.resume();
                } else {
                    self.engine.pause();
                }
            }
            Ok(FlexCommand::Adjust {
                focus_minutes,
                break_minutes,
            }) => {
                self.engine.adjust_totals(
                    (focus_minutes * MS_PER_MINUTE).round() as i64,
                    (break_minutes * MS_PER_MINUTE).round() as i64,
                );
            }
            Ok(FlexCommand::Ratio(ratio)) => self.engine.set_ratio(ratio),
            Ok(FlexCommand::Quit) => {
                self.finish_and_commit();
                return Flow::Exit;
            }
            Err(message) => eprintln!("{message}"),
        }
        Flow::Continue
    }

    fn on_interrupt(&mut self) {
        self.engine.persist();
    }

    fn events(&self) -> &Receiver<Event> {
        &self.rx
    }
}

pub fn run(action: FlexAction) -> CliResult {
    let config = Config::load_or_default();
    let ctx = host::open_context(&config)?;
    let mut engine = ElasticEngine::new(ctx, config.elastic_settings());
    engine.restore();
    let rx = engine.subscribe();

    match action {
        FlexAction::Run { ratio, tag } => {
            if let Some(ratio) = ratio {
                validate_ratio(ratio)?;
                engine.set_ratio(ratio);
            }
            if let Some(tag) = tag {
                engine.set_tag(tag);
            }
            if engine.is_paused() {
                engine.resume();
            } else if !engine.is_active() {
                engine.switch_status(ElasticStatus::Focus);
            }
            host::run_foreground(&mut ForegroundFlex { engine, rx })?;
        }
        FlexAction::Status => {
            host::print_event(&engine.snapshot())?;
        }
        FlexAction::Commit {
            focus_secs,
            break_secs,
        } => {
            engine.finish();
            engine.commit_session(focus_secs, break_secs);
            host::drain(&rx)?;
        }
        FlexAction::ResetBalance => {
            engine.reset_balance();
            host::drain(&rx)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_letter_commands() {
        assert_eq!(FlexCommand::parse("f"), Ok(FlexCommand::Focus));
        assert_eq!(FlexCommand::parse("b"), Ok(FlexCommand::Break));
        assert_eq!(FlexCommand::parse("t"), Ok(FlexCommand::Toggle));
        assert_eq!(FlexCommand::parse("p"), Ok(FlexCommand::TogglePause));
        assert_eq!(FlexCommand::parse("q"), Ok(FlexCommand::Quit));
    }

    #[test]
    fn parses_adjust_with_signed_minutes() {
        assert_eq!(
            FlexCommand::parse("a -2 1.5"),
            Ok(FlexCommand::Adjust {
                focus_minutes: -2.0,
                break_minutes: 1.5
            })
        );
        assert!(FlexCommand::parse("a 1").is_err());
        assert!(FlexCommand::parse("a one two").is_err());
    }

    #[test]
    fn ratio_must_be_positive() {
        assert_eq!(FlexCommand::parse("r 2.5"), Ok(FlexCommand::Ratio(2.5)));
        assert!(FlexCommand::parse("r 0").is_err());
        assert!(FlexCommand::parse("r -1").is_err());
        assert!(FlexCommand::parse("r").is_err());
    }

    #[test]
    fn rejects_unknown_and_extra_arguments() {
        assert!(FlexCommand::parse("z").is_err());
        assert!(FlexCommand::parse("f now").is_err());
    }
}
