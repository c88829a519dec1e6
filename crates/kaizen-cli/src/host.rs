//! Terminal host: wires the engines to SQLite and stderr, and drives them
//! from a foreground event loop.

use std::rc::Rc;
use std::sync::mpsc::Receiver;

use kaizen_core::{
    Config, CoreError, Database, EngineContext, Event, KvSnapshotStore, Notifier,
    SilentNotifier, SystemClock,
};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::{Duration, MissedTickBehavior};

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

const TICK_INTERVAL_MS: u64 = 1000;

/// Prints notifications on stderr so stdout stays machine-readable.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn show(&self, title: &str, message: &str, icon: &str) -> kaizen_core::error::Result<()> {
        use std::io::Write;
        let mut stderr = std::io::stderr().lock();
        writeln!(stderr, "[{icon}] {title}: {message}")?;
        Ok(())
    }
}

/// Engine context backed by the on-disk database.
pub fn open_context(config: &Config) -> Result<EngineContext, CoreError> {
    let db = Rc::new(Database::open()?);
    let notifier: Rc<dyn Notifier> = if config.notifications.enabled {
        Rc::new(TerminalNotifier)
    } else {
        Rc::new(SilentNotifier)
    };
    Ok(EngineContext {
        clock: Rc::new(SystemClock::new()),
        sessions: db.clone(),
        snapshots: Rc::new(KvSnapshotStore::new(db)),
        notifier,
    })
}

/// One JSON object per line.
pub fn print_event(event: &Event) -> CliResult {
    println!("{}", serde_json::to_string(event)?);
    Ok(())
}

/// Print everything queued on `rx`.
pub fn drain(rx: &Receiver<Event>) -> CliResult {
    for event in rx.try_iter() {
        print_event(&event)?;
    }
    Ok(())
}

/// What the loop should do after handling an input line or a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// A foreground session the loop can drive.
pub trait Session {
    /// The periodic callback. Returns [`Flow::Exit`] once the session is over.
    fn on_tick(&mut self) -> Flow;

    /// Handle one line typed by the user.
    fn on_line(&mut self, line: &str) -> Flow;

    /// Called on Ctrl-C, before the loop exits.
    fn on_interrupt(&mut self);

    fn events(&self) -> &Receiver<Event>;
}

/// Run `session` until it finishes, the user quits, or Ctrl-C.
///
/// Blocks on a current-thread runtime: the engines are single-threaded and
/// never leave this thread.
pub fn run_foreground<S: Session>(session: &mut S) -> CliResult {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(event_loop(session))
}

/// Forward stdin lines from a detached thread. A blocking read cannot be
/// cancelled, so it must not belong to the runtime: the process exits
/// without waiting for it.
fn spawn_stdin_reader() -> UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        use std::io::BufRead;
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("stdin read failed: {e}");
                    break;
                }
            }
        }
    });
    rx
}

async fn event_loop<S: Session>(session: &mut S) -> CliResult {
    let mut ticker = tokio::time::interval(Duration::from_millis(TICK_INTERVAL_MS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut lines = spawn_stdin_reader();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    drain(session.events())?;
    loop {
        let flow = tokio::select! {
            _ = ticker.tick() => session.on_tick(),
            line = lines.recv(), if stdin_open => match line {
                Some(line) => session.on_line(line.trim()),
                None => {
                    tracing::debug!("stdin closed; continuing on timer only");
                    stdin_open = false;
                    Flow::Continue
                }
            },
            _ = &mut ctrl_c => {
                tracing::info!("interrupted; saving timer state");
                session.on_interrupt();
                Flow::Exit
            }
        };
        drain(session.events())?;
        if flow == Flow::Exit {
            break;
        }
    }
    Ok(())
}
