use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod host;

#[derive(Parser)]
#[command(name = "kaizen", version, about = "Kaizen focus timer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fixed-cycle (pomodoro) timer
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Elastic timer: focus earns break time at a ratio
    Flex {
        #[command(subcommand)]
        action: commands::flex::FlexAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Session statistics
    Stats(commands::stats::StatsArgs),
}

/// Logs go to stderr; stdout carries JSON events only.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("KAIZEN_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Timer { action } => commands::timer::run(action),
        Commands::Flex { action } => commands::flex::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Stats(args) => commands::stats::run(args),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
