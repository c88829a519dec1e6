use clap::Args;
use kaizen_core::storage::Database;

use crate::host::CliResult;

#[derive(Args)]
pub struct StatsArgs {
    /// Also list the N most recent sessions
    #[arg(long, value_name = "N")]
    recent: Option<usize>,
}

pub fn run(args: StatsArgs) -> CliResult {
    let db = Database::open()?;
    let stats = db.stats_all()?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    if let Some(limit) = args.recent {
        let sessions = db.sessions(limit)?;
        println!("{}", serde_json::to_string_pretty(&sessions)?);
    }
    Ok(())
}
