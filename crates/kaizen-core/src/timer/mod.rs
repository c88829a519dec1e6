mod config;
mod debt;
mod elastic;
mod fixed;
mod flexible;
mod ticker;

pub use config::{validate_ratio, TimerConfig, DEFAULT_TAG};
pub use debt::{DebtWarner, DEFAULT_WARN_INTERVAL_MINUTES};
pub use elastic::{
    balance_ms, earned_break_ms, session_net_balance_ms, ElasticState, ElasticStats,
    ElasticStatus, DEFAULT_RATIO, NO_TAG,
};
pub use fixed::{AutoStart, FixedCycleEngine, FixedMode, RunState, MIN_STOPWATCH_RECORD_SECS};
pub use flexible::{ElasticEngine, ElasticSettings};
pub use ticker::DriftTicker;
