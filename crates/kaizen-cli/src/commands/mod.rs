pub mod config;
pub mod flex;
pub mod stats;
pub mod timer;
