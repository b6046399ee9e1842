pub mod config_cmd;
pub mod day;
pub mod intake;
pub mod search;
pub mod sync_cmd;

pub use config_cmd::ConfigCommand;
pub use day::{ClearCommand, DeleteCommand, ShowCommand};
pub use intake::{LogCommand, VoiceCommand};
pub use search::SearchCommand;
pub use sync_cmd::{SyncCommand, WatchCommand};

use chrono::{Local, NaiveDate};
use clap::ValueEnum;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Runtime for commands that talk to the network or the food database
pub fn runtime() -> Result<tokio::runtime::Runtime, Box<dyn std::error::Error>> {
    Ok(tokio::runtime::Runtime::new()?)
}

/// The given date, or today in local time
pub fn date_or_today(date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(|| Local::now().date_naive())
}
