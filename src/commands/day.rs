use chrono::NaiveDate;
use clap::Args;
use fooddude_core::MealSlot;

use super::{date_or_today, runtime, OutputFormat};
use crate::session::{report_pending, Session};
use fooddude::config::Config;

/// Show everything logged on a day
#[derive(Args)]
pub struct ShowCommand {
    /// Date (YYYY-MM-DD), defaults to today
    #[arg(long, short)]
    pub date: Option<NaiveDate>,

    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

impl ShowCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let date = date_or_today(self.date);

        runtime()?.block_on(async {
            let mut session = Session::open(config).await?;
            let online = session.load_day(date).await;
            let day = session.log.day(date);

            match self.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&day.to_document())?);
                }
                OutputFormat::Text => {
                    println!("{}", date.format("%A, %B %-d, %Y"));
                    println!();
                    println!("{}", day);
                    if !online {
                        println!();
                        println!("(server unreachable: showing local changes only)");
                    }
                }
            }

            report_pending(session.close().await?);
            Ok::<(), Box<dyn std::error::Error>>(())
        })
    }
}

/// Remove one entry from a meal
#[derive(Args)]
pub struct DeleteCommand {
    /// Entry number as listed by `show`
    pub index: usize,

    /// Meal (breakfast, lunch, dinner, snacks)
    #[arg(long, short)]
    pub meal: MealSlot,

    /// Date (YYYY-MM-DD), defaults to today
    #[arg(long, short)]
    pub date: Option<NaiveDate>,
}

impl DeleteCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let date = date_or_today(self.date);

        runtime()?.block_on(async {
            let mut session = Session::open(config).await?;
            session.load_day(date).await;

            match session.log.delete_entry(date, self.meal, self.index) {
                Some(entry) => println!("✓ Removed from {}: {}", self.meal, entry),
                None => println!("No entry {} in {} on {}.", self.index, self.meal, date),
            }

            report_pending(session.close().await?);
            Ok::<(), Box<dyn std::error::Error>>(())
        })
    }
}

/// Remove every entry from a meal
#[derive(Args)]
pub struct ClearCommand {
    /// Meal (breakfast, lunch, dinner, snacks)
    #[arg(long, short)]
    pub meal: MealSlot,

    /// Date (YYYY-MM-DD), defaults to today
    #[arg(long, short)]
    pub date: Option<NaiveDate>,
}

impl ClearCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let date = date_or_today(self.date);

        runtime()?.block_on(async {
            let mut session = Session::open(config).await?;
            session.load_day(date).await;

            match session.log.clear_meal(date, self.meal) {
                0 => println!("{} on {} is already empty.", self.meal, date),
                n => println!(
                    "✓ Cleared {} entr{} from {}.",
                    n,
                    if n == 1 { "y" } else { "ies" },
                    self.meal
                ),
            }

            report_pending(session.close().await?);
            Ok::<(), Box<dyn std::error::Error>>(())
        })
    }
}
