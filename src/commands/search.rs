use clap::Args;
use fooddude_core::{FoodRecord, Resolver, SqliteFoodIndex};

use super::{runtime, OutputFormat};
use fooddude::config::Config;

/// Search the food database
#[derive(Args)]
pub struct SearchCommand {
    /// Text to look for in food names
    #[arg(required = true)]
    pub query: Vec<String>,

    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

impl SearchCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let query = self.query.join(" ");
        let records = runtime()?.block_on(async {
            let index = SqliteFoodIndex::open(&config.food_db_path.value).await?;
            Resolver::new(&index).search(&query).await
        })?;

        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&records)?);
            }
            OutputFormat::Text => {
                if records.is_empty() {
                    println!("No foods found matching '{}'.", query);
                } else {
                    print_records(&records);
                }
            }
        }
        Ok(())
    }
}

/// Numbered list, starting at 1, used by search and the candidate picker
pub fn print_records(records: &[FoodRecord]) {
    for (i, record) in records.iter().enumerate() {
        println!(
            "{:>3}. {} - {} cal | {}g P | {}g C | {}g F",
            i + 1,
            record.name,
            record.calories,
            record.protein,
            record.carbs,
            record.fat
        );
    }
}
