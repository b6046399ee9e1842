use chrono::NaiveDate;
use clap::Args;
use fooddude_core::{
    build_transcriber, CaptureController, CommandRecorder, IntakePipeline, LogOutcome, LogStore,
    MealSlot, SqliteFoodIndex,
};
use std::io::{self, BufRead, Write};
use std::time::Duration;

use super::search::print_records;
use super::{date_or_today, runtime};
use crate::session::{report_pending, Session};
use fooddude::config::Config;

/// Log food from a typed phrase, e.g. "two eggs for breakfast"
#[derive(Args)]
pub struct LogCommand {
    /// What you ate
    #[arg(required = true)]
    pub phrase: Vec<String>,

    /// Date (YYYY-MM-DD), defaults to today
    #[arg(long, short)]
    pub date: Option<NaiveDate>,

    /// Meal (breakfast, lunch, dinner, snacks) when the phrase names none
    #[arg(long, short)]
    pub meal: Option<MealSlot>,
}

impl LogCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let phrase = self.phrase.join(" ");
        let date = date_or_today(self.date);
        let default_meal = self.meal.unwrap_or(config.default_meal.value);

        runtime()?.block_on(async {
            let index = SqliteFoodIndex::open(&config.food_db_path.value).await?;
            let mut session = Session::open(config).await?;
            session.load_day(date).await;

            let pipeline = IntakePipeline::new(&index);
            let outcome = pipeline
                .log_phrase(&mut session.log, date, default_meal, &phrase)
                .await?;
            settle_outcome(&pipeline, &mut session.log, date, outcome)?;

            report_pending(session.close().await?);
            Ok::<(), Box<dyn std::error::Error>>(())
        })
    }
}

/// Record a spoken phrase and log it
#[derive(Args)]
pub struct VoiceCommand {
    /// Date (YYYY-MM-DD), defaults to today
    #[arg(long, short)]
    pub date: Option<NaiveDate>,

    /// Meal (breakfast, lunch, dinner, snacks) when the phrase names none
    #[arg(long, short)]
    pub meal: Option<MealSlot>,
}

impl VoiceCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let date = date_or_today(self.date);
        let default_meal = self.meal.unwrap_or(config.default_meal.value);

        let recorder = CommandRecorder::new(
            config.capture.program.clone(),
            config.capture.args.clone(),
            config.capture.mime.clone(),
        );
        let mut capture = CaptureController::new(recorder, build_transcriber(&config.transcription));
        if config.transcription.timeout_secs > 0 {
            capture = capture.with_timeout(Duration::from_secs(config.transcription.timeout_secs));
        }

        runtime()?.block_on(async {
            let index = SqliteFoodIndex::open(&config.food_db_path.value).await?;
            let mut session = Session::open(config).await?;
            session.load_day(date).await;

            capture.start().await?;
            println!("Listening... press Enter to stop.");
            tokio::task::spawn_blocking(|| {
                let mut line = String::new();
                io::stdin().lock().read_line(&mut line).map(|_| ())
            })
            .await??;
            println!("Transcribing...");

            let pipeline = IntakePipeline::new(&index);
            let outcome = pipeline
                .log_voice(&capture, &mut session.log, date, default_meal)
                .await?;
            settle_outcome(&pipeline, &mut session.log, date, outcome)?;

            report_pending(session.close().await?);
            Ok::<(), Box<dyn std::error::Error>>(())
        })
    }
}

/// Prints the outcome and, when several foods fit, asks which one to log.
fn settle_outcome(
    pipeline: &IntakePipeline<'_>,
    log: &mut LogStore,
    date: NaiveDate,
    outcome: LogOutcome,
) -> Result<(), Box<dyn std::error::Error>> {
    match outcome {
        LogOutcome::Logged { meal, entry } => {
            println!("✓ Logged to {} ({}): {}", meal, date, entry);
        }
        LogOutcome::Choose {
            meal,
            query,
            candidates,
        } => {
            println!("Several foods match '{}':", query);
            print_records(&candidates);
            match prompt_choice(candidates.len())? {
                Some(i) => {
                    if let LogOutcome::Logged { meal, entry } =
                        pipeline.choose(log, date, meal, &candidates[i])
                    {
                        println!("✓ Logged to {} ({}): {}", meal, date, entry);
                    }
                }
                None => println!("Nothing logged."),
            }
        }
        LogOutcome::NoMatch { query, .. } => {
            println!("No foods found matching '{}'. Nothing logged.", query);
        }
        LogOutcome::NotUnderstood { transcript } => {
            if transcript.trim().is_empty() {
                println!("Didn't catch anything. Nothing logged.");
            } else {
                println!("Couldn't find a food in '{}'. Nothing logged.", transcript);
            }
        }
    }
    Ok(())
}

/// Reads a 1-based pick from stdin. Empty input skips.
fn prompt_choice(count: usize) -> Result<Option<usize>, Box<dyn std::error::Error>> {
    let stdin = io::stdin();
    loop {
        print!("Pick 1-{} (Enter to skip): ", count);
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        match parse_choice(&line, count) {
            Ok(choice) => return Ok(choice),
            Err(msg) => println!("{}", msg),
        }
    }
}

fn parse_choice(input: &str, count: usize) -> Result<Option<usize>, String> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }
    match input.parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Ok(Some(n - 1)),
        _ => Err(format!("Enter a number between 1 and {}", count)),
    }
}
