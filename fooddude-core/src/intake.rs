//! Phrase and voice intake: text in, log entry (or a choice) out.
//!
//! Typed phrases and voice transcripts take the same path:
//! normalize, resolve against the index, then log the match or hand the
//! candidates back to the caller to pick from.

use chrono::NaiveDate;
use thiserror::Error;

use crate::capture::{AudioRecorder, CaptureController, CaptureError};
use crate::index::{FoodIndex, IndexError, MANUAL_SEARCH_LIMIT, VOICE_SEARCH_LIMIT};
use crate::log_store::LogStore;
use crate::models::{FoodEntry, FoodRecord, MealSlot};
use crate::normalize::normalize;
use crate::resolver::{Resolution, Resolver};

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// What happened to one phrase.
#[derive(Debug, Clone, PartialEq)]
pub enum LogOutcome {
    /// The entry was added to the log.
    Logged { meal: MealSlot, entry: FoodEntry },
    /// Several foods fit; pass the pick to [`IntakePipeline::choose`].
    Choose {
        meal: MealSlot,
        query: String,
        candidates: Vec<FoodRecord>,
    },
    NoMatch { meal: MealSlot, query: String },
    /// Nothing searchable was left after normalizing.
    NotUnderstood { transcript: String },
}

pub struct IntakePipeline<'a> {
    index: &'a dyn FoodIndex,
}

impl<'a> IntakePipeline<'a> {
    pub fn new(index: &'a dyn FoodIndex) -> Self {
        Self { index }
    }

    /// Logs a typed phrase or transcript. A meal named in the phrase wins
    /// over `default_meal`.
    pub async fn log_phrase(
        &self,
        log: &mut LogStore,
        date: NaiveDate,
        default_meal: MealSlot,
        phrase: &str,
    ) -> Result<LogOutcome, IntakeError> {
        self.log_text(log, date, default_meal, phrase, MANUAL_SEARCH_LIMIT)
            .await
    }

    async fn log_text(
        &self,
        log: &mut LogStore,
        date: NaiveDate,
        default_meal: MealSlot,
        phrase: &str,
        limit: usize,
    ) -> Result<LogOutcome, IntakeError> {
        let normalized = normalize(phrase);
        if normalized.is_empty() {
            tracing::debug!("Nothing to search for in {:?}", phrase);
            return Ok(LogOutcome::NotUnderstood {
                transcript: phrase.to_string(),
            });
        }

        let meal = normalized.meal_hint.unwrap_or(default_meal);
        let query = normalized.query;
        let resolver = Resolver::new(self.index).with_limit(limit);
        let outcome = match resolver.resolve(&query).await? {
            Resolution::AutoMatch(record) => self.choose(log, date, meal, &record),
            Resolution::Candidates(candidates) => LogOutcome::Choose {
                meal,
                query,
                candidates,
            },
            Resolution::NoMatch => LogOutcome::NoMatch { meal, query },
        };
        Ok(outcome)
    }

    /// Stops an active recording and logs what was said.
    ///
    /// Stopping when nothing is being recorded, or getting an empty
    /// transcript back, reports [`LogOutcome::NotUnderstood`].
    pub async fn log_voice<R: AudioRecorder>(
        &self,
        capture: &CaptureController<R>,
        log: &mut LogStore,
        date: NaiveDate,
        default_meal: MealSlot,
    ) -> Result<LogOutcome, IntakeError> {
        let transcript = capture.stop().await?.unwrap_or_default();
        tracing::info!("Heard: {:?}", transcript);
        self.log_text(log, date, default_meal, &transcript, VOICE_SEARCH_LIMIT)
            .await
    }

    /// Logs the record the user picked.
    pub fn choose(
        &self,
        log: &mut LogStore,
        date: NaiveDate,
        meal: MealSlot,
        record: &FoodRecord,
    ) -> LogOutcome {
        let entry = FoodEntry::from(record);
        log.add_entry(date, meal, entry.clone());
        LogOutcome::Logged { meal, entry }
    }
}
