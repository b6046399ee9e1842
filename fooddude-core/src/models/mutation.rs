use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::food::FoodEntry;
use super::meal_slot::MealSlot;

/// The change a mutation makes to one meal slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "kebab-case")]
pub enum MutationOp {
    /// Append one entry to the end of the slot.
    Append(FoodEntry),
    /// Overwrite the whole slot with the given list.
    ReplaceSlot(Vec<FoodEntry>),
    /// Empty the slot.
    ClearSlot,
}

impl MutationOp {
    pub fn kind(&self) -> &'static str {
        match self {
            MutationOp::Append(_) => "append",
            MutationOp::ReplaceSlot(_) => "replace-slot",
            MutationOp::ClearSlot => "clear-slot",
        }
    }
}

/// A log change that has not yet been confirmed persisted remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingMutation {
    pub id: Uuid,
    pub date: NaiveDate,
    pub meal: MealSlot,
    pub op: MutationOp,
    pub created_at: DateTime<Utc>,
}

impl PendingMutation {
    pub fn new(date: NaiveDate, meal: MealSlot, op: MutationOp) -> Self {
        Self {
            id: Uuid::new_v4(),
            date,
            meal,
            op,
            created_at: Utc::now(),
        }
    }

    pub fn append(date: NaiveDate, meal: MealSlot, entry: FoodEntry) -> Self {
        Self::new(date, meal, MutationOp::Append(entry))
    }

    pub fn replace_slot(date: NaiveDate, meal: MealSlot, entries: Vec<FoodEntry>) -> Self {
        Self::new(date, meal, MutationOp::ReplaceSlot(entries))
    }

    pub fn clear_slot(date: NaiveDate, meal: MealSlot) -> Self {
        Self::new(date, meal, MutationOp::ClearSlot)
    }
}

impl fmt::Display for PendingMutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.op.kind(), self.date, self.meal)
    }
}
