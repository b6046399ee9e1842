use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use super::food::FoodEntry;
use super::meal_slot::MealSlot;

/// Errors raised when an untyped remote document does not fit the day schema.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DocumentError {
    #[error("Day document must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("Meal field '{meal}' must be an array, got {found}")]
    NotAnArray { meal: MealSlot, found: &'static str },

    #[error("Invalid entry {index} in '{meal}': {reason}")]
    InvalidEntry {
        meal: MealSlot,
        index: usize,
        reason: String,
    },
}

/// Summed nutrition for a day.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Totals {
    pub calories: u64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl fmt::Display for Totals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cal | P {:.1}g | C {:.1}g | F {:.1}g",
            self.calories, self.protein, self.carbs, self.fat
        )
    }
}

/// Everything logged on one calendar date, one ordered list per meal slot.
///
/// All four slots always exist; an unlogged slot is an empty list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DayLog {
    #[serde(rename = "Breakfast", default)]
    breakfast: Vec<FoodEntry>,
    #[serde(rename = "Lunch", default)]
    lunch: Vec<FoodEntry>,
    #[serde(rename = "Dinner", default)]
    dinner: Vec<FoodEntry>,
    #[serde(rename = "Snacks", default)]
    snacks: Vec<FoodEntry>,
}

impl DayLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self, meal: MealSlot) -> &[FoodEntry] {
        match meal {
            MealSlot::Breakfast => &self.breakfast,
            MealSlot::Lunch => &self.lunch,
            MealSlot::Dinner => &self.dinner,
            MealSlot::Snacks => &self.snacks,
        }
    }

    pub(crate) fn entries_mut(&mut self, meal: MealSlot) -> &mut Vec<FoodEntry> {
        match meal {
            MealSlot::Breakfast => &mut self.breakfast,
            MealSlot::Lunch => &mut self.lunch,
            MealSlot::Dinner => &mut self.dinner,
            MealSlot::Snacks => &mut self.snacks,
        }
    }

    pub fn with_entries(mut self, meal: MealSlot, entries: Vec<FoodEntry>) -> Self {
        *self.entries_mut(meal) = entries;
        self
    }

    pub fn is_empty(&self) -> bool {
        MealSlot::ALL.iter().all(|m| self.entries(*m).is_empty())
    }

    pub fn totals(&self) -> Totals {
        let mut totals = Totals::default();
        for entry in MealSlot::ALL.iter().flat_map(|m| self.entries(*m)) {
            totals.calories += u64::from(entry.calories);
            totals.protein += entry.protein;
            totals.carbs += entry.carbs;
            totals.fat += entry.fat;
        }
        totals
    }

    /// Validates an untyped day document into a `DayLog`.
    ///
    /// Fields that are not meal names are ignored. A meal field that is not
    /// an array of well-formed entries rejects the whole document.
    pub fn from_document(document: &Value) -> Result<Self, DocumentError> {
        let fields = document
            .as_object()
            .ok_or_else(|| DocumentError::NotAnObject(json_kind(document)))?;

        let mut day = DayLog::new();
        for (key, value) in fields {
            let Some(meal) = MealSlot::ALL.into_iter().find(|m| m.as_str() == key) else {
                tracing::debug!("Ignoring unknown day document field '{}'", key);
                continue;
            };

            let items = value.as_array().ok_or(DocumentError::NotAnArray {
                meal,
                found: json_kind(value),
            })?;

            let mut entries = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                let entry = FoodEntry::deserialize(item).map_err(|e| {
                    DocumentError::InvalidEntry {
                        meal,
                        index,
                        reason: e.to_string(),
                    }
                })?;
                entries.push(entry);
            }
            *day.entries_mut(meal) = entries;
        }

        Ok(day)
    }

    pub fn to_document(&self) -> Value {
        // Plain struct of strings and numbers; serialization cannot fail.
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Default::default()))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl fmt::Display for DayLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for meal in MealSlot::ALL {
            writeln!(f, "{}", meal)?;
            let entries = self.entries(meal);
            if entries.is_empty() {
                writeln!(f, "  (nothing logged)")?;
            }
            for (i, entry) in entries.iter().enumerate() {
                writeln!(f, "  {}. {}", i, entry)?;
            }
        }
        write!(f, "Total: {}", self.totals())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eggs() -> FoodEntry {
        FoodEntry::new("Eggs", 140, 12.0, 1.0, 10.0)
    }

    #[test]
    fn test_new_day_has_all_slots_empty() {
        let day = DayLog::new();
        for meal in MealSlot::ALL {
            assert!(day.entries(meal).is_empty());
        }
        assert!(day.is_empty());
    }

    #[test]
    fn test_totals() {
        let day = DayLog::new()
            .with_entries(MealSlot::Breakfast, vec![eggs()])
            .with_entries(MealSlot::Snacks, vec![FoodEntry::new("Apple", 95, 0.5, 25.0, 0.3)]);

        let totals = day.totals();
        assert_eq!(totals.calories, 235);
        assert!((totals.carbs - 26.0).abs() < 1e-9);
    }

    #[test]
    fn test_from_document_valid() {
        let doc = json!({
            "Lunch": [{"foodName": "Eggs", "calories": 140, "protein": 12.0, "carbs": 1.0, "fat": 10.0}],
            "updatedBy": "phone"
        });

        let day = DayLog::from_document(&doc).unwrap();
        assert_eq!(day.entries(MealSlot::Lunch), &[eggs()]);
        assert!(day.entries(MealSlot::Dinner).is_empty());
    }

    #[test]
    fn test_from_document_rejects_non_object() {
        let err = DayLog::from_document(&json!([1, 2])).unwrap_err();
        assert_eq!(err, DocumentError::NotAnObject("array"));
    }

    #[test]
    fn test_from_document_rejects_non_array_meal() {
        let err = DayLog::from_document(&json!({"Dinner": "pizza"})).unwrap_err();
        assert!(matches!(
            err,
            DocumentError::NotAnArray {
                meal: MealSlot::Dinner,
                found: "string"
            }
        ));
    }

    #[test]
    fn test_from_document_rejects_bad_entry() {
        let doc = json!({"Breakfast": [{"foodName": "Toast"}, {"calories": 10}]});
        let err = DayLog::from_document(&doc).unwrap_err();
        assert!(matches!(err, DocumentError::InvalidEntry { index: 1, .. }));
    }

    #[test]
    fn test_from_document_accepts_float_calories() {
        let doc = json!({"Lunch": [{"foodName": "Soup", "calories": 90.0, "protein": 4.0}]});

        let day = DayLog::from_document(&doc).unwrap();
        assert_eq!(day.entries(MealSlot::Lunch)[0].calories, 90);
    }

    #[test]
    fn test_document_roundtrip_keeps_order() {
        let day = DayLog::new().with_entries(
            MealSlot::Dinner,
            vec![eggs(), FoodEntry::new("Rice", 200, 4.0, 45.0, 0.4)],
        );

        let parsed = DayLog::from_document(&day.to_document()).unwrap();
        assert_eq!(parsed, day);
    }
}
