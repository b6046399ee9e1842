use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A row of the food-composition reference. Never mutated after load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodRecord {
    pub id: i64,
    pub name: String,
    pub calories: u32,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl FoodRecord {
    /// Builds a record from raw reference values, normalizing them the same
    /// way for every index engine.
    pub fn from_raw(id: i64, name: &str, calories: f64, protein: f64, carbs: f64, fat: f64) -> Self {
        let name = name.trim();
        Self {
            id,
            name: if name.is_empty() {
                "Unknown".to_string()
            } else {
                name.to_string()
            },
            calories: round_calories(calories),
            protein: round_tenth(protein),
            carbs: round_tenth(carbs),
            fat: round_tenth(fat),
        }
    }
}

/// A logged food: a snapshot of a [`FoodRecord`] taken when it was logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodEntry {
    #[serde(rename = "foodName")]
    pub name: String,
    #[serde(default, deserialize_with = "calories_from_number")]
    pub calories: u32,
    #[serde(default)]
    pub protein: f64,
    #[serde(default)]
    pub carbs: f64,
    #[serde(default)]
    pub fat: f64,
}

impl FoodEntry {
    pub fn new(name: impl Into<String>, calories: u32, protein: f64, carbs: f64, fat: f64) -> Self {
        Self {
            name: name.into(),
            calories,
            protein,
            carbs,
            fat,
        }
    }
}

impl From<&FoodRecord> for FoodEntry {
    fn from(record: &FoodRecord) -> Self {
        Self {
            name: record.name.trim().to_string(),
            calories: record.calories,
            protein: record.protein,
            carbs: record.carbs,
            fat: record.fat,
        }
    }
}

impl fmt::Display for FoodEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} cal | {}g P | {}g C | {}g F",
            self.name, self.calories, self.protein, self.carbs, self.fat
        )
    }
}

fn round_calories(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.round() as u32
    } else {
        0
    }
}

/// Other devices may write calories as any JSON number.
fn calories_from_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value.map(round_calories).unwrap_or(0))
}

fn round_tenth(value: f64) -> f64 {
    if value.is_finite() {
        (value * 10.0).round() / 10.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_rounds_values() {
        let record = FoodRecord::from_raw(7, "  Egg, whole  ", 71.6, 6.28, 0.36, 4.75);

        assert_eq!(record.name, "Egg, whole");
        assert_eq!(record.calories, 72);
        assert_eq!(record.protein, 6.3);
        assert_eq!(record.carbs, 0.4);
        assert_eq!(record.fat, 4.8);
    }

    #[test]
    fn test_from_raw_defaults() {
        let record = FoodRecord::from_raw(1, "   ", -5.0, f64::NAN, 0.0, 0.0);

        assert_eq!(record.name, "Unknown");
        assert_eq!(record.calories, 0);
        assert_eq!(record.protein, 0.0);
    }

    #[test]
    fn test_entry_is_snapshot_of_record() {
        let mut record = FoodRecord::from_raw(1, "Banana", 105.0, 1.3, 27.0, 0.4);
        let entry = FoodEntry::from(&record);
        record.calories = 999;

        assert_eq!(entry.name, "Banana");
        assert_eq!(entry.calories, 105);
    }

    #[test]
    fn test_entry_wire_name_field() {
        let entry = FoodEntry::new("Toast", 80, 3.0, 15.0, 1.0);
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["foodName"], "Toast");
        assert!(json.get("name").is_none());
    }

    #[test]
    fn test_entry_accepts_fractional_calories() {
        let entry: FoodEntry = serde_json::from_value(serde_json::json!({
            "foodName": "Soup",
            "calories": 90.0,
            "protein": 4.5
        }))
        .unwrap();
        assert_eq!(entry.calories, 90);

        let entry: FoodEntry =
            serde_json::from_value(serde_json::json!({"foodName": "Tea", "calories": 2.5}))
                .unwrap();
        assert_eq!(entry.calories, 3);

        let entry: FoodEntry =
            serde_json::from_value(serde_json::json!({"foodName": "Ice", "calories": null}))
                .unwrap();
        assert_eq!(entry.calories, 0);

        let entry: FoodEntry =
            serde_json::from_value(serde_json::json!({"foodName": "Water", "calories": -3}))
                .unwrap();
        assert_eq!(entry.calories, 0);
    }
}
