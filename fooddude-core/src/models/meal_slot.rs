use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The four fixed meal categories an entry can be filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MealSlot {
    Breakfast,
    Lunch,
    Dinner,
    Snacks,
}

impl MealSlot {
    pub const ALL: [MealSlot; 4] = [
        MealSlot::Breakfast,
        MealSlot::Lunch,
        MealSlot::Dinner,
        MealSlot::Snacks,
    ];

    /// Field name used for this slot in remote day documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            MealSlot::Breakfast => "Breakfast",
            MealSlot::Lunch => "Lunch",
            MealSlot::Dinner => "Dinner",
            MealSlot::Snacks => "Snacks",
        }
    }

    /// Matches a single lowercase word against the meal keywords.
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "breakfast" => Some(MealSlot::Breakfast),
            "lunch" => Some(MealSlot::Lunch),
            "dinner" => Some(MealSlot::Dinner),
            "snack" | "snacks" => Some(MealSlot::Snacks),
            _ => None,
        }
    }
}

impl fmt::Display for MealSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MealSlot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MealSlot::from_keyword(s.trim().to_lowercase().as_str()).ok_or_else(|| {
            format!(
                "Invalid meal '{}'. Valid options: breakfast, lunch, dinner, snacks",
                s
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meal_slot_display() {
        assert_eq!(format!("{}", MealSlot::Breakfast), "Breakfast");
        assert_eq!(format!("{}", MealSlot::Snacks), "Snacks");
    }

    #[test]
    fn test_meal_slot_from_str() {
        assert_eq!(MealSlot::from_str("LUNCH").unwrap(), MealSlot::Lunch);
        assert_eq!(MealSlot::from_str("dinner").unwrap(), MealSlot::Dinner);
        assert_eq!(MealSlot::from_str("snack").unwrap(), MealSlot::Snacks);
        assert_eq!(MealSlot::from_str("Snacks").unwrap(), MealSlot::Snacks);
    }

    #[test]
    fn test_meal_slot_from_str_invalid() {
        assert!(MealSlot::from_str("brunch").is_err());
        assert!(MealSlot::from_str("").is_err());
    }

    #[test]
    fn test_meal_slot_serializes_as_document_field() {
        let json = serde_json::to_string(&MealSlot::Snacks).unwrap();
        assert_eq!(json, "\"Snacks\"");
    }
}
