//! Turns a raw transcript or typed phrase into a meal hint and a search query.

use crate::models::MealSlot;

/// Filler words removed before searching.
const STOP_WORDS: &[&str] = &[
    "add", "log", "track", "i", "im", "had", "have", "ate", "please", "and", "with", "to", "for",
    "the", "a", "an",
];

/// Connectives dropped when they directly precede a meal keyword
/// ("to lunch", "for dinner").
const MEAL_CONNECTIVES: &[&str] = &["to", "for"];

/// Order in which named meals claim the hint when a phrase names several.
const MEAL_PRIORITY: [MealSlot; 4] = [
    MealSlot::Lunch,
    MealSlot::Dinner,
    MealSlot::Breakfast,
    MealSlot::Snacks,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub meal_hint: Option<MealSlot>,
    pub query: String,
}

impl Normalized {
    pub fn is_empty(&self) -> bool {
        self.query.is_empty()
    }
}

/// Normalizes a phrase like `"Add two eggs to lunch"` into
/// `(Some(Lunch), "two eggs")`.
///
/// When several meals are named the hint follows a fixed priority (lunch,
/// dinner, breakfast, snacks), so "breakfast burrito for lunch" is lunch.
/// Every meal keyword is removed from the query. Re-normalizing the returned query yields the
/// same query.
pub fn normalize(raw: &str) -> Normalized {
    let cleaned = clean(raw);
    let words: Vec<&str> = cleaned.split_whitespace().collect();

    let mut named: Vec<MealSlot> = Vec::new();
    let mut kept: Vec<&str> = Vec::with_capacity(words.len());
    for word in words {
        if let Some(meal) = MealSlot::from_keyword(word) {
            named.push(meal);
            while kept
                .last()
                .is_some_and(|prev| MEAL_CONNECTIVES.contains(prev))
            {
                kept.pop();
            }
            continue;
        }
        kept.push(word);
    }

    let meal_hint = MEAL_PRIORITY
        .into_iter()
        .find(|meal| named.contains(meal));

    let query = kept
        .into_iter()
        .filter(|w| !STOP_WORDS.contains(w))
        .collect::<Vec<_>>()
        .join(" ");

    Normalized { meal_hint, query }
}

/// Lowercases and reduces the text to `[a-z0-9 ]`. Apostrophes are dropped
/// so contractions stay one word; anything else becomes a word break.
fn clean(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != '\'' && *c != '\u{2019}')
        .flat_map(char::to_lowercase)
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                ' '
            }
        })
        .collect()
}
