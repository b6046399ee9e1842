mod day_log;
mod food;
mod meal_slot;
mod mutation;

pub use day_log::{DayLog, DocumentError, Totals};
pub use food::{FoodEntry, FoodRecord};
pub use meal_slot::MealSlot;
pub use mutation::{MutationOp, PendingMutation};
