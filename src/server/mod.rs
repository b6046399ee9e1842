//! Server-side modules for the FoodDude document server.

pub mod auth;
pub mod hub;
pub mod routes;
pub mod storage;

pub use auth::{ApiKeyEntry, ApiKeyStore, AuthUser};
pub use hub::DayHub;
pub use routes::{router, AppState};
pub use storage::{DayStorage, DayStorageError};
