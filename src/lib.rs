//! FoodDude applications: shared CLI configuration and the document server.

pub mod config;
pub mod server;
