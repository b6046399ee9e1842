//! FoodDude Core Library
//!
//! Food intake pipeline shared by the FoodDude applications: food index
//! search, phrase normalization, voice capture, the in-memory day log and
//! its sync with the remote document store.

pub mod capture;
pub mod index;
pub mod intake;
pub mod log_store;
pub mod models;
pub mod normalize;
pub mod resolver;
pub mod sync;
pub mod transcribe;

pub use capture::{AudioRecorder, CaptureController, CaptureError, CaptureState, CommandRecorder};
pub use index::{FoodIndex, IndexError, MemoryFoodIndex, SqliteFoodIndex};
pub use intake::{IntakeError, IntakePipeline, LogOutcome};
pub use log_store::LogStore;
pub use models::{DayLog, FoodEntry, FoodRecord, MealSlot, MutationOp, PendingMutation, Totals};
pub use normalize::{normalize, Normalized};
pub use resolver::{Resolution, Resolver};
pub use sync::{
    DocumentStore, FlushReport, HttpDocumentStore, MemoryDocumentStore, PersistenceError,
    QueueFile, StoreError, SyncEngine, SyncHandle, SyncWorker,
};
pub use transcribe::{
    build_transcriber, Transcriber, TranscriptionBackend, TranscriptionError,
    TranscriptionSettings,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
