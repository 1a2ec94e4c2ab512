//! Spaced-repetition scheduling core for vocabulary learning.
//!
//! The crate is organised around four collaborators: [`Scheduler`] projects
//! review outcomes through an FSRS memory model, [`CardStore`] holds the
//! live active/mastered card partitions, [`queue::partition`] buckets cards
//! by due time, and [`ReviewSession`] drives one sitting of reviews.
//! Persistence is behind the [`storage::CardRepository`] trait; everything
//! above it is pure in-memory state driven by explicit timestamps.

pub mod card;
pub mod config;
pub mod queue;
pub mod scheduler;
pub mod session;
pub mod storage;
pub mod store;

pub use card::{Card, CardId, Memory, ReviewPhase, ReviewedState};
pub use config::Config;
pub use queue::{ReviewQueues, partition};
pub use scheduler::{MemoryModel, Projection, Rating, SchedulePreview, Scheduler};
pub use session::{ReviewSession, SessionPhase, SessionStats, TICK_PERIOD};
pub use storage::{CardRepository, SqliteRepository};
pub use store::CardStore;
