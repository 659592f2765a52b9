//! Embedded SQLite store: WAL journal, versioned migrations, FTS5 indexes kept
//! in sync by triggers, a single serialized writer and any number of readers

mod error;
mod maintenance;
pub mod migrations;
mod reader;
mod rows;
mod store;
pub mod writes;

pub use error::{Result, StorageError};
pub use maintenance::{MaintenancePlan, MaintenanceReport, StoreStatus};
pub use reader::{fts_query, Counts, HitSource, PinnedObservation, Reader, SearchHit, SummaryCandidate};
pub use rusqlite::Transaction;
pub use store::{pending_migrations, Store, StoreOptions};
