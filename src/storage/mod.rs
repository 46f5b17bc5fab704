//! `SQLite` persistence for mirrored tickets and history.

pub mod schema;
pub mod sqlite;

pub use sqlite::{SqliteStorage, StoreCounts};
