//! Storage layer for workflows, jobs, request logs, and the content cache.

mod models;
mod sqlite;

pub use models::*;
pub use sqlite::SqliteStorage;
