//! Normalized adoption data model backed by SQLite.
//!
//! Rows hang off `packages` through plain foreign keys with no database-side
//! cascade; registry-scoped deletes walk the ownership graph in [`schema`].

pub mod schema;
mod sqlite;

pub use sqlite::{Batch, SqliteStore};
