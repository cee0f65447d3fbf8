//! SQLite backend for the penny ledger.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every mutation runs inside one
//! `BEGIN IMMEDIATE` transaction, retried a bounded number of times when the
//! database is busy.

mod encode;
mod queries;
mod schema;
mod store;

pub mod error;
pub mod options;

pub use error::{Error, Result};
pub use options::StoreOptions;
pub use store::SqliteStore;
