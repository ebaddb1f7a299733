//! SQLite backend for the Muster check-in roster.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Because every call is executed in
//! order on that one connection, each store operation is atomic with respect
//! to the others.

mod encode;
mod migrate;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
