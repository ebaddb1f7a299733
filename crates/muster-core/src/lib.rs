//! Core types and trait definitions for the Muster check-in roster.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it.

pub mod error;
pub mod member;
pub mod period;
pub mod report;
pub mod store;
pub mod summary;

pub use error::{Error, Result};
