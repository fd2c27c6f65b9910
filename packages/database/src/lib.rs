#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Database connection and queries for the fruit map.
//!
//! The map's edit history stores old/new tree versions as JSON blobs; the
//! queries here expand them into flat, typed rows so downstream crates
//! never touch SQL or JSON operators.

pub mod db;
pub mod queries;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}
