//! `ocspgen` Core Library
//!
//! Shared functionality for `ocspgen` components:
//! - Certificate store configuration (certdb-style JSON)
//! - `SQLite` pool helpers and the `define_database!` macro
//! - Tracing initialisation
//! - Common error types

pub mod config;
pub mod db;
pub mod error;
pub mod tracing_init;

pub use config::DbConfig;
pub use error::{Error, Result};
