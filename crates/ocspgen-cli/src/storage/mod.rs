//! `SQLite` certificate store for `ocspgen`.
//!
//! Holds issued certificates with their revocation state and the signed
//! OCSP responses generated for them.

mod db;
mod models;
mod queries;

pub use db::{CertDatabase, DatabaseError};
pub use models::*;
