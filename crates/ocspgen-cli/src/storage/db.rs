//! Database connection and initialization.

pub use ocspgen_core::db::DatabaseError;

ocspgen_core::define_database!(CertDatabase, "Certificate store migrations complete");
