//! `ocspgen` Library
//!
//! Batch OCSP response generation:
//! - `SQLite` certificate store (certificates and signed responses)
//! - Batch signing pass over every unexpired certificate
//! - Base64 line emission of every unexpired response

pub mod batch;
pub mod emit;
pub mod error;
pub mod job;
pub mod storage;
pub mod store;

pub use batch::{BatchProcessor, BatchReport, FailurePolicy};
pub use error::{ErrorKind, JobError};
pub use job::{JobOptions, JobSummary};
pub use store::CertificateStore;
