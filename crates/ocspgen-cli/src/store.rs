//! The store contract the batch job depends on.
//!
//! Signing and emission only need three operations. Any backend that
//! provides them (the `SQLite` [`CertDatabase`], an in-memory fake) can
//! drive a run.

use std::future::Future;

use crate::storage::{CertDatabase, CertificateRecord, DatabaseError, OcspRecord};

/// Narrow read/write access to a certificate store.
///
/// Timestamps are Unix seconds; "unexpired" means `expiry > now`.
pub trait CertificateStore {
    /// Certificates that have not expired at `now`, in store order.
    fn unexpired_certificates(
        &self,
        now: i64,
    ) -> impl Future<Output = Result<Vec<CertificateRecord>, DatabaseError>>;

    /// Insert or overwrite the response stored for a certificate.
    fn upsert_ocsp(
        &self,
        serial_number: &str,
        authority_key_identifier: &str,
        body: &[u8],
        expiry: i64,
    ) -> impl Future<Output = Result<(), DatabaseError>>;

    /// Responses that have not expired at `now`, in store order.
    fn unexpired_ocsp_responses(
        &self,
        now: i64,
    ) -> impl Future<Output = Result<Vec<OcspRecord>, DatabaseError>>;
}

impl CertificateStore for CertDatabase {
    async fn unexpired_certificates(
        &self,
        now: i64,
    ) -> Result<Vec<CertificateRecord>, DatabaseError> {
        self.unexpired_certificates_at(now).await
    }

    async fn upsert_ocsp(
        &self,
        serial_number: &str,
        authority_key_identifier: &str,
        body: &[u8],
        expiry: i64,
    ) -> Result<(), DatabaseError> {
        Self::upsert_ocsp(self, serial_number, authority_key_identifier, body, expiry).await
    }

    async fn unexpired_ocsp_responses(&self, now: i64) -> Result<Vec<OcspRecord>, DatabaseError> {
        self.unexpired_ocsp_at(now).await
    }
}
