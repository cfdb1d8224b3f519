//! Database queries for the certificate store.

use super::db::{CertDatabase, DatabaseError};
use super::models::{CertificateRecord, CertificateStatus, NewCertificate, OcspRecord};

impl CertDatabase {
    // =========================================================================
    // Certificate queries
    // =========================================================================

    /// Record a newly issued certificate with status `good`.
    pub async fn insert_certificate(
        &self,
        cert: &NewCertificate<'_>,
    ) -> Result<CertificateRecord, DatabaseError> {
        sqlx::query(
            r"
            INSERT INTO certificates
                (serial_number, authority_key_identifier, ca_label, status, expiry, pem)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(cert.serial_number)
        .bind(cert.authority_key_identifier)
        .bind(cert.ca_label)
        .bind(CertificateStatus::Good.as_str())
        .bind(cert.expiry)
        .bind(cert.pem)
        .execute(self.pool())
        .await?;

        self.get_certificate(cert.serial_number, cert.authority_key_identifier)
            .await
    }

    /// Get a certificate by serial number and authority key identifier.
    pub async fn get_certificate(
        &self,
        serial_number: &str,
        authority_key_identifier: &str,
    ) -> Result<CertificateRecord, DatabaseError> {
        sqlx::query_as::<_, CertificateRecord>(
            "SELECT * FROM certificates WHERE serial_number = ? AND authority_key_identifier = ?",
        )
        .bind(serial_number)
        .bind(authority_key_identifier)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("Certificate {serial_number}")))
    }

    /// Mark a certificate revoked. Returns `false` if no such certificate.
    pub async fn revoke_certificate(
        &self,
        serial_number: &str,
        authority_key_identifier: &str,
        reason: i64,
        revoked_at: i64,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r"
            UPDATE certificates SET status = ?, reason = ?, revoked_at = ?
            WHERE serial_number = ? AND authority_key_identifier = ?
            ",
        )
        .bind(CertificateStatus::Revoked.as_str())
        .bind(reason)
        .bind(revoked_at)
        .bind(serial_number)
        .bind(authority_key_identifier)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Certificates whose expiry is later than `now`, in insertion order.
    pub async fn unexpired_certificates_at(
        &self,
        now: i64,
    ) -> Result<Vec<CertificateRecord>, DatabaseError> {
        let certs = sqlx::query_as::<_, CertificateRecord>(
            "SELECT * FROM certificates WHERE expiry > ? ORDER BY rowid",
        )
        .bind(now)
        .fetch_all(self.pool())
        .await?;

        Ok(certs)
    }

    // =========================================================================
    // OCSP response queries
    // =========================================================================

    /// Insert or replace the OCSP response for a certificate.
    pub async fn upsert_ocsp(
        &self,
        serial_number: &str,
        authority_key_identifier: &str,
        body: &[u8],
        expiry: i64,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r"
            INSERT INTO ocsp_responses (serial_number, authority_key_identifier, body, expiry)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (serial_number, authority_key_identifier)
            DO UPDATE SET body = excluded.body, expiry = excluded.expiry
            ",
        )
        .bind(serial_number)
        .bind(authority_key_identifier)
        .bind(body)
        .bind(expiry)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Get the stored OCSP response for a certificate, expired or not.
    pub async fn get_ocsp(
        &self,
        serial_number: &str,
        authority_key_identifier: &str,
    ) -> Result<Option<OcspRecord>, DatabaseError> {
        let record = sqlx::query_as::<_, OcspRecord>(
            "SELECT * FROM ocsp_responses WHERE serial_number = ? AND authority_key_identifier = ?",
        )
        .bind(serial_number)
        .bind(authority_key_identifier)
        .fetch_optional(self.pool())
        .await?;

        Ok(record)
    }

    /// OCSP responses whose expiry is later than `now`, in insertion order.
    pub async fn unexpired_ocsp_at(&self, now: i64) -> Result<Vec<OcspRecord>, DatabaseError> {
        let records = sqlx::query_as::<_, OcspRecord>(
            "SELECT * FROM ocsp_responses WHERE expiry > ? ORDER BY rowid",
        )
        .bind(now)
        .fetch_all(self.pool())
        .await?;

        Ok(records)
    }
}

#[cfg(test)]
#[allow(
    clippy::panic,
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::needless_pass_by_value
)]
mod tests {
    use crate::storage::{CertDatabase, DatabaseError, NewCertificate};

    const AKI: &str = "aki-1";

    async fn test_db() -> CertDatabase {
        CertDatabase::open_in_memory().await.unwrap()
    }

    fn new_cert(serial: &str, expiry: i64) -> NewCertificate<'_> {
        NewCertificate {
            serial_number: serial,
            authority_key_identifier: AKI,
            ca_label: None,
            expiry,
            pem: "-----BEGIN CERTIFICATE-----\ntest\n-----END CERTIFICATE-----",
        }
    }

    #[tokio::test]
    async fn insert_and_get_certificate() {
        let db = test_db().await;
        let cert = db.insert_certificate(&new_cert("100", 2000)).await.unwrap();

        assert_eq!(cert.serial_number, "100");
        assert_eq!(cert.status, "good");
        assert!(cert.reason.is_none());
        assert!(cert.revoked_at.is_none());
        assert!(!cert.is_revoked());
    }

    #[tokio::test]
    async fn get_missing_certificate_is_not_found() {
        let db = test_db().await;
        let err = db.get_certificate("404", AKI).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound(_)));
    }

    #[tokio::test]
    async fn revoke_sets_reason_and_time() {
        let db = test_db().await;
        db.insert_certificate(&new_cert("200", 2000)).await.unwrap();

        assert!(db.revoke_certificate("200", AKI, 1, 1500).await.unwrap());
        let cert = db.get_certificate("200", AKI).await.unwrap();
        assert!(cert.is_revoked());
        assert_eq!(cert.reason, Some(1));
        assert_eq!(cert.revoked_at, Some(1500));

        assert!(!db.revoke_certificate("missing", AKI, 1, 1500).await.unwrap());
    }

    #[tokio::test]
    async fn unexpired_certificates_filter_and_order() {
        let db = test_db().await;
        db.insert_certificate(&new_cert("3", 3000)).await.unwrap();
        db.insert_certificate(&new_cert("1", 500)).await.unwrap();
        db.insert_certificate(&new_cert("2", 2000)).await.unwrap();

        let certs = db.unexpired_certificates_at(1000).await.unwrap();
        let serials: Vec<_> = certs.iter().map(|c| c.serial_number.as_str()).collect();
        assert_eq!(serials, ["3", "2"]);
    }

    #[tokio::test]
    async fn expiry_boundary_is_exclusive() {
        let db = test_db().await;
        db.insert_certificate(&new_cert("edge", 1000)).await.unwrap();
        assert!(db.unexpired_certificates_at(1000).await.unwrap().is_empty());
        assert_eq!(db.unexpired_certificates_at(999).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn upsert_overwrites_previous_response() {
        let db = test_db().await;
        db.upsert_ocsp("10", AKI, b"first", 2000).await.unwrap();
        db.upsert_ocsp("10", AKI, b"second", 3000).await.unwrap();

        let record = db.get_ocsp("10", AKI).await.unwrap().unwrap();
        assert_eq!(record.body, b"second");
        assert_eq!(record.expiry, 3000);
        assert_eq!(db.unexpired_ocsp_at(0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn upsert_keeps_original_position() {
        let db = test_db().await;
        db.upsert_ocsp("a", AKI, b"a1", 2000).await.unwrap();
        db.upsert_ocsp("b", AKI, b"b1", 2000).await.unwrap();
        db.upsert_ocsp("a", AKI, b"a2", 2000).await.unwrap();

        let records = db.unexpired_ocsp_at(1000).await.unwrap();
        let serials: Vec<_> = records.iter().map(|r| r.serial_number.as_str()).collect();
        assert_eq!(serials, ["a", "b"]);
    }

    #[tokio::test]
    async fn expired_responses_are_hidden() {
        let db = test_db().await;
        db.upsert_ocsp("old", AKI, b"old", 500).await.unwrap();
        db.upsert_ocsp("new", AKI, b"new", 5000).await.unwrap();

        let records = db.unexpired_ocsp_at(1000).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].serial_number, "new");
        // Expired rows stay in the table until overwritten.
        assert!(db.get_ocsp("old", AKI).await.unwrap().is_some());
    }
}
