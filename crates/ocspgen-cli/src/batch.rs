//! Batch signing pass.
//!
//! One sequential pass over every unexpired certificate in the store:
//! parse the PEM, build a sign request, sign it, and upsert the response
//! with a one-day store expiry.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use ocspgen_crypto::{CertStatus, Certificate, CryptoError, SignRequest, Signer};
use tracing::{debug, info, warn};

use crate::error::{ErrorKind, JobError};
use crate::storage::CertificateRecord;
use crate::store::CertificateStore;

/// How long a stored response stays eligible for emission: one day from
/// signing, whatever the signer's `nextUpdate` interval is.
pub const RESPONSE_LIFETIME_SECS: i64 = 24 * 60 * 60;

/// What to do when a single certificate cannot be parsed or signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Abort the whole pass at the first failure. Responses already
    /// written stay in the store.
    #[default]
    FailFast,
    /// Record the failure and move on to the next certificate.
    Continue,
}

impl FailurePolicy {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FailFast => "fail-fast",
            Self::Continue => "continue",
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fail-fast" => Ok(Self::FailFast),
            "continue" => Ok(Self::Continue),
            other => Err(JobError::Config(format!(
                "unknown failure policy '{other}' (expected fail-fast or continue)"
            ))),
        }
    }
}

/// A certificate skipped under [`FailurePolicy::Continue`].
#[derive(Debug)]
pub struct ItemFailure {
    pub serial: String,
    pub error: JobError,
}

/// Outcome of a signing pass that was not aborted.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Unexpired certificates the store returned.
    pub total: usize,
    /// Responses signed and written.
    pub signed: usize,
    /// Certificates skipped (only ever non-empty under `Continue`).
    pub failures: Vec<ItemFailure>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Build the sign request for one stored certificate.
///
/// The status is always the operator's `status`. Reason and revocation time
/// are copied from the record only when its stored status is exactly
/// `revoked`.
pub fn build_sign_request(
    record: &CertificateRecord,
    certificate: Certificate,
    status: CertStatus,
) -> Result<SignRequest, JobError> {
    let mut request = SignRequest::new(certificate, status);
    if record.is_revoked() {
        request.reason = record.reason;
        request.revoked_at = match record.revoked_at {
            Some(ts) => Some(DateTime::from_timestamp(ts, 0).ok_or_else(|| {
                JobError::Parse {
                    serial: record.serial_number.clone(),
                    source: CryptoError::InvalidRequest(format!(
                        "revocation time {ts} is out of range"
                    )),
                }
            })?),
            None => None,
        };
    }
    Ok(request)
}

/// Drives one signing pass against a store with a signer.
pub struct BatchProcessor<'a, S, G> {
    store: &'a S,
    signer: &'a G,
    status: CertStatus,
    policy: FailurePolicy,
    clock: fn() -> DateTime<Utc>,
}

impl<'a, S: CertificateStore, G: Signer> BatchProcessor<'a, S, G> {
    pub fn new(store: &'a S, signer: &'a G, status: CertStatus) -> Self {
        Self {
            store,
            signer,
            status,
            policy: FailurePolicy::default(),
            clock: Utc::now,
        }
    }

    #[must_use]
    pub const fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the wall clock used for store reads and expirations.
    #[must_use]
    pub const fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Run the pass.
    ///
    /// Store errors always abort. Parse and sign errors abort under
    /// [`FailurePolicy::FailFast`] and are collected under
    /// [`FailurePolicy::Continue`].
    pub async fn run(&self) -> Result<BatchReport, JobError> {
        let certs = self
            .store
            .unexpired_certificates((self.clock)().timestamp())
            .await?;
        info!(
            count = certs.len(),
            status = %self.status,
            policy = self.policy.as_str(),
            "Signing OCSP responses for unexpired certificates"
        );

        let mut report = BatchReport {
            total: certs.len(),
            ..BatchReport::default()
        };

        for record in &certs {
            match self.process(record).await {
                Ok(()) => report.signed += 1,
                Err(error)
                    if self.policy == FailurePolicy::Continue
                        && matches!(error.kind(), ErrorKind::Parse | ErrorKind::Sign) =>
                {
                    warn!(serial = %record.serial_number, error = %error, "Skipping certificate");
                    report.failures.push(ItemFailure {
                        serial: record.serial_number.clone(),
                        error,
                    });
                }
                Err(error) => return Err(error),
            }
        }

        info!(
            signed = report.signed,
            failed = report.failures.len(),
            "Signing pass finished"
        );
        Ok(report)
    }

    async fn process(&self, record: &CertificateRecord) -> Result<(), JobError> {
        let certificate =
            Certificate::from_pem(record.pem.as_bytes()).map_err(|source| JobError::Parse {
                serial: record.serial_number.clone(),
                source,
            })?;
        let request = build_sign_request(record, certificate, self.status)?;

        let signed_at = (self.clock)();
        let body = self
            .signer
            .sign(&request)
            .map_err(|source| JobError::Sign {
                serial: record.serial_number.clone(),
                source,
            })?;
        let expiry = signed_at.timestamp() + RESPONSE_LIFETIME_SECS;

        self.store
            .upsert_ocsp(
                request.certificate.serial_number(),
                &record.authority_key_identifier,
                &body,
                expiry,
            )
            .await?;

        debug!(
            serial = request.certificate.serial_number(),
            revoked = record.is_revoked(),
            expiry,
            "Stored OCSP response"
        );
        Ok(())
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
    use std::cell::RefCell;

    use ocspgen_crypto::testing::{self, CaBundle};

    use super::*;
    use crate::storage::{DatabaseError, OcspRecord};

    const NOW: i64 = 1_700_000_000;

    fn fixed_clock() -> DateTime<Utc> {
        DateTime::from_timestamp(NOW, 0).unwrap()
    }

    /// In-memory store that keeps upserts in call order.
    #[derive(Default)]
    struct FakeStore {
        certs: Vec<CertificateRecord>,
        upserts: RefCell<Vec<OcspRecord>>,
        fail_upsert: bool,
    }

    impl CertificateStore for FakeStore {
        async fn unexpired_certificates(
            &self,
            now: i64,
        ) -> Result<Vec<CertificateRecord>, DatabaseError> {
            Ok(self.certs.iter().filter(|c| c.expiry > now).cloned().collect())
        }

        async fn upsert_ocsp(
            &self,
            serial_number: &str,
            authority_key_identifier: &str,
            body: &[u8],
            expiry: i64,
        ) -> Result<(), DatabaseError> {
            if self.fail_upsert {
                return Err(DatabaseError::Query("disk full".into()));
            }
            self.upserts.borrow_mut().push(OcspRecord {
                serial_number: serial_number.to_string(),
                authority_key_identifier: authority_key_identifier.to_string(),
                body: body.to_vec(),
                expiry,
            });
            Ok(())
        }

        async fn unexpired_ocsp_responses(
            &self,
            now: i64,
        ) -> Result<Vec<OcspRecord>, DatabaseError> {
            Ok(self
                .upserts
                .borrow()
                .iter()
                .filter(|r| r.expiry > now)
                .cloned()
                .collect())
        }
    }

    /// Signer that records requests and returns the serial as the body.
    #[derive(Default)]
    struct RecordingSigner {
        requests: RefCell<Vec<SignRequest>>,
        fail_serial: Option<&'static str>,
    }

    impl Signer for RecordingSigner {
        fn sign(&self, request: &SignRequest) -> Result<Vec<u8>, CryptoError> {
            let serial = request.certificate.serial_number();
            if self.fail_serial == Some(serial) {
                return Err(CryptoError::IssuerMismatch);
            }
            self.requests.borrow_mut().push(request.clone());
            Ok(format!("response-{serial}").into_bytes())
        }
    }

    fn record(ca: &CaBundle, serial: u64) -> CertificateRecord {
        CertificateRecord {
            serial_number: serial.to_string(),
            authority_key_identifier: "aki".to_string(),
            ca_label: None,
            status: "good".to_string(),
            reason: None,
            expiry: NOW + 1000,
            revoked_at: None,
            pem: testing::issue_leaf(ca, "leaf.example", serial).cert_pem,
        }
    }

    fn revoked(mut rec: CertificateRecord, reason: i64, at: i64) -> CertificateRecord {
        rec.status = "revoked".to_string();
        rec.reason = Some(reason);
        rec.revoked_at = Some(at);
        rec
    }

    fn corrupt(mut rec: CertificateRecord) -> CertificateRecord {
        rec.pem = "-----BEGIN CERTIFICATE-----\nnot base64!\n-----END CERTIFICATE-----\n".into();
        rec
    }

    #[test]
    fn revoked_record_enriches_request() {
        let ca = testing::generate_ca("Policy CA");
        let rec = revoked(record(&ca, 1), 1, 1_600_000_000);
        let cert = Certificate::from_pem(rec.pem.as_bytes()).unwrap();

        let request = build_sign_request(&rec, cert, CertStatus::Good).unwrap();
        assert_eq!(request.status, CertStatus::Good);
        assert_eq!(request.reason, Some(1));
        assert_eq!(request.revoked_at.unwrap().timestamp(), 1_600_000_000);
    }

    #[test]
    fn good_record_carries_no_revocation_detail() {
        let ca = testing::generate_ca("Policy CA");
        let mut rec = record(&ca, 2);
        // Stray columns on a good record are not copied.
        rec.reason = Some(4);
        rec.revoked_at = Some(1_600_000_000);
        let cert = Certificate::from_pem(rec.pem.as_bytes()).unwrap();

        let request = build_sign_request(&rec, cert, CertStatus::Revoked).unwrap();
        assert_eq!(request.status, CertStatus::Revoked);
        assert!(request.reason.is_none());
        assert!(request.revoked_at.is_none());
    }

    #[test]
    fn status_tag_match_is_exact() {
        let ca = testing::generate_ca("Policy CA");
        let mut rec = revoked(record(&ca, 3), 1, 1_600_000_000);
        rec.status = "Revoked".to_string();
        let cert = Certificate::from_pem(rec.pem.as_bytes()).unwrap();

        let request = build_sign_request(&rec, cert, CertStatus::Good).unwrap();
        assert!(request.reason.is_none());
    }

    #[tokio::test]
    async fn example_scenario_good_and_revoked() {
        let ca = testing::generate_ca("Scenario CA");
        let store = FakeStore {
            certs: vec![record(&ca, 10), revoked(record(&ca, 11), 1, 1_650_000_000)],
            ..FakeStore::default()
        };
        let signer = RecordingSigner::default();

        let report = BatchProcessor::new(&store, &signer, CertStatus::Good)
            .with_clock(fixed_clock)
            .run()
            .await
            .unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.signed, 2);
        assert!(report.is_complete());

        let requests = signer.requests.borrow();
        assert_eq!(requests[0].status, CertStatus::Good);
        assert!(requests[0].reason.is_none());
        assert!(requests[0].revoked_at.is_none());
        assert_eq!(requests[1].status, CertStatus::Good);
        assert_eq!(requests[1].reason, Some(1));
        assert_eq!(requests[1].revoked_at.unwrap().timestamp(), 1_650_000_000);

        let upserts = store.upserts.borrow();
        assert_eq!(upserts.len(), 2);
        for (upsert, serial) in upserts.iter().zip(["10", "11"]) {
            assert_eq!(upsert.serial_number, serial);
            assert_eq!(upsert.expiry, NOW + RESPONSE_LIFETIME_SECS);
            assert_eq!(upsert.body, format!("response-{serial}").into_bytes());
        }
    }

    #[tokio::test]
    async fn every_request_uses_configured_status() {
        let ca = testing::generate_ca("Status CA");
        let store = FakeStore {
            certs: vec![
                record(&ca, 20),
                revoked(record(&ca, 21), 3, 1_650_000_000),
                record(&ca, 22),
            ],
            ..FakeStore::default()
        };
        let signer = RecordingSigner::default();

        BatchProcessor::new(&store, &signer, CertStatus::Unknown)
            .with_clock(fixed_clock)
            .run()
            .await
            .unwrap();

        let requests = signer.requests.borrow();
        assert_eq!(requests.len(), 3);
        assert!(requests.iter().all(|r| r.status == CertStatus::Unknown));
    }

    #[tokio::test]
    async fn expired_certificates_are_skipped() {
        let ca = testing::generate_ca("Expiry CA");
        let mut old = record(&ca, 30);
        old.expiry = NOW - 1;
        let store = FakeStore {
            certs: vec![old, record(&ca, 31)],
            ..FakeStore::default()
        };
        let signer = RecordingSigner::default();

        let report = BatchProcessor::new(&store, &signer, CertStatus::Good)
            .with_clock(fixed_clock)
            .run()
            .await
            .unwrap();
        assert_eq!(report.total, 1);
        assert_eq!(store.upserts.borrow()[0].serial_number, "31");
    }

    #[tokio::test]
    async fn empty_store_is_an_empty_pass() {
        let store = FakeStore::default();
        let signer = RecordingSigner::default();

        let report = BatchProcessor::new(&store, &signer, CertStatus::Good)
            .run()
            .await
            .unwrap();
        assert_eq!(report.total, 0);
        assert_eq!(report.signed, 0);
        assert!(signer.requests.borrow().is_empty());
    }

    #[tokio::test]
    async fn corrupt_pem_stops_the_batch() {
        let ca = testing::generate_ca("Abort CA");
        let store = FakeStore {
            certs: vec![record(&ca, 40), corrupt(record(&ca, 41)), record(&ca, 42)],
            ..FakeStore::default()
        };
        let signer = RecordingSigner::default();

        let err = BatchProcessor::new(&store, &signer, CertStatus::Good)
            .with_clock(fixed_clock)
            .run()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(err.to_string().contains("41"));

        // Only the certificate before the bad one was signed and kept.
        let upserts = store.upserts.borrow();
        assert_eq!(upserts.len(), 1);
        assert_eq!(upserts[0].serial_number, "40");
        assert_eq!(signer.requests.borrow().len(), 1);
    }

    #[tokio::test]
    async fn signing_failure_stops_the_batch() {
        let ca = testing::generate_ca("Sign Abort CA");
        let store = FakeStore {
            certs: vec![record(&ca, 50), record(&ca, 51), record(&ca, 52)],
            ..FakeStore::default()
        };
        let signer = RecordingSigner {
            fail_serial: Some("51"),
            ..RecordingSigner::default()
        };

        let err = BatchProcessor::new(&store, &signer, CertStatus::Good)
            .with_clock(fixed_clock)
            .run()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Sign);
        assert_eq!(store.upserts.borrow().len(), 1);
    }

    #[tokio::test]
    async fn continue_policy_collects_failures() {
        let ca = testing::generate_ca("Continue CA");
        let store = FakeStore {
            certs: vec![record(&ca, 60), corrupt(record(&ca, 61)), record(&ca, 62)],
            ..FakeStore::default()
        };
        let signer = RecordingSigner {
            fail_serial: Some("62"),
            ..RecordingSigner::default()
        };

        let report = BatchProcessor::new(&store, &signer, CertStatus::Good)
            .with_policy(FailurePolicy::Continue)
            .with_clock(fixed_clock)
            .run()
            .await
            .unwrap();
        assert_eq!(report.total, 3);
        assert_eq!(report.signed, 1);
        assert!(!report.is_complete());

        let failed: Vec<_> = report
            .failures
            .iter()
            .map(|f| (f.serial.as_str(), f.error.kind()))
            .collect();
        assert_eq!(failed, [("61", ErrorKind::Parse), ("62", ErrorKind::Sign)]);
    }

    #[tokio::test]
    async fn store_errors_abort_even_when_continuing() {
        let ca = testing::generate_ca("Store CA");
        let store = FakeStore {
            certs: vec![record(&ca, 70)],
            fail_upsert: true,
            ..FakeStore::default()
        };
        let signer = RecordingSigner::default();

        let err = BatchProcessor::new(&store, &signer, CertStatus::Good)
            .with_policy(FailurePolicy::Continue)
            .run()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Store);
    }

    #[test]
    fn failure_policy_parses() {
        assert_eq!(
            "fail-fast".parse::<FailurePolicy>().unwrap(),
            FailurePolicy::FailFast
        );
        assert_eq!(
            "continue".parse::<FailurePolicy>().unwrap(),
            FailurePolicy::Continue
        );
        assert!("skip".parse::<FailurePolicy>().is_err());
    }
}
