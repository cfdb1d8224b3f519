//! OCSP signer construction.
//!
//! [`signer_from_config`] is a pure function from explicit paths to an
//! owned [`StandardSigner`]; batch jobs and long-running services each
//! build their own instance.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Datelike, TimeDelta, Utc};
use tracing::{debug, info};

use crate::certs::Certificate;
use crate::error::CryptoError;
use crate::key::ResponderKey;
use crate::ocsp::{self, ResponseTimes, SignRequest, Signer};

/// Default re-signing interval (`nextUpdate - thisUpdate`): four days.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(96 * 60 * 60);

/// Last year a `GeneralizedTime` can carry.
const MAX_YEAR: i32 = 9999;

/// Paths and interval a signer is built from.
#[derive(Debug, Clone)]
pub struct SignerConfig {
    /// CA certificate that issued the certificates being answered for.
    pub ca_file: PathBuf,
    /// Certificate of the key that signs responses.
    pub responder_file: PathBuf,
    /// Responder private key.
    pub responder_key_file: Option<PathBuf>,
    /// General key, used when no responder-specific key is configured.
    pub key_file: Option<PathBuf>,
    pub interval: Duration,
}

impl SignerConfig {
    /// The key to load: the responder key if set, otherwise the general key.
    pub fn key_path(&self) -> Option<&Path> {
        self.responder_key_file
            .as_deref()
            .or(self.key_file.as_deref())
    }
}

/// Build a signer from files on disk.
pub fn signer_from_config(config: &SignerConfig) -> Result<StandardSigner, CryptoError> {
    let key_path = config.key_path().ok_or_else(|| {
        CryptoError::Config("no responder key configured (set --responder-key or --key)".into())
    })?;

    let issuer = Certificate::load(&config.ca_file)?;
    let responder = Certificate::load(&config.responder_file)?;
    let key = ResponderKey::load(key_path)?;

    info!(
        ca = %config.ca_file.display(),
        responder = %config.responder_file.display(),
        key = %key_path.display(),
        curve = key.curve_name(),
        "Loaded OCSP signing material"
    );

    StandardSigner::new(issuer, responder, key, config.interval)
}

/// Signs responses for certificates issued by one CA.
#[derive(Debug)]
pub struct StandardSigner {
    issuer: Certificate,
    responder: Certificate,
    key: ResponderKey,
    interval: TimeDelta,
}

impl StandardSigner {
    /// Assemble a signer, checking that `key` belongs to `responder` and that
    /// `nextUpdate` stays representable for `interval`.
    pub fn new(
        issuer: Certificate,
        responder: Certificate,
        key: ResponderKey,
        interval: Duration,
    ) -> Result<Self, CryptoError> {
        if key.public_key() != responder.public_key() {
            return Err(CryptoError::KeyMismatch);
        }
        let interval = TimeDelta::from_std(interval)
            .ok()
            .filter(|delta| {
                Utc::now()
                    .checked_add_signed(*delta)
                    .is_some_and(|t| t.year() <= MAX_YEAR)
            })
            .ok_or_else(|| {
                CryptoError::Config(format!("interval of {}s is out of range", interval.as_secs()))
            })?;

        Ok(Self {
            issuer,
            responder,
            key,
            interval,
        })
    }

    /// Sign `request` as of `now`.
    ///
    /// `thisUpdate` is `now` rounded down to the hour and `producedAt` is
    /// `now` rounded down to the minute, so responses signed within the same
    /// minute are byte-identical.
    pub fn sign_at(
        &self,
        request: &SignRequest,
        now: DateTime<Utc>,
    ) -> Result<Vec<u8>, CryptoError> {
        request.certificate.verify_issued_by(&self.issuer)?;

        let this_update = truncate(now, 3600);
        let next_update = if self.interval.is_zero() {
            None
        } else {
            let next = this_update.checked_add_signed(self.interval).ok_or_else(|| {
                CryptoError::InvalidRequest(format!("nextUpdate after {this_update} overflows"))
            })?;
            Some(next)
        };
        let times = ResponseTimes {
            produced_at: truncate(now, 60),
            this_update,
            next_update,
        };

        // A CA answering for itself needs no certificate in the response.
        let embedded = (self.responder != self.issuer).then_some(&self.responder);

        let response = ocsp::build_response(
            request,
            &self.issuer,
            &self.responder,
            embedded,
            &self.key,
            &times,
        )?;

        debug!(
            serial = request.certificate.serial_number(),
            status = %request.status,
            bytes = response.len(),
            "Signed OCSP response"
        );
        Ok(response)
    }
}

impl Signer for StandardSigner {
    fn sign(&self, request: &SignRequest) -> Result<Vec<u8>, CryptoError> {
        self.sign_at(request, Utc::now())
    }
}

fn truncate(time: DateTime<Utc>, step_secs: i64) -> DateTime<Utc> {
    let secs = time.timestamp();
    DateTime::from_timestamp(secs - secs.rem_euclid(step_secs), 0).unwrap_or(time)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use der::{Decode, Encode};
    use p256::ecdsa::signature::Verifier;
    use x509_cert::ext::pkix::crl::CrlReason;

    use super::*;
    use crate::asn1::{self, BasicOcspResponse, OcspResponse, OcspResponseStatus, SingleResponse};
    use crate::ocsp::CertStatus;
    use crate::testing::{self, CaBundle};

    struct Fixture {
        ca: CaBundle,
        signer: StandardSigner,
    }

    fn ca_signed_fixture(interval: Duration) -> Fixture {
        let ca = testing::generate_ca("Signer CA");
        let issuer = Certificate::from_pem(ca.cert_pem.as_bytes()).unwrap();
        let key = ResponderKey::from_pem(&ca.key_pem).unwrap();
        let signer = StandardSigner::new(issuer.clone(), issuer, key, interval).unwrap();
        Fixture { ca, signer }
    }

    fn leaf(ca: &CaBundle, serial: u64) -> Certificate {
        let bundle = testing::issue_leaf(ca, "leaf.example", serial);
        Certificate::from_pem(bundle.cert_pem.as_bytes()).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn secs(time: der::asn1::GeneralizedTime) -> u64 {
        time.to_unix_duration().as_secs()
    }

    /// Decode a successful `OCSPResponse` down to its basic response.
    fn parse_response(bytes: &[u8]) -> BasicOcspResponse {
        let response = OcspResponse::from_der(bytes).unwrap();
        assert_eq!(response.response_status, OcspResponseStatus::Successful);
        let body = response.response_bytes.expect("response bytes present");
        assert_eq!(body.response_type, asn1::ID_PKIX_OCSP_BASIC);
        BasicOcspResponse::from_der(body.response.as_bytes()).unwrap()
    }

    fn single_response(basic: &BasicOcspResponse) -> &SingleResponse {
        assert_eq!(basic.tbs_response_data.responses.len(), 1);
        &basic.tbs_response_data.responses[0]
    }

    fn verify(signer_pem: &str, basic: &BasicOcspResponse) {
        let cert = Certificate::from_pem(signer_pem.as_bytes()).unwrap();
        let vk = p256::ecdsa::VerifyingKey::from_sec1_bytes(cert.public_key()).unwrap();
        let sig = p256::ecdsa::Signature::from_der(basic.signature.raw_bytes()).unwrap();
        let tbs = basic.tbs_response_data.to_der().unwrap();
        vk.verify(&tbs, &sig).expect("response signature verifies");
    }

    #[test]
    fn good_response_is_signed_by_ca() {
        let fx = ca_signed_fixture(DEFAULT_INTERVAL);
        let certificate = leaf(&fx.ca, 100);
        let request = SignRequest::new(certificate.clone(), CertStatus::Good);

        let bytes = fx.signer.sign_at(&request, at(1_700_000_000)).unwrap();
        let basic = parse_response(&bytes);
        assert!(basic.certs.is_none());
        assert_eq!(basic.signature_algorithm.oid, asn1::ECDSA_WITH_SHA256);

        let single = single_response(&basic);
        assert!(matches!(single.cert_status, asn1::CertStatus::Good(_)));
        assert_eq!(single.cert_id.hash_algorithm.oid, asn1::ID_SHA1);
        assert_eq!(
            single.cert_id.serial_number.as_bytes(),
            certificate.raw_serial()
        );

        // thisUpdate rounded to the hour, nextUpdate four days later.
        assert_eq!(secs(single.this_update), 1_699_999_200);
        assert_eq!(secs(single.next_update.unwrap()), 1_699_999_200 + 96 * 3600);
        assert_eq!(secs(basic.tbs_response_data.produced_at), 1_699_999_980);

        verify(&fx.ca.cert_pem, &basic);
    }

    #[test]
    fn revoked_response_carries_time_and_reason() {
        let fx = ca_signed_fixture(DEFAULT_INTERVAL);
        let mut request = SignRequest::new(leaf(&fx.ca, 101), CertStatus::Revoked);
        request.reason = Some(1);
        request.revoked_at = Some(at(1_600_000_000));

        let bytes = fx.signer.sign_at(&request, at(1_700_000_000)).unwrap();
        let basic = parse_response(&bytes);
        let asn1::CertStatus::Revoked(info) = &single_response(&basic).cert_status else {
            panic!("expected a revoked status");
        };
        assert_eq!(secs(info.revocation_time), 1_600_000_000);
        assert_eq!(info.revocation_reason, Some(CrlReason::KeyCompromise));

        verify(&fx.ca.cert_pem, &basic);
    }

    #[test]
    fn unspecified_reason_is_omitted() {
        let fx = ca_signed_fixture(DEFAULT_INTERVAL);
        let mut request = SignRequest::new(leaf(&fx.ca, 102), CertStatus::Revoked);
        request.reason = Some(0);
        request.revoked_at = Some(at(1_600_000_000));

        let bytes = fx.signer.sign_at(&request, at(1_700_000_000)).unwrap();
        let basic = parse_response(&bytes);
        let asn1::CertStatus::Revoked(info) = &single_response(&basic).cert_status else {
            panic!("expected a revoked status");
        };
        assert!(info.revocation_reason.is_none());
    }

    #[test]
    fn reason_is_ignored_unless_status_is_revoked() {
        let fx = ca_signed_fixture(DEFAULT_INTERVAL);
        let mut request = SignRequest::new(leaf(&fx.ca, 103), CertStatus::Good);
        request.reason = Some(1);
        request.revoked_at = Some(at(1_600_000_000));

        let bytes = fx.signer.sign_at(&request, at(1_700_000_000)).unwrap();
        let basic = parse_response(&bytes);
        assert!(matches!(
            single_response(&basic).cert_status,
            asn1::CertStatus::Good(_)
        ));
    }

    #[test]
    fn unknown_status_encoding() {
        let fx = ca_signed_fixture(DEFAULT_INTERVAL);
        let request = SignRequest::new(leaf(&fx.ca, 104), CertStatus::Unknown);

        let bytes = fx.signer.sign_at(&request, at(1_700_000_000)).unwrap();
        let basic = parse_response(&bytes);
        assert!(matches!(
            single_response(&basic).cert_status,
            asn1::CertStatus::Unknown(_)
        ));
    }

    #[test]
    fn revoked_without_time_uses_produced_at() {
        let fx = ca_signed_fixture(DEFAULT_INTERVAL);
        let request = SignRequest::new(leaf(&fx.ca, 105), CertStatus::Revoked);

        let bytes = fx.signer.sign_at(&request, at(1_700_000_000)).unwrap();
        let basic = parse_response(&bytes);
        let asn1::CertStatus::Revoked(info) = &single_response(&basic).cert_status else {
            panic!("expected a revoked status");
        };
        assert_eq!(info.revocation_time, basic.tbs_response_data.produced_at);
        assert_eq!(secs(info.revocation_time), 1_699_999_980);
        assert!(info.revocation_reason.is_none());

        verify(&fx.ca.cert_pem, &basic);
    }

    #[test]
    fn invalid_reason_is_rejected() {
        let fx = ca_signed_fixture(DEFAULT_INTERVAL);
        for code in [7, 11, -1] {
            let mut request = SignRequest::new(leaf(&fx.ca, 106), CertStatus::Revoked);
            request.reason = Some(code);
            request.revoked_at = Some(at(1_600_000_000));
            let err = fx.signer.sign_at(&request, at(1_700_000_000)).unwrap_err();
            assert!(matches!(err, CryptoError::InvalidRequest(_)), "code {code}");
        }
    }

    #[test]
    fn zero_interval_omits_next_update() {
        let fx = ca_signed_fixture(Duration::ZERO);
        let request = SignRequest::new(leaf(&fx.ca, 107), CertStatus::Good);

        let bytes = fx.signer.sign_at(&request, at(1_700_000_000)).unwrap();
        let basic = parse_response(&bytes);
        assert!(single_response(&basic).next_update.is_none());
    }

    #[test]
    fn oversized_interval_is_a_config_error() {
        for days in [100_000_000_u64, 4_000_000] {
            let ca = testing::generate_ca("Interval CA");
            let issuer = Certificate::from_pem(ca.cert_pem.as_bytes()).unwrap();
            let key = ResponderKey::from_pem(&ca.key_pem).unwrap();
            let interval = Duration::from_secs(days * 86_400);

            let err = StandardSigner::new(issuer.clone(), issuer, key, interval).unwrap_err();
            assert!(matches!(err, CryptoError::Config(_)), "{days} days");
        }
    }

    #[test]
    fn next_update_overflow_is_an_error() {
        let fx = ca_signed_fixture(DEFAULT_INTERVAL);
        let request = SignRequest::new(leaf(&fx.ca, 111), CertStatus::Good);

        let err = fx
            .signer
            .sign_at(&request, DateTime::<Utc>::MAX_UTC)
            .unwrap_err();
        assert!(matches!(err, CryptoError::InvalidRequest(_)));
    }

    #[test]
    fn same_minute_gives_identical_bytes() {
        let fx = ca_signed_fixture(DEFAULT_INTERVAL);
        let request = SignRequest::new(leaf(&fx.ca, 108), CertStatus::Good);

        let first = fx.signer.sign_at(&request, at(1_700_000_000)).unwrap();
        let second = fx.signer.sign_at(&request, at(1_700_000_030)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn foreign_certificate_is_rejected() {
        let fx = ca_signed_fixture(DEFAULT_INTERVAL);
        let other = testing::generate_ca("Other CA");
        let request = SignRequest::new(leaf(&other, 109), CertStatus::Good);

        let err = fx.signer.sign_at(&request, at(1_700_000_000)).unwrap_err();
        assert!(matches!(err, CryptoError::IssuerMismatch));
    }

    #[test]
    fn delegated_responder_is_embedded() {
        let ca = testing::generate_ca("Delegating CA");
        let responder = testing::issue_responder(&ca, "OCSP Responder");
        let issuer = Certificate::from_pem(ca.cert_pem.as_bytes()).unwrap();
        let responder_cert = Certificate::from_pem(responder.cert_pem.as_bytes()).unwrap();
        let key = ResponderKey::from_pem(&responder.key_pem).unwrap();
        let signer =
            StandardSigner::new(issuer, responder_cert.clone(), key, DEFAULT_INTERVAL).unwrap();

        let request = SignRequest::new(leaf(&ca, 110), CertStatus::Good);
        let bytes = signer.sign_at(&request, at(1_700_000_000)).unwrap();
        let basic = parse_response(&bytes);

        let certs = basic.certs.as_ref().expect("responder certificate embedded");
        assert_eq!(certs.len(), 1);
        assert_eq!(certs[0].to_der().unwrap(), responder_cert.der());
        verify(&responder.cert_pem, &basic);
    }

    #[test]
    fn mismatched_key_is_rejected() {
        let ca = testing::generate_ca("Mismatch CA");
        let other = testing::generate_ca("Mismatch Other");
        let issuer = Certificate::from_pem(ca.cert_pem.as_bytes()).unwrap();
        let key = ResponderKey::from_pem(&other.key_pem).unwrap();

        let err = StandardSigner::new(issuer.clone(), issuer, key, DEFAULT_INTERVAL).unwrap_err();
        assert!(matches!(err, CryptoError::KeyMismatch));
    }

    #[test]
    fn key_path_falls_back_to_general_key() {
        let mut config = SignerConfig {
            ca_file: PathBuf::from("ca.pem"),
            responder_file: PathBuf::from("responder.pem"),
            responder_key_file: None,
            key_file: Some(PathBuf::from("key.pem")),
            interval: DEFAULT_INTERVAL,
        };
        assert_eq!(config.key_path(), Some(Path::new("key.pem")));

        config.responder_key_file = Some(PathBuf::from("responder-key.pem"));
        assert_eq!(config.key_path(), Some(Path::new("responder-key.pem")));

        config.responder_key_file = None;
        config.key_file = None;
        assert!(config.key_path().is_none());
    }

    #[test]
    fn signer_from_config_loads_files() {
        let ca = testing::generate_ca("File CA");
        let dir = tempfile::tempdir().unwrap();
        let ca_path = dir.path().join("ca.pem");
        let key_path = dir.path().join("ca-key.pem");
        std::fs::write(&ca_path, &ca.cert_pem).unwrap();
        std::fs::write(&key_path, &ca.key_pem).unwrap();

        let config = SignerConfig {
            ca_file: ca_path.clone(),
            responder_file: ca_path,
            responder_key_file: None,
            key_file: Some(key_path),
            interval: DEFAULT_INTERVAL,
        };
        let signer = signer_from_config(&config).unwrap();

        let request = SignRequest::new(leaf(&ca, 112), CertStatus::Good);
        let basic = parse_response(&signer.sign(&request).unwrap());
        assert!(basic.certs.is_none());
        verify(&ca.cert_pem, &basic);
    }

    #[test]
    fn signer_from_config_requires_a_key() {
        let config = SignerConfig {
            ca_file: PathBuf::from("ca.pem"),
            responder_file: PathBuf::from("responder.pem"),
            responder_key_file: None,
            key_file: None,
            interval: DEFAULT_INTERVAL,
        };
        assert!(matches!(
            signer_from_config(&config),
            Err(CryptoError::Config(_))
        ));
    }

    #[test]
    fn signer_from_config_reports_missing_ca() {
        let dir = tempfile::tempdir().unwrap();
        let config = SignerConfig {
            ca_file: dir.path().join("absent-ca.pem"),
            responder_file: dir.path().join("absent-responder.pem"),
            responder_key_file: Some(dir.path().join("absent-key.pem")),
            key_file: None,
            interval: DEFAULT_INTERVAL,
        };
        assert!(matches!(
            signer_from_config(&config),
            Err(CryptoError::Read { .. })
        ));
    }
}
