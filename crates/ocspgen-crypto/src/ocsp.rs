//! OCSP request/response types and DER response assembly (RFC 6960).

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use der::asn1::{BitString, GeneralizedTime, Null, OctetString};
use der::{Any, Decode, Encode};
use x509_cert::ext::pkix::crl::CrlReason;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::AlgorithmIdentifierOwned;

use crate::asn1;
use crate::certs::Certificate;
use crate::error::CryptoError;
use crate::key::ResponderKey;

/// Certificate status reported in a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CertStatus {
    #[default]
    Good,
    Revoked,
    Unknown,
}

impl CertStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Revoked => "revoked",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CertStatus {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "good" => Ok(Self::Good),
            "revoked" => Ok(Self::Revoked),
            "unknown" => Ok(Self::Unknown),
            other => Err(CryptoError::InvalidStatus(other.to_string())),
        }
    }
}

/// Everything needed to sign one OCSP response.
///
/// `reason` and `revoked_at` only influence the response when `status` is
/// [`CertStatus::Revoked`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignRequest {
    pub certificate: Certificate,
    pub status: CertStatus,
    pub reason: Option<i64>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl SignRequest {
    pub const fn new(certificate: Certificate, status: CertStatus) -> Self {
        Self {
            certificate,
            status,
            reason: None,
            revoked_at: None,
        }
    }
}

/// Something that turns a [`SignRequest`] into DER response bytes.
pub trait Signer {
    fn sign(&self, request: &SignRequest) -> Result<Vec<u8>, CryptoError>;
}

/// Timestamps stamped into one response.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ResponseTimes {
    pub produced_at: DateTime<Utc>,
    pub this_update: DateTime<Utc>,
    pub next_update: Option<DateTime<Utc>>,
}

/// Assemble and sign a complete DER `OCSPResponse`.
///
/// `embedded` is the responder certificate to place in `certs`, when the
/// responder is not the issuer itself.
pub(crate) fn build_response(
    request: &SignRequest,
    issuer: &Certificate,
    responder: &Certificate,
    embedded: Option<&Certificate>,
    key: &ResponderKey,
    times: &ResponseTimes,
) -> Result<Vec<u8>, CryptoError> {
    let single = asn1::SingleResponse {
        cert_id: cert_id(request, issuer)?,
        cert_status: cert_status(request, times)?,
        this_update: generalized_time(times.this_update)?,
        next_update: times.next_update.map(generalized_time).transpose()?,
    };
    let tbs_response_data = asn1::ResponseData {
        responder_id: asn1::ResponderId::ByKey(OctetString::new(responder.key_hash().to_vec())?),
        produced_at: generalized_time(times.produced_at)?,
        responses: vec![single],
    };

    let signature = key.sign(&tbs_response_data.to_der()?);
    let certs = embedded
        .map(|cert| Any::from_der(cert.der()).map(|cert| vec![cert]))
        .transpose()?;
    let basic = asn1::BasicOcspResponse {
        tbs_response_data,
        signature_algorithm: key.algorithm_identifier(),
        signature: BitString::from_bytes(&signature)?,
        certs,
    };

    let response = asn1::OcspResponse {
        response_status: asn1::OcspResponseStatus::Successful,
        response_bytes: Some(asn1::ResponseBytes {
            response_type: asn1::ID_PKIX_OCSP_BASIC,
            response: OctetString::new(basic.to_der()?)?,
        }),
    };
    Ok(response.to_der()?)
}

fn cert_id(request: &SignRequest, issuer: &Certificate) -> Result<asn1::CertId, CryptoError> {
    Ok(asn1::CertId {
        hash_algorithm: AlgorithmIdentifierOwned {
            oid: asn1::ID_SHA1,
            parameters: Some(Any::encode_from(&Null)?),
        },
        issuer_name_hash: OctetString::new(issuer.name_hash().to_vec())?,
        issuer_key_hash: OctetString::new(issuer.key_hash().to_vec())?,
        serial_number: SerialNumber::new(request.certificate.raw_serial())?,
    })
}

/// A revoked status without a stored revocation time is stamped with the
/// response's `producedAt`.
fn cert_status(
    request: &SignRequest,
    times: &ResponseTimes,
) -> Result<asn1::CertStatus, CryptoError> {
    match request.status {
        CertStatus::Good => Ok(asn1::CertStatus::Good(Null)),
        CertStatus::Unknown => Ok(asn1::CertStatus::Unknown(Null)),
        CertStatus::Revoked => Ok(asn1::CertStatus::Revoked(asn1::RevokedInfo {
            revocation_time: generalized_time(request.revoked_at.unwrap_or(times.produced_at))?,
            revocation_reason: crl_reason(request.reason)?,
        })),
    }
}

/// Map a stored reason code. `unspecified` (0) is left out of the response;
/// the unused value 7 and anything outside the `CRLReason` range is an error.
fn crl_reason(reason: Option<i64>) -> Result<Option<CrlReason>, CryptoError> {
    match reason {
        None | Some(0) => Ok(None),
        Some(code) => u32::try_from(code)
            .ok()
            .and_then(|value| CrlReason::try_from(value).ok())
            .map(Some)
            .ok_or_else(|| {
                CryptoError::InvalidRequest(format!("invalid revocation reason code {code}"))
            }),
    }
}

fn generalized_time(time: DateTime<Utc>) -> Result<GeneralizedTime, CryptoError> {
    let secs = u64::try_from(time.timestamp()).map_err(|_| {
        CryptoError::InvalidRequest(format!("{time} is before the Unix epoch"))
    })?;
    Ok(GeneralizedTime::from_unix_duration(Duration::from_secs(secs))?)
}
