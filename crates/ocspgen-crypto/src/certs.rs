//! X.509 certificate parsing.
//!
//! Certificates are parsed once with `x509-parser` and the handful of
//! fields OCSP needs are copied out, so a [`Certificate`] owns its data
//! and can travel inside a sign request without borrowing the PEM buffer.

use std::path::Path;

use sha1::{Digest, Sha1};
use x509_parser::certificate::X509Certificate;

use crate::error::CryptoError;

/// A parsed certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
    serial: String,
    raw_serial: Vec<u8>,
    raw_issuer: Vec<u8>,
    raw_subject: Vec<u8>,
    public_key: Vec<u8>,
}

impl Certificate {
    /// Parse a single PEM-encoded certificate.
    ///
    /// The input must hold exactly one `CERTIFICATE` block; anything but
    /// whitespace after it is rejected.
    pub fn from_pem(pem: &[u8]) -> Result<Self, CryptoError> {
        let (rest, block) = x509_parser::pem::parse_x509_pem(pem)
            .map_err(|e| CryptoError::CertificateParse(format!("invalid PEM: {e}")))?;
        if block.label != "CERTIFICATE" {
            return Err(CryptoError::CertificateParse(format!(
                "expected a CERTIFICATE PEM block, found '{}'",
                block.label
            )));
        }
        if !rest.iter().all(u8::is_ascii_whitespace) {
            return Err(CryptoError::CertificateParse(
                "the PEM input should contain only one certificate".to_string(),
            ));
        }
        Self::from_der(block.contents)
    }

    /// Parse a DER-encoded certificate.
    pub fn from_der(der: Vec<u8>) -> Result<Self, CryptoError> {
        let (serial, raw_serial, raw_issuer, raw_subject, public_key) = {
            let cert = parse(&der)?;
            (
                cert.tbs_certificate.serial.to_string(),
                cert.tbs_certificate.raw_serial().to_vec(),
                cert.issuer().as_raw().to_vec(),
                cert.subject().as_raw().to_vec(),
                cert.public_key().subject_public_key.data.to_vec(),
            )
        };

        Ok(Self {
            der,
            serial,
            raw_serial,
            raw_issuer,
            raw_subject,
            public_key,
        })
    }

    /// Read and parse a PEM certificate file.
    pub fn load(path: &Path) -> Result<Self, CryptoError> {
        let pem = std::fs::read(path).map_err(|source| CryptoError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_pem(&pem)
    }

    /// Full DER encoding.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Serial number in decimal, the form the certificate store keys on.
    pub fn serial_number(&self) -> &str {
        &self.serial
    }

    /// Content octets of the serial INTEGER exactly as encoded.
    pub fn raw_serial(&self) -> &[u8] {
        &self.raw_serial
    }

    /// DER of the subject Name.
    pub fn raw_subject(&self) -> &[u8] {
        &self.raw_subject
    }

    /// The subject public key (BIT STRING payload of the SPKI).
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// SHA-1 of the subject public key, as used by OCSP `byKey` responder
    /// IDs and `CertID.issuerKeyHash`.
    pub fn key_hash(&self) -> [u8; 20] {
        Sha1::digest(&self.public_key).into()
    }

    /// SHA-1 of the subject Name, as used by `CertID.issuerNameHash`.
    pub fn name_hash(&self) -> [u8; 20] {
        Sha1::digest(&self.raw_subject).into()
    }

    /// Check that `self` names `issuer` as its issuer and carries a valid
    /// signature from the issuer's key.
    pub fn verify_issued_by(&self, issuer: &Self) -> Result<(), CryptoError> {
        if self.raw_issuer != issuer.raw_subject {
            return Err(CryptoError::IssuerMismatch);
        }
        let cert = parse(&self.der)?;
        let issuer_cert = parse(&issuer.der)?;
        cert.verify_signature(Some(issuer_cert.public_key()))
            .map_err(|e| CryptoError::Verification(e.to_string()))
    }
}

fn parse(der: &[u8]) -> Result<X509Certificate<'_>, CryptoError> {
    let (rest, cert) = x509_parser::parse_x509_certificate(der)
        .map_err(|e| CryptoError::CertificateParse(e.to_string()))?;
    if !rest.is_empty() {
        return Err(CryptoError::CertificateParse(
            "trailing data after certificate".to_string(),
        ));
    }
    Ok(cert)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn parses_leaf_fields() {
        let ca = testing::generate_ca("Parse Test CA");
        let leaf = testing::issue_leaf(&ca, "leaf.example", 4242);

        let cert = Certificate::from_pem(leaf.cert_pem.as_bytes()).unwrap();
        assert_eq!(cert.serial_number(), "4242");
        assert!(cert.raw_serial().ends_with(&[0x10, 0x92]));
        assert_eq!(cert.public_key().len(), 65);
        assert_eq!(cert.public_key()[0], 0x04);

        let ca_cert = Certificate::from_pem(ca.cert_pem.as_bytes()).unwrap();
        assert_eq!(cert.raw_issuer, ca_cert.raw_subject);
    }

    #[test]
    fn public_key_is_the_spki_bit_string() {
        let ca = testing::generate_ca("Key Bits CA");
        let cert = Certificate::from_pem(ca.cert_pem.as_bytes()).unwrap();
        let key = crate::ResponderKey::from_pem(&ca.key_pem).unwrap();
        assert_eq!(cert.public_key(), key.public_key().as_slice());
    }

    #[test]
    fn verifies_issuer_signature() {
        let ca = testing::generate_ca("Verify CA");
        let leaf = testing::issue_leaf(&ca, "leaf.example", 7);

        let ca_cert = Certificate::from_pem(ca.cert_pem.as_bytes()).unwrap();
        let cert = Certificate::from_pem(leaf.cert_pem.as_bytes()).unwrap();
        assert!(cert.verify_issued_by(&ca_cert).is_ok());
    }

    #[test]
    fn foreign_issuer_is_rejected() {
        let ca = testing::generate_ca("Real CA");
        let other = testing::generate_ca("Other CA");
        let leaf = testing::issue_leaf(&ca, "leaf.example", 8);

        let other_cert = Certificate::from_pem(other.cert_pem.as_bytes()).unwrap();
        let cert = Certificate::from_pem(leaf.cert_pem.as_bytes()).unwrap();
        assert!(matches!(
            cert.verify_issued_by(&other_cert),
            Err(CryptoError::IssuerMismatch)
        ));
    }

    #[test]
    fn same_name_different_key_fails_verification() {
        let ca = testing::generate_ca("Twin CA");
        let twin = testing::generate_ca("Twin CA");
        let leaf = testing::issue_leaf(&ca, "leaf.example", 9);

        let twin_cert = Certificate::from_pem(twin.cert_pem.as_bytes()).unwrap();
        let cert = Certificate::from_pem(leaf.cert_pem.as_bytes()).unwrap();
        assert!(matches!(
            cert.verify_issued_by(&twin_cert),
            Err(CryptoError::Verification(_))
        ));
    }

    #[test]
    fn rejects_garbage_pem() {
        let err = Certificate::from_pem(b"not a certificate").unwrap_err();
        assert!(matches!(err, CryptoError::CertificateParse(_)));
    }

    #[test]
    fn rejects_non_certificate_block() {
        let ca = testing::generate_ca("Key Block CA");
        let err = Certificate::from_pem(ca.key_pem.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("expected a CERTIFICATE"));
    }

    #[test]
    fn rejects_multiple_certificates() {
        let ca = testing::generate_ca("Bundle CA");
        let leaf = testing::issue_leaf(&ca, "leaf.example", 10);
        let bundle = format!("{}{}", leaf.cert_pem, ca.cert_pem);
        let err = Certificate::from_pem(bundle.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("only one certificate"));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Certificate::load(&dir.path().join("absent.pem")).unwrap_err();
        assert!(matches!(err, CryptoError::Read { .. }));
    }
}
