//! OCSP responder signing keys.
//!
//! ECDSA keys on P-256 (signed with SHA-256) and P-384 (signed with
//! SHA-384), loaded from PKCS#8 (`PRIVATE KEY`) or SEC1 (`EC PRIVATE KEY`)
//! PEM.

use std::path::Path;

use p256::ecdsa::signature::Signer as _;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::DecodePrivateKey;
use x509_cert::spki::AlgorithmIdentifierOwned;
use zeroize::Zeroize;

use crate::asn1::{ECDSA_WITH_SHA256, ECDSA_WITH_SHA384};
use crate::error::CryptoError;

/// A responder private key.
pub enum ResponderKey {
    P256(p256::ecdsa::SigningKey),
    P384(p384::ecdsa::SigningKey),
}

impl std::fmt::Debug for ResponderKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponderKey")
            .field("curve", &self.curve_name())
            .field("public", &hex::encode(self.public_key()))
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl ResponderKey {
    /// Parse a PEM private key, trying each supported curve and encoding.
    pub fn from_pem(pem: &str) -> Result<Self, CryptoError> {
        if let Ok(secret) = p256::SecretKey::from_pkcs8_pem(pem) {
            return Ok(Self::P256(secret.into()));
        }
        if let Ok(secret) = p384::SecretKey::from_pkcs8_pem(pem) {
            return Ok(Self::P384(secret.into()));
        }
        if let Ok(secret) = p256::SecretKey::from_sec1_pem(pem) {
            return Ok(Self::P256(secret.into()));
        }
        if let Ok(secret) = p384::SecretKey::from_sec1_pem(pem) {
            return Ok(Self::P384(secret.into()));
        }
        Err(CryptoError::Key(
            "unsupported or malformed private key (expected an ECDSA P-256 or P-384 key in PKCS#8 or SEC1 PEM)"
                .to_string(),
        ))
    }

    /// Read and parse a PEM key file. The file buffer is wiped after parsing.
    pub fn load(path: &Path) -> Result<Self, CryptoError> {
        let mut pem = std::fs::read_to_string(path).map_err(|source| CryptoError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let key = Self::from_pem(&pem);
        pem.zeroize();
        key
    }

    pub const fn curve_name(&self) -> &'static str {
        match self {
            Self::P256(_) => "P-256",
            Self::P384(_) => "P-384",
        }
    }

    /// Uncompressed SEC1 public point, comparable with a certificate's
    /// subject public key.
    pub fn public_key(&self) -> Vec<u8> {
        match self {
            Self::P256(key) => p256::PublicKey::from(key.verifying_key())
                .to_encoded_point(false)
                .as_bytes()
                .to_vec(),
            Self::P384(key) => p384::PublicKey::from(key.verifying_key())
                .to_encoded_point(false)
                .as_bytes()
                .to_vec(),
        }
    }

    /// `AlgorithmIdentifier` of the signatures this key produces. ECDSA
    /// identifiers carry no parameters.
    pub fn algorithm_identifier(&self) -> AlgorithmIdentifierOwned {
        let oid = match self {
            Self::P256(_) => ECDSA_WITH_SHA256,
            Self::P384(_) => ECDSA_WITH_SHA384,
        };
        AlgorithmIdentifierOwned {
            oid,
            parameters: None,
        }
    }

    /// Sign `message`, returning a DER `ECDSA-Sig-Value`.
    ///
    /// Nonces are derived per RFC 6979, so identical input yields identical
    /// output.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        match self {
            Self::P256(key) => {
                let sig: p256::ecdsa::Signature = key.sign(message);
                sig.to_der().as_bytes().to_vec()
            }
            Self::P384(key) => {
                let sig: p384::ecdsa::Signature = key.sign(message);
                sig.to_der().as_bytes().to_vec()
            }
        }
    }
}
