//! `ocspgen` OCSP Signing Library
//!
//! Turns certificates into signed OCSP responses (RFC 6960).
//!
//! ## Building blocks
//!
//! - **Certificates**: PEM/DER parsing with `x509-parser`, issuer checks
//! - **Keys**: ECDSA P-256 / P-384 responder keys, PKCS#8 or SEC1 PEM
//! - **Responses**: RFC 6960 structures ([`asn1`]) encoded with `der`, with
//!   SHA-1 `CertID`s and a by-key responder ID
//! - **Signer**: [`signer_from_config`] builds an owned [`StandardSigner`]

pub mod asn1;
pub mod certs;
pub mod error;
pub mod key;
pub mod ocsp;
pub mod signer;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use certs::Certificate;
pub use error::CryptoError;
pub use key::ResponderKey;
pub use ocsp::{CertStatus, SignRequest, Signer};
pub use signer::{DEFAULT_INTERVAL, SignerConfig, StandardSigner, signer_from_config};
