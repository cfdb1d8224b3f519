//! Crypto error types.

use std::path::PathBuf;

/// Errors from certificate loading and OCSP signing.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Certificate parse error: {0}")]
    CertificateParse(String),

    #[error("Private key error: {0}")]
    Key(String),

    #[error("Responder key does not match the responder certificate")]
    KeyMismatch,

    #[error("Certificate issuer does not match the configured CA subject")]
    IssuerMismatch,

    #[error("Certificate signature verification failed: {0}")]
    Verification(String),

    #[error("Invalid OCSP status '{0}' (expected good, revoked or unknown)")]
    InvalidStatus(String),

    #[error("Invalid sign request: {0}")]
    InvalidRequest(String),

    #[error("Signer configuration error: {0}")]
    Config(String),

    #[error("DER encoding error: {0}")]
    Encoding(#[from] der::Error),
}
