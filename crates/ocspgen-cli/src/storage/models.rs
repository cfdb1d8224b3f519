//! Database models for the certificate store.

use serde::{Deserialize, Serialize};

/// Certificate record from the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CertificateRecord {
    pub serial_number: String,
    pub authority_key_identifier: String,
    pub ca_label: Option<String>,
    pub status: String,
    pub reason: Option<i64>,
    pub expiry: i64,
    pub revoked_at: Option<i64>,
    pub pem: String,
}

impl CertificateRecord {
    /// Whether the stored status is exactly the revoked tag.
    pub fn is_revoked(&self) -> bool {
        self.status == CertificateStatus::Revoked.as_str()
    }
}

/// Signed OCSP response record from the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct OcspRecord {
    pub serial_number: String,
    pub authority_key_identifier: String,
    pub body: Vec<u8>,
    pub expiry: i64,
}

/// Parameters for inserting a certificate.
#[derive(Debug, Clone, Copy)]
pub struct NewCertificate<'a> {
    pub serial_number: &'a str,
    pub authority_key_identifier: &'a str,
    pub ca_label: Option<&'a str>,
    pub expiry: i64,
    pub pem: &'a str,
}

/// Stored certificate status tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateStatus {
    Good,
    Revoked,
}

impl CertificateStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Revoked => "revoked",
        }
    }
}

impl std::fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
