//! Job error types.
//!
//! Failures are returned, never logged here; the binary decides how to
//! report them.

use ocspgen_core::db::DatabaseError;
use ocspgen_crypto::CryptoError;

/// Coarse classification of a [`JobError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Signer,
    Store,
    Parse,
    Sign,
    Output,
    Incomplete,
}

impl ErrorKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Signer => "signer",
            Self::Store => "store",
            Self::Parse => "parse",
            Self::Sign => "sign",
            Self::Output => "output",
            Self::Incomplete => "incomplete",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors that end an `ocspgen` run.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unable to create OCSP signer: {0}")]
    Signer(#[source] CryptoError),

    #[error("Certificate store error: {0}")]
    Store(#[from] DatabaseError),

    #[error("Unable to parse certificate {serial}: {source}")]
    Parse {
        serial: String,
        #[source]
        source: CryptoError,
    },

    #[error("Unable to sign OCSP response for {serial}: {source}")]
    Sign {
        serial: String,
        #[source]
        source: CryptoError,
    },

    #[error("Failed to write OCSP responses: {0}")]
    Output(#[from] std::io::Error),

    #[error("{failed} of {total} certificates could not be signed")]
    Incomplete { failed: usize, total: usize },
}

impl JobError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Signer(_) => ErrorKind::Signer,
            Self::Store(_) => ErrorKind::Store,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::Sign { .. } => ErrorKind::Sign,
            Self::Output(_) => ErrorKind::Output,
            Self::Incomplete { .. } => ErrorKind::Incomplete,
        }
    }
}

impl From<ocspgen_core::Error> for JobError {
    fn from(e: ocspgen_core::Error) -> Self {
        Self::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_match_variants() {
        assert_eq!(JobError::Config("x".into()).kind(), ErrorKind::Config);
        assert_eq!(
            JobError::Store(DatabaseError::Query("boom".into())).kind(),
            ErrorKind::Store
        );
        assert_eq!(
            JobError::Incomplete { failed: 1, total: 2 }.kind(),
            ErrorKind::Incomplete
        );
    }

    #[test]
    fn messages_name_the_serial() {
        let err = JobError::Parse {
            serial: "42".into(),
            source: CryptoError::CertificateParse("bad PEM".into()),
        };
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(err.to_string().contains("42"));
        assert!(err.to_string().contains("bad PEM"));
    }

    #[test]
    fn core_config_errors_map_to_config() {
        let err: JobError = ocspgen_core::Error::Config("no driver".into()).into();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
