//! One end-to-end `ocspgen` run.
//!
//! Order matters: the signer is built before the store is touched, so a
//! bad key or certificate fails without opening the database. Signing
//! always completes (or aborts) before the first line is emitted.

use std::io::Write;
use std::path::PathBuf;

use chrono::Utc;
use ocspgen_core::config::load_db_config;
use ocspgen_crypto::{CertStatus, Signer, SignerConfig, signer_from_config};
use tracing::info;

use crate::batch::{BatchProcessor, FailurePolicy};
use crate::emit::emit_responses;
use crate::error::JobError;
use crate::storage::CertDatabase;
use crate::store::CertificateStore;

/// Everything a run needs, already resolved from flags and environment.
#[derive(Debug, Clone)]
pub struct JobOptions {
    pub signer: SignerConfig,
    /// Path to the certificate store locator (JSON).
    pub db_config: Option<PathBuf>,
    /// Status asserted in every response.
    pub status: CertStatus,
    pub policy: FailurePolicy,
}

/// Counts from a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSummary {
    pub signed: usize,
    pub emitted: usize,
}

/// Build the signer, open the store, sign, then emit to `out`.
pub async fn run<W: Write>(options: &JobOptions, out: &mut W) -> Result<JobSummary, JobError> {
    let signer = signer_from_config(&options.signer).map_err(JobError::Signer)?;

    let db_config_path = options.db_config.as_deref().ok_or_else(|| {
        JobError::Config("no certificate store configured (set --db-config)".to_string())
    })?;
    let db_config = load_db_config(db_config_path)?;
    info!(
        driver = %db_config.driver,
        data_source = %db_config.data_source.display(),
        "Opening certificate store"
    );
    let db = CertDatabase::open(&db_config.data_source).await?;

    sign_and_emit(&db, &signer, options.status, options.policy, out).await
}

/// Sign every unexpired certificate in `store`, then emit every unexpired
/// response.
///
/// Under [`FailurePolicy::Continue`] the emission still happens and the
/// skipped certificates are then reported as [`JobError::Incomplete`].
pub async fn sign_and_emit<S, G, W>(
    store: &S,
    signer: &G,
    status: CertStatus,
    policy: FailurePolicy,
    out: &mut W,
) -> Result<JobSummary, JobError>
where
    S: CertificateStore,
    G: Signer,
    W: Write,
{
    let report = BatchProcessor::new(store, signer, status)
        .with_policy(policy)
        .run()
        .await?;

    let emitted = emit_responses(store, Utc::now().timestamp(), out).await?;

    if !report.is_complete() {
        return Err(JobError::Incomplete {
            failed: report.failures.len(),
            total: report.total,
        });
    }
    Ok(JobSummary {
        signed: report.signed,
        emitted,
    })
}
