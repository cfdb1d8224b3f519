//! Response emitter: one standard base64 line per unexpired response.

use std::io::Write;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::info;

use crate::error::JobError;
use crate::store::CertificateStore;

/// Write every response unexpired at `now` to `out`, in store order.
///
/// Each response is padded standard base64 followed by `\n`. Returns the
/// number of lines written.
pub async fn emit_responses<S, W>(store: &S, now: i64, out: &mut W) -> Result<usize, JobError>
where
    S: CertificateStore,
    W: Write,
{
    let records = store.unexpired_ocsp_responses(now).await?;
    for record in &records {
        out.write_all(STANDARD.encode(&record.body).as_bytes())?;
        out.write_all(b"\n")?;
    }
    out.flush()?;

    info!(count = records.len(), "Emitted OCSP responses");
    Ok(records.len())
}
