//! `ocspgen`
//!
//! Signs an OCSP response for every unexpired certificate in the store and
//! prints every unexpired response as one base64 line on stdout.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use ocspgen_cli::job::{self, JobOptions};
use ocspgen_cli::{FailurePolicy, JobError};
use ocspgen_crypto::{CertStatus, SignerConfig};

#[derive(Parser, Debug)]
#[command(name = "ocspgen")]
#[command(version, about = "Generate OCSP responses for all unexpired certificates")]
struct Args {
    /// CA certificate (PEM) that issued the stored certificates
    #[arg(long, env = "OCSPGEN_CA")]
    ca: PathBuf,

    /// OCSP responder certificate (PEM); may be the CA itself
    #[arg(long, env = "OCSPGEN_RESPONDER")]
    responder: PathBuf,

    /// Responder private key (PEM)
    #[arg(long, env = "OCSPGEN_RESPONDER_KEY")]
    responder_key: Option<PathBuf>,

    /// Fallback private key, used when --responder-key is not set
    #[arg(long, env = "OCSPGEN_KEY")]
    key: Option<PathBuf>,

    /// Certificate store locator (JSON with driver and data_source)
    #[arg(long, env = "OCSPGEN_DB_CONFIG")]
    db_config: Option<PathBuf>,

    /// Status asserted in every generated response
    #[arg(
        long,
        default_value = "good",
        env = "OCSPGEN_STATUS",
        value_parser = ["good", "revoked", "unknown"]
    )]
    status: String,

    /// Interval between thisUpdate and nextUpdate (e.g. "96h", "1d12h", "0s")
    #[arg(long, default_value = "96h", env = "OCSPGEN_INTERVAL", value_parser = parse_interval)]
    interval: Duration,

    /// What to do when a single certificate cannot be signed
    #[arg(
        long,
        default_value = "fail-fast",
        env = "OCSPGEN_ON_ERROR",
        value_parser = ["fail-fast", "continue"]
    )]
    on_error: String,

    /// Log level filter (e.g. "info", "debug", "warn").
    #[arg(long, default_value = "info", env = "OCSPGEN_LOG_LEVEL")]
    log_level: String,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, env = "OCSPGEN_LOG_JSON")]
    log_json: bool,
}

/// Parse a duration made of `<integer><unit>` parts, units `s`, `m`, `h`, `d`.
fn parse_interval(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("empty interval".to_string());
    }

    let mut total: u64 = 0;
    let mut digits = String::new();
    for c in input.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let unit = match c {
            's' => 1,
            'm' => 60,
            'h' => 60 * 60,
            'd' => 24 * 60 * 60,
            other => return Err(format!("unknown unit '{other}' in interval '{input}'")),
        };
        let value: u64 = digits
            .parse()
            .map_err(|_| format!("missing number before '{c}' in interval '{input}'"))?;
        digits.clear();
        total = value
            .checked_mul(unit)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(|| format!("interval '{input}' is too large"))?;
    }
    if !digits.is_empty() {
        return Err(format!("missing unit after '{digits}' in interval '{input}'"));
    }
    Ok(Duration::from_secs(total))
}

impl Args {
    fn job_options(self) -> Result<JobOptions, JobError> {
        let status: CertStatus = self
            .status
            .parse()
            .map_err(|e: ocspgen_crypto::CryptoError| JobError::Config(e.to_string()))?;
        let policy: FailurePolicy = self.on_error.parse()?;

        Ok(JobOptions {
            signer: SignerConfig {
                ca_file: self.ca,
                responder_file: self.responder,
                responder_key_file: self.responder_key,
                key_file: self.key,
                interval: self.interval,
            },
            db_config: self.db_config,
            status,
            policy,
        })
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    ocspgen_core::tracing_init::init_tracing(
        &ocspgen_core::tracing_init::default_filter(&args.log_level),
        args.log_json,
    );

    info!(
        version = env!("CARGO_PKG_VERSION"),
        status = %args.status,
        interval_secs = args.interval.as_secs(),
        "Starting ocspgen"
    );

    let options = args.job_options()?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match job::run(&options, &mut out).await {
        Ok(summary) => {
            info!(
                signed = summary.signed,
                emitted = summary.emitted,
                "ocspgen finished"
            );
            Ok(())
        }
        Err(e) => {
            error!(kind = %e.kind(), error = %e, "ocspgen failed");
            Err(e.into())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn interval_units() {
        assert_eq!(parse_interval("96h").unwrap(), Duration::from_secs(96 * 3600));
        assert_eq!(parse_interval("90s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_interval("15m").unwrap(), Duration::from_secs(900));
        assert_eq!(parse_interval("4d").unwrap(), Duration::from_secs(4 * 86400));
        assert_eq!(parse_interval("0s").unwrap(), Duration::ZERO);
    }

    #[test]
    fn interval_compound() {
        assert_eq!(
            parse_interval("1d12h30m").unwrap(),
            Duration::from_secs(86400 + 12 * 3600 + 1800)
        );
    }

    #[test]
    fn interval_rejects_malformed() {
        assert!(parse_interval("").is_err());
        assert!(parse_interval("96").is_err());
        assert!(parse_interval("h").is_err());
        assert!(parse_interval("3w").is_err());
        assert!(parse_interval("-1h").is_err());
    }

    #[test]
    fn default_args_build_options() {
        let args = Args::try_parse_from([
            "ocspgen",
            "--ca",
            "ca.pem",
            "--responder",
            "ca.pem",
            "--key",
            "ca-key.pem",
        ])
        .unwrap();
        let options = args.job_options().unwrap();
        assert_eq!(options.status, CertStatus::Good);
        assert_eq!(options.policy, FailurePolicy::FailFast);
        assert_eq!(options.signer.interval, ocspgen_crypto::DEFAULT_INTERVAL);
        assert!(options.db_config.is_none());
    }

    #[test]
    fn status_flag_is_validated() {
        let result = Args::try_parse_from([
            "ocspgen",
            "--ca",
            "ca.pem",
            "--responder",
            "ca.pem",
            "--status",
            "expired",
        ]);
        assert!(result.is_err());
    }
}
