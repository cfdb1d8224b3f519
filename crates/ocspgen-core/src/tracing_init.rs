//! Shared tracing/logging initialization.
//!
//! stdout carries the emitted OCSP response stream, so every log line goes
//! to stderr.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Build the default filter directive for a log level, e.g.
/// `"ocspgen=info,ocspgen_cli=info,ocspgen_crypto=info"`.
pub fn default_filter(level: &str) -> String {
    ["ocspgen", "ocspgen_cli", "ocspgen_crypto", "ocspgen_core"]
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialise the global tracing subscriber.
///
/// * `default_filter` -- default `RUST_LOG` value when the env-var is not set
///   (see [`default_filter`]).
/// * `log_json` -- when `true`, emit structured JSON log lines instead of the
///   human-readable format.
pub fn init_tracing(default_filter: &str, log_json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
    );
    if log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_covers_all_crates() {
        let filter = default_filter("debug");
        assert!(filter.contains("ocspgen=debug"));
        assert!(filter.contains("ocspgen_cli=debug"));
        assert!(filter.contains("ocspgen_crypto=debug"));
        assert!(filter.contains("ocspgen_core=debug"));
    }
}
