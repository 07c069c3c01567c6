//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

/// Initialize tracing/logging for the process.
///
/// Filtering follows `RUST_LOG` (default `info`). Set `LEDGER_LOG_JSON=1` for
/// JSON lines instead of the human readable format.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LEDGER_LOG_JSON").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));

    // Logs go to stderr so replay output on stdout stays clean CSV.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().with_target(false).try_init()
    } else {
        builder.try_init()
    };
}
