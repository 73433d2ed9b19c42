//! Logging and tracing configuration for MFT
//!
//! Diagnostics go to stderr through `tracing`. The per-case activity log
//! (`journal.log`) is a separate artifact written by [`crate::case::journal`];
//! every journal entry is additionally emitted here on the `forensic_audit`
//! target.
//!
//! # Environment Variable Control
//!
//! ```bash
//! RUST_LOG=debug mft                     # All debug logs
//! RUST_LOG=mft_lib::device=trace mft     # Trace external tool invocations
//! RUST_LOG=forensic_audit=info mft       # Only the audit trail
//! ```
//!
//! Without `RUST_LOG`, the `-v` flag count picks the level: none is `warn`,
//! `-v` is `info`, `-vv` is `debug`, more is `trace`.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter directive for a given `-v` count
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "mft=warn,mft_lib=warn",
        1 => "mft=info,mft_lib=info,forensic_audit=info,ai_audit=info",
        2 => "mft=debug,mft_lib=debug,forensic_audit=info,ai_audit=info",
        _ => "trace",
    }
}

/// Initialize the logging/tracing system
///
/// Call this once at application startup (in main.rs)
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact(),
    );

    // Ignore error if already set (tests initialise more than once)
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Check if debug logging is enabled
#[inline]
pub fn is_debug_enabled() -> bool {
    tracing::enabled!(Level::DEBUG)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_levels() {
        assert!(default_directive(0).contains("warn"));
        assert!(default_directive(1).contains("forensic_audit=info"));
        assert!(default_directive(2).contains("mft_lib=debug"));
        assert_eq!(default_directive(9), "trace");
    }

    #[test]
    fn test_init_twice() {
        init(0);
        init(2);
        tracing::info!("Test log message");
    }
}
