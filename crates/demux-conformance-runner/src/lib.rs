//! # demux-conformance-runner
//!
//! Runs the conformance matrix against a real Chrome and reports each case
//! as a libtest trial, so `--list`, name filters, `--exact` and
//! `--test-threads` all behave as they do under `cargo test`.

pub mod chrome;
pub mod trials;

pub use chrome::{BrowserSettings, ChromeLauncher, ChromePage};
pub use trials::build_trials;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Logs to stderr, filtered by `RUST_LOG` (default `info`)
///
/// Stdout is left to the libtest report.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .try_init();
}
