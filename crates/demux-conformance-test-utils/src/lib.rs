//! # demux-conformance-test-utils
//!
//! In-process stand-ins for Chrome and the page-global demuxer, plus
//! throwaway `samples/` + `fixtures/` trees, so cases can be driven
//! end to end without a browser or a dev server.
//!
//! ```rust,no_run
//! use demux_conformance_core::{CaseRunner, Scenario};
//! use demux_conformance_test_utils::fixtures::{clip_media_info, TestCorpus};
//! use demux_conformance_test_utils::mocks::{MockBrowser, MockDemuxer};
//! use demux_conformance_test_utils::case_for;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let corpus = TestCorpus::new()?;
//!     let sample = corpus.add_sample("clip.mp4", b"clip")?;
//!     corpus.add_media_info_fixture("clip.mp4", &clip_media_info())?;
//!
//!     let demuxer = MockDemuxer::new().with_media_info("clip.mp4", clip_media_info());
//!     let runner = CaseRunner::new(MockBrowser::new(demuxer), &corpus.config());
//!
//!     assert!(runner.execute(&case_for(Scenario::MediaInfo, sample)).await.is_passed());
//!     Ok(())
//! }
//! ```

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;

use demux_conformance_core::{CaseFailure, CaseOutcome, SampleFile, Scenario, TestCase};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

/// Builds a single case without going through the matrix
pub fn case_for(scenario: Scenario, sample: impl Into<PathBuf>) -> TestCase {
    TestCase {
        scenario,
        sample: SampleFile::new(sample),
    }
}

/// Unwraps a failed outcome; panics on a pass
pub fn expect_failure(outcome: CaseOutcome) -> CaseFailure {
    match outcome {
        CaseOutcome::Failed(failure) => failure,
        CaseOutcome::Passed => panic!("case passed unexpectedly"),
    }
}

/// Bounds a whole test body, separate from the per-case deadline under test
pub async fn within<T>(limit: Duration, body: impl Future<Output = T>) -> anyhow::Result<T> {
    tokio::time::timeout(limit, body)
        .await
        .map_err(|_| anyhow::anyhow!("test body still running after {:?}", limit))
}
