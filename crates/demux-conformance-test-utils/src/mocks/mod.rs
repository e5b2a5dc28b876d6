//! Stand-ins for Chrome and for the page-global demuxer
//!
//! [`MockBrowser`] opens pages that run the in-page routine against a
//! [`MockDemuxer`], so cases can be driven end to end in-process.

pub mod browser;
pub mod demuxer;

pub use browser::{MockBrowser, MockPage, PageEvent, PageEventKind};
pub use demuxer::{DemuxerCall, DemuxerInstance, MockDemuxer, MockPacket};

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_MOCK_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide id shared by mocks, pages and fake blob URLs
fn next_mock_id() -> u64 {
    NEXT_MOCK_ID.fetch_add(1, Ordering::Relaxed)
}

/// Identity and reset hooks every mock provides
pub trait MockComponent {
    fn mock_id(&self) -> u64;

    /// Forgets recorded calls and counters; canned data is kept
    fn reset(&mut self);
}

/// Call counters kept by a mock
#[derive(Debug, Clone, Default)]
pub struct CallStats {
    pub calls: u64,
    /// Calls the mock failed on purpose
    pub failures: u64,
    /// Sample bytes that went through the mock
    pub bytes: u64,
}

impl CallStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a call and returns its 1-based number
    pub fn record_call(&mut self) -> u64 {
        self.calls += 1;
        self.calls
    }

    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    pub fn add_bytes(&mut self, bytes: u64) {
        self.bytes += bytes;
    }
}

/// Which calls a mock should fail
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FailurePlan {
    #[default]
    Never,
    /// Every call from this 1-based call number on
    FromCall(u64),
    /// Exactly these 1-based call numbers
    OnCalls(Vec<u64>),
}

impl FailurePlan {
    pub fn fails_on(&self, call: u64) -> bool {
        match self {
            FailurePlan::Never => false,
            FailurePlan::FromCall(first) => call >= *first,
            FailurePlan::OnCalls(calls) => calls.contains(&call),
        }
    }
}
