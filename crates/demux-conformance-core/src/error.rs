//! Error taxonomy for conformance runs
//!
//! Setup errors abort matrix generation. Every other error belongs to exactly
//! one case and fails only that case.

use crate::normalize::MismatchReport;
use crate::packet::PacketViolation;
use crate::session::CaseState;
use std::fmt;
use std::path::PathBuf;

/// Fatal errors raised while building the test matrix
#[derive(Debug, Clone, PartialEq)]
pub enum SetupError {
    /// A corpus directory is missing or cannot be listed
    CorpusUnreadable { path: PathBuf, message: String },
    /// Samples that have no fixture while fixtures are required
    UnpairedSamples(Vec<PathBuf>),
    /// The harness configuration could not be loaded
    InvalidConfig(String),
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupError::CorpusUnreadable { path, message } => {
                write!(f, "Cannot read corpus directory {}: {}", path.display(), message)
            }
            SetupError::UnpairedSamples(paths) => {
                write!(f, "{} sample(s) have no fixture:", paths.len())?;
                for path in paths {
                    write!(f, " {}", path.display())?;
                }
                Ok(())
            }
            SetupError::InvalidConfig(msg) => write!(f, "Invalid harness configuration: {}", msg),
        }
    }
}

impl std::error::Error for SetupError {}

/// Which step of the driver failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverFailure {
    /// Opening a page or browser context
    Launch,
    /// Navigating to the harness page
    Navigation,
    /// Binding the sample to the file input
    Bind,
    /// The demuxer's `load` rejected
    Load,
    /// `getMediaInfo` / `seekMediaPacket` rejected or returned nothing
    Read,
    /// The page returned something that is not a routine envelope
    Protocol,
    /// The runner's per-case deadline expired
    Timeout,
}

impl DriverFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverFailure::Launch => "launch",
            DriverFailure::Navigation => "navigation",
            DriverFailure::Bind => "bind",
            DriverFailure::Load => "load",
            DriverFailure::Read => "read",
            DriverFailure::Protocol => "protocol",
            DriverFailure::Timeout => "timeout",
        }
    }
}

/// A failure while driving the demuxer through a page
#[derive(Debug, Clone, PartialEq)]
pub struct DriverError {
    pub failure: DriverFailure,
    /// Last state the case reached before failing
    pub reached: CaseState,
    pub message: String,
    /// In-page stack trace, when the page reported one
    pub stack: Option<String>,
}

impl DriverError {
    pub fn new(failure: DriverFailure, reached: CaseState, message: impl Into<String>) -> Self {
        Self {
            failure,
            reached,
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: Option<String>) -> Self {
        self.stack = stack;
        self
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed after reaching {}: {}",
            self.failure.as_str(),
            self.reached.as_str(),
            self.message
        )?;
        if let Some(stack) = &self.stack {
            write!(f, "\n{}", stack)?;
        }
        Ok(())
    }
}

impl std::error::Error for DriverError {}

/// Errors reading an expected-result file
#[derive(Debug, Clone, PartialEq)]
pub enum FixtureError {
    Missing(PathBuf),
    Unreadable { path: PathBuf, message: String },
    Malformed { path: PathBuf, message: String },
}

impl fmt::Display for FixtureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixtureError::Missing(path) => write!(f, "Fixture not found: {}", path.display()),
            FixtureError::Unreadable { path, message } => {
                write!(f, "Cannot read fixture {}: {}", path.display(), message)
            }
            FixtureError::Malformed { path, message } => {
                write!(f, "Malformed fixture {}: {}", path.display(), message)
            }
        }
    }
}

impl std::error::Error for FixtureError {}

/// A media info value that does not have the shape normalization expects
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizeError {
    NotAnObject,
    StreamsNotArray,
    StreamNotObject(usize),
    UnsupportedExtradata { stream: usize, found: &'static str },
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizeError::NotAnObject => write!(f, "media info is not an object"),
            NormalizeError::StreamsNotArray => write!(f, "media info has no `streams` array"),
            NormalizeError::StreamNotObject(i) => write!(f, "streams[{}] is not an object", i),
            NormalizeError::UnsupportedExtradata { stream, found } => write!(
                f,
                "streams[{}].extradata is a {}, expected a byte sequence",
                stream, found
            ),
        }
    }
}

impl std::error::Error for NormalizeError {}

/// Why a single case failed
#[derive(Debug, Clone, PartialEq)]
pub enum CaseFailure {
    Driver(DriverError),
    Fixture(FixtureError),
    Shape { side: &'static str, error: NormalizeError },
    Mismatch(MismatchReport),
    Packet(Vec<PacketViolation>),
}

impl fmt::Display for CaseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseFailure::Driver(e) => write!(f, "driver error: {}", e),
            CaseFailure::Fixture(e) => write!(f, "fixture error: {}", e),
            CaseFailure::Shape { side, error } => write!(f, "{} media info: {}", side, error),
            CaseFailure::Mismatch(report) => write!(f, "{}", report),
            CaseFailure::Packet(violations) => {
                write!(f, "packet contract violated:")?;
                for v in violations {
                    write!(f, "\n  - {}", v)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for CaseFailure {}

impl From<DriverError> for CaseFailure {
    fn from(e: DriverError) -> Self {
        CaseFailure::Driver(e)
    }
}

impl From<FixtureError> for CaseFailure {
    fn from(e: FixtureError) -> Self {
        CaseFailure::Fixture(e)
    }
}
