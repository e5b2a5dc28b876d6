//! # demux-conformance-core
//!
//! Conformance checks for a media demuxer that lives inside a browser page.
//!
//! The demuxer itself is a black box reachable through `window.demuxer`
//! (`load`, `getMediaInfo`, `seekMediaPacket`). This crate builds the test
//! matrix from a sample corpus, drives each case through an isolated page,
//! and compares what comes back against recorded fixtures.
//!
//! ## Pieces
//!
//! - [`corpus`]: one-level scan of the sample directories
//! - [`fixtures`]: name-based pairing of samples with expected JSON
//! - [`session`]: page lifecycle per case, behind [`PageLauncher`]/[`PageHandle`]
//! - [`normalize`]: volatile-field stripping, byte materialization, structural diff
//! - [`packet`]: the contract a retrieved packet must satisfy
//! - [`matrix`]: scenario families and case execution

pub mod config;
pub mod corpus;
pub mod error;
pub mod fixtures;
pub mod matrix;
pub mod normalize;
pub mod packet;
pub mod routine;
pub mod session;

pub use config::{HarnessConfig, SeekParams};
pub use corpus::{scan_dir, Corpus, SampleFile};
pub use error::{CaseFailure, DriverError, DriverFailure, FixtureError, NormalizeError, SetupError};
pub use fixtures::{fixture_file_name, FixtureLayout};
pub use matrix::{build_cases, build_matrix, CaseOutcome, CaseRunner, Scenario, TestCase};
pub use normalize::{
    compare, compare_orientation, normalize, orientation_projection, MismatchReport,
    NormalizedMediaInfo,
};
pub use packet::{check_packet, Packet, PacketReading, PacketViolation, StreamKind};
pub use routine::{DemuxerOp, InPageRoutine, RoutineEnvelope, RoutineStage};
pub use session::{CaseState, DriverConfig, OpOutput, PageHandle, PageLauncher, SessionDriver};
