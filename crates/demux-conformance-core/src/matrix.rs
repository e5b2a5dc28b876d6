//! Test matrix construction and case execution
//!
//! Every general sample yields a media-info, a video-packet and an
//! audio-packet case; every orientation sample yields one orientation case.
//! Cases are independent and one-shot: no retries, no shared demuxer state.

use crate::config::{HarnessConfig, SeekParams};
use crate::corpus::{Corpus, SampleFile};
use crate::error::{CaseFailure, DriverError, DriverFailure, NormalizeError, SetupError};
use crate::fixtures::FixtureLayout;
use crate::normalize::{compare, compare_orientation, normalize, orientation_projection};
use crate::packet::{check_packet, StreamKind};
use crate::routine::DemuxerOp;
use crate::session::{CaseState, DriverConfig, OpOutput, PageLauncher, SessionDriver};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Scenario family a case belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    MediaInfo,
    VideoPacket,
    AudioPacket,
    Orientation,
}

impl Scenario {
    /// Families generated for each general sample
    pub const GENERAL: [Scenario; 3] = [
        Scenario::MediaInfo,
        Scenario::VideoPacket,
        Scenario::AudioPacket,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            Scenario::MediaInfo => "media_info",
            Scenario::VideoPacket => "video_packet",
            Scenario::AudioPacket => "audio_packet",
            Scenario::Orientation => "orientation",
        }
    }

    pub fn needs_fixture(&self) -> bool {
        matches!(self, Scenario::MediaInfo | Scenario::Orientation)
    }

    pub fn op(&self, seek: SeekParams) -> DemuxerOp {
        let seek_on = |kind| DemuxerOp::SeekMediaPacket {
            kind,
            stream_index: seek.stream_index,
            target: seek.target,
        };
        match self {
            Scenario::MediaInfo | Scenario::Orientation => DemuxerOp::GetMediaInfo,
            Scenario::VideoPacket => seek_on(StreamKind::Video),
            Scenario::AudioPacket => seek_on(StreamKind::Audio),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub scenario: Scenario,
    pub sample: SampleFile,
}

impl TestCase {
    /// Reported name, e.g. `media_info::clip.mp4`
    pub fn name(&self) -> String {
        format!("{}::{}", self.scenario.slug(), self.sample.name)
    }
}

/// Expands a corpus into cases, in corpus order
pub fn build_cases(corpus: &Corpus) -> Vec<TestCase> {
    let general = corpus.general.iter().flat_map(|sample| {
        Scenario::GENERAL.into_iter().map(move |scenario| TestCase {
            scenario,
            sample: sample.clone(),
        })
    });
    let orientation = corpus.orientation.iter().map(|sample| TestCase {
        scenario: Scenario::Orientation,
        sample: sample.clone(),
    });
    general.chain(orientation).collect()
}

/// Discovers the corpus and builds the matrix
///
/// With `require_fixtures` set, any sample lacking a fixture aborts the build.
pub fn build_matrix(config: &HarnessConfig) -> Result<Vec<TestCase>, SetupError> {
    let corpus = Corpus::discover(config)?;

    let unpaired = corpus.unpaired(&FixtureLayout::from_config(config));
    if !unpaired.is_empty() {
        if config.require_fixtures {
            error!("{} sample(s) have no fixture", unpaired.len());
            return Err(SetupError::UnpairedSamples(unpaired));
        }
        for path in &unpaired {
            warn!("No fixture for {}; its comparison case will fail", path.display());
        }
    }

    let cases = build_cases(&corpus);
    info!("Built {} case(s)", cases.len());
    Ok(cases)
}

/// Terminal state of a case
#[derive(Debug, Clone, PartialEq)]
pub enum CaseOutcome {
    Passed,
    Failed(CaseFailure),
}

impl CaseOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, CaseOutcome::Passed)
    }

    pub fn into_result(self) -> Result<(), CaseFailure> {
        match self {
            CaseOutcome::Passed => Ok(()),
            CaseOutcome::Failed(failure) => Err(failure),
        }
    }
}

impl From<Result<(), CaseFailure>> for CaseOutcome {
    fn from(result: Result<(), CaseFailure>) -> Self {
        match result {
            Ok(()) => CaseOutcome::Passed,
            Err(failure) => CaseOutcome::Failed(failure),
        }
    }
}

/// Executes cases against a driver and the fixture tree
pub struct CaseRunner<L> {
    driver: SessionDriver<L>,
    fixtures: FixtureLayout,
    seek: SeekParams,
    deadline: Option<Duration>,
}

impl<L: PageLauncher> CaseRunner<L> {
    pub fn new(launcher: L, config: &HarnessConfig) -> Self {
        let driver = SessionDriver::new(
            launcher,
            DriverConfig {
                page_url: config.page_url.clone(),
                input_selector: config.input_selector.clone(),
            },
        );
        Self {
            driver,
            fixtures: FixtureLayout::from_config(config),
            seek: config.seek,
            deadline: config.case_timeout(),
        }
    }

    pub async fn execute(&self, case: &TestCase) -> CaseOutcome {
        let outcome: CaseOutcome = self.evaluate(case).await.into();
        match &outcome {
            CaseOutcome::Passed => debug!("{} passed", case.name()),
            CaseOutcome::Failed(failure) => warn!("{} failed: {}", case.name(), headline(failure)),
        }
        outcome
    }

    async fn evaluate(&self, case: &TestCase) -> Result<(), CaseFailure> {
        let op = case.scenario.op(self.seek);
        let output = self.driver.run(&case.sample, op, self.deadline).await?;

        match (case.scenario, output) {
            (Scenario::MediaInfo, OpOutput::MediaInfo(actual)) => {
                let expected = self.fixtures.load_media_info(&case.sample.name).await?;
                check_media_info(&actual, &expected)
            }
            (Scenario::Orientation, OpOutput::MediaInfo(actual)) => {
                let expected = self.fixtures.load_orientation(&case.sample.name).await?;
                check_orientation(&actual, &expected)
            }
            (Scenario::VideoPacket, OpOutput::Packet(reading)) => {
                check_packet(StreamKind::Video, &reading).map_err(CaseFailure::Packet)
            }
            (Scenario::AudioPacket, OpOutput::Packet(reading)) => {
                check_packet(StreamKind::Audio, &reading).map_err(CaseFailure::Packet)
            }
            (scenario, _) => Err(CaseFailure::Driver(DriverError::new(
                DriverFailure::Protocol,
                CaseState::ResultObtained,
                format!("{} received a result of the wrong kind", scenario),
            ))),
        }
    }
}

/// Full normalized comparison
pub fn check_media_info(actual: &Value, expected: &Value) -> Result<(), CaseFailure> {
    let actual = normalize(actual).map_err(shape_error("actual"))?;
    let expected = normalize(expected).map_err(shape_error("expected"))?;
    compare(&actual, &expected).map_err(CaseFailure::Mismatch)
}

/// Comparison restricted to per-stream `{id, rotation, flip}`
pub fn check_orientation(actual: &Value, expected: &Value) -> Result<(), CaseFailure> {
    let actual = orientation_projection(actual).map_err(shape_error("actual"))?;
    let expected = orientation_projection(expected).map_err(shape_error("expected"))?;
    compare_orientation(&actual, &expected).map_err(CaseFailure::Mismatch)
}

fn shape_error(side: &'static str) -> impl Fn(NormalizeError) -> CaseFailure {
    move |error| CaseFailure::Shape { side, error }
}

fn headline(failure: &CaseFailure) -> String {
    match failure {
        CaseFailure::Mismatch(report) => {
            format!("{} mismatch ({} difference(s))", report.label, report.mismatches.len())
        }
        other => other.to_string().lines().next().unwrap_or_default().to_string(),
    }
}
