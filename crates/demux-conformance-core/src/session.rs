//! Demuxer session driver
//!
//! One session per case: open an isolated page, navigate to the harness page,
//! bind the sample to the file input, then evaluate the in-page routine that
//! loads the sample and issues a single read. The page is always closed,
//! including when the case fails or its deadline expires.

use crate::corpus::SampleFile;
use crate::error::{DriverError, DriverFailure};
use crate::packet::{Packet, PacketReading};
use crate::routine::{DemuxerOp, InPageRoutine, RoutineEnvelope, RoutineStage};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Progress of one case through the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CaseState {
    Idle,
    PageLoaded,
    FileBound,
    /// `load` resolved inside the page
    Loaded,
    ResultObtained,
}

impl CaseState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseState::Idle => "idle",
            CaseState::PageLoaded => "page-loaded",
            CaseState::FileBound => "file-bound",
            CaseState::Loaded => "loaded",
            CaseState::ResultObtained => "result-obtained",
        }
    }
}

/// Opens isolated pages; one per case
#[async_trait::async_trait]
pub trait PageLauncher: Send + Sync {
    async fn open_page(&self) -> anyhow::Result<Box<dyn PageHandle>>;
}

/// An isolated page (and its browser context)
#[async_trait::async_trait]
pub trait PageHandle: Send {
    async fn navigate(&mut self, url: &str) -> anyhow::Result<()>;

    /// Binds a local file to the file input matched by `selector`
    async fn bind_file(&mut self, selector: &str, path: &Path) -> anyhow::Result<()>;

    /// Evaluates the routine and returns its envelope as raw JSON
    async fn evaluate(&mut self, routine: &InPageRoutine) -> anyhow::Result<Value>;

    /// Tears down the page and its context
    async fn close(&mut self) -> anyhow::Result<()>;
}

#[async_trait::async_trait]
impl<T: PageLauncher + ?Sized> PageLauncher for Arc<T> {
    async fn open_page(&self) -> anyhow::Result<Box<dyn PageHandle>> {
        (**self).open_page().await
    }
}

/// Result of the read operation
#[derive(Debug, Clone, PartialEq)]
pub enum OpOutput {
    MediaInfo(Value),
    Packet(PacketReading),
}

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub page_url: String,
    pub input_selector: String,
}

/// Drives a demuxer through pages opened by `L`
pub struct SessionDriver<L> {
    launcher: L,
    config: DriverConfig,
}

impl<L: PageLauncher> SessionDriver<L> {
    pub fn new(launcher: L, config: DriverConfig) -> Self {
        Self { launcher, config }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Runs one op against `sample` in a fresh page
    ///
    /// `deadline` bounds everything after the page is opened. When it expires
    /// the page is still closed and no partial result is kept.
    pub async fn run(
        &self,
        sample: &SampleFile,
        op: DemuxerOp,
        deadline: Option<Duration>,
    ) -> Result<OpOutput, DriverError> {
        let mut page = self.launcher.open_page().await.map_err(|e| {
            DriverError::new(DriverFailure::Launch, CaseState::Idle, format!("{:#}", e))
        })?;

        let mut reached = CaseState::Idle;
        let outcome = match deadline {
            Some(limit) => {
                let drive = self.drive(page.as_mut(), sample, op, &mut reached);
                let bounded = tokio::time::timeout(limit, drive).await;
                bounded.unwrap_or_else(|_| {
                    Err(DriverError::new(
                        DriverFailure::Timeout,
                        reached,
                        format!("case did not finish within {:?}", limit),
                    ))
                })
            }
            None => self.drive(page.as_mut(), sample, op, &mut reached).await,
        };

        if let Err(e) = page.close().await {
            warn!("Failed to close page for {}: {:#}", sample.name, e);
        }
        outcome
    }

    async fn drive(
        &self,
        page: &mut dyn PageHandle,
        sample: &SampleFile,
        op: DemuxerOp,
        reached: &mut CaseState,
    ) -> Result<OpOutput, DriverError> {
        page.navigate(&self.config.page_url).await.map_err(|e| {
            DriverError::new(DriverFailure::Navigation, *reached, format!("{:#}", e))
        })?;
        *reached = CaseState::PageLoaded;
        debug!("{}: page loaded", sample.name);

        page.bind_file(&self.config.input_selector, &sample.path)
            .await
            .map_err(|e| DriverError::new(DriverFailure::Bind, *reached, format!("{:#}", e)))?;
        *reached = CaseState::FileBound;
        debug!("{}: file bound", sample.name);

        let routine = InPageRoutine::new(self.config.input_selector.clone(), op);
        let raw = page.evaluate(&routine).await.map_err(|e| {
            DriverError::new(DriverFailure::Protocol, *reached, format!("{:#}", e))
        })?;

        let envelope: RoutineEnvelope = serde_json::from_value(raw).map_err(|e| {
            DriverError::new(
                DriverFailure::Protocol,
                *reached,
                format!("page returned an unexpected value: {}", e),
            )
        })?;
        if envelope.ok || envelope.stage == RoutineStage::Read {
            *reached = CaseState::Loaded;
        }

        let output = interpret(envelope, op, *reached)?;
        *reached = CaseState::ResultObtained;
        debug!("{}: result obtained", sample.name);
        Ok(output)
    }
}

fn interpret(
    envelope: RoutineEnvelope,
    op: DemuxerOp,
    reached: CaseState,
) -> Result<OpOutput, DriverError> {
    if !envelope.ok {
        let failure = match envelope.stage {
            RoutineStage::Bind => DriverFailure::Bind,
            RoutineStage::Load => DriverFailure::Load,
            RoutineStage::Read => DriverFailure::Read,
        };
        let message = envelope
            .message
            .unwrap_or_else(|| "in-page routine failed without a message".to_string());
        return Err(DriverError::new(failure, reached, message).with_stack(envelope.stack));
    }

    let value = envelope.value.ok_or_else(|| {
        DriverError::new(DriverFailure::Read, reached, "operation returned no result")
    })?;

    match op {
        DemuxerOp::GetMediaInfo => Ok(OpOutput::MediaInfo(value)),
        DemuxerOp::SeekMediaPacket { .. } => {
            let packet: Packet = serde_json::from_value(value).map_err(|e| {
                DriverError::new(
                    DriverFailure::Protocol,
                    reached,
                    format!("packet could not be decoded: {}", e),
                )
            })?;
            Ok(OpOutput::Packet(PacketReading {
                packet,
                backing_byte_length: envelope.backing_byte_length,
            }))
        }
    }
}
