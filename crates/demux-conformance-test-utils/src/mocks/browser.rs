//! Mock browser and page
//!
//! [`MockPage`] plays the in-page routine against a [`DemuxerInstance`] and
//! answers with the same envelope the real page would produce, so the session
//! driver cannot tell it apart from Chrome.

use crate::mocks::demuxer::{DemuxerInstance, MockDemuxer};
use crate::mocks::{next_mock_id, CallStats, FailurePlan, MockComponent};
use anyhow::{anyhow, bail};
use demux_conformance_core::config::DEFAULT_INPUT_SELECTOR;
use demux_conformance_core::{
    DemuxerOp, InPageRoutine, PageHandle, PageLauncher, RoutineEnvelope, RoutineStage,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Something that happened to a mock page
#[derive(Debug, Clone, PartialEq)]
pub enum PageEventKind {
    Opened,
    Navigated(String),
    /// File name bound to the input
    FileBound(String),
    /// `load` resolved for the named file
    Loaded(String),
    /// The single read operation was issued
    Read(DemuxerOp),
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageEvent {
    pub page: u64,
    pub kind: PageEventKind,
}

#[derive(Debug)]
struct BrowserState {
    events: Mutex<Vec<PageEvent>>,
    open_pages: AtomicUsize,
    pages_opened: AtomicUsize,
    stats: Mutex<CallStats>,
}

/// Page launcher backed by a [`MockDemuxer`]
///
/// Clones share the event log and counters, so a test can keep one handle
/// while the runner owns another.
#[derive(Debug, Clone)]
pub struct MockBrowser {
    id: u64,
    demuxer: MockDemuxer,
    input_selector: String,
    navigation_error: Option<String>,
    binding_present: bool,
    launch_errors: FailurePlan,
    state: Arc<BrowserState>,
}

impl MockBrowser {
    pub fn new(demuxer: MockDemuxer) -> Self {
        Self {
            id: next_mock_id(),
            demuxer,
            input_selector: DEFAULT_INPUT_SELECTOR.to_string(),
            navigation_error: None,
            binding_present: true,
            launch_errors: FailurePlan::Never,
            state: Arc::new(BrowserState {
                events: Mutex::new(Vec::new()),
                open_pages: AtomicUsize::new(0),
                pages_opened: AtomicUsize::new(0),
                stats: Mutex::new(CallStats::new()),
            }),
        }
    }

    /// Every navigation fails with `message`
    pub fn with_navigation_error(mut self, message: impl Into<String>) -> Self {
        self.navigation_error = Some(message.into());
        self
    }

    /// Selector of the one file input the mock page exposes
    pub fn with_input_selector(mut self, selector: impl Into<String>) -> Self {
        self.input_selector = selector.into();
        self
    }

    /// Pages load without `window.demuxer`
    pub fn without_binding(mut self) -> Self {
        self.binding_present = false;
        self
    }

    /// Fails `open_page` on the configured call numbers
    pub fn with_launch_errors(mut self, plan: FailurePlan) -> Self {
        self.launch_errors = plan;
        self
    }

    pub fn demuxer(&self) -> &MockDemuxer {
        &self.demuxer
    }

    /// Pages opened and not yet closed
    pub fn open_pages(&self) -> usize {
        self.state.open_pages.load(Ordering::SeqCst)
    }

    pub fn pages_opened(&self) -> usize {
        self.state.pages_opened.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<PageEvent> {
        self.state.events.lock().unwrap().clone()
    }

    /// Events of one page, in order
    pub fn events_for(&self, page: u64) -> Vec<PageEventKind> {
        self.events()
            .into_iter()
            .filter(|event| event.page == page)
            .map(|event| event.kind)
            .collect()
    }

    /// Ids of every page opened so far, in opening order
    pub fn page_ids(&self) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter(|event| event.kind == PageEventKind::Opened)
            .map(|event| event.page)
            .collect()
    }

    pub fn stats(&self) -> CallStats {
        self.state.stats.lock().unwrap().clone()
    }
}

fn record(state: &BrowserState, page: u64, kind: PageEventKind) {
    state.events.lock().unwrap().push(PageEvent { page, kind });
}

#[async_trait::async_trait]
impl PageLauncher for MockBrowser {
    async fn open_page(&self) -> anyhow::Result<Box<dyn PageHandle>> {
        let call = self.state.stats.lock().unwrap().record_call();
        if self.launch_errors.fails_on(call) {
            self.state.stats.lock().unwrap().record_failure();
            bail!("simulated browser launch failure on call {}", call);
        }

        let page = MockPage {
            id: next_mock_id(),
            browser: self.clone(),
            demuxer: self.demuxer.instance(),
            navigated: false,
            bound: None,
            closed: false,
        };
        self.state.open_pages.fetch_add(1, Ordering::SeqCst);
        self.state.pages_opened.fetch_add(1, Ordering::SeqCst);
        record(&self.state, page.id, PageEventKind::Opened);
        debug!("Mock browser {} opened page {}", self.id, page.id);
        Ok(Box::new(page))
    }
}

impl MockComponent for MockBrowser {
    fn mock_id(&self) -> u64 {
        self.id
    }

    fn reset(&mut self) {
        self.state.events.lock().unwrap().clear();
        self.state.pages_opened.store(0, Ordering::SeqCst);
        *self.state.stats.lock().unwrap() = CallStats::new();
    }
}

/// One isolated page with its own demuxer instance
#[derive(Debug)]
pub struct MockPage {
    id: u64,
    browser: MockBrowser,
    demuxer: DemuxerInstance,
    navigated: bool,
    bound: Option<PathBuf>,
    closed: bool,
}

impl MockPage {
    pub fn id(&self) -> u64 {
        self.id
    }

    fn record(&self, kind: PageEventKind) {
        record(&self.browser.state, self.id, kind);
    }

    fn rejected(stage: RoutineStage, message: String, frame: &str) -> Value {
        let mut envelope = RoutineEnvelope::failure(stage, message.as_str());
        envelope.stack = Some(format!(
            "Error: {}\n    at {} (mock-demuxer.js:1:1)",
            message, frame
        ));
        envelope.to_value()
    }

    async fn run_routine(&mut self, routine: &InPageRoutine) -> anyhow::Result<Value> {
        let bound = match (&self.bound, routine.input_selector == self.browser.input_selector) {
            (Some(path), true) => path.clone(),
            _ => {
                let envelope = RoutineEnvelope::failure(
                    RoutineStage::Bind,
                    format!("no file bound to {}", routine.input_selector),
                );
                return Ok(envelope.to_value());
            }
        };
        if !self.browser.binding_present {
            let envelope =
                RoutineEnvelope::failure(RoutineStage::Load, "window.demuxer is not defined");
            return Ok(envelope.to_value());
        }

        let name = file_name(&bound);
        let bytes = tokio::fs::read(&bound)
            .await
            .map_err(|e| anyhow!("bound file {} became unreadable: {}", bound.display(), e))?;
        self.browser.state.stats.lock().unwrap().add_bytes(bytes.len() as u64);

        if let Err(message) = self.demuxer.load(&name, &bytes).await {
            return Ok(Self::rejected(RoutineStage::Load, message, "Demuxer.load"));
        }
        self.record(PageEventKind::Loaded(name));

        self.record(PageEventKind::Read(routine.op));
        let read = match routine.op {
            DemuxerOp::GetMediaInfo => self.demuxer.get_media_info().await.map(|info| (info, None)),
            DemuxerOp::SeekMediaPacket {
                kind,
                stream_index,
                target,
            } => self
                .demuxer
                .seek_media_packet(kind, stream_index, target)
                .await
                .map(|(packet, backing)| (packet, Some(backing))),
        };
        match read {
            Ok((value, backing)) => Ok(RoutineEnvelope::success(value, backing).to_value()),
            Err(message) => Ok(Self::rejected(RoutineStage::Read, message, "Demuxer.read")),
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[async_trait::async_trait]
impl PageHandle for MockPage {
    async fn navigate(&mut self, url: &str) -> anyhow::Result<()> {
        if let Some(message) = &self.browser.navigation_error {
            bail!("navigation to {} failed: {}", url, message);
        }
        self.navigated = true;
        self.record(PageEventKind::Navigated(url.to_string()));
        Ok(())
    }

    async fn bind_file(&mut self, selector: &str, path: &Path) -> anyhow::Result<()> {
        if !self.navigated {
            bail!("page has no document to bind into");
        }
        if selector != self.browser.input_selector {
            bail!("no element matches selector {}", selector);
        }
        tokio::fs::metadata(path)
            .await
            .map_err(|e| anyhow!("cannot bind {}: {}", path.display(), e))?;

        self.bound = Some(path.to_path_buf());
        self.record(PageEventKind::FileBound(file_name(path)));
        Ok(())
    }

    async fn evaluate(&mut self, routine: &InPageRoutine) -> anyhow::Result<Value> {
        if self.closed {
            bail!("page {} is closed", self.id);
        }
        self.run_routine(routine).await
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        if !self.closed {
            self.closed = true;
            self.browser.state.open_pages.fetch_sub(1, Ordering::SeqCst);
            self.record(PageEventKind::Closed);
        }
        Ok(())
    }
}
