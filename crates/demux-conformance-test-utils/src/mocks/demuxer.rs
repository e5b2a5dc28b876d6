//! Mock page-global demuxer
//!
//! Answers `load`, `getMediaInfo` and `seekMediaPacket` from canned per-sample
//! data. Each page gets its own [`DemuxerInstance`], so what one case loads is
//! never visible to another.

use crate::mocks::{next_mock_id, CallStats, FailurePlan, MockComponent};
use demux_conformance_core::StreamKind;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tracing::{debug, trace};

/// A packet the mock hands back for a seek
#[derive(Debug, Clone, PartialEq)]
pub struct MockPacket {
    pub data: Vec<u8>,
    /// Byte length of the buffer behind `data`; `None` means "same as data"
    pub backing_byte_length: Option<u64>,
    pub size: Option<f64>,
    pub timestamp: Option<f64>,
    pub duration: Option<f64>,
}

impl MockPacket {
    /// A packet that satisfies the contract for either stream kind
    pub fn new(data: impl Into<Vec<u8>>, timestamp: f64, duration: f64) -> Self {
        let data = data.into();
        Self {
            size: Some(data.len() as f64),
            data,
            backing_byte_length: None,
            timestamp: Some(timestamp),
            duration: Some(duration),
        }
    }

    pub fn with_duration(mut self, duration: Option<f64>) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_timestamp(mut self, timestamp: Option<f64>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_size(mut self, size: Option<f64>) -> Self {
        self.size = size;
        self
    }

    pub fn with_backing_byte_length(mut self, len: u64) -> Self {
        self.backing_byte_length = Some(len);
        self
    }

    /// Wire form, as the page routine would materialize it
    pub fn to_value(&self) -> Value {
        let mut out = Map::new();
        out.insert("data".to_string(), json!(self.data));
        for (key, field) in [
            ("size", self.size),
            ("timestamp", self.timestamp),
            ("duration", self.duration),
        ] {
            if let Some(v) = field {
                out.insert(key.to_string(), json!(v));
            }
        }
        Value::Object(out)
    }

    fn backing_len(&self) -> u64 {
        self.backing_byte_length.unwrap_or(self.data.len() as u64)
    }
}

/// One call the page made into the demuxer
#[derive(Debug, Clone, PartialEq)]
pub enum DemuxerCall {
    Load { name: String, bytes: usize },
    GetMediaInfo,
    SeekMediaPacket {
        kind: StreamKind,
        stream_index: u32,
        target: f64,
    },
}

#[derive(Debug, Clone, Default)]
struct MockSample {
    media_info: Option<Value>,
    packets: HashMap<StreamKind, MockPacket>,
    load_error: Option<String>,
    read_error: Option<String>,
}

/// Canned demuxer shared by every page a [`MockBrowser`](crate::MockBrowser) opens
///
/// # Example
///
/// ```rust
/// use demux_conformance_core::StreamKind;
/// use demux_conformance_test_utils::mocks::{MockDemuxer, MockPacket};
/// use serde_json::json;
///
/// let demuxer = MockDemuxer::new()
///     .with_media_info("clip.mp4", json!({"streams": []}))
///     .with_packet("clip.mp4", StreamKind::Video, MockPacket::new(vec![0, 0, 1], 0.16, 0.04))
///     .with_load_error("broken.mp4", "moov atom not found");
/// ```
#[derive(Clone)]
pub struct MockDemuxer {
    id: u64,
    samples: Arc<RwLock<HashMap<String, MockSample>>>,
    load_delay: Option<Duration>,
    failure_plan: FailurePlan,
    stats: Arc<Mutex<CallStats>>,
    calls: Arc<Mutex<Vec<DemuxerCall>>>,
}

impl MockDemuxer {
    pub fn new() -> Self {
        Self {
            id: next_mock_id(),
            samples: Arc::new(RwLock::new(HashMap::new())),
            load_delay: None,
            failure_plan: FailurePlan::Never,
            stats: Arc::new(Mutex::new(CallStats::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn update(&self, name: &str, f: impl FnOnce(&mut MockSample)) {
        let mut samples = self.samples.write().unwrap();
        f(samples.entry(name.to_string()).or_default());
    }

    /// Media info returned for `name`; `filename` and `url` are filled in on read
    pub fn with_media_info(self, name: &str, info: Value) -> Self {
        self.update(name, |s| s.media_info = Some(info));
        self
    }

    pub fn with_packet(self, name: &str, kind: StreamKind, packet: MockPacket) -> Self {
        self.update(name, |s| {
            s.packets.insert(kind, packet);
        });
        self
    }

    /// Makes `load` reject for `name`
    pub fn with_load_error(self, name: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        self.update(name, |s| s.load_error = Some(message));
        self
    }

    /// Makes the read operation reject for `name`
    pub fn with_read_error(self, name: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        self.update(name, |s| s.read_error = Some(message));
        self
    }

    /// Delays every `load`, to simulate a hanging demuxer
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = Some(delay);
        self
    }

    /// Fails `load` on the configured call numbers
    pub fn with_failure_plan(mut self, plan: FailurePlan) -> Self {
        self.failure_plan = plan;
        self
    }

    /// A fresh, unloaded demuxer for one page
    pub fn instance(&self) -> DemuxerInstance {
        DemuxerInstance {
            demuxer: self.clone(),
            loaded: None,
        }
    }

    pub fn stats(&self) -> CallStats {
        self.stats.lock().unwrap().clone()
    }

    /// Every call made by any page, in order
    pub fn calls(&self) -> Vec<DemuxerCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: DemuxerCall) {
        trace!("Mock demuxer {} call: {:?}", self.id, call);
        self.calls.lock().unwrap().push(call);
    }

    fn sample(&self, name: &str) -> Option<MockSample> {
        self.samples.read().unwrap().get(name).cloned()
    }
}

impl Default for MockDemuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockComponent for MockDemuxer {
    fn mock_id(&self) -> u64 {
        self.id
    }

    fn reset(&mut self) {
        *self.stats.lock().unwrap() = CallStats::new();
        self.calls.lock().unwrap().clear();
    }
}

impl std::fmt::Debug for MockDemuxer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDemuxer")
            .field("id", &self.id)
            .field("samples", &self.samples.read().unwrap().len())
            .field("load_delay", &self.load_delay)
            .field("calls", &self.calls.lock().unwrap().len())
            .finish()
    }
}

#[derive(Debug, Clone)]
struct LoadedSample {
    name: String,
    url: String,
    sample: MockSample,
}

/// Demuxer state owned by a single page
///
/// Errors are plain strings, as a rejected JS promise would carry them.
#[derive(Debug)]
pub struct DemuxerInstance {
    demuxer: MockDemuxer,
    loaded: Option<LoadedSample>,
}

impl DemuxerInstance {
    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub async fn load(&mut self, name: &str, bytes: &[u8]) -> Result<(), String> {
        self.demuxer.record(DemuxerCall::Load {
            name: name.to_string(),
            bytes: bytes.len(),
        });
        let call = {
            let mut stats = self.demuxer.stats.lock().unwrap();
            stats.add_bytes(bytes.len() as u64);
            stats.record_call()
        };

        if let Some(delay) = self.demuxer.load_delay {
            tokio::time::sleep(delay).await;
        }

        if self.demuxer.failure_plan.fails_on(call) {
            self.demuxer.stats.lock().unwrap().record_failure();
            return Err(format!("simulated load failure on call {}", call));
        }

        let sample = self
            .demuxer
            .sample(name)
            .ok_or_else(|| format!("unsupported file: {}", name))?;
        if let Some(message) = &sample.load_error {
            return Err(message.clone());
        }

        debug!("Mock demuxer loaded {} ({} bytes)", name, bytes.len());
        self.loaded = Some(LoadedSample {
            name: name.to_string(),
            url: format!("blob:mock://{}/{}", self.demuxer.id, next_mock_id()),
            sample,
        });
        Ok(())
    }

    fn loaded(&self) -> Result<&LoadedSample, String> {
        self.loaded
            .as_ref()
            .ok_or_else(|| "demuxer has no file loaded".to_string())
    }

    pub async fn get_media_info(&self) -> Result<Value, String> {
        self.demuxer.record(DemuxerCall::GetMediaInfo);
        let loaded = self.loaded()?;
        if let Some(message) = &loaded.sample.read_error {
            return Err(message.clone());
        }

        let mut info = loaded
            .sample
            .media_info
            .clone()
            .ok_or_else(|| format!("no media info for {}", loaded.name))?;
        if let Some(object) = info.as_object_mut() {
            object.insert("filename".to_string(), Value::from(loaded.name.as_str()));
            object.insert("url".to_string(), Value::from(loaded.url.as_str()));
        }
        Ok(info)
    }

    /// Returns the packet's wire form and its backing buffer length
    pub async fn seek_media_packet(
        &self,
        kind: StreamKind,
        stream_index: u32,
        target: f64,
    ) -> Result<(Value, u64), String> {
        self.demuxer.record(DemuxerCall::SeekMediaPacket {
            kind,
            stream_index,
            target,
        });
        let loaded = self.loaded()?;
        if let Some(message) = &loaded.sample.read_error {
            return Err(message.clone());
        }

        let packet = loaded
            .sample
            .packets
            .get(&kind)
            .ok_or_else(|| format!("no {} stream in {}", kind, loaded.name))?;
        Ok((packet.to_value(), packet.backing_len()))
    }
}
