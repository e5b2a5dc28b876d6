//! Harness configuration
//!
//! Defaults mirror the layout the fixtures were recorded against. A JSON file
//! named by `DEMUX_CONFIG` is applied first, then individual `DEMUX_*`
//! environment overrides.

use crate::error::SetupError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_PAGE_URL: &str = "http://localhost:5173";
pub const DEFAULT_INPUT_SELECTOR: &str = "#example-get-media-info-file";

/// Parameters passed to `seekMediaPacket` by the packet scenarios
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeekParams {
    pub stream_index: u32,
    pub target: f64,
}

impl Default for SeekParams {
    fn default() -> Self {
        // Mid-stream on purpose: index 0 / first packet is the trivial case.
        Self {
            stream_index: 1,
            target: 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Page that hosts the demuxer under `window.demuxer`
    pub page_url: String,
    /// File input the sample gets bound to
    pub input_selector: String,
    /// Root of the general sample corpus
    pub samples_dir: PathBuf,
    /// Root of the expected-result fixtures
    pub fixtures_dir: PathBuf,
    /// Subdirectory (under both roots' media info trees) holding orientation samples
    pub orientation_subdir: String,
    pub seek: SeekParams,
    /// Per-case deadline; `None` or `0` leaves cases unbounded
    pub case_timeout_secs: Option<u64>,
    /// Fail the whole run when a sample has no fixture
    pub require_fixtures: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            page_url: DEFAULT_PAGE_URL.to_string(),
            input_selector: DEFAULT_INPUT_SELECTOR.to_string(),
            samples_dir: PathBuf::from("samples"),
            fixtures_dir: PathBuf::from("fixtures"),
            orientation_subdir: "orientation".to_string(),
            seek: SeekParams::default(),
            case_timeout_secs: None,
            require_fixtures: false,
        }
    }
}

impl HarnessConfig {
    /// Creates a config rooted at `root/samples` and `root/fixtures`
    pub fn rooted_at(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            samples_dir: root.join("samples"),
            fixtures_dir: root.join("fixtures"),
            ..Self::default()
        }
    }

    /// Loads a config from a JSON file; missing keys fall back to defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SetupError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SetupError::InvalidConfig(format!("{}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| SetupError::InvalidConfig(format!("{}: {}", path.display(), e)))
    }

    /// Builds the config from `DEMUX_CONFIG` and `DEMUX_*` overrides
    pub fn from_env() -> Result<Self, SetupError> {
        let base = match std::env::var("DEMUX_CONFIG") {
            Ok(path) => Self::from_json_file(path)?,
            Err(_) => Self::default(),
        };
        base.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies `DEMUX_*` overrides read through `lookup`
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, SetupError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DEMUX_PAGE_URL") {
            self.page_url = url;
        }
        if let Some(selector) = lookup("DEMUX_INPUT_SELECTOR") {
            self.input_selector = selector;
        }
        if let Some(dir) = lookup("DEMUX_SAMPLES_DIR") {
            self.samples_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("DEMUX_FIXTURES_DIR") {
            self.fixtures_dir = PathBuf::from(dir);
        }
        if let Some(secs) = lookup("DEMUX_CASE_TIMEOUT_SECS") {
            let secs = secs.trim().parse::<u64>().map_err(|e| {
                SetupError::InvalidConfig(format!("DEMUX_CASE_TIMEOUT_SECS={}: {}", secs, e))
            })?;
            self.case_timeout_secs = (secs > 0).then_some(secs);
        }
        if let Some(flag) = lookup("DEMUX_REQUIRE_FIXTURES") {
            self.require_fixtures = parse_flag(&flag).ok_or_else(|| {
                SetupError::InvalidConfig(format!(
                    "DEMUX_REQUIRE_FIXTURES={} is not a boolean",
                    flag
                ))
            })?;
        }

        debug!("Harness config: {:?}", self);
        Ok(self)
    }

    pub fn case_timeout(&self) -> Option<Duration> {
        self.case_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn orientation_samples_dir(&self) -> PathBuf {
        self.samples_dir.join(&self.orientation_subdir)
    }

    pub fn media_info_fixtures_dir(&self) -> PathBuf {
        self.fixtures_dir.join("mediainfo")
    }

    pub fn orientation_fixtures_dir(&self) -> PathBuf {
        self.media_info_fixtures_dir().join(&self.orientation_subdir)
    }
}

/// Parses `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off`
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
