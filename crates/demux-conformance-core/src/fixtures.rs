//! Expected-result fixtures
//!
//! Samples and fixtures are paired by name: the fixture for `clip.mp4` is
//! `clip.json` in the media info tree that mirrors the corpus layout.

use crate::config::HarnessConfig;
use crate::error::FixtureError;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Maps a sample file name to its fixture file name
///
/// The last extension is replaced by `.json`; a name without one gets `.json`
/// appended.
pub fn fixture_file_name(sample_name: &str) -> String {
    match sample_name.rfind('.') {
        Some(dot) if dot + 1 < sample_name.len() => format!("{}.json", &sample_name[..dot]),
        _ => format!("{}.json", sample_name),
    }
}

/// Where fixtures live for each corpus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureLayout {
    pub media_info_dir: PathBuf,
    pub orientation_dir: PathBuf,
}

impl FixtureLayout {
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            media_info_dir: config.media_info_fixtures_dir(),
            orientation_dir: config.orientation_fixtures_dir(),
        }
    }

    pub fn media_info_path(&self, sample_name: &str) -> PathBuf {
        self.media_info_dir.join(fixture_file_name(sample_name))
    }

    pub fn orientation_path(&self, sample_name: &str) -> PathBuf {
        self.orientation_dir.join(fixture_file_name(sample_name))
    }

    pub async fn load_media_info(&self, sample_name: &str) -> Result<Value, FixtureError> {
        load_fixture(self.media_info_path(sample_name)).await
    }

    pub async fn load_orientation(&self, sample_name: &str) -> Result<Value, FixtureError> {
        load_fixture(self.orientation_path(sample_name)).await
    }
}

/// Reads and parses one fixture file
pub async fn load_fixture(path: impl AsRef<Path>) -> Result<Value, FixtureError> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => FixtureError::Missing(path.to_path_buf()),
        _ => FixtureError::Unreadable {
            path: path.to_path_buf(),
            message: e.to_string(),
        },
    })?;

    trace!("Loaded fixture {} ({} bytes)", path.display(), raw.len());
    serde_json::from_str(&raw).map_err(|e| FixtureError::Malformed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
