//! On-disk corpora and fixture data
//!
//! [`TestCorpus`] lays out a throwaway `samples/` + `fixtures/` tree in a
//! temporary directory, shaped exactly like the one the harness scans.

pub mod media_info;

pub use media_info::*;

use demux_conformance_core::{fixture_file_name, HarnessConfig};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary corpus; removed when dropped
#[derive(Debug)]
pub struct TestCorpus {
    dir: TempDir,
    config: HarnessConfig,
}

impl TestCorpus {
    /// Creates the empty directory tree for both corpora
    pub fn new() -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let config = HarnessConfig::rooted_at(dir.path());

        std::fs::create_dir_all(config.orientation_samples_dir())?;
        std::fs::create_dir_all(config.orientation_fixtures_dir())?;
        Ok(Self { dir, config })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Config pointing at this corpus
    pub fn config(&self) -> HarnessConfig {
        self.config.clone()
    }

    pub fn add_sample(&self, name: &str, bytes: &[u8]) -> anyhow::Result<PathBuf> {
        write_file(self.config.samples_dir.join(name), bytes)
    }

    pub fn add_orientation_sample(&self, name: &str, bytes: &[u8]) -> anyhow::Result<PathBuf> {
        write_file(self.config.orientation_samples_dir().join(name), bytes)
    }

    /// Writes the media info fixture paired with `sample_name`
    pub fn add_media_info_fixture(
        &self,
        sample_name: &str,
        expected: &Value,
    ) -> anyhow::Result<PathBuf> {
        let path = self
            .config
            .media_info_fixtures_dir()
            .join(fixture_file_name(sample_name));
        write_file(path, serde_json::to_string_pretty(expected)?.as_bytes())
    }

    pub fn add_orientation_fixture(
        &self,
        sample_name: &str,
        expected: &Value,
    ) -> anyhow::Result<PathBuf> {
        let path = self
            .config
            .orientation_fixtures_dir()
            .join(fixture_file_name(sample_name));
        write_file(path, serde_json::to_string_pretty(expected)?.as_bytes())
    }

    /// Writes arbitrary text as a media info fixture, e.g. to test malformed JSON
    pub fn add_raw_media_info_fixture(
        &self,
        sample_name: &str,
        contents: &str,
    ) -> anyhow::Result<PathBuf> {
        let path = self
            .config
            .media_info_fixtures_dir()
            .join(fixture_file_name(sample_name));
        write_file(path, contents.as_bytes())
    }
}

fn write_file(path: PathBuf, bytes: &[u8]) -> anyhow::Result<PathBuf> {
    std::fs::write(&path, bytes)?;
    Ok(path)
}
