//! Sample corpus scanning
//!
//! A corpus is the set of regular files directly inside a directory. Scans are
//! one level deep and keep directory-iteration order.

use crate::config::HarnessConfig;
use crate::error::SetupError;
use crate::fixtures::FixtureLayout;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A sample media file discovered on disk
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SampleFile {
    pub path: PathBuf,
    /// File name including extension, used to pair the sample with its fixture
    pub name: String,
}

impl SampleFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, name }
    }
}

/// Lists the regular files directly inside `dir`
///
/// Subdirectories and symlinks are skipped. A missing or unreadable directory
/// is a setup error: no samples means no cases, not an empty pass.
pub fn scan_dir(dir: impl AsRef<Path>) -> Result<Vec<SampleFile>, SetupError> {
    let dir = dir.as_ref();
    let unreadable = |e: std::io::Error| SetupError::CorpusUnreadable {
        path: dir.to_path_buf(),
        message: e.to_string(),
    };

    let mut samples = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(unreadable)? {
        let entry = entry.map_err(unreadable)?;
        if entry.file_type().map_err(unreadable)?.is_file() {
            samples.push(SampleFile {
                path: entry.path(),
                name: entry.file_name().to_string_lossy().into_owned(),
            });
        }
    }

    debug!("Scanned {} sample(s) in {}", samples.len(), dir.display());
    Ok(samples)
}

/// Both corpora the matrix is built from
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub general: Vec<SampleFile>,
    pub orientation: Vec<SampleFile>,
}

impl Corpus {
    /// Scans the general corpus and its orientation subdirectory
    pub fn discover(config: &HarnessConfig) -> Result<Self, SetupError> {
        let general = scan_dir(&config.samples_dir)?;
        let orientation = scan_dir(config.orientation_samples_dir())?;

        info!(
            "Discovered {} general and {} orientation sample(s)",
            general.len(),
            orientation.len()
        );
        Ok(Self {
            general,
            orientation,
        })
    }

    /// Samples whose expected-result file does not exist
    pub fn unpaired(&self, layout: &FixtureLayout) -> Vec<PathBuf> {
        let general = self
            .general
            .iter()
            .filter(|s| !layout.media_info_path(&s.name).is_file());
        let orientation = self
            .orientation
            .iter()
            .filter(|s| !layout.orientation_path(&s.name).is_file());

        general.chain(orientation).map(|s| s.path.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.general.is_empty() && self.orientation.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_scan_is_one_level_and_files_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.mp4"), b"a").unwrap();
        fs::write(dir.path().join("b.webm"), b"b").unwrap();
        fs::create_dir(dir.path().join("orientation")).unwrap();
        fs::write(dir.path().join("orientation").join("nested.mp4"), b"n").unwrap();

        let mut names: Vec<String> = scan_dir(dir.path())
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.mp4", "b.webm"]);
    }

    #[test]
    fn test_scan_keeps_absolute_paths() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("clip.mp4"), b"x").unwrap();

        let samples = scan_dir(dir.path()).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].path, dir.path().join("clip.mp4"));
        assert_eq!(samples[0], SampleFile::new(dir.path().join("clip.mp4")));
    }

    #[test]
    fn test_missing_dir_is_setup_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");

        match scan_dir(&missing) {
            Err(SetupError::CorpusUnreadable { path, .. }) => assert_eq!(path, missing),
            other => panic!("expected CorpusUnreadable, got {:?}", other),
        }
    }

    #[test]
    fn test_discover_requires_orientation_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("samples")).unwrap();
        fs::write(dir.path().join("samples").join("clip.mp4"), b"x").unwrap();

        let config = HarnessConfig::rooted_at(dir.path());
        assert!(Corpus::discover(&config).is_err());

        fs::create_dir(dir.path().join("samples").join("orientation")).unwrap();
        let corpus = Corpus::discover(&config).unwrap();
        assert_eq!(corpus.general.len(), 1);
        assert!(corpus.orientation.is_empty());
        assert!(!corpus.is_empty());
    }

    #[test]
    fn test_unpaired_lists_samples_without_fixture() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig::rooted_at(dir.path());
        fs::create_dir_all(config.orientation_samples_dir()).unwrap();
        fs::create_dir_all(config.orientation_fixtures_dir()).unwrap();

        fs::write(config.samples_dir.join("paired.mp4"), b"x").unwrap();
        fs::write(config.samples_dir.join("lonely.mkv"), b"x").unwrap();
        fs::write(config.orientation_samples_dir().join("rot.mp4"), b"x").unwrap();
        fs::write(config.media_info_fixtures_dir().join("paired.json"), b"{}").unwrap();

        let corpus = Corpus::discover(&config).unwrap();
        let mut unpaired = corpus.unpaired(&FixtureLayout::from_config(&config));
        unpaired.sort();

        assert_eq!(
            unpaired,
            vec![
                config.samples_dir.join("lonely.mkv"),
                config.orientation_samples_dir().join("rot.mp4"),
            ]
        );
    }
}
