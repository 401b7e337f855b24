use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::engine::SampleSource;

use super::schema::SampleEntry;

pub const MANIFEST_FILE: &str = "samples_manifest.json";

const AUDIO_EXTENSIONS: [&str; 7] = ["wav", "mp3", "aiff", "aif", "flac", "ogg", "m4a"];

/// Resolves a snapshot's sample entries to files the engine can load.
pub trait SampleLibrary {
    fn resolve(&self, entry: &SampleEntry) -> Option<SampleSource>;
}

#[derive(Deserialize)]
struct Manifest {
    #[serde(default)]
    samples: HashMap<String, ManifestEntry>,
}

#[derive(Deserialize)]
struct ManifestEntry {
    path: PathBuf,
}

/// Samples under one directory, optionally indexed by a `samples_manifest.json`
/// mapping sample ids to paths.
pub struct DirSampleLibrary {
    root: PathBuf,
    manifest: HashMap<String, PathBuf>,
}

impl DirSampleLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            manifest: HashMap::new(),
        }
    }

    /// Opens `root`, reading its manifest when present.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let mut library = Self::new(root);
        let manifest_path = library.root.join(MANIFEST_FILE);
        if manifest_path.is_file() {
            let contents = std::fs::read_to_string(&manifest_path)
                .with_context(|| format!("failed to read {}", manifest_path.display()))?;
            let manifest: Manifest = serde_json::from_str(&contents)
                .with_context(|| format!("failed to parse {}", manifest_path.display()))?;
            library.manifest = manifest
                .samples
                .into_iter()
                .map(|(id, entry)| (id, entry.path))
                .collect();
            log::debug!(
                "sample manifest {} lists {} samples",
                manifest_path.display(),
                library.manifest.len()
            );
        }
        Ok(library)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn in_root(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn candidates(&self, entry: &SampleEntry) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Some(id) = entry.sample_id.as_deref() {
            if let Some(path) = self.manifest.get(id) {
                candidates.push(self.in_root(path));
            }
        }
        if let Some(recorded) = entry.file_path.as_deref() {
            let recorded = Path::new(recorded);
            candidates.push(self.in_root(recorded));
            if let Some(name) = recorded.file_name() {
                candidates.push(self.root.join(name));
            }
        }
        if let Some(id) = entry.sample_id.as_deref().filter(|id| is_file_stem(id)) {
            candidates.push(self.root.join(id));
            for extension in AUDIO_EXTENSIONS {
                candidates.push(self.root.join(format!("{id}.{extension}")));
            }
        }
        candidates
    }
}

/// Ids are joined onto the root, so they must name a file directly inside it.
fn is_file_stem(id: &str) -> bool {
    !id.is_empty() && !id.contains(['/', '\\']) && !id.contains("..")
}

impl SampleLibrary for DirSampleLibrary {
    fn resolve(&self, entry: &SampleEntry) -> Option<SampleSource> {
        let path = self
            .candidates(entry)
            .into_iter()
            .find(|candidate| candidate.is_file())?;
        let mut source = SampleSource::from_path(path);
        source.sample_id = entry.sample_id.clone();
        if entry.display_name.is_some() {
            source.display_name = entry.display_name.clone();
        }
        Some(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(sample_id: Option<&str>, file_path: Option<&str>) -> SampleEntry {
        SampleEntry {
            loaded: true,
            sample_id: sample_id.map(str::to_string),
            file_path: file_path.map(str::to_string),
            ..SampleEntry::default()
        }
    }

    #[test]
    fn resolves_by_recorded_path_then_id() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("snare.wav"), b"RIFF").unwrap();
        std::fs::write(dir.path().join("a1b2c3.flac"), b"fLaC").unwrap();
        let library = DirSampleLibrary::new(dir.path());

        let source = library
            .resolve(&entry(None, Some("/elsewhere/drums/snare.wav")))
            .unwrap();
        assert_eq!(source.path, dir.path().join("snare.wav"));
        assert_eq!(source.display_name.as_deref(), Some("snare"));

        let source = library.resolve(&entry(Some("a1b2c3"), None)).unwrap();
        assert_eq!(source.path, dir.path().join("a1b2c3.flac"));
        assert_eq!(source.sample_id.as_deref(), Some("a1b2c3"));

        assert!(library.resolve(&entry(Some("missing"), None)).is_none());
    }

    #[test]
    fn ids_cannot_leave_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("samples");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(dir.path().join("secret.wav"), b"RIFF").unwrap();
        std::fs::write(root.join("kick.wav"), b"RIFF").unwrap();
        let library = DirSampleLibrary::new(&root);

        assert!(library.resolve(&entry(Some("../secret"), None)).is_none());
        assert!(library.resolve(&entry(Some("../secret.wav"), None)).is_none());
        assert!(library.resolve(&entry(Some("sub\\..\\kick"), None)).is_none());
        assert!(library.resolve(&entry(Some(""), None)).is_none());
        assert!(library.resolve(&entry(Some("kick"), None)).is_some());
    }

    #[test]
    fn manifest_ids_take_priority() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("kits")).unwrap();
        std::fs::write(dir.path().join("kits").join("kick.wav"), b"RIFF").unwrap();
        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            r#"{"scan_timestamp": 0, "total_files": 1,
                "samples": {"deadbeef0001": {"path": "kits/kick.wav", "built_in": true}}}"#,
        )
        .unwrap();
        let library = DirSampleLibrary::open(dir.path()).unwrap();
        let source = library.resolve(&entry(Some("deadbeef0001"), None)).unwrap();
        assert_eq!(source.path, dir.path().join("kits").join("kick.wav"));
    }
}
