use super::ArtifactStore;
use crate::error::{Result, ValidationError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Stores each artifact as a file named after its key under `root`.
///
/// Writes go to a temp file in `root` that is renamed over the target, so
/// readers never see a partially written artifact.
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    root: PathBuf,
}

impl FileArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file backing `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl ArtifactStore for FileArtifactStore {
    fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(|e| ValidationError::io(&self.root, e))?;

        let target = self.path_for(key);
        // Same directory as the target so the rename stays on one filesystem.
        let mut tmp =
            NamedTempFile::new_in(&self.root).map_err(|e| ValidationError::io(&self.root, e))?;
        tmp.write_all(bytes)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| ValidationError::io(tmp.path(), e))?;
        tmp.persist(&target)
            .map_err(|e| ValidationError::io(&target, e.error))?;

        debug!("Wrote artifact {} ({} bytes)", target.display(), bytes.len());
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ValidationError::io(path, e)),
        }
    }
}

/// Keeps artifacts in memory. Cheap to share behind an `Arc`.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    artifacts: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys currently stored, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.artifacts.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.artifacts
            .write()
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.artifacts.read().get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_read_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let store = FileArtifactStore::new(dir.path());
        assert_eq!(store.read("imputation_values.csv").unwrap(), None);
    }

    #[test]
    fn test_file_store_creates_root_and_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = FileArtifactStore::new(dir.path().join("nested/params"));

        store.write("outlier_params.csv", b"first").unwrap();
        store.write("outlier_params.csv", b"second").unwrap();

        assert_eq!(
            store.read("outlier_params.csv").unwrap(),
            Some(b"second".to_vec())
        );
        assert_eq!(
            fs::read(store.path_for("outlier_params.csv")).unwrap(),
            b"second".to_vec()
        );
    }

    #[test]
    fn test_file_store_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let store = FileArtifactStore::new(dir.path());

        store.write("a.csv", b"1").unwrap();
        store.write("b.csv", b"2").unwrap();

        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.csv".to_string(), "b.csv".to_string()]);
    }

    #[test]
    fn test_file_store_concurrent_reads_see_whole_artifacts() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileArtifactStore::new(dir.path()));
        let old = vec![b'a'; 64 * 1024];
        let new = vec![b'b'; 64 * 1024];
        store.write("params.csv", &old).unwrap();

        let writer = {
            let store = Arc::clone(&store);
            let (old, new) = (old.clone(), new.clone());
            thread::spawn(move || {
                for i in 0..50 {
                    let bytes = if i % 2 == 0 { &new } else { &old };
                    store.write("params.csv", bytes).unwrap();
                }
            })
        };

        for _ in 0..200 {
            let bytes = store.read("params.csv").unwrap().unwrap();
            assert!(bytes == old || bytes == new, "read a partially written artifact");
        }
        writer.join().unwrap();
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryArtifactStore::new();
        assert_eq!(store.read("k").unwrap(), None);

        store.write("k", b"v1").unwrap();
        store.write("k", b"v2").unwrap();
        store.write("a", b"x").unwrap();

        assert_eq!(store.read("k").unwrap(), Some(b"v2".to_vec()));
        assert_eq!(store.keys(), vec!["a".to_string(), "k".to_string()]);
    }
}
