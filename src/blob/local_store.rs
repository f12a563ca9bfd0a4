//! Local filesystem blob storage implementation

use crate::blob::{BlobError, BlobInfo, BlobStorage};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use log::{debug, info, warn};

/// One file per key under `storage_path`
pub struct LocalBlobStore {
    storage_path: PathBuf,
    temp_path: PathBuf,
    temp_counter: AtomicU64,
}

impl LocalBlobStore {
    /// Open (creating if needed) a store rooted at `storage_path`.
    /// Writes are staged in `temp_path` and renamed into place.
    pub fn new(storage_path: impl AsRef<Path>, temp_path: impl AsRef<Path>) -> io::Result<Self> {
        let storage_path = storage_path.as_ref().to_path_buf();
        let temp_path = temp_path.as_ref().to_path_buf();

        fs::create_dir_all(&storage_path)?;
        fs::create_dir_all(&temp_path)?;
        sweep_staging_files(&temp_path)?;
        info!("Using storage directory: {}", storage_path.display());

        Ok(Self {
            storage_path,
            temp_path,
            temp_counter: AtomicU64::new(0),
        })
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    /// Resolve the file path for a key, rejecting anything that could escape the directory
    fn blob_path(&self, key: &str) -> Result<PathBuf, BlobError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && !key.contains(['/', '\\', '\0'])
            && !key.contains("..");
        if !valid {
            return Err(BlobError::InvalidKey(key.to_string()));
        }
        Ok(self.storage_path.join(key))
    }

    fn staging_path(&self, key: &str) -> PathBuf {
        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        self.temp_path.join(format!("{}.{}.{}.part", key, std::process::id(), n))
    }

    fn write_staged(staging: &Path, target: &Path, data: &[u8]) -> io::Result<()> {
        let mut file = File::create(staging)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(staging, target)
    }
}

fn map_not_found(err: io::Error, key: &str) -> BlobError {
    if err.kind() == io::ErrorKind::NotFound {
        BlobError::NotFound(key.to_string())
    } else {
        BlobError::Io(err)
    }
}

impl BlobStorage for LocalBlobStore {
    fn write(&self, key: &str, data: &[u8]) -> Result<(), BlobError> {
        let target = self.blob_path(key)?;
        let staging = self.staging_path(key);

        if let Err(e) = Self::write_staged(&staging, &target, data) {
            // Leftover staging files are never listed, so cleanup is best effort
            let _ = fs::remove_file(&staging);
            return Err(BlobError::Io(e));
        }

        #[cfg(unix)]
        if let Err(e) = File::open(&self.storage_path).and_then(|dir| dir.sync_all()) {
            warn!("Failed to sync storage directory after writing {}: {}", key, e);
        }

        debug!("Wrote {} bytes to {}", data.len(), target.display());
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Bytes, BlobError> {
        let path = self.blob_path(key)?;
        let data = fs::read(&path).map_err(|e| map_not_found(e, key))?;
        debug!("Read {} bytes from {}", data.len(), path.display());
        Ok(Bytes::from(data))
    }

    fn delete(&self, key: &str) -> Result<(), BlobError> {
        let path = self.blob_path(key)?;
        fs::remove_file(&path).map_err(|e| map_not_found(e, key))?;
        debug!("Deleted {}", path.display());
        Ok(())
    }

    fn list(&self) -> Result<Vec<BlobInfo>, BlobError> {
        let mut blobs = Vec::new();

        for dir_entry in fs::read_dir(&self.storage_path)? {
            let dir_entry = match dir_entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Skipping unreadable directory entry in {}: {}", self.storage_path.display(), e);
                    continue;
                }
            };

            let metadata = match dir_entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    warn!("Skipping {}: {}", dir_entry.path().display(), e);
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }

            let key = match dir_entry.file_name().into_string() {
                Ok(k) => k,
                Err(name) => {
                    warn!("Skipping non UTF-8 file name {:?}", name);
                    continue;
                }
            };

            blobs.push(BlobInfo {
                key,
                size: metadata.len(),
                modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }

        Ok(blobs)
    }
}

/// Remove staged writes a crashed process never renamed into place
fn sweep_staging_files(temp_path: &Path) -> io::Result<()> {
    let mut swept = 0;
    for dir_entry in fs::read_dir(temp_path)? {
        let path = dir_entry?.path();
        if !path.is_file() || path.extension().map_or(true, |ext| ext != "part") {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => swept += 1,
            Err(e) => warn!("Failed to remove stale staging file {}: {}", path.display(), e),
        }
    }
    if swept > 0 {
        info!("Removed {} stale staging files from {}", swept, temp_path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, LocalBlobStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path().join("photos"), dir.path().join("photos/.tmp")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_local_blob_store_basic_operations() {
        let (_dir, store) = temp_store();
        let test_data = b"Hello, local storage!";

        store.write("photo_000000000001.png", test_data).unwrap();
        assert_eq!(store.read("photo_000000000001.png").unwrap().as_ref(), test_data);

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].key, "photo_000000000001.png");
        assert_eq!(listed[0].size, test_data.len() as u64);
        assert!(listed[0].modified.is_some());

        store.delete("photo_000000000001.png").unwrap();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_overwrite_replaces_content() {
        let (_dir, store) = temp_store();
        store.write("a.png", b"first").unwrap();
        store.write("a.png", b"second").unwrap();
        assert_eq!(store.read("a.png").unwrap().as_ref(), b"second");
    }

    #[test]
    fn test_local_blob_store_error_cases() {
        let (_dir, store) = temp_store();

        assert!(matches!(store.read("missing.png"), Err(BlobError::NotFound(_))));
        assert!(matches!(store.delete("missing.png"), Err(BlobError::NotFound(_))));

        for key in ["", "../escape.png", "nested/a.png", ".hidden", "a\\b.png"] {
            assert!(matches!(store.write(key, b"x"), Err(BlobError::InvalidKey(_))), "key {:?}", key);
        }
    }

    #[test]
    fn test_list_skips_directories_and_staging() {
        let (dir, store) = temp_store();
        store.write("a.png", b"a").unwrap();
        fs::create_dir_all(dir.path().join("photos/subdir")).unwrap();

        let keys: Vec<String> = store.list().unwrap().into_iter().map(|b| b.key).collect();
        assert_eq!(keys, vec!["a.png".to_string()]);
        assert_eq!(fs::read_dir(dir.path().join("photos/.tmp")).unwrap().count(), 0);
    }

    #[test]
    fn test_new_sweeps_stale_staging_files() {
        let dir = tempfile::tempdir().unwrap();
        let temp_path = dir.path().join("photos/.tmp");
        fs::create_dir_all(&temp_path).unwrap();
        fs::write(temp_path.join("photo_000000000001.png.4242.0.part"), b"half").unwrap();
        fs::write(temp_path.join("notes.txt"), b"keep").unwrap();

        let store = LocalBlobStore::new(dir.path().join("photos"), &temp_path).unwrap();
        assert!(!temp_path.join("photo_000000000001.png.4242.0.part").exists());
        assert!(temp_path.join("notes.txt").exists());
        assert!(store.list().unwrap().is_empty());
    }
}
