//! On-disk tile store: one file per key, `<root>/<provider>/<z>_<x>_<y>.<ext>`.
//!
//! Files are written to a uniquely named temporary file and renamed into
//! place, so readers never observe a partial tile and concurrent writers of
//! the same key simply replace each other.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::key::{TileKey, TileProvider};
use crate::errors::CacheError;
use crate::log::debug;

/// Files and bytes stored for one provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskUsage {
    pub provider: TileProvider,
    pub files: usize,
    pub bytes: u64,
}

#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| CacheError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn provider_dir(&self, provider: TileProvider) -> PathBuf {
        self.root.join(provider.name())
    }

    pub fn path_for(&self, key: &TileKey) -> PathBuf {
        self.provider_dir(key.provider).join(key.file_name())
    }

    pub fn contains(&self, key: &TileKey) -> bool {
        self.path_for(key).is_file()
    }

    /// Stored bytes for `key`, or `None` if there is no readable file.
    pub fn read(&self, key: &TileKey) -> Option<Vec<u8>> {
        let path = self.path_for(key);
        match fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    debug!(path = %path.display(), error = %e, "unreadable tile file");
                }
                None
            }
        }
    }

    pub fn write(&self, key: &TileKey, data: &[u8]) -> io::Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = path.with_file_name(format!("{}.{}.tmp", key.file_name(), Uuid::new_v4()));
        let written = File::create(&tmp).and_then(|mut file| {
            file.write_all(data)?;
            file.sync_all()
        });
        if let Err(e) = written.and_then(|()| fs::rename(&tmp, &path)) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        Ok(())
    }

    pub fn remove(&self, key: &TileKey) -> io::Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    /// Delete every provider directory. Anything else under the root is left
    /// alone.
    pub fn clear(&self) -> io::Result<()> {
        for provider in TileProvider::ALL {
            match fs::remove_dir_all(self.provider_dir(provider)) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
                _ => {}
            }
        }
        Ok(())
    }

    pub fn usage(&self) -> io::Result<Vec<DiskUsage>> {
        let mut usage = Vec::new();
        for provider in TileProvider::ALL {
            let mut entry = DiskUsage {
                provider,
                files: 0,
                bytes: 0,
            };
            let dir = match fs::read_dir(self.provider_dir(provider)) {
                Ok(dir) => dir,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    usage.push(entry);
                    continue;
                }
                Err(e) => return Err(e),
            };
            for file in dir {
                let meta = file?.metadata()?;
                if meta.is_file() {
                    entry.files += 1;
                    entry.bytes += meta.len();
                }
            }
            usage.push(entry);
        }
        Ok(usage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(x: u32) -> TileKey {
        TileKey::new(TileProvider::OpenStreetMap, 16, x, 7)
    }

    #[test]
    fn layout_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::open(dir.path()).unwrap();
        assert_eq!(
            store.path_for(&TileKey::new(TileProvider::Satellite, 17, 3, 4)),
            dir.path().join("Satellite").join("17_3_4.jpg")
        );
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::open(dir.path()).unwrap();
        assert!(store.read(&key(1)).is_none());

        store.write(&key(1), b"first").unwrap();
        store.write(&key(1), b"second").unwrap();
        assert_eq!(store.read(&key(1)).unwrap(), b"second");
        assert!(store.contains(&key(1)));

        let leftovers: Vec<_> = fs::read_dir(dir.path().join("OpenStreetMap"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers.len(), 1, "temporary files left behind: {leftovers:?}");
    }

    #[test]
    fn clear_keeps_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::open(dir.path()).unwrap();
        store.write(&key(1), b"tile").unwrap();
        fs::write(dir.path().join("notes.txt"), b"mine").unwrap();

        store.clear().unwrap();
        assert!(!store.contains(&key(1)));
        assert!(dir.path().join("notes.txt").exists());
        // clearing twice is fine
        store.clear().unwrap();
    }

    #[test]
    fn usage_per_provider() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::open(dir.path()).unwrap();
        store.write(&key(1), b"abc").unwrap();
        store.write(&key(2), b"de").unwrap();

        let usage = store.usage().unwrap();
        let osm = usage
            .iter()
            .find(|u| u.provider == TileProvider::OpenStreetMap)
            .unwrap();
        assert_eq!((osm.files, osm.bytes), (2, 5));
        let terrain = usage.iter().find(|u| u.provider == TileProvider::Terrain).unwrap();
        assert_eq!(terrain.files, 0);
    }

    #[test]
    fn remove_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::open(dir.path()).unwrap();
        store.remove(&key(9)).unwrap();
    }
}
