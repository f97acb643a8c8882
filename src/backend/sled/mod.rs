// Key-value backend: every record of a sled database is a regular file
// directly under the mount root.
//
//     /            all record keys
//     /<k>         regular file holding the bytes of record k

mod dbmgr;

pub use dbmgr::SledManager;

use std::path::Path;

use tracing::warn;

use crate::backend::{read_window, Backend, DirEntry, FileAttr, FileKind};
use crate::fs::error::{FsError, FsResult};
use crate::fs::path as fspath;

pub struct SledBackend {
    mgr: SledManager,
}

pub fn register() -> Box<dyn Backend> {
    Box::new(SledBackend::new())
}

/// Decode a path into a record key. The root decodes to the empty key;
/// any path with more than one component is rejected.
fn key_from_path(path: &str) -> FsResult<String> {
    let normalized = fspath::normalize(path)?;
    if !normalized.starts_with('/') {
        return Err(FsError::InvalidPath(format!("{path}: not an absolute path")));
    }

    let mut segments = normalized.split('/').filter(|s| !s.is_empty());

    let Some(key) = segments.next() else {
        return Ok(String::new());
    };
    if segments.next().is_some() {
        return Err(FsError::InvalidPath(format!("{path}: more than 1 component")));
    }

    Ok(key.to_string())
}

impl SledBackend {
    pub fn new() -> Self {
        Self { mgr: SledManager::new() }
    }
}

impl Default for SledBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for SledBackend {
    fn name(&self) -> &'static str {
        "sled"
    }

    fn description(&self) -> &'static str {
        "backend for sled key-value database files"
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn open(&self, path: &Path) -> anyhow::Result<()> {
        self.mgr.open(path)
    }

    fn close(&self) {
        self.mgr.close()
    }

    fn getattr(&self, path: &str) -> FsResult<FileAttr> {
        let key = key_from_path(path).map_err(|_| FsError::NotFound(path.to_string()))?;

        // Only the root is a directory.
        if key.is_empty() {
            return Ok(FileAttr::directory());
        }

        match self.mgr.record_value(&key) {
            Ok(Some(value)) => Ok(FileAttr::regular_file(value.len() as u64)),
            Ok(None) => Err(FsError::NotFound(path.to_string())),
            Err(e) => {
                warn!("sled: getattr: {e:#}");
                Err(FsError::NotFound(path.to_string()))
            }
        }
    }

    fn readdir(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        let key = key_from_path(path).map_err(|_| FsError::NotFound(path.to_string()))?;
        if !key.is_empty() {
            return Err(FsError::NotFound(path.to_string()));
        }

        let keys = self.mgr.record_keys().map_err(|e| {
            warn!("sled: readdir: {e:#}");
            FsError::Interrupted(path.to_string())
        })?;

        // An empty key may be legitimate in the database, but it cannot be
        // a filename.
        Ok(keys
            .into_iter()
            .filter(|key| !key.is_empty())
            .map(|name| DirEntry { name, kind: FileKind::RegularFile })
            .collect())
    }

    fn read(&self, path: &str, size: u32, offset: u64) -> FsResult<Vec<u8>> {
        let key = key_from_path(path).map_err(|_| FsError::NotFound(path.to_string()))?;
        if key.is_empty() {
            return Err(FsError::IsDirectory(path.to_string()));
        }

        let value = match self.mgr.record_value(&key) {
            Ok(Some(value)) => value,
            Ok(None) => return Err(FsError::NotFound(path.to_string())),
            Err(e) => {
                warn!("sled: read: {e:#}");
                return Err(FsError::NotFound(path.to_string()));
            }
        };

        Ok(read_window(&value, size, offset))
    }

    fn write(&self, path: &str, data: &[u8], offset: u64) -> FsResult<u32> {
        let key = key_from_path(path)?;
        if key.is_empty() {
            return Err(FsError::IsDirectory(path.to_string()));
        }

        // Records are replaced whole; there is no offset write.
        if offset > 0 {
            return Ok(0);
        }

        self.mgr.set_record_value(&key, data).map_err(|e| {
            warn!("sled: write: {e:#}");
            FsError::Interrupted(path.to_string())
        })?;

        Ok(data.len() as u32)
    }

    fn mknod(&self, path: &str) -> FsResult<()> {
        let key = key_from_path(path)?;
        if key.is_empty() {
            return Err(FsError::InvalidPath(path.to_string()));
        }

        self.mgr.create_record(&key).map_err(|e| {
            warn!("sled: mknod: {e:#}");
            FsError::Interrupted(path.to_string())
        })
    }

    fn unlink(&self, path: &str) -> FsResult<()> {
        let key = key_from_path(path)?;
        if key.is_empty() {
            return Err(FsError::InvalidPath(path.to_string()));
        }

        self.mgr.remove_record(&key).map_err(|e| {
            warn!("sled: unlink: {e:#}");
            FsError::Interrupted(path.to_string())
        })
    }

    fn rename(&self, from: &str, to: &str, flags: u32) -> FsResult<()> {
        // TODO: honor RENAME_EXCHANGE / RENAME_NOREPLACE from the host.
        let _ = flags;

        let old = key_from_path(from)?;
        let new = key_from_path(to)?;
        if old.is_empty() {
            return Err(FsError::InvalidPath(from.to_string()));
        }
        if new.is_empty() {
            return Err(FsError::InvalidPath(to.to_string()));
        }

        self.mgr.rename_record(&old, &new).map_err(|e| {
            warn!("sled: rename: {e:#}");
            FsError::Interrupted(from.to_string())
        })
    }

    // mkdir and rmdir are deliberately left to the trait defaults: there
    // are no directories below the root in this backend's mapping.
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_from_path_root() {
        assert_eq!(key_from_path("/").unwrap(), "");
        assert_eq!(key_from_path("///").unwrap(), "");
    }

    #[test]
    fn test_key_from_path_single_component() {
        assert_eq!(key_from_path("/k1").unwrap(), "k1");
        assert_eq!(key_from_path("/k1/").unwrap(), "k1");
        assert_eq!(key_from_path("//k1").unwrap(), "k1");
    }

    #[test]
    fn test_key_from_path_rejects_deep_paths() {
        assert!(key_from_path("/a/b").is_err());
        assert!(key_from_path("/a/b/c").is_err());
    }

    #[test]
    fn test_key_from_path_rejects_relative_paths() {
        assert!(key_from_path("k1").is_err());
        assert!(key_from_path("").is_err());
        assert!(key_from_path("/..").is_err());
    }

    #[test]
    fn test_key_from_path_normalizes() {
        assert_eq!(key_from_path("/a/../b").unwrap(), "b");
        assert_eq!(key_from_path("/./k1").unwrap(), "k1");
    }
}
