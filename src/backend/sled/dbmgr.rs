// sled database manager: one process-wide tree handle with key/value CRUD.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

pub struct SledManager {
    db: Mutex<Option<sled::Db>>,
}

impl SledManager {
    pub fn new() -> Self {
        Self { db: Mutex::new(None) }
    }

    /// Open the database at `path`, which must already exist on disk. Any
    /// previously open handle is closed first.
    pub fn open(&self, path: &Path) -> Result<()> {
        let mut guard = self.db.lock().unwrap();

        if let Some(previous) = guard.take() {
            warn!("sled: open: a database is already loaded");
            warn!("sled: open: dropping the previous session");
            flush_handle(previous);
        }

        // The engine would happily create a fresh tree; mounting demands an
        // existing artifact.
        if !path.exists() {
            bail!("no database found at {}", path.display());
        }

        info!("sled: opening database from {}", path.display());

        let db = sled::open(path)
            .with_context(|| format!("unable to open sled database at {}", path.display()))?;
        *guard = Some(db);

        Ok(())
    }

    pub fn close(&self) {
        let mut guard = self.db.lock().unwrap();

        match guard.take() {
            None => warn!("sled: close: attempting to close a closed database"),
            Some(db) => {
                info!("closing sled database");
                flush_handle(db);
            }
        }
    }

    fn with_db<T>(&self, f: impl FnOnce(&sled::Db) -> Result<T>) -> Result<T> {
        let guard = self.db.lock().unwrap();
        let db = guard.as_ref().context("no database is open")?;
        f(db)
    }

    /// Name of the open tree, from engine metadata.
    pub fn database_name(&self) -> Result<String> {
        self.with_db(|db| Ok(String::from_utf8_lossy(&db.name()).into_owned()))
    }

    /// All record keys, iterated from the first to the last.
    pub fn record_keys(&self) -> Result<Vec<String>> {
        self.with_db(|db| {
            debug!("sled: iterating the whole database");

            let mut keys = Vec::new();
            for entry in db.iter() {
                let (key, _) = entry.context("error during iteration")?;
                keys.push(String::from_utf8_lossy(&key).into_owned());
            }

            Ok(keys)
        })
    }

    /// Bytes of the record at `key`, or `None` when it does not exist.
    pub fn record_value(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.with_db(|db| {
            debug!("sled: querying record {key:?}");
            Ok(db.get(key)?.map(|value| value.to_vec()))
        })
    }

    /// Insert or overwrite the record at `key`.
    pub fn set_record_value(&self, key: &str, value: &[u8]) -> Result<()> {
        self.with_db(|db| {
            debug!("sled: setting record {key:?}");
            db.insert(key, value)?;
            Ok(())
        })
    }

    /// Move a record to a new key as get, delete, put. The sequence is not
    /// atomic; a failure after the delete leaves the record gone.
    pub fn rename_record(&self, old: &str, new: &str) -> Result<()> {
        self.with_db(|db| {
            debug!("sled: renaming record {old:?} to {new:?}");

            let value = db
                .get(old)?
                .with_context(|| format!("failed to get the old record {old:?}"))?;
            db.remove(old)?;
            db.insert(new, value)?;

            Ok(())
        })
    }

    /// Insert an empty record at `key`.
    pub fn create_record(&self, key: &str) -> Result<()> {
        self.with_db(|db| {
            debug!("sled: creating empty record {key:?}");
            db.insert(key, Vec::new())?;
            Ok(())
        })
    }

    /// Delete the record at `key`; deleting an absent key fails.
    pub fn remove_record(&self, key: &str) -> Result<()> {
        self.with_db(|db| {
            debug!("sled: removing record {key:?}");
            db.remove(key)?.with_context(|| format!("no record named {key:?}"))?;
            Ok(())
        })
    }
}

impl Default for SledManager {
    fn default() -> Self {
        Self::new()
    }
}

fn flush_handle(db: sled::Db) {
    if let Err(e) = db.flush() {
        warn!("sled: flush failed: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seeded_manager(dir: &TempDir) -> SledManager {
        let path = dir.path().join("records");

        let db = sled::open(&path).unwrap();
        db.insert("k1", b"v1".to_vec()).unwrap();
        db.insert("k2", b"v2".to_vec()).unwrap();
        db.flush().unwrap();
        drop(db);

        let mgr = SledManager::new();
        mgr.open(&path).unwrap();
        mgr
    }

    #[test]
    fn test_open_missing_path_fails() {
        let dir = TempDir::new().unwrap();
        let mgr = SledManager::new();
        assert!(mgr.open(&dir.path().join("absent")).is_err());
        assert!(mgr.record_keys().is_err());
    }

    #[test]
    fn test_operations_fail_without_open_handle() {
        let mgr = SledManager::new();
        assert!(mgr.record_value("k1").is_err());
        assert!(mgr.set_record_value("k1", b"v").is_err());
        assert!(mgr.database_name().is_err());
    }

    #[test]
    fn test_key_iteration_and_fetch() {
        let dir = TempDir::new().unwrap();
        let mgr = seeded_manager(&dir);

        assert_eq!(mgr.record_keys().unwrap(), vec!["k1", "k2"]);
        assert_eq!(mgr.record_value("k1").unwrap(), Some(b"v1".to_vec()));
        assert_eq!(mgr.record_value("missing").unwrap(), None);
    }

    #[test]
    fn test_set_create_remove() {
        let dir = TempDir::new().unwrap();
        let mgr = seeded_manager(&dir);

        mgr.set_record_value("k1", b"V1").unwrap();
        assert_eq!(mgr.record_value("k1").unwrap(), Some(b"V1".to_vec()));

        mgr.create_record("k3").unwrap();
        assert_eq!(mgr.record_value("k3").unwrap(), Some(Vec::new()));

        mgr.remove_record("k2").unwrap();
        assert_eq!(mgr.record_value("k2").unwrap(), None);
        assert!(mgr.remove_record("k2").is_err());
    }

    #[test]
    fn test_rename_record() {
        let dir = TempDir::new().unwrap();
        let mgr = seeded_manager(&dir);

        mgr.rename_record("k1", "k9").unwrap();
        assert_eq!(mgr.record_value("k1").unwrap(), None);
        assert_eq!(mgr.record_value("k9").unwrap(), Some(b"v1".to_vec()));

        assert!(mgr.rename_record("ghost", "k5").is_err());
    }

    #[test]
    fn test_database_name() {
        let dir = TempDir::new().unwrap();
        let mgr = seeded_manager(&dir);
        assert!(!mgr.database_name().unwrap().is_empty());
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mgr = seeded_manager(&dir);

        mgr.close();
        assert!(mgr.record_keys().is_err());
        mgr.close();
    }
}
