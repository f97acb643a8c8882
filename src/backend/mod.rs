// Backend descriptors and the registry that maps `--type` names onto them.
//
// A backend is a closed unit: identity strings, a database lifecycle, and
// the path-addressed filesystem operations it supports. The registry is a
// statically ordered list of (name, factory) entries; several names may
// share one factory, which makes them aliases of the same backend.

#[cfg(feature = "sled")]
pub mod sled;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::path::Path;
use std::sync::OnceLock;

use crate::fs::error::{FsError, FsResult};

/// Kind of a filesystem entry exposed by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    RegularFile,
    Directory,
}

/// Attributes of a filesystem entry.
///
/// Modes are fixed per entry kind and backends carry no timestamps, so
/// this is deliberately smaller than a full `stat` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileAttr {
    pub kind: FileKind,
    pub mode: u16,
    pub size: u64,
}

impl FileAttr {
    pub fn directory() -> Self {
        Self { kind: FileKind::Directory, mode: 0o755, size: 0 }
    }

    pub fn regular_file(size: u64) -> Self {
        Self { kind: FileKind::RegularFile, mode: 0o644, size }
    }
}

/// A single directory listing entry.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub kind: FileKind,
}

/// Host session configuration a backend requests at mount time.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Bypass the kernel page cache so every read and write reaches the
    /// database.
    pub direct_io: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { direct_io: true }
    }
}

/// The uniform capability surface a database backend exposes.
///
/// Operations carry default bodies returning `NotSupported`; a backend
/// overrides exactly the operations its mapping can express, and the host
/// answers the rest with the corresponding errno.
pub trait Backend: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn help(&self) -> Option<&'static str> {
        None
    }
    fn version(&self) -> &'static str;

    /// Open the database artifact backing the mount. Opening a second time
    /// drops the previous handle first.
    fn open(&self, path: &Path) -> anyhow::Result<()>;

    /// Close the database handle. Safe to call on a closed backend.
    fn close(&self);

    fn session_config(&self) -> SessionConfig {
        SessionConfig::default()
    }

    fn getattr(&self, path: &str) -> FsResult<FileAttr>;

    fn readdir(&self, path: &str) -> FsResult<Vec<DirEntry>>;

    /// Read at most `size` bytes starting at `offset`. Reads at or past the
    /// end of the entry yield an empty buffer.
    fn read(&self, path: &str, size: u32, offset: u64) -> FsResult<Vec<u8>>;

    /// Write `data` at `offset`. Returns the number of bytes consumed.
    fn write(&self, path: &str, data: &[u8], offset: u64) -> FsResult<u32>;

    fn mknod(&self, path: &str) -> FsResult<()> {
        Err(FsError::NotSupported(path.to_string()))
    }

    fn mkdir(&self, path: &str) -> FsResult<()> {
        Err(FsError::NotSupported(path.to_string()))
    }

    fn unlink(&self, path: &str) -> FsResult<()> {
        Err(FsError::NotSupported(path.to_string()))
    }

    fn rmdir(&self, path: &str) -> FsResult<()> {
        Err(FsError::NotSupported(path.to_string()))
    }

    fn rename(&self, from: &str, to: &str, flags: u32) -> FsResult<()> {
        let _ = (to, flags);
        Err(FsError::NotSupported(from.to_string()))
    }
}

/// A named entry in the backend registry.
pub struct Registration {
    pub name: &'static str,
    pub factory: fn() -> Box<dyn Backend>,
}

fn registry() -> &'static [Registration] {
    static REGISTRY: OnceLock<Vec<Registration>> = OnceLock::new();

    REGISTRY.get_or_init(|| {
        let mut entries = Vec::new();

        #[cfg(feature = "sqlite")]
        {
            entries.push(Registration { name: "sqlite", factory: sqlite::register });
            entries.push(Registration { name: "sqlite3", factory: sqlite::register });
        }

        #[cfg(feature = "sled")]
        {
            entries.push(Registration { name: "sled", factory: sled::register });
            entries.push(Registration { name: "kv", factory: sled::register });
            entries.push(Registration { name: "db", factory: sled::register });
        }

        entries
    })
}

/// Look a backend up by registered name. Aliases resolve to the same
/// backend as the primary name.
pub fn get(name: &str) -> Option<Box<dyn Backend>> {
    registry().iter().find(|entry| entry.name == name).map(|entry| (entry.factory)())
}

const NO_HELP: &str = "There is no help for this backend.";

/// Concatenated help blocks of all registered backends. Alias entries do
/// not contribute a second block.
pub fn help_text() -> String {
    let mut out = String::new();

    for entry in registry() {
        let backend = (entry.factory)();
        if backend.name() != entry.name {
            continue;
        }

        out.push_str(backend.name());
        out.push_str(" - ");
        out.push_str(backend.description());
        out.push_str("\n\n");
        out.push_str(backend.help().unwrap_or(NO_HELP));
        out.push_str("\n\n");
    }

    out
}

/// One `Backend <name> version <version>` line per registered backend.
pub fn version_text() -> String {
    let mut out = String::new();

    for entry in registry() {
        let backend = (entry.factory)();
        if backend.name() != entry.name {
            continue;
        }

        out.push_str(&format!("Backend {} version {}\n", backend.name(), backend.version()));
    }

    out
}

/// Byte window for a read call: empty at or past the end of `data`,
/// otherwise at most `size` bytes starting at `offset`.
pub(crate) fn read_window(data: &[u8], size: u32, offset: u64) -> Vec<u8> {
    if offset >= data.len() as u64 {
        return Vec::new();
    }

    let start = offset as usize;
    let end = std::cmp::min(start + size as usize, data.len());
    data[start..end].to_vec()
}
