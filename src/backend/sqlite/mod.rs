// Relational backend: the tables, rows and columns of a SQLite database
// mapped onto directories and files.
//
//     /                all tables
//     /<t>             rows of table t, named by their rowid
//     /<t>/<r>         columns of row r
//     /<t>/<r>/<c>     regular file holding the bytes of cell (t, r, c)

mod dbmgr;
mod path;

pub use dbmgr::SqliteManager;
pub use path::{Level, TablePath};

use std::path::Path;

use tracing::warn;

use crate::backend::{read_window, Backend, DirEntry, FileAttr, FileKind};
use crate::fs::error::{FsError, FsResult};

pub struct SqliteBackend {
    mgr: SqliteManager,
}

pub fn register() -> Box<dyn Backend> {
    Box::new(SqliteBackend::new())
}

impl SqliteBackend {
    pub fn new() -> Self {
        Self { mgr: SqliteManager::new() }
    }

    /// Existence probe shared by getattr and readdir: an entry exists when
    /// the database can produce the level below it.
    fn entry_attr(&self, decoded: &TablePath) -> FsResult<FileAttr> {
        match decoded {
            TablePath::Database => match self.mgr.table_names() {
                Ok(_) => Ok(FileAttr::directory()),
                Err(e) => {
                    warn!("sqlite: getattr: {e:#}");
                    Err(FsError::NotFound("/".to_string()))
                }
            },
            TablePath::Table { table } => match self.mgr.row_ids(table) {
                Ok(_) => Ok(FileAttr::directory()),
                Err(_) => Err(FsError::NotFound(table.clone())),
            },
            TablePath::Row { table, row } => match self.mgr.column_names(table, row) {
                Ok(Some(_)) => Ok(FileAttr::directory()),
                Ok(None) => Err(FsError::NotFound(row.clone())),
                Err(_) => Err(FsError::NotFound(row.clone())),
            },
            TablePath::Column { table, row, column } => match self.mgr.cell(table, row, column) {
                Ok(Some(cell)) => Ok(FileAttr::regular_file(cell.len() as u64)),
                Ok(None) => Err(FsError::NotFound(column.clone())),
                Err(_) => Err(FsError::NotFound(column.clone())),
            },
        }
    }
}

impl Default for SqliteBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn description(&self) -> &'static str {
        "backend for SQLite 3 database files"
    }

    fn help(&self) -> Option<&'static str> {
        Some(
            "The --db option must point at an existing SQLite 3 database file.\n\
             The database is opened read-write; the file is never created.",
        )
    }

    fn version(&self) -> &'static str {
        rusqlite::version()
    }

    fn open(&self, path: &Path) -> anyhow::Result<()> {
        self.mgr.open(path)
    }

    fn close(&self) {
        self.mgr.close()
    }

    fn getattr(&self, path: &str) -> FsResult<FileAttr> {
        let decoded =
            TablePath::parse(path).map_err(|_| FsError::NotFound(path.to_string()))?;
        self.entry_attr(&decoded)
    }

    fn readdir(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        let decoded =
            TablePath::parse(path).map_err(|_| FsError::NotFound(path.to_string()))?;

        let (names, kind) = match &decoded {
            TablePath::Database => {
                let tables = self.mgr.table_names().map_err(|e| {
                    warn!("sqlite: readdir: {e:#}");
                    FsError::NotFound(path.to_string())
                })?;
                (tables, FileKind::Directory)
            }
            TablePath::Table { table } => {
                let rows = self.mgr.row_ids(table).map_err(|e| {
                    warn!("sqlite: readdir: {e:#}");
                    FsError::NotFound(path.to_string())
                })?;
                (rows, FileKind::Directory)
            }
            TablePath::Row { table, row } => match self.mgr.column_names(table, row) {
                Ok(Some(columns)) => (columns, FileKind::RegularFile),
                Ok(None) => return Err(FsError::NotFound(path.to_string())),
                Err(e) => {
                    warn!("sqlite: readdir: {e:#}");
                    return Err(FsError::NotFound(path.to_string()));
                }
            },
            TablePath::Column { .. } => return Err(FsError::NotFound(path.to_string())),
        };

        Ok(names.into_iter().map(|name| DirEntry { name, kind }).collect())
    }

    fn read(&self, path: &str, size: u32, offset: u64) -> FsResult<Vec<u8>> {
        let decoded =
            TablePath::parse(path).map_err(|_| FsError::NotFound(path.to_string()))?;

        let TablePath::Column { table, row, column } = &decoded else {
            return Err(FsError::IsDirectory(path.to_string()));
        };

        let cell = match self.mgr.cell(table, row, column) {
            Ok(Some(cell)) => cell,
            Ok(None) => return Err(FsError::NotFound(path.to_string())),
            Err(e) => {
                warn!("sqlite: read: {e:#}");
                return Err(FsError::NotFound(path.to_string()));
            }
        };

        Ok(read_window(&cell, size, offset))
    }

    fn write(&self, path: &str, data: &[u8], offset: u64) -> FsResult<u32> {
        let decoded =
            TablePath::parse(path).map_err(|_| FsError::Interrupted(path.to_string()))?;

        let TablePath::Column { table, row, column } = &decoded else {
            return Err(FsError::IsDirectory(path.to_string()));
        };

        // Cells are replaced whole; there is no offset write.
        if offset > 0 {
            return Ok(0);
        }

        self.mgr.set_cell(table, row, column, data).map_err(|e| {
            warn!("sqlite: write: {e:#}");
            FsError::Interrupted(path.to_string())
        })?;

        Ok(data.len() as u32)
    }

    fn mknod(&self, path: &str) -> FsResult<()> {
        let decoded =
            TablePath::parse(path).map_err(|_| FsError::Interrupted(path.to_string()))?;

        // Files only exist on the column level.
        let TablePath::Column { table, column, .. } = &decoded else {
            return Err(FsError::ReadOnly(path.to_string()));
        };

        self.mgr.create_column(table, column).map_err(|e| {
            warn!("sqlite: mknod: {e:#}");
            FsError::Interrupted(path.to_string())
        })
    }

    fn mkdir(&self, path: &str) -> FsResult<()> {
        // Neither a table without columns nor a row created from a bare
        // name is expressible, so directory creation is refused outright.
        Err(FsError::ReadOnly(path.to_string()))
    }

    fn unlink(&self, path: &str) -> FsResult<()> {
        // The engine cannot drop a single column.
        Err(FsError::ReadOnly(path.to_string()))
    }

    fn rmdir(&self, path: &str) -> FsResult<()> {
        let decoded =
            TablePath::parse(path).map_err(|_| FsError::Interrupted(path.to_string()))?;

        match &decoded {
            TablePath::Column { .. } => Err(FsError::Interrupted(path.to_string())),
            TablePath::Database => Err(FsError::PermissionDenied(path.to_string())),
            TablePath::Table { table } => self.mgr.remove_table(table).map_err(|e| {
                warn!("sqlite: rmdir: {e:#}");
                FsError::Interrupted(path.to_string())
            }),
            TablePath::Row { table, row } => self.mgr.remove_row(table, row).map_err(|e| {
                warn!("sqlite: rmdir: {e:#}");
                FsError::Interrupted(path.to_string())
            }),
        }
    }

    fn rename(&self, from: &str, to: &str, flags: u32) -> FsResult<()> {
        // TODO: honor RENAME_EXCHANGE / RENAME_NOREPLACE from the host.
        let _ = flags;

        let old = TablePath::parse(from).map_err(|_| {
            warn!("sqlite: rename: illegal original path {from:?}");
            FsError::Interrupted(from.to_string())
        })?;
        let new = TablePath::parse(to).map_err(|_| {
            warn!("sqlite: rename: illegal new path {to:?}");
            FsError::Interrupted(to.to_string())
        })?;

        // Entries cannot move between hierarchy levels.
        if old.level() != new.level() {
            return Err(FsError::KindMismatch(from.to_string()));
        }

        match (&old, &new) {
            (TablePath::Database, _) => {
                warn!("sqlite: rename: cannot rename the root");
                Err(FsError::ReadOnly(from.to_string()))
            }
            (TablePath::Table { table: old_table }, TablePath::Table { table: new_table }) => {
                self.mgr.rename_table(old_table, new_table).map_err(|e| {
                    warn!("sqlite: rename: {e:#}");
                    FsError::KindMismatch(from.to_string())
                })
            }
            (
                TablePath::Row { table, row: old_row },
                TablePath::Row { row: new_row, .. },
            ) => self.mgr.rename_row(table, old_row, new_row).map_err(|e| {
                warn!("sqlite: rename: {e:#}");
                FsError::KindMismatch(from.to_string())
            }),
            (
                TablePath::Column { table, column: old_column, .. },
                TablePath::Column { column: new_column, .. },
            ) => self.mgr.rename_column(table, old_column, new_column).map_err(|e| {
                warn!("sqlite: rename: {e:#}");
                FsError::KindMismatch(from.to_string())
            }),
            _ => Err(FsError::KindMismatch(from.to_string())),
        }
    }
}
