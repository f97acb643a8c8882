// SQLite database manager: engine-neutral CRUD over one process-wide
// connection. Every call is serialized on the handle lock; the operations
// layer above translates failures into errno values.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info, warn};

pub struct SqliteManager {
    conn: Mutex<Option<Connection>>,
}

/// Quote an identifier for interpolation into a statement. Identifiers
/// cannot be bound as parameters, so this is the only way table and column
/// names reach the engine.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Rows are addressed by the engine's intrinsic rowid; a component that is
/// not a valid rowid can never name an existing row.
fn parse_rowid(row: &str) -> Option<i64> {
    row.parse().ok()
}

impl SqliteManager {
    pub fn new() -> Self {
        Self { conn: Mutex::new(None) }
    }

    /// Open the database file at `path` read-write. The file must already
    /// exist. Any previously open handle is dropped first.
    pub fn open(&self, path: &Path) -> Result<()> {
        let mut guard = self.conn.lock().unwrap();

        if guard.is_some() {
            warn!("sqlite: open: a database is already loaded");
            warn!("sqlite: open: dropping the previous session");
            *guard = None;
        }

        info!("sqlite: opening database from {}", path.display());

        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_WRITE)
            .with_context(|| format!("unable to open SQLite database at {}", path.display()))?;
        *guard = Some(conn);

        Ok(())
    }

    pub fn close(&self) {
        let mut guard = self.conn.lock().unwrap();

        if guard.is_none() {
            warn!("sqlite: close: attempting to close a closed connection");
            return;
        }

        info!("closing sqlite database");
        *guard = None;
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self.conn.lock().unwrap();
        let conn = guard.as_ref().context("no database is open")?;
        f(conn)
    }

    /// Names of all tables in the database.
    pub fn table_names(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            debug!("sqlite: listing table names");

            let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
            let names = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;

            Ok(names)
        })
    }

    /// Intrinsic row identifiers of every row in `table`, in engine order.
    pub fn row_ids(&self, table: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            debug!("sqlite: listing rows in table {table:?}");

            let sql = format!("SELECT rowid FROM {}", quote_ident(table));
            let mut stmt = conn.prepare(&sql)?;
            let ids = stmt
                .query_map([], |row| row.get::<_, i64>(0))?
                .map(|id| id.map(|id| id.to_string()))
                .collect::<rusqlite::Result<Vec<String>>>()?;

            Ok(ids)
        })
    }

    /// Column names of `table`, or `None` when the addressed row does not
    /// exist.
    pub fn column_names(&self, table: &str, row: &str) -> Result<Option<Vec<String>>> {
        self.with_conn(|conn| {
            debug!("sqlite: listing column names in table {table:?}");

            let Some(rowid) = parse_rowid(row) else {
                return Ok(None);
            };

            let sql = format!("SELECT * FROM {} WHERE rowid = ?1", quote_ident(table));
            let mut stmt = conn.prepare(&sql)?;
            let names: Vec<String> = stmt.column_names().iter().map(|n| n.to_string()).collect();

            if !stmt.exists([rowid])? {
                debug!("sqlite: nothing to list, the row may not exist");
                return Ok(None);
            }

            Ok(Some(names))
        })
    }

    /// Bytes of the cell at (`table`, `row`, `col`), or `None` when the
    /// row, the column, or the value itself is missing. Numeric values
    /// render as their text form.
    pub fn cell(&self, table: &str, row: &str, col: &str) -> Result<Option<Vec<u8>>> {
        self.with_conn(|conn| {
            debug!("sqlite: querying cell ({table:?}, {row:?}, {col:?})");

            let Some(rowid) = parse_rowid(row) else {
                return Ok(None);
            };

            let sql = format!("SELECT * FROM {} WHERE rowid = ?1", quote_ident(table));
            let mut stmt = conn.prepare(&sql)?;

            // Resolving the column against the statement schema up front
            // keeps a missing column distinct from a missing row.
            let Some(index) = stmt.column_names().iter().position(|n| *n == col) else {
                debug!("sqlite: the column {col:?} does not exist");
                return Ok(None);
            };

            let mut rows = stmt.query([rowid])?;
            let Some(result) = rows.next()? else {
                debug!("sqlite: nothing to show, the row may not exist");
                return Ok(None);
            };

            let value = match result.get_ref(index)? {
                ValueRef::Null => None,
                ValueRef::Integer(i) => Some(i.to_string().into_bytes()),
                ValueRef::Real(f) => Some(f.to_string().into_bytes()),
                ValueRef::Text(t) => Some(t.to_vec()),
                ValueRef::Blob(b) => Some(b.to_vec()),
            };

            Ok(value)
        })
    }

    /// Overwrite the cell at (`table`, `row`, `col`). UTF-8 payloads are
    /// stored as text, anything else as a blob.
    pub fn set_cell(&self, table: &str, row: &str, col: &str, data: &[u8]) -> Result<()> {
        self.with_conn(|conn| {
            debug!("sqlite: updating cell ({table:?}, {row:?}, {col:?})");

            let rowid = parse_rowid(row)
                .with_context(|| format!("{row:?} is not a valid row identifier"))?;

            let sql = format!(
                "UPDATE {} SET {} = ?1 WHERE rowid = ?2",
                quote_ident(table),
                quote_ident(col)
            );

            match std::str::from_utf8(data) {
                Ok(text) => conn.execute(&sql, rusqlite::params![text, rowid])?,
                Err(_) => conn.execute(&sql, rusqlite::params![data, rowid])?,
            };

            Ok(())
        })
    }

    pub fn rename_table(&self, old: &str, new: &str) -> Result<()> {
        self.with_conn(|conn| {
            debug!("sqlite: renaming table {old:?} to {new:?}");

            let sql =
                format!("ALTER TABLE {} RENAME TO {}", quote_ident(old), quote_ident(new));
            conn.execute(&sql, [])?;

            Ok(())
        })
    }

    /// Re-address a row by rewriting its intrinsic identifier.
    pub fn rename_row(&self, table: &str, old: &str, new: &str) -> Result<()> {
        self.with_conn(|conn| {
            debug!("sqlite: renaming row {old:?} to {new:?} in table {table:?}");

            let old_id = parse_rowid(old)
                .with_context(|| format!("{old:?} is not a valid row identifier"))?;
            let new_id = parse_rowid(new)
                .with_context(|| format!("{new:?} is not a valid row identifier"))?;

            let sql = format!("UPDATE {} SET rowid = ?1 WHERE rowid = ?2", quote_ident(table));
            conn.execute(&sql, rusqlite::params![new_id, old_id])?;

            Ok(())
        })
    }

    pub fn rename_column(&self, table: &str, old: &str, new: &str) -> Result<()> {
        self.with_conn(|conn| {
            debug!("sqlite: renaming column {old:?} to {new:?} in table {table:?}");

            let sql = format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {}",
                quote_ident(table),
                quote_ident(old),
                quote_ident(new)
            );
            conn.execute(&sql, [])?;

            Ok(())
        })
    }

    pub fn create_table(&self, _table: &str) -> Result<()> {
        info!("sqlite: create_table: not implemented");
        bail!("creating tables is not implemented");
    }

    pub fn create_row(&self, _table: &str, _row: &str) -> Result<()> {
        info!("sqlite: create_row: not implemented");
        bail!("creating rows is not implemented");
    }

    /// Add a column of the engine-default type to `table`.
    pub fn create_column(&self, table: &str, column: &str) -> Result<()> {
        self.with_conn(|conn| {
            debug!("sqlite: creating column {column:?} in table {table:?}");

            let sql = format!(
                "ALTER TABLE {} ADD COLUMN {}",
                quote_ident(table),
                quote_ident(column)
            );
            conn.execute(&sql, [])?;

            Ok(())
        })
    }

    pub fn remove_table(&self, table: &str) -> Result<()> {
        self.with_conn(|conn| {
            debug!("sqlite: dropping table {table:?}");

            let sql = format!("DROP TABLE {}", quote_ident(table));
            conn.execute(&sql, [])?;

            Ok(())
        })
    }

    pub fn remove_row(&self, table: &str, row: &str) -> Result<()> {
        self.with_conn(|conn| {
            debug!("sqlite: deleting row {row:?} in table {table:?}");

            let rowid = parse_rowid(row)
                .with_context(|| format!("{row:?} is not a valid row identifier"))?;

            let sql = format!("DELETE FROM {} WHERE rowid = ?1", quote_ident(table));
            conn.execute(&sql, [rowid])?;

            Ok(())
        })
    }

    pub fn remove_column(&self, _table: &str, _column: &str) -> Result<()> {
        info!("sqlite: remove_column: not implemented");
        bail!("dropping columns is not implemented");
    }
}

impl Default for SqliteManager {
    fn default() -> Self {
        Self::new()
    }
}
