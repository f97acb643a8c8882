// Path decoding for the relational backend. A path addresses at most
// three levels below the root: /<table>/<row>/<column>.

use crate::fs::error::{FsError, FsResult};
use crate::fs::path;

/// Hierarchy level a decoded path points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Database,
    Table,
    Row,
    Column,
}

/// A filesystem path decoded into database coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TablePath {
    Database,
    Table { table: String },
    Row { table: String, row: String },
    Column { table: String, row: String, column: String },
}

impl TablePath {
    /// Decode a raw path string. Relative paths and paths with more than
    /// three components are rejected.
    pub fn parse(raw: &str) -> FsResult<Self> {
        let normalized = path::normalize(raw)?;
        if !normalized.starts_with('/') {
            return Err(FsError::InvalidPath(format!("{raw}: not an absolute path")));
        }

        let mut segments = normalized.split('/').filter(|s| !s.is_empty());

        let table = match segments.next() {
            None => return Ok(TablePath::Database),
            Some(s) => s.to_string(),
        };
        let row = match segments.next() {
            None => return Ok(TablePath::Table { table }),
            Some(s) => s.to_string(),
        };
        let column = match segments.next() {
            None => return Ok(TablePath::Row { table, row }),
            Some(s) => s.to_string(),
        };

        if segments.next().is_some() {
            return Err(FsError::InvalidPath(format!("{raw}: more than 3 components")));
        }

        Ok(TablePath::Column { table, row, column })
    }

    pub fn level(&self) -> Level {
        match self {
            TablePath::Database => Level::Database,
            TablePath::Table { .. } => Level::Table,
            TablePath::Row { .. } => Level::Row,
            TablePath::Column { .. } => Level::Column,
        }
    }
}
