//! Duck-typed ESE access: a narrow capability interface standing in for a
//! concrete ESE/JET Blue parser dependency. Any conforming backend — a real
//! ESE B-tree walker, or the in-memory `MockEseSource` used by this crate's
//! own tests and the CLI demonstrator — implements `EseSource`.

use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EseSourceError {
    #[error("table not found: {0}")]
    TableNotFound(String),
    #[error("row index {0} out of range for table {1}")]
    RowOutOfRange(usize, String),
    #[error("column not found: {0}")]
    ColumnNotFound(String),
    #[error("long value {0} not found")]
    LongValueMissing(u32),
}

pub type EseSourceResult<T> = Result<T, EseSourceError>;

/// A single column's raw bytes plus whether they are a long-value
/// indirection (an LV-ID to be resolved with [`EseSource::resolve_long_value`])
/// or the inline value itself.
#[derive(Clone, Debug)]
pub struct ColumnValue {
    pub bytes: Vec<u8>,
    pub is_long_value: bool,
}

/// Narrow capability interface over an opaque EDB: table enumeration by
/// name pattern, per-row column access, and long-value resolution.
pub trait EseSource {
    /// Returns the names of tables whose name matches `pattern` (a simple
    /// prefix match, e.g. `"Message_"` to find all per-mailbox message
    /// tables), following the `Folder_XXX`/`Message_XXX`/`Attachment_XXX`
    /// per-mailbox naming convention Exchange uses.
    fn table_names(&self, pattern: &str) -> Vec<String>;

    fn row_count(&self, table: &str) -> EseSourceResult<usize>;

    fn column_names(&self, table: &str) -> EseSourceResult<Vec<String>>;

    /// Raw bytes for `column` in `row` of `table`, and whether they are a
    /// long-value indirection.
    fn get_bytes(&self, table: &str, row: usize, column: &str) -> EseSourceResult<ColumnValue>;

    /// Resolves a 4-byte long-value ID to its full byte sequence.
    fn resolve_long_value(&self, lv_id: u32) -> EseSourceResult<Vec<u8>>;
}

/// In-memory [`EseSource`] used for tests and the CLI demonstrator. Rows
/// are plain column-name -> bytes maps; long values are a separate
/// id -> bytes map, mirroring the real engine's indirection.
#[derive(Default)]
pub struct MockEseSource {
    tables: BTreeMap<String, Vec<BTreeMap<String, ColumnValue>>>,
    long_values: BTreeMap<u32, Vec<u8>>,
}

impl MockEseSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_long_value(&mut self, id: u32, bytes: Vec<u8>) {
        self.long_values.insert(id, bytes);
    }

    pub fn add_row(&mut self, table: &str, columns: BTreeMap<String, ColumnValue>) {
        self.tables.entry(table.to_string()).or_default().push(columns);
    }

    pub fn inline(bytes: impl Into<Vec<u8>>) -> ColumnValue {
        ColumnValue {
            bytes: bytes.into(),
            is_long_value: false,
        }
    }

    pub fn long_value(lv_id: u32) -> ColumnValue {
        ColumnValue {
            bytes: lv_id.to_le_bytes().to_vec(),
            is_long_value: true,
        }
    }
}

impl EseSource for MockEseSource {
    fn table_names(&self, pattern: &str) -> Vec<String> {
        self.tables
            .keys()
            .filter(|name| name.starts_with(pattern))
            .cloned()
            .collect()
    }

    fn row_count(&self, table: &str) -> EseSourceResult<usize> {
        self.tables
            .get(table)
            .map(|rows| rows.len())
            .ok_or_else(|| EseSourceError::TableNotFound(table.to_string()))
    }

    fn column_names(&self, table: &str) -> EseSourceResult<Vec<String>> {
        let rows = self
            .tables
            .get(table)
            .ok_or_else(|| EseSourceError::TableNotFound(table.to_string()))?;
        Ok(rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn get_bytes(&self, table: &str, row: usize, column: &str) -> EseSourceResult<ColumnValue> {
        let rows = self
            .tables
            .get(table)
            .ok_or_else(|| EseSourceError::TableNotFound(table.to_string()))?;
        let row = rows
            .get(row)
            .ok_or_else(|| EseSourceError::RowOutOfRange(row, table.to_string()))?;
        row.get(column)
            .cloned()
            .ok_or_else(|| EseSourceError::ColumnNotFound(column.to_string()))
    }

    fn resolve_long_value(&self, lv_id: u32) -> EseSourceResult<Vec<u8>> {
        self.long_values
            .get(&lv_id)
            .cloned()
            .ok_or(EseSourceError::LongValueMissing(lv_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names_prefix_match() {
        let mut source = MockEseSource::new();
        source.add_row("Message_1", BTreeMap::new());
        source.add_row("Folder_1", BTreeMap::new());
        let names = source.table_names("Message_");
        assert_eq!(names, vec!["Message_1".to_string()]);
    }

    #[test]
    fn test_long_value_round_trip() {
        let mut source = MockEseSource::new();
        source.add_long_value(7, b"big blob".to_vec());
        assert_eq!(source.resolve_long_value(7).unwrap(), b"big blob");
        assert!(source.resolve_long_value(8).is_err());
    }

    #[test]
    fn test_row_out_of_range() {
        let mut source = MockEseSource::new();
        source.add_row("Mailbox", BTreeMap::new());
        assert!(source.get_bytes("Mailbox", 5, "x").is_err());
    }
}
