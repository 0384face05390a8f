//! In-memory tabular structure: the unit of transfer for bulk operations.

use crate::error::{BulkError, Result};
use crate::typemap::ColumnKind;
use crate::value::SqlValue;

/// Column metadata within a [`DataTable`].
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,

    /// Semantic type.
    pub kind: ColumnKind,

    /// Whether the column allows NULL.
    pub nullable: bool,

    /// Whether the column carries a uniqueness constraint.
    pub unique: bool,

    /// Whether the column is read-only in the source result set.
    pub read_only: bool,
}

impl ColumnSpec {
    /// New writable, nullable, non-unique column.
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: true,
            unique: false,
            read_only: false,
        }
    }
}

/// An ordered set of typed columns plus ordered rows of values.
///
/// Created empty by the introspector or the record converter, populated by
/// row appends, then consumed read-only by the bulk-copy executor and the
/// staging SQL synthesizer.
#[derive(Debug, Clone, Default)]
pub struct DataTable {
    name: String,
    columns: Vec<ColumnSpec>,
    rows: Vec<Vec<SqlValue>>,
    primary_key: Vec<String>,
}

impl DataTable {
    /// Create an empty structure bound to a table name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Update the nullability and read-only flags of an existing column.
    ///
    /// Columns not present are left alone. Names stay immutable after
    /// `add_column`, which is what keeps them unique.
    pub fn set_column_flags(&mut self, name: &str, nullable: bool, read_only: bool) {
        if let Some(idx) = self.column_index(name) {
            self.columns[idx].nullable = nullable;
            self.columns[idx].read_only = read_only;
        }
    }

    pub fn rows(&self) -> &[Vec<SqlValue>] {
        &self.rows
    }

    /// Declared primary-key column names.
    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether a column participates in the primary key.
    pub fn is_key_column(&self, name: &str) -> bool {
        self.primary_key.iter().any(|k| k == name)
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Append a column. Column names must be unique within the structure.
    pub fn add_column(&mut self, column: ColumnSpec) -> Result<()> {
        if self.column_index(&column.name).is_some() {
            return Err(BulkError::Schema(format!(
                "duplicate column '{}' in table '{}'",
                column.name, self.name
            )));
        }
        self.columns.push(column);
        Ok(())
    }

    /// Append a row. The value count must match the column count.
    pub fn push_row(&mut self, row: Vec<SqlValue>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(BulkError::Schema(format!(
                "row has {} values but table '{}' has {} columns",
                row.len(),
                self.name,
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Declare the primary key. Every key column must already exist.
    pub fn set_primary_key<I, S>(&mut self, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        for key in &keys {
            if self.column_index(key).is_none() {
                return Err(BulkError::Schema(format!(
                    "primary key column '{}' not present in table '{}'",
                    key, self.name
                )));
            }
        }
        self.primary_key = keys;
        Ok(())
    }
}
