//! Conversion of typed record collections into tabular structures.

use crate::error::{BulkError, Result};
use crate::table::DataTable;
use crate::value::SqlValue;

/// A record type that knows its table shape.
///
/// Implementations declare the destination table, the key columns used by
/// update and delete joins, the column specs in order, and how one record
/// renders into a row of values. Columns a record declares but the
/// destination should never receive are handled downstream by the copy
/// executor's mapping exclusions, not here.
pub trait BulkRecord {
    /// Destination table name.
    fn table_name() -> &'static str;

    /// Key columns correlating staged rows with target rows.
    fn key_columns() -> &'static [&'static str];

    /// Ordered column specs, one per value produced by [`values`].
    ///
    /// [`values`]: BulkRecord::values
    fn columns() -> Vec<crate::table::ColumnSpec>;

    /// This record's row, in column order.
    fn values(&self) -> Vec<SqlValue>;
}

/// Build a tabular structure from a slice of records.
///
/// The structure takes its name, columns, and key from the record type.
/// An empty slice is an error here; operation entry points short-circuit
/// empty input before conversion is reached.
pub fn to_data_table<T: BulkRecord>(records: &[T]) -> Result<DataTable> {
    if records.is_empty() {
        return Err(BulkError::Schema(format!(
            "no records to convert for table '{}'",
            T::table_name()
        )));
    }

    let mut table = DataTable::new(T::table_name());
    for column in T::columns() {
        table.add_column(column)?;
    }
    if !T::key_columns().is_empty() {
        table.set_primary_key(T::key_columns().iter().map(|k| k.to_string()))?;
    }

    for record in records {
        table.push_row(record.values())?;
    }

    Ok(table)
}
