//! Bulk-copy executor: streams tabular rows into a destination table over
//! the TDS bulk-load protocol.

use crate::connection::{BulkDatabase, SqlClient, Transaction};
use crate::error::{BulkError, Result};
use crate::result::OperationResult;
use crate::table::DataTable;
use crate::value::{to_column_data, SqlValue};
use std::time::Duration;
use tiberius::{ColumnData, TokenRow};
use tracing::{debug, warn};

/// Tables carrying the known-bad legacy columns.
const EXCLUDED_TABLES: [&str; 3] = ["ExtraCards", "OrderItems", "OrderItemsDeleted"];
/// Columns whose values never reach those tables through the bulk-load
/// stream.
const EXCLUDED_COLUMNS: [&str; 2] = ["Monthly", "Formatting"];

/// Whether a destination-table/column pair is excluded from column
/// mapping.
///
/// Keyed on the destination of the copy, not the structure's own name, so
/// staging tables (which mirror every column) receive full rows even when
/// the structure is bound to an excluded table. Kept as a verbatim legacy
/// rule, not a configurable mechanism.
pub fn is_excluded_mapping(destination: &str, column: &str) -> bool {
    EXCLUDED_TABLES.contains(&destination) && EXCLUDED_COLUMNS.contains(&column)
}

/// Render one row for the bulk-load stream into `destination`.
///
/// The destination's physical column list decides the row arity, so every
/// structure column contributes exactly one value; excluded columns
/// contribute a typed NULL in place of their value.
fn row_column_data(
    destination: &str,
    table: &DataTable,
    row: &[SqlValue],
) -> Vec<ColumnData<'static>> {
    table
        .columns()
        .iter()
        .zip(row)
        .map(|(column, value)| {
            if is_excluded_mapping(destination, &column.name) {
                to_column_data(&SqlValue::null_for(column.kind))
            } else {
                to_column_data(value)
            }
        })
        .collect()
}

/// Stream the structure's rows into `destination` on an open connection.
///
/// Returns the number of rows sent.
pub async fn copy_rows(
    client: &mut SqlClient,
    destination: &str,
    table: &DataTable,
) -> Result<u64> {
    let mut bulk_load = client.bulk_insert(destination).await.map_err(|e| {
        BulkError::bulk_copy(destination, format!("bulk insert init: {}", e))
    })?;

    let mut sent: u64 = 0;
    for row in table.rows() {
        let mut token_row = TokenRow::new();
        for data in row_column_data(destination, table, row) {
            token_row.push(data);
        }
        bulk_load.send(token_row).await.map_err(|e| {
            BulkError::bulk_copy(destination, format!("bulk insert send: {}", e))
        })?;
        sent += 1;
        if sent % 10_000 == 0 {
            debug!("Bulk copy to {}: {} rows sent", destination, sent);
        }
    }

    bulk_load.finalize().await.map_err(|e| {
        BulkError::bulk_copy(destination, format!("bulk insert finalize: {}", e))
    })?;

    debug!("Bulk copy to {} complete: {} rows", destination, sent);
    Ok(sent)
}

/// Copy the structure into its own table on the manager's connection.
///
/// Opens the connection, copies under the configured timeout, and always
/// closes again. Failure becomes an unsuccessful result, never an error.
pub async fn bulk_copy(db: &mut BulkDatabase, table: &DataTable) -> OperationResult {
    let outcome = bulk_copy_inner(db, table).await;
    if let Err(BulkError::Timeout { .. }) = &outcome {
        // The session is stuck mid-exchange; drop it instead of closing.
        db.mark_broken();
    }
    if let Err(e) = db.close().await {
        warn!("Failed to close connection after bulk copy: {}", e);
    }
    match outcome {
        Ok(_) => OperationResult::ok(),
        Err(e) => OperationResult::from_error(&e),
    }
}

async fn bulk_copy_inner(db: &mut BulkDatabase, table: &DataTable) -> Result<u64> {
    db.open().await?;
    let timeout = db.timeout();
    let client = db.client()?;
    copy_rows_with_timeout(client, table.name(), table, timeout).await
}

/// Copy the structure into `destination` inside a caller-held transaction,
/// converting failure into a result.
pub async fn bulk_copy_in_transaction(
    tx: &mut Transaction<'_>,
    table: &DataTable,
    destination: &str,
) -> OperationResult {
    match bulk_copy_in_transaction_strict(tx, table, destination).await {
        Ok(_) => OperationResult::ok(),
        Err(e) => OperationResult::from_error(&e),
    }
}

/// Like [`bulk_copy_in_transaction`], but propagates the underlying error
/// for callers that opt into rethrow semantics.
///
/// A copy timeout poisons the transaction: the session cannot accept
/// further batches, so commit is refused and rollback defers to connection
/// teardown.
pub async fn bulk_copy_in_transaction_strict(
    tx: &mut Transaction<'_>,
    table: &DataTable,
    destination: &str,
) -> Result<u64> {
    let timeout = tx.timeout();
    let result = {
        let client = tx.client()?;
        copy_rows_with_timeout(client, destination, table, timeout).await
    };
    if let Err(BulkError::Timeout { .. }) = &result {
        tx.poison();
    }
    result
}

async fn copy_rows_with_timeout(
    client: &mut SqlClient,
    destination: &str,
    table: &DataTable,
    timeout_secs: u32,
) -> Result<u64> {
    match tokio::time::timeout(
        Duration::from_secs(timeout_secs as u64),
        copy_rows(client, destination, table),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(BulkError::Timeout {
            destination: destination.to_string(),
            seconds: timeout_secs,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ColumnSpec;
    use crate::typemap::ColumnKind;

    fn order_items_table() -> DataTable {
        let mut table = DataTable::new("OrderItems");
        for (name, kind) in [
            ("OrderItemId", ColumnKind::UniqueIdentifier),
            ("Monthly", ColumnKind::Boolean),
            ("Price", ColumnKind::Decimal),
            ("Formatting", ColumnKind::Text),
        ] {
            table.add_column(ColumnSpec::new(name, kind)).unwrap();
        }
        table
            .push_row(vec![
                SqlValue::Uuid(uuid::Uuid::new_v4()),
                SqlValue::Bool(true),
                SqlValue::Decimal(rust_decimal::Decimal::new(999, 2)),
                SqlValue::String("bold".into()),
            ])
            .unwrap();
        table
    }

    #[test]
    fn test_excluded_mapping_is_destination_by_column() {
        assert!(is_excluded_mapping("OrderItems", "Monthly"));
        assert!(is_excluded_mapping("ExtraCards", "Formatting"));
        assert!(is_excluded_mapping("OrderItemsDeleted", "Monthly"));
        assert!(!is_excluded_mapping("OrderItems", "Price"));
        assert!(!is_excluded_mapping("Reports", "Monthly"));
        // Staging names never match the legacy tables.
        assert!(!is_excluded_mapping("temp_ABC", "Monthly"));
    }

    #[test]
    fn test_direct_copy_nulls_excluded_columns_keeping_arity() {
        let table = order_items_table();
        let data = row_column_data("OrderItems", &table, &table.rows()[0]);
        assert_eq!(data.len(), table.columns().len());
        assert!(matches!(data[1], ColumnData::Bit(None)));
        assert!(matches!(data[3], ColumnData::String(None)));
        assert!(matches!(data[0], ColumnData::Guid(Some(_))));
        assert!(matches!(data[2], ColumnData::Numeric(Some(_))));
    }

    #[test]
    fn test_staging_copy_streams_every_declared_column() {
        // The staging DDL mirrors all four columns, so the copy into the
        // staging table must supply all four values.
        let table = order_items_table();
        let staging = crate::sqlgen::create_staging_table(&table, "temp_X");
        assert!(staging.contains("Monthly"));
        assert!(staging.contains("Formatting"));

        let data = row_column_data("temp_X", &table, &table.rows()[0]);
        assert_eq!(data.len(), table.columns().len());
        assert!(matches!(data[1], ColumnData::Bit(Some(true))));
        if let ColumnData::String(Some(s)) = &data[3] {
            assert_eq!(s.as_ref(), "bold");
        } else {
            panic!("expected Formatting value in staging stream");
        }
    }

    #[test]
    fn test_copy_to_other_tables_keeps_all_values() {
        let mut table = DataTable::new("Reports");
        table
            .add_column(ColumnSpec::new("Monthly", ColumnKind::Boolean))
            .unwrap();
        table
            .add_column(ColumnSpec::new("Total", ColumnKind::Decimal))
            .unwrap();
        table
            .push_row(vec![
                SqlValue::Bool(false),
                SqlValue::Decimal(rust_decimal::Decimal::new(100, 2)),
            ])
            .unwrap();
        let data = row_column_data("Reports", &table, &table.rows()[0]);
        assert!(matches!(data[0], ColumnData::Bit(Some(false))));
        assert!(matches!(data[1], ColumnData::Numeric(Some(_))));
    }
}
