//! Bulk operation orchestrator.
//!
//! Entry points come in pairs: own-connection operations that resolve a
//! named connection, run under a fresh read-uncommitted transaction, and
//! settle it themselves; and in-transaction operations that run inside a
//! caller-held transaction and roll it back on failure so the caller never
//! commits a half-applied batch.

use crate::connection::{BulkDatabase, Transaction};
use crate::convert::{to_data_table, BulkRecord};
use crate::copy;
use crate::error::Result;
use crate::result::OperationResult;
use crate::sqlgen;
use crate::table::{ColumnSpec, DataTable};
use crate::typemap::ColumnKind;
use crate::value::SqlValue;
use tracing::{info, warn};

/// Diagnostic message for operations handed an empty collection.
const EMPTY_INPUT_MESSAGE: &str = "Lista vazia";

/// Column name of the single-column staging table used by bulk delete.
const DELETE_ID_COLUMN: &str = "BulkDeleteId";

/// Executes bulk insert, update, and delete operations against a named
/// connection.
///
/// The worker holds no connection itself; every own-connection operation
/// resolves, opens, and closes one around its transaction.
pub struct BulkWorker {
    connection_name: String,
    timeout: u32,
}

/// One staged unit of work, ready to run inside a transaction.
enum Pipeline<'p> {
    /// Straight bulk copy into the structure's own table.
    Add(&'p DataTable),
    /// Stage, join-update, drop.
    Edit(&'p DataTable),
    /// Stage the ids, join-delete, drop.
    Delete {
        staging: &'p DataTable,
        target: &'static str,
        key: &'static str,
    },
}

impl BulkWorker {
    pub fn new(connection_name: impl Into<String>, timeout: u32) -> Self {
        Self {
            connection_name: connection_name.into(),
            timeout,
        }
    }

    /// Insert a single record.
    pub async fn bulk_add<T: BulkRecord>(&self, record: &T) -> OperationResult {
        self.bulk_add_range(std::slice::from_ref(record)).await
    }

    /// Insert a collection of records under its own transaction.
    pub async fn bulk_add_range<T: BulkRecord>(&self, records: &[T]) -> OperationResult {
        if records.is_empty() {
            return OperationResult::ok_with_message(EMPTY_INPUT_MESSAGE);
        }
        let table = match to_data_table(records) {
            Ok(table) => table,
            Err(e) => return OperationResult::from_error(&e),
        };
        self.run_transactional("bulk add", Pipeline::Add(&table))
            .await
    }

    /// Update a single record by its key columns.
    pub async fn bulk_edit<T: BulkRecord>(&self, record: &T) -> OperationResult {
        self.bulk_edit_range(std::slice::from_ref(record)).await
    }

    /// Update a collection of records under its own transaction.
    pub async fn bulk_edit_range<T: BulkRecord>(&self, records: &[T]) -> OperationResult {
        if records.is_empty() {
            return OperationResult::ok_with_message(EMPTY_INPUT_MESSAGE);
        }
        let table = match to_data_table(records) {
            Ok(table) => table,
            Err(e) => return OperationResult::from_error(&e),
        };
        self.run_transactional("bulk edit", Pipeline::Edit(&table))
            .await
    }

    /// Delete a single record by id.
    pub async fn bulk_delete<T: BulkRecord>(&self, id: uuid::Uuid) -> OperationResult {
        self.bulk_delete_range::<T>(&[id]).await
    }

    /// Delete a collection of records by id under its own transaction.
    pub async fn bulk_delete_range<T: BulkRecord>(&self, ids: &[uuid::Uuid]) -> OperationResult {
        if ids.is_empty() {
            return OperationResult::ok_with_message(EMPTY_INPUT_MESSAGE);
        }
        let (staging, key) = match delete_inputs::<T>(ids) {
            Ok(inputs) => inputs,
            Err(result) => return result,
        };
        self.run_transactional(
            "bulk delete",
            Pipeline::Delete {
                staging: &staging,
                target: T::table_name(),
                key,
            },
        )
        .await
    }

    /// Insert a collection inside a caller-held transaction.
    ///
    /// On failure the transaction is rolled back before returning.
    pub async fn bulk_add_range_in_transaction<T: BulkRecord>(
        &self,
        tx: &mut Transaction<'_>,
        records: &[T],
    ) -> OperationResult {
        if records.is_empty() {
            return OperationResult::ok_with_message(EMPTY_INPUT_MESSAGE);
        }
        let table = match to_data_table(records) {
            Ok(table) => table,
            Err(e) => return rollback_with(tx, OperationResult::from_error(&e)).await,
        };
        let result = Pipeline::Add(&table).run(tx).await;
        settle_in_caller_transaction(tx, result).await
    }

    /// Update a collection inside a caller-held transaction.
    ///
    /// On failure the transaction is rolled back before returning.
    pub async fn bulk_edit_range_in_transaction<T: BulkRecord>(
        &self,
        tx: &mut Transaction<'_>,
        records: &[T],
    ) -> OperationResult {
        if records.is_empty() {
            return OperationResult::ok_with_message(EMPTY_INPUT_MESSAGE);
        }
        let table = match to_data_table(records) {
            Ok(table) => table,
            Err(e) => return rollback_with(tx, OperationResult::from_error(&e)).await,
        };
        let result = Pipeline::Edit(&table).run(tx).await;
        settle_in_caller_transaction(tx, result).await
    }

    /// Delete a collection by id inside a caller-held transaction.
    ///
    /// On failure the transaction is rolled back before returning.
    pub async fn bulk_delete_range_in_transaction<T: BulkRecord>(
        &self,
        tx: &mut Transaction<'_>,
        ids: &[uuid::Uuid],
    ) -> OperationResult {
        if ids.is_empty() {
            return OperationResult::ok_with_message(EMPTY_INPUT_MESSAGE);
        }
        let (staging, key) = match delete_inputs::<T>(ids) {
            Ok(inputs) => inputs,
            Err(result) => return rollback_with(tx, result).await,
        };
        let result = Pipeline::Delete {
            staging: &staging,
            target: T::table_name(),
            key,
        }
        .run(tx)
        .await;
        settle_in_caller_transaction(tx, result).await
    }

    /// Open a connection, run the pipeline in a fresh transaction, settle
    /// it according to the outcome, and close the connection again.
    async fn run_transactional(&self, what: &str, pipeline: Pipeline<'_>) -> OperationResult {
        let mut db = match self.open_connection().await {
            Ok(db) => db,
            Err(e) => return OperationResult::from_error(&e),
        };

        let result = match db.begin_transaction().await {
            Ok(mut tx) => {
                let result = pipeline.run(&mut tx).await;
                finish_transaction(tx, what, result).await
            }
            Err(e) => OperationResult::from_error(&e),
        };

        if let Err(e) = db.close().await {
            warn!("Failed to close connection after {}: {}", what, e);
        }
        if result.success {
            info!("{} completed", what);
        }
        result
    }

    async fn open_connection(&self) -> Result<BulkDatabase> {
        let mut db = BulkDatabase::from_name(&self.connection_name, self.timeout)?;
        db.open().await?;
        Ok(db)
    }
}

impl Pipeline<'_> {
    async fn run(&self, tx: &mut Transaction<'_>) -> OperationResult {
        match self {
            Pipeline::Add(table) => add_pipeline(tx, table).await,
            Pipeline::Edit(table) => edit_pipeline(tx, table).await,
            Pipeline::Delete {
                staging,
                target,
                key,
            } => delete_pipeline(tx, staging, target, key).await,
        }
    }
}

async fn add_pipeline(tx: &mut Transaction<'_>, table: &DataTable) -> OperationResult {
    copy::bulk_copy_in_transaction(tx, table, table.name()).await
}

async fn edit_pipeline(tx: &mut Transaction<'_>, table: &DataTable) -> OperationResult {
    if table.primary_key().is_empty() {
        return OperationResult::fail(format!(
            "table '{}' declares no key columns for bulk edit",
            table.name()
        ));
    }

    let staging = sqlgen::staging_table_name();

    let created = tx
        .execute_non_query(&sqlgen::create_staging_table(table, &staging))
        .await;
    if !created.success {
        return created;
    }

    let copied = copy::bulk_copy_in_transaction(tx, table, &staging).await;
    if !copied.success {
        return copied;
    }

    let updated = tx
        .execute_non_query(&sqlgen::update_from_staging(table, &staging))
        .await;
    if !updated.success {
        return updated;
    }

    drop_staging(tx, &staging).await
}

async fn delete_pipeline(
    tx: &mut Transaction<'_>,
    staging: &DataTable,
    target: &str,
    key: &str,
) -> OperationResult {
    let created = tx
        .execute_non_query(&sqlgen::create_staging_table(staging, staging.name()))
        .await;
    if !created.success {
        return created;
    }

    let copied = copy::bulk_copy_in_transaction(tx, staging, staging.name()).await;
    if !copied.success {
        return copied;
    }

    let deleted = tx
        .execute_non_query(&sqlgen::delete_join(
            target,
            staging.name(),
            DELETE_ID_COLUMN,
            key,
        ))
        .await;
    if !deleted.success {
        return deleted;
    }

    drop_staging(tx, staging.name()).await
}

/// Drop the staging table. The data work already succeeded, so a failed
/// drop degrades to success with a diagnostic instead of undoing it.
async fn drop_staging(tx: &mut Transaction<'_>, staging: &str) -> OperationResult {
    let dropped = tx.execute_non_query(&sqlgen::drop_table(staging)).await;
    if dropped.success {
        OperationResult::ok()
    } else {
        warn!(
            "Staging table {} was not dropped: {}",
            staging,
            dropped.message.as_deref().unwrap_or("unknown error")
        );
        OperationResult::ok_with_message(format!(
            "operation succeeded but staging table {} was not dropped",
            staging
        ))
    }
}

/// Build the single-column id staging structure and pick the join key.
fn delete_inputs<T: BulkRecord>(
    ids: &[uuid::Uuid],
) -> std::result::Result<(DataTable, &'static str), OperationResult> {
    let key = match T::key_columns().first() {
        Some(key) => *key,
        None => {
            return Err(OperationResult::fail(format!(
                "table '{}' declares no key columns for bulk delete",
                T::table_name()
            )))
        }
    };
    match delete_staging_table(ids) {
        Ok(staging) => Ok((staging, key)),
        Err(e) => Err(OperationResult::from_error(&e)),
    }
}

/// Single-column structure holding the ids to delete, named after its
/// staging table.
fn delete_staging_table(ids: &[uuid::Uuid]) -> Result<DataTable> {
    let mut table = DataTable::new(sqlgen::delete_staging_table_name());
    table.add_column(ColumnSpec::new(
        DELETE_ID_COLUMN,
        ColumnKind::UniqueIdentifier,
    ))?;
    for id in ids {
        table.push_row(vec![SqlValue::Uuid(*id)])?;
    }
    Ok(table)
}

/// Commit on success, roll back otherwise. Consumes the transaction.
async fn finish_transaction(
    mut tx: Transaction<'_>,
    what: &str,
    result: OperationResult,
) -> OperationResult {
    if result.success {
        match tx.commit().await {
            Ok(()) => result,
            Err(e) => {
                let _ = tx.rollback().await;
                OperationResult::from_error(&e)
            }
        }
    } else {
        if let Err(e) = tx.rollback().await {
            warn!("Rollback after failed {} also failed: {}", what, e);
        }
        result
    }
}

/// Roll back the caller's transaction when the pipeline failed.
async fn settle_in_caller_transaction(
    tx: &mut Transaction<'_>,
    result: OperationResult,
) -> OperationResult {
    if result.success {
        result
    } else {
        rollback_with(tx, result).await
    }
}

async fn rollback_with(tx: &mut Transaction<'_>, result: OperationResult) -> OperationResult {
    if let Err(e) = tx.rollback().await {
        warn!("Rollback after failed bulk operation also failed: {}", e);
    }
    result
}
