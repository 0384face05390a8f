//! Schema introspection: populate a tabular structure from a live query.
//!
//! The structure's columns come from the result-set metadata, so the shape
//! is correct even for queries that return zero rows. When a target table
//! name is supplied, nullability and computed-column flags are enriched
//! from the catalog.

use crate::connection::{BulkDatabase, SqlClient};
use crate::error::Result;
use crate::table::{ColumnSpec, DataTable};
use crate::typemap::{native_type_name, ColumnKind};
use crate::value::{SqlNullType, SqlValue};
use chrono::NaiveDateTime;
use tiberius::{Query, Row};
use tracing::{debug, warn};
use uuid::Uuid;

/// Run a query and return its result as a tabular structure.
///
/// Opens the manager's connection, executes, and always closes it again,
/// even on failure. Any failure yields `None`; the cause is logged, never
/// raised.
pub async fn table_from_query(
    db: &mut BulkDatabase,
    sql: &str,
    table_name: &str,
    keys: &[&str],
) -> Option<DataTable> {
    let outcome = fetch_table(db, sql, &[], table_name, keys).await;
    finish(db, table_name, outcome).await
}

/// Like [`table_from_query`], binding positional `@P1..@Pn` parameters.
///
/// Parameters bind as strings; the server converts them to the column
/// types of the underlying query.
pub async fn table_from_query_with(
    db: &mut BulkDatabase,
    sql: &str,
    params: &[&str],
    table_name: &str,
    keys: &[&str],
) -> Option<DataTable> {
    let outcome = fetch_table(db, sql, params, table_name, keys).await;
    finish(db, table_name, outcome).await
}

async fn finish(
    db: &mut BulkDatabase,
    table_name: &str,
    outcome: Result<DataTable>,
) -> Option<DataTable> {
    if let Err(e) = db.close().await {
        warn!("Failed to close connection after introspection: {}", e);
    }
    match outcome {
        Ok(table) => Some(table),
        Err(e) => {
            warn!("Introspection query for '{}' failed: {}", table_name, e);
            None
        }
    }
}

async fn fetch_table(
    db: &mut BulkDatabase,
    sql: &str,
    params: &[&str],
    table_name: &str,
    keys: &[&str],
) -> Result<DataTable> {
    db.open().await?;
    let client = db.client()?;

    // Reads run dirty so introspection never blocks on writer locks.
    client
        .simple_query("SET TRANSACTION ISOLATION LEVEL READ UNCOMMITTED")
        .await?
        .into_results()
        .await?;

    let mut query = Query::new(sql.to_string());
    for param in params {
        query.bind(*param);
    }
    let mut stream = query.query(client).await?;

    // Result-set metadata carries the shape even when no rows come back.
    let shape: Vec<(String, ColumnKind)> = stream
        .columns()
        .await?
        .map(|cols| {
            cols.iter()
                .map(|c| {
                    (
                        c.name().to_string(),
                        ColumnKind::from_native(native_type_name(c.column_type())),
                    )
                })
                .collect()
        })
        .unwrap_or_default();

    let rows = stream.into_first_result().await?;

    let mut table = DataTable::new(table_name);
    for (name, kind) in &shape {
        let mut spec = ColumnSpec::new(name, *kind);
        spec.unique = keys.contains(&name.as_str());
        table.add_column(spec)?;
    }
    if !keys.is_empty() {
        table.set_primary_key(keys.iter().map(|k| k.to_string()))?;
    }

    for row in rows {
        let values = shape
            .iter()
            .enumerate()
            .map(|(idx, (_, kind))| read_value(&row, idx, *kind))
            .collect();
        table.push_row(values)?;
    }

    if !table_name.is_empty() {
        let client = db.client()?;
        enrich_column_flags(client, table_name, &mut table).await?;
    }

    debug!(
        "Introspected {} columns, {} rows for '{}'",
        table.columns().len(),
        table.row_count(),
        table_name
    );
    Ok(table)
}

/// Pull nullability and computed-column flags from the catalog for the
/// columns the result set produced. Columns absent from the catalog keep
/// their defaults.
async fn enrich_column_flags(
    client: &mut SqlClient,
    table_name: &str,
    table: &mut DataTable,
) -> Result<()> {
    let sql = r#"
        SELECT
            COLUMN_NAME,
            CASE WHEN IS_NULLABLE = 'YES' THEN 1 ELSE 0 END,
            ISNULL(COLUMNPROPERTY(OBJECT_ID(TABLE_SCHEMA + '.' + TABLE_NAME), COLUMN_NAME, 'IsComputed'), 0)
        FROM INFORMATION_SCHEMA.COLUMNS
        WHERE TABLE_NAME = @P1
        ORDER BY ORDINAL_POSITION
    "#;

    let mut query = Query::new(sql);
    query.bind(table_name);

    let stream = query.query(client).await?;
    let rows = stream.into_first_result().await?;

    for row in rows {
        let name = row.get::<&str, _>(0).unwrap_or_default();
        let nullable = row.get::<i32, _>(1).unwrap_or(1) == 1;
        let computed = row.get::<i32, _>(2).unwrap_or(0) == 1;
        table.set_column_flags(name, nullable, computed);
    }

    Ok(())
}

/// Read one cell by its semantic kind. A failed accessor means NULL.
fn read_value(row: &Row, idx: usize, kind: ColumnKind) -> SqlValue {
    match kind {
        ColumnKind::Boolean => row
            .get::<bool, _>(idx)
            .map(SqlValue::Bool)
            .unwrap_or(SqlValue::Null(SqlNullType::Bool)),
        ColumnKind::Integer => row
            .get::<i32, _>(idx)
            .map(SqlValue::I32)
            .unwrap_or(SqlValue::Null(SqlNullType::I32)),
        ColumnKind::UniqueIdentifier => row
            .get::<Uuid, _>(idx)
            .map(SqlValue::Uuid)
            .unwrap_or(SqlValue::Null(SqlNullType::Uuid)),
        ColumnKind::Timestamp => row
            .get::<NaiveDateTime, _>(idx)
            .map(SqlValue::DateTime)
            .unwrap_or(SqlValue::Null(SqlNullType::DateTime)),
        // Dates arrive as NaiveDateTime; keep only the date part.
        ColumnKind::Date => row
            .get::<NaiveDateTime, _>(idx)
            .map(|dt| SqlValue::Date(dt.date()))
            .unwrap_or(SqlValue::Null(SqlNullType::Date)),
        ColumnKind::Duration => row
            .get::<NaiveDateTime, _>(idx)
            .map(|dt| SqlValue::Time(dt.time()))
            .unwrap_or(SqlValue::Null(SqlNullType::Time)),
        ColumnKind::Float => row
            .get::<f64, _>(idx)
            .map(SqlValue::F64)
            .unwrap_or(SqlValue::Null(SqlNullType::F64)),
        // String parse is more reliable than the wire numeric; fall back
        // to f64 for results the server renders as float.
        ColumnKind::Decimal => row
            .get::<&str, _>(idx)
            .and_then(|s| s.parse::<rust_decimal::Decimal>().ok())
            .map(SqlValue::Decimal)
            .or_else(|| {
                row.get::<f64, _>(idx).map(|f| {
                    rust_decimal::Decimal::try_from(f)
                        .map(SqlValue::Decimal)
                        .unwrap_or(SqlValue::F64(f))
                })
            })
            .unwrap_or(SqlValue::Null(SqlNullType::Decimal)),
        ColumnKind::Binary => row
            .get::<&[u8], _>(idx)
            .map(|v| SqlValue::Bytes(v.to_vec()))
            .unwrap_or(SqlValue::Null(SqlNullType::Bytes)),
        ColumnKind::Text => row
            .get::<&str, _>(idx)
            .map(|s| SqlValue::String(s.to_string()))
            .unwrap_or(SqlValue::Null(SqlNullType::String)),
    }
}
