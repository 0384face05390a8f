//! # mssql-bulk
//!
//! Bulk data-movement engine for Microsoft SQL Server.
//!
//! This library moves typed record collections in and out of SQL Server
//! with support for:
//!
//! - **Bulk insert** over the TDS bulk-load protocol
//! - **Bulk update and delete** emulated through ephemeral staging tables
//!   and join statements
//! - **Schema introspection** that populates tabular structures from live
//!   queries, including zero-row result sets
//! - **Transactional orchestration** under read-uncommitted transactions,
//!   own-connection or caller-held
//!
//! ## Example
//!
//! ```rust,no_run
//! use mssql_bulk::{BulkRecord, BulkWorker, ColumnKind, ColumnSpec, SqlValue};
//!
//! struct Order {
//!     id: uuid::Uuid,
//!     amount: rust_decimal::Decimal,
//! }
//!
//! impl BulkRecord for Order {
//!     fn table_name() -> &'static str {
//!         "Orders"
//!     }
//!     fn key_columns() -> &'static [&'static str] {
//!         &["OrderId"]
//!     }
//!     fn columns() -> Vec<ColumnSpec> {
//!         vec![
//!             ColumnSpec::new("OrderId", ColumnKind::UniqueIdentifier),
//!             ColumnSpec::new("Amount", ColumnKind::Decimal),
//!         ]
//!     }
//!     fn values(&self) -> Vec<SqlValue> {
//!         vec![SqlValue::Uuid(self.id), SqlValue::Decimal(self.amount)]
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let worker = BulkWorker::new("SalesDb", 60);
//!     let orders = vec![Order {
//!         id: uuid::Uuid::new_v4(),
//!         amount: rust_decimal::Decimal::new(1050, 2),
//!     }];
//!     let result = worker.bulk_add_range(&orders).await;
//!     assert!(result.success);
//! }
//! ```

pub mod config;
pub mod connection;
pub mod convert;
pub mod copy;
pub mod error;
pub mod introspect;
pub mod result;
pub mod sqlgen;
pub mod table;
pub mod typemap;
pub mod value;
pub mod worker;

// Re-exports for convenient access
pub use config::{ConnectionParams, DEFAULT_PORT};
pub use connection::{BulkDatabase, SqlClient, Transaction};
pub use convert::{to_data_table, BulkRecord};
pub use copy::{bulk_copy, bulk_copy_in_transaction, bulk_copy_in_transaction_strict};
pub use error::{BulkError, Result};
pub use introspect::{table_from_query, table_from_query_with};
pub use result::OperationResult;
pub use table::{ColumnSpec, DataTable};
pub use typemap::ColumnKind;
pub use value::{SqlNullType, SqlValue};
pub use worker::BulkWorker;
