//! SQL synthesis for staging-table bulk update/delete.
//!
//! The TDS bulk-copy protocol only appends rows, so bulk UPDATE and DELETE
//! are emulated: copy the row-set into an ephemeral staging table, then run
//! a join statement correlating it to the target by key columns.

use crate::table::DataTable;
use uuid::Uuid;

/// Tables whose `Monthly`/`Formatting` columns are excluded from the
/// UPDATE SET list. Known-bad legacy columns; kept verbatim, not
/// generalized.
const UPDATE_EXCLUDED_TABLE: &str = "OrderItems";
const EXCLUDED_COLUMNS: [&str; 2] = ["Monthly", "Formatting"];

/// Fresh staging-table name for a bulk update.
///
/// The random suffix lets concurrent bulk operations against the same
/// target table coexist without name collisions.
pub fn staging_table_name() -> String {
    format!("temp_{}", Uuid::new_v4().simple().to_string().to_uppercase())
}

/// Fresh staging-table name for a bulk delete.
pub fn delete_staging_table_name() -> String {
    format!(
        "tempdelete_{}",
        Uuid::new_v4().simple().to_string().to_uppercase()
    )
}

/// CREATE TABLE mirroring the structure's columns, followed by a unique
/// clustered index on the declared key columns when present.
pub fn create_staging_table(table: &DataTable, staging_name: &str) -> String {
    let mut sql = format!("CREATE TABLE {} (", staging_name);
    for (i, column) in table.columns().iter().enumerate() {
        if i != 0 {
            sql.push(',');
        }
        sql.push(' ');
        sql.push_str(&column.name);
        sql.push(' ');
        sql.push_str(column.kind.staging_type(table.is_key_column(&column.name)));
    }
    sql.push_str(") ");

    if !table.primary_key().is_empty() {
        sql.push_str(&format!(
            "CREATE UNIQUE CLUSTERED INDEX {} ON {} ({});",
            staging_name,
            staging_name,
            table.primary_key().join(",")
        ));
    }

    sql
}

/// UPDATE ... FROM ... INNER JOIN correlating the staging table to the
/// target by the structure's key columns.
pub fn update_from_staging(table: &DataTable, staging_name: &str) -> String {
    let target = table.name();
    let mut sql = format!("UPDATE {} SET ", target);

    let mut first = true;
    for column in table.columns() {
        if target == UPDATE_EXCLUDED_TABLE && EXCLUDED_COLUMNS.contains(&column.name.as_str()) {
            continue;
        }
        if first {
            sql.push_str(&format!(
                " {}.{} = {}.{}",
                target, column.name, staging_name, column.name
            ));
            first = false;
        } else {
            sql.push_str(&format!(
                ",{}.{} = {}.{}",
                target, column.name, staging_name, column.name
            ));
        }
    }

    sql.push_str(&format!(" FROM {} INNER JOIN {} ON ", target, staging_name));
    for (i, key) in table.primary_key().iter().enumerate() {
        if i != 0 {
            sql.push_str(" AND ");
        }
        sql.push_str(&format!("{}.{} = {}.{}", staging_name, key, target, key));
    }

    sql
}

/// DELETE by join against a single-column id staging table.
pub fn delete_join(target: &str, staging_name: &str, id_column: &str, key: &str) -> String {
    format!(
        "DELETE originTab FROM {} as originTab inner join {} as tempTable on tempTable.{}=originTab.{};",
        target, staging_name, id_column, key
    )
}

/// DROP TABLE for staging cleanup.
pub fn drop_table(staging_name: &str) -> String {
    format!("DROP TABLE {} ;", staging_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{ColumnSpec, DataTable};
    use crate::typemap::ColumnKind;

    fn order_table(name: &str) -> DataTable {
        let mut table = DataTable::new(name);
        table
            .add_column(ColumnSpec::new("OrderId", ColumnKind::UniqueIdentifier))
            .unwrap();
        table
            .add_column(ColumnSpec::new("Amount", ColumnKind::Decimal))
            .unwrap();
        table
            .add_column(ColumnSpec::new("Notes", ColumnKind::Text))
            .unwrap();
        table.set_primary_key(["OrderId"]).unwrap();
        table
    }

    #[test]
    fn test_staging_names_are_prefixed_and_unique() {
        let a = staging_table_name();
        let b = staging_table_name();
        assert!(a.starts_with("temp_"));
        assert_ne!(a, b);
        assert!(delete_staging_table_name().starts_with("tempdelete_"));
    }

    #[test]
    fn test_create_staging_table_shape() {
        let table = order_table("Orders");
        let sql = create_staging_table(&table, "temp_X");
        assert_eq!(
            sql,
            "CREATE TABLE temp_X ( OrderId uniqueidentifier, Amount decimal(18, 2), \
             Notes varchar(max)) CREATE UNIQUE CLUSTERED INDEX temp_X ON temp_X (OrderId);"
        );
    }

    #[test]
    fn test_create_staging_table_key_text_column_is_bounded() {
        let mut table = DataTable::new("Tags");
        table
            .add_column(ColumnSpec::new("Tag", ColumnKind::Text))
            .unwrap();
        table.set_primary_key(["Tag"]).unwrap();
        let sql = create_staging_table(&table, "temp_Y");
        assert!(sql.contains("Tag varchar(450)"));
    }

    #[test]
    fn test_create_staging_table_without_key_has_no_index() {
        let mut table = DataTable::new("Plain");
        table
            .add_column(ColumnSpec::new("A", ColumnKind::Integer))
            .unwrap();
        let sql = create_staging_table(&table, "temp_Z");
        assert!(!sql.contains("CLUSTERED INDEX"));
    }

    #[test]
    fn test_update_from_staging_shape() {
        let table = order_table("Orders");
        let sql = update_from_staging(&table, "temp_X");
        assert_eq!(
            sql,
            "UPDATE Orders SET  Orders.OrderId = temp_X.OrderId,Orders.Amount = temp_X.Amount,\
             Orders.Notes = temp_X.Notes FROM Orders INNER JOIN temp_X ON temp_X.OrderId = Orders.OrderId"
        );
    }

    #[test]
    fn test_update_composite_key_joins_with_and() {
        let mut table = DataTable::new("Lines");
        table
            .add_column(ColumnSpec::new("OrderId", ColumnKind::UniqueIdentifier))
            .unwrap();
        table
            .add_column(ColumnSpec::new("LineNo", ColumnKind::Integer))
            .unwrap();
        table.set_primary_key(["OrderId", "LineNo"]).unwrap();
        let sql = update_from_staging(&table, "temp_X");
        assert!(sql.contains(
            "ON temp_X.OrderId = Lines.OrderId AND temp_X.LineNo = Lines.LineNo"
        ));
    }

    #[test]
    fn test_update_excludes_legacy_columns_on_order_items() {
        let mut table = DataTable::new("OrderItems");
        table
            .add_column(ColumnSpec::new("OrderItemId", ColumnKind::UniqueIdentifier))
            .unwrap();
        table
            .add_column(ColumnSpec::new("Monthly", ColumnKind::Boolean))
            .unwrap();
        table
            .add_column(ColumnSpec::new("Formatting", ColumnKind::Text))
            .unwrap();
        table
            .add_column(ColumnSpec::new("Price", ColumnKind::Decimal))
            .unwrap();
        table.set_primary_key(["OrderItemId"]).unwrap();

        let sql = update_from_staging(&table, "temp_X");
        assert!(!sql.contains("Monthly"));
        assert!(!sql.contains("Formatting"));
        assert!(sql.contains("OrderItems.Price = temp_X.Price"));
    }

    #[test]
    fn test_update_keeps_legacy_columns_on_other_tables() {
        let mut table = DataTable::new("Reports");
        table
            .add_column(ColumnSpec::new("ReportId", ColumnKind::UniqueIdentifier))
            .unwrap();
        table
            .add_column(ColumnSpec::new("Monthly", ColumnKind::Boolean))
            .unwrap();
        table.set_primary_key(["ReportId"]).unwrap();

        let sql = update_from_staging(&table, "temp_X");
        assert!(sql.contains("Reports.Monthly = temp_X.Monthly"));
    }

    #[test]
    fn test_delete_join_shape() {
        let sql = delete_join("Orders", "tempdelete_X", "BulkDeleteId", "OrderId");
        assert_eq!(
            sql,
            "DELETE originTab FROM Orders as originTab inner join tempdelete_X as tempTable \
             on tempTable.BulkDeleteId=originTab.OrderId;"
        );
    }

    #[test]
    fn test_drop_table_shape() {
        assert_eq!(drop_table("temp_X"), "DROP TABLE temp_X ;");
    }
}
