//! Type mapping between SQL Server native types, semantic column kinds,
//! and staging-table DDL types.

use tiberius::ColumnType;

/// Semantic column type used by the in-memory tabular structure.
///
/// This is a closed enumeration: [`ColumnKind::from_native`] maps every
/// native type name onto it, defaulting to `Text` for anything outside the
/// recognized set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    UniqueIdentifier,
    Integer,
    Date,
    Timestamp,
    Decimal,
    Float,
    Duration,
    Binary,
    Boolean,
    Text,
}

impl ColumnKind {
    /// Map a SQL Server native type name to a semantic kind.
    ///
    /// The recognized set is deliberately narrow: wider native types
    /// (`bigint`, `datetime2`, `nvarchar`, ...) all degrade to `Text` and
    /// round-trip through string accessors.
    pub fn from_native(native: &str) -> Self {
        match native.to_lowercase().as_str() {
            "uniqueidentifier" => ColumnKind::UniqueIdentifier,
            "int" => ColumnKind::Integer,
            "date" => ColumnKind::Date,
            "datetime" => ColumnKind::Timestamp,
            "decimal" => ColumnKind::Decimal,
            "float" => ColumnKind::Float,
            "varbinary" => ColumnKind::Binary,
            "bit" => ColumnKind::Boolean,
            _ => ColumnKind::Text,
        }
    }

    /// DDL type used when this kind is mirrored into a staging table.
    ///
    /// Key columns fall back to `varchar(450)` instead of `varchar(max)` so
    /// they stay indexable by the unique clustered index.
    pub fn staging_type(&self, key: bool) -> &'static str {
        match self {
            ColumnKind::UniqueIdentifier => "uniqueidentifier",
            ColumnKind::Integer => "int",
            ColumnKind::Date | ColumnKind::Timestamp => "datetime",
            ColumnKind::Decimal => "decimal(18, 2)",
            ColumnKind::Duration => "time(7)",
            ColumnKind::Float => "float",
            _ => {
                if key {
                    "varchar(450)"
                } else {
                    "varchar(max)"
                }
            }
        }
    }
}

/// Native type name for a TDS result-set column type.
///
/// The wire protocol reports encoded type tokens; this recovers the name the
/// server-side catalog would use, which then feeds [`ColumnKind::from_native`].
pub fn native_type_name(col_type: ColumnType) -> &'static str {
    match col_type {
        ColumnType::Guid => "uniqueidentifier",
        ColumnType::Int1 => "tinyint",
        ColumnType::Int2 => "smallint",
        ColumnType::Int4 | ColumnType::Intn => "int",
        ColumnType::Int8 => "bigint",
        ColumnType::Bit | ColumnType::Bitn => "bit",
        ColumnType::Float4 => "real",
        ColumnType::Float8 | ColumnType::Floatn => "float",
        ColumnType::Money | ColumnType::Money4 => "money",
        ColumnType::Datetime | ColumnType::Datetime4 | ColumnType::Datetimen => "datetime",
        ColumnType::Datetime2 => "datetime2",
        ColumnType::Daten => "date",
        ColumnType::Timen => "time",
        ColumnType::DatetimeOffsetn => "datetimeoffset",
        ColumnType::Decimaln => "decimal",
        ColumnType::Numericn => "numeric",
        ColumnType::BigVarBin => "varbinary",
        ColumnType::BigBinary => "binary",
        ColumnType::Image => "image",
        ColumnType::BigVarChar => "varchar",
        ColumnType::BigChar => "char",
        ColumnType::NVarchar => "nvarchar",
        ColumnType::NChar => "nchar",
        ColumnType::Text => "text",
        ColumnType::NText => "ntext",
        ColumnType::Xml => "xml",
        _ => "sql_variant",
    }
}
