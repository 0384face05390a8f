//! Typed SQL values moved between records, tabular structures, and the
//! TDS bulk-load stream.

use crate::typemap::ColumnKind;
use chrono::Timelike;
use std::borrow::Cow;
use tiberius::ColumnData;
use tracing::warn;

/// SQL value enum for type-safe row handling.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null(SqlNullType),
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    Decimal(rust_decimal::Decimal),
    DateTime(chrono::NaiveDateTime),
    Date(chrono::NaiveDate),
    Time(chrono::NaiveTime),
}

/// Type hint for NULL values so the bulk stream encodes the right token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlNullType {
    Bool,
    I32,
    I64,
    F32,
    F64,
    String,
    Bytes,
    Uuid,
    Decimal,
    DateTime,
    Date,
    Time,
}

impl SqlValue {
    /// NULL of the natural wire type for a semantic column kind.
    pub fn null_for(kind: ColumnKind) -> Self {
        SqlValue::Null(match kind {
            ColumnKind::UniqueIdentifier => SqlNullType::Uuid,
            ColumnKind::Integer => SqlNullType::I32,
            ColumnKind::Date => SqlNullType::Date,
            ColumnKind::Timestamp => SqlNullType::DateTime,
            ColumnKind::Decimal => SqlNullType::Decimal,
            ColumnKind::Float => SqlNullType::F64,
            ColumnKind::Duration => SqlNullType::Time,
            ColumnKind::Binary => SqlNullType::Bytes,
            ColumnKind::Boolean => SqlNullType::Bool,
            ColumnKind::Text => SqlNullType::String,
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null(_))
    }
}

/// Convert a value to tiberius `ColumnData` for a bulk-load token row.
pub(crate) fn to_column_data(value: &SqlValue) -> ColumnData<'static> {
    match value {
        SqlValue::Null(null_type) => match null_type {
            SqlNullType::Bool => ColumnData::Bit(None),
            SqlNullType::I32 => ColumnData::I32(None),
            SqlNullType::I64 => ColumnData::I64(None),
            SqlNullType::F32 => ColumnData::F32(None),
            SqlNullType::F64 => ColumnData::F64(None),
            SqlNullType::String => ColumnData::String(None),
            SqlNullType::Bytes => ColumnData::Binary(None),
            SqlNullType::Uuid => ColumnData::Guid(None),
            SqlNullType::Decimal => ColumnData::Numeric(None),
            SqlNullType::DateTime => ColumnData::DateTime2(None),
            // Date maps to datetime2 for bulk insert compatibility
            SqlNullType::Date => ColumnData::DateTime2(None),
            SqlNullType::Time => ColumnData::Time(None),
        },
        SqlValue::Bool(b) => ColumnData::Bit(Some(*b)),
        SqlValue::I32(i) => ColumnData::I32(Some(*i)),
        SqlValue::I64(i) => ColumnData::I64(Some(*i)),
        SqlValue::F32(f) => {
            if f.is_nan() || f.is_infinite() {
                // MSSQL doesn't support NaN/Infinity
                warn!("Converting F32 NaN/Infinity to NULL");
                ColumnData::F32(None)
            } else {
                ColumnData::F32(Some(*f))
            }
        }
        SqlValue::F64(f) => {
            if f.is_nan() || f.is_infinite() {
                warn!("Converting F64 NaN/Infinity to NULL");
                ColumnData::F64(None)
            } else {
                ColumnData::F64(Some(*f))
            }
        }
        SqlValue::String(s) => ColumnData::String(Some(Cow::Owned(s.clone()))),
        SqlValue::Bytes(b) => ColumnData::Binary(Some(Cow::Owned(b.clone()))),
        SqlValue::Uuid(u) => ColumnData::Guid(Some(*u)),
        SqlValue::Decimal(d) => {
            // Tiberius Numeric uses an i128 mantissa with scale
            let scale = d.scale() as u8;
            let mantissa = d.mantissa();
            ColumnData::Numeric(Some(tiberius::numeric::Numeric::new_with_scale(
                mantissa, scale,
            )))
        }
        SqlValue::DateTime(dt) => datetime2_column_data(dt.date(), dt.time()),
        SqlValue::Date(d) => {
            // DateTime2 with midnight time; the DATE wire type has
            // serialization issues in bulk insert.
            datetime2_column_data(*d, chrono::NaiveTime::MIN)
        }
        SqlValue::Time(t) => ColumnData::Time(Some(tiberius::time::Time::new(
            time_increments(t),
            7,
        ))),
    }
}

/// Encode a date + time as a DateTime2 token (days since year 1, time at
/// scale 7 = 100ns increments). Out-of-range dates become NULL.
fn datetime2_column_data(date: chrono::NaiveDate, time: chrono::NaiveTime) -> ColumnData<'static> {
    let epoch = chrono::NaiveDate::from_ymd_opt(1, 1, 1).unwrap();
    let days_i64 = (date - epoch).num_days();
    if days_i64 < 0 || days_i64 > u32::MAX as i64 {
        warn!(
            "DateTime out of valid range (days={}), converting to NULL",
            days_i64
        );
        return ColumnData::DateTime2(None);
    }
    let tds_date = tiberius::time::Date::new(days_i64 as u32);
    let tds_time = tiberius::time::Time::new(time_increments(&time), 7);
    ColumnData::DateTime2(Some(tiberius::time::DateTime2::new(tds_date, tds_time)))
}

fn time_increments(time: &chrono::NaiveTime) -> u64 {
    let nanos =
        time.num_seconds_from_midnight() as u64 * 1_000_000_000 + time.nanosecond() as u64;
    nanos / 100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nan_converts_to_null() {
        assert!(matches!(
            to_column_data(&SqlValue::F64(f64::NAN)),
            ColumnData::F64(None)
        ));
        assert!(matches!(
            to_column_data(&SqlValue::F32(f32::INFINITY)),
            ColumnData::F32(None)
        ));
    }

    #[test]
    fn test_null_hints_encode_expected_tokens() {
        assert!(matches!(
            to_column_data(&SqlValue::Null(SqlNullType::Bool)),
            ColumnData::Bit(None)
        ));
        assert!(matches!(
            to_column_data(&SqlValue::Null(SqlNullType::Date)),
            ColumnData::DateTime2(None)
        ));
        assert!(matches!(
            to_column_data(&SqlValue::Null(SqlNullType::Uuid)),
            ColumnData::Guid(None)
        ));
    }

    #[test]
    fn test_basic_values() {
        assert!(matches!(
            to_column_data(&SqlValue::Bool(true)),
            ColumnData::Bit(Some(true))
        ));
        assert!(matches!(
            to_column_data(&SqlValue::I32(42)),
            ColumnData::I32(Some(42))
        ));
        if let ColumnData::String(Some(s)) = to_column_data(&SqlValue::String("abc".into())) {
            assert_eq!(s.as_ref(), "abc");
        } else {
            panic!("expected String column data");
        }
    }

    #[test]
    fn test_date_before_year_one_becomes_null() {
        let d = chrono::NaiveDate::from_ymd_opt(-1, 1, 1).unwrap();
        assert!(matches!(
            to_column_data(&SqlValue::Date(d)),
            ColumnData::DateTime2(None)
        ));
    }

    #[test]
    fn test_null_for_matches_kind() {
        assert_eq!(
            SqlValue::null_for(ColumnKind::Integer),
            SqlValue::Null(SqlNullType::I32)
        );
        assert_eq!(
            SqlValue::null_for(ColumnKind::Text),
            SqlValue::Null(SqlNullType::String)
        );
    }
}
