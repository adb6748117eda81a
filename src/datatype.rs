// used for persistence
use rusqlite::types::{FromSqlError, FromSqlResult, Value, ValueRef};

// used for timestamps in the database
use chrono::{DateTime, Utc};

// used to print out readable forms of a data type
use std::fmt;

/// The storage-level kinds a mapped field can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Int64,
    Int32,
    Bool,
    Double,
    Text,
    Bytes,
    Timestamp,
}

impl DataType {
    /// The column type used in `CREATE TABLE` and `ALTER TABLE` statements.
    pub fn affinity(&self) -> &'static str {
        match self {
            DataType::Int64 | DataType::Int32 | DataType::Bool | DataType::Timestamp => "INTEGER",
            DataType::Double => "REAL",
            DataType::Text => "TEXT",
            DataType::Bytes => "BLOB",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Int64 => "Int64",
            DataType::Int32 => "Int32",
            DataType::Bool => "Bool",
            DataType::Double => "Double",
            DataType::Text => "Text",
            DataType::Bytes => "Bytes",
            DataType::Timestamp => "Timestamp",
        };
        write!(f, "{}", name)
    }
}

/// A Rust type that can live in a mapped column.
///
/// Decoding is lenient about `NULL`: plain types fall back to their zero value
/// and `Option` types to `None`, so rows written by older schema versions (with
/// columns added later) still materialize.
pub trait ColumnValue: Sized + 'static {
    // static stuff which needs to be implemented downstream
    const DATA_TYPE: DataType;
    fn to_value(&self) -> Value;
    fn from_value(value: ValueRef<'_>) -> FromSqlResult<Self>;
    // instance callable with pre-made implementation
    fn data_type(&self) -> DataType {
        Self::DATA_TYPE
    }
}

fn integer(value: ValueRef<'_>) -> FromSqlResult<Option<i64>> {
    match value {
        ValueRef::Null => Ok(None),
        ValueRef::Integer(i) => Ok(Some(i)),
        ValueRef::Real(f) => Ok(Some(f as i64)),
        _ => Err(FromSqlError::InvalidType),
    }
}

fn real(value: ValueRef<'_>) -> FromSqlResult<Option<f64>> {
    match value {
        ValueRef::Null => Ok(None),
        ValueRef::Real(f) => Ok(Some(f)),
        ValueRef::Integer(i) => Ok(Some(i as f64)),
        _ => Err(FromSqlError::InvalidType),
    }
}

fn timestamp(millis: i64) -> FromSqlResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(millis).ok_or(FromSqlError::OutOfRange(millis))
}

// ------------- Integers -------------
impl ColumnValue for i64 {
    const DATA_TYPE: DataType = DataType::Int64;
    fn to_value(&self) -> Value {
        Value::Integer(*self)
    }
    fn from_value(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(integer(value)?.unwrap_or_default())
    }
}
impl ColumnValue for Option<i64> {
    const DATA_TYPE: DataType = DataType::Int64;
    fn to_value(&self) -> Value {
        self.map_or(Value::Null, Value::Integer)
    }
    fn from_value(value: ValueRef<'_>) -> FromSqlResult<Self> {
        integer(value)
    }
}
impl ColumnValue for i32 {
    const DATA_TYPE: DataType = DataType::Int32;
    fn to_value(&self) -> Value {
        Value::Integer(i64::from(*self))
    }
    fn from_value(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let i = integer(value)?.unwrap_or_default();
        i32::try_from(i).map_err(|_| FromSqlError::OutOfRange(i))
    }
}
impl ColumnValue for bool {
    const DATA_TYPE: DataType = DataType::Bool;
    fn to_value(&self) -> Value {
        Value::Integer(i64::from(*self))
    }
    fn from_value(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(integer(value)?.is_some_and(|i| i != 0))
    }
}

// ------------- Reals -------------
impl ColumnValue for f64 {
    const DATA_TYPE: DataType = DataType::Double;
    fn to_value(&self) -> Value {
        Value::Real(*self)
    }
    fn from_value(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(real(value)?.unwrap_or_default())
    }
}
impl ColumnValue for Option<f64> {
    const DATA_TYPE: DataType = DataType::Double;
    fn to_value(&self) -> Value {
        self.map_or(Value::Null, Value::Real)
    }
    fn from_value(value: ValueRef<'_>) -> FromSqlResult<Self> {
        real(value)
    }
}

// ------------- Text -------------
impl ColumnValue for String {
    const DATA_TYPE: DataType = DataType::Text;
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }
    fn from_value(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Null => Ok(String::new()),
            other => other.as_str().map(String::from),
        }
    }
}
impl ColumnValue for Option<String> {
    const DATA_TYPE: DataType = DataType::Text;
    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, |s| Value::Text(s.clone()))
    }
    fn from_value(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Null => Ok(None),
            other => other.as_str().map(|s| Some(String::from(s))),
        }
    }
}

// ------------- Bytes -------------
impl ColumnValue for Vec<u8> {
    const DATA_TYPE: DataType = DataType::Bytes;
    fn to_value(&self) -> Value {
        Value::Blob(self.clone())
    }
    fn from_value(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Null => Ok(Vec::new()),
            other => other.as_blob().map(<[u8]>::to_vec),
        }
    }
}
impl ColumnValue for Option<Vec<u8>> {
    const DATA_TYPE: DataType = DataType::Bytes;
    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, |b| Value::Blob(b.clone()))
    }
    fn from_value(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Null => Ok(None),
            other => other.as_blob().map(|b| Some(b.to_vec())),
        }
    }
}

// ------------- Time -------------
// stored as milliseconds since the epoch
impl ColumnValue for DateTime<Utc> {
    const DATA_TYPE: DataType = DataType::Timestamp;
    fn to_value(&self) -> Value {
        Value::Integer(self.timestamp_millis())
    }
    fn from_value(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match integer(value)? {
            Some(millis) => timestamp(millis),
            None => Ok(DateTime::<Utc>::default()),
        }
    }
}
impl ColumnValue for Option<DateTime<Utc>> {
    const DATA_TYPE: DataType = DataType::Timestamp;
    fn to_value(&self) -> Value {
        self.map_or(Value::Null, |t| Value::Integer(t.timestamp_millis()))
    }
    fn from_value(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match integer(value)? {
            Some(millis) if millis > 0 => timestamp(millis).map(Some),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nulls_decode_to_defaults() {
        assert_eq!(i64::from_value(ValueRef::Null).unwrap(), 0);
        assert_eq!(i32::from_value(ValueRef::Null).unwrap(), 0);
        assert!(!bool::from_value(ValueRef::Null).unwrap());
        assert_eq!(f64::from_value(ValueRef::Null).unwrap(), 0.0);
        assert_eq!(String::from_value(ValueRef::Null).unwrap(), "");
        assert!(Option::<String>::from_value(ValueRef::Null).unwrap().is_none());
        assert!(Option::<Vec<u8>>::from_value(ValueRef::Null).unwrap().is_none());
    }

    #[test]
    fn non_positive_timestamps_are_absent() {
        assert!(Option::<DateTime<Utc>>::from_value(ValueRef::Integer(0)).unwrap().is_none());
        assert!(Option::<DateTime<Utc>>::from_value(ValueRef::Integer(-5)).unwrap().is_none());
        let t = Option::<DateTime<Utc>>::from_value(ValueRef::Integer(1_700_000_000_123))
            .unwrap()
            .expect("timestamp");
        assert_eq!(t.timestamp_millis(), 1_700_000_000_123);
        assert_eq!(t.to_value(), Value::Integer(1_700_000_000_123));
    }

    #[test]
    fn narrow_integers_reject_overflow() {
        assert!(i32::from_value(ValueRef::Integer(i64::MAX)).is_err());
        assert_eq!(i32::from_value(ValueRef::Integer(-7)).unwrap(), -7);
    }

    #[test]
    fn affinities_follow_storage_classes() {
        assert_eq!(DataType::Bool.affinity(), "INTEGER");
        assert_eq!(DataType::Timestamp.affinity(), "INTEGER");
        assert_eq!(DataType::Double.affinity(), "REAL");
        assert_eq!(DataType::Text.affinity(), "TEXT");
        assert_eq!(DataType::Bytes.affinity(), "BLOB");
    }
}
