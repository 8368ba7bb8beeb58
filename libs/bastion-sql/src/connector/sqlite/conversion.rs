use crate::{
    ast::Value,
    error::{Error, ErrorKind},
};
use bastion_value::stringify_datetime;
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};

/// Binds a [`Value`] with its SQLite storage representation: booleans as
/// integers, dates as RFC 3339 text, decimals as text, JSON and lists as JSON
/// text.
pub(crate) struct SqliteParam<'a>(pub(crate) &'a Value);

impl ToSql for SqliteParam<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let output = match self.0 {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Boolean(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Value::Int(i) | Value::BigInt(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Decimal(d) => ToSqlOutput::Owned(SqlValue::Text(d.normalized().to_string())),
            Value::String(s) | Value::Enum(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::DateTime(dt) => ToSqlOutput::Owned(SqlValue::Text(stringify_datetime(dt))),
            Value::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b.as_slice())),
            Value::Json(json) => ToSqlOutput::Owned(SqlValue::Text(json.to_string())),
            Value::List(_) | Value::Object(_) => {
                let json = serde_json::to_string(self.0).map_err(|e| {
                    let error = Error::builder(ErrorKind::conversion(e.to_string())).build();
                    rusqlite::Error::ToSqlConversionFailure(Box::new(error))
                })?;

                ToSqlOutput::Owned(SqlValue::Text(json))
            }
        };

        Ok(output)
    }
}

/// Reads a column without schema knowledge. Typed conversion happens in the
/// query builders, which know the field types.
pub(crate) fn value_from_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Bytes(bytes.to_vec()),
    }
}
