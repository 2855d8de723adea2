use async_trait::async_trait;
use sea_orm::{
    ColumnType, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, DbErr,
    QueryResult, Statement, Value,
};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// The slice of a connection the on-demand machinery needs: run a SELECT and
/// hand back rows as ordered value lists.
///
/// Column types drive decoding, one per selected column in select order.
#[async_trait]
pub trait SelectRows: Send + Sync {
    fn backend(&self) -> DbBackend;

    async fn select_rows(
        &self,
        stmt: Statement,
        column_types: &[ColumnType],
    ) -> Result<Vec<Vec<Value>>, DbErr>;
}

#[async_trait]
impl SelectRows for DatabaseConnection {
    fn backend(&self) -> DbBackend {
        self.get_database_backend()
    }

    async fn select_rows(
        &self,
        stmt: Statement,
        column_types: &[ColumnType],
    ) -> Result<Vec<Vec<Value>>, DbErr> {
        let rows = self.query_all(stmt).await?;
        let backend = self.get_database_backend();
        rows.iter()
            .map(|row| decode_row(backend, row, column_types))
            .collect()
    }
}

#[async_trait]
impl SelectRows for DatabaseTransaction {
    fn backend(&self) -> DbBackend {
        self.get_database_backend()
    }

    async fn select_rows(
        &self,
        stmt: Statement,
        column_types: &[ColumnType],
    ) -> Result<Vec<Vec<Value>>, DbErr> {
        let rows = self.query_all(stmt).await?;
        let backend = self.get_database_backend();
        rows.iter()
            .map(|row| decode_row(backend, row, column_types))
            .collect()
    }
}

#[async_trait]
impl<'r, T: SelectRows + ?Sized> SelectRows for &'r T {
    fn backend(&self) -> DbBackend {
        (**self).backend()
    }

    async fn select_rows(
        &self,
        stmt: Statement,
        column_types: &[ColumnType],
    ) -> Result<Vec<Vec<Value>>, DbErr> {
        (**self).select_rows(stmt, column_types).await
    }
}

// Transactions are not `Clone`; share one behind an `Arc` instead
#[async_trait]
impl<T: SelectRows + ?Sized> SelectRows for Arc<T> {
    fn backend(&self) -> DbBackend {
        (**self).backend()
    }

    async fn select_rows(
        &self,
        stmt: Statement,
        column_types: &[ColumnType],
    ) -> Result<Vec<Vec<Value>>, DbErr> {
        (**self).select_rows(stmt, column_types).await
    }
}

/// Decode a row positionally
pub fn decode_row(
    backend: DbBackend,
    row: &QueryResult,
    column_types: &[ColumnType],
) -> Result<Vec<Value>, DbErr> {
    column_types
        .iter()
        .enumerate()
        .map(|(idx, ty)| Storage::of(backend, ty).decode(row, idx))
        .collect()
}

/// The NULL a column of `column_type` decodes to on `backend`
pub fn null_value(backend: DbBackend, column_type: &ColumnType) -> Value {
    Storage::of(backend, column_type).null()
}

/// Rust type a column is read into.
///
/// Postgres and MySQL only decode into the exact width the server reports.
/// SQLite stores every integer as i64, every real as f64 and dates, decimals
/// and JSON as text; booleans stay integers there and are cast afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Storage {
    Bytes,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Bool,
    Uuid,
    Json,
    Decimal,
    Date,
    Time,
    DateTime,
    DateTimeTz,
    Text,
}

impl Storage {
    fn of(backend: DbBackend, column_type: &ColumnType) -> Self {
        use ColumnType as T;
        if backend == DbBackend::Sqlite {
            return match column_type {
                T::Blob | T::Binary(_) | T::VarBinary(_) => Storage::Bytes,
                T::TinyInteger
                | T::SmallInteger
                | T::Integer
                | T::BigInteger
                | T::TinyUnsigned
                | T::SmallUnsigned
                | T::Unsigned
                | T::BigUnsigned
                | T::Boolean => Storage::I64,
                T::Float | T::Double => Storage::F64,
                _ => Storage::Text,
            };
        }
        let mysql = backend == DbBackend::MySql;
        match column_type {
            T::Blob | T::Binary(_) | T::VarBinary(_) => Storage::Bytes,
            T::TinyInteger if mysql => Storage::I8,
            T::TinyInteger | T::SmallInteger => Storage::I16,
            T::Integer => Storage::I32,
            T::BigInteger => Storage::I64,
            T::TinyUnsigned if mysql => Storage::U8,
            T::SmallUnsigned if mysql => Storage::U16,
            T::Unsigned if mysql => Storage::U32,
            T::BigUnsigned if mysql => Storage::U64,
            // Postgres has no unsigned types; sea-orm widens them to the next signed size
            T::TinyUnsigned => Storage::I16,
            T::SmallUnsigned => Storage::I32,
            T::Unsigned | T::BigUnsigned => Storage::I64,
            T::Float => Storage::F32,
            T::Double => Storage::F64,
            T::Boolean => Storage::Bool,
            T::Uuid => Storage::Uuid,
            T::Json | T::JsonBinary => Storage::Json,
            T::Decimal(_) | T::Money(_) => Storage::Decimal,
            T::Date => Storage::Date,
            T::Time => Storage::Time,
            T::DateTime | T::Timestamp => Storage::DateTime,
            T::TimestampWithTimeZone => Storage::DateTimeTz,
            _ => Storage::Text,
        }
    }

    fn decode(self, row: &QueryResult, idx: usize) -> Result<Value, DbErr> {
        let value: Value = match self {
            Storage::Bytes => row.try_get_by_index::<Option<Vec<u8>>>(idx)?.into(),
            Storage::I8 => row.try_get_by_index::<Option<i8>>(idx)?.into(),
            Storage::I16 => row.try_get_by_index::<Option<i16>>(idx)?.into(),
            Storage::I32 => row.try_get_by_index::<Option<i32>>(idx)?.into(),
            Storage::I64 => row.try_get_by_index::<Option<i64>>(idx)?.into(),
            Storage::U8 => row.try_get_by_index::<Option<u8>>(idx)?.into(),
            Storage::U16 => row.try_get_by_index::<Option<u16>>(idx)?.into(),
            Storage::U32 => row.try_get_by_index::<Option<u32>>(idx)?.into(),
            Storage::U64 => row.try_get_by_index::<Option<u64>>(idx)?.into(),
            Storage::F32 => row.try_get_by_index::<Option<f32>>(idx)?.into(),
            Storage::F64 => row.try_get_by_index::<Option<f64>>(idx)?.into(),
            Storage::Bool => row.try_get_by_index::<Option<bool>>(idx)?.into(),
            Storage::Uuid => row.try_get_by_index::<Option<Uuid>>(idx)?.into(),
            Storage::Json => row.try_get_by_index::<Option<serde_json::Value>>(idx)?.into(),
            Storage::Decimal => row.try_get_by_index::<Option<Decimal>>(idx)?.into(),
            Storage::Date => row.try_get_by_index::<Option<NaiveDate>>(idx)?.into(),
            Storage::Time => row.try_get_by_index::<Option<NaiveTime>>(idx)?.into(),
            Storage::DateTime => row.try_get_by_index::<Option<NaiveDateTime>>(idx)?.into(),
            Storage::DateTimeTz => row
                .try_get_by_index::<Option<DateTime<FixedOffset>>>(idx)?
                .into(),
            Storage::Text => row.try_get_by_index::<Option<String>>(idx)?.into(),
        };
        Ok(value)
    }

    fn null(self) -> Value {
        match self {
            Storage::Bytes => Value::Bytes(None),
            Storage::I8 => Value::TinyInt(None),
            Storage::I16 => Value::SmallInt(None),
            Storage::I32 => Value::Int(None),
            Storage::I64 => Value::BigInt(None),
            Storage::U8 => Value::TinyUnsigned(None),
            Storage::U16 => Value::SmallUnsigned(None),
            Storage::U32 => Value::Unsigned(None),
            Storage::U64 => Value::BigUnsigned(None),
            Storage::F32 => Value::Float(None),
            Storage::F64 => Value::Double(None),
            Storage::Bool => Value::Bool(None),
            Storage::Uuid => Value::Uuid(None),
            Storage::Json => Value::Json(None),
            Storage::Decimal => Value::Decimal(None),
            Storage::Date => Value::ChronoDate(None),
            Storage::Time => Value::ChronoTime(None),
            Storage::DateTime => Value::ChronoDateTime(None),
            Storage::DateTimeTz => Value::ChronoDateTimeWithTimeZone(None),
            Storage::Text => Value::String(None),
        }
    }
}
