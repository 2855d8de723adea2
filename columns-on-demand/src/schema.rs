//! Schema information and column classification
//!
//! A record type reads its column list from a [`SchemaSource`]. The source is
//! owned by whatever knows the table layout: a sea-orm entity, a live
//! introspection of the database, or a hand-written list.

use parking_lot::RwLock;
use sea_orm::sea_query::StringLen;
use sea_orm::{
    ColumnTrait, ColumnType, ConnectionTrait, DbBackend, EntityTrait, IdenStatic, Iterable,
    Statement,
};
use std::marker::PhantomData;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }

    pub fn is_large(&self) -> bool {
        is_large_type(&self.column_type)
    }
}

/// Enumerates the columns of one table, in declaration order.
pub trait SchemaSource: Send + Sync {
    fn columns(&self) -> Vec<ColumnInfo>;
}

/// Binary and text columns are the ones worth leaving out of routine queries.
pub fn is_large_type(column_type: &ColumnType) -> bool {
    matches!(
        column_type,
        ColumnType::Text | ColumnType::Blob | ColumnType::Binary(_) | ColumnType::VarBinary(_)
    )
}

/// Decide which columns load on demand.
///
/// An explicit list wins and keeps its order (duplicates dropped). An empty
/// list selects every binary and text column in declaration order.
pub fn classify<S: AsRef<str>>(explicit: &[S], columns: &[ColumnInfo]) -> Vec<String> {
    let mut deferred: Vec<String> = Vec::new();
    if explicit.is_empty() {
        for column in columns.iter().filter(|c| c.is_large()) {
            deferred.push(column.name.clone());
        }
    } else {
        for name in explicit {
            let name = name.as_ref();
            if !deferred.iter().any(|d| d == name) {
                deferred.push(name.to_string());
            }
        }
    }
    deferred
}

/// Schema taken from a sea-orm entity definition
pub struct EntitySchema<E: EntityTrait> {
    _phantom: PhantomData<fn() -> E>,
}

impl<E: EntityTrait> EntitySchema<E> {
    pub fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<E: EntityTrait> Default for EntitySchema<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EntityTrait> SchemaSource for EntitySchema<E> {
    fn columns(&self) -> Vec<ColumnInfo> {
        E::Column::iter()
            .map(|column| ColumnInfo::new(column.as_str(), column.def().get_column_type().clone()))
            .collect()
    }
}

/// A shared, replaceable column list.
///
/// Clones share the same list, so a migration step can `replace` or `refresh`
/// it while record types keep reading through their own handle.
#[derive(Clone, Default)]
pub struct ColumnSet {
    columns: Arc<RwLock<Vec<ColumnInfo>>>,
}

impl ColumnSet {
    pub fn new(columns: Vec<ColumnInfo>) -> Self {
        Self {
            columns: Arc::new(RwLock::new(columns)),
        }
    }

    pub fn replace(&self, columns: Vec<ColumnInfo>) {
        *self.columns.write() = columns;
    }

    /// Read the live layout of a SQLite table
    pub async fn introspect<C: ConnectionTrait>(
        conn: &C,
        table: &str,
    ) -> Result<Self, sea_orm::DbErr> {
        Ok(Self::new(sqlite_table_columns(conn, table).await?))
    }

    /// Re-read the layout after a migration
    pub async fn refresh<C: ConnectionTrait>(
        &self,
        conn: &C,
        table: &str,
    ) -> Result<(), sea_orm::DbErr> {
        let columns = sqlite_table_columns(conn, table).await?;
        self.replace(columns);
        Ok(())
    }
}

impl SchemaSource for ColumnSet {
    fn columns(&self) -> Vec<ColumnInfo> {
        self.columns.read().clone()
    }
}

async fn sqlite_table_columns<C: ConnectionTrait>(
    conn: &C,
    table: &str,
) -> Result<Vec<ColumnInfo>, sea_orm::DbErr> {
    let stmt = Statement::from_sql_and_values(
        DbBackend::Sqlite,
        "SELECT name, type FROM pragma_table_info(?) ORDER BY cid",
        [table.into()],
    );
    let rows = conn.query_all(stmt).await?;
    let mut columns = Vec::with_capacity(rows.len());
    for row in rows {
        let name: String = row.try_get("", "name")?;
        let decl: String = row.try_get("", "type")?;
        columns.push(ColumnInfo::new(name, column_type_from_decl(&decl)));
    }
    Ok(columns)
}

/// Map a SQLite declared type onto a logical column type, following SQLite's
/// affinity rules plus the common spellings of blob and text columns.
pub fn column_type_from_decl(decl: &str) -> ColumnType {
    let decl = decl.to_ascii_uppercase();
    if decl.is_empty() || decl.contains("BLOB") || decl.contains("BINARY") {
        ColumnType::Blob
    } else if decl.contains("BOOL") {
        ColumnType::Boolean
    } else if decl.contains("BIGINT") {
        ColumnType::BigInteger
    } else if decl.contains("INT") {
        ColumnType::Integer
    } else if decl.contains("TEXT") || decl.contains("CLOB") {
        ColumnType::Text
    } else if decl.contains("CHAR") {
        ColumnType::String(StringLen::None)
    } else if decl.contains("REAL") || decl.contains("FLOA") || decl.contains("DOUB") {
        ColumnType::Double
    } else if decl.contains("JSON") {
        ColumnType::Json
    } else {
        // datetimes, numerics and anything else arrive as text in SQLite
        ColumnType::String(StringLen::None)
    }
}
