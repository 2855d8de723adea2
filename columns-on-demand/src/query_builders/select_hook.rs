use crate::entity_metadata::RecordType;
use crate::raw;
use crate::types::{OnDemandError, OnDemandResult, Selection};
use sea_orm::sea_query::{Alias, Expr, SelectStatement};
use sea_orm::ColumnType;

/// The select list a bulk query ends up with
#[derive(Debug, Clone, PartialEq)]
pub enum SelectClause {
    /// The type's default selection, substituted for an unspecified or `*`
    /// selection. `sql` is the qualified column list.
    Default { sql: String, columns: Vec<String> },
    /// The caller's own columns, left as given
    Explicit(Vec<String>),
    /// Every column of a type that does not load anything on demand
    AllColumns(Vec<String>),
}

impl SelectClause {
    /// Names of the result columns, in select order
    pub fn column_names(&self) -> &[String] {
        match self {
            SelectClause::Default { columns, .. } => columns,
            SelectClause::Explicit(columns) | SelectClause::AllColumns(columns) => columns,
        }
    }

    pub fn apply(&self, stmt: &mut SelectStatement, table: &str) {
        match self {
            SelectClause::Default { sql, .. } => {
                stmt.expr(Expr::cust(sql.as_str()));
            }
            SelectClause::Explicit(columns) | SelectClause::AllColumns(columns) => {
                for column in columns {
                    stmt.column((Alias::new(table), Alias::new(column.as_str())));
                }
            }
        }
    }

    /// Column types for decoding, looked up in the type's schema
    pub fn column_types(&self, record_type: &RecordType) -> OnDemandResult<Vec<ColumnType>> {
        let schema = record_type.columns();
        self.column_names()
            .iter()
            .map(|name| {
                schema
                    .iter()
                    .find(|c| &c.name == name)
                    .map(|c| c.column_type.clone())
                    .ok_or_else(|| OnDemandError::unknown_column(record_type.name(), name))
            })
            .collect()
    }
}

/// Decide the select list of a bulk query.
///
/// Only an unspecified or wildcard selection (`*` or `<table>.*`) on a type
/// with on-demand columns is rewritten. An explicit list passes through
/// untouched, so naming a deferred column loads it eagerly for that query.
pub fn build_select(record_type: &RecordType, selection: &Selection) -> SelectClause {
    match selection {
        Selection::Columns(columns) if !is_table_wildcard(record_type, columns) => {
            SelectClause::Explicit(columns.clone())
        }
        _ if record_type.participates() => {
            let eager = record_type.eager_columns();
            let sql = raw::column_list(&eager.quoted, Some(&record_type.quoted_table_name()));
            SelectClause::Default {
                sql,
                columns: eager.names.clone(),
            }
        }
        _ => SelectClause::AllColumns(record_type.columns().into_iter().map(|c| c.name).collect()),
    }
}

// `docs.*` (or `"docs".*`) as the only column means the same as `*`
fn is_table_wildcard(record_type: &RecordType, columns: &[String]) -> bool {
    let [column] = columns else {
        return false;
    };
    match column.trim().strip_suffix(".*") {
        Some(table) => table.trim().trim_matches(|c| c == '"' || c == '`') == record_type.table_name(),
        None => false,
    }
}
