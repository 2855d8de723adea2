use crate::entity_metadata::RecordType;
use crate::key_types::RecordKey;
use crate::query_builders::connection_like::SelectRows;
use crate::query_builders::select_hook::build_select;
use crate::record::{LazyRecord, Record};
use crate::types::{OnDemandError, OnDemandResult, Selection};
use sea_orm::sea_query::{Alias, Expr, Query};
use sea_orm::{ColumnType, Order, Statement, Value};
use std::sync::Arc;

/// Query builder for loading records of one type
pub struct FindQueryBuilder<C: SelectRows + Clone> {
    pub record_type: Arc<RecordType>,
    pub conn: C,
    pub selection: Selection,
    pub conditions: Vec<(String, Value)>,
    pub order_by: Vec<(String, Order)>,
    pub limit: Option<u64>,
}

impl<C: SelectRows + Clone> FindQueryBuilder<C> {
    pub fn new(record_type: Arc<RecordType>, conn: C) -> Self {
        Self {
            record_type,
            conn,
            selection: Selection::Unspecified,
            conditions: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }

    /// Pick the columns to select. Naming a deferred column loads it eagerly.
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selection = Selection::columns(columns);
        self
    }

    /// Like [`select`](Self::select), from a comma-separated list
    pub fn select_list(mut self, list: &str) -> Self {
        self.selection = Selection::parse(list);
        self
    }

    /// `SELECT *`, which still resolves to the default selection
    pub fn select_all(mut self) -> Self {
        self.selection = Selection::Wildcard;
        self
    }

    pub fn filter_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((column.into(), value.into()));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, order: Order) -> Self {
        self.order_by.push((column.into(), order));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Build the statement along with the result column names and types
    pub fn build(&self) -> OnDemandResult<(Statement, Vec<String>, Vec<ColumnType>)> {
        let record_type = &self.record_type;
        let table = record_type.table_name();
        let clause = build_select(record_type, &self.selection);
        let column_types = clause.column_types(record_type)?;

        let mut stmt = Query::select();
        stmt.from(Alias::new(table));
        clause.apply(&mut stmt, table);

        if let Some(sti) = record_type.sti() {
            stmt.and_where(
                Expr::col((Alias::new(table), Alias::new(sti.column.as_str()))).eq(sti.value.as_str()),
            );
        }
        for (column, value) in &self.conditions {
            if record_type.column_type(column).is_none() {
                return Err(OnDemandError::unknown_column(record_type.name(), column));
            }
            stmt.and_where(Expr::col((Alias::new(table), Alias::new(column.as_str()))).eq(value.clone()));
        }
        for (column, order) in &self.order_by {
            stmt.order_by((Alias::new(table), Alias::new(column.as_str())), order.clone());
        }
        if let Some(limit) = self.limit {
            stmt.limit(limit);
        }

        let statement = self.conn.backend().build(&stmt);
        Ok((statement, clause.column_names().to_vec(), column_types))
    }

    /// Execute the query and return all matching records
    pub async fn exec(self) -> OnDemandResult<Vec<LazyRecord<C>>> {
        let (stmt, names, column_types) = self.build()?;
        log::debug!("{} load: {}", self.record_type.name(), stmt);
        let rows = self.conn.select_rows(stmt, &column_types).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let record = Record::from_row(Arc::clone(&self.record_type), &names, &column_types, row);
                LazyRecord::new(record, self.conn.clone())
            })
            .collect())
    }

    /// Execute the query and return a single result, ordered by primary key
    /// unless an order was given
    pub async fn first(mut self) -> OnDemandResult<Option<LazyRecord<C>>> {
        if self.order_by.is_empty() {
            self.order_by
                .push((self.record_type.primary_key().to_string(), Order::Asc));
        }
        self.limit = Some(1);
        Ok(self.exec().await?.into_iter().next())
    }
}

impl RecordType {
    /// Start a query over this type
    pub fn find<C: SelectRows + Clone>(self: &Arc<Self>, conn: C) -> FindQueryBuilder<C> {
        FindQueryBuilder::new(Arc::clone(self), conn)
    }

    /// Load one record by primary key with the default selection
    pub async fn find_by_id<C: SelectRows + Clone>(
        self: &Arc<Self>,
        conn: C,
        id: impl Into<RecordKey>,
    ) -> OnDemandResult<LazyRecord<C>> {
        let id = id.into();
        self.find(conn)
            .filter_eq(self.primary_key(), id.to_db_value())
            .first()
            .await?
            .ok_or_else(|| OnDemandError::record_not_found(self.name(), &id))
    }

    /// An unsaved record bound to `conn`. Nothing about it loads on demand.
    pub fn new_record<C: SelectRows + Clone>(self: &Arc<Self>, conn: C) -> LazyRecord<C> {
        LazyRecord::new(Record::new_record(Arc::clone(self)), conn)
    }
}
