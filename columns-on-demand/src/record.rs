//! Records and on-demand loading
//!
//! [`Record`] is a plain row: a type descriptor plus whatever attributes the
//! query selected. [`LazyRecord`] wraps it with a connection and a
//! [`LoadTracker`] and fetches deferred columns the first time any read path
//! touches them.

use crate::attributes::AttributeSet;
use crate::entity_metadata::{RecordType, Sti};
use crate::key_types::RecordKey;
use crate::query_builders::connection_like::{null_value, SelectRows};
use crate::types::{OnDemandError, OnDemandResult, WritePolicy};
use async_trait::async_trait;
use sea_orm::sea_query::{Alias, Expr, Query};
use sea_orm::{ColumnType, Value};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

/// Deferred columns that have been fetched for one record instance.
///
/// Membership, not the fetched value, marks a column loaded: a NULL or empty
/// value is just as loaded as any other.
#[derive(Debug, Clone, Default)]
pub struct LoadTracker {
    loaded: HashSet<String>,
}

impl LoadTracker {
    pub fn contains(&self, name: &str) -> bool {
        self.loaded.contains(name)
    }

    pub fn mark(&mut self, name: &str) {
        self.loaded.insert(name.to_string());
    }

    pub fn clear(&mut self) {
        self.loaded.clear();
    }

    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }
}

/// A row as selected, with no loading behaviour of its own
#[derive(Debug, Clone)]
pub struct Record {
    record_type: Arc<RecordType>,
    attributes: AttributeSet,
    new_record: bool,
}

impl Record {
    pub fn from_row(
        record_type: Arc<RecordType>,
        names: &[String],
        types: &[ColumnType],
        values: Vec<Value>,
    ) -> Self {
        assert_eq!(
            names.len(),
            values.len(),
            "row for {} has {} values for {} columns",
            record_type.name(),
            values.len(),
            names.len()
        );
        let mut attributes = AttributeSet::new();
        for ((name, value), column_type) in names.iter().zip(values).zip(types) {
            attributes.write_from_database(name, value, Some(column_type));
        }
        Self {
            record_type,
            attributes,
            new_record: false,
        }
    }

    /// An unsaved record with every column NULL. STI subtypes get their
    /// discriminator filled in.
    pub fn new_record(record_type: Arc<RecordType>) -> Self {
        let mut attributes = AttributeSet::new();
        for column in record_type.columns() {
            let null = null_value(record_type.backend(), &column.column_type);
            attributes.write_from_database(&column.name, null, Some(&column.column_type));
        }
        if let Some(Sti { column, value }) = record_type.sti() {
            attributes.write(column, Value::String(Some(Box::new(value.clone()))));
        }
        Self {
            record_type,
            attributes,
            new_record: true,
        }
    }

    pub fn record_type(&self) -> &Arc<RecordType> {
        &self.record_type
    }

    pub fn is_new_record(&self) -> bool {
        self.new_record
    }

    pub fn attribute_set(&self) -> &AttributeSet {
        &self.attributes
    }

    pub fn attribute_set_mut(&mut self) -> &mut AttributeSet {
        &mut self.attributes
    }

    pub fn id(&self) -> Option<RecordKey> {
        self.attributes
            .get(self.record_type.primary_key())
            .and_then(RecordKey::from_db_value)
    }

    pub fn read_attribute(&self, name: &str) -> OnDemandResult<&Value> {
        self.attributes
            .get(name)
            .ok_or_else(|| self.missing_attribute(name))
    }

    pub fn read_attribute_before_type_cast(&self, name: &str) -> OnDemandResult<&Value> {
        self.attributes
            .get_before_type_cast(name)
            .ok_or_else(|| self.missing_attribute(name))
    }

    pub fn attributes(&self) -> BTreeMap<String, Value> {
        self.attributes.to_map()
    }

    pub fn attribute_names(&self) -> Vec<String> {
        self.attributes.keys().map(str::to_string).collect()
    }

    pub fn write_attribute(&mut self, name: &str, value: Value) {
        self.attributes.write(name, value);
    }

    pub fn attribute_changed(&self, name: &str) -> bool {
        self.attributes.changed(name)
    }

    fn missing_attribute(&self, name: &str) -> OnDemandError {
        OnDemandError::missing_attribute(self.record_type.name(), name)
    }
}

/// The read paths a caller can take through a record.
///
/// Every path ends in the same attribute map; implementations that load
/// lazily must do so before handing a value out.
#[async_trait]
pub trait AttributeAccess: Send {
    async fn read_attribute<'a>(&'a mut self, name: &str) -> OnDemandResult<&'a Value>;

    async fn read_attribute_before_type_cast<'a>(
        &'a mut self,
        name: &str,
    ) -> OnDemandResult<&'a Value>;

    /// A complete snapshot of the record's attributes
    async fn attributes(&mut self) -> OnDemandResult<BTreeMap<String, Value>>;
}

#[async_trait]
impl AttributeAccess for Record {
    async fn read_attribute<'a>(&'a mut self, name: &str) -> OnDemandResult<&'a Value> {
        Record::read_attribute(self, name)
    }

    async fn read_attribute_before_type_cast<'a>(
        &'a mut self,
        name: &str,
    ) -> OnDemandResult<&'a Value> {
        Record::read_attribute_before_type_cast(self, name)
    }

    async fn attributes(&mut self) -> OnDemandResult<BTreeMap<String, Value>> {
        Ok(Record::attributes(self))
    }
}

/// A record whose deferred columns load on first access
#[derive(Debug, Clone)]
pub struct LazyRecord<C> {
    record: Record,
    conn: C,
    tracker: LoadTracker,
}

impl<C: SelectRows + Clone> LazyRecord<C> {
    pub fn new(record: Record, conn: C) -> Self {
        Self {
            record,
            conn,
            tracker: LoadTracker::default(),
        }
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn into_record(self) -> Record {
        self.record
    }

    pub fn record_type(&self) -> &Arc<RecordType> {
        self.record.record_type()
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn tracker(&self) -> &LoadTracker {
        &self.tracker
    }

    pub fn is_new_record(&self) -> bool {
        self.record.is_new_record()
    }

    pub fn id(&self) -> Option<RecordKey> {
        self.record.id()
    }

    /// Whether reading `name` can be answered without a query
    pub fn column_loaded(&self, name: &str) -> bool {
        !self.record_type().is_on_demand(name)
            || self.record.is_new_record()
            || self.record.attribute_set().contains(name)
            || self.tracker.contains(name)
    }

    /// Make `name` readable. The first miss fetches every deferred column
    /// still outstanding, so later misses on sibling columns are free.
    pub async fn ensure_loaded(&mut self, name: &str) -> OnDemandResult<()> {
        if self.column_loaded(name) {
            return Ok(());
        }
        self.load_all_missing().await
    }

    /// Fetch every deferred column not yet loaded, in one round trip.
    /// A record selected without its primary key has nothing to fetch by.
    pub async fn load_all_missing(&mut self) -> OnDemandResult<()> {
        if self.id().is_none() {
            return Ok(());
        }
        let missing: Vec<String> = self
            .record_type()
            .columns_to_load_on_demand()
            .iter()
            .filter(|name| !self.column_loaded(name))
            .cloned()
            .collect();
        self.load_attributes(&missing).await
    }

    async fn load_attributes(&mut self, names: &[String]) -> OnDemandResult<()> {
        if names.is_empty() {
            return Ok(());
        }
        let record_type = Arc::clone(self.record_type());
        let id = self.id().ok_or_else(|| OnDemandError::MissingPrimaryKey {
            entity: record_type.name().to_string(),
        })?;

        let schema = record_type.columns();
        let mut column_types = Vec::with_capacity(names.len());
        for name in names {
            let column = schema
                .iter()
                .find(|c| &c.name == name)
                .ok_or_else(|| OnDemandError::unknown_column(record_type.name(), name))?;
            column_types.push(column.column_type.clone());
        }

        let mut select = Query::select();
        select
            .columns(names.iter().map(|name| Alias::new(name.as_str())))
            .from(Alias::new(record_type.table_name()))
            .and_where(Expr::col(Alias::new(record_type.primary_key())).eq(id.to_db_value()));
        let stmt = self.conn.backend().build(&select);

        log::debug!(
            "loading {:?} on demand for {} ID={}",
            names,
            record_type.name(),
            id
        );
        let rows = self.conn.select_rows(stmt, &column_types).await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| OnDemandError::record_not_found(record_type.name(), &id))?;
        assert_eq!(
            row.len(),
            names.len(),
            "on-demand fetch for {} returned {} values for {} columns",
            record_type.name(),
            row.len(),
            names.len()
        );

        let attributes = self.record.attribute_set_mut();
        for ((name, value), column_type) in names.iter().zip(row).zip(&column_types) {
            attributes.write_from_database(name, value, Some(column_type));
        }
        for name in names {
            self.tracker.mark(name);
        }
        Ok(())
    }

    // A read reached the attribute map and found nothing. Deferred columns
    // are fetched; anything else is the caller's selection at fault.
    async fn missing_attribute(&mut self, name: &str) -> OnDemandResult<()> {
        let fetchable = self.record_type().is_on_demand(name)
            && !self.record.is_new_record()
            && self.id().is_some();
        if fetchable {
            self.load_attributes(&[name.to_string()]).await
        } else {
            Err(OnDemandError::missing_attribute(self.record_type().name(), name))
        }
    }

    async fn ensure_readable(&mut self, name: &str) -> OnDemandResult<()> {
        self.ensure_loaded(name).await?;
        if !self.record.attribute_set().contains(name) {
            self.missing_attribute(name).await?;
        }
        Ok(())
    }

    /// Held attribute names plus every deferred column, sorted. Never loads.
    pub fn attribute_names(&self) -> Vec<String> {
        let mut names: BTreeSet<String> = self.record.attribute_names().into_iter().collect();
        names.extend(self.record_type().columns_to_load_on_demand().iter().cloned());
        names.into_iter().collect()
    }

    /// Assign a value. Under [`WritePolicy::LoadBeforeWrite`] an unloaded
    /// deferred column is fetched first so the change has a baseline.
    pub async fn write_attribute(&mut self, name: &str, value: impl Into<Value>) -> OnDemandResult<()> {
        let value = value.into();
        if self.record_type().write_policy() == WritePolicy::LoadBeforeWrite {
            self.ensure_loaded(name).await?;
        }
        self.record.write_attribute(name, value);
        Ok(())
    }

    /// An unloaded column cannot have been modified, so it is never reported
    /// as changed and checking it never queries.
    pub fn attribute_changed(&self, name: &str) -> bool {
        self.column_loaded(name) && self.record.attribute_changed(name)
    }

    pub fn changed_attributes(&self) -> Vec<String> {
        self.record
            .attribute_set()
            .changes()
            .into_iter()
            .map(|(name, _, _)| name)
            .filter(|name| self.column_loaded(name))
            .collect()
    }

    /// All attributes as JSON, deferred columns included
    pub async fn to_json(&mut self) -> OnDemandResult<serde_json::Value> {
        self.load_all_missing().await?;
        Ok(self.record.attribute_set().to_json())
    }

    /// Re-read the row. Deferred columns are dropped and the tracker emptied,
    /// so the next access fetches them fresh.
    pub async fn reload(&mut self) -> OnDemandResult<()> {
        let record_type = Arc::clone(self.record_type());
        let id = self.id().ok_or_else(|| OnDemandError::MissingPrimaryKey {
            entity: record_type.name().to_string(),
        })?;
        log::debug!("reloading {} ID={}", record_type.name(), id);

        let fresh = record_type.find_by_id(self.conn.clone(), id).await?;
        self.record = fresh.record;
        self.record.new_record = false;
        self.tracker.clear();
        let attributes = self.record.attribute_set_mut();
        for name in record_type.columns_to_load_on_demand() {
            attributes.delete(name);
        }
        Ok(())
    }
}

#[async_trait]
impl<C: SelectRows + Clone> AttributeAccess for LazyRecord<C> {
    async fn read_attribute<'a>(&'a mut self, name: &str) -> OnDemandResult<&'a Value> {
        self.ensure_readable(name).await?;
        self.record.read_attribute(name)
    }

    async fn read_attribute_before_type_cast<'a>(
        &'a mut self,
        name: &str,
    ) -> OnDemandResult<&'a Value> {
        self.ensure_readable(name).await?;
        self.record.read_attribute_before_type_cast(name)
    }

    async fn attributes(&mut self) -> OnDemandResult<BTreeMap<String, Value>> {
        self.load_all_missing().await?;
        Ok(self.record.attributes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnInfo, ColumnSet};
    use sea_orm::sea_query::StringLen;
    use sea_orm::DbBackend;

    fn doc_type() -> Arc<RecordType> {
        RecordType::builder("Doc", DbBackend::Sqlite)
            .table("docs")
            .schema(ColumnSet::new(vec![
                ColumnInfo::new("id", ColumnType::Integer),
                ColumnInfo::new("name", ColumnType::String(StringLen::None)),
                ColumnInfo::new("blob_data", ColumnType::Blob),
            ]))
            .columns_on_demand(Vec::<String>::new())
            .build()
            .unwrap()
    }

    #[derive(Clone, Debug)]
    struct ShortRow;

    #[async_trait]
    impl SelectRows for ShortRow {
        fn backend(&self) -> DbBackend {
            DbBackend::Sqlite
        }

        async fn select_rows(
            &self,
            _stmt: sea_orm::Statement,
            _column_types: &[ColumnType],
        ) -> Result<Vec<Vec<Value>>, sea_orm::DbErr> {
            Ok(vec![vec![Value::Bytes(None)]])
        }
    }

    #[tokio::test]
    #[should_panic(expected = "on-demand fetch for Doc returned 1 values for 2 columns")]
    async fn short_fetch_row_is_fatal() {
        let record = Record::from_row(
            doc_type_with_log(),
            &["id".to_string()],
            &[ColumnType::Integer],
            vec![Value::BigInt(Some(4))],
        );
        let mut lazy = LazyRecord::new(record, ShortRow);
        let _ = lazy.ensure_loaded("blob_data").await;
    }

    #[test]
    fn tracker_marks_by_name() {
        let mut tracker = LoadTracker::default();
        assert!(tracker.is_empty());
        tracker.mark("log");
        tracker.mark("log");
        assert!(tracker.contains("log"));
        assert_eq!(tracker.len(), 1);
        tracker.clear();
        assert!(!tracker.contains("log"));
    }

    fn doc_type_with_log() -> Arc<RecordType> {
        RecordType::builder("Doc", DbBackend::Sqlite)
            .table("docs")
            .schema(ColumnSet::new(vec![
                ColumnInfo::new("id", ColumnType::Integer),
                ColumnInfo::new("blob_data", ColumnType::Blob),
                ColumnInfo::new("log", ColumnType::Text),
            ]))
            .columns_on_demand(Vec::<String>::new())
            .build()
            .unwrap()
    }

    #[test]
    fn plain_record_reports_missing_attributes() {
        let record = Record::from_row(
            doc_type(),
            &["id".to_string()],
            &[ColumnType::Integer],
            vec![Value::BigInt(Some(4))],
        );
        assert_eq!(record.id(), Some(RecordKey::Int(4)));
        assert!(matches!(
            record.read_attribute("name"),
            Err(OnDemandError::MissingAttribute { .. })
        ));
    }

    #[test]
    #[should_panic(expected = "has 1 values for 2 columns")]
    fn row_shape_mismatch_is_fatal() {
        Record::from_row(
            doc_type(),
            &["id".to_string(), "name".to_string()],
            &[ColumnType::Integer, ColumnType::Text],
            vec![Value::BigInt(Some(4))],
        );
    }
}
