// Record type descriptors: table layout, deferred columns and the cached default selection

use crate::raw;
use crate::schema::{classify, ColumnInfo, EntitySchema, SchemaSource};
use crate::types::{OnDemandError, OnDemandResult, RegistrationOptions, WritePolicy};
use parking_lot::RwLock;
use sea_orm::{ColumnType, DbBackend, EntityTrait, IdenStatic, Iterable, PrimaryKeyToColumn};
use std::collections::HashMap;
use std::sync::Arc;

/// Single-table-inheritance discriminator of a subtype
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sti {
    pub column: String,
    pub value: String,
}

impl Sti {
    pub fn new(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

/// The eager half of a table: every column that is not deferred
#[derive(Debug, Clone, PartialEq)]
pub struct EagerColumns {
    pub names: Vec<String>,
    pub quoted: Vec<String>,
}

/// Per-type cache of the default selection.
///
/// Filled on first use and emptied by [`SelectionCache::invalidate`], which the
/// owning type calls from `reset_column_information`.
#[derive(Debug, Default)]
pub struct SelectionCache {
    slot: RwLock<Option<Arc<EagerColumns>>>,
}

impl SelectionCache {
    pub fn get_or_compute(&self, compute: impl FnOnce() -> EagerColumns) -> Arc<EagerColumns> {
        if let Some(cached) = self.slot.read().as_ref() {
            return Arc::clone(cached);
        }
        let mut slot = self.slot.write();
        Arc::clone(slot.get_or_insert_with(|| Arc::new(compute())))
    }

    pub fn invalidate(&self) {
        self.slot.write().take();
    }

    pub fn is_cached(&self) -> bool {
        self.slot.read().is_some()
    }
}

/// Everything the on-demand machinery knows about one mapped type.
///
/// STI subtypes get their own descriptor sharing table, key and schema with
/// the parent, so each subtype keeps its own deferred set and selection cache.
pub struct RecordType {
    name: String,
    table: String,
    primary_key: String,
    backend: DbBackend,
    schema: Arc<dyn SchemaSource>,
    on_demand: Option<Vec<String>>,
    write_policy: WritePolicy,
    sti: Option<Sti>,
    selection: SelectionCache,
}

impl std::fmt::Debug for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordType")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("primary_key", &self.primary_key)
            .field("on_demand", &self.on_demand)
            .field("sti", &self.sti)
            .finish()
    }
}

impl RecordType {
    pub fn builder(name: impl Into<String>, backend: DbBackend) -> RecordTypeBuilder {
        RecordTypeBuilder::new(name.into(), backend)
    }

    /// Start from a sea-orm entity: table, primary key and columns come from
    /// the entity definition, the name from the entity's module.
    pub fn for_entity<E: EntityTrait>(backend: DbBackend) -> RecordTypeBuilder {
        let type_name = std::any::type_name::<E>();
        let name = type_name.rsplit("::").nth(1).unwrap_or(type_name).to_string();
        let mut builder = RecordTypeBuilder::new(name, backend)
            .table(E::default().table_name())
            .schema(EntitySchema::<E>::new());
        if let Some(pk) = E::PrimaryKey::iter().next() {
            builder = builder.primary_key(pk.into_column().as_str());
        }
        builder
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn backend(&self) -> DbBackend {
        self.backend
    }

    pub fn write_policy(&self) -> WritePolicy {
        self.write_policy
    }

    pub fn sti(&self) -> Option<&Sti> {
        self.sti.as_ref()
    }

    /// Current column list from the schema source
    pub fn columns(&self) -> Vec<ColumnInfo> {
        self.schema.columns()
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.schema
            .columns()
            .into_iter()
            .find(|c| c.name == name)
            .map(|c| c.column_type)
    }

    /// Whether `columns_on_demand` was declared for this type
    pub fn participates(&self) -> bool {
        self.on_demand.is_some()
    }

    /// Deferred columns, in the order they were declared or discovered
    pub fn columns_to_load_on_demand(&self) -> &[String] {
        self.on_demand.as_deref().unwrap_or(&[])
    }

    pub fn is_on_demand(&self, name: &str) -> bool {
        self.columns_to_load_on_demand().iter().any(|c| c == name)
    }

    pub fn quoted_table_name(&self) -> String {
        raw::quote_ident(self.backend, &self.table)
    }

    pub fn quote_column(&self, name: &str) -> String {
        raw::quote_ident(self.backend, name)
    }

    /// Columns of the default selection: the schema minus the deferred set
    pub fn eager_columns(&self) -> Arc<EagerColumns> {
        self.selection.get_or_compute(|| {
            let names: Vec<String> = self
                .schema
                .columns()
                .into_iter()
                .map(|c| c.name)
                .filter(|name| !self.is_on_demand(name))
                .collect();
            let quoted = names.iter().map(|n| self.quote_column(n)).collect();
            log::trace!("computed default selection for {}: {:?}", self.name, names);
            EagerColumns { names, quoted }
        })
    }

    /// Column list used when a query does not pick its own columns
    pub fn default_select(&self, qualified: bool) -> String {
        let eager = self.eager_columns();
        if qualified {
            raw::column_list(&eager.quoted, Some(&self.quoted_table_name()))
        } else {
            raw::column_list(&eager.quoted, None)
        }
    }

    /// Drop the cached selection. Call this whenever the schema source has
    /// been refreshed; the deferred set itself is never recomputed.
    pub fn reset_column_information(&self) {
        log::trace!("reset column information for {}", self.name);
        self.selection.invalidate();
    }
}

/// Registration of a [`RecordType`]
pub struct RecordTypeBuilder {
    name: String,
    backend: DbBackend,
    table: Option<String>,
    primary_key: String,
    schema: Option<Arc<dyn SchemaSource>>,
    on_demand: Option<Vec<String>>,
    inherited_on_demand: Option<Vec<String>>,
    write_policy: WritePolicy,
    sti: Option<Sti>,
}

impl RecordTypeBuilder {
    fn new(name: String, backend: DbBackend) -> Self {
        Self {
            name,
            backend,
            table: None,
            primary_key: "id".to_string(),
            schema: None,
            on_demand: None,
            inherited_on_demand: None,
            write_policy: WritePolicy::default(),
            sti: None,
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    pub fn schema(mut self, schema: impl SchemaSource + 'static) -> Self {
        self.schema = Some(Arc::new(schema));
        self
    }

    pub fn shared_schema(mut self, schema: Arc<dyn SchemaSource>) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Declare deferred columns. An empty list defers every binary and text
    /// column found in the schema.
    pub fn columns_on_demand<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.on_demand = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn write_policy(mut self, policy: WritePolicy) -> Self {
        self.write_policy = policy;
        self
    }

    pub fn options(mut self, options: RegistrationOptions) -> Self {
        if let Some(names) = options.columns_on_demand {
            self.on_demand = Some(names);
        }
        self.write_policy = options.write_policy;
        self
    }

    /// Make this type an STI subtype of `parent`. Unless the subtype declares
    /// its own deferred columns it keeps the parent's.
    pub fn inherits(mut self, parent: &RecordType, sti: Sti) -> Self {
        self.table = Some(parent.table.clone());
        self.primary_key = parent.primary_key.clone();
        self.backend = parent.backend;
        self.schema = Some(Arc::clone(&parent.schema));
        self.inherited_on_demand = parent.on_demand.clone();
        self.write_policy = parent.write_policy;
        self.sti = Some(sti);
        self
    }

    pub fn build(self) -> OnDemandResult<Arc<RecordType>> {
        let table = self
            .table
            .ok_or_else(|| OnDemandError::invalid_registration(&self.name, "table name is required"))?;
        let schema = self
            .schema
            .ok_or_else(|| OnDemandError::invalid_registration(&self.name, "schema source is required"))?;

        let columns = schema.columns();
        if !columns.iter().any(|c| c.name == self.primary_key) {
            return Err(OnDemandError::invalid_registration(
                &self.name,
                format!("primary key '{}' is not a column of {}", self.primary_key, table),
            ));
        }

        let on_demand = match self.on_demand {
            Some(explicit) => Some(classify(&explicit, &columns)),
            None => self.inherited_on_demand,
        };
        if let Some(deferred) = &on_demand {
            if deferred.iter().any(|c| *c == self.primary_key) {
                return Err(OnDemandError::invalid_registration(
                    &self.name,
                    "the primary key cannot load on demand",
                ));
            }
            for name in deferred {
                if !columns.iter().any(|c| &c.name == name) {
                    log::warn!("{}: on-demand column '{}' is not in {}", self.name, name, table);
                }
            }
        }

        Ok(Arc::new(RecordType {
            name: self.name,
            table,
            primary_key: self.primary_key,
            backend: self.backend,
            schema,
            on_demand,
            write_policy: self.write_policy,
            sti: self.sti,
            selection: SelectionCache::default(),
        }))
    }
}

/// Registered record types, by name.
///
/// Schema migrations reset through the registry so every type mapped onto a
/// table (STI siblings included) drops its cached selection together.
#[derive(Debug, Default)]
pub struct Registry {
    types: RwLock<HashMap<String, Arc<RecordType>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, record_type: Arc<RecordType>) -> Arc<RecordType> {
        self.types
            .write()
            .insert(record_type.name().to_string(), Arc::clone(&record_type));
        record_type
    }

    pub fn get(&self, name: &str) -> Option<Arc<RecordType>> {
        self.types.read().get(name).cloned()
    }

    /// Reset every type mapped onto `table`; returns how many were reset
    pub fn reset_column_information(&self, table: &str) -> usize {
        let types = self.types.read();
        let mut count = 0;
        for record_type in types.values().filter(|t| t.table_name() == table) {
            record_type.reset_column_information();
            count += 1;
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnSet;
    use sea_orm::sea_query::StringLen;

    fn docs() -> ColumnSet {
        ColumnSet::new(vec![
            ColumnInfo::new("id", ColumnType::Integer),
            ColumnInfo::new("name", ColumnType::String(StringLen::None)),
            ColumnInfo::new("blob_data", ColumnType::Blob),
            ColumnInfo::new("log", ColumnType::Text),
        ])
    }

    #[test]
    fn implicit_registration_defers_blob_and_text() {
        let doc = RecordType::builder("Doc", DbBackend::Sqlite)
            .table("docs")
            .schema(docs())
            .columns_on_demand(Vec::<String>::new())
            .build()
            .unwrap();
        assert_eq!(doc.columns_to_load_on_demand(), ["blob_data", "log"]);
        assert_eq!(doc.default_select(false), "id, name");
        assert_eq!(doc.default_select(true), "docs.id, docs.name");
    }

    #[test]
    fn types_without_declaration_do_not_participate() {
        let doc = RecordType::builder("Doc", DbBackend::Sqlite)
            .table("docs")
            .schema(docs())
            .build()
            .unwrap();
        assert!(!doc.participates());
        assert!(doc.columns_to_load_on_demand().is_empty());
        assert_eq!(doc.default_select(false), "id, name, blob_data, log");
    }

    #[test]
    fn selection_is_cached_until_reset() {
        let schema = docs();
        let doc = RecordType::builder("Doc", DbBackend::Sqlite)
            .table("docs")
            .schema(schema.clone())
            .columns_on_demand(Vec::<String>::new())
            .build()
            .unwrap();
        assert_eq!(doc.default_select(false), "id, name");

        let mut columns = schema.columns();
        columns.push(ColumnInfo::new("another_field", ColumnType::String(StringLen::None)));
        schema.replace(columns);
        assert_eq!(doc.default_select(false), "id, name");

        doc.reset_column_information();
        assert_eq!(doc.default_select(false), "id, name, another_field");
        // the deferred set does not move with the schema
        assert_eq!(doc.columns_to_load_on_demand(), ["blob_data", "log"]);
    }

    #[test]
    fn sti_subtypes_cache_separately() {
        let items = ColumnSet::new(vec![
            ColumnInfo::new("id", ColumnType::Integer),
            ColumnInfo::new("type", ColumnType::String(StringLen::None)),
            ColumnInfo::new("shared_text", ColumnType::Text),
            ColumnInfo::new("a_int", ColumnType::Integer),
            ColumnInfo::new("b_int", ColumnType::Integer),
        ]);
        let item = RecordType::builder("Item", DbBackend::Sqlite)
            .table("items")
            .schema(items)
            .columns_on_demand(Vec::<String>::new())
            .build()
            .unwrap();
        let special = RecordType::builder("SpecialItem", DbBackend::Sqlite)
            .inherits(&item, Sti::new("type", "SpecialItem"))
            .columns_on_demand(["a_int"])
            .build()
            .unwrap();
        let plain = RecordType::builder("PlainItem", DbBackend::Sqlite)
            .inherits(&item, Sti::new("type", "PlainItem"))
            .build()
            .unwrap();

        assert_eq!(item.default_select(false), "id, type, a_int, b_int");
        assert_eq!(special.default_select(false), "id, type, shared_text, b_int");
        assert_eq!(plain.columns_to_load_on_demand(), ["shared_text"]);
    }

    #[test]
    fn registry_resets_every_type_on_a_table() {
        let registry = Registry::new();
        let doc = registry.register(
            RecordType::builder("Doc", DbBackend::Sqlite)
                .table("docs")
                .schema(docs())
                .columns_on_demand(Vec::<String>::new())
                .build()
                .unwrap(),
        );
        doc.default_select(false);
        assert!(doc.selection.is_cached());
        assert_eq!(registry.reset_column_information("docs"), 1);
        assert!(!doc.selection.is_cached());
        assert_eq!(registry.reset_column_information("other"), 0);
        assert!(registry.get("Doc").is_some());
    }

    #[test]
    fn missing_table_is_rejected() {
        let err = RecordType::builder("Doc", DbBackend::Sqlite)
            .schema(docs())
            .build()
            .unwrap_err();
        assert!(matches!(err, OnDemandError::InvalidRegistration { .. }));
    }
}
