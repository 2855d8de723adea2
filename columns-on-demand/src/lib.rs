//! Columns on demand for sea-orm backed records.
//!
//! A [`RecordType`] names the large columns of a table that should not be
//! read by default. Bulk queries built through [`RecordType::find`] leave
//! them out of the select list, and a [`LazyRecord`] fetches them in a
//! single round trip the first time any read path asks for one.
//!
//! ```no_run
//! # use columns_on_demand::*;
//! # async fn run(db: sea_orm::DatabaseConnection, schema: ColumnSet) -> OnDemandResult<()> {
//! let docs = RecordType::builder("Doc", sea_orm::DbBackend::Sqlite)
//!     .table("docs")
//!     .schema(schema)
//!     .columns_on_demand(Vec::<String>::new())
//!     .build()?;
//! let mut doc = docs.find_by_id(db, 1).await?;
//! let log = doc.read_attribute("log").await?;
//! # let _ = log;
//! # Ok(())
//! # }
//! ```

pub mod attributes;
pub mod entity_metadata;
pub mod key_types;
pub mod query_builders;
pub mod raw;
pub mod record;
pub mod schema;
pub mod types;

pub use attributes::AttributeSet;
pub use entity_metadata::{RecordType, RecordTypeBuilder, Registry, Sti};
pub use key_types::RecordKey;
pub use query_builders::*;
pub use record::{AttributeAccess, LazyRecord, LoadTracker, Record};
pub use schema::{ColumnInfo, ColumnSet, EntitySchema, SchemaSource};
pub use types::*;
