use crate::entity_metadata::RecordType;
use crate::key_types::RecordKey;
use crate::query_builders::connection_like::SelectRows;
use crate::query_builders::find::FindQueryBuilder;
use crate::record::{AttributeAccess, LazyRecord};
use crate::types::{OnDemandError, OnDemandResult};
use std::sync::Arc;

/// One-to-many association: `target.foreign_key` holds the owner's id
#[derive(Debug, Clone)]
pub struct HasMany {
    pub target: Arc<RecordType>,
    pub foreign_key: String,
}

impl HasMany {
    pub fn new(target: Arc<RecordType>, foreign_key: impl Into<String>) -> Self {
        Self {
            target,
            foreign_key: foreign_key.into(),
        }
    }

    /// The association as a query, for further filtering or ordering
    pub fn query<C: SelectRows + Clone>(&self, owner: &LazyRecord<C>) -> OnDemandResult<FindQueryBuilder<C>> {
        let id = owner.id().ok_or_else(|| OnDemandError::MissingPrimaryKey {
            entity: owner.record_type().name().to_string(),
        })?;
        Ok(self
            .target
            .find(owner.connection().clone())
            .filter_eq(self.foreign_key.as_str(), id.to_db_value()))
    }

    pub async fn load<C: SelectRows + Clone>(&self, owner: &LazyRecord<C>) -> OnDemandResult<Vec<LazyRecord<C>>> {
        log::trace!(
            "loading {} for {} through {}",
            self.target.name(),
            owner.record_type().name(),
            self.foreign_key
        );
        self.query(owner)?.exec().await
    }
}

/// Many-to-one association: the owner's `foreign_key` holds the target's id
#[derive(Debug, Clone)]
pub struct BelongsTo {
    pub target: Arc<RecordType>,
    pub foreign_key: String,
}

impl BelongsTo {
    pub fn new(target: Arc<RecordType>, foreign_key: impl Into<String>) -> Self {
        Self {
            target,
            foreign_key: foreign_key.into(),
        }
    }

    /// Load the associated record. A NULL foreign key means there is none.
    ///
    /// The foreign key is read like any other attribute, so a deferred
    /// foreign key is fetched first.
    pub async fn load<C: SelectRows + Clone>(
        &self,
        owner: &mut LazyRecord<C>,
    ) -> OnDemandResult<Option<LazyRecord<C>>> {
        let key = {
            let value = owner.read_attribute(&self.foreign_key).await?;
            RecordKey::from_db_value(value)
        };
        match key {
            Some(id) => {
                let conn = owner.connection().clone();
                self.target.find_by_id(conn, id).await.map(Some)
            }
            None => Ok(None),
        }
    }
}
