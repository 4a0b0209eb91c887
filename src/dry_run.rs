use tracing::debug;

use crate::{
    errors::StoreError,
    model::{DeleteResponse, EntityId, RelationshipMetadata},
    store::CascadeStore,
};

/// Read-only view of a store: lookups hit the inner store, deletes are only
/// logged and reported as successful.
pub struct DryRunStore<S> {
    inner: S,
}

impl<S> DryRunStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: CascadeStore> CascadeStore for DryRunStore<S> {
    fn one_to_many_relationships(
        &self,
        entity: &str,
    ) -> Result<Vec<RelationshipMetadata>, StoreError> {
        self.inner.one_to_many_relationships(entity)
    }

    fn find_records_by_lookup(
        &self,
        entity: &str,
        lookup_field: &str,
        referenced_ids: &[EntityId],
    ) -> Result<Vec<EntityId>, StoreError> {
        self.inner
            .find_records_by_lookup(entity, lookup_field, referenced_ids)
    }

    fn bulk_delete(
        &self,
        entity: &str,
        ids: &[EntityId],
    ) -> Result<Vec<DeleteResponse>, StoreError> {
        debug!(entity, requests = ids.len(), "bulk delete simulated (dry run)");
        Ok(ids.iter().copied().map(DeleteResponse::success).collect())
    }
}
