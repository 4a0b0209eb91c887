//! Store capability trait consumed by the resolver and the deleter. The SQLite
//! adapter ([`crate::sqlite::SqliteStore`]), the in-memory store
//! ([`crate::memory::MemoryStore`]) and the read-only wrapper
//! ([`crate::dry_run::DryRunStore`]) all implement it, so the cascade logic
//! never touches a connection directly.

use crate::{
    errors::StoreError,
    model::{DeleteResponse, EntityId, RelationshipMetadata},
};

pub trait CascadeStore {
    /// One-to-many relationships where `entity` is the referenced side, in a
    /// stable store-defined order.
    fn one_to_many_relationships(
        &self,
        entity: &str,
    ) -> Result<Vec<RelationshipMetadata>, StoreError>;

    /// Ids of `entity` records whose `lookup_field` holds any of
    /// `referenced_ids`. Implementations exhaust their own paging.
    fn find_records_by_lookup(
        &self,
        entity: &str,
        lookup_field: &str,
        referenced_ids: &[EntityId],
    ) -> Result<Vec<EntityId>, StoreError>;

    /// Deletes `ids` from `entity`, one response per id in request order.
    /// `Err` means the request itself was not dispatched.
    fn bulk_delete(&self, entity: &str, ids: &[EntityId])
    -> Result<Vec<DeleteResponse>, StoreError>;
}

impl<'a, S> CascadeStore for &'a S
where
    S: CascadeStore + ?Sized,
{
    fn one_to_many_relationships(
        &self,
        entity: &str,
    ) -> Result<Vec<RelationshipMetadata>, StoreError> {
        (*self).one_to_many_relationships(entity)
    }

    fn find_records_by_lookup(
        &self,
        entity: &str,
        lookup_field: &str,
        referenced_ids: &[EntityId],
    ) -> Result<Vec<EntityId>, StoreError> {
        (*self).find_records_by_lookup(entity, lookup_field, referenced_ids)
    }

    fn bulk_delete(
        &self,
        entity: &str,
        ids: &[EntityId],
    ) -> Result<Vec<DeleteResponse>, StoreError> {
        (*self).bulk_delete(entity, ids)
    }
}

impl<S> CascadeStore for Box<S>
where
    S: CascadeStore + ?Sized,
{
    fn one_to_many_relationships(
        &self,
        entity: &str,
    ) -> Result<Vec<RelationshipMetadata>, StoreError> {
        (**self).one_to_many_relationships(entity)
    }

    fn find_records_by_lookup(
        &self,
        entity: &str,
        lookup_field: &str,
        referenced_ids: &[EntityId],
    ) -> Result<Vec<EntityId>, StoreError> {
        (**self).find_records_by_lookup(entity, lookup_field, referenced_ids)
    }

    fn bulk_delete(
        &self,
        entity: &str,
        ids: &[EntityId],
    ) -> Result<Vec<DeleteResponse>, StoreError> {
        (**self).bulk_delete(entity, ids)
    }
}
