use tracing::debug;

use crate::{errors::StoreError, model::RestrictDependency, store::CascadeStore};

/// Discovers the restrict-delete relationships that block deleting an entity.
///
/// Nothing is cached; every call asks the store again.
pub struct RelationshipResolver<S> {
    store: S,
}

impl<S: CascadeStore> RelationshipResolver<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn resolve(&self, entity: &str) -> Result<Vec<RestrictDependency>, StoreError> {
        let relationships = self.store.one_to_many_relationships(entity)?;
        let total = relationships.len();
        let dependencies: Vec<RestrictDependency> = relationships
            .into_iter()
            .filter(|relationship| relationship.delete_policy.is_restrict())
            .map(|relationship| RestrictDependency {
                required_entity: entity.to_string(),
                dependent_entity: relationship.dependent_entity,
                dependent_lookup_field: relationship.dependent_lookup_field,
            })
            .collect();
        debug!(
            entity,
            relationships = total,
            restrict = dependencies.len(),
            "resolved restrict dependencies"
        );
        Ok(dependencies)
    }
}
