//! In-memory relational store.
//!
//! Holds entity tables and one-to-many relationships with their delete
//! policies, and applies those policies on delete the way a relational store
//! would: restrict blocks, cascade removes dependents, remove-link clears the
//! lookup field. Every capability call is recorded, and failures can be
//! injected per instance, which makes it the reference store for exercising
//! the deleter without a database.

use std::collections::BTreeMap;

use ahash::{AHashMap, AHashSet};
use parking_lot::Mutex;

use crate::{
    errors::StoreError,
    model::{DeletePolicy, DeleteResponse, EntityId, RelationshipMetadata},
    store::CascadeStore,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreCall {
    Relationships {
        entity: String,
    },
    Lookup {
        entity: String,
        lookup_field: String,
        referenced: Vec<EntityId>,
        pages: usize,
    },
    BulkDelete {
        entity: String,
        ids: Vec<EntityId>,
    },
}

#[derive(Clone, Debug)]
struct Relationship {
    required: String,
    dependent: String,
    field: String,
    policy: DeletePolicy,
}

#[derive(Clone, Debug, Default)]
struct Table {
    next_seq: u64,
    rows: BTreeMap<u64, Row>,
    index: AHashMap<EntityId, u64>,
}

#[derive(Clone, Debug)]
struct Row {
    id: EntityId,
    fields: AHashMap<String, EntityId>,
}

impl Table {
    fn insert(&mut self, row: Row) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.index.insert(row.id, seq);
        self.rows.insert(seq, row);
    }

    fn remove(&mut self, id: &EntityId) -> Option<Row> {
        let seq = self.index.remove(id)?;
        self.rows.remove(&seq)
    }

    fn get_mut(&mut self, id: &EntityId) -> Option<&mut Row> {
        let seq = self.index.get(id)?;
        self.rows.get_mut(seq)
    }

    fn contains(&self, id: &EntityId) -> bool {
        self.index.contains_key(id)
    }

    fn referencing<'a>(
        &'a self,
        field: &'a str,
        targets: &'a AHashSet<EntityId>,
    ) -> impl Iterator<Item = EntityId> + 'a {
        self.rows.values().filter_map(move |row| {
            row.fields
                .get(field)
                .filter(|value| targets.contains(*value))
                .map(|_| row.id)
        })
    }
}

#[derive(Default)]
struct Faults {
    relationships: AHashMap<String, StoreError>,
    lookups: AHashMap<String, StoreError>,
    dispatch: AHashMap<String, StoreError>,
    records: AHashMap<EntityId, String>,
}

#[derive(Default)]
struct MemoryState {
    tables: AHashMap<String, Table>,
    relationships: Vec<Relationship>,
    calls: Vec<StoreCall>,
    faults: Faults,
    page_size: Option<usize>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lookups report how many pages of `page_size` rows they walked.
    pub fn with_page_size(self, page_size: usize) -> Self {
        self.state.lock().page_size = Some(page_size.max(1));
        self
    }

    pub fn add_entity(&self, entity: &str) {
        self.state
            .lock()
            .tables
            .entry(entity.to_string())
            .or_default();
    }

    /// Declares that `dependent.field` references `required`.
    pub fn add_relationship(
        &self,
        required: &str,
        dependent: &str,
        field: &str,
        policy: DeletePolicy,
    ) {
        let mut state = self.state.lock();
        state.tables.entry(required.to_string()).or_default();
        state.tables.entry(dependent.to_string()).or_default();
        state.relationships.push(Relationship {
            required: required.to_string(),
            dependent: dependent.to_string(),
            field: field.to_string(),
            policy,
        });
    }

    pub fn insert(&self, entity: &str, id: EntityId) -> Result<(), StoreError> {
        self.insert_with(entity, id, &[])
    }

    /// Inserts a record whose lookup fields point at existing records.
    pub fn insert_with(
        &self,
        entity: &str,
        id: EntityId,
        references: &[(&str, EntityId)],
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let mut fields = AHashMap::new();
        for (field, target) in references {
            let relationship = state
                .relationships
                .iter()
                .find(|r| r.dependent == entity && r.field == *field)
                .ok_or_else(|| {
                    StoreError::invalid_input(format!("{entity}.{field} is not a lookup field"))
                })?;
            let self_reference = relationship.required == entity && *target == id;
            let exists = state
                .tables
                .get(&relationship.required)
                .is_some_and(|table| table.contains(target));
            if !exists && !self_reference {
                return Err(StoreError::invalid_input(format!(
                    "{entity}.{field} references missing {} record {target}",
                    relationship.required
                )));
            }
            fields.insert(field.to_string(), *target);
        }
        let table = state
            .tables
            .get_mut(entity)
            .ok_or_else(|| StoreError::not_found(entity.to_string()))?;
        if table.contains(&id) {
            return Err(StoreError::invalid_input(format!(
                "{entity} record {id} already exists"
            )));
        }
        table.insert(Row { id, fields });
        Ok(())
    }

    /// Points `entity.field` of an existing record at `target`. Unlike
    /// [`MemoryStore::insert_with`] the target is not checked, so reference
    /// cycles can be built.
    pub fn set_lookup(
        &self,
        entity: &str,
        id: EntityId,
        field: &str,
        target: EntityId,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let row = state
            .tables
            .get_mut(entity)
            .and_then(|table| table.get_mut(&id))
            .ok_or_else(|| StoreError::not_found(format!("{entity} record {id}")))?;
        row.fields.insert(field.to_string(), target);
        Ok(())
    }

    pub fn contains(&self, entity: &str, id: &EntityId) -> bool {
        self.state
            .lock()
            .tables
            .get(entity)
            .is_some_and(|table| table.contains(id))
    }

    pub fn count(&self, entity: &str) -> usize {
        self.state
            .lock()
            .tables
            .get(entity)
            .map_or(0, |table| table.rows.len())
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().calls.clone()
    }

    /// `(entity, ids)` of every bulk delete request, in call order.
    pub fn bulk_deletes(&self) -> Vec<(String, Vec<EntityId>)> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                StoreCall::BulkDelete { entity, ids } => Some((entity.clone(), ids.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn fail_relationships(&self, entity: &str, error: StoreError) {
        self.state
            .lock()
            .faults
            .relationships
            .insert(entity.to_string(), error);
    }

    /// Fails lookups against dependent `entity`.
    pub fn fail_lookup(&self, entity: &str, error: StoreError) {
        self.state
            .lock()
            .faults
            .lookups
            .insert(entity.to_string(), error);
    }

    pub fn fail_dispatch(&self, entity: &str, error: StoreError) {
        self.state
            .lock()
            .faults
            .dispatch
            .insert(entity.to_string(), error);
    }

    /// Makes every delete of `id` report `message` as its fault.
    pub fn fault_record(&self, id: EntityId, message: &str) {
        self.state
            .lock()
            .faults
            .records
            .insert(id, message.to_string());
    }

    pub fn reset_faults(&self) {
        self.state.lock().faults = Faults::default();
    }
}

impl MemoryState {
    fn delete_one(&mut self, entity: &str, id: EntityId) -> Option<String> {
        if let Some(message) = self.faults.records.get(&id) {
            return Some(message.clone());
        }
        if !self.tables.get(entity).is_some_and(|t| t.contains(&id)) {
            return Some(format!("{entity} record {id} does not exist"));
        }

        let mut doomed: Vec<(String, EntityId)> = Vec::new();
        let mut seen: AHashSet<(String, EntityId)> = AHashSet::new();
        let mut unlink: Vec<(String, EntityId, String)> = Vec::new();
        let mut queue = vec![(entity.to_string(), id)];
        seen.insert((entity.to_string(), id));

        while let Some((current, current_id)) = queue.pop() {
            let targets: AHashSet<EntityId> = [current_id].into_iter().collect();
            for relationship in self.relationships.iter().filter(|r| r.required == current) {
                let Some(table) = self.tables.get(&relationship.dependent) else {
                    continue;
                };
                for dependent in table.referencing(&relationship.field, &targets) {
                    let key = (relationship.dependent.clone(), dependent);
                    match relationship.policy {
                        DeletePolicy::Restrict => {
                            if !seen.contains(&key) {
                                return Some(format!(
                                    "cannot delete {current} record {current_id}: referenced by {}.{}",
                                    relationship.dependent, relationship.field
                                ));
                            }
                        }
                        DeletePolicy::Cascade => {
                            if seen.insert(key.clone()) {
                                queue.push(key);
                            }
                        }
                        DeletePolicy::RemoveLink => {
                            unlink.push((key.0, key.1, relationship.field.clone()));
                        }
                        DeletePolicy::NoAction => {}
                    }
                }
            }
            doomed.push((current, current_id));
        }

        for (dependent, dependent_id, field) in unlink {
            if seen.contains(&(dependent.clone(), dependent_id)) {
                continue;
            }
            if let Some(row) = self
                .tables
                .get_mut(&dependent)
                .and_then(|table| table.get_mut(&dependent_id))
            {
                row.fields.remove(&field);
            }
        }
        for (table, row_id) in doomed {
            if let Some(table) = self.tables.get_mut(&table) {
                table.remove(&row_id);
            }
        }
        None
    }
}

impl CascadeStore for MemoryStore {
    fn one_to_many_relationships(
        &self,
        entity: &str,
    ) -> Result<Vec<RelationshipMetadata>, StoreError> {
        let mut state = self.state.lock();
        state.calls.push(StoreCall::Relationships {
            entity: entity.to_string(),
        });
        if let Some(error) = state.faults.relationships.get(entity) {
            return Err(error.clone());
        }
        if !state.tables.contains_key(entity) {
            return Err(StoreError::not_found(entity.to_string()));
        }
        Ok(state
            .relationships
            .iter()
            .filter(|r| r.required == entity)
            .map(|r| RelationshipMetadata::new(r.dependent.clone(), r.field.clone(), r.policy))
            .collect())
    }

    fn find_records_by_lookup(
        &self,
        entity: &str,
        lookup_field: &str,
        referenced_ids: &[EntityId],
    ) -> Result<Vec<EntityId>, StoreError> {
        let mut state = self.state.lock();
        let failure = state.faults.lookups.get(entity).cloned();
        let targets: AHashSet<EntityId> = referenced_ids.iter().copied().collect();
        let found: Vec<EntityId> = match state.tables.get(entity) {
            Some(table) if failure.is_none() => {
                table.referencing(lookup_field, &targets).collect()
            }
            _ => Vec::new(),
        };
        let pages = match state.page_size {
            Some(size) => found.len() / size + 1,
            None => 1,
        };
        state.calls.push(StoreCall::Lookup {
            entity: entity.to_string(),
            lookup_field: lookup_field.to_string(),
            referenced: referenced_ids.to_vec(),
            pages,
        });
        if let Some(error) = failure {
            return Err(error);
        }
        if !state.tables.contains_key(entity) {
            return Err(StoreError::not_found(entity.to_string()));
        }
        Ok(found)
    }

    fn bulk_delete(
        &self,
        entity: &str,
        ids: &[EntityId],
    ) -> Result<Vec<DeleteResponse>, StoreError> {
        let mut state = self.state.lock();
        state.calls.push(StoreCall::BulkDelete {
            entity: entity.to_string(),
            ids: ids.to_vec(),
        });
        if let Some(error) = state.faults.dispatch.get(entity) {
            return Err(error.clone());
        }
        Ok(ids
            .iter()
            .map(|id| match state.delete_one(entity, *id) {
                None => DeleteResponse::success(*id),
                Some(message) => DeleteResponse::fault(*id, message),
            })
            .collect())
    }
}
