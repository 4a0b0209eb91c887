//! Restrict-aware cascading bulk delete.
//!
//! For a target entity and a list of ids the deleter resolves the entity's
//! restrict dependencies, deletes every dependent record referencing the
//! current batch (recursively, dependents first), and only then submits the
//! batch itself. Results are accumulated in processing order: dependents of a
//! batch always precede the batch's own results.
//!
//! Cycle handling works on records rather than entity types so that
//! self-referencing hierarchies still cascade. Every batch on the recursion
//! path is kept as a frame of pending ids:
//!
//! - a dependent that is pending in an ancestor frame is moved down to the
//!   new sub-cascade;
//! - a dependent that is pending in the current frame is moved down as long as
//!   the frame keeps at least one record of its own.
//!
//! A record in the frame at depth `d` heads a reference chain of `d + 1`
//! distinct records, all already seen by the run. The recursion can only grow
//! deeper than the number of distinct records seen when that chain repeats a
//! record, so exceeding it, or a frame whose pending records all depend on
//! each other, is reported as [`CascadeError::CycleDetected`]. Records a
//! sub-cascade already submitted are dropped from later batches of the same
//! entity, so every record gets at most one result per run.

use ahash::{AHashMap, AHashSet};
use serde::Serialize;
use tracing::{debug, info, info_span};

use crate::{
    batch::{DEFAULT_BATCH_SIZE, batch_count, dedup_preserving_order, partition},
    config::CascadeConfig,
    errors::{CascadeError, StoreError},
    model::{DeleteResponse, DeleteResult, EntityId, RestrictDependency},
    resolver::RelationshipResolver,
    store::CascadeStore,
};

pub struct CascadeDeleter<S> {
    resolver: RelationshipResolver<S>,
    batch_size: usize,
}

impl<S: CascadeStore> CascadeDeleter<S> {
    pub fn new(store: S) -> Self {
        Self {
            resolver: RelationshipResolver::new(store),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn from_config(store: S, config: &CascadeConfig) -> Result<Self, CascadeError> {
        Self::new(store).with_batch_size(config.batch_size)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Result<Self, CascadeError> {
        if batch_size == 0 {
            return Err(CascadeError::InvalidBatchSize(batch_size));
        }
        self.batch_size = batch_size;
        Ok(self)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn store(&self) -> &S {
        self.resolver.store()
    }

    pub fn resolver(&self) -> &RelationshipResolver<S> {
        &self.resolver
    }

    /// Deletes `ids` from `entity` after removing every restrict-blocking
    /// dependent. Repeated ids are submitted once.
    ///
    /// Per-record faults are reported in the returned results; any other
    /// collaborator failure aborts the whole cascade.
    pub fn cascade_delete(
        &self,
        entity: &str,
        ids: &[EntityId],
    ) -> Result<Vec<DeleteResult>, CascadeError> {
        let ids = dedup_preserving_order(ids.iter().copied());
        info!(entity, records = ids.len(), "starting cascade delete");
        let mut run = CascadeRun::default();
        self.delete_level(entity, &ids, 0, &mut run)?;
        let failures = run.results.iter().filter(|r| !r.is_success()).count();
        info!(
            entity,
            results = run.results.len(),
            failures,
            "cascade delete finished"
        );
        Ok(run.results)
    }

    /// Walks restrict dependencies from `entity` without touching any record.
    pub fn resolve_plan(&self, entity: &str) -> Result<DependencyNode, CascadeError> {
        let mut path = vec![entity.to_string()];
        let dependents = self.plan_dependents(entity, &mut path)?;
        Ok(DependencyNode {
            entity: entity.to_string(),
            lookup_field: None,
            cycle: false,
            dependents,
        })
    }

    fn plan_dependents(
        &self,
        entity: &str,
        path: &mut Vec<String>,
    ) -> Result<Vec<DependencyNode>, CascadeError> {
        let depth = path.len() - 1;
        let dependencies = self.resolve(entity, depth)?;
        let mut nodes = Vec::with_capacity(dependencies.len());
        for dependency in dependencies {
            let cycle = path.contains(&dependency.dependent_entity);
            let dependents = if cycle {
                Vec::new()
            } else {
                path.push(dependency.dependent_entity.clone());
                let nested = self.plan_dependents(&dependency.dependent_entity, path);
                path.pop();
                nested?
            };
            nodes.push(DependencyNode {
                entity: dependency.dependent_entity,
                lookup_field: Some(dependency.dependent_lookup_field),
                cycle,
                dependents,
            });
        }
        Ok(nodes)
    }

    fn resolve(&self, entity: &str, depth: usize) -> Result<Vec<RestrictDependency>, CascadeError> {
        self.resolver
            .resolve(entity)
            .map_err(|source| CascadeError::MetadataUnavailable {
                entity: entity.to_string(),
                depth,
                source,
            })
    }

    fn delete_level(
        &self,
        entity: &str,
        ids: &[EntityId],
        depth: usize,
        run: &mut CascadeRun,
    ) -> Result<(), CascadeError> {
        let _span = info_span!("cascade", entity, depth).entered();
        let dependencies = self.resolve(entity, depth)?;
        info!(
            restrict = dependencies.len(),
            dependents = %dependency_names(&dependencies),
            "resolved restrict delete dependencies"
        );

        let batches = partition(ids, self.batch_size);
        let total = batch_count(ids.len(), self.batch_size);
        info!(records = ids.len(), batches = total, "records divided into batches");

        for (index, batch) in batches.into_iter().enumerate() {
            let number = index + 1;
            let batch: Vec<EntityId> = batch
                .into_iter()
                .filter(|id| !run.was_attempted(entity, id))
                .collect();
            if batch.is_empty() {
                debug!(batch = number, "batch already handled by a sub-cascade");
                continue;
            }
            info!(batch = number, of = total, size = batch.len(), "processing batch");
            run.enter(entity, &batch)?;

            for dependency in &dependencies {
                let pending = run.still_pending(&batch);
                if pending.is_empty() {
                    break;
                }
                let found = self
                    .store()
                    .find_records_by_lookup(
                        &dependency.dependent_entity,
                        &dependency.dependent_lookup_field,
                        &pending,
                    )
                    .map_err(|source| CascadeError::QueryFailure {
                        entity: entity.to_string(),
                        dependent_entity: dependency.dependent_entity.clone(),
                        lookup_field: dependency.dependent_lookup_field.clone(),
                        batch: number,
                        depth,
                        source,
                    })?;
                let dependents = run.schedule(&dependency.dependent_entity, found)?;
                info!(
                    batch = number,
                    dependent_entity = %dependency.dependent_entity,
                    found = dependents.len(),
                    "found dependent records"
                );
                if !dependents.is_empty() {
                    self.delete_level(&dependency.dependent_entity, &dependents, depth + 1, run)?;
                }
            }

            let submit = run.still_pending(&batch);
            run.frames.pop();
            if submit.is_empty() {
                debug!(batch = number, "every record in batch was moved to a sub-cascade");
                continue;
            }

            debug!(batch = number, requests = submit.len(), "executing bulk delete");
            let responses = self
                .store()
                .bulk_delete(entity, &submit)
                .and_then(|responses| check_response_count(&submit, responses))
                .map_err(|source| CascadeError::BatchExecutionFailure {
                    entity: entity.to_string(),
                    batch: number,
                    depth,
                    source,
                })?;
            run.mark_attempted(entity, &submit);

            let results: Vec<DeleteResult> = responses
                .into_iter()
                .map(|response| DeleteResult::from_response(entity, response))
                .collect();
            let successes = results.iter().filter(|r| r.is_success()).count();
            info!(
                batch = number,
                successes,
                requested = submit.len(),
                "batch completed"
            );
            run.results.extend(results);
        }

        info!("all batches completed");
        Ok(())
    }
}

/// Node of the restrict-dependency tree returned by
/// [`CascadeDeleter::resolve_plan`]. `cycle` marks an entity already present
/// on the path from the root; its dependents are not expanded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DependencyNode {
    pub entity: String,
    pub lookup_field: Option<String>,
    pub cycle: bool,
    pub dependents: Vec<DependencyNode>,
}

impl DependencyNode {
    /// Number of dependency edges below this node.
    pub fn edge_count(&self) -> usize {
        self.dependents
            .iter()
            .map(|child| 1 + child.edge_count())
            .sum()
    }

    pub fn has_cycle(&self) -> bool {
        self.cycle || self.dependents.iter().any(DependencyNode::has_cycle)
    }
}

struct Frame {
    entity: String,
    pending: AHashSet<EntityId>,
}

impl Frame {
    fn new(entity: &str, batch: &[EntityId]) -> Self {
        Self {
            entity: entity.to_string(),
            pending: batch.iter().copied().collect(),
        }
    }
}

/// State owned by one top-level `cascade_delete` call.
#[derive(Default)]
struct CascadeRun {
    results: Vec<DeleteResult>,
    frames: Vec<Frame>,
    attempted: AHashMap<String, AHashSet<EntityId>>,
    seen: AHashSet<(String, EntityId)>,
}

impl CascadeRun {
    fn enter(&mut self, entity: &str, batch: &[EntityId]) -> Result<(), CascadeError> {
        self.seen
            .extend(batch.iter().map(|id| (entity.to_string(), *id)));
        self.frames.push(Frame::new(entity, batch));
        let too_deep = self.frames.len() > self.seen.len();
        match batch.first() {
            Some(id) if too_deep => Err(self.cycle(entity, *id)),
            _ => Ok(()),
        }
    }

    /// Ids of `batch` the innermost frame still has to delete, in batch order.
    fn still_pending(&self, batch: &[EntityId]) -> Vec<EntityId> {
        match self.frames.last() {
            Some(frame) => batch
                .iter()
                .copied()
                .filter(|id| frame.pending.contains(id))
                .collect(),
            None => Vec::new(),
        }
    }

    fn mark_attempted(&mut self, entity: &str, ids: &[EntityId]) {
        self.attempted
            .entry(entity.to_string())
            .or_default()
            .extend(ids.iter().copied());
    }

    fn was_attempted(&self, entity: &str, id: &EntityId) -> bool {
        self.attempted
            .get(entity)
            .is_some_and(|ids| ids.contains(id))
    }

    fn pending_frame(&self, entity: &str, id: &EntityId) -> Option<usize> {
        self.frames
            .iter()
            .rposition(|frame| frame.entity == entity && frame.pending.contains(id))
    }

    /// Filters looked-up dependents down to the ids the next sub-cascade must
    /// handle, moving ids that are still pending on the current path.
    fn schedule(
        &mut self,
        entity: &str,
        found: Vec<EntityId>,
    ) -> Result<Vec<EntityId>, CascadeError> {
        let current = self.frames.len().saturating_sub(1);
        let mut scheduled = Vec::new();
        let mut from_current = Vec::new();

        for id in dedup_preserving_order(found) {
            if self.was_attempted(entity, &id) {
                debug!(entity, record = %id, "dependent already submitted, skipping");
                continue;
            }
            match self.pending_frame(entity, &id) {
                None => scheduled.push(id),
                Some(index) if index == current => from_current.push(id),
                Some(index) => {
                    self.frames[index].pending.remove(&id);
                    scheduled.push(id);
                }
            }
        }

        if !from_current.is_empty() {
            let frame = &self.frames[current];
            if frame.pending.len() == from_current.len() {
                return Err(self.cycle(entity, from_current[0]));
            }
            let frame = &mut self.frames[current];
            for id in &from_current {
                frame.pending.remove(id);
            }
            scheduled.extend(from_current);
        }
        Ok(scheduled)
    }

    fn cycle(&self, entity: &str, id: EntityId) -> CascadeError {
        let mut path: Vec<String> = self.frames.iter().map(|f| f.entity.clone()).collect();
        if path.last().map(String::as_str) != Some(entity) {
            path.push(entity.to_string());
        }
        CascadeError::CycleDetected {
            entity: entity.to_string(),
            record_id: id.to_string(),
            path,
        }
    }
}

fn dependency_names(dependencies: &[RestrictDependency]) -> String {
    dependencies
        .iter()
        .map(|d| d.dependent_entity.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

fn check_response_count(
    requested: &[EntityId],
    responses: Vec<DeleteResponse>,
) -> Result<Vec<DeleteResponse>, StoreError> {
    if responses.len() != requested.len() {
        return Err(StoreError::execution(format!(
            "bulk delete returned {} responses for {} requests",
            responses.len(),
            requested.len()
        )));
    }
    Ok(responses)
}
