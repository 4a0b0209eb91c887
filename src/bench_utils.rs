//! Seeded fixture generation for cascade benchmarks.

use rand::{Rng, SeedableRng, rngs::StdRng};
use uuid::Uuid;

use crate::{
    memory::MemoryStore,
    model::{DeletePolicy, EntityId},
};

pub struct CascadeDataset {
    pub store: MemoryStore,
    pub root_entity: String,
    pub roots: Vec<EntityId>,
    pub total_records: usize,
}

#[derive(Clone, Copy, Debug)]
pub enum CascadeShape {
    /// `level0 <- level1 <- ... <- levelN`, each link restrict.
    Chain { levels: usize },
    /// One root entity with several restrict dependents and one cascade
    /// dependent the deleter must leave to the store.
    Star { dependents: usize },
}

pub fn generate_cascade(
    shape: CascadeShape,
    roots: usize,
    max_fanout: usize,
    seed: u64,
) -> CascadeDataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let store = MemoryStore::new();
    let root_entity = "level0".to_string();
    store.add_entity(&root_entity);
    let root_ids: Vec<EntityId> = (0..roots).map(|_| next_id(&mut rng)).collect();
    for id in &root_ids {
        insert(&store, &root_entity, *id, &[]);
    }
    let mut total_records = root_ids.len();

    match shape {
        CascadeShape::Chain { levels } => {
            let mut parents = root_ids.clone();
            for level in 1..=levels {
                let parent_entity = format!("level{}", level - 1);
                let entity = format!("level{level}");
                store.add_relationship(&parent_entity, &entity, "parent", DeletePolicy::Restrict);
                let mut children = Vec::new();
                for parent in &parents {
                    for _ in 0..rng.gen_range(0..=max_fanout) {
                        let id = next_id(&mut rng);
                        insert(&store, &entity, id, &[("parent", *parent)]);
                        children.push(id);
                    }
                }
                total_records += children.len();
                parents = children;
            }
        }
        CascadeShape::Star { dependents } => {
            for index in 0..=dependents {
                let entity = format!("dependent{index}");
                let policy = if index == dependents {
                    DeletePolicy::Cascade
                } else {
                    DeletePolicy::Restrict
                };
                store.add_relationship(&root_entity, &entity, "owner", policy);
                for owner in &root_ids {
                    for _ in 0..rng.gen_range(0..=max_fanout) {
                        insert(&store, &entity, next_id(&mut rng), &[("owner", *owner)]);
                        total_records += 1;
                    }
                }
            }
        }
    }

    CascadeDataset {
        store,
        root_entity,
        roots: root_ids,
        total_records,
    }
}

fn next_id(rng: &mut StdRng) -> EntityId {
    EntityId(Uuid::from_u128(rng.r#gen::<u128>()))
}

fn insert(store: &MemoryStore, entity: &str, id: EntityId, references: &[(&str, EntityId)]) {
    store
        .insert_with(entity, id, references)
        .expect("generated fixture is consistent");
}
