//! Restrict-aware cascading bulk delete.
//!
//! Deleting a record that other records reference under a *restrict* policy
//! fails until those references are gone. [`CascadeDeleter`] discovers the
//! restrict relationships of an entity at runtime, deletes the dependent
//! records first (recursively), and then deletes the requested records in
//! bounded batches, returning one [`DeleteResult`] per record.
//!
//! Stores plug in through [`CascadeStore`]: [`sqlite::SqliteStore`] reads
//! foreign-key metadata from a SQLite database, [`memory::MemoryStore`] keeps
//! everything in memory, and [`dry_run::DryRunStore`] wraps either one to
//! simulate deletes.
//!
//! ```
//! use cascade_delete::{CascadeDeleter, DeletePolicy, EntityId, memory::MemoryStore};
//!
//! let store = MemoryStore::new();
//! store.add_relationship("account", "contact", "parent_account", DeletePolicy::Restrict);
//! let account = EntityId::new_v4();
//! store.insert("account", account).unwrap();
//! store
//!     .insert_with("contact", EntityId::new_v4(), &[("parent_account", account)])
//!     .unwrap();
//!
//! let deleter = CascadeDeleter::new(&store);
//! let results = deleter.cascade_delete("account", &[account]).unwrap();
//! assert_eq!(results.len(), 2);
//! assert_eq!(results[0].entity_name, "contact");
//! assert!(results.iter().all(|r| r.is_success()));
//! ```

pub mod batch;
pub mod bench_utils;
pub mod config;
pub mod deleter;
pub mod dry_run;
pub mod errors;
pub mod logging;
pub mod memory;
pub mod model;
pub mod resolver;
#[cfg(feature = "sqlite-backend")]
pub mod sqlite;
pub mod store;
pub mod summary;

pub use crate::batch::{DEFAULT_BATCH_SIZE, partition};
pub use crate::config::{CascadeConfig, LoggingConfig};
pub use crate::deleter::{CascadeDeleter, DependencyNode};
pub use crate::errors::{CascadeError, ConfigError, StoreError};
pub use crate::model::{
    DeleteOutcome, DeletePolicy, DeleteResponse, DeleteResult, EntityId, RelationshipMetadata,
    RestrictDependency,
};
pub use crate::resolver::RelationshipResolver;
pub use crate::store::CascadeStore;
pub use crate::summary::CascadeSummary;
