use thiserror::Error;

/// Failure reported by a store collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("entity not found: {0}")]
    NotFound(String),
    #[error("query error: {0}")]
    Query(String),
    #[error("execution error: {0}")]
    Execution(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl StoreError {
    pub fn connection<T: Into<String>>(msg: T) -> Self {
        StoreError::Connection(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        StoreError::NotFound(msg.into())
    }

    pub fn query<T: Into<String>>(msg: T) -> Self {
        StoreError::Query(msg.into())
    }

    pub fn execution<T: Into<String>>(msg: T) -> Self {
        StoreError::Execution(msg.into())
    }

    pub fn invalid_input<T: Into<String>>(msg: T) -> Self {
        StoreError::InvalidInput(msg.into())
    }
}

/// Fatal cascade failure. Per-record delete faults are never reported here;
/// they travel inside [`crate::DeleteResult`].
#[derive(Debug, Error)]
pub enum CascadeError {
    #[error("restrict relationships for {entity} unavailable at depth {depth}: {source}")]
    MetadataUnavailable {
        entity: String,
        depth: usize,
        #[source]
        source: StoreError,
    },
    #[error(
        "lookup of {dependent_entity}.{lookup_field} failed for {entity} batch {batch} at depth {depth}: {source}"
    )]
    QueryFailure {
        entity: String,
        dependent_entity: String,
        lookup_field: String,
        batch: usize,
        depth: usize,
        #[source]
        source: StoreError,
    },
    #[error("bulk delete on {entity} batch {batch} at depth {depth} could not be dispatched: {source}")]
    BatchExecutionFailure {
        entity: String,
        batch: usize,
        depth: usize,
        #[source]
        source: StoreError,
    },
    #[error("restrict cycle detected at {entity} record {record_id}: {}", path.join(" -> "))]
    CycleDetected {
        entity: String,
        record_id: String,
        path: Vec<String>,
    },
    #[error("batch size must be at least 1, got {0}")]
    InvalidBatchSize(usize),
}

impl CascadeError {
    /// Entity whose processing raised the error.
    pub fn entity(&self) -> Option<&str> {
        match self {
            CascadeError::MetadataUnavailable { entity, .. }
            | CascadeError::QueryFailure { entity, .. }
            | CascadeError::BatchExecutionFailure { entity, .. }
            | CascadeError::CycleDetected { entity, .. } => Some(entity),
            CascadeError::InvalidBatchSize(_) => None,
        }
    }

    pub fn depth(&self) -> Option<usize> {
        match self {
            CascadeError::MetadataUnavailable { depth, .. }
            | CascadeError::QueryFailure { depth, .. }
            | CascadeError::BatchExecutionFailure { depth, .. } => Some(*depth),
            CascadeError::CycleDetected { path, .. } => Some(path.len().saturating_sub(1)),
            CascadeError::InvalidBatchSize(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {message}")]
    Read { path: String, message: String },
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn parse<T: Into<String>>(msg: T) -> Self {
        ConfigError::Parse(msg.into())
    }

    pub fn invalid<T: Into<String>>(msg: T) -> Self {
        ConfigError::Invalid(msg.into())
    }
}
