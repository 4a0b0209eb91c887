use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Record identifier. Scoped to an entity name by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new_v4() -> Self {
        EntityId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for EntityId {
    fn from(value: Uuid) -> Self {
        EntityId(value)
    }
}

impl FromStr for EntityId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(EntityId)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Store-side behaviour when a referenced record is deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    Restrict,
    Cascade,
    RemoveLink,
    NoAction,
}

impl DeletePolicy {
    pub fn is_restrict(&self) -> bool {
        matches!(self, DeletePolicy::Restrict)
    }
}

/// One-to-many relationship where the queried entity is the referenced side.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipMetadata {
    pub dependent_entity: String,
    pub dependent_lookup_field: String,
    pub delete_policy: DeletePolicy,
}

impl RelationshipMetadata {
    pub fn new(
        dependent_entity: impl Into<String>,
        dependent_lookup_field: impl Into<String>,
        delete_policy: DeletePolicy,
    ) -> Self {
        Self {
            dependent_entity: dependent_entity.into(),
            dependent_lookup_field: dependent_lookup_field.into(),
            delete_policy,
        }
    }
}

/// `dependent_entity.dependent_lookup_field` references `required_entity`
/// with a restrict delete policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestrictDependency {
    pub required_entity: String,
    pub dependent_entity: String,
    pub dependent_lookup_field: String,
}

/// Per-record answer from a bulk delete. `fault` is `None` on success.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub id: EntityId,
    pub fault: Option<String>,
}

impl DeleteResponse {
    pub fn success(id: EntityId) -> Self {
        Self { id, fault: None }
    }

    pub fn fault(id: EntityId, message: impl Into<String>) -> Self {
        Self {
            id,
            fault: Some(message.into()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum DeleteOutcome {
    Success,
    Failure(String),
}

impl DeleteOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DeleteOutcome::Success)
    }

    pub fn failure_message(&self) -> Option<&str> {
        match self {
            DeleteOutcome::Success => None,
            DeleteOutcome::Failure(message) => Some(message),
        }
    }
}

impl fmt::Display for DeleteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeleteOutcome::Success => f.write_str("Success"),
            DeleteOutcome::Failure(message) => write!(f, "Failed: {message}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResult {
    pub entity_name: String,
    pub record_id: EntityId,
    pub outcome: DeleteOutcome,
}

impl DeleteResult {
    pub fn from_response(entity_name: &str, response: DeleteResponse) -> Self {
        let outcome = match response.fault {
            None => DeleteOutcome::Success,
            Some(message) => DeleteOutcome::Failure(message),
        };
        Self {
            entity_name: entity_name.to_string(),
            record_id: response.id,
            outcome,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

impl fmt::Display for DeleteResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.entity_name, self.record_id, self.outcome)
    }
}
