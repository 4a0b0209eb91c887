use std::fmt;

use serde::Serialize;

use crate::model::DeleteResult;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EntityTally {
    pub entity: String,
    pub succeeded: usize,
    pub failed: usize,
}

/// Per-entity success and failure counts, in order of first appearance.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CascadeSummary {
    pub entities: Vec<EntityTally>,
}

impl CascadeSummary {
    pub fn from_results(results: &[DeleteResult]) -> Self {
        let mut summary = CascadeSummary::default();
        for result in results {
            summary.record(result);
        }
        summary
    }

    pub fn record(&mut self, result: &DeleteResult) {
        let index = match self
            .entities
            .iter()
            .position(|tally| tally.entity == result.entity_name)
        {
            Some(index) => index,
            None => {
                self.entities.push(EntityTally {
                    entity: result.entity_name.clone(),
                    ..EntityTally::default()
                });
                self.entities.len() - 1
            }
        };
        let tally = &mut self.entities[index];
        if result.is_success() {
            tally.succeeded += 1;
        } else {
            tally.failed += 1;
        }
    }

    pub fn succeeded(&self) -> usize {
        self.entities.iter().map(|t| t.succeeded).sum()
    }

    pub fn failed(&self) -> usize {
        self.entities.iter().map(|t| t.failed).sum()
    }

    pub fn total(&self) -> usize {
        self.succeeded() + self.failed()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    pub fn get(&self, entity: &str) -> Option<&EntityTally> {
        self.entities.iter().find(|tally| tally.entity == entity)
    }
}

impl fmt::Display for CascadeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {} records deleted", self.succeeded(), self.total())?;
        for tally in &self.entities {
            write!(
                f,
                "\n  {}: {} succeeded, {} failed",
                tally.entity, tally.succeeded, tally.failed
            )?;
        }
        Ok(())
    }
}
