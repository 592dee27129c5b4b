//! Bulk flag updates - outcome report

use serde::{Deserialize, Serialize};

use crate::config::BulkMode;
use crate::entity::EntityId;
use crate::error::StatusError;

/// An id the bulk update refused, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkRejection {
    pub id: EntityId,
    pub code: String,
    pub message: String,
}

impl BulkRejection {
    pub fn new(id: EntityId, err: &StatusError) -> Self {
        Self {
            id,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Per-id outcome of a bulk update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkReport {
    pub mode: BulkMode,
    /// Ids whose flag now holds the requested value
    pub updated: Vec<EntityId>,
    pub missing: Vec<EntityId>,
    pub rejected: Vec<BulkRejection>,
}

impl BulkReport {
    pub fn new(mode: BulkMode) -> Self {
        Self {
            mode,
            updated: Vec::new(),
            missing: Vec::new(),
            rejected: Vec::new(),
        }
    }

    /// Every requested id was updated
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.rejected.is_empty()
    }

    pub fn failed_count(&self) -> usize {
        self.missing.len() + self.rejected.len()
    }
}

/// Drop repeated ids, keeping first occurrence order
pub fn dedupe_ids(ids: &[EntityId]) -> Vec<EntityId> {
    let mut seen = std::collections::HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}
