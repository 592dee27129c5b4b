//! Status Journal - append-only record of successful mutations
//!
//! Every manager operation that changes an entity appends one event inside
//! the same transaction, so the journal never records a rolled-back change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::entity::{EntityId, EntityKind};

/// What happened to the entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    Created,
    Replicated,
    ExclusiveFlagSet,
    ExclusiveFlagCleared,
    FlagChanged,
    StatusChanged,
    UsageRecorded,
}

impl EventAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventAction::Created => "created",
            EventAction::Replicated => "replicated",
            EventAction::ExclusiveFlagSet => "exclusive_flag_set",
            EventAction::ExclusiveFlagCleared => "exclusive_flag_cleared",
            EventAction::FlagChanged => "flag_changed",
            EventAction::StatusChanged => "status_changed",
            EventAction::UsageRecorded => "usage_recorded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(EventAction::Created),
            "replicated" => Some(EventAction::Replicated),
            "exclusive_flag_set" => Some(EventAction::ExclusiveFlagSet),
            "exclusive_flag_cleared" => Some(EventAction::ExclusiveFlagCleared),
            "flag_changed" => Some(EventAction::FlagChanged),
            "status_changed" => Some(EventAction::StatusChanged),
            "usage_recorded" => Some(EventAction::UsageRecorded),
            _ => None,
        }
    }
}

impl fmt::Display for EventAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Journal entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub id: Uuid,
    pub entity_id: EntityId,
    pub kind: EntityKind,
    pub action: EventAction,
    /// Short human-readable detail ("pending -> processing", "is_active=true")
    pub detail: String,
    pub at: DateTime<Utc>,
}

impl StatusEvent {
    pub fn new(
        entity_id: EntityId,
        kind: EntityKind,
        action: EventAction,
        detail: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_id,
            kind,
            action,
            detail: detail.into(),
            at,
        }
    }
}
