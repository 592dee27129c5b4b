//! Status Errors - failure taxonomy for the status lifecycle core
//!
//! Every error is returned to the immediate caller. Nothing in the core
//! logs-and-swallows a failure.

use crate::entity::{EntityId, EntityKind};

/// Result alias used across the core
pub type StatusResult<T> = Result<T, StatusError>;

/// Status lifecycle errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusError {
    #[error("Entity {id} not found")]
    NotFound { id: EntityId },

    #[error("Transition from '{from}' to '{to}' is not allowed")]
    InvalidTransition { from: String, to: String },

    #[error("Entity {id} was modified concurrently (expected version {expected}, found {found})")]
    ConcurrentModification {
        id: EntityId,
        expected: u64,
        found: u64,
    },

    #[error("Flag '{flag}' is not defined for {kind}")]
    UnknownFlag { kind: EntityKind, flag: String },

    #[error("Flag '{flag}' on {kind} is not exclusive")]
    FlagNotExclusive { kind: EntityKind, flag: String },

    #[error("Flag '{flag}' on {kind} is exclusive within its scope")]
    FlagIsExclusive { kind: EntityKind, flag: String },

    #[error("{kind} entities require a scope")]
    MissingScope { kind: EntityKind },

    #[error("{kind} has no status lifecycle")]
    NoLifecycle { kind: EntityKind },

    #[error("Entity {id} has unreadable status {status:?}")]
    CorruptStatus { id: EntityId, status: Option<String> },

    #[error("Bulk update aborted: {} of {} ids not found", .missing.len(), .missing.len() + .found.len())]
    BulkAborted {
        missing: Vec<EntityId>,
        found: Vec<EntityId>,
    },

    #[error("Usage is not tracked for {kind}")]
    UsageNotTracked { kind: EntityKind },

    #[error("Store is busy: {0}")]
    Busy(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl StatusError {
    /// Whether the caller may retry the same request
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StatusError::ConcurrentModification { .. } | StatusError::Busy(_)
        )
    }

    /// Short machine-readable code for CLI output and journals
    pub fn code(&self) -> &'static str {
        match self {
            StatusError::NotFound { .. } => "not_found",
            StatusError::InvalidTransition { .. } => "invalid_transition",
            StatusError::ConcurrentModification { .. } => "concurrent_modification",
            StatusError::UnknownFlag { .. } => "unknown_flag",
            StatusError::FlagNotExclusive { .. } => "flag_not_exclusive",
            StatusError::FlagIsExclusive { .. } => "flag_is_exclusive",
            StatusError::MissingScope { .. } => "missing_scope",
            StatusError::NoLifecycle { .. } => "no_lifecycle",
            StatusError::CorruptStatus { .. } => "corrupt_status",
            StatusError::BulkAborted { .. } => "bulk_aborted",
            StatusError::UsageNotTracked { .. } => "usage_not_tracked",
            StatusError::Busy(_) => "busy",
            StatusError::Storage(_) => "storage",
        }
    }
}

impl From<rusqlite::Error> for StatusError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if matches!(
                    e.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                ) =>
            {
                StatusError::Busy(err.to_string())
            }
            _ => StatusError::Storage(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        let conflict = StatusError::ConcurrentModification {
            id: EntityId(1),
            expected: 2,
            found: 3,
        };
        assert!(conflict.is_retryable());
        assert!(StatusError::Busy("locked".to_string()).is_retryable());
        assert!(!StatusError::NotFound { id: EntityId(1) }.is_retryable());
    }

    #[test]
    fn test_not_found_and_invalid_transition_are_distinct() {
        let missing = StatusError::NotFound { id: EntityId(9) };
        let invalid = StatusError::InvalidTransition {
            from: "pending".to_string(),
            to: "delivered".to_string(),
        };

        assert_eq!(missing.code(), "not_found");
        assert_eq!(invalid.code(), "invalid_transition");
        assert_eq!(missing.to_string(), "Entity #9 not found");
        assert!(invalid.to_string().contains("'pending' to 'delivered'"));
    }

    #[test]
    fn test_bulk_aborted_message_counts_ids() {
        let err = StatusError::BulkAborted {
            missing: vec![EntityId(4)],
            found: vec![EntityId(1), EntityId(2)],
        };
        assert_eq!(err.to_string(), "Bulk update aborted: 1 of 3 ids not found");
    }

    #[test]
    fn test_sqlite_errors_map_to_busy_or_storage() {
        let busy = rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY), None);
        assert!(matches!(StatusError::from(busy), StatusError::Busy(_)));

        let other: StatusError = rusqlite::Error::QueryReturnedNoRows.into();
        assert_eq!(other.code(), "storage");
        assert!(!other.is_retryable());
    }
}
