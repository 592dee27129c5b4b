//! Entity Store - persistence boundary of the status manager
//!
//! A store hands out an `EntityRepo` for the duration of one transaction.
//! `atomically` commits when the closure returns `Ok` and rolls back
//! otherwise, so a failed operation never leaves a partial mutation.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::entity::{Entity, EntityId, EntityKind, NewEntity, ScopeId};
use crate::error::StatusResult;
use crate::events::StatusEvent;

/// Row access inside one transaction
pub trait EntityRepo {
    fn find(&self, id: EntityId) -> StatusResult<Option<Entity>>;

    /// Every entity of `kind` in `scope`, ordered by id
    fn find_all_in_scope(&self, kind: EntityKind, scope: ScopeId) -> StatusResult<Vec<Entity>>;

    /// Every entity of `kind`, ordered by id
    fn list(&self, kind: EntityKind) -> StatusResult<Vec<Entity>>;

    /// Insert a new row with version 1
    fn insert(&self, new: &NewEntity, status: Option<&str>, at: DateTime<Utc>) -> StatusResult<Entity>;

    /// Persist flags, status and stamps.
    ///
    /// Fails with `ConcurrentModification` when the stored version differs
    /// from `entity.version`. Returns the entity with its bumped version.
    fn save(&self, entity: &Entity) -> StatusResult<Entity>;

    fn count(&self, kind: EntityKind) -> StatusResult<u64>;

    fn count_flag(&self, kind: EntityKind, flag: &str, value: bool) -> StatusResult<u64>;

    fn count_by_status(&self, kind: EntityKind) -> StatusResult<BTreeMap<String, u64>>;

    fn record_usage(&self, id: EntityId, reference: &str, at: DateTime<Utc>) -> StatusResult<()>;

    fn usage_count(&self, id: EntityId) -> StatusResult<u64>;

    fn append_event(&self, event: &StatusEvent) -> StatusResult<()>;

    /// Newest first
    fn recent_events(&self, limit: usize) -> StatusResult<Vec<StatusEvent>>;
}

/// Transactional store
pub trait EntityStore {
    fn atomically<R, F>(&self, f: F) -> StatusResult<R>
    where
        F: FnOnce(&dyn EntityRepo) -> StatusResult<R>;
}
