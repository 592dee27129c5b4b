//! In-memory store
//!
//! A transaction works on a clone of the state and swaps it in on commit.
//! Used by tests and by callers that do not need durability.

use chrono::{DateTime, Utc};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{EntityRepo, EntityStore};
use crate::catalog;
use crate::entity::{Entity, EntityId, EntityKind, NewEntity, ScopeId};
use crate::error::{StatusError, StatusResult};
use crate::events::StatusEvent;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    next_id: i64,
    entities: BTreeMap<EntityId, Entity>,
    usages: Vec<(EntityId, String, DateTime<Utc>)>,
    events: Vec<StatusEvent>,
}

impl MemoryState {
    /// Mirror of the SQLite partial unique index on exclusive flags
    fn check_exclusive(&self, candidate: &Entity) -> StatusResult<()> {
        let Some(scope) = candidate.scope_id else {
            return Ok(());
        };
        let schema = catalog::schema(candidate.kind);

        for spec in schema.exclusive_flags() {
            if !candidate.flag(spec.name) {
                continue;
            }
            let clash = self.entities.values().any(|other| {
                other.id != candidate.id
                    && other.kind == candidate.kind
                    && other.scope_id == Some(scope)
                    && other.flag(spec.name)
            });
            if clash {
                return Err(StatusError::Storage(format!(
                    "exclusive flag '{}' already set in {} scope {}",
                    spec.name, candidate.kind, scope
                )));
            }
        }
        Ok(())
    }
}

/// Store backed by a mutex-guarded map
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EntityStore for MemoryStore {
    fn atomically<R, F>(&self, f: F) -> StatusResult<R>
    where
        F: FnOnce(&dyn EntityRepo) -> StatusResult<R>,
    {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| StatusError::Storage("memory store lock poisoned".to_string()))?;

        let repo = MemoryRepo {
            state: RefCell::new(guard.clone()),
        };
        let result = f(&repo)?;
        *guard = repo.state.into_inner();
        Ok(result)
    }
}

struct MemoryRepo {
    state: RefCell<MemoryState>,
}

impl EntityRepo for MemoryRepo {
    fn find(&self, id: EntityId) -> StatusResult<Option<Entity>> {
        Ok(self.state.borrow().entities.get(&id).cloned())
    }

    fn find_all_in_scope(&self, kind: EntityKind, scope: ScopeId) -> StatusResult<Vec<Entity>> {
        Ok(self
            .state
            .borrow()
            .entities
            .values()
            .filter(|e| e.kind == kind && e.in_scope(scope))
            .cloned()
            .collect())
    }

    fn list(&self, kind: EntityKind) -> StatusResult<Vec<Entity>> {
        Ok(self
            .state
            .borrow()
            .entities
            .values()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect())
    }

    fn insert(&self, new: &NewEntity, status: Option<&str>, at: DateTime<Utc>) -> StatusResult<Entity> {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;

        let entity = Entity {
            id: EntityId(state.next_id),
            kind: new.kind,
            scope_id: new.scope_id,
            flags: new.flags.clone(),
            status: status.map(str::to_string),
            stamps: BTreeMap::new(),
            version: 1,
            created_at: at,
            updated_at: at,
        };

        state.check_exclusive(&entity)?;
        state.entities.insert(entity.id, entity.clone());
        Ok(entity)
    }

    fn save(&self, entity: &Entity) -> StatusResult<Entity> {
        let mut state = self.state.borrow_mut();

        let stored_version = state
            .entities
            .get(&entity.id)
            .map(|e| e.version)
            .ok_or(StatusError::NotFound { id: entity.id })?;

        if stored_version != entity.version {
            return Err(StatusError::ConcurrentModification {
                id: entity.id,
                expected: entity.version,
                found: stored_version,
            });
        }

        let mut saved = entity.clone();
        saved.version += 1;
        state.check_exclusive(&saved)?;
        state.entities.insert(saved.id, saved.clone());
        Ok(saved)
    }

    fn count(&self, kind: EntityKind) -> StatusResult<u64> {
        let state = self.state.borrow();
        Ok(state.entities.values().filter(|e| e.kind == kind).count() as u64)
    }

    fn count_flag(&self, kind: EntityKind, flag: &str, value: bool) -> StatusResult<u64> {
        let state = self.state.borrow();
        Ok(state
            .entities
            .values()
            .filter(|e| e.kind == kind && e.flag(flag) == value)
            .count() as u64)
    }

    fn count_by_status(&self, kind: EntityKind) -> StatusResult<BTreeMap<String, u64>> {
        let state = self.state.borrow();
        let mut counts = BTreeMap::new();
        for entity in state.entities.values().filter(|e| e.kind == kind) {
            if let Some(status) = &entity.status {
                *counts.entry(status.clone()).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    fn record_usage(&self, id: EntityId, reference: &str, at: DateTime<Utc>) -> StatusResult<()> {
        let mut state = self.state.borrow_mut();
        if !state.entities.contains_key(&id) {
            return Err(StatusError::NotFound { id });
        }
        state.usages.push((id, reference.to_string(), at));
        Ok(())
    }

    fn usage_count(&self, id: EntityId) -> StatusResult<u64> {
        let state = self.state.borrow();
        Ok(state.usages.iter().filter(|(used, _, _)| *used == id).count() as u64)
    }

    fn append_event(&self, event: &StatusEvent) -> StatusResult<()> {
        self.state.borrow_mut().events.push(event.clone());
        Ok(())
    }

    fn recent_events(&self, limit: usize) -> StatusResult<Vec<StatusEvent>> {
        let state = self.state.borrow();
        let mut events = state.events.clone();
        // Newest insert first among equal timestamps
        events.reverse();
        events.sort_by(|a, b| b.at.cmp(&a.at));
        events.truncate(limit);
        Ok(events)
    }
}
