//! Status Manager - flag and status transitions over an entity store
//!
//! Every mutation runs inside one store transaction and appends a journal
//! event in that same transaction. Retryable store conflicts are retried up
//! to `ManagerConfig::max_conflict_retries` times.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::badge::{compute_badge, Badge, BadgeCounts};
use crate::bulk::{dedupe_ids, BulkRejection, BulkReport};
use crate::catalog::{self, FlagSpec};
use crate::clock::{Clock, SystemClock};
use crate::config::{BulkMode, ManagerConfig};
use crate::entity::{Entity, EntityId, EntityKind, NewEntity, ScopeId};
use crate::error::{StatusError, StatusResult};
use crate::events::{EventAction, StatusEvent};
use crate::lifecycle::{Lifecycle, LifecycleId, StatusEnum};
use crate::status::{CampaignStatus, OrderStatus, ReferralStatus};
use crate::store::{EntityRepo, EntityStore};

/// Lifecycles the manager applies for name-based transitions
#[derive(Debug, Clone)]
pub struct Lifecycles {
    pub order: Lifecycle<OrderStatus>,
    pub referral: Lifecycle<ReferralStatus>,
    pub campaign: Lifecycle<CampaignStatus>,
}

impl Default for Lifecycles {
    fn default() -> Self {
        Self {
            order: OrderStatus::lifecycle(),
            referral: ReferralStatus::lifecycle(),
            campaign: CampaignStatus::lifecycle(),
        }
    }
}

impl Lifecycles {
    pub fn initial(&self, id: LifecycleId) -> &'static str {
        match id {
            LifecycleId::Order => self.order.initial.as_str(),
            LifecycleId::Referral => self.referral.initial.as_str(),
            LifecycleId::Campaign => self.campaign.initial.as_str(),
        }
    }
}

fn load(repo: &dyn EntityRepo, id: EntityId) -> StatusResult<Entity> {
    repo.find(id)?.ok_or(StatusError::NotFound { id })
}

/// Set a flag value, stamping its timestamp on a false -> true change
fn apply_flag(entity: &mut Entity, spec: &FlagSpec, value: bool, now: DateTime<Utc>) {
    let was = entity.flag(spec.name);
    entity.flags.insert(spec.name.to_string(), value);
    if value && !was {
        if let Some(field) = spec.stamp_on_set {
            entity.stamps.insert(field.to_string(), now);
        }
    }
    entity.updated_at = now;
}

fn flag_detail(flag: &str, value: bool) -> String {
    format!("{}={}", flag, value)
}

/// Entity status manager
pub struct StatusManager<S: EntityStore> {
    store: S,
    clock: Arc<dyn Clock>,
    lifecycles: Lifecycles,
    config: ManagerConfig,
}

impl<S: EntityStore> StatusManager<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            lifecycles: Lifecycles::default(),
            config: ManagerConfig::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_lifecycles(mut self, lifecycles: Lifecycles) -> Self {
        self.lifecycles = lifecycles;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn lifecycles(&self) -> &Lifecycles {
        &self.lifecycles
    }

    /// Run `op`, retrying retryable failures
    fn with_retries<R>(&self, name: &str, op: impl Fn() -> StatusResult<R>) -> StatusResult<R> {
        let retries = self.config.effective_conflict_retries();
        let mut attempt = 0;
        loop {
            match op() {
                Err(err) if err.is_retryable() && attempt < retries => {
                    attempt += 1;
                    warn!("{}: {} (retry {}/{})", name, err, attempt, retries);
                }
                other => return other,
            }
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn find(&self, id: EntityId) -> StatusResult<Entity> {
        self.store.atomically(|repo| load(repo, id))
    }

    pub fn list(&self, kind: EntityKind) -> StatusResult<Vec<Entity>> {
        self.store.atomically(|repo| repo.list(kind))
    }

    pub fn list_in_scope(&self, kind: EntityKind, scope: ScopeId) -> StatusResult<Vec<Entity>> {
        self.store.atomically(|repo| repo.find_all_in_scope(kind, scope))
    }

    /// "N/M active" badge for a kind, counted now
    pub fn navigation_badge(&self, kind: EntityKind, flag: &str) -> StatusResult<Badge> {
        catalog::schema(kind).require_flag(flag)?;
        let counts = self.store.atomically(|repo| {
            Ok(BadgeCounts {
                total: repo.count(kind)?,
                active: repo.count_flag(kind, flag, true)?,
            })
        })?;
        debug!("Badge counts for {}.{}: {}/{}", kind, flag, counts.active, counts.total);
        Ok(compute_badge(counts))
    }

    /// Entity count per status value
    pub fn status_summary(&self, kind: EntityKind) -> StatusResult<BTreeMap<String, u64>> {
        if catalog::schema(kind).lifecycle.is_none() {
            return Err(StatusError::NoLifecycle { kind });
        }
        self.store.atomically(|repo| repo.count_by_status(kind))
    }

    pub fn usage_count(&self, id: EntityId) -> StatusResult<u64> {
        self.store.atomically(|repo| {
            load(repo, id)?;
            repo.usage_count(id)
        })
    }

    pub fn recent_events(&self, limit: usize) -> StatusResult<Vec<StatusEvent>> {
        self.store.atomically(|repo| repo.recent_events(limit))
    }

    // ------------------------------------------------------------------
    // Intake
    // ------------------------------------------------------------------

    /// Create an entity in its lifecycle's initial status
    pub fn create(&self, mut new: NewEntity) -> StatusResult<Entity> {
        let schema = catalog::schema(new.kind);
        if schema.scoped && new.scope_id.is_none() {
            return Err(StatusError::MissingScope { kind: new.kind });
        }
        for name in new.flags.keys() {
            schema.require_flag(name)?;
        }
        // Every declared flag is stored; unspecified ones start off
        for spec in schema.flags {
            new.flags.entry(spec.name.to_string()).or_insert(false);
        }
        let status = schema.lifecycle.map(|id| self.lifecycles.initial(id));

        let created = self.with_retries("create", || {
            self.store.atomically(|repo| {
                let now = self.clock.now();

                if let Some(scope) = new.scope_id {
                    for spec in schema.exclusive_flags().filter(|s| new.flags.get(s.name) == Some(&true)) {
                        self.clear_exclusive(repo, new.kind, scope, spec.name, None, now)?;
                    }
                }

                let mut entity = repo.insert(&new, status, now)?;
                let stamped: Vec<_> = schema
                    .flags
                    .iter()
                    .filter(|s| new.flags.get(s.name) == Some(&true))
                    .filter_map(|s| s.stamp_on_set)
                    .collect();
                if !stamped.is_empty() {
                    for field in stamped {
                        entity.stamps.insert(field.to_string(), now);
                    }
                    entity = repo.save(&entity)?;
                }

                repo.append_event(&StatusEvent::new(
                    entity.id,
                    entity.kind,
                    EventAction::Created,
                    status.unwrap_or(""),
                    now,
                ))?;
                Ok(entity)
            })
        })?;

        info!("Created {} {}", created.kind, created.id);
        Ok(created)
    }

    /// Duplicate an entity: exclusive flags off, initial status, stamps only for copied stamped flags
    pub fn replicate(&self, id: EntityId) -> StatusResult<Entity> {
        let copy = self.with_retries("replicate", || {
            self.store.atomically(|repo| {
                let source = load(repo, id)?;
                let schema = catalog::schema(source.kind);
                let now = self.clock.now();

                let mut new = NewEntity::new(source.kind);
                new.scope_id = source.scope_id;
                for (name, value) in &source.flags {
                    let keep = schema.flag(name).map(|spec| !spec.exclusive).unwrap_or(false);
                    new.flags.insert(name.clone(), keep && *value);
                }

                let status = schema.lifecycle.map(|lc| self.lifecycles.initial(lc));
                let mut copy = repo.insert(&new, status, now)?;

                // Source stamps are not carried over; copied stamped flags get a fresh one
                let stamped: Vec<_> = schema
                    .flags
                    .iter()
                    .filter(|s| copy.flag(s.name))
                    .filter_map(|s| s.stamp_on_set)
                    .collect();
                if !stamped.is_empty() {
                    for field in stamped {
                        copy.stamps.insert(field.to_string(), now);
                    }
                    copy = repo.save(&copy)?;
                }

                repo.append_event(&StatusEvent::new(
                    copy.id,
                    copy.kind,
                    EventAction::Replicated,
                    format!("from {}", source.id),
                    now,
                ))?;
                Ok(copy)
            })
        })?;

        info!("Replicated {} {} as {}", copy.kind, id, copy.id);
        Ok(copy)
    }

    // ------------------------------------------------------------------
    // Flags
    // ------------------------------------------------------------------

    /// Clear `flag` on every entity of `kind` in `scope` except `keep`
    fn clear_exclusive(
        &self,
        repo: &dyn EntityRepo,
        kind: EntityKind,
        scope: ScopeId,
        flag: &str,
        keep: Option<EntityId>,
        now: DateTime<Utc>,
    ) -> StatusResult<usize> {
        let mut cleared = 0;
        for mut sibling in repo.find_all_in_scope(kind, scope)? {
            if Some(sibling.id) == keep || !sibling.flag(flag) {
                continue;
            }
            sibling.flags.insert(flag.to_string(), false);
            sibling.updated_at = now;
            repo.save(&sibling)?;
            repo.append_event(&StatusEvent::new(
                sibling.id,
                kind,
                EventAction::ExclusiveFlagCleared,
                flag_detail(flag, false),
                now,
            ))?;
            cleared += 1;
        }
        Ok(cleared)
    }

    /// Make `id` the only entity in `scope` holding `flag`
    pub fn set_exclusive_flag(&self, scope: ScopeId, id: EntityId, flag: &str) -> StatusResult<Entity> {
        let (entity, cleared) = self.with_retries("set_exclusive_flag", || {
            self.store.atomically(|repo| {
                let mut target = load(repo, id)?;
                if !target.in_scope(scope) {
                    return Err(StatusError::NotFound { id });
                }

                let spec = *catalog::schema(target.kind).require_flag(flag)?;
                if !spec.exclusive {
                    return Err(StatusError::FlagNotExclusive {
                        kind: target.kind,
                        flag: flag.to_string(),
                    });
                }

                let now = self.clock.now();
                let cleared = self.clear_exclusive(repo, target.kind, scope, flag, Some(id), now)?;
                if target.flag(flag) {
                    return Ok((target, cleared));
                }

                apply_flag(&mut target, &spec, true, now);
                let saved = repo.save(&target)?;
                repo.append_event(&StatusEvent::new(
                    saved.id,
                    saved.kind,
                    EventAction::ExclusiveFlagSet,
                    flag_detail(flag, true),
                    now,
                ))?;
                Ok((saved, cleared))
            })
        })?;

        info!(
            "Set {} on {} {} in scope {} ({} cleared)",
            flag, entity.kind, id, scope, cleared
        );
        Ok(entity)
    }

    /// Flip a non-exclusive flag; returns the new value
    pub fn toggle_flag(&self, id: EntityId, flag: &str) -> StatusResult<bool> {
        let value = self.with_retries("toggle_flag", || {
            self.store.atomically(|repo| {
                let mut entity = load(repo, id)?;
                let spec = self.plain_flag(entity.kind, flag)?;
                let value = !entity.flag(flag);
                let now = self.clock.now();

                apply_flag(&mut entity, &spec, value, now);
                repo.save(&entity)?;
                repo.append_event(&StatusEvent::new(
                    id,
                    entity.kind,
                    EventAction::FlagChanged,
                    flag_detail(flag, value),
                    now,
                ))?;
                Ok(value)
            })
        })?;

        info!("Toggled {} on {} to {}", flag, id, value);
        Ok(value)
    }

    /// Set a non-exclusive flag to `value`
    pub fn set_flag(&self, id: EntityId, flag: &str, value: bool) -> StatusResult<Entity> {
        let entity = self.with_retries("set_flag", || {
            self.store
                .atomically(|repo| self.set_flag_in(repo, id, flag, value, false))
        })?;
        info!("Set {}={} on {}", flag, value, id);
        Ok(entity)
    }

    /// Flag spec that may be written without the exclusivity protocol
    fn plain_flag(&self, kind: EntityKind, flag: &str) -> StatusResult<FlagSpec> {
        let spec = *catalog::schema(kind).require_flag(flag)?;
        if spec.exclusive {
            return Err(StatusError::FlagIsExclusive {
                kind,
                flag: flag.to_string(),
            });
        }
        Ok(spec)
    }

    /// Write a flag inside an open transaction.
    ///
    /// `allow_clear_exclusive` lets bulk updates switch an exclusive flag off;
    /// switching one on always goes through `set_exclusive_flag`.
    fn set_flag_in(
        &self,
        repo: &dyn EntityRepo,
        id: EntityId,
        flag: &str,
        value: bool,
        allow_clear_exclusive: bool,
    ) -> StatusResult<Entity> {
        let mut entity = load(repo, id)?;
        let spec = match self.plain_flag(entity.kind, flag) {
            Ok(spec) => spec,
            Err(StatusError::FlagIsExclusive { .. }) if allow_clear_exclusive && !value => {
                *catalog::schema(entity.kind).require_flag(flag)?
            }
            Err(err) => return Err(err),
        };

        if entity.flags.get(flag) == Some(&value) {
            return Ok(entity);
        }

        let now = self.clock.now();
        apply_flag(&mut entity, &spec, value, now);
        let saved = repo.save(&entity)?;
        repo.append_event(&StatusEvent::new(
            id,
            saved.kind,
            EventAction::FlagChanged,
            flag_detail(flag, value),
            now,
        ))?;
        Ok(saved)
    }

    /// Set `flag` to `value` on many entities; `BulkMode` decides failure handling
    pub fn bulk_apply(&self, ids: &[EntityId], flag: &str, value: bool) -> StatusResult<BulkReport> {
        let ids = dedupe_ids(ids);
        let mode = self.config.bulk_mode;
        let mut report = BulkReport::new(mode);

        match mode {
            BulkMode::Atomic => {
                report.updated = self.with_retries("bulk_apply", || {
                    self.store.atomically(|repo| {
                        let mut found = Vec::new();
                        let mut missing = Vec::new();
                        for id in &ids {
                            match repo.find(*id)? {
                                Some(_) => found.push(*id),
                                None => missing.push(*id),
                            }
                        }
                        if !missing.is_empty() {
                            return Err(StatusError::BulkAborted { missing, found });
                        }

                        for id in &found {
                            self.set_flag_in(repo, *id, flag, value, true)?;
                        }
                        Ok(found)
                    })
                })?;
            }
            BulkMode::BestEffort => {
                for id in &ids {
                    let outcome = self.with_retries("bulk_apply", || {
                        self.store
                            .atomically(|repo| self.set_flag_in(repo, *id, flag, value, true))
                    });
                    match outcome {
                        Ok(_) => report.updated.push(*id),
                        Err(StatusError::NotFound { .. }) => report.missing.push(*id),
                        Err(err) => report.rejected.push(BulkRejection::new(*id, &err)),
                    }
                }
            }
        }

        if report.is_complete() {
            info!("Bulk set {}={} on {} entities", flag, value, report.updated.len());
        } else {
            warn!(
                "Bulk set {}={}: {} updated, {} missing, {} rejected",
                flag,
                value,
                report.updated.len(),
                report.missing.len(),
                report.rejected.len()
            );
        }
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------

    /// Move `id` to `target` if the lifecycle allows the edge
    pub fn transition_status<T: StatusEnum>(
        &self,
        id: EntityId,
        target: T,
        lifecycle: &Lifecycle<T>,
    ) -> StatusResult<Entity> {
        let (entity, from) = self.with_retries("transition_status", || {
            self.store.atomically(|repo| {
                let mut entity = load(repo, id)?;
                if catalog::schema(entity.kind).lifecycle != Some(T::LIFECYCLE) {
                    return Err(StatusError::NoLifecycle { kind: entity.kind });
                }

                let current = entity
                    .status
                    .as_deref()
                    .and_then(T::parse)
                    .ok_or_else(|| StatusError::CorruptStatus {
                        id,
                        status: entity.status.clone(),
                    })?;

                if !lifecycle.can_transition(current, target) {
                    return Err(StatusError::InvalidTransition {
                        from: current.as_str().to_string(),
                        to: target.as_str().to_string(),
                    });
                }

                let now = self.clock.now();
                entity.status = Some(target.as_str().to_string());
                if let Some(field) = lifecycle.stamp_field(target) {
                    entity.stamps.insert(field.to_string(), now);
                }
                entity.updated_at = now;

                let saved = repo.save(&entity)?;
                repo.append_event(&StatusEvent::new(
                    id,
                    saved.kind,
                    EventAction::StatusChanged,
                    format!("{} -> {}", current.as_str(), target.as_str()),
                    now,
                ))?;
                Ok((saved, current))
            })
        })
        .map_err(|err| {
            if let StatusError::InvalidTransition { from, to } = &err {
                warn!("Rejected transition of {} from {} to {}", id, from, to);
            }
            err
        })?;

        info!("{} {} moved {} -> {}", entity.kind, id, from.as_str(), target.as_str());
        Ok(entity)
    }

    /// Transition by status name using the configured lifecycle for the entity's kind
    pub fn transition_named(&self, id: EntityId, target: &str) -> StatusResult<Entity> {
        let entity = self.find(id)?;
        let lifecycle = catalog::schema(entity.kind)
            .lifecycle
            .ok_or(StatusError::NoLifecycle { kind: entity.kind })?;

        let unknown = || StatusError::InvalidTransition {
            from: entity.status.clone().unwrap_or_default(),
            to: target.to_string(),
        };

        match lifecycle {
            LifecycleId::Order => {
                let status = OrderStatus::parse(target).ok_or_else(unknown)?;
                self.transition_status(id, status, &self.lifecycles.order)
            }
            LifecycleId::Referral => {
                let status = ReferralStatus::parse(target).ok_or_else(unknown)?;
                self.transition_status(id, status, &self.lifecycles.referral)
            }
            LifecycleId::Campaign => {
                let status = CampaignStatus::parse(target).ok_or_else(unknown)?;
                self.transition_status(id, status, &self.lifecycles.campaign)
            }
        }
    }

    // ------------------------------------------------------------------
    // Usage
    // ------------------------------------------------------------------

    /// Record one use of a discount or campaign; returns the new count
    pub fn record_usage(&self, id: EntityId, reference: &str) -> StatusResult<u64> {
        let count = self.with_retries("record_usage", || {
            self.store.atomically(|repo| {
                let entity = load(repo, id)?;
                if !catalog::schema(entity.kind).tracks_usage {
                    return Err(StatusError::UsageNotTracked { kind: entity.kind });
                }

                let now = self.clock.now();
                repo.record_usage(id, reference, now)?;
                repo.append_event(&StatusEvent::new(
                    id,
                    entity.kind,
                    EventAction::UsageRecorded,
                    reference,
                    now,
                ))?;
                repo.usage_count(id)
            })
        })?;

        debug!("Usage recorded on {} ({} total)", id, count);
        Ok(count)
    }
}
