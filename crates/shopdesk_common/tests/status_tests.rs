//! Behavioural tests for the status manager.
//!
//! Every property runs against both the in-memory and the SQLite store:
//! - Exactly one holder of an exclusive flag per scope
//! - Toggling twice restores the flag
//! - Disallowed transitions leave the status unchanged
//! - Badge labels and tiers
//! - Shipping/delivery timestamp stamping
//! - The default-address scenario

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use std::thread;

use shopdesk_common::config::ManagerConfig;
use shopdesk_common::{
    compute_badge, BadgeCounts, BulkMode, ColorTier, EntityId, EntityKind, EntityStore,
    ManualClock, MemoryStore, NewEntity, OrderStatus, ReferralStatus, ScopeId, SqliteStore,
    StatusEnum, StatusError, StatusManager,
};
use tempfile::TempDir;

fn at(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339)
        .unwrap()
        .with_timezone(&Utc)
}

fn with_clock<S: EntityStore>(store: S) -> (StatusManager<S>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(at("2026-03-10T10:00:00Z")));
    (StatusManager::new(store).with_clock(clock.clone()), clock)
}

fn sqlite() -> (TempDir, SqliteStore) {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::open_at(dir.path().join("shopdesk.db")).unwrap();
    (dir, store)
}

fn holders<S: EntityStore>(m: &StatusManager<S>, scope: i64) -> Vec<EntityId> {
    m.list_in_scope(EntityKind::Address, ScopeId(scope))
        .unwrap()
        .into_iter()
        .filter(|e| e.flag("is_default"))
        .map(|e| e.id)
        .collect()
}

// ============================================================================
// Exclusivity
// ============================================================================

fn exclusivity_holds_over_sequences<S: EntityStore>(store: S) {
    let (m, clock) = with_clock(store);
    let mut ids = Vec::new();
    for i in 0..6 {
        let scope = if i % 2 == 0 { 7 } else { 8 };
        ids.push(
            m.create(NewEntity::new(EntityKind::Address).in_scope(ScopeId(scope)))
                .unwrap(),
        );
    }

    // Fixed pseudo-random walk over the six addresses
    let mut seed: u64 = 0x5eed;
    for _ in 0..40 {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let pick = &ids[(seed >> 33) as usize % ids.len()];
        let scope = pick.scope_id.unwrap();
        clock.advance(Duration::seconds(1));

        let updated = m.set_exclusive_flag(scope, pick.id, "is_default").unwrap();
        assert!(updated.flag("is_default"));
        assert_eq!(holders(&m, scope.0), vec![pick.id]);
    }

    for scope in [7, 8] {
        assert!(holders(&m, scope).len() <= 1);
    }
}

#[test]
fn test_exclusivity_memory() {
    exclusivity_holds_over_sequences(MemoryStore::new());
}

#[test]
fn test_exclusivity_sqlite() {
    let (_dir, store) = sqlite();
    exclusivity_holds_over_sequences(store);
}

#[test]
fn test_exclusivity_across_connections() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("shopdesk.db");

    let setup = StatusManager::new(SqliteStore::open_at(&path).unwrap());
    let ids: Vec<EntityId> = (0..4)
        .map(|_| {
            setup
                .create(NewEntity::new(EntityKind::Address).in_scope(ScopeId(7)))
                .unwrap()
                .id
        })
        .collect();

    let workers: Vec<_> = ids
        .iter()
        .map(|id| {
            let path = path.clone();
            let id = *id;
            thread::spawn(move || {
                let config = ManagerConfig {
                    max_conflict_retries: 5,
                    ..Default::default()
                };
                let m = StatusManager::new(SqliteStore::open_at(&path).unwrap()).with_config(config);
                for _ in 0..5 {
                    m.set_exclusive_flag(ScopeId(7), id, "is_default").unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(holders(&setup, 7).len(), 1);
}

// ============================================================================
// Toggle
// ============================================================================

fn toggle_is_an_involution<S: EntityStore>(store: S) {
    let (m, _) = with_clock(store);
    for start in [false, true] {
        let s = m
            .create(NewEntity::new(EntityKind::Subscriber).with_flag("is_active", start))
            .unwrap();
        assert_eq!(m.toggle_flag(s.id, "is_active").unwrap(), !start);
        assert_eq!(m.toggle_flag(s.id, "is_active").unwrap(), start);
        assert_eq!(m.find(s.id).unwrap().flag("is_active"), start);
    }

    let err = m.toggle_flag(EntityId(999), "is_active").unwrap_err();
    assert_eq!(err, StatusError::NotFound { id: EntityId(999) });
}

#[test]
fn test_toggle_memory() {
    toggle_is_an_involution(MemoryStore::new());
}

#[test]
fn test_toggle_sqlite() {
    let (_dir, store) = sqlite();
    toggle_is_an_involution(store);
}

// ============================================================================
// Transition validity
// ============================================================================

fn disallowed_referral_edges_are_rejected<S: EntityStore>(store: S) {
    let (m, _) = with_clock(store);
    let lc = ReferralStatus::lifecycle();

    // Walk each reachable state and try every target from it
    let paths: [&[ReferralStatus]; 4] = [
        &[],
        &[ReferralStatus::Approved],
        &[ReferralStatus::Approved, ReferralStatus::Completed],
        &[ReferralStatus::Rejected],
    ];
    for path in paths {
        for target in ReferralStatus::all() {
            let r = m
                .create(NewEntity::new(EntityKind::Referral).in_scope(ScopeId(1)))
                .unwrap();
            for step in path {
                m.transition_status(r.id, *step, &lc).unwrap();
            }
            let before = m.find(r.id).unwrap();
            let current = ReferralStatus::parse(before.status.as_deref().unwrap()).unwrap();

            let result = m.transition_status(r.id, *target, &lc);
            if lc.can_transition(current, *target) {
                assert_eq!(result.unwrap().status.as_deref(), Some(target.as_str()));
            } else {
                assert!(matches!(result, Err(StatusError::InvalidTransition { .. })));
                assert_eq!(m.find(r.id).unwrap(), before);
            }
        }
    }
}

#[test]
fn test_transition_validity_memory() {
    disallowed_referral_edges_are_rejected(MemoryStore::new());
}

#[test]
fn test_transition_validity_sqlite() {
    let (_dir, store) = sqlite();
    disallowed_referral_edges_are_rejected(store);
}

// ============================================================================
// Badges
// ============================================================================

#[test]
fn test_badge_examples() {
    let full = compute_badge(BadgeCounts { total: 10, active: 10 });
    assert_eq!(full.label.as_deref(), Some("10"));
    assert_eq!(full.tier, ColorTier::Full);

    let none = compute_badge(BadgeCounts { total: 10, active: 0 });
    assert!(none.label.is_none());
    assert_eq!(none.tier, ColorTier::None);

    let partial = compute_badge(BadgeCounts { total: 10, active: 4 });
    assert_eq!(partial.label.as_deref(), Some("4/10"));
    assert_eq!(partial.tier, ColorTier::Partial);
}

#[test]
fn test_navigation_badge_sqlite() {
    let (_dir, store) = sqlite();
    let (m, _) = with_clock(store);
    for i in 0..10 {
        m.create(NewEntity::new(EntityKind::Discount).with_flag("is_active", i < 4))
            .unwrap();
    }
    let badge = m.navigation_badge(EntityKind::Discount, "is_active").unwrap();
    assert_eq!(badge.label.as_deref(), Some("4/10"));
    assert_eq!(badge.tier, ColorTier::Partial);
}

// ============================================================================
// Timestamp stamping
// ============================================================================

fn shipping_stamps<S: EntityStore>(store: S) {
    let (m, clock) = with_clock(store);
    let lc = OrderStatus::lifecycle();
    let order = m
        .create(NewEntity::new(EntityKind::Order).in_scope(ScopeId(42)))
        .unwrap();
    m.transition_status(order.id, OrderStatus::Processing, &lc)
        .unwrap();

    clock.set(at("2026-03-11T15:30:00Z"));
    let shipped = m
        .transition_status(order.id, OrderStatus::Shipped, &lc)
        .unwrap();
    assert_eq!(shipped.stamp("shipped_at"), Some(at("2026-03-11T15:30:00Z")));
    assert_eq!(shipped.stamp("delivered_at"), None);

    clock.set(at("2026-03-13T09:00:00Z"));
    let delivered = m
        .transition_status(order.id, OrderStatus::Delivered, &lc)
        .unwrap();
    assert_eq!(delivered.stamp("delivered_at"), Some(at("2026-03-13T09:00:00Z")));
    assert_eq!(delivered.stamp("shipped_at"), Some(at("2026-03-11T15:30:00Z")));

    let reloaded = m.find(order.id).unwrap();
    assert_eq!(reloaded.stamps, delivered.stamps);
}

#[test]
fn test_stamping_memory() {
    shipping_stamps(MemoryStore::new());
}

#[test]
fn test_stamping_sqlite() {
    let (_dir, store) = sqlite();
    shipping_stamps(store);
}

// ============================================================================
// Default address scenario
// ============================================================================

fn default_address_scenario<S: EntityStore>(store: S) {
    let (m, _) = with_clock(store);
    let a = m
        .create(
            NewEntity::new(EntityKind::Address)
                .in_scope(ScopeId(7))
                .with_flag("is_default", false),
        )
        .unwrap();
    let b = m
        .create(
            NewEntity::new(EntityKind::Address)
                .in_scope(ScopeId(7))
                .with_flag("is_default", true),
        )
        .unwrap();

    m.set_exclusive_flag(ScopeId(7), a.id, "is_default").unwrap();

    assert!(m.find(a.id).unwrap().flag("is_default"));
    assert!(!m.find(b.id).unwrap().flag("is_default"));
}

#[test]
fn test_scenario_memory() {
    default_address_scenario(MemoryStore::new());
}

#[test]
fn test_scenario_sqlite() {
    let (_dir, store) = sqlite();
    default_address_scenario(store);
}

// ============================================================================
// Bulk updates
// ============================================================================

fn atomic_bulk_writes_nothing_on_missing<S: EntityStore>(store: S) {
    let (m, _) = with_clock(store);
    let a = m.create(NewEntity::new(EntityKind::Product)).unwrap();
    let b = m.create(NewEntity::new(EntityKind::Product)).unwrap();

    let err = m
        .bulk_apply(&[a.id, EntityId(77), b.id], "is_visible", true)
        .unwrap_err();
    assert!(matches!(err, StatusError::BulkAborted { .. }));
    assert!(!m.find(a.id).unwrap().flag("is_visible"));
    assert!(!m.find(b.id).unwrap().flag("is_visible"));

    let report = m.bulk_apply(&[a.id, b.id], "is_visible", true).unwrap();
    assert_eq!(report.mode, BulkMode::Atomic);
    assert_eq!(report.updated, vec![a.id, b.id]);
}

#[test]
fn test_bulk_atomic_memory() {
    atomic_bulk_writes_nothing_on_missing(MemoryStore::new());
}

#[test]
fn test_bulk_atomic_sqlite() {
    let (_dir, store) = sqlite();
    atomic_bulk_writes_nothing_on_missing(store);
}

#[test]
fn test_bulk_best_effort_sqlite() {
    let (_dir, store) = sqlite();
    let (m, _) = with_clock(store);
    let m = m.with_config(ManagerConfig {
        bulk_mode: BulkMode::BestEffort,
        ..Default::default()
    });
    let a = m.create(NewEntity::new(EntityKind::Product)).unwrap();

    let report = m.bulk_apply(&[a.id, EntityId(77)], "is_featured", true).unwrap();
    assert_eq!(report.updated, vec![a.id]);
    assert_eq!(report.missing, vec![EntityId(77)]);
    assert!(m.find(a.id).unwrap().flag("is_featured"));
}

// ============================================================================
// Journal and usage
// ============================================================================

#[test]
fn test_journal_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("shopdesk.db");
    let discount_id = {
        let (m, clock) = with_clock(SqliteStore::open_at(&path).unwrap());
        let d = m.create(NewEntity::new(EntityKind::Discount)).unwrap();
        clock.advance(Duration::seconds(5));
        m.record_usage(d.id, "order-100").unwrap();
        d.id
    };

    let m = StatusManager::new(SqliteStore::open_at(&path).unwrap());
    assert_eq!(m.usage_count(discount_id).unwrap(), 1);

    let events = m.recent_events(5).unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].detail, "order-100");
    assert_eq!(events[1].entity_id, discount_id);
}
