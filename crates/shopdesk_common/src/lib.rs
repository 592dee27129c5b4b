//! Shopdesk Common - Entity status management for the shop back-office
//!
//! Exclusive flags per scope, plain flag toggles, lifecycle-checked status
//! transitions with timestamp stamping, navigation badges and bulk updates.
//! Storage is SQLite; an in-memory store backs tests.

pub mod badge;
pub mod bulk;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod entity;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod manager;
pub mod status;
pub mod store;
pub mod totals;

pub use badge::{compute_badge, Badge, BadgeCounts, ColorTier};
pub use bulk::{BulkRejection, BulkReport};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BulkMode, ShopdeskConfig};
pub use entity::{Entity, EntityId, EntityKind, NewEntity, ScopeId};
pub use error::{StatusError, StatusResult};
pub use events::{EventAction, StatusEvent};
pub use lifecycle::{Lifecycle, LifecycleId, StampTable, StatusEnum, Tone, TransitionTable};
pub use manager::{Lifecycles, StatusManager};
pub use status::{CampaignStatus, OrderStatus, ReferralStatus};
pub use store::{EntityRepo, EntityStore, MemoryStore, SqliteStore};
pub use totals::OrderAmounts;
