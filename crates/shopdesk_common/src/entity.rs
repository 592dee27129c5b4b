//! Entities - identifiers, kinds and the persisted entity record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Entity identifier (row id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub i64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Partition key for exclusive flags (owner user, product, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(pub i64);

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Back-office entity kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Address,
    Order,
    Referral,
    Subscriber,
    Product,
    ProductSlug,
    Campaign,
    Discount,
    WishlistItem,
    SystemSetting,
}

impl EntityKind {
    pub const ALL: [EntityKind; 10] = [
        EntityKind::Address,
        EntityKind::Order,
        EntityKind::Referral,
        EntityKind::Subscriber,
        EntityKind::Product,
        EntityKind::ProductSlug,
        EntityKind::Campaign,
        EntityKind::Discount,
        EntityKind::WishlistItem,
        EntityKind::SystemSetting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Address => "address",
            EntityKind::Order => "order",
            EntityKind::Referral => "referral",
            EntityKind::Subscriber => "subscriber",
            EntityKind::Product => "product",
            EntityKind::ProductSlug => "product_slug",
            EntityKind::Campaign => "campaign",
            EntityKind::Discount => "discount",
            EntityKind::WishlistItem => "wishlist_item",
            EntityKind::SystemSetting => "system_setting",
        }
    }

    /// Parse from string (case-insensitive, `-` and `_` interchangeable)
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        match normalized.as_str() {
            "address" | "addresses" => Some(EntityKind::Address),
            "order" | "orders" => Some(EntityKind::Order),
            "referral" | "referrals" => Some(EntityKind::Referral),
            "subscriber" | "subscribers" => Some(EntityKind::Subscriber),
            "product" | "products" => Some(EntityKind::Product),
            "product_slug" | "slug" | "slugs" => Some(EntityKind::ProductSlug),
            "campaign" | "campaigns" => Some(EntityKind::Campaign),
            "discount" | "discounts" => Some(EntityKind::Discount),
            "wishlist_item" | "wishlist" => Some(EntityKind::WishlistItem),
            "system_setting" | "setting" | "settings" => Some(EntityKind::SystemSetting),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted entity with its flags, status and stamped timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope_id: Option<ScopeId>,
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub stamps: BTreeMap<String, DateTime<Utc>>,
    /// Bumped on every save; used to detect concurrent writers
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity {
    /// Flag value; undeclared or never-set flags read as false
    pub fn flag(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }

    pub fn stamp(&self, field: &str) -> Option<DateTime<Utc>> {
        self.stamps.get(field).copied()
    }

    pub fn in_scope(&self, scope: ScopeId) -> bool {
        self.scope_id == Some(scope)
    }
}

/// Intake payload for a new entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEntity {
    pub kind: EntityKind,
    pub scope_id: Option<ScopeId>,
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,
}

impl NewEntity {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            scope_id: None,
            flags: BTreeMap::new(),
        }
    }

    pub fn in_scope(mut self, scope: ScopeId) -> Self {
        self.scope_id = Some(scope);
        self
    }

    pub fn with_flag(mut self, name: impl Into<String>, value: bool) -> Self {
        self.flags.insert(name.into(), value);
        self
    }
}
