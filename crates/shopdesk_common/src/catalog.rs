//! Catalog - per-kind flag declarations and lifecycle bindings

use crate::entity::EntityKind;
use crate::error::{StatusError, StatusResult};
use crate::lifecycle::LifecycleId;

/// Declaration of a boolean flag on an entity kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagSpec {
    pub name: &'static str,
    /// At most one entity per scope may hold this flag
    pub exclusive: bool,
    /// Timestamp field stamped when the flag goes false -> true
    pub stamp_on_set: Option<&'static str>,
}

const fn flag(name: &'static str) -> FlagSpec {
    FlagSpec {
        name,
        exclusive: false,
        stamp_on_set: None,
    }
}

const fn exclusive(name: &'static str) -> FlagSpec {
    FlagSpec {
        name,
        exclusive: true,
        stamp_on_set: None,
    }
}

const fn stamped(name: &'static str, field: &'static str) -> FlagSpec {
    FlagSpec {
        name,
        exclusive: false,
        stamp_on_set: Some(field),
    }
}

/// Schema of one entity kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitySchema {
    pub kind: EntityKind,
    pub flags: &'static [FlagSpec],
    /// Whether entities of this kind must carry a scope id
    pub scoped: bool,
    pub lifecycle: Option<LifecycleId>,
    /// Whether usages are counted for this kind
    pub tracks_usage: bool,
}

const ADDRESS_FLAGS: &[FlagSpec] = &[exclusive("is_default"), flag("is_billing"), flag("is_shipping")];
const ORDER_FLAGS: &[FlagSpec] = &[stamped("is_paid", "paid_at")];
const SUBSCRIBER_FLAGS: &[FlagSpec] = &[flag("is_active"), stamped("is_verified", "verified_at")];
const PRODUCT_FLAGS: &[FlagSpec] = &[flag("is_active"), flag("is_visible"), flag("is_featured")];
const SLUG_FLAGS: &[FlagSpec] = &[exclusive("is_canonical")];
const NO_FLAGS: &[FlagSpec] = &[];
const ACTIVE_FLAG: &[FlagSpec] = &[flag("is_active")];
const PUBLIC_FLAG: &[FlagSpec] = &[flag("is_public")];

/// Schema for an entity kind
pub fn schema(kind: EntityKind) -> EntitySchema {
    let (flags, scoped, lifecycle, tracks_usage) = match kind {
        EntityKind::Address => (ADDRESS_FLAGS, true, None, false),
        EntityKind::Order => (ORDER_FLAGS, true, Some(LifecycleId::Order), false),
        EntityKind::Referral => (NO_FLAGS, true, Some(LifecycleId::Referral), false),
        EntityKind::Subscriber => (SUBSCRIBER_FLAGS, false, None, false),
        EntityKind::Product => (PRODUCT_FLAGS, false, None, false),
        EntityKind::ProductSlug => (SLUG_FLAGS, true, None, false),
        EntityKind::Campaign => (ACTIVE_FLAG, false, Some(LifecycleId::Campaign), true),
        EntityKind::Discount => (ACTIVE_FLAG, false, None, true),
        EntityKind::WishlistItem => (PUBLIC_FLAG, true, None, false),
        EntityKind::SystemSetting => (PUBLIC_FLAG, false, None, false),
    };

    EntitySchema {
        kind,
        flags,
        scoped,
        lifecycle,
        tracks_usage,
    }
}

impl EntitySchema {
    pub fn flag(&self, name: &str) -> Option<&FlagSpec> {
        self.flags.iter().find(|f| f.name == name)
    }

    /// Look up a flag, failing with `UnknownFlag`
    pub fn require_flag(&self, name: &str) -> StatusResult<&FlagSpec> {
        self.flag(name).ok_or_else(|| StatusError::UnknownFlag {
            kind: self.kind,
            flag: name.to_string(),
        })
    }

    pub fn exclusive_flags(&self) -> impl Iterator<Item = &FlagSpec> {
        self.flags.iter().filter(|f| f.exclusive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_default_is_exclusive() {
        let address = schema(EntityKind::Address);
        assert!(address.scoped);
        assert!(address.require_flag("is_default").unwrap().exclusive);
        assert!(!address.require_flag("is_billing").unwrap().exclusive);
    }

    #[test]
    fn test_unknown_flag() {
        let product = schema(EntityKind::Product);
        let err = product.require_flag("is_default").unwrap_err();
        assert_eq!(
            err,
            StatusError::UnknownFlag {
                kind: EntityKind::Product,
                flag: "is_default".to_string()
            }
        );
    }

    #[test]
    fn test_exclusive_flags_require_scope() {
        for kind in EntityKind::ALL {
            let s = schema(kind);
            if s.exclusive_flags().next().is_some() {
                assert!(s.scoped, "{} has exclusive flags but no scope", kind);
            }
        }
    }

    #[test]
    fn test_lifecycle_bindings() {
        assert_eq!(schema(EntityKind::Order).lifecycle, Some(LifecycleId::Order));
        assert_eq!(schema(EntityKind::Referral).lifecycle, Some(LifecycleId::Referral));
        assert_eq!(schema(EntityKind::Campaign).lifecycle, Some(LifecycleId::Campaign));
        assert_eq!(schema(EntityKind::Product).lifecycle, None);
    }

    #[test]
    fn test_verified_flag_stamps() {
        let subscriber = schema(EntityKind::Subscriber);
        assert_eq!(
            subscriber.require_flag("is_verified").unwrap().stamp_on_set,
            Some("verified_at")
        );
    }
}
