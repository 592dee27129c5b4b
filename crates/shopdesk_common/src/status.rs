//! Status enums for order-like, referral-like and campaign entities
//!
//! Each enum carries its standard lifecycle. Callers may build their own
//! `Lifecycle` instead and hand it to the manager.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::lifecycle::{Lifecycle, LifecycleId, StampTable, StatusEnum, Tone, TransitionTable};

// ============================================================================
// Orders
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    /// Legacy imported orders; nothing transitions into it
    Completed,
    Cancelled,
    Refunded,
}

impl StatusEnum for OrderStatus {
    const LIFECYCLE: LifecycleId = LifecycleId::Order;

    fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(OrderStatus::Pending),
            "processing" => Some(OrderStatus::Processing),
            "shipped" => Some(OrderStatus::Shipped),
            "delivered" => Some(OrderStatus::Delivered),
            "completed" => Some(OrderStatus::Completed),
            "cancelled" | "canceled" => Some(OrderStatus::Cancelled),
            "refunded" => Some(OrderStatus::Refunded),
            _ => None,
        }
    }

    fn all() -> &'static [Self] {
        &[
            OrderStatus::Pending,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
            OrderStatus::Refunded,
        ]
    }

    fn tone(&self) -> Tone {
        match self {
            OrderStatus::Pending => Tone::Warning,
            OrderStatus::Processing => Tone::Info,
            OrderStatus::Shipped => Tone::Primary,
            OrderStatus::Delivered | OrderStatus::Completed => Tone::Success,
            OrderStatus::Cancelled => Tone::Danger,
            OrderStatus::Refunded => Tone::Gray,
        }
    }
}

impl OrderStatus {
    pub fn lifecycle() -> Lifecycle<Self> {
        use OrderStatus::*;

        Lifecycle::new(Pending)
            .with_terminal(&[Delivered, Completed, Cancelled, Refunded])
            .with_transitions(
                TransitionTable::new()
                    .allow(Pending, Processing)
                    .allow(Processing, Shipped)
                    .allow(Shipped, Delivered)
                    .allow_from(&[Pending, Processing], Cancelled)
                    .allow_from(&[Delivered, Completed], Refunded),
            )
            .with_stamps(
                StampTable::new()
                    .stamp(Shipped, "shipped_at")
                    .stamp(Delivered, "delivered_at")
                    .stamp(Cancelled, "cancelled_at")
                    .stamp(Refunded, "refunded_at"),
            )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Referrals
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferralStatus {
    Pending,
    Approved,
    Completed,
    Rejected,
    /// Set by the expiry sweep, never by a manual transition
    Expired,
}

impl StatusEnum for ReferralStatus {
    const LIFECYCLE: LifecycleId = LifecycleId::Referral;

    fn as_str(&self) -> &'static str {
        match self {
            ReferralStatus::Pending => "pending",
            ReferralStatus::Approved => "approved",
            ReferralStatus::Completed => "completed",
            ReferralStatus::Rejected => "rejected",
            ReferralStatus::Expired => "expired",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(ReferralStatus::Pending),
            "approved" => Some(ReferralStatus::Approved),
            "completed" => Some(ReferralStatus::Completed),
            "rejected" => Some(ReferralStatus::Rejected),
            "expired" => Some(ReferralStatus::Expired),
            _ => None,
        }
    }

    fn all() -> &'static [Self] {
        &[
            ReferralStatus::Pending,
            ReferralStatus::Approved,
            ReferralStatus::Completed,
            ReferralStatus::Rejected,
            ReferralStatus::Expired,
        ]
    }

    fn tone(&self) -> Tone {
        match self {
            ReferralStatus::Pending => Tone::Warning,
            ReferralStatus::Approved => Tone::Info,
            ReferralStatus::Completed => Tone::Success,
            ReferralStatus::Rejected => Tone::Danger,
            ReferralStatus::Expired => Tone::Gray,
        }
    }
}

impl ReferralStatus {
    pub fn lifecycle() -> Lifecycle<Self> {
        use ReferralStatus::*;

        Lifecycle::new(Pending)
            .with_terminal(&[Completed, Rejected, Expired])
            .with_transitions(
                TransitionTable::new()
                    .allow(Pending, Approved)
                    .allow(Approved, Completed)
                    .allow(Pending, Rejected),
            )
            .with_stamps(
                StampTable::new()
                    .stamp(Approved, "approved_at")
                    .stamp(Completed, "completed_at")
                    .stamp(Rejected, "rejected_at"),
            )
    }
}

impl fmt::Display for ReferralStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Campaigns
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl StatusEnum for CampaignStatus {
    const LIFECYCLE: LifecycleId = LifecycleId::Campaign;

    fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Scheduled => "scheduled",
            CampaignStatus::Active => "active",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Cancelled => "cancelled",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Some(CampaignStatus::Draft),
            "scheduled" => Some(CampaignStatus::Scheduled),
            "active" => Some(CampaignStatus::Active),
            "paused" => Some(CampaignStatus::Paused),
            "completed" => Some(CampaignStatus::Completed),
            "cancelled" | "canceled" => Some(CampaignStatus::Cancelled),
            _ => None,
        }
    }

    fn all() -> &'static [Self] {
        &[
            CampaignStatus::Draft,
            CampaignStatus::Scheduled,
            CampaignStatus::Active,
            CampaignStatus::Paused,
            CampaignStatus::Completed,
            CampaignStatus::Cancelled,
        ]
    }

    fn tone(&self) -> Tone {
        match self {
            CampaignStatus::Draft => Tone::Gray,
            CampaignStatus::Scheduled => Tone::Info,
            CampaignStatus::Active => Tone::Success,
            CampaignStatus::Paused => Tone::Warning,
            CampaignStatus::Completed => Tone::Primary,
            CampaignStatus::Cancelled => Tone::Danger,
        }
    }
}

impl CampaignStatus {
    pub fn lifecycle() -> Lifecycle<Self> {
        use CampaignStatus::*;

        Lifecycle::new(Draft)
            .with_terminal(&[Completed, Cancelled])
            .with_transitions(
                TransitionTable::new()
                    .allow(Draft, Scheduled)
                    .allow_from(&[Draft, Scheduled], Active)
                    .allow(Active, Paused)
                    .allow(Paused, Active)
                    .allow_from(&[Active, Paused], Completed)
                    .allow_from(&[Draft, Scheduled], Cancelled),
            )
            .with_stamps(
                StampTable::new()
                    .stamp(Active, "started_at")
                    .stamp(Completed, "ended_at"),
            )
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tone for a stored status string of a given lifecycle
pub fn tone_for(lifecycle: LifecycleId, status: &str) -> Option<Tone> {
    match lifecycle {
        LifecycleId::Order => OrderStatus::parse(status).map(|s| s.tone()),
        LifecycleId::Referral => ReferralStatus::parse(status).map(|s| s.tone()),
        LifecycleId::Campaign => CampaignStatus::parse(status).map(|s| s.tone()),
    }
}
