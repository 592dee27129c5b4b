//! Navigation badges - "N/M active" counters and their color tier
//!
//! Badges are computed from counts read at call time and never cached.

use serde::{Deserialize, Serialize};

/// Counts feeding a badge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BadgeCounts {
    pub total: u64,
    pub active: u64,
}

/// Badge color tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorTier {
    None,
    Partial,
    Full,
}

impl ColorTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorTier::None => "none",
            ColorTier::Partial => "partial",
            ColorTier::Full => "full",
        }
    }
}

/// Display pair for a badge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    /// None when nothing is active
    pub label: Option<String>,
    pub tier: ColorTier,
}

/// Compute a badge: zero check first, then the all-active check
pub fn compute_badge(counts: BadgeCounts) -> Badge {
    if counts.active == 0 {
        return Badge {
            label: None,
            tier: ColorTier::None,
        };
    }

    if counts.active == counts.total {
        return Badge {
            label: Some(counts.active.to_string()),
            tier: ColorTier::Full,
        };
    }

    Badge {
        label: Some(format!("{}/{}", counts.active, counts.total)),
        tier: ColorTier::Partial,
    }
}
