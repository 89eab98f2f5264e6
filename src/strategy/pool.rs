//! Pool side selection.
//!
//! A pool has two discrete sides. The stake is a fixed amount large
//! enough to qualify for rewards, so the only real choice is which side
//! to take. Which side wins is a business policy, kept configurable.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::types::{PoolSide, PositionSnapshot};

/// Rule for picking a pool side from the current aggregate stakes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SidePolicy {
    /// Back the under-subscribed side. Ties go short.
    #[default]
    Contrarian,
    /// Back the over-subscribed side. Ties go short.
    Majority,
}

impl SidePolicy {
    /// Choose a side. Pure: identical snapshots always yield the same side.
    pub fn choose(&self, snapshot: &PositionSnapshot) -> PoolSide {
        let PositionSnapshot { longs, shorts } = *snapshot;
        match self {
            SidePolicy::Contrarian if longs < shorts => PoolSide::Long,
            SidePolicy::Majority if longs > shorts => PoolSide::Long,
            _ => PoolSide::Short,
        }
    }
}

/// Fixed-stake pool sizing.
#[derive(Debug, Clone)]
pub struct PoolSizer {
    pub policy: SidePolicy,
    pub stake: Decimal,
}

impl PoolSizer {
    pub fn new(policy: SidePolicy, stake: Decimal) -> Self {
        Self { policy, stake }
    }

    pub fn size(&self, snapshot: &PositionSnapshot) -> (PoolSide, Decimal) {
        (self.policy.choose(snapshot), self.stake)
    }
}
