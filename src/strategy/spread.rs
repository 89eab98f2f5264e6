//! Spread stake curve.
//!
//! Spreads have continuous ranges rather than two sides, so the decision
//! variable is the stake per range. The target payout comes from the
//! best-priced range; every other range is staked so that a win on it
//! pays (at least) the same target:
//!
//!   target = target_payout, or base_stake × max_odds when unset
//!   stake  = clamp(ceil(target / odds), min_stake, max_stake)

use rust_decimal::Decimal;
use std::fmt;

use crate::config::SpreadConfig;
use crate::types::{MarketId, SpreadRange};

/// Decimal places kept before rounding a stake up, so that exact
/// quotients like `40.5 / 2.7` never ceil to the next unit.
const STAKE_PRECISION_DP: u32 = 8;

/// Stake computed for one range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeStake {
    pub range_id: MarketId,
    pub odds: Decimal,
    pub amount: Decimal,
    /// Already held; sized for completeness but not to be submitted.
    pub held: bool,
}

/// Why a whole spread produced no stakes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpreadSkip {
    NoRanges,
    MissingOdds,
    NonPositiveStake,
}

impl fmt::Display for SpreadSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpreadSkip::NoRanges => write!(f, "no spread ranges"),
            SpreadSkip::MissingOdds => write!(f, "could not determine max odds"),
            SpreadSkip::NonPositiveStake => write!(f, "computed stake is not positive"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpreadSizer {
    config: SpreadConfig,
}

impl SpreadSizer {
    pub fn new(config: SpreadConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SpreadConfig {
        &self.config
    }

    /// Highest positive odds across the ranges.
    pub fn max_odds(ranges: &[SpreadRange]) -> Option<Decimal> {
        ranges
            .iter()
            .filter_map(|r| r.odds)
            .filter(|o| *o > Decimal::ZERO)
            .max()
    }

    pub fn target_payout(&self, max_odds: Decimal) -> Decimal {
        self.config
            .target_payout
            .unwrap_or(self.config.base_stake * max_odds)
    }

    /// Stake needed on a range priced at `odds` to pay `target`.
    /// `None` when the odds or the raw stake are not positive.
    pub fn stake_for(&self, target: Decimal, odds: Decimal) -> Option<Decimal> {
        if odds <= Decimal::ZERO {
            return None;
        }
        let raw = target.checked_div(odds)?.round_dp(STAKE_PRECISION_DP);
        if raw <= Decimal::ZERO {
            return None;
        }
        Some(raw.ceil().clamp(self.config.min_stake, self.config.max_stake))
    }

    /// Compute the stake curve for a spread.
    pub fn size(&self, ranges: &[SpreadRange]) -> Result<Vec<RangeStake>, SpreadSkip> {
        if ranges.is_empty() {
            return Err(SpreadSkip::NoRanges);
        }
        let max_odds = Self::max_odds(ranges).ok_or(SpreadSkip::MissingOdds)?;
        let target = self.target_payout(max_odds);

        let stakes: Vec<RangeStake> = ranges
            .iter()
            .enumerate()
            .filter_map(|(idx, r)| {
                let odds = r.odds?;
                let mut amount = self.stake_for(target, odds)?;
                if self.config.trimmed_ranges.contains(&idx) {
                    amount = (amount - self.config.trim_amount).max(self.config.min_stake);
                }
                Some(RangeStake {
                    range_id: r.id,
                    odds,
                    amount,
                    held: r.held,
                })
            })
            .collect();

        if stakes.is_empty() {
            return Err(SpreadSkip::NonPositiveStake);
        }
        Ok(stakes)
    }
}
