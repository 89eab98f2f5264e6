//! Strategy engine: pool side selection and spread stake sizing.

pub mod pool;
pub mod spread;

use tracing::{debug, info};

use crate::config::BettingConfig;
use crate::types::{BetDecision, BetKey, BetTarget, Market, MarketBook, MarketId, Platform};
use pool::PoolSizer;
use spread::SpreadSizer;

// ---------------------------------------------------------------------------
// Decision log
// ---------------------------------------------------------------------------

/// Record of every decision made (or skipped) during a sizing pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionRecord {
    /// Bet computed and queued for submission.
    Selected(BetDecision),
    /// Nothing to submit for this market (or range), and why.
    Skipped {
        market_id: MarketId,
        key: Option<BetKey>,
        reason: String,
    },
}

impl DecisionRecord {
    fn skipped(market_id: MarketId, key: Option<BetKey>, reason: impl Into<String>) -> Self {
        DecisionRecord::Skipped {
            market_id,
            key,
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Sizer
// ---------------------------------------------------------------------------

/// Turns eligible markets into bet decisions.
///
/// Pure and deterministic: the same market data always yields the same
/// decisions, with no hidden state between calls.
#[derive(Debug, Clone)]
pub struct BetSizer {
    pool: PoolSizer,
    spread: SpreadSizer,
}

impl BetSizer {
    pub fn new(pool: PoolSizer, spread: SpreadSizer) -> Self {
        Self { pool, spread }
    }

    pub fn from_config(cfg: &BettingConfig) -> Self {
        Self::new(
            PoolSizer::new(cfg.side_policy, cfg.pool_stake),
            SpreadSizer::new(cfg.spread.clone()),
        )
    }

    /// Decide what to bet on one market.
    pub fn decide(&self, market: &Market) -> Vec<DecisionRecord> {
        if !market.is_open() {
            return vec![DecisionRecord::skipped(market.id, None, "market closed")];
        }

        match (&market.book, market.platform) {
            (MarketBook::Spread(_), Platform::Youtube) => vec![DecisionRecord::skipped(
                market.id,
                None,
                "platform offers pools only",
            )],
            (MarketBook::Pool(snapshot), _) => {
                let (side, amount) = self.pool.size(snapshot);
                debug!(
                    pool_id = market.id,
                    platform = %market.platform,
                    longs = %snapshot.longs,
                    shorts = %snapshot.shorts,
                    side = %side,
                    amount = %amount,
                    "Pool side chosen"
                );
                vec![DecisionRecord::Selected(BetDecision {
                    market_id: market.id,
                    platform: market.platform,
                    target: BetTarget::Side(side),
                    amount,
                })]
            }
            (MarketBook::Spread(ranges), Platform::Twitter) => match self.spread.size(ranges) {
                Err(skip) => {
                    debug!(spread_id = market.id, reason = %skip, "Spread skipped");
                    vec![DecisionRecord::skipped(market.id, None, skip.to_string())]
                }
                Ok(curve) => curve
                    .into_iter()
                    .map(|stake| {
                        if stake.held {
                            DecisionRecord::skipped(
                                market.id,
                                Some(BetKey::SpreadRange(stake.range_id)),
                                "range already bet",
                            )
                        } else {
                            DecisionRecord::Selected(BetDecision {
                                market_id: market.id,
                                platform: market.platform,
                                target: BetTarget::Range {
                                    range_id: stake.range_id,
                                    odds: stake.odds,
                                },
                                amount: stake.amount,
                            })
                        }
                    })
                    .collect(),
            },
        }
    }

    /// Run the sizer over a batch of markets.
    ///
    /// Returns the decisions to submit (in market order) and the complete
    /// decision log including skips.
    pub fn select_bets(&self, markets: &[Market]) -> (Vec<BetDecision>, Vec<DecisionRecord>) {
        let records: Vec<DecisionRecord> = markets.iter().flat_map(|m| self.decide(m)).collect();
        let selected: Vec<BetDecision> = records
            .iter()
            .filter_map(|r| match r {
                DecisionRecord::Selected(d) => Some(d.clone()),
                DecisionRecord::Skipped { .. } => None,
            })
            .collect();

        info!(
            markets_in = markets.len(),
            selected = selected.len(),
            skipped = records.len() - selected.len(),
            "Sizing complete"
        );

        (selected, records)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
