//! Eligibility filter.
//!
//! Decides which fetched markets are still actionable for a session.
//!
//! - `RiskMode::Skip` drops pools the account holds (platform positions or
//!   the in-session already-bet set). Spread ranges are de-duplicated
//!   individually: held ranges are flagged, and the spread is dropped only
//!   when every range is held. Range order is preserved so stake-curve
//!   positions stay stable.
//! - `RiskMode::BetAll` ignores the positions the platform reported (held
//!   flags are cleared), but still applies the in-session already-bet set,
//!   so later passes never bet a key twice.
//!
//! Pure over its inputs, and idempotent.

use crate::types::{AlreadyBetSet, BetKey, Market, MarketBook, RiskMode};

pub fn filter(markets: Vec<Market>, already_bet: &AlreadyBetSet, mode: RiskMode) -> Vec<Market> {
    markets
        .into_iter()
        .filter(Market::is_open)
        .filter_map(|market| match mode {
            RiskMode::Skip => skip_held(market, already_bet),
            RiskMode::BetAll => skip_held(clear_held(market), already_bet),
        })
        .collect()
}

fn skip_held(mut market: Market, already_bet: &AlreadyBetSet) -> Option<Market> {
    match &mut market.book {
        MarketBook::Pool(_) => {
            if market.held || already_bet.contains(&BetKey::Pool(market.id)) {
                return None;
            }
        }
        MarketBook::Spread(ranges) => {
            for range in ranges.iter_mut() {
                range.held |= already_bet.contains(&BetKey::SpreadRange(range.id));
            }
            market.held = !ranges.is_empty() && ranges.iter().all(|r| r.held);
            if market.held {
                return None;
            }
        }
    }
    Some(market)
}

fn clear_held(mut market: Market) -> Market {
    market.held = false;
    if let MarketBook::Spread(ranges) = &mut market.book {
        for range in ranges.iter_mut() {
            range.held = false;
        }
    }
    market
}
