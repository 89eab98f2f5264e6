//! Market data fetcher.
//!
//! Pulls one point-in-time listing of pools or spreads for a content
//! platform, retrying failed listings a fixed number of times, and stamps
//! the account's platform-reported positions onto every market.
//!
//! A listing that keeps failing surfaces as `KizzyError::FetchFailed`; it
//! is never reported as "no markets".

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::BettingConfig;
use crate::platforms::KizzyApi;
use crate::types::{HeldPositions, KizzyError, Market, MarketKind, Platform};

pub struct MarketFetcher {
    attempts: u32,
    retry_delay: Duration,
}

impl MarketFetcher {
    pub fn new(attempts: u32, retry_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            retry_delay,
        }
    }

    pub fn from_config(cfg: &BettingConfig) -> Self {
        Self::new(
            cfg.fetch_attempts,
            Duration::from_secs(cfg.fetch_retry_delay_secs),
        )
    }

    /// Fetch open markets of `kind` on `platform`.
    ///
    /// Kinds the platform does not offer yield an empty listing without
    /// touching the network.
    pub async fn fetch(
        &self,
        api: &dyn KizzyApi,
        platform: Platform,
        kind: MarketKind,
        held: &HeldPositions,
    ) -> Result<Vec<Market>, KizzyError> {
        if !platform.supports(kind) {
            debug!(platform = %platform, kind = %kind, "Kind not offered, skipping fetch");
            return Ok(Vec::new());
        }

        let mut last_error = String::new();
        for attempt in 1..=self.attempts {
            let listing = match kind {
                MarketKind::Pool => api.fetch_pools(platform).await,
                MarketKind::Spread => api.fetch_spreads(platform).await,
            };

            match listing {
                Ok(mut markets) => {
                    // Drop anything that contradicts the platform's offer.
                    markets.retain(|m| m.kind() == kind);
                    for market in markets.iter_mut() {
                        market.platform = platform;
                        held.mark(market);
                    }
                    info!(
                        platform = %platform,
                        kind = %kind,
                        count = markets.len(),
                        attempt,
                        "Markets fetched"
                    );
                    return Ok(markets);
                }
                Err(e) => {
                    warn!(
                        platform = %platform,
                        kind = %kind,
                        attempt,
                        max_attempts = self.attempts,
                        error = %e,
                        "Market fetch failed"
                    );
                    last_error = format!("{e:#}");
                    if attempt < self.attempts {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        Err(KizzyError::FetchFailed {
            platform,
            kind,
            reason: last_error,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
