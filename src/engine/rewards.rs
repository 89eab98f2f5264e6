//! Reward claimer.
//!
//! Claims the released cycle reward and every claimable mission reward.
//! Availability can flip between discovery and claim, so the board is
//! re-read up to `passes` times and anything still pending is tried again.
//! An "unavailable" answer is a normal negative result, not an error.

use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::RewardsConfig;
use crate::platforms::KizzyApi;
use crate::types::{ClaimOutcome, ClaimResult, RewardClaim};

pub struct RewardClaimer {
    passes: u32,
    delay: Duration,
}

impl RewardClaimer {
    pub fn new(passes: u32, delay: Duration) -> Self {
        Self {
            passes: passes.max(1),
            delay,
        }
    }

    pub fn from_config(cfg: &RewardsConfig) -> Self {
        Self::new(cfg.passes, Duration::from_secs(cfg.claim_delay_secs))
    }

    /// Claim whatever the platform currently offers.
    ///
    /// Returns one result per distinct claim seen, cycle first, carrying
    /// the last outcome and the number of claim attempts.
    pub async fn claim_available(&self, api: &dyn KizzyApi) -> Vec<ClaimResult> {
        let mut results: BTreeMap<RewardClaim, ClaimResult> = BTreeMap::new();

        for pass in 1..=self.passes {
            if pass > 1 {
                tokio::time::sleep(self.delay).await;
            }

            let board = match api.fetch_rewards().await {
                Ok(board) => board,
                Err(e) => {
                    warn!(pass, error = %e, "Failed to read reward board");
                    continue;
                }
            };

            let pending: Vec<RewardClaim> = board
                .claimable()
                .into_iter()
                .filter(|c| {
                    results
                        .get(c)
                        .map_or(true, |r| r.outcome != ClaimOutcome::Claimed)
                })
                .collect();

            if pending.is_empty() {
                debug!(pass, "No rewards left to claim");
                break;
            }

            for claim in pending {
                let outcome = match api.claim_reward(claim).await {
                    Ok(reply) if reply.is_unavailable() => {
                        debug!(claim = %claim, message = ?reply.message, "Reward not available");
                        ClaimOutcome::NotClaimed
                    }
                    Ok(_) => {
                        info!(claim = %claim, "Reward claimed");
                        ClaimOutcome::Claimed
                    }
                    Err(e) => {
                        warn!(claim = %claim, error = %e, "Reward claim failed");
                        ClaimOutcome::Failed(format!("{e:#}"))
                    }
                };

                let entry = results.entry(claim).or_insert(ClaimResult {
                    claim,
                    outcome: ClaimOutcome::NotClaimed,
                    attempts: 0,
                });
                entry.attempts += 1;
                entry.outcome = outcome;
            }
        }

        let results: Vec<ClaimResult> = results.into_values().collect();
        info!(
            claimed = results.iter().filter(|r| r.outcome == ClaimOutcome::Claimed).count(),
            seen = results.len(),
            "Reward claiming finished"
        );
        results
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
