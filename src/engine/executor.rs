//! Bet submitter.
//!
//! Places one computed wager through the account's session. Recoverable
//! failures (rate limit, timeout, transient 5xx, network) are retried up to
//! `max_attempts` with a fixed delay between attempts; fatal failures are
//! returned immediately. The caller records the confirmation in its
//! already-bet set.

use chrono::Utc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::SubmitConfig;
use crate::platforms::KizzyApi;
use crate::types::{BetDecision, BetError, BetReceipt, BetTarget, Confirmation};

pub struct BetSubmitter {
    max_attempts: u32,
    retry_delay: Duration,
    dry_run: bool,
}

impl BetSubmitter {
    pub fn new(max_attempts: u32, retry_delay: Duration, dry_run: bool) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            retry_delay,
            dry_run,
        }
    }

    pub fn from_config(cfg: &SubmitConfig, dry_run: bool) -> Self {
        Self::new(cfg.max_attempts, Duration::from_secs(cfg.retry_delay_secs), dry_run)
    }

    /// Submit a single decision.
    pub async fn submit(
        &self,
        decision: &BetDecision,
        api: &dyn KizzyApi,
    ) -> Result<Confirmation, BetError> {
        if self.dry_run {
            info!(bet = %decision, "[DRY RUN] Would place bet");
            return Ok(Confirmation::dry_run(decision));
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            match Self::place(decision, api).await {
                Ok(receipt) => {
                    let receipt_message = receipt.message;
                    let confirmation = Confirmation {
                        key: decision.key(),
                        amount: decision.amount,
                        reference: receipt
                            .reference
                            .unwrap_or_else(|| format!("{}-{}", decision.key(), Utc::now().timestamp())),
                        attempts: attempt,
                        timestamp: Utc::now(),
                    };
                    info!(
                        bet = %decision,
                        reference = %confirmation.reference,
                        attempts = attempt,
                        reply = receipt_message.as_deref().unwrap_or_default(),
                        "Bet placed"
                    );
                    return Ok(confirmation);
                }
                Err(err) if err.is_recoverable() && attempt < self.max_attempts => {
                    debug!(
                        bet = %decision,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %err,
                        "Recoverable bet failure, retrying"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(err) => {
                    warn!(
                        bet = %decision,
                        attempts = attempt,
                        error = %err,
                        "Bet failed"
                    );
                    return Err(err);
                }
            }
        }
    }

    async fn place(decision: &BetDecision, api: &dyn KizzyApi) -> Result<BetReceipt, BetError> {
        match decision.target {
            BetTarget::Side(side) => {
                api.place_pool_bet(decision.market_id, side, decision.amount)
                    .await
            }
            BetTarget::Range { range_id, .. } => {
                api.place_spread_bet(range_id, decision.amount).await
            }
        }
    }
}

impl Confirmation {
    /// Confirmation for a bet that was only logged.
    pub fn dry_run(decision: &BetDecision) -> Self {
        Self {
            key: decision.key(),
            amount: decision.amount,
            reference: format!("dry-run-{}", uuid::Uuid::new_v4()),
            attempts: 0,
            timestamp: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
