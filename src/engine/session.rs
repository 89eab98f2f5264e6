//! Session runner: one account's pass through the betting pipeline.
//!
//! `Authenticating → Fetching → Deciding → Submitting → ClaimingRewards → Done`
//!
//! Fetching, Deciding and Submitting repeat per platform and market kind
//! (and per configured pass). A listing that cannot be fetched is recorded
//! and skipped; the session is `Aborted` only when authentication fails or
//! no listing of a pass could be fetched. Rewards are claimed whenever
//! authentication succeeded. The session is closed on every exit path,
//! panics included.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::executor::BetSubmitter;
use super::filter::filter;
use super::report::AccountReport;
use super::rewards::RewardClaimer;
use super::scanner::MarketFetcher;
use crate::config::AppConfig;
use crate::platforms::{KizzyApi, SessionProvider};
use crate::strategy::{BetSizer, DecisionRecord};
use crate::types::{
    Account, AlreadyBetSet, BetDecision, HeldPositions, KizzyError, MarketKind, Platform, RiskMode,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Authenticating,
    Fetching,
    Deciding,
    Submitting,
    ClaimingRewards,
    Done,
    Aborted,
}

/// Fixed waits between platform operations.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    pub pool_bet: Duration,
    pub spread_bet: Duration,
    pub spread_market: Duration,
}

pub struct SessionRunner {
    platforms: Vec<Platform>,
    passes: u32,
    mode: RiskMode,
    pacing: Pacing,
    fetcher: MarketFetcher,
    sizer: BetSizer,
    submitter: BetSubmitter,
    claimer: RewardClaimer,
}

impl SessionRunner {
    pub fn from_config(cfg: &AppConfig, mode: RiskMode, dry_run: bool) -> Result<Self, KizzyError> {
        let betting = &cfg.betting;
        Ok(Self {
            platforms: cfg.platforms()?,
            passes: betting.passes.max(1),
            mode,
            pacing: Pacing {
                pool_bet: Duration::from_secs(betting.pool_bet_delay_secs),
                spread_bet: Duration::from_secs(betting.spread_bet_delay_secs),
                spread_market: Duration::from_secs(betting.spread_market_delay_secs),
            },
            fetcher: MarketFetcher::from_config(betting),
            sizer: BetSizer::from_config(betting),
            submitter: BetSubmitter::from_config(&cfg.submit, dry_run),
            claimer: RewardClaimer::from_config(&cfg.rewards),
        })
    }

    pub fn mode(&self) -> RiskMode {
        self.mode
    }

    /// Run one account session end to end.
    pub async fn run(&self, account: &Account, provider: &dyn SessionProvider) -> AccountReport {
        let span = info_span!("account", index = account.index, name = %account.name);
        self.run_session(account, provider).instrument(span).await
    }

    async fn run_session(&self, account: &Account, provider: &dyn SessionProvider) -> AccountReport {
        let mut report = AccountReport::new(account.clone());
        transition(SessionState::Authenticating);

        let api = match provider.open(account).await {
            Ok(api) => api,
            Err(e) => {
                warn!(error = %e, "Could not open session");
                report.abort(e.to_string());
                transition(SessionState::Aborted);
                return report;
            }
        };

        let driven = AssertUnwindSafe(self.drive(account, api.as_ref(), &mut report))
            .catch_unwind()
            .await;
        api.close().await;

        if driven.is_err() {
            error!("Session panicked");
            report.abort("session panicked");
        }

        transition(if report.is_done() {
            SessionState::Done
        } else {
            SessionState::Aborted
        });
        info!(
            outcome = ?report.outcome,
            attempted = report.attempted,
            succeeded = report.succeeded(),
            failed = report.failed.len(),
            skipped_markets = report.skipped_markets,
            skipped_ranges = report.skipped_ranges,
            fetch_failures = report.fetch_failures.len(),
            rewards_claimed = report.rewards_claimed(),
            "Session finished"
        );
        report
    }

    async fn drive(&self, account: &Account, api: &dyn KizzyApi, report: &mut AccountReport) {
        let held = match api.fetch_positions().await {
            Ok(held) => held,
            Err(e) => {
                let err = KizzyError::SessionAuthFailure {
                    account: account.name.clone(),
                    reason: format!("{e:#}"),
                };
                warn!(error = %err, "Authentication check failed");
                report.abort(err.to_string());
                return;
            }
        };

        let mut already_bet = AlreadyBetSet::new();
        for pass in 1..=self.passes {
            debug!(pass, passes = self.passes, "Betting pass");
            let mut fetched_any = false;
            for &platform in &self.platforms {
                for kind in platform.kinds() {
                    match self
                        .bet_listing(api, platform, kind, &held, &mut already_bet, report)
                        .await
                    {
                        Ok(()) => fetched_any = true,
                        Err(e) => {
                            warn!(error = %e, "Market fetch failed, continuing with next listing");
                            report.record_fetch_failure(e.to_string());
                        }
                    }
                }
            }
            if !fetched_any {
                warn!(pass, "No market listing could be fetched, stopping betting");
                report.abort(format!("no market listing could be fetched in pass {pass}"));
                break;
            }
        }

        transition(SessionState::ClaimingRewards);
        report.rewards = self.claimer.claim_available(api).await;
    }

    /// Fetch, filter, size, and submit one platform listing.
    async fn bet_listing(
        &self,
        api: &dyn KizzyApi,
        platform: Platform,
        kind: MarketKind,
        held: &HeldPositions,
        already_bet: &mut AlreadyBetSet,
        report: &mut AccountReport,
    ) -> Result<(), KizzyError> {
        transition(SessionState::Fetching);
        let markets = self.fetcher.fetch(api, platform, kind, held).await?;
        let fetched = markets.len();

        let eligible = filter(markets, already_bet, self.mode);
        report.skipped_markets += fetched - eligible.len();

        transition(SessionState::Deciding);
        let (decisions, records) = self.sizer.select_bets(&eligible);
        for record in &records {
            if let DecisionRecord::Skipped { key, .. } = record {
                report.record_skip(*key);
            }
        }

        info!(
            platform = %platform,
            kind = %kind,
            fetched,
            eligible = eligible.len(),
            bets = decisions.len(),
            "Listing processed"
        );

        transition(SessionState::Submitting);
        let mut previous_spread = None;
        for decision in &decisions {
            if already_bet.contains(&decision.key()) {
                report.record_skip(Some(decision.key()));
                continue;
            }
            if decision.kind() == MarketKind::Spread {
                if previous_spread.is_some_and(|id| id != decision.market_id) {
                    tokio::time::sleep(self.pacing.spread_market).await;
                }
                previous_spread = Some(decision.market_id);
            }

            self.submit_one(api, decision, already_bet, report).await;

            tokio::time::sleep(match decision.kind() {
                MarketKind::Pool => self.pacing.pool_bet,
                MarketKind::Spread => self.pacing.spread_bet,
            })
            .await;
        }
        Ok(())
    }

    async fn submit_one(
        &self,
        api: &dyn KizzyApi,
        decision: &BetDecision,
        already_bet: &mut AlreadyBetSet,
        report: &mut AccountReport,
    ) {
        match self.submitter.submit(decision, api).await {
            Ok(confirmation) => {
                already_bet.record(&confirmation);
                report.record_success(confirmation);
            }
            Err(e) => report.record_failure(decision.key(), e.to_string()),
        }
    }
}

fn transition(state: SessionState) {
    debug!(state = ?state, "Session state");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
