//! Per-account run report.
//!
//! Tallies one session's bets and reward claims, and renders the summary
//! printed at the end of a run.

use rust_decimal::Decimal;
use std::fmt;

use crate::types::{Account, BetKey, ClaimOutcome, ClaimResult, Confirmation};

/// Terminal state of an account session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Betting ran, regardless of individual bet or listing results.
    Done,
    /// Authentication failed, or no listing of a pass could be fetched.
    Aborted(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedBet {
    pub key: BetKey,
    pub reason: String,
}

/// Everything one account session did.
#[derive(Debug, Clone)]
pub struct AccountReport {
    pub account: Account,
    pub outcome: SessionOutcome,
    pub attempted: usize,
    pub confirmed: Vec<Confirmation>,
    /// Pools and whole spreads passed over.
    pub skipped_markets: usize,
    /// Individual spread ranges passed over inside a betted spread.
    pub skipped_ranges: usize,
    pub failed: Vec<FailedBet>,
    /// Listings that could not be fetched, with the error.
    pub fetch_failures: Vec<String>,
    pub rewards: Vec<ClaimResult>,
}

impl AccountReport {
    pub fn new(account: Account) -> Self {
        Self {
            account,
            outcome: SessionOutcome::Done,
            attempted: 0,
            confirmed: Vec::new(),
            skipped_markets: 0,
            skipped_ranges: 0,
            failed: Vec::new(),
            fetch_failures: Vec::new(),
            rewards: Vec::new(),
        }
    }

    pub fn record_success(&mut self, confirmation: Confirmation) {
        self.attempted += 1;
        self.confirmed.push(confirmation);
    }

    pub fn record_failure(&mut self, key: BetKey, reason: impl Into<String>) {
        self.attempted += 1;
        self.failed.push(FailedBet {
            key,
            reason: reason.into(),
        });
    }

    /// Count one skipped unit: a range key is a range, anything else a market.
    pub fn record_skip(&mut self, key: Option<BetKey>) {
        match key {
            Some(BetKey::SpreadRange(_)) => self.skipped_ranges += 1,
            Some(BetKey::Pool(_)) | None => self.skipped_markets += 1,
        }
    }

    pub fn record_fetch_failure(&mut self, reason: impl Into<String>) {
        self.fetch_failures.push(reason.into());
    }

    pub fn abort(&mut self, reason: impl Into<String>) {
        self.outcome = SessionOutcome::Aborted(reason.into());
    }

    pub fn is_done(&self) -> bool {
        self.outcome == SessionOutcome::Done
    }

    pub fn succeeded(&self) -> usize {
        self.confirmed.len()
    }

    pub fn total_staked(&self) -> Decimal {
        self.confirmed.iter().map(|c| c.amount).sum()
    }

    pub fn rewards_claimed(&self) -> usize {
        self.rewards
            .iter()
            .filter(|r| r.outcome == ClaimOutcome::Claimed)
            .count()
    }
}

impl fmt::Display for AccountReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = match &self.outcome {
            SessionOutcome::Done => "DONE".to_string(),
            SessionOutcome::Aborted(reason) => format!("ABORTED ({reason})"),
        };
        writeln!(f, "Account {}: {}", self.account, outcome)?;
        writeln!(
            f,
            "  bets: {} attempted, {} succeeded, {} failed (staked {})",
            self.attempted,
            self.succeeded(),
            self.failed.len(),
            self.total_staked(),
        )?;
        for failed in &self.failed {
            writeln!(f, "    {} failed: {}", failed.key, failed.reason)?;
        }
        writeln!(
            f,
            "  skipped: {} markets, {} spread ranges",
            self.skipped_markets, self.skipped_ranges
        )?;
        for reason in &self.fetch_failures {
            writeln!(f, "  listing failed: {reason}")?;
        }
        write!(
            f,
            "  rewards: {} claimed of {} seen",
            self.rewards_claimed(),
            self.rewards.len()
        )
    }
}
