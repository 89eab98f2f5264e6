//! Platform integration.
//!
//! Defines the `KizzyApi` trait (one authenticated account session against
//! the Kizzy backend) and the `SessionProvider` trait that opens such
//! sessions. `kizzy` provides the HTTP implementation of both.

pub mod kizzy;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::types::{
    Account, BetError, BetReceipt, ClaimReply, HeldPositions, KizzyError, Market, MarketId,
    Platform, PoolSide, RewardBoard, RewardClaim,
};

/// Abstraction over one authenticated Kizzy session.
///
/// Listings return raw platform data; `held` flags are stamped by the
/// caller from `fetch_positions`. Bet methods return classified
/// [`BetError`]s so the submitter can decide whether to retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KizzyApi: Send + Sync {
    /// Positions the platform reports for this account.
    async fn fetch_positions(&self) -> Result<HeldPositions>;

    /// Open pools for a content platform.
    async fn fetch_pools(&self, platform: Platform) -> Result<Vec<Market>>;

    /// Open spreads for a content platform.
    async fn fetch_spreads(&self, platform: Platform) -> Result<Vec<Market>>;

    async fn place_pool_bet(
        &self,
        pool_id: MarketId,
        side: PoolSide,
        amount: Decimal,
    ) -> Result<BetReceipt, BetError>;

    async fn place_spread_bet(
        &self,
        range_id: MarketId,
        amount: Decimal,
    ) -> Result<BetReceipt, BetError>;

    /// Current mission and cycle reward state.
    async fn fetch_rewards(&self) -> Result<RewardBoard>;

    async fn claim_reward(&self, claim: RewardClaim) -> Result<ClaimReply>;

    /// Release the session. Further calls fail.
    async fn close(&self);
}

/// Opens authenticated sessions for accounts.
///
/// Implementations must report a missing credential as
/// [`KizzyError::NoCookies`], distinct from
/// [`KizzyError::SessionAuthFailure`].
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn open(&self, account: &Account) -> Result<Box<dyn KizzyApi>, KizzyError>;
}
