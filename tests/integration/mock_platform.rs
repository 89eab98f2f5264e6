//! Mock Kizzy platform for integration testing.
//!
//! `MockKizzy` is an in-memory `KizzyApi`: it serves fixed listings,
//! accepts bets against a balance, records positions and reward claims,
//! and can be scripted to fail. Clones share state, so a test keeps one
//! handle while the session under test owns another.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use kizzy::platforms::{KizzyApi, SessionProvider};
use kizzy::types::*;

/// A bet the mock accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedBet {
    pub key: BetKey,
    pub side: Option<PoolSide>,
    pub amount: Decimal,
}

#[derive(Default)]
struct MockState {
    balance: Decimal,
    held: HeldPositions,
    bets: Vec<PlacedBet>,
    bet_failures: VecDeque<BetError>,
    fetch_error: Option<String>,
    spread_fetch_error: Option<String>,
    auth_error: Option<String>,
    panic_on_auth: bool,
    rewards: RewardBoard,
    claims: Vec<RewardClaim>,
    spread_fetches: HashMap<Platform, u32>,
    closed: bool,
    close_calls: u32,
}

#[derive(Clone)]
pub struct MockKizzy {
    pools: HashMap<Platform, Vec<Market>>,
    spreads: HashMap<Platform, Vec<Market>>,
    state: Arc<Mutex<MockState>>,
}

impl MockKizzy {
    pub fn new(balance: Decimal) -> Self {
        Self {
            pools: HashMap::new(),
            spreads: HashMap::new(),
            state: Arc::new(Mutex::new(MockState {
                balance,
                ..Default::default()
            })),
        }
    }

    /// Twitter pool 1 (100/40), YouTube pool 2 (10/30), and Twitter
    /// spread 3 with ranges 30 @ 3.0 and 31 @ 1.5.
    pub fn with_default_markets(balance: Decimal) -> Self {
        let mut mock = Self::new(balance);
        mock.pools.insert(
            Platform::Twitter,
            vec![Market::pool(1, Platform::Twitter, dec!(100), dec!(40))],
        );
        mock.pools.insert(
            Platform::Youtube,
            vec![Market::pool(2, Platform::Youtube, dec!(10), dec!(30))],
        );
        mock.spreads.insert(
            Platform::Twitter,
            vec![Market::spread(
                3,
                Platform::Twitter,
                &[(30, Some(dec!(3.0))), (31, Some(dec!(1.5)))],
            )],
        );
        mock
    }

    pub fn hold(&self, held: HeldPositions) {
        self.state.lock().unwrap().held = held;
    }

    pub fn script_bet_failures(&self, failures: Vec<BetError>) {
        self.state.lock().unwrap().bet_failures = failures.into();
    }

    pub fn fail_fetches(&self, msg: &str) {
        self.state.lock().unwrap().fetch_error = Some(msg.to_string());
    }

    /// Fail only the spread listings; pools and rewards still answer.
    pub fn fail_spread_fetches(&self, msg: &str) {
        self.state.lock().unwrap().spread_fetch_error = Some(msg.to_string());
    }

    pub fn fail_auth(&self, msg: &str) {
        self.state.lock().unwrap().auth_error = Some(msg.to_string());
    }

    pub fn panic_on_auth(&self) {
        self.state.lock().unwrap().panic_on_auth = true;
    }

    pub fn set_rewards(&self, board: RewardBoard) {
        self.state.lock().unwrap().rewards = board;
    }

    pub fn bets(&self) -> Vec<PlacedBet> {
        self.state.lock().unwrap().bets.clone()
    }

    pub fn claims(&self) -> Vec<RewardClaim> {
        self.state.lock().unwrap().claims.clone()
    }

    pub fn balance(&self) -> Decimal {
        self.state.lock().unwrap().balance
    }

    pub fn close_calls(&self) -> u32 {
        self.state.lock().unwrap().close_calls
    }

    pub fn spread_fetches(&self, platform: Platform) -> u32 {
        self.state
            .lock()
            .unwrap()
            .spread_fetches
            .get(&platform)
            .copied()
            .unwrap_or(0)
    }

    fn accept(&self, key: BetKey, side: Option<PoolSide>, amount: Decimal) -> Result<BetReceipt, BetError> {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return Err(BetError::SessionClosed);
        }
        if let Some(failure) = state.bet_failures.pop_front() {
            return Err(failure);
        }
        if state.balance < amount {
            return Err(BetError::InsufficientBalance(format!(
                "balance {} below stake {amount}",
                state.balance
            )));
        }
        state.balance -= amount;
        match key {
            BetKey::Pool(id) => state.held.pools.insert(id),
            BetKey::SpreadRange(id) => state.held.spread_ranges.insert(id),
        };
        state.bets.push(PlacedBet { key, side, amount });
        Ok(BetReceipt {
            reference: Some(format!("mock-{}", state.bets.len())),
            message: None,
        })
    }

    fn listing(&self, book: &HashMap<Platform, Vec<Market>>, platform: Platform) -> Result<Vec<Market>> {
        let state = self.state.lock().unwrap();
        if state.closed {
            return Err(anyhow!("session closed"));
        }
        if let Some(msg) = &state.fetch_error {
            return Err(anyhow!("{msg}"));
        }
        Ok(book.get(&platform).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl KizzyApi for MockKizzy {
    async fn fetch_positions(&self) -> Result<HeldPositions> {
        let (panic, error, held) = {
            let state = self.state.lock().unwrap();
            (state.panic_on_auth, state.auth_error.clone(), state.held.clone())
        };
        if panic {
            panic!("browser driver crashed");
        }
        match error {
            Some(msg) => Err(anyhow!("{msg}")),
            None => Ok(held),
        }
    }

    async fn fetch_pools(&self, platform: Platform) -> Result<Vec<Market>> {
        self.listing(&self.pools, platform)
    }

    async fn fetch_spreads(&self, platform: Platform) -> Result<Vec<Market>> {
        let error = {
            let mut state = self.state.lock().unwrap();
            *state.spread_fetches.entry(platform).or_insert(0) += 1;
            state.spread_fetch_error.clone()
        };
        if let Some(msg) = error {
            return Err(anyhow!("{msg}"));
        }
        self.listing(&self.spreads, platform)
    }

    async fn place_pool_bet(
        &self,
        pool_id: MarketId,
        side: PoolSide,
        amount: Decimal,
    ) -> Result<BetReceipt, BetError> {
        let known = self.pools.values().flatten().any(|m| m.id == pool_id);
        if !known {
            return Err(BetError::MarketClosed(format!("pool {pool_id} not found")));
        }
        self.accept(BetKey::Pool(pool_id), Some(side), amount)
    }

    async fn place_spread_bet(
        &self,
        range_id: MarketId,
        amount: Decimal,
    ) -> Result<BetReceipt, BetError> {
        let known = self.spreads.values().flatten().any(|m| match &m.book {
            MarketBook::Spread(ranges) => ranges.iter().any(|r| r.id == range_id),
            MarketBook::Pool(_) => false,
        });
        if !known {
            return Err(BetError::MarketClosed(format!("range {range_id} not found")));
        }
        self.accept(BetKey::SpreadRange(range_id), None, amount)
    }

    async fn fetch_rewards(&self) -> Result<RewardBoard> {
        Ok(self.state.lock().unwrap().rewards.clone())
    }

    async fn claim_reward(&self, claim: RewardClaim) -> Result<ClaimReply> {
        let mut state = self.state.lock().unwrap();
        let available = state.rewards.claimable().contains(&claim);
        if !available {
            return Ok(ClaimReply {
                success: Some(false),
                message: Some("Reward not available".into()),
            });
        }
        match claim {
            RewardClaim::Cycle { .. } => {
                if let Some(cycle) = state.rewards.cycle.as_mut() {
                    cycle.released = false;
                }
            }
            RewardClaim::Mission { mission_id, .. } => {
                for mission in state.rewards.missions.iter_mut() {
                    if mission.id == mission_id {
                        mission.claimed = true;
                    }
                }
            }
        }
        state.claims.push(claim);
        Ok(ClaimReply {
            success: Some(true),
            message: Some("claimed".into()),
        })
    }

    async fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        state.close_calls += 1;
    }
}

/// Hands out `MockKizzy` sessions by account name, or a scripted error.
#[derive(Default)]
pub struct MockProvider {
    sessions: HashMap<String, MockKizzy>,
    failures: HashMap<String, KizzyError>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(mut self, account: &str, session: MockKizzy) -> Self {
        self.sessions.insert(account.to_string(), session);
        self
    }

    pub fn with_failure(mut self, account: &str, error: KizzyError) -> Self {
        self.failures.insert(account.to_string(), error);
        self
    }
}

#[async_trait]
impl SessionProvider for MockProvider {
    async fn open(&self, account: &Account) -> std::result::Result<Box<dyn KizzyApi>, KizzyError> {
        if let Some(err) = self.failures.get(&account.name) {
            return Err(err.clone());
        }
        match self.sessions.get(&account.name) {
            Some(session) => Ok(Box::new(session.clone())),
            None => Err(KizzyError::NoCookies {
                account: account.name.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_accepts_and_tracks_bets() {
        let mock = MockKizzy::with_default_markets(dec!(100));
        mock.place_pool_bet(1, PoolSide::Short, dec!(15)).await.unwrap();
        mock.place_spread_bet(31, dec!(30)).await.unwrap();

        assert_eq!(mock.bets().len(), 2);
        assert_eq!(mock.balance(), dec!(55));
        let held = mock.fetch_positions().await.unwrap();
        assert!(held.pools.contains(&1));
        assert!(held.spread_ranges.contains(&31));
    }

    #[tokio::test]
    async fn test_mock_rejects_unknown_and_underfunded() {
        let mock = MockKizzy::with_default_markets(dec!(10));
        assert!(matches!(
            mock.place_pool_bet(99, PoolSide::Long, dec!(1)).await,
            Err(BetError::MarketClosed(_))
        ));
        assert!(matches!(
            mock.place_pool_bet(1, PoolSide::Long, dec!(15)).await,
            Err(BetError::InsufficientBalance(_))
        ));
    }

    #[tokio::test]
    async fn test_mock_closed_session_refuses() {
        let mock = MockKizzy::with_default_markets(dec!(100));
        mock.close().await;
        assert_eq!(
            mock.place_pool_bet(1, PoolSide::Long, dec!(15)).await,
            Err(BetError::SessionClosed)
        );
        assert!(mock.fetch_pools(Platform::Twitter).await.is_err());
        assert_eq!(mock.close_calls(), 1);
    }
}
