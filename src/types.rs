//! Shared types for the KIZZY agent.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that platform, strategy,
//! and engine modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

/// Platform-assigned identifier of a pool, spread, or spread range.
pub type MarketId = u64;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Content platform a market is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitter,
    Youtube,
}

impl Platform {
    /// Path segment used by the Kizzy API.
    pub fn slug(&self) -> &'static str {
        match self {
            Platform::Twitter => "twitter",
            Platform::Youtube => "youtube",
        }
    }

    /// Whether this platform lists markets of the given kind.
    /// YouTube offers pools only.
    pub fn supports(&self, kind: MarketKind) -> bool {
        !matches!((self, kind), (Platform::Youtube, MarketKind::Spread))
    }

    /// Market kinds offered by this platform, in processing order.
    pub fn kinds(&self) -> Vec<MarketKind> {
        [MarketKind::Pool, MarketKind::Spread]
            .into_iter()
            .filter(|k| self.supports(*k))
            .collect()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slug())
    }
}

impl std::str::FromStr for Platform {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "twitter" | "x" => Ok(Platform::Twitter),
            "youtube" | "yt" => Ok(Platform::Youtube),
            _ => Err(anyhow::anyhow!("Unknown platform: {s}")),
        }
    }
}

/// Pool (two discrete sides) or spread (continuous ranges).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketKind {
    Pool,
    Spread,
}

impl fmt::Display for MarketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketKind::Pool => write!(f, "pool"),
            MarketKind::Spread => write!(f, "spread"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    Open,
    Closed,
}

/// Pool bet direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolSide {
    Long,
    Short,
}

impl PoolSide {
    /// Wire value expected by the bet endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolSide::Long => "long",
            PoolSide::Short => "short",
        }
    }
}

impl fmt::Display for PoolSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolSide::Long => write!(f, "LONG"),
            PoolSide::Short => write!(f, "SHORT"),
        }
    }
}

/// Whether already-held markets are skipped or bet again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskMode {
    #[default]
    Skip,
    BetAll,
}

/// How multiple account sessions are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Sequential,
    Parallel,
}

// ---------------------------------------------------------------------------
// Market
// ---------------------------------------------------------------------------

/// Aggregate stake on each side of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub longs: Decimal,
    pub shorts: Decimal,
}

/// One bettable range of a spread market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadRange {
    pub id: MarketId,
    /// Payout multiple; absent or zero when the platform has not priced it.
    pub odds: Option<Decimal>,
    /// The account already holds a position on this range.
    pub held: bool,
}

/// Kind-specific market data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketBook {
    Pool(PositionSnapshot),
    Spread(Vec<SpreadRange>),
}

/// A pool or spread listed on a platform, as seen in one fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    pub id: MarketId,
    pub platform: Platform,
    pub title: String,
    pub status: MarketStatus,
    /// The platform reports that the account already holds a position.
    pub held: bool,
    pub book: MarketBook,
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.book {
            MarketBook::Pool(p) => write!(
                f,
                "[{} pool {}] {} (longs: {} | shorts: {})",
                self.platform, self.id, self.title, p.longs, p.shorts,
            ),
            MarketBook::Spread(ranges) => write!(
                f,
                "[{} spread {}] {} ({} ranges)",
                self.platform,
                self.id,
                self.title,
                ranges.len(),
            ),
        }
    }
}

impl Market {
    /// Open, unheld pool.
    pub fn pool(id: MarketId, platform: Platform, longs: Decimal, shorts: Decimal) -> Self {
        Market {
            id,
            platform,
            title: String::new(),
            status: MarketStatus::Open,
            held: false,
            book: MarketBook::Pool(PositionSnapshot { longs, shorts }),
        }
    }

    /// Open, unheld spread. `ranges` are `(range_id, odds)` pairs.
    pub fn spread(id: MarketId, platform: Platform, ranges: &[(MarketId, Option<Decimal>)]) -> Self {
        Market {
            id,
            platform,
            title: String::new(),
            status: MarketStatus::Open,
            held: false,
            book: MarketBook::Spread(
                ranges
                    .iter()
                    .map(|(id, odds)| SpreadRange { id: *id, odds: *odds, held: false })
                    .collect(),
            ),
        }
    }

    pub fn kind(&self) -> MarketKind {
        match self.book {
            MarketBook::Pool(_) => MarketKind::Pool,
            MarketBook::Spread(_) => MarketKind::Spread,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == MarketStatus::Open
    }
}

/// Positions the platform reports for the authenticated account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeldPositions {
    pub pools: HashSet<MarketId>,
    pub spread_ranges: HashSet<MarketId>,
}

impl HeldPositions {
    /// Stamp `held` flags on a freshly fetched market.
    pub fn mark(&self, market: &mut Market) {
        match &mut market.book {
            MarketBook::Pool(_) => market.held = self.pools.contains(&market.id),
            MarketBook::Spread(ranges) => {
                for r in ranges.iter_mut() {
                    r.held = self.spread_ranges.contains(&r.id);
                }
                market.held = !ranges.is_empty() && ranges.iter().all(|r| r.held);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Bets
// ---------------------------------------------------------------------------

/// De-duplication key: pools are keyed by pool id, spreads by range id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BetKey {
    Pool(MarketId),
    SpreadRange(MarketId),
}

impl fmt::Display for BetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetKey::Pool(id) => write!(f, "pool:{id}"),
            BetKey::SpreadRange(id) => write!(f, "range:{id}"),
        }
    }
}

/// What a bet is placed on inside its market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BetTarget {
    Side(PoolSide),
    Range { range_id: MarketId, odds: Decimal },
}

/// A computed wager, ready for submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetDecision {
    pub market_id: MarketId,
    pub platform: Platform,
    pub target: BetTarget,
    pub amount: Decimal,
}

impl fmt::Display for BetDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target {
            BetTarget::Side(side) => write!(
                f,
                "{} pool {}: {} on {}",
                self.platform, self.market_id, self.amount, side
            ),
            BetTarget::Range { range_id, odds } => write!(
                f,
                "{} spread {} range {}: {} @ {}x",
                self.platform, self.market_id, range_id, self.amount, odds
            ),
        }
    }
}

impl BetDecision {
    pub fn key(&self) -> BetKey {
        match self.target {
            BetTarget::Side(_) => BetKey::Pool(self.market_id),
            BetTarget::Range { range_id, .. } => BetKey::SpreadRange(range_id),
        }
    }

    pub fn kind(&self) -> MarketKind {
        match self.target {
            BetTarget::Side(_) => MarketKind::Pool,
            BetTarget::Range { .. } => MarketKind::Spread,
        }
    }
}

/// What the bet endpoint returned for an accepted wager.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BetReceipt {
    pub reference: Option<String>,
    pub message: Option<String>,
}

/// A wager the platform accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub key: BetKey,
    pub amount: Decimal,
    pub reference: String,
    /// Submission attempts it took, including the successful one.
    pub attempts: u32,
    pub timestamp: DateTime<Utc>,
}

/// In-session record of confirmed wagers.
///
/// Grows only through [`AlreadyBetSet::record`], which takes a
/// [`Confirmation`]; it is never persisted.
#[derive(Debug, Clone, Default)]
pub struct AlreadyBetSet {
    keys: HashSet<BetKey>,
}

impl AlreadyBetSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &BetKey) -> bool {
        self.keys.contains(key)
    }

    /// Returns `false` if the key was already present.
    pub fn record(&mut self, confirmation: &Confirmation) -> bool {
        self.keys.insert(confirmation.key)
    }
}

// ---------------------------------------------------------------------------
// Rewards
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mission {
    pub id: u64,
    pub claim_enabled: bool,
    pub claimed: bool,
    pub cycle_id: Option<u64>,
}

impl Mission {
    pub fn is_claimable(&self) -> bool {
        self.claim_enabled && !self.claimed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleInfo {
    pub id: u64,
    pub released: bool,
}

/// Mission/cycle reward state as reported by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardBoard {
    pub missions: Vec<Mission>,
    pub cycle: Option<CycleInfo>,
}

impl RewardBoard {
    /// Cycle id claimable right now, if the current cycle is released.
    pub fn released_cycle(&self) -> Option<u64> {
        self.cycle.filter(|c| c.released && c.id > 0).map(|c| c.id)
    }

    /// Claims the platform currently advertises, cycle first.
    pub fn claimable(&self) -> Vec<RewardClaim> {
        let fallback = self.released_cycle().unwrap_or(0);
        let mut claims: Vec<RewardClaim> = self
            .released_cycle()
            .map(|cycle_id| RewardClaim::Cycle { cycle_id })
            .into_iter()
            .collect();
        claims.extend(self.missions.iter().filter(|m| m.is_claimable()).map(|m| {
            RewardClaim::Mission {
                mission_id: m.id,
                cycle_id: m.cycle_id.filter(|c| *c > 0).unwrap_or(fallback),
            }
        }));
        claims
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RewardClaim {
    Cycle { cycle_id: u64 },
    Mission { mission_id: u64, cycle_id: u64 },
}

impl fmt::Display for RewardClaim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewardClaim::Cycle { cycle_id } => write!(f, "cycle {cycle_id}"),
            RewardClaim::Mission { mission_id, cycle_id } => {
                write!(f, "mission {mission_id} (cycle {cycle_id})")
            }
        }
    }
}

/// Body of a claim response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReply {
    pub success: Option<bool>,
    pub message: Option<String>,
}

impl ClaimReply {
    /// "Not yet available" style answers are a normal negative result.
    pub fn is_unavailable(&self) -> bool {
        if self.success == Some(false) {
            return true;
        }
        let msg = self.message.as_deref().unwrap_or_default().to_lowercase();
        msg.contains("not available")
            || msg.contains("not yet")
            || msg.contains("unavailable")
            || msg.contains("already claimed")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimOutcome {
    Claimed,
    NotClaimed,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimResult {
    pub claim: RewardClaim,
    pub outcome: ClaimOutcome,
    pub attempts: u32,
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// One persisted identity discovered in the cookie store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// 1-based position in the sorted store listing.
    pub index: usize,
    pub name: String,
    pub cookie_path: PathBuf,
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.index, self.name)
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Session- and fetch-level failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KizzyError {
    #[error("Fetch failed ({platform} {kind}): {reason}")]
    FetchFailed {
        platform: Platform,
        kind: MarketKind,
        reason: String,
    },

    #[error("Session authentication failed for {account}: {reason}")]
    SessionAuthFailure { account: String, reason: String },

    #[error("No cookies found for account {account}")]
    NoCookies { account: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BetErrorKind {
    /// Worth retrying after the fixed delay.
    Recoverable,
    /// Retrying cannot help; skip the market.
    Fatal,
}

/// Classified bet submission failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BetError {
    #[error("Rate limited by platform")]
    RateLimited,

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Transient platform error {status}: {body}")]
    Transient { status: u16, body: String },

    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    #[error("Market closed: {0}")]
    MarketClosed(String),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Bet rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Session already closed")]
    SessionClosed,
}

impl BetError {
    pub fn kind(&self) -> BetErrorKind {
        match self {
            BetError::RateLimited
            | BetError::Timeout(_)
            | BetError::Network(_)
            | BetError::Transient { .. } => BetErrorKind::Recoverable,
            _ => BetErrorKind::Fatal,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.kind() == BetErrorKind::Recoverable
    }

    /// Classify a bet endpoint answer from its status and error text.
    pub fn from_response(status: u16, message: &str) -> Self {
        let msg = message.to_lowercase();

        if status == 429 || msg.contains("rate limit") || msg.contains("too many requests") {
            return BetError::RateLimited;
        }
        if msg.contains("insufficient") || msg.contains("not enough") || msg.contains("balance") {
            return BetError::InsufficientBalance(message.to_string());
        }
        if msg.contains("closed") || msg.contains("ended") || msg.contains("expired") {
            return BetError::MarketClosed(message.to_string());
        }
        if status == 408 || status == 504 || msg.contains("timeout") || msg.contains("timed out") {
            return BetError::Timeout(message.to_string());
        }
        if status >= 500 {
            return BetError::Transient {
                status,
                body: message.to_string(),
            };
        }

        BetError::Rejected {
            status,
            message: message.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
