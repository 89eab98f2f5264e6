//! Kizzy platform integration.
//!
//! Talks to the two Kizzy origins with the account's persisted session
//! cookies:
//!
//! App origin (default https://testnet.kizzy.io):
//!   GET  /api/v2/auth                 account record (held positions)
//!   GET  /api/v2/pvp/{platform}       open pools
//!   GET  /api/v2/spreads/{platform}   open spreads
//!   POST /api/v2/place-bet/spread     spread bet (multipart)
//!
//! REST origin (default https://rest-api.kizzy.io):
//!   POST /app/place-bet-pvp/{pool_id} pool bet (JSON)
//!   GET  /app/reward?main_tab=missions
//!   POST /app/reward                  cycle / mission claim

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, COOKIE, ORIGIN, REFERER};
use reqwest::multipart::Form;
use reqwest::{Client, StatusCode};
use rust_decimal::prelude::*;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use super::{KizzyApi, SessionProvider};
use crate::config::KizzyConfig;
use crate::storage::{cookie_header, CookieStore};
use crate::types::{
    Account, BetError, BetReceipt, ClaimReply, CycleInfo, HeldPositions, KizzyError, Market,
    MarketBook, MarketId, MarketStatus, Mission, Platform, PoolSide, PositionSnapshot,
    RewardBoard, RewardClaim, SpreadRange,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const AUTH_PATH: &str = "/api/v2/auth";
const SPREAD_BET_PATH: &str = "/api/v2/place-bet/spread";
const REWARDS_PATH: &str = "/app/reward";

/// Characters of an unparseable body kept in error messages.
const BODY_SNIPPET_LEN: usize = 200;

/// Listing `status` values that mean the market no longer takes bets.
const CLOSED_STATUSES: &[&str] = &["closed", "ended", "settled", "resolved", "expired", "finished"];

// ---------------------------------------------------------------------------
// API response types (Kizzy JSON → Rust)
// ---------------------------------------------------------------------------

/// `/api/v2/auth`: only the position lists are used.
#[derive(Debug, Deserialize)]
struct AuthRecord {
    #[serde(default, rename = "preMarketBetIDs")]
    pre_market_bet_ids: Option<Vec<u64>>,
    #[serde(default, rename = "activeSpreadRangesPositionsIDS")]
    active_spread_range_ids: Option<Vec<u64>>,
}

#[derive(Debug, Deserialize)]
struct PoolsResponse {
    #[serde(default, rename = "poolsData")]
    pools_data: Option<Vec<WirePool>>,
}

#[derive(Debug, Deserialize)]
struct WirePool {
    /// Number or numeric string; entries without a usable id are skipped.
    #[serde(default, rename = "ID")]
    id: Option<Value>,
    #[serde(default)]
    title: Option<String>,
    /// Number or numeric string.
    #[serde(default)]
    longs: Option<Value>,
    #[serde(default)]
    shorts: Option<Value>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    closed: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct SpreadsResponse {
    #[serde(default, rename = "spreadsData")]
    spreads_data: Option<Vec<WireSpread>>,
}

#[derive(Debug, Deserialize)]
struct WireSpread {
    #[serde(default, rename = "ID")]
    id: Option<Value>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "spreadRanges")]
    spread_ranges: Option<Vec<WireRange>>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    closed: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct WireRange {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    odds: Option<Value>,
}

/// Bet endpoint body. Both endpoints answer with this loose shape.
#[derive(Debug, Deserialize)]
struct WireBetReply {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, alias = "ID", alias = "betID", alias = "betId")]
    id: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct WireRewards {
    #[serde(default)]
    data: Option<WireRewardData>,
}

#[derive(Debug, Deserialize)]
struct WireRewardData {
    #[serde(default)]
    missions: Option<Vec<WireMission>>,
    #[serde(default, rename = "cycleData")]
    cycle_data: Option<WireCycle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMission {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    claim_enabled: bool,
    #[serde(default)]
    claimed: bool,
    #[serde(default)]
    metrics: Option<WireMetrics>,
}

#[derive(Debug, Deserialize)]
struct WireMetrics {
    #[serde(default, rename = "cycleID")]
    cycle_id: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct WireCycle {
    #[serde(default, rename = "ID")]
    id: Option<Value>,
    #[serde(default)]
    released: bool,
}

#[derive(Debug, Deserialize)]
struct WireClaimReply {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// Read a number-or-string JSON value as a decimal.
fn decimal_of(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

/// Read a number-or-string JSON value as an id.
fn id_of(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn status_of(status: Option<&str>, closed: Option<bool>) -> MarketStatus {
    let closed_by_status = status
        .map(|s| CLOSED_STATUSES.contains(&s.to_lowercase().as_str()))
        .unwrap_or(false);
    if closed_by_status || closed == Some(true) {
        MarketStatus::Closed
    } else {
        MarketStatus::Open
    }
}

fn snippet(body: &str) -> String {
    body.chars().take(BODY_SNIPPET_LEN).collect()
}

impl WirePool {
    fn into_market(self, platform: Platform) -> Option<Market> {
        let Some(id) = id_of(self.id.as_ref()) else {
            warn!(platform = %platform, id = ?self.id, title = ?self.title, "Skipping pool without a usable id");
            return None;
        };
        let side = |v: &Option<Value>| v.as_ref().and_then(decimal_of).unwrap_or(Decimal::ZERO);
        Some(Market {
            id,
            platform,
            title: self.title.unwrap_or_default(),
            status: status_of(self.status.as_deref(), self.closed),
            held: false,
            book: MarketBook::Pool(PositionSnapshot {
                longs: side(&self.longs),
                shorts: side(&self.shorts),
            }),
        })
    }
}

impl WireSpread {
    fn into_market(self, platform: Platform) -> Option<Market> {
        let Some(id) = id_of(self.id.as_ref()) else {
            warn!(platform = %platform, id = ?self.id, title = ?self.title, "Skipping spread without a usable id");
            return None;
        };
        let ranges = self
            .spread_ranges
            .unwrap_or_default()
            .into_iter()
            .filter_map(|r| match id_of(r.id.as_ref()) {
                Some(range_id) => Some(SpreadRange {
                    id: range_id,
                    odds: r.odds.as_ref().and_then(decimal_of),
                    held: false,
                }),
                None => {
                    warn!(spread_id = id, id = ?r.id, "Skipping range without a usable id");
                    None
                }
            })
            .collect();
        Some(Market {
            id,
            platform,
            title: self.title.unwrap_or_default(),
            status: status_of(self.status.as_deref(), self.closed),
            held: false,
            book: MarketBook::Spread(ranges),
        })
    }
}

impl From<AuthRecord> for HeldPositions {
    fn from(a: AuthRecord) -> Self {
        HeldPositions {
            pools: a.pre_market_bet_ids.unwrap_or_default().into_iter().collect(),
            spread_ranges: a.active_spread_range_ids.unwrap_or_default().into_iter().collect(),
        }
    }
}

impl WireRewardData {
    fn into_board(self) -> RewardBoard {
        RewardBoard {
            missions: self
                .missions
                .unwrap_or_default()
                .into_iter()
                .filter_map(|m| {
                    let Some(id) = id_of(m.id.as_ref()) else {
                        warn!(id = ?m.id, "Skipping mission without a usable id");
                        return None;
                    };
                    Some(Mission {
                        id,
                        claim_enabled: m.claim_enabled,
                        claimed: m.claimed,
                        cycle_id: m.metrics.and_then(|x| id_of(x.cycle_id.as_ref())),
                    })
                })
                .collect(),
            cycle: self.cycle_data.and_then(|c| {
                Some(CycleInfo {
                    id: id_of(c.id.as_ref())?,
                    released: c.released,
                })
            }),
        }
    }
}

/// Interpret a bet endpoint answer.
fn interpret_bet_response(status: u16, body: &str) -> Result<BetReceipt, BetError> {
    let parsed: Option<WireBetReply> = serde_json::from_str(body).ok();

    if !(200..300).contains(&status) {
        let message = parsed
            .and_then(|p| p.error.or(p.message))
            .unwrap_or_else(|| snippet(body));
        return Err(BetError::from_response(status, &message));
    }

    let reply = parsed.ok_or_else(|| BetError::Malformed(snippet(body)))?;
    if reply.success == Some(false) {
        let message = reply
            .error
            .or(reply.message)
            .unwrap_or_else(|| "bet rejected".to_string());
        return Err(BetError::from_response(status, &message));
    }

    Ok(BetReceipt {
        reference: reply.id.map(|v| match v {
            Value::String(s) => s,
            other => other.to_string(),
        }),
        message: reply.message,
    })
}

fn transport_error(err: reqwest::Error) -> BetError {
    if err.is_timeout() {
        BetError::Timeout(err.to_string())
    } else if err.is_decode() {
        BetError::Malformed(err.to_string())
    } else {
        BetError::Network(err.to_string())
    }
}

/// Whole-unit stakes go out as JSON integers.
fn amount_json(amount: Decimal) -> Value {
    if amount.fract().is_zero() {
        if let Some(n) = amount.to_u64() {
            return json!(n);
        }
    }
    json!(amount.to_f64().unwrap_or_default())
}

fn claim_payload(claim: RewardClaim) -> Value {
    match claim {
        RewardClaim::Cycle { cycle_id } => json!({
            "_action": "claim-cycle",
            "missionCredID": 0,
            "cycleID": cycle_id,
        }),
        RewardClaim::Mission { mission_id, cycle_id } => json!({
            "_action": "claim-mission-rewards",
            "missionCredID": mission_id,
            "cycleID": cycle_id,
        }),
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Cookie-authenticated Kizzy session.
pub struct KizzyClient {
    http: Client,
    app_url: String,
    rest_url: String,
    account: String,
    closed: AtomicBool,
}

impl KizzyClient {
    pub fn new(cfg: &KizzyConfig, account: &str, cookies: &SecretString) -> Result<Self> {
        let mut cookie = HeaderValue::from_str(cookies.expose_secret())
            .context("Cookie header contains invalid characters")?;
        cookie.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, cookie);
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        let origin = HeaderValue::from_str(&cfg.app_url).context("Invalid app_url")?;
        headers.insert(ORIGIN, origin.clone());
        headers.insert(REFERER, origin);

        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.request_timeout_secs))
            .user_agent(&cfg.user_agent)
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client for Kizzy")?;

        Ok(Self {
            http,
            app_url: cfg.app_url.trim_end_matches('/').to_string(),
            rest_url: cfg.rest_url.trim_end_matches('/').to_string(),
            account: account.to_string(),
            closed: AtomicBool::new(false),
        })
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        if self.is_closed() {
            bail!("Session for {} is closed", self.account);
        }
        debug!(url = %url, account = %self.account, "GET");

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("Kizzy request failed: {url}"))?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            bail!("Kizzy API error {status}: {}", snippet(&body));
        }

        serde_json::from_str(&body)
            .with_context(|| format!("Invalid JSON response from {url}: {}...", snippet(&body)))
    }

    async fn finish_bet(
        &self,
        resp: std::result::Result<reqwest::Response, reqwest::Error>,
    ) -> Result<BetReceipt, BetError> {
        let resp = resp.map_err(transport_error)?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(transport_error)?;
        interpret_bet_response(status, &body)
    }
}

// ---------------------------------------------------------------------------
// KizzyApi trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl KizzyApi for KizzyClient {
    async fn fetch_positions(&self) -> Result<HeldPositions> {
        let record: AuthRecord = self.get_json(&format!("{}{AUTH_PATH}", self.app_url)).await?;
        let held = HeldPositions::from(record);
        info!(
            account = %self.account,
            pools = held.pools.len(),
            spread_ranges = held.spread_ranges.len(),
            "Held positions loaded"
        );
        Ok(held)
    }

    async fn fetch_pools(&self, platform: Platform) -> Result<Vec<Market>> {
        let url = format!("{}/api/v2/pvp/{}", self.app_url, platform.slug());
        let resp: PoolsResponse = self.get_json(&url).await?;
        Ok(resp
            .pools_data
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| p.into_market(platform))
            .collect())
    }

    async fn fetch_spreads(&self, platform: Platform) -> Result<Vec<Market>> {
        let url = format!("{}/api/v2/spreads/{}", self.app_url, platform.slug());
        let resp: SpreadsResponse = self.get_json(&url).await?;
        Ok(resp
            .spreads_data
            .unwrap_or_default()
            .into_iter()
            .filter_map(|s| s.into_market(platform))
            .collect())
    }

    async fn place_pool_bet(
        &self,
        pool_id: MarketId,
        side: PoolSide,
        amount: Decimal,
    ) -> Result<BetReceipt, BetError> {
        if self.is_closed() {
            return Err(BetError::SessionClosed);
        }
        let body = json!({
            "amount": amount_json(amount),
            "parimutuelPoolID": pool_id,
            "side": side.as_str(),
        });
        let resp = self
            .http
            .post(format!("{}/app/place-bet-pvp/{pool_id}", self.rest_url))
            .json(&body)
            .send()
            .await;
        self.finish_bet(resp).await
    }

    async fn place_spread_bet(
        &self,
        range_id: MarketId,
        amount: Decimal,
    ) -> Result<BetReceipt, BetError> {
        if self.is_closed() {
            return Err(BetError::SessionClosed);
        }
        let form = Form::new()
            .text("spreadPoolRangeID", range_id.to_string())
            .text("amount", amount.normalize().to_string());
        let resp = self
            .http
            .post(format!("{}{SPREAD_BET_PATH}", self.app_url))
            .multipart(form)
            .send()
            .await;
        self.finish_bet(resp).await
    }

    async fn fetch_rewards(&self) -> Result<RewardBoard> {
        let url = format!("{}{REWARDS_PATH}?main_tab=missions", self.rest_url);
        let resp: WireRewards = self.get_json(&url).await?;
        let data = resp.data.context("Rewards response has no 'data' object")?;
        Ok(data.into_board())
    }

    async fn claim_reward(&self, claim: RewardClaim) -> Result<ClaimReply> {
        if self.is_closed() {
            bail!("Session for {} is closed", self.account);
        }
        let resp = self
            .http
            .post(format!("{}{REWARDS_PATH}", self.rest_url))
            .json(&claim_payload(claim))
            .send()
            .await
            .context("Kizzy claim request failed")?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let parsed: Option<WireClaimReply> = serde_json::from_str(&body).ok();

        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            bail!("Kizzy claim error {status}: {}", snippet(&body));
        }
        if !status.is_success() {
            // Client-side refusals mean "cannot claim this now".
            let message = parsed
                .and_then(|p| p.error.or(p.message))
                .unwrap_or_else(|| snippet(&body));
            return Ok(ClaimReply {
                success: Some(false),
                message: Some(message),
            });
        }

        Ok(parsed
            .map(|p| ClaimReply {
                success: p.success,
                message: p.message.or(p.error),
            })
            .unwrap_or_default())
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!(account = %self.account, "Session closed");
        }
    }
}

// ---------------------------------------------------------------------------
// Session provider
// ---------------------------------------------------------------------------

/// Opens `KizzyClient` sessions from the cookie store.
pub struct CookieSessionProvider {
    store: CookieStore,
    config: KizzyConfig,
}

impl CookieSessionProvider {
    pub fn new(store: CookieStore, config: KizzyConfig) -> Self {
        Self { store, config }
    }
}

#[async_trait]
impl SessionProvider for CookieSessionProvider {
    async fn open(&self, account: &Account) -> Result<Box<dyn KizzyApi>, KizzyError> {
        let cookies = self.store.load(account)?;
        let header = cookie_header(&cookies);
        let client = KizzyClient::new(&self.config, &account.name, &header).map_err(|e| {
            warn!(account = %account.name, error = %e, "Session bootstrap failed");
            KizzyError::SessionAuthFailure {
                account: account.name.clone(),
                reason: format!("{e:#}"),
            }
        })?;
        info!(account = %account.name, cookies = cookies.len(), "Session opened");
        Ok(Box::new(client))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
