//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every field has a default, so a partial file (or none at all) yields
//! a runnable configuration. CLI flags override the risk and execution
//! modes at runtime.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::strategy::pool::SidePolicy;
use crate::types::{KizzyError, Platform};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub kizzy: KizzyConfig,
    pub accounts: AccountsConfig,
    pub betting: BettingConfig,
    pub submit: SubmitConfig,
    pub rewards: RewardsConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct KizzyConfig {
    /// Web app origin (auth, listings, spread bets).
    pub app_url: String,
    /// REST origin (pool bets, rewards).
    pub rest_url: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for KizzyConfig {
    fn default() -> Self {
        Self {
            app_url: "https://testnet.kizzy.io".to_string(),
            rest_url: "https://rest-api.kizzy.io".to_string(),
            request_timeout_secs: 30,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) KIZZY/0.1.0".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AccountsConfig {
    /// Directory holding one `<account>.json` cookie file per account.
    pub cookies_dir: String,
    /// Delay between launching parallel sessions.
    pub launch_stagger_secs: u64,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            cookies_dir: "kizzy/data".to_string(),
            launch_stagger_secs: 2,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BettingConfig {
    pub platforms: Vec<String>,
    /// Fetch→bet passes per account run.
    pub passes: u32,
    pub fetch_attempts: u32,
    pub fetch_retry_delay_secs: u64,
    pub pool_stake: Decimal,
    pub side_policy: SidePolicy,
    pub pool_bet_delay_secs: u64,
    pub spread_bet_delay_secs: u64,
    pub spread_market_delay_secs: u64,
    pub spread: SpreadConfig,
}

impl Default for BettingConfig {
    fn default() -> Self {
        Self {
            platforms: vec!["twitter".to_string(), "youtube".to_string()],
            passes: 1,
            fetch_attempts: 3,
            fetch_retry_delay_secs: 2,
            pool_stake: dec!(15),
            side_policy: SidePolicy::default(),
            pool_bet_delay_secs: 5,
            spread_bet_delay_secs: 4,
            spread_market_delay_secs: 5,
            spread: SpreadConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SpreadConfig {
    pub base_stake: Decimal,
    /// Fixed payout target; `base_stake × max_odds` when unset.
    pub target_payout: Option<Decimal>,
    pub min_stake: Decimal,
    pub max_stake: Decimal,
    /// 0-based range positions whose stake is reduced by `trim_amount`.
    pub trimmed_ranges: Vec<usize>,
    pub trim_amount: Decimal,
}

impl Default for SpreadConfig {
    fn default() -> Self {
        Self {
            base_stake: dec!(15),
            target_payout: None,
            min_stake: dec!(1),
            max_stake: dec!(99),
            trimmed_ranges: Vec::new(),
            trim_amount: dec!(5),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SubmitConfig {
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_secs: 2,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RewardsConfig {
    pub passes: u32,
    pub claim_delay_secs: u64,
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            passes: 5,
            claim_delay_secs: 2,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file. A missing file yields defaults.
    pub fn load(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            info!(path, "No config file found, using defaults");
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse and validate TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot honour.
    pub fn validate(&self) -> Result<(), KizzyError> {
        let spread = &self.betting.spread;
        if spread.min_stake > spread.max_stake {
            return Err(KizzyError::Config(format!(
                "spread min_stake {} exceeds max_stake {}",
                spread.min_stake, spread.max_stake
            )));
        }
        if self.betting.pool_stake <= Decimal::ZERO {
            return Err(KizzyError::Config("pool_stake must be positive".into()));
        }
        if self.submit.max_attempts == 0 || self.betting.fetch_attempts == 0 {
            return Err(KizzyError::Config("attempt counts must be at least 1".into()));
        }
        if self.betting.passes == 0 || self.rewards.passes == 0 {
            return Err(KizzyError::Config("pass counts must be at least 1".into()));
        }
        self.platforms()?;
        Ok(())
    }

    /// Configured platforms, parsed.
    pub fn platforms(&self) -> Result<Vec<Platform>, KizzyError> {
        self.betting
            .platforms
            .iter()
            .map(|p| p.parse::<Platform>().map_err(|e| KizzyError::Config(e.to_string())))
            .collect()
    }
}
