//! Persistence layer.
//!
//! Stores one JSON cookie file per account (`<dir>/<account>.json`),
//! in the shape browsers export them: an array of
//! `{name, value, domain, path, expiry}`. The directory listing is the
//! account roster.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::types::{Account, KizzyError};

const COOKIE_EXT: &str = "json";

/// A persisted browser cookie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    /// Unix seconds; session cookies have none.
    #[serde(default)]
    pub expiry: Option<f64>,
}

impl StoredCookie {
    pub fn is_expired(&self, now_secs: i64) -> bool {
        self.expiry.is_some_and(|e| (e as i64) <= now_secs)
    }
}

/// Build the `Cookie` request header from stored cookies.
pub fn cookie_header(cookies: &[StoredCookie]) -> SecretString {
    let header = cookies
        .iter()
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ");
    SecretString::new(header)
}

/// Directory-backed cookie store keyed by account name.
#[derive(Debug, Clone)]
pub struct CookieStore {
    dir: PathBuf,
}

impl CookieStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            bail!("Invalid account name: {name:?}");
        }
        Ok(self.dir.join(format!("{name}.{COOKIE_EXT}")))
    }

    /// Accounts with a cookie file, sorted by name and numbered from 1.
    /// A missing directory is an empty roster.
    pub fn accounts(&self) -> Result<Vec<Account>> {
        if !self.dir.exists() {
            info!(dir = %self.dir.display(), "Cookie directory not found");
            return Ok(Vec::new());
        }

        let mut found: Vec<(String, PathBuf)> = std::fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to list {}", self.dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == COOKIE_EXT))
            .filter_map(|p| {
                let name = p.file_stem()?.to_string_lossy().to_string();
                Some((name, p))
            })
            .collect();
        found.sort();

        Ok(found
            .into_iter()
            .enumerate()
            .map(|(i, (name, cookie_path))| Account {
                index: i + 1,
                name,
                cookie_path,
            })
            .collect())
    }

    /// Load an account's unexpired cookies.
    ///
    /// Absent, empty, or fully expired files are `NoCookies`; unreadable or
    /// corrupt files are `SessionAuthFailure`.
    pub fn load(&self, account: &Account) -> Result<Vec<StoredCookie>, KizzyError> {
        let path = &account.cookie_path;
        if !path.exists() {
            return Err(KizzyError::NoCookies {
                account: account.name.clone(),
            });
        }

        let auth_failure = |reason: String| KizzyError::SessionAuthFailure {
            account: account.name.clone(),
            reason,
        };

        let json = std::fs::read_to_string(path)
            .map_err(|e| auth_failure(format!("failed to read {}: {e}", path.display())))?;
        let cookies: Vec<StoredCookie> = serde_json::from_str(&json)
            .map_err(|e| auth_failure(format!("failed to parse {}: {e}", path.display())))?;

        let now = Utc::now().timestamp();
        let total = cookies.len();
        let live: Vec<StoredCookie> = cookies.into_iter().filter(|c| !c.is_expired(now)).collect();

        debug!(
            account = %account.name,
            total,
            live = live.len(),
            "Cookies loaded"
        );

        if live.is_empty() {
            return Err(KizzyError::NoCookies {
                account: account.name.clone(),
            });
        }
        Ok(live)
    }

    /// Write cookies for `name`, replacing any existing file.
    pub fn save(&self, name: &str, cookies: &[StoredCookie]) -> Result<PathBuf> {
        let path = self.path_for(name)?;
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let json = serde_json::to_string_pretty(cookies).context("Failed to serialise cookies")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write cookies to {}", path.display()))?;

        info!(account = name, count = cookies.len(), path = %path.display(), "Cookies saved");
        Ok(path)
    }

    /// Copy a browser cookie export into the store under `name`.
    pub fn import(&self, name: &str, source: &Path) -> Result<PathBuf> {
        let json = std::fs::read_to_string(source)
            .with_context(|| format!("Failed to read {}", source.display()))?;
        let cookies: Vec<StoredCookie> = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse cookie export {}", source.display()))?;
        if cookies.is_empty() {
            bail!("Cookie export {} is empty", source.display());
        }
        self.save(name, &cookies)
    }

    /// Delete an account's cookie file (missing is fine).
    pub fn delete(&self, name: &str) -> Result<()> {
        let path = self.path_for(name)?;
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to delete {}", path.display()))?;
            info!(account = name, path = %path.display(), "Cookies removed");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
