//! Multi-account orchestration.
//!
//! Runs one session per account, either one after another or all at once
//! (launches staggered). Sessions share nothing but the runner's immutable
//! settings and the session provider; a failing or panicking session is
//! reported on its own and never stops its siblings.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info};

use super::report::AccountReport;
use super::session::SessionRunner;
use crate::platforms::SessionProvider;
use crate::types::{Account, ExecutionMode, KizzyError};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub execution: ExecutionMode,
    /// 1-based account index to run alone.
    pub target_index: Option<usize>,
    pub launch_stagger: Duration,
}

/// Pick the accounts a run covers.
pub fn select_accounts(
    accounts: Vec<Account>,
    target_index: Option<usize>,
) -> Result<Vec<Account>, KizzyError> {
    match target_index {
        None => Ok(accounts),
        Some(index) => {
            let available = accounts.len();
            accounts
                .into_iter()
                .find(|a| a.index == index)
                .map(|a| vec![a])
                .ok_or_else(|| {
                    KizzyError::Config(format!(
                        "no account with index {index} ({available} accounts available)"
                    ))
                })
        }
    }
}

/// Run every selected account and return their reports ordered by index.
pub async fn run_accounts(
    accounts: Vec<Account>,
    runner: Arc<SessionRunner>,
    provider: Arc<dyn SessionProvider>,
    options: &RunOptions,
) -> Result<Vec<AccountReport>, KizzyError> {
    let accounts = select_accounts(accounts, options.target_index)?;
    info!(
        accounts = accounts.len(),
        execution = ?options.execution,
        mode = ?runner.mode(),
        "Starting run"
    );

    let mut reports = match options.execution {
        ExecutionMode::Sequential => {
            let mut reports = Vec::with_capacity(accounts.len());
            for account in accounts {
                reports.push(run_isolated(runner.clone(), provider.clone(), account).await);
            }
            reports
        }
        ExecutionMode::Parallel => {
            let mut sessions = JoinSet::new();
            for (i, account) in accounts.into_iter().enumerate() {
                if i > 0 && !options.launch_stagger.is_zero() {
                    tokio::time::sleep(options.launch_stagger).await;
                }
                sessions.spawn(run_isolated(runner.clone(), provider.clone(), account));
            }

            let mut reports = Vec::with_capacity(sessions.len());
            while let Some(joined) = sessions.join_next().await {
                match joined {
                    Ok(report) => reports.push(report),
                    Err(e) => error!(error = %e, "Session task did not complete"),
                }
            }
            reports
        }
    };

    reports.sort_by_key(|r| r.account.index);
    info!(
        completed = reports.iter().filter(|r| r.is_done()).count(),
        aborted = reports.iter().filter(|r| !r.is_done()).count(),
        "Run finished"
    );
    Ok(reports)
}

async fn run_isolated(
    runner: Arc<SessionRunner>,
    provider: Arc<dyn SessionProvider>,
    account: Account,
) -> AccountReport {
    let outcome = AssertUnwindSafe(runner.run(&account, provider.as_ref()))
        .catch_unwind()
        .await;
    outcome.unwrap_or_else(|_| {
        error!(account = %account, "Session task panicked");
        let mut report = AccountReport::new(account);
        report.abort("session task panicked");
        report
    })
}
