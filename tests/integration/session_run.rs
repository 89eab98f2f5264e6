//! End-to-end session and multi-account runs against `MockKizzy`.

use rust_decimal_macros::dec;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use kizzy::config::AppConfig;
use kizzy::engine::orchestrator::{run_accounts, RunOptions};
use kizzy::engine::report::SessionOutcome;
use kizzy::engine::session::SessionRunner;
use kizzy::platforms::SessionProvider;
use kizzy::types::*;

use crate::mock_platform::{MockKizzy, MockProvider, PlacedBet};

fn quiet_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.betting.pool_bet_delay_secs = 0;
    cfg.betting.spread_bet_delay_secs = 0;
    cfg.betting.spread_market_delay_secs = 0;
    cfg.betting.fetch_retry_delay_secs = 0;
    cfg.submit.retry_delay_secs = 0;
    cfg.rewards.claim_delay_secs = 0;
    cfg
}

fn account(index: usize, name: &str) -> Account {
    Account {
        index,
        name: name.to_string(),
        cookie_path: PathBuf::from(format!("{name}.json")),
    }
}

fn runner(cfg: &AppConfig, mode: RiskMode) -> SessionRunner {
    SessionRunner::from_config(cfg, mode, false).unwrap()
}

fn options(execution: ExecutionMode, target_index: Option<usize>) -> RunOptions {
    RunOptions {
        execution,
        target_index,
        launch_stagger: Duration::ZERO,
    }
}

fn mission_board() -> RewardBoard {
    RewardBoard {
        missions: vec![
            Mission { id: 7, claim_enabled: true, claimed: false, cycle_id: Some(4) },
            Mission { id: 8, claim_enabled: false, claimed: false, cycle_id: Some(4) },
        ],
        cycle: Some(CycleInfo { id: 4, released: true }),
    }
}

#[tokio::test]
async fn test_full_session_bets_and_claims() {
    let mock = MockKizzy::with_default_markets(dec!(1000));
    mock.set_rewards(mission_board());
    let provider = MockProvider::new().with_session("alice", mock.clone());

    let report = runner(&quiet_config(), RiskMode::Skip)
        .run(&account(1, "alice"), &provider)
        .await;

    assert_eq!(report.outcome, SessionOutcome::Done);
    assert_eq!(
        mock.bets(),
        vec![
            PlacedBet { key: BetKey::Pool(1), side: Some(PoolSide::Short), amount: dec!(15) },
            PlacedBet { key: BetKey::SpreadRange(30), side: None, amount: dec!(15) },
            PlacedBet { key: BetKey::SpreadRange(31), side: None, amount: dec!(30) },
            PlacedBet { key: BetKey::Pool(2), side: Some(PoolSide::Long), amount: dec!(15) },
        ]
    );
    assert_eq!(report.succeeded(), 4);
    assert_eq!(report.total_staked(), dec!(75));
    assert_eq!(mock.balance(), dec!(925));

    // YouTube has no spreads; the listing is never requested.
    assert_eq!(mock.spread_fetches(Platform::Youtube), 0);
    assert_eq!(mock.spread_fetches(Platform::Twitter), 1);

    assert_eq!(
        mock.claims(),
        vec![
            RewardClaim::Cycle { cycle_id: 4 },
            RewardClaim::Mission { mission_id: 7, cycle_id: 4 },
        ]
    );
    assert_eq!(report.rewards_claimed(), 2);
    assert_eq!(mock.close_calls(), 1);
}

#[tokio::test]
async fn test_skip_mode_respects_platform_positions() {
    let mock = MockKizzy::with_default_markets(dec!(1000));
    mock.hold(HeldPositions {
        pools: [1].into_iter().collect(),
        spread_ranges: [30].into_iter().collect(),
    });
    let provider = MockProvider::new().with_session("alice", mock.clone());

    let report = runner(&quiet_config(), RiskMode::Skip)
        .run(&account(1, "alice"), &provider)
        .await;

    let keys: Vec<BetKey> = mock.bets().iter().map(|b| b.key).collect();
    assert_eq!(keys, vec![BetKey::SpreadRange(31), BetKey::Pool(2)]);
    assert_eq!(report.outcome, SessionOutcome::Done);
    // Pool 1 is dropped whole; spread 3 is still bet, minus range 30.
    assert_eq!(report.skipped_markets, 1);
    assert_eq!(report.skipped_ranges, 1);
}

#[tokio::test]
async fn test_bet_all_mode_ignores_positions() {
    let mock = MockKizzy::with_default_markets(dec!(1000));
    mock.hold(HeldPositions {
        pools: [1].into_iter().collect(),
        spread_ranges: [30].into_iter().collect(),
    });
    let provider = MockProvider::new().with_session("alice", mock.clone());

    runner(&quiet_config(), RiskMode::BetAll)
        .run(&account(1, "alice"), &provider)
        .await;

    assert_eq!(mock.bets().len(), 4);
}

#[tokio::test]
async fn test_repeated_passes_do_not_double_bet() {
    let mut cfg = quiet_config();
    cfg.betting.passes = 3;
    let mock = MockKizzy::with_default_markets(dec!(1000));
    let provider = MockProvider::new().with_session("alice", mock.clone());

    let report = runner(&cfg, RiskMode::Skip)
        .run(&account(1, "alice"), &provider)
        .await;

    assert_eq!(mock.bets().len(), 4);
    assert_eq!(report.succeeded(), 4);
    assert_eq!(report.attempted, 4);
}

#[tokio::test]
async fn test_bet_all_passes_do_not_double_bet() {
    let mut cfg = quiet_config();
    cfg.betting.passes = 2;
    let mock = MockKizzy::with_default_markets(dec!(1000));
    mock.hold(HeldPositions {
        pools: [1].into_iter().collect(),
        spread_ranges: HashSet::new(),
    });
    let provider = MockProvider::new().with_session("alice", mock.clone());

    let report = runner(&cfg, RiskMode::BetAll)
        .run(&account(1, "alice"), &provider)
        .await;

    // The held pool is bet once; nothing confirmed this run is bet again.
    assert_eq!(mock.bets().len(), 4);
    assert_eq!(report.attempted, 4);
    assert_eq!(
        mock.bets().iter().filter(|b| b.key == BetKey::Pool(1)).count(),
        1
    );
}

#[tokio::test]
async fn test_recoverable_failures_retried_and_recorded_once() {
    let mock = MockKizzy::with_default_markets(dec!(1000));
    mock.script_bet_failures(vec![
        BetError::RateLimited,
        BetError::Transient { status: 503, body: "busy".into() },
    ]);
    let provider = MockProvider::new().with_session("alice", mock.clone());

    let report = runner(&quiet_config(), RiskMode::Skip)
        .run(&account(1, "alice"), &provider)
        .await;

    assert_eq!(report.failed.len(), 0);
    assert_eq!(report.confirmed[0].key, BetKey::Pool(1));
    assert_eq!(report.confirmed[0].attempts, 3);
    let pool_one = mock.bets().iter().filter(|b| b.key == BetKey::Pool(1)).count();
    assert_eq!(pool_one, 1);
}

#[tokio::test]
async fn test_fatal_bet_failures_do_not_abort() {
    let mock = MockKizzy::with_default_markets(dec!(20));
    mock.set_rewards(mission_board());
    let provider = MockProvider::new().with_session("alice", mock.clone());

    let report = runner(&quiet_config(), RiskMode::Skip)
        .run(&account(1, "alice"), &provider)
        .await;

    assert_eq!(report.outcome, SessionOutcome::Done);
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failed.len(), 3);
    assert!(report.failed.iter().all(|f| f.reason.contains("Insufficient balance")));
    // Rewards are claimed regardless of bet outcomes.
    assert_eq!(report.rewards_claimed(), 2);
}

#[tokio::test]
async fn test_all_listings_failing_aborts_but_still_claims() {
    let mock = MockKizzy::with_default_markets(dec!(1000));
    mock.fail_fetches("Invalid JSON response: <html>");
    mock.set_rewards(mission_board());
    let provider = MockProvider::new().with_session("alice", mock.clone());

    let report = runner(&quiet_config(), RiskMode::Skip)
        .run(&account(1, "alice"), &provider)
        .await;

    match &report.outcome {
        SessionOutcome::Aborted(reason) => assert!(reason.contains("no market listing")),
        other => panic!("expected abort, got {other:?}"),
    }
    // Twitter pools, Twitter spreads, YouTube pools.
    assert_eq!(report.fetch_failures.len(), 3);
    assert!(report.fetch_failures.iter().all(|f| f.contains("Fetch failed")));
    assert!(mock.bets().is_empty());
    assert_eq!(report.rewards_claimed(), 2);
    assert_eq!(mock.close_calls(), 1);
}

#[tokio::test]
async fn test_failed_spread_listing_does_not_stop_session() {
    let mock = MockKizzy::with_default_markets(dec!(1000));
    mock.fail_spread_fetches("502 on twitter spreads");
    mock.set_rewards(mission_board());
    let provider = MockProvider::new().with_session("alice", mock.clone());

    let report = runner(&quiet_config(), RiskMode::Skip)
        .run(&account(1, "alice"), &provider)
        .await;

    assert_eq!(report.outcome, SessionOutcome::Done);
    let keys: Vec<BetKey> = mock.bets().iter().map(|b| b.key).collect();
    assert_eq!(keys, vec![BetKey::Pool(1), BetKey::Pool(2)]);
    assert_eq!(report.fetch_failures.len(), 1);
    assert!(report.fetch_failures[0].contains("twitter spread"));
    assert_eq!(mock.spread_fetches(Platform::Twitter), 3);
    assert_eq!(
        mock.claims(),
        vec![
            RewardClaim::Cycle { cycle_id: 4 },
            RewardClaim::Mission { mission_id: 7, cycle_id: 4 },
        ]
    );
    assert_eq!(mock.close_calls(), 1);
}

#[tokio::test]
async fn test_auth_record_failure_aborts_and_closes() {
    let mock = MockKizzy::with_default_markets(dec!(1000));
    mock.fail_auth("401 Unauthorized");
    let provider = MockProvider::new().with_session("alice", mock.clone());

    let report = runner(&quiet_config(), RiskMode::Skip)
        .run(&account(1, "alice"), &provider)
        .await;

    assert!(matches!(report.outcome, SessionOutcome::Aborted(_)));
    assert_eq!(mock.close_calls(), 1);
}

#[tokio::test]
async fn test_dry_run_places_nothing() {
    let mock = MockKizzy::with_default_markets(dec!(1000));
    let provider = MockProvider::new().with_session("alice", mock.clone());

    let report = SessionRunner::from_config(&quiet_config(), RiskMode::Skip, true)
        .unwrap()
        .run(&account(1, "alice"), &provider)
        .await;

    assert!(mock.bets().is_empty());
    assert_eq!(report.succeeded(), 4);
    assert!(report.confirmed.iter().all(|c| c.reference.starts_with("dry-run-")));
}

#[tokio::test]
async fn test_parallel_auth_failure_is_isolated() {
    let bob = MockKizzy::with_default_markets(dec!(1000));
    let provider: Arc<dyn SessionProvider> = Arc::new(
        MockProvider::new()
            .with_failure(
                "alice",
                KizzyError::SessionAuthFailure {
                    account: "alice".into(),
                    reason: "cookies rejected".into(),
                },
            )
            .with_session("bob", bob.clone()),
    );

    let reports = run_accounts(
        vec![account(1, "alice"), account(2, "bob")],
        Arc::new(runner(&quiet_config(), RiskMode::Skip)),
        provider,
        &options(ExecutionMode::Parallel, None),
    )
    .await
    .unwrap();

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].account.name, "alice");
    assert!(matches!(reports[0].outcome, SessionOutcome::Aborted(_)));
    assert_eq!(reports[1].account.name, "bob");
    assert_eq!(reports[1].outcome, SessionOutcome::Done);
    assert_eq!(bob.bets().len(), 4);
}

#[tokio::test]
async fn test_parallel_panic_is_isolated_and_closed() {
    let alice = MockKizzy::with_default_markets(dec!(1000));
    alice.panic_on_auth();
    let bob = MockKizzy::with_default_markets(dec!(1000));
    let provider: Arc<dyn SessionProvider> = Arc::new(
        MockProvider::new()
            .with_session("alice", alice.clone())
            .with_session("bob", bob.clone()),
    );

    let reports = run_accounts(
        vec![account(1, "alice"), account(2, "bob")],
        Arc::new(runner(&quiet_config(), RiskMode::Skip)),
        provider,
        &options(ExecutionMode::Parallel, None),
    )
    .await
    .unwrap();

    assert!(matches!(reports[0].outcome, SessionOutcome::Aborted(_)));
    assert_eq!(alice.close_calls(), 1);
    assert_eq!(reports[1].outcome, SessionOutcome::Done);
    assert_eq!(bob.close_calls(), 1);
}

#[tokio::test]
async fn test_sequential_sessions_keep_separate_state() {
    let alice = MockKizzy::with_default_markets(dec!(1000));
    let bob = MockKizzy::with_default_markets(dec!(1000));
    let provider: Arc<dyn SessionProvider> = Arc::new(
        MockProvider::new()
            .with_session("alice", alice.clone())
            .with_session("bob", bob.clone()),
    );

    let reports = run_accounts(
        vec![account(1, "alice"), account(2, "bob")],
        Arc::new(runner(&quiet_config(), RiskMode::Skip)),
        provider,
        &options(ExecutionMode::Sequential, None),
    )
    .await
    .unwrap();

    // The second session is not affected by what the first one bet.
    assert_eq!(alice.bets().len(), 4);
    assert_eq!(bob.bets().len(), 4);
    assert!(reports.iter().all(|r| r.is_done()));
}

#[tokio::test]
async fn test_target_index_runs_one_account() {
    let alice = MockKizzy::with_default_markets(dec!(1000));
    let bob = MockKizzy::with_default_markets(dec!(1000));
    let provider: Arc<dyn SessionProvider> = Arc::new(
        MockProvider::new()
            .with_session("alice", alice.clone())
            .with_session("bob", bob.clone()),
    );

    let reports = run_accounts(
        vec![account(1, "alice"), account(2, "bob")],
        Arc::new(runner(&quiet_config(), RiskMode::Skip)),
        provider.clone(),
        &options(ExecutionMode::Sequential, Some(2)),
    )
    .await
    .unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].account.name, "bob");
    assert!(alice.bets().is_empty());
    assert_eq!(alice.close_calls(), 0);

    let missing = run_accounts(
        vec![account(1, "alice")],
        Arc::new(runner(&quiet_config(), RiskMode::Skip)),
        provider,
        &options(ExecutionMode::Sequential, Some(3)),
    )
    .await;
    assert!(matches!(missing, Err(KizzyError::Config(_))));
}
