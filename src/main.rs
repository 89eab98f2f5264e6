//! KIZZY: multi-account pool/spread betting agent.
//!
//! Entry point. Loads configuration, initialises structured logging, and
//! dispatches the CLI subcommands: `run` (bet and claim rewards for every
//! stored account), `accounts` (list the cookie store), `import`
//! (add a browser cookie export) and `forget` (drop an account's cookies).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use kizzy::config::AppConfig;
use kizzy::engine::orchestrator::{run_accounts, RunOptions};
use kizzy::engine::session::SessionRunner;
use kizzy::platforms::kizzy::CookieSessionProvider;
use kizzy::platforms::SessionProvider;
use kizzy::storage::CookieStore;
use kizzy::types::{ExecutionMode, RiskMode};

const BANNER: &str = r#"
 _  _____ __________   __
| |/ /_ _|__  /__  /\ \ / /
| ' / | |  / /  / /  \ V /
| . \ | | / /_ / /_   | |
|_|\_\___/____/____|  |_|

  Pool & spread betting agent: v0.1.0
"#;

#[derive(Parser)]
#[command(name = "kizzy")]
#[command(about = "Places Kizzy pool/spread bets and claims rewards across accounts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the TOML configuration file
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Bet on open markets and claim rewards
    Run {
        /// Bet on every open market, including ones already held
        #[arg(long)]
        bet_all: bool,

        /// Run all account sessions concurrently
        #[arg(long)]
        parallel: bool,

        /// Run only the account with this 1-based index
        #[arg(short, long)]
        account: Option<usize>,

        /// Log bets instead of placing them
        #[arg(long)]
        dry_run: bool,
    },

    /// List stored accounts
    Accounts,

    /// Import a browser cookie export for an account
    Import {
        /// Account name
        name: String,

        /// JSON cookie export file
        file: PathBuf,
    },

    /// Remove a stored account's cookies
    Forget {
        /// Account name
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.config.to_string_lossy().to_string();
    let cfg = AppConfig::load(&config_path)?;
    let store = CookieStore::new(&cfg.accounts.cookies_dir);

    match cli.command {
        Commands::Run {
            bet_all,
            parallel,
            account,
            dry_run,
        } => run(cfg, store, bet_all, parallel, account, dry_run).await,
        Commands::Accounts => list_accounts(&store),
        Commands::Import { name, file } => {
            let path = store.import(&name, &file)?;
            println!("Imported cookies for '{name}' into {}", path.display());
            Ok(())
        }
        Commands::Forget { name } => {
            store.delete(&name)?;
            println!("Removed cookies for '{name}'");
            Ok(())
        }
    }
}

async fn run(
    cfg: AppConfig,
    store: CookieStore,
    bet_all: bool,
    parallel: bool,
    account: Option<usize>,
    dry_run: bool,
) -> Result<()> {
    println!("{BANNER}");

    let mode = if bet_all { RiskMode::BetAll } else { RiskMode::Skip };
    let execution = if parallel {
        ExecutionMode::Parallel
    } else {
        ExecutionMode::Sequential
    };

    let accounts = store.accounts()?;
    if accounts.is_empty() {
        warn!(dir = %store.dir().display(), "No accounts found; import cookies first");
        return Ok(());
    }

    info!(
        accounts = accounts.len(),
        mode = ?mode,
        execution = ?execution,
        dry_run,
        "KIZZY starting up"
    );

    let runner = Arc::new(SessionRunner::from_config(&cfg, mode, dry_run)?);
    let provider: Arc<dyn SessionProvider> =
        Arc::new(CookieSessionProvider::new(store, cfg.kizzy.clone()));
    let options = RunOptions {
        execution,
        target_index: account,
        launch_stagger: Duration::from_secs(cfg.accounts.launch_stagger_secs),
    };

    let reports = run_accounts(accounts, runner, provider, &options)
        .await
        .context("Run could not start")?;

    println!("\n=== Run summary ===");
    for report in &reports {
        println!("{report}");
    }
    let aborted = reports.iter().filter(|r| !r.is_done()).count();
    println!(
        "\n{} account(s): {} done, {} aborted",
        reports.len(),
        reports.len() - aborted,
        aborted
    );
    Ok(())
}

fn list_accounts(store: &CookieStore) -> Result<()> {
    let accounts = store.accounts()?;
    if accounts.is_empty() {
        println!("No accounts in {}", store.dir().display());
        return Ok(());
    }
    for account in accounts {
        println!("{:>3}  {}", account.index, account.name);
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose { "kizzy=debug" } else { "kizzy=info" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let json_logging = std::env::var("KIZZY_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
