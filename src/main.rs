//! Treasury Engine - Main Entry Point
//!
//! Runs the strategy scheduler, or one-off administrative commands against
//! the memory store.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;
use treasury_engine::config::{Config, LoggingConfig};
use treasury_engine::exchange::VenueAdapter;
use treasury_engine::harness::{CycleOutcome, ExecutionHarness, StaticSnapshotProvider};
use treasury_engine::persistence::{default_funding_basis_memory, open_store, MemoryStore};
use treasury_engine::policy::PolicyEngine;
use treasury_engine::scheduler::Scheduler;
use treasury_engine::schema::{ActionType, PolicyCheckRequest, RiskBucket, StrategyStatus};
use treasury_engine::strategy::StrategyRegistry;

/// Treasury Engine CLI
#[derive(Parser)]
#[command(name = "treasury-engine")]
#[command(version, about = "Policy-enforced treasury strategy execution")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler until Ctrl-C (default)
    Run,

    /// Run a single cycle for one strategy
    Tick {
        #[arg(short, long)]
        strategy: String,
    },

    /// Create a funding-basis strategy record
    Seed {
        #[arg(short, long)]
        strategy: String,

        #[arg(short, long, default_value = "BTC/USD")]
        pair: String,

        #[arg(short, long, default_value = "kraken")]
        venue: String,

        #[arg(short, long, default_value = "yellow")]
        bucket: RiskBucket,

        #[arg(long, default_value = "planned")]
        status: StrategyStatus,

        /// Overwrite an existing record
        #[arg(long)]
        force: bool,
    },

    /// Show a strategy's memory
    Status {
        #[arg(short, long)]
        strategy: String,

        /// Number of recent log entries to show
        #[arg(short, long, default_value = "10")]
        logs: usize,
    },

    /// Print domain memory and any consistency findings
    Domain,

    /// Evaluate a hypothetical action against the current policy
    CheckPolicy {
        #[arg(short, long, default_value = "cli")]
        strategy: String,

        #[arg(short, long, default_value = "OPEN_POSITION")]
        action: ActionType,

        /// Signed USD exposure change
        #[arg(short, long, allow_hyphen_values = true)]
        delta: Decimal,

        /// Comma-separated asset symbols
        #[arg(long, value_delimiter = ',')]
        assets: Vec<String>,

        #[arg(short, long)]
        venue: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    let config = Config::load()?;
    config.validate()?;

    init_logging(&config.logging)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&config).await,
        Commands::Tick { strategy } => tick(&config, &strategy).await,
        Commands::Seed {
            strategy,
            pair,
            venue,
            bucket,
            status,
            force,
        } => seed(&config, &strategy, &pair, &venue, bucket, status, force),
        Commands::Status { strategy, logs } => show_status(&config, &strategy, logs),
        Commands::Domain => show_domain(&config),
        Commands::CheckPolicy {
            strategy,
            action,
            delta,
            assets,
            venue,
        } => check_policy(&config, &strategy, action, delta, assets, &venue),
    }
}

/// Wire the harness from configuration.
fn build_harness(config: &Config, store: Arc<dyn MemoryStore>) -> Result<ExecutionHarness> {
    let adapter =
        Arc::new(VenueAdapter::from_config(&config.venue).context("Failed to build venue adapter")?);
    let snapshots = Arc::new(StaticSnapshotProvider::new(config.snapshot.to_snapshot()));

    info!(mode = %adapter.mode(), venue = %config.venue.name, "Venue adapter ready");

    Ok(ExecutionHarness::new(
        store,
        adapter.clone(),
        adapter,
        snapshots,
        StrategyRegistry::with_builtin(),
    ))
}

async fn run(config: &Config) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        store = %config.store.path,
        "Treasury engine starting"
    );

    log_config(config);

    let store = open_store(&config.store).context("Failed to open memory store")?;
    let domain = store.load_domain_memory()?;
    for finding in domain.validate() {
        warn!(finding = %finding, "Domain memory inconsistency");
    }
    let running: Vec<&str> = domain
        .strategies_with_status(StrategyStatus::Running)
        .into_iter()
        .map(|s| s.id.as_str())
        .collect();
    info!(
        registered = domain.strategy_registry.len(),
        running = ?running,
        "Strategy registry loaded"
    );

    let harness = Arc::new(build_harness(config, store)?);
    let scheduler = Scheduler::new(
        harness,
        Duration::from_secs(config.scheduler.tick_interval_secs),
    );

    // Setup graceful shutdown
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received; finishing current tick");
        shutdown_clone.store(true, Ordering::SeqCst);
    });

    scheduler.run(shutdown).await;

    info!("Treasury engine shutdown complete");
    Ok(())
}

async fn tick(config: &Config, strategy_id: &str) -> Result<()> {
    let store = open_store(&config.store).context("Failed to open memory store")?;
    let harness = build_harness(config, store)?;

    let outcome = harness
        .run_cycle(strategy_id)
        .await
        .with_context(|| format!("Cycle failed for {}", strategy_id))?;

    match &outcome {
        CycleOutcome::NotProvisioned => println!("{}: not provisioned", strategy_id),
        CycleOutcome::Inactive { status } => println!("{}: inactive ({})", strategy_id, status),
        CycleOutcome::NoProposal => println!("{}: no proposal", strategy_id),
        CycleOutcome::Denied { reasons } => {
            println!("{}: denied", strategy_id);
            for reason in reasons {
                println!("   - {}", reason);
            }
        }
        CycleOutcome::Executed { order, warnings } => {
            println!(
                "{}: executed {} {} {} ({} mode, order {})",
                strategy_id, order.side, order.filled_amount, order.symbol, order.mode, order.order_id
            );
            for warning in warnings {
                println!("   ! {}", warning);
            }
        }
        CycleOutcome::Unfilled { order } => {
            println!(
                "{}: order {} accepted with no fills ({:?}); not booked",
                strategy_id, order.order_id, order.status
            );
        }
    }
    Ok(())
}

fn seed(
    config: &Config,
    strategy_id: &str,
    pair: &str,
    venue: &str,
    bucket: RiskBucket,
    status: StrategyStatus,
    force: bool,
) -> Result<()> {
    let store = open_store(&config.store).context("Failed to open memory store")?;

    if !force && store.load_strategy_memory(strategy_id)?.is_some() {
        anyhow::bail!(
            "strategy {} already exists; pass --force to overwrite",
            strategy_id
        );
    }

    let memory = default_funding_basis_memory(strategy_id, pair, venue, bucket, status);
    store.save_strategy_memory(strategy_id, &memory)?;

    info!(strategy_id = %strategy_id, pair = %pair, venue = %venue, status = %status, "Strategy seeded");
    println!("Seeded {} ({} on {}, {})", strategy_id, pair, venue, status);
    Ok(())
}

fn show_status(config: &Config, strategy_id: &str, log_count: usize) -> Result<()> {
    let store = open_store(&config.store).context("Failed to open memory store")?;

    let Some(memory) = store.load_strategy_memory(strategy_id)? else {
        println!("Strategy {} is not provisioned.", strategy_id);
        let ids = store.list_strategy_ids()?;
        if !ids.is_empty() {
            println!("Known strategies: {}", ids.join(", "));
        }
        return Ok(());
    };

    let meta = &memory.strategy_meta;
    let perf = &memory.performance;

    println!("\nStrategy {}", meta.id);
    println!("   ├─ Kind:        {}", meta.kind);
    println!("   ├─ Pair:        {}", meta.pair.as_deref().unwrap_or("-"));
    println!("   ├─ Venue:       {}", meta.venue);
    println!("   ├─ Risk Bucket: {}", meta.risk_bucket);
    println!("   └─ Status:      {}", meta.status);

    println!("\nPerformance");
    println!("   ├─ Lifetime PnL: ${:.2}", perf.lifetime_pnl_usd);
    println!("   ├─ 30d PnL:      ${:.2}", perf.pnl_30d_usd);
    println!("   ├─ Max Drawdown: {}%", perf.max_drawdown_pct);
    println!("   └─ Trades:       {}", perf.num_trades);

    println!("\nState");
    println!("   {}", memory.state);

    let start = memory.logs.len().saturating_sub(log_count);
    let recent = &memory.logs[start..];
    if !recent.is_empty() {
        println!("\nRecent Log ({} of {})", recent.len(), memory.logs.len());
        for entry in recent {
            println!(
                "   ├─ {} {:<16} {}",
                entry.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
                entry.action,
                entry.details
            );
        }
    }

    println!();
    Ok(())
}

fn show_domain(config: &Config) -> Result<()> {
    let store = open_store(&config.store).context("Failed to open memory store")?;
    let domain = store.load_domain_memory()?;

    println!("{}", serde_json::to_string_pretty(&domain)?);

    let findings = domain.validate();
    if findings.is_empty() {
        println!("\nNo consistency findings.");
    } else {
        println!("\nConsistency findings:");
        for finding in findings {
            println!("   - {}", finding);
        }
    }
    Ok(())
}

fn check_policy(
    config: &Config,
    strategy_id: &str,
    action: ActionType,
    delta: Decimal,
    assets: Vec<String>,
    venue: &str,
) -> Result<()> {
    let store = open_store(&config.store).context("Failed to open memory store")?;
    let domain = store.load_domain_memory()?;

    let request = PolicyCheckRequest {
        strategy_id: strategy_id.to_string(),
        action_type: action,
        delta_exposure_usd: delta,
        asset_symbols: assets,
        venue: venue.to_string(),
        current_snapshot: config.snapshot.to_snapshot(),
    };

    let result = PolicyEngine::default().check(&domain, &request);

    println!("Decision: {}", result.decision);
    for reason in &result.reasons {
        println!("   - {}", reason);
    }
    Ok(())
}

/// Log configuration on startup.
fn log_config(config: &Config) {
    info!("Configuration:");
    info!("   Store: {:?} at {}", config.store.backend, config.store.path);
    info!("   Venue: {} ({})", config.venue.name, config.venue.base_url);
    info!(
        "   Credentials: {}, live trading {}",
        if config.venue.credentials().is_configured() { "present" } else { "absent" },
        if config.venue.live_trading_enabled { "ENABLED" } else { "disabled" }
    );
    info!("   Tick Interval: {}s", config.scheduler.tick_interval_secs);
    info!(
        "   Snapshot: ${} total, {}% stable",
        config.snapshot.total_portfolio_usd, config.snapshot.stable_pct
    );
    info!(
        "   Strategy Kinds: {}",
        StrategyRegistry::with_builtin().kinds().join(", ")
    );
}

/// Initialize logging to stdout and an hourly rolling file.
fn init_logging(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    // Create logs directory
    std::fs::create_dir_all(&config.dir)
        .with_context(|| format!("Failed to create log directory {}", config.dir))?;

    // File appender for detailed logs
    let file_appender = tracing_appender::rolling::hourly(&config.dir, &config.file_prefix);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Leak the guard to keep it alive for the program duration
    Box::leak(Box::new(guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("treasury_engine=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .init();

    Ok(())
}
