use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::Parser;
use lending_analytics::config::AnalyticsConfig;
use lending_analytics::engine::LendingEngine;
use lending_analytics::store::MemoryStore;
use lending_analytics::transaction::{ActionRequest, TransactionRecord};
use lending_analytics::types::HealthFactor;
use lending_analytics::wallet::Offline;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Lending market dashboard demo: catalogue analytics and position simulation
#[derive(Parser)]
#[command(name = "lending-analytics")]
#[command(version)]
struct Args {
    /// JSON array of market creation records
    #[arg(long, env = "LENDING_MARKETS", default_value = "data/markets.json")]
    markets: PathBuf,

    /// aggregator config (JSON); defaults apply when omitted
    #[arg(long, env = "LENDING_CONFIG")]
    config: Option<PathBuf>,

    /// user address used by the simulation scenarios
    #[arg(long, default_value = "addr_test1qz2fxv2umyhttkxyxp8x0dlpdt3k6cwng5pxj3jhsydzer3")]
    user: String,

    /// log level, overridden by RUST_LOG
    #[arg(long, env = "LENDING_LOG", default_value = "info")]
    log_level: String,

    /// emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// write the simulated transaction records here as JSON lines
    #[arg(long)]
    out: Option<PathBuf>,
}

fn init_logging(level: &str, json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::registry().with(filter);
    if json {
        subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow!("failed to init logging: {e}"))
    } else {
        subscriber
            .with(fmt::layer().with_target(true))
            .try_init()
            .map_err(|e| anyhow!("failed to init logging: {e}"))
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.json_logs)?;

    let config = match &args.config {
        Some(path) => AnalyticsConfig::from_file(path)?,
        None => AnalyticsConfig::default(),
    };

    let store = Arc::new(MemoryStore::new());
    let engine = LendingEngine::new(store.clone(), store, Offline, config);

    let seed = std::fs::read_to_string(&args.markets)
        .with_context(|| format!("reading {}", args.markets.display()))?;
    let count = engine.seed_markets(&seed)?;
    info!(count, path = %args.markets.display(), "catalogue seeded");

    println!("=== Lending Market Dashboard Demo ===\n");

    // ─── Catalogue analytics ───────────────────────────────────────────────

    println!("--- Market overview ---\n");
    println!("{}\n", serde_json::to_string_pretty(&engine.overview()?)?);

    println!("--- Recommendations ---\n");
    let recommendations = engine.recommendations()?;
    println!("{}", serde_json::to_string_pretty(&recommendations)?);
    if let Some(outlook) = recommendations.overall_recommendation {
        println!("  {}\n", outlook.message());
    }

    // ─── Position simulation ───────────────────────────────────────────────

    println!("--- Supply 1,000 ADA, then borrow against it ---\n");
    let user = args.user.as_str();
    let mut records: Vec<TransactionRecord> = Vec::new();

    let supplied = engine.simulate_supply(user, "lovelace", "1000")?;
    print_record("Supply 1,000 ADA", &supplied.transaction);
    println!(
        "    Borrow limit: {} USD\n",
        supplied.simulated_position.borrow_limit_usd()
    );
    records.push(supplied.transaction);

    let djed = engine.get_market("djed")?;
    let plan = |borrow: &str| {
        [
            ActionRequest::Supply {
                asset_id: "lovelace".into(),
                amount: "1000".into(),
            },
            ActionRequest::Borrow {
                asset_id: djed.asset_id.clone(),
                amount: borrow.into(),
            },
        ]
    };

    match engine.simulate_actions(user, &plan("400")) {
        Ok(_) => println!("  Borrow 400 DJED unexpectedly accepted\n"),
        Err(err) if !err.is_fault() => println!("  Borrow 400 DJED rejected: {err}\n"),
        Err(err) => return Err(err.into()),
    }

    let chain = engine.simulate_actions(user, &plan("300"))?;
    for record in &chain.transactions {
        print_record("Chained step", record);
    }
    println!();
    records.extend(chain.transactions);

    // ─── Combined read path ────────────────────────────────────────────────

    println!("--- Position view (explorer offline) ---\n");
    println!(
        "{}\n",
        serde_json::to_string_pretty(&engine.get_position(user)?)?
    );

    if let Some(path) = &args.out {
        let lines = records
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?
            .join("\n");
        std::fs::write(path, lines).with_context(|| format!("writing {}", path.display()))?;
        println!("  Transaction records written to {}", path.display());
    }

    Ok(())
}

fn print_record(label: &str, record: &TransactionRecord) {
    let health = |h: HealthFactor| match h.ratio() {
        Some(r) => r.round_dp(4).to_string(),
        None => "no debt".to_string(),
    };
    println!(
        "  {label}: {:?} {} of {} ({} USD), health {} -> {}",
        record.action,
        record.amount,
        record.asset_id,
        record.amount_usd,
        health(record.health_factor_before),
        health(record.health_factor_after),
    );
}
