// src/main.rs
use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use liquidity_flow::{
    aggregator::QuoteAggregator,
    analysis::{AnalysisRequest, Analyst},
    config::load_config,
    dex::{build_venues, SourceAdapter},
    engine::{QuoteEngine, QuoteRequest},
    execution::{LogPersister, Persister, RedisPersister},
    routing::LiquiditySnapshot,
    utils::{setup_logging, Clock, SystemClock},
};
use log::{info, warn};
use std::sync::Arc;

const SOL_MINT: &str = "So11111111111111111111111111111111111111112";
const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
const USDT_MINT: &str = "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB";

#[derive(Parser, Debug)]
#[command(author, version, about = "Quote and route a token swap across DEX venues")]
struct Args {
    /// Input token mint
    #[arg(long, default_value = SOL_MINT)]
    input: String,

    /// Output token mint
    #[arg(long, default_value = USDC_MINT)]
    output: String,

    /// Amount in input base units
    #[arg(long, default_value_t = 1_000_000_000)]
    amount: u128,

    /// Maximum slippage in basis points (defaults to DEFAULT_SLIPPAGE_BPS)
    #[arg(long)]
    slippage_bps: Option<u16>,

    /// Submit the quote through the simulated submitter
    #[arg(long, default_value_t = false)]
    execute: bool,
}

/// Demo pool state so the router has something to quote without live feeds.
fn demo_pools() -> Vec<LiquiditySnapshot> {
    let pool = |venue: &str, pool_ref: &str, a: &str, b: &str, reserve_a: u128, reserve_b: u128, fee_bps: u16| {
        LiquiditySnapshot {
            venue: venue.to_string(),
            pool_ref: pool_ref.to_string(),
            token_a: a.to_string(),
            token_b: b.to_string(),
            reserve_a,
            reserve_b,
            fee_bps,
            observed_at: Utc::now(),
        }
    };
    vec![
        pool("Orca", "orca-sol-usdc", SOL_MINT, USDC_MINT, 50_000_000_000_000, 7_500_000_000_000, 30),
        pool("Raydium", "ray-sol-usdc", SOL_MINT, USDC_MINT, 30_000_000_000_000, 4_480_000_000_000, 25),
        pool("Raydium", "ray-usdc-usdt", USDC_MINT, USDT_MINT, 20_000_000_000_000, 20_000_000_000_000, 5),
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    setup_logging(&level).context("Failed to initialize logging")?;
    info!("🚀 LiquidityFlow router starting...");

    let args = Args::parse();
    let app_config = load_config().context("Failed to load configuration")?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let venues = build_venues(&app_config, clock.clone()).context("Failed to build venues")?;
    let aggregator = Arc::new(QuoteAggregator::from_config(&app_config).with_adapters(venues.adapters()));

    let persister: Arc<dyn Persister> = match &app_config.redis_url {
        Some(url) => match RedisPersister::connect(url, app_config.route_ttl_secs).await {
            Ok(redis) => Arc::new(redis),
            Err(e) => {
                warn!("Redis unavailable ({}), persisting to the log only", e);
                Arc::new(LogPersister)
            }
        },
        None => Arc::new(LogPersister),
    };

    let engine = QuoteEngine::new(app_config.clone(), aggregator, clock).with_persister(persister);

    for snapshot in demo_pools() {
        for venue in venues.pool_venues() {
            if venue.name() == snapshot.venue {
                venue
                    .upsert_pool(snapshot.clone())
                    .await
                    .context("Failed to load demo pool")?;
            }
        }
        engine
            .ingest_liquidity(snapshot)
            .await
            .context("Failed to ingest demo pool")?;
    }
    let stats = engine.graph().read().await.stats();
    info!(
        "Liquidity graph ready: {} tokens, {} edges across {} venues",
        stats.token_count, stats.edge_count, stats.venue_count
    );

    let request = QuoteRequest::new(args.input.clone(), args.output.clone(), args.amount)
        .with_slippage(args.slippage_bps.unwrap_or(app_config.default_slippage_bps));
    let response = engine.quote(&request).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);

    let analysis = Analyst::from_engine(&engine)
        .handle(AnalysisRequest::RouteOptimization {
            input_token: args.input,
            output_token: args.output,
            amount: args.amount,
        })
        .await;
    match analysis {
        Ok(report) => println!("{}", serde_json::to_string_pretty(&report)?),
        Err(e) => info!("Route analysis unavailable: {}", e),
    }

    if args.execute {
        let execution = engine.execute_swap(&response.quote.quote_id, None).await?;
        println!("{}", serde_json::to_string_pretty(&execution)?);
    }

    info!("{}", engine.cache().stats().summary());
    Ok(())
}
