//! STOCKSCAN — Exchange instrument scanner
//!
//! Entry point. Loads configuration, initialises structured logging,
//! builds the scan universe (watchlist or exchange pool), runs one
//! fetch→forecast→rank pass, prints the ranked picks, and syncs run
//! metadata to the external store.

use anyhow::Result;
use chrono::Utc;
use std::time::Duration;
use tracing::{info, warn};

use stockscan::config::{self, AppConfig};
use stockscan::engine::{ScanOrchestrator, ScanParams};
use stockscan::fetch::{ChartApiClient, FetcherConfig, PriceSeriesFetcher};
use stockscan::forecast::{ForecastEngine, ForecastParams};
use stockscan::narrative::{NarrativeGenerator, OpenRouterNarrator};
use stockscan::pool::{InstrumentPool, IsinTableClient, ListingSource};
use stockscan::sync::{self, ResultSynchronizer, SheetApiClient, StoreCredentials};
use stockscan::types::{Board, Instrument, ScanOutcome};
use stockscan::watchlist::Watchlist;

const BANNER: &str = r#"
 ____ _____ ___   ____ _  __ ____   ____    _    _   _
/ ___|_   _/ _ \ / ___| |/ // ___| / ___|  / \  | \ | |
\___ \ | || | | | |   | ' / \___ \| |     / _ \ |  \| |
 ___) || || |_| | |___| . \  ___) | |___ / ___ \| |\  |
|____/ |_| \___/ \____|_|\_\|____/ \____/_/   \_\_| \_|

  Monte Carlo instrument scanner — v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML
    let cfg = AppConfig::load("config.toml")?;

    // Initialise structured logging
    init_logging();

    println!("{BANNER}");
    info!(
        limit = cfg.scan.limit,
        top_n = cfg.scan.top_n,
        simulations = cfg.forecast.simulations,
        horizon = cfg.forecast.horizon_days,
        "STOCKSCAN starting up"
    );

    // -- Build the scan universe -----------------------------------------

    let instruments = build_universe(&cfg).await?;
    if instruments.is_empty() {
        warn!("Instrument pool is empty — nothing to scan");
        return Ok(());
    }

    // -- Assemble the pipeline -------------------------------------------

    let source = ChartApiClient::new(Duration::from_secs(cfg.fetch.request_timeout_secs))?;
    let fetcher = PriceSeriesFetcher::new(Box::new(source), FetcherConfig::from(&cfg.fetch));

    let params = ScanParams::clamped(
        cfg.scan.limit,
        cfg.scan.top_n,
        cfg.forecast.volatility_multiplier,
        cfg.forecast.simulations,
    );

    let mut forecast_params = ForecastParams::from(&cfg.forecast);
    forecast_params.volatility_multiplier = params.volatility_multiplier;
    forecast_params.simulations = params.simulations;

    let engine = match cfg.forecast.seed {
        Some(seed) => ForecastEngine::with_seed(forecast_params, seed),
        None => ForecastEngine::new(forecast_params),
    };

    let orchestrator = ScanOrchestrator::new(fetcher, engine, params);

    // -- Scan --------------------------------------------------------------

    let outcome = orchestrator.run(&instruments).await;

    match &outcome {
        ScanOutcome::NoResults { scanned } => {
            warn!(scanned, "Scan finished with zero forecastable instruments");
        }
        ScanOutcome::Ranked { scanned, results } => {
            info!(scanned, ranked = results.len(), "Scan finished");
            for (rank, result) in results.iter().enumerate() {
                println!("#{:<3} {result}", rank + 1);
            }
        }
    }

    // -- Side effects: store sync and commentary (both non-fatal) ---------

    if cfg.store.enabled {
        sync_outcome(&cfg, &outcome).await;
    }

    if cfg.narrative.enabled {
        narrate_top_pick(&cfg, &outcome).await;
    }

    info!("STOCKSCAN shut down cleanly.");
    Ok(())
}

/// Watchlist when configured, otherwise the full exchange pool.
async fn build_universe(cfg: &AppConfig) -> Result<Vec<Instrument>> {
    let watchlist = Watchlist::from_symbols(&cfg.watchlist.symbols)
        .map_err(|e| anyhow::anyhow!("Invalid watchlist config: {e}"))?;

    if !watchlist.is_empty() {
        info!(count = watchlist.len(), "Scanning configured watchlist");
        return Ok(watchlist.list().to_vec());
    }

    let timeout = Duration::from_secs(cfg.fetch.request_timeout_secs);
    let listed = IsinTableClient::new(&cfg.pool.listed_url, Board::Listed, timeout)?;
    let otc = IsinTableClient::new(&cfg.pool.otc_url, Board::Otc, timeout)?;
    let sources: Vec<Box<dyn ListingSource>> = vec![Box::new(listed), Box::new(otc)];

    let mut pool = InstrumentPool::new(
        sources,
        Duration::from_secs(cfg.pool.cache_ttl_secs),
        cfg.pool.shuffle,
    );
    Ok(pool.instruments().await)
}

/// Upsert run metadata. Failure is reported, never propagated — the
/// computed results stay valid regardless.
async fn sync_outcome(cfg: &AppConfig, outcome: &ScanOutcome) {
    let api_key = match config::AppConfig::resolve_env(&cfg.store.api_key_env) {
        Ok(key) => key,
        Err(e) => {
            warn!(error = %e, "Store sync skipped — no credentials");
            return;
        }
    };

    let creds = StoreCredentials::new(cfg.store.base_url.clone(), api_key);
    let client = match SheetApiClient::new(creds) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Store sync skipped — client build failed");
            return;
        }
    };

    let synchronizer = ResultSynchronizer::new(Box::new(client));
    let records = sync::summary_records(outcome, Utc::now());
    if let Err(e) = synchronizer.upsert(&records).await {
        warn!(error = %e, "Result sync failed — scan results remain valid");
    }
}

/// One-shot commentary for the top-ranked pick.
async fn narrate_top_pick(cfg: &AppConfig, outcome: &ScanOutcome) {
    let Some(top) = outcome.results().first() else {
        return;
    };

    let api_key = match config::AppConfig::resolve_env(&cfg.narrative.api_key_env) {
        Ok(key) => key,
        Err(e) => {
            warn!(error = %e, "Narrative skipped — no API key");
            return;
        }
    };

    let narrator = match OpenRouterNarrator::new(
        api_key,
        Some(cfg.narrative.model.clone()),
        cfg.narrative.max_tokens,
    ) {
        Ok(n) => n,
        Err(e) => {
            warn!(error = %e, "Narrative skipped — client build failed");
            return;
        }
    };

    match narrator.narrate(top).await {
        Ok(text) => {
            info!(model = narrator.model_name(), "Commentary generated");
            println!("\n💡 {}: {text}", top.instrument);
        }
        Err(e) => warn!(error = %e, "Narrative generation failed"),
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("stockscan=info"));

    let json_logging = std::env::var("STOCKSCAN_LOG_JSON").is_ok();

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
