//! End-to-end scan pipeline tests: pool → fetcher → engine → ranking.
//!
//! Everything runs against the deterministic fakes in `mock_sources`,
//! with zeroed delays and a fixed simulation seed.

use std::sync::atomic::Ordering;
use std::time::Duration;

use stockscan::engine::{ScanOrchestrator, ScanParams};
use stockscan::fetch::{FetcherConfig, PriceSeriesFetcher};
use stockscan::forecast::{ForecastEngine, ForecastParams};
use stockscan::pool::{InstrumentPool, ListingSource};
use stockscan::types::{Instrument, ScanOutcome};

use super::mock_sources::{MockHistorySource, MockListingSource};

fn quiet_fetcher_config() -> FetcherConfig {
    FetcherConfig {
        periods: vec!["1y".into(), "2y".into(), "max".into()],
        interval: "1d".into(),
        retries_per_period: 3,
        retry_delay_secs: (0.0, 0.0),
        instrument_delay_secs: (0.0, 0.0),
        min_series_len: 30,
    }
}

fn build_orchestrator(source: MockHistorySource, limit: usize) -> ScanOrchestrator {
    let fetcher = PriceSeriesFetcher::new(Box::new(source), quiet_fetcher_config());
    let params = ScanParams::clamped(limit, 30, 1.0, 200);
    let mut fp = ForecastParams::default();
    fp.simulations = params.simulations;
    fp.volatility_multiplier = params.volatility_multiplier;
    let engine = ForecastEngine::with_seed(fp, 42);
    ScanOrchestrator::new(fetcher, engine, params)
}

fn parse_all(symbols: &[&str]) -> Vec<Instrument> {
    symbols.iter().map(|s| Instrument::parse(s).unwrap()).collect()
}

#[tokio::test]
async fn scenario_a_two_instruments_ranked_within_horizon() {
    // Pool of two, both with 60 closes, seeded K=200 H=20.
    let source = MockHistorySource::new(&[("2330.TW", 60), ("2317.TW", 60)]);
    let orchestrator = build_orchestrator(source, 10);

    let outcome = orchestrator
        .run(&parse_all(&["2330.TW", "2317.TW"]))
        .await;

    let ScanOutcome::Ranked { scanned, results } = outcome else {
        panic!("expected ranked outcome");
    };
    assert_eq!(scanned, 2);
    assert!(!results.is_empty() && results.len() <= 2);

    for pair in results.windows(2) {
        assert!(pair[0].projected_return >= pair[1].projected_return);
    }
    for r in &results {
        assert!(r.days_to_target >= 1 && r.days_to_target <= 20);
        assert!(r.buy_price > 0.0);
        assert!(
            (r.projected_return - (r.sell_price - r.buy_price) / r.buy_price).abs() < 1e-12
        );
    }
}

#[tokio::test]
async fn scenario_b_one_listing_source_down_pool_survives() {
    let alive = MockListingSource::ok(
        "listed",
        &[
            "1101.TW", "1102.TW", "1103.TW", "1104.TW", "1108.TW",
            "1109.TW", "1110.TW", "1201.TW", "1203.TW", "1210.TW",
        ],
    );
    let dead = MockListingSource::timing_out("otc");

    let sources: Vec<Box<dyn ListingSource>> = vec![Box::new(alive), Box::new(dead)];
    let mut pool = InstrumentPool::new(sources, Duration::from_secs(3600), false);

    let instruments = pool.instruments().await;
    assert_eq!(instruments.len(), 10);
}

#[tokio::test]
async fn all_listing_sources_down_scan_reports_zero_results() {
    let sources: Vec<Box<dyn ListingSource>> = vec![
        Box::new(MockListingSource::timing_out("listed")),
        Box::new(MockListingSource::timing_out("otc")),
    ];
    let mut pool = InstrumentPool::new(sources, Duration::from_secs(3600), false);
    let instruments = pool.instruments().await;
    assert!(instruments.is_empty());

    let orchestrator = build_orchestrator(MockHistorySource::new(&[]), 10);
    let outcome = orchestrator.run(&instruments).await;
    assert!(matches!(outcome, ScanOutcome::NoResults { scanned: 0 }));
}

#[tokio::test]
async fn fetch_attempts_are_bounded_per_instrument() {
    // Unknown symbol fails every attempt: 3 retries × 3 periods = 9.
    let source = MockHistorySource::new(&[]);
    let attempts = source.attempts.clone();
    let orchestrator = build_orchestrator(source, 10);

    let outcome = orchestrator.run(&parse_all(&["9999.TW"])).await;
    assert!(matches!(outcome, ScanOutcome::NoResults { scanned: 1 }));
    assert_eq!(attempts.load(Ordering::SeqCst), 9);
}

#[tokio::test]
async fn pool_to_ranking_full_pipeline() {
    // Pool built from a live listing source feeds straight into a scan;
    // one pool member has no price data and is skipped.
    let listing = MockListingSource::ok("listed", &["2330.TW", "2317.TW", "9999.TW"]);
    let sources: Vec<Box<dyn ListingSource>> = vec![Box::new(listing)];
    let mut pool = InstrumentPool::new(sources, Duration::from_secs(3600), false);
    let instruments = pool.instruments().await;
    assert_eq!(instruments.len(), 3);

    let source = MockHistorySource::new(&[("2330.TW", 60), ("2317.TW", 60)]);
    let orchestrator = build_orchestrator(source, 10);
    let outcome = orchestrator.run(&instruments).await;

    assert_eq!(outcome.scanned(), 3);
    assert!(outcome.results().len() <= 2);
    assert!(outcome
        .results()
        .iter()
        .all(|r| r.instrument.symbol() != "9999.TW"));
}
