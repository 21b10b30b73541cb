//! Scan orchestration.
//!
//! Drives an ordered, truncated instrument sequence through fetcher and
//! forecast engine strictly sequentially — the sequencing is what
//! enforces the anti-blocking throttle against the price source — then
//! ranks the accumulated results.
//!
//! This is the single boundary where per-instrument failures are caught
//! and downgraded to log lines. Nothing an individual instrument does
//! can abort the scan.

use std::cmp::Ordering;
use tracing::{debug, info, warn};

use crate::fetch::PriceSeriesFetcher;
use crate::forecast::ForecastEngine;
use crate::types::{Instrument, ScanOutcome, ScanResult};

// ---------------------------------------------------------------------------
// Operator parameter bounds
// ---------------------------------------------------------------------------

const LIMIT_BOUNDS: (usize, usize) = (1, 200);
const TOP_N_BOUNDS: (usize, usize) = (1, 100);
const MULTIPLIER_BOUNDS: (f64, f64) = (0.5, 2.0);
const SIMULATION_BOUNDS: (u32, u32) = (50, 5000);

/// Validated scan controls. Operator inputs are numeric free-form; this
/// is where they get clamped into sane ranges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanParams {
    pub limit: usize,
    pub top_n: usize,
    pub volatility_multiplier: f64,
    pub simulations: u32,
}

impl ScanParams {
    /// Clamp raw operator inputs into the supported ranges.
    pub fn clamped(limit: usize, top_n: usize, volatility_multiplier: f64, simulations: u32) -> Self {
        let multiplier = if volatility_multiplier.is_finite() {
            volatility_multiplier.clamp(MULTIPLIER_BOUNDS.0, MULTIPLIER_BOUNDS.1)
        } else {
            1.0
        };
        Self {
            limit: limit.clamp(LIMIT_BOUNDS.0, LIMIT_BOUNDS.1),
            top_n: top_n.clamp(TOP_N_BOUNDS.0, TOP_N_BOUNDS.1),
            volatility_multiplier: multiplier,
            simulations: simulations.clamp(SIMULATION_BOUNDS.0, SIMULATION_BOUNDS.1),
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Sequential scan driver.
pub struct ScanOrchestrator {
    fetcher: PriceSeriesFetcher,
    engine: ForecastEngine,
    params: ScanParams,
}

impl ScanOrchestrator {
    pub fn new(fetcher: PriceSeriesFetcher, engine: ForecastEngine, params: ScanParams) -> Self {
        Self {
            fetcher,
            engine,
            params,
        }
    }

    /// Run one scan over the given pool.
    ///
    /// For each instrument: fetch, forecast, accumulate when tradable,
    /// report progress, pace before the next one. On completion the
    /// results are stable-sorted descending by projected return and cut
    /// to the top N.
    pub async fn run(&self, instruments: &[Instrument]) -> ScanOutcome {
        let scope = &instruments[..instruments.len().min(self.params.limit)];
        let total = scope.len();
        let mut results: Vec<ScanResult> = Vec::new();

        info!(total, limit = self.params.limit, "Starting scan");

        for (i, instrument) in scope.iter().enumerate() {
            match self.fetcher.fetch_series(instrument).await {
                Ok(series) => {
                    let forecast = self.engine.forecast(&series);
                    if forecast.is_tradable() {
                        results.push(ScanResult::from_forecast(instrument.clone(), &forecast));
                    } else {
                        debug!(symbol = %instrument, "Forecast unavailable, instrument excluded");
                    }
                }
                Err(e) => {
                    warn!(symbol = %instrument, error = %e, "Instrument skipped");
                }
            }

            info!(
                current = i + 1,
                total,
                symbol = %instrument,
                candidates = results.len(),
                "Scan progress"
            );

            if i + 1 < total {
                self.fetcher.pace().await;
            }
        }

        if results.is_empty() {
            info!(scanned = total, "Scan complete — no forecastable instruments");
            return ScanOutcome::NoResults { scanned: total };
        }

        let ranked = rank_results(results, self.params.top_n);
        info!(scanned = total, ranked = ranked.len(), "Scan complete");
        ScanOutcome::Ranked {
            scanned: total,
            results: ranked,
        }
    }
}

/// Stable descending sort by projected return, cut to `top_n`.
/// Equal returns preserve accumulation order.
pub fn rank_results(mut results: Vec<ScanResult>, top_n: usize) -> Vec<ScanResult> {
    results.sort_by(|a, b| {
        b.projected_return
            .partial_cmp(&a.projected_return)
            .unwrap_or(Ordering::Equal)
    });
    results.truncate(top_n);
    results
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
