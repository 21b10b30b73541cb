//! Monte Carlo forecast engine.
//!
//! Simulates K forward price paths over an H-day horizon: each day's
//! log-return is drawn from a normal distribution with a fixed drift
//! and the series' historical daily-return volatility scaled by a
//! compensation multiplier. The K paths are averaged pointwise into one
//! expected path, from which entry/exit prices and the target day are
//! derived.
//!
//! Degenerate input — too few points, zero or non-finite variance —
//! yields the sentinel forecast. This function never fails.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tracing::debug;

use crate::config::ForecastConfig;
use crate::types::{Forecast, PriceSeries};

/// Observation count a series must exceed before a forecast is attempted.
pub const MIN_POINTS: usize = 20;

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Tunable simulation parameters. Operator-supplied values are clamped
/// at the orchestrator boundary before they reach the engine.
#[derive(Debug, Clone)]
pub struct ForecastParams {
    /// Number of simulated paths (K).
    pub simulations: u32,
    /// Forward horizon in trading days (H).
    pub horizon_days: u32,
    /// Assumed mean daily log-return.
    pub daily_drift: f64,
    /// Multiplier applied to historical volatility.
    pub volatility_multiplier: f64,
    /// Limit-entry discount below the last close.
    pub buy_discount: f64,
}

impl Default for ForecastParams {
    fn default() -> Self {
        Self {
            simulations: 300,
            horizon_days: 20,
            daily_drift: 0.005,
            volatility_multiplier: 1.15,
            buy_discount: 0.98,
        }
    }
}

impl From<&ForecastConfig> for ForecastParams {
    fn from(cfg: &ForecastConfig) -> Self {
        Self {
            simulations: cfg.simulations,
            horizon_days: cfg.horizon_days,
            daily_drift: cfg.daily_drift,
            volatility_multiplier: cfg.volatility_multiplier,
            buy_discount: cfg.buy_discount,
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Stochastic forecaster for one price series at a time.
pub struct ForecastEngine {
    params: ForecastParams,
    seed: Option<u64>,
}

impl ForecastEngine {
    pub fn new(params: ForecastParams) -> Self {
        Self { params, seed: None }
    }

    /// Fix the RNG seed for reproducible output (tests, replays).
    pub fn with_seed(params: ForecastParams, seed: u64) -> Self {
        Self {
            params,
            seed: Some(seed),
        }
    }

    pub fn params(&self) -> &ForecastParams {
        &self.params
    }

    /// Run the simulation and derive the tradable forecast.
    ///
    /// `current_price` is always the last close of the fetched series —
    /// never back-computed from the entry price.
    pub fn forecast(&self, series: &PriceSeries) -> Forecast {
        let (last_close, path) = match self.simulate(series) {
            Some(v) => v,
            None => {
                debug!(symbol = %series.symbol, closes = series.len(), "Series not forecastable");
                return Forecast::unavailable();
            }
        };

        let (best_idx, best_price) = path
            .iter()
            .copied()
            .enumerate()
            .fold((0usize, f64::MIN), |acc, (i, p)| {
                if p > acc.1 {
                    (i, p)
                } else {
                    acc
                }
            });

        Forecast {
            current_price: last_close,
            buy_price: last_close * self.params.buy_discount,
            sell_price: best_price,
            best_day: best_idx as u32 + 1,
            note: insight_note(self.params.daily_drift).to_string(),
        }
    }

    /// The pointwise average of K simulated paths, or `None` when the
    /// series is degenerate. Exposed so callers can inspect the curve
    /// the forecast was derived from.
    pub fn expected_path(&self, series: &PriceSeries) -> Option<Vec<f64>> {
        self.simulate(series).map(|(_, path)| path)
    }

    fn simulate(&self, series: &PriceSeries) -> Option<(f64, Vec<f64>)> {
        if series.len() <= MIN_POINTS {
            return None;
        }
        let last_close = series.last_close().filter(|c| c.is_finite() && *c > 0.0)?;

        let volatility = std_dev(&series.daily_returns())? * self.params.volatility_multiplier;
        if !volatility.is_finite() || volatility <= 0.0 {
            return None;
        }

        let normal = Normal::new(self.params.daily_drift, volatility).ok()?;
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let horizon = self.params.horizon_days as usize;
        let runs = self.params.simulations.max(1);
        let mut sums = vec![0.0f64; horizon];

        for _ in 0..runs {
            let mut cum_log_return = 0.0;
            for day in sums.iter_mut() {
                cum_log_return += normal.sample(&mut rng);
                *day += last_close * cum_log_return.exp();
            }
        }

        let path: Vec<f64> = sums.into_iter().map(|s| s / runs as f64).collect();
        // A zero-day horizon has no argmax to take.
        if path.is_empty() || path.iter().any(|p| !p.is_finite()) {
            return None;
        }
        Some((last_close, path))
    }
}

/// Sample standard deviation. `None` for fewer than two observations.
fn std_dev(xs: &[f64]) -> Option<f64> {
    if xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    let variance = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt())
}

/// Qualitative note from the drift assumption. A fixed rule, not a model.
fn insight_note(drift: f64) -> &'static str {
    if drift >= 0.003 {
        "Sustained accumulation; volatility bands compressing toward a breakout"
    } else if drift > 0.0 {
        "Mild upward bias; momentum still building"
    } else {
        "Rangebound near recent highs; wait for a pullback to support"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
