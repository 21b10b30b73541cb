//! Historical price series fetching.
//!
//! Wraps a chart-style price-history endpoint with the retry discipline
//! the rest of the pipeline relies on: bounded attempts per lookback
//! period with randomized delay, escalation through a configured period
//! list, and a mandatory randomized pause between instruments so the
//! remote source doesn't block the caller.
//!
//! Every failure cause — timeout, rate limiting, empty or malformed
//! payload — is treated identically as `ScanError::TransientFetch`.

use anyhow::Context;
use async_trait::async_trait;
use chrono::DateTime;
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::FetchConfig;
use crate::types::{Instrument, PricePoint, PriceSeries, ScanError};

// ---------------------------------------------------------------------------
// Price history source
// ---------------------------------------------------------------------------

/// A remote source of daily close series.
#[async_trait]
pub trait PriceHistorySource: Send + Sync {
    /// Fetch a close series for one symbol over one lookback period.
    ///
    /// All failure causes map to `ScanError::TransientFetch`; an empty
    /// series is a valid (retryable) response, not an error.
    async fn fetch(
        &self,
        symbol: &str,
        period: &str,
        interval: &str,
    ) -> Result<PriceSeries, ScanError>;

    /// Source name for logging.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Chart API client
// ---------------------------------------------------------------------------

const CHART_BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Chart API response envelope. Only the fields we consume.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    close: Option<Vec<Option<f64>>>,
}

/// HTTP client for the chart-style price endpoint.
pub struct ChartApiClient {
    http: Client,
    base_url: String,
}

impl ChartApiClient {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        Self::with_base_url(CHART_BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("stockscan/0.1.0")
            .build()
            .context("Failed to build HTTP client for price source")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn transient(symbol: &str, message: impl Into<String>) -> ScanError {
        ScanError::TransientFetch {
            symbol: symbol.to_string(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl PriceHistorySource for ChartApiClient {
    async fn fetch(
        &self,
        symbol: &str,
        period: &str,
        interval: &str,
    ) -> Result<PriceSeries, ScanError> {
        let url = format!(
            "{}/{symbol}?range={period}&interval={interval}",
            self.base_url
        );
        debug!(url = %url, "Fetching price history");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Self::transient(symbol, format!("request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(Self::transient(symbol, format!("HTTP {}", resp.status())));
        }

        let body: ChartResponse = resp
            .json()
            .await
            .map_err(|e| Self::transient(symbol, format!("malformed payload: {e}")))?;

        if let Some(err) = body.chart.error {
            return Err(Self::transient(symbol, format!("source error: {err}")));
        }

        let result = body
            .chart
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .ok_or_else(|| Self::transient(symbol, "empty result set"))?;

        let timestamps = result.timestamp.unwrap_or_default();
        let closes = result
            .indicators
            .quote
            .into_iter()
            .next()
            .and_then(|q| q.close)
            .unwrap_or_default();

        let points: Vec<PricePoint> = timestamps
            .iter()
            .zip(closes)
            .filter_map(|(&ts, close)| {
                let close = close?;
                let date = DateTime::from_timestamp(ts, 0)?.date_naive();
                Some(PricePoint { date, close })
            })
            .collect();

        Ok(PriceSeries::new(symbol, points))
    }

    fn name(&self) -> &str {
        "chart-api"
    }
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// Retry/backoff/fallback parameters, lifted verbatim from config.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub periods: Vec<String>,
    pub interval: String,
    pub retries_per_period: u32,
    pub retry_delay_secs: (f64, f64),
    pub instrument_delay_secs: (f64, f64),
    pub min_series_len: usize,
}

impl From<&FetchConfig> for FetcherConfig {
    fn from(cfg: &FetchConfig) -> Self {
        Self {
            periods: cfg.periods.clone(),
            interval: cfg.interval.clone(),
            retries_per_period: cfg.retries_per_period.max(1),
            retry_delay_secs: (cfg.retry_delay_min_secs, cfg.retry_delay_max_secs),
            instrument_delay_secs: (cfg.instrument_delay_min_secs, cfg.instrument_delay_max_secs),
            min_series_len: cfg.min_series_len,
        }
    }
}

impl FetcherConfig {
    /// Upper bound on source attempts for one instrument.
    pub fn max_attempts(&self) -> u32 {
        self.retries_per_period * self.periods.len() as u32
    }
}

/// Fetches one instrument's series through the retry/fallback policy.
pub struct PriceSeriesFetcher {
    source: Box<dyn PriceHistorySource>,
    cfg: FetcherConfig,
}

impl PriceSeriesFetcher {
    pub fn new(source: Box<dyn PriceHistorySource>, cfg: FetcherConfig) -> Self {
        Self { source, cfg }
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.cfg
    }

    /// Fetch the first series exceeding the minimum length, walking the
    /// configured period list.
    ///
    /// Per period: up to `retries_per_period` attempts with a randomized
    /// delay between them. A too-short series counts as a failed attempt.
    /// Total attempts never exceed `retries_per_period × periods`, which
    /// bounds elapsed time. Exhaustion returns `TransientFetch`; the
    /// caller skips the instrument and continues.
    pub async fn fetch_series(&self, instrument: &Instrument) -> Result<PriceSeries, ScanError> {
        let symbol = instrument.symbol();
        let mut last_failure = String::from("no attempts made");
        let mut last_was_short = false;

        for period in &self.cfg.periods {
            for attempt in 1..=self.cfg.retries_per_period {
                if attempt > 1 {
                    let delay = jitter(self.cfg.retry_delay_secs);
                    debug!(symbol = %symbol, period = %period, attempt, delay_ms = delay.as_millis() as u64, "Retrying fetch");
                    tokio::time::sleep(delay).await;
                }

                match self
                    .source
                    .fetch(&symbol, period, &self.cfg.interval)
                    .await
                {
                    Ok(series) if series.len() > self.cfg.min_series_len => {
                        debug!(symbol = %symbol, period = %period, closes = series.len(), "Series fetched");
                        return Ok(series);
                    }
                    Ok(series) => {
                        last_failure = format!(
                            "period {period}: series too short ({} closes)",
                            series.len()
                        );
                        last_was_short = true;
                        debug!(symbol = %symbol, period = %period, closes = series.len(), "Series below minimum length");
                    }
                    Err(e) => {
                        last_failure = format!("period {period}: {e}");
                        last_was_short = false;
                        warn!(symbol = %symbol, period = %period, attempt, error = %e, "Fetch attempt failed");
                    }
                }
            }
        }

        // A run that ended on a short series is a data problem, not a
        // source problem; the caller excludes the instrument either way.
        if last_was_short {
            Err(ScanError::DataInsufficient {
                symbol,
                reason: last_failure,
            })
        } else {
            Err(ScanError::TransientFetch {
                symbol,
                message: format!("exhausted all periods; last failure: {last_failure}"),
            })
        }
    }

    /// The mandatory self-throttle between successive instruments.
    /// Randomized so request timing doesn't form a bannable pattern.
    pub async fn pace(&self) {
        let delay = jitter(self.cfg.instrument_delay_secs);
        if !delay.is_zero() {
            debug!(delay_ms = delay.as_millis() as u64, "Pacing before next instrument");
            tokio::time::sleep(delay).await;
        }
    }
}

/// Uniform random duration within `[min, max]` seconds. Inverted
/// bounds are swapped; degenerate or non-positive bounds collapse to
/// zero (used by tests).
fn jitter(bounds: (f64, f64)) -> Duration {
    let (mut min, mut max) = bounds;
    if max < min {
        std::mem::swap(&mut min, &mut max);
    }
    if max <= 0.0 || min < 0.0 {
        return Duration::ZERO;
    }
    let secs = if max > min {
        rand::thread_rng().gen_range(min..=max)
    } else {
        min
    };
    Duration::from_secs_f64(secs)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
