//! Shared types for the STOCKSCAN pipeline.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that pool, fetch, forecast,
//! engine, and sync modules can depend on them without circular
//! references.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Instrument
// ---------------------------------------------------------------------------

/// Which board an instrument trades on. Determines the market suffix
/// appended to the numeric code when querying the price source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Board {
    /// Main exchange listing (`.TW`).
    Listed,
    /// Over-the-counter listing (`.TWO`).
    Otc,
}

impl Board {
    /// Market suffix used in exchange-qualified symbols.
    pub fn suffix(&self) -> &'static str {
        match self {
            Board::Listed => "TW",
            Board::Otc => "TWO",
        }
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.suffix())
    }
}

impl std::str::FromStr for Board {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "TW" => Ok(Board::Listed),
            "TWO" => Ok(Board::Otc),
            _ => Err(anyhow::anyhow!("Unknown market suffix: {s}")),
        }
    }
}

/// A tradable security identified by an exchange-qualified symbol.
///
/// Canonical form is a fixed-length numeric code plus a market suffix,
/// e.g. `2330.TW`. Instruments are read-only during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instrument {
    pub code: String,
    pub board: Board,
}

/// Length of a canonical numeric instrument code.
pub const CODE_LEN: usize = 4;

impl Instrument {
    /// Build an instrument from a bare numeric code, validating the
    /// canonical format. Returns `None` for anything that is not a
    /// fixed-length all-digit code (warrants, ETNs, preferred shares
    /// with letter suffixes, etc.).
    pub fn from_code(code: &str, board: Board) -> Option<Self> {
        if code.len() == CODE_LEN && code.bytes().all(|b| b.is_ascii_digit()) {
            Some(Self {
                code: code.to_string(),
                board,
            })
        } else {
            None
        }
    }

    /// Parse an exchange-qualified symbol like `2330.TW`.
    pub fn parse(symbol: &str) -> Option<Self> {
        let (code, suffix) = symbol.split_once('.')?;
        let board = suffix.parse::<Board>().ok()?;
        Self::from_code(code, board)
    }

    /// The exchange-qualified symbol, e.g. `2330.TW`.
    pub fn symbol(&self) -> String {
        format!("{}.{}", self.code, self.board.suffix())
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.code, self.board.suffix())
    }
}

// ---------------------------------------------------------------------------
// Price series
// ---------------------------------------------------------------------------

/// A single (date, close) observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// An ordered sequence of daily closes for one instrument.
///
/// Fetched per scan and discarded after forecasting — full history is
/// never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    pub points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, points: Vec<PricePoint>) -> Self {
        Self {
            symbol: symbol.into(),
            points,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The most recent close, if any.
    pub fn last_close(&self) -> Option<f64> {
        self.points.last().map(|p| p.close)
    }

    /// Day-over-day percentage changes. One element shorter than the
    /// series itself; empty for series of fewer than two points.
    pub fn daily_returns(&self) -> Vec<f64> {
        self.points
            .windows(2)
            .filter(|w| w[0].close != 0.0)
            .map(|w| (w[1].close - w[0].close) / w[0].close)
            .collect()
    }
}

impl fmt::Display for PriceSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} closes, last {})",
            self.symbol,
            self.points.len(),
            self.last_close()
                .map(|c| format!("{c:.2}"))
                .unwrap_or_else(|| "n/a".to_string()),
        )
    }
}

// ---------------------------------------------------------------------------
// Forecast
// ---------------------------------------------------------------------------

/// Output of the Monte Carlo engine for one instrument.
///
/// The "unavailable" sentinel (`buy_price == 0`) marks series that could
/// not be forecast — too short, or degenerate volatility. Callers test
/// `is_tradable()` rather than matching on errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    /// Last observed close, taken directly from the fetched series.
    pub current_price: f64,
    /// Suggested limit entry below the last close.
    pub buy_price: f64,
    /// Maximum of the expected forward path.
    pub sell_price: f64,
    /// 1-indexed trading day on which the expected path peaks.
    pub best_day: u32,
    /// Short qualitative note derived from the drift sign.
    pub note: String,
}

impl Forecast {
    /// The well-defined "no result" value, distinguishable from any
    /// valid forecast because real buy prices are strictly positive.
    pub fn unavailable() -> Self {
        Self {
            current_price: 0.0,
            buy_price: 0.0,
            sell_price: 0.0,
            best_day: 0,
            note: String::new(),
        }
    }

    pub fn is_tradable(&self) -> bool {
        self.buy_price > 0.0
    }

    /// `(sell - buy) / buy`, or 0.0 for the sentinel.
    pub fn projected_return(&self) -> f64 {
        if self.buy_price > 0.0 {
            (self.sell_price - self.buy_price) / self.buy_price
        } else {
            0.0
        }
    }
}

// ---------------------------------------------------------------------------
// Scan results
// ---------------------------------------------------------------------------

/// A ranked scan entry, produced once per forecastable instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub instrument: Instrument,
    pub current_price: f64,
    pub buy_price: f64,
    pub sell_price: f64,
    pub days_to_target: u32,
    pub projected_return: f64,
    pub insight: String,
}

impl ScanResult {
    pub fn from_forecast(instrument: Instrument, forecast: &Forecast) -> Self {
        Self {
            instrument,
            current_price: forecast.current_price,
            buy_price: forecast.buy_price,
            sell_price: forecast.sell_price,
            days_to_target: forecast.best_day,
            projected_return: forecast.projected_return(),
            insight: forecast.note.clone(),
        }
    }
}

impl fmt::Display for ScanResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | entry {:.2} → target {:.2} in ≤{}d ({:+.2}%)",
            self.instrument,
            self.buy_price,
            self.sell_price,
            self.days_to_target,
            self.projected_return * 100.0,
        )
    }
}

/// Terminal state of a scan run. An empty scan is an explicit outcome,
/// not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanOutcome {
    /// No instrument in the pool produced a tradable forecast.
    NoResults { scanned: usize },
    /// Top-N results, stable-sorted descending by projected return.
    Ranked {
        scanned: usize,
        results: Vec<ScanResult>,
    },
}

impl ScanOutcome {
    pub fn results(&self) -> &[ScanResult] {
        match self {
            ScanOutcome::NoResults { .. } => &[],
            ScanOutcome::Ranked { results, .. } => results,
        }
    }

    pub fn scanned(&self) -> usize {
        match self {
            ScanOutcome::NoResults { scanned } => *scanned,
            ScanOutcome::Ranked { scanned, .. } => *scanned,
        }
    }
}

// ---------------------------------------------------------------------------
// Sync records
// ---------------------------------------------------------------------------

/// A `(key, value)` pair destined for the external row store.
/// Key uniqueness in the store is enforced by lookup-before-write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub key: String,
    pub value: String,
}

impl SyncRecord {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error taxonomy for the scan pipeline.
///
/// None of these abort a scan: the orchestrator is the single boundary
/// that catches them, logs, and continues with the next instrument.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Timeout, rate limiting, empty or malformed payload from the
    /// price source. Retried a bounded number of times, then the
    /// instrument is skipped.
    #[error("transient fetch failure for {symbol}: {message}")]
    TransientFetch { symbol: String, message: String },

    /// Series too short or volatility non-finite. The instrument is
    /// excluded and the scan continues.
    #[error("insufficient data for {symbol}: {reason}")]
    DataInsufficient { symbol: String, reason: String },

    /// Store unreachable or schema mismatch. Reported once; scan
    /// results remain valid.
    #[error("store sync failed: {0}")]
    Sync(String),

    /// A listing endpoint failed. The pool is built from whichever
    /// sources succeeded.
    #[error("listing source {endpoint} failed: {message}")]
    ListingSource { endpoint: String, message: String },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
