//! Deterministic in-memory fakes for integration testing.
//!
//! Mirrors the external collaborators — listing endpoints, the price
//! history source, and the key-value sheet store — with fully
//! controllable, no-network implementations.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use stockscan::fetch::PriceHistorySource;
use stockscan::pool::ListingSource;
use stockscan::sync::KeyValueSheet;
use stockscan::types::{Instrument, PricePoint, PriceSeries, ScanError};

/// A synthetic close series with real variance.
pub fn wavy_series(symbol: &str, n: usize) -> PriceSeries {
    let start = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
    let points = (0..n)
        .map(|i| PricePoint {
            date: start + chrono::Duration::days(i as i64),
            close: 100.0 + (i as f64 * 0.7).sin() * 3.0 + i as f64 * 0.1,
        })
        .collect();
    PriceSeries::new(symbol, points)
}

// ---------------------------------------------------------------------------
// Listing sources
// ---------------------------------------------------------------------------

/// Listing endpoint returning a fixed instrument set, or always failing.
pub struct MockListingSource {
    name: String,
    outcome: Result<Vec<Instrument>, String>,
    pub calls: Arc<AtomicU32>,
}

impl MockListingSource {
    pub fn ok(name: &str, symbols: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            outcome: Ok(symbols
                .iter()
                .map(|s| Instrument::parse(s).expect("valid test symbol"))
                .collect()),
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn timing_out(name: &str) -> Self {
        Self {
            name: name.to_string(),
            outcome: Err("request timed out".to_string()),
            calls: Arc::new(AtomicU32::new(0)),
        }
    }
}

#[async_trait]
impl ListingSource for MockListingSource {
    async fn fetch_listing(&self) -> Result<Vec<Instrument>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            Ok(v) => Ok(v.clone()),
            Err(msg) => Err(anyhow::anyhow!("{msg}")),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// Price history source
// ---------------------------------------------------------------------------

/// Price source serving canned series per symbol; everything else is a
/// transient failure. Counts attempts for throttle/bound assertions.
pub struct MockHistorySource {
    series: HashMap<String, PriceSeries>,
    pub attempts: Arc<AtomicU32>,
}

impl MockHistorySource {
    pub fn new(entries: &[(&str, usize)]) -> Self {
        Self {
            series: entries
                .iter()
                .map(|(sym, n)| (sym.to_string(), wavy_series(sym, *n)))
                .collect(),
            attempts: Arc::new(AtomicU32::new(0)),
        }
    }
}

#[async_trait]
impl PriceHistorySource for MockHistorySource {
    async fn fetch(
        &self,
        symbol: &str,
        _period: &str,
        _interval: &str,
    ) -> Result<PriceSeries, ScanError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.series
            .get(symbol)
            .cloned()
            .ok_or_else(|| ScanError::TransientFetch {
                symbol: symbol.to_string(),
                message: "no data for symbol".to_string(),
            })
    }

    fn name(&self) -> &str {
        "mock-history"
    }
}

// ---------------------------------------------------------------------------
// Key-value sheet
// ---------------------------------------------------------------------------

/// In-memory sheet with the gateway's 1-indexed addressing.
#[derive(Clone, Default)]
pub struct InMemorySheet {
    rows: Arc<Mutex<Vec<Vec<String>>>>,
}

impl InMemorySheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<Vec<String>> {
        self.rows.lock().unwrap().clone()
    }

    /// Rows whose key column matches.
    pub fn rows_for_key(&self, key: &str) -> Vec<Vec<String>> {
        self.snapshot()
            .into_iter()
            .filter(|r| r.first().map(|k| k == key).unwrap_or(false))
            .collect()
    }
}

#[async_trait]
impl KeyValueSheet for InMemorySheet {
    async fn get_all_rows(&self) -> Result<Vec<Vec<String>>> {
        Ok(self.snapshot())
    }

    async fn update_cell(&self, row: usize, col: usize, value: &str) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .get_mut(row - 1)
            .ok_or_else(|| anyhow::anyhow!("row {row} out of range"))?;
        while row.len() < col {
            row.push(String::new());
        }
        row[col - 1] = value.to_string();
        Ok(())
    }

    async fn append_row(&self, values: Vec<String>) -> Result<()> {
        self.rows.lock().unwrap().push(values);
        Ok(())
    }
}
