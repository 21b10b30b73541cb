//! Instrument pool provider.
//!
//! Builds the scan universe from the exchange's public listing pages —
//! two HTTP endpoints returning HTML tables, one per board. Entries are
//! filtered to the canonical fixed-length numeric code, deduplicated,
//! optionally shuffled, and cached for a validity window.
//!
//! A failing or unparseable source yields nothing and is skipped; the
//! pool only comes back empty when every source fails.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::Client;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::types::{Board, Instrument, ScanError};

/// Ideographic space separating code from name in listing cells.
const CODE_NAME_SEPARATOR: char = '\u{3000}';

// ---------------------------------------------------------------------------
// Listing source
// ---------------------------------------------------------------------------

/// A single exchange listing endpoint.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Fetch all canonical instruments this source lists.
    async fn fetch_listing(&self) -> Result<Vec<Instrument>>;

    /// Source name for logging.
    fn name(&self) -> &str;
}

/// Client for the exchange's ISIN listing page (one per board).
pub struct IsinTableClient {
    http: Client,
    url: String,
    board: Board,
    name: String,
}

impl IsinTableClient {
    pub fn new(url: &str, board: Board, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("stockscan/0.1.0")
            .build()
            .context("Failed to build HTTP client for listing source")?;

        Ok(Self {
            http,
            url: url.to_string(),
            board,
            name: format!("isin-{}", board.suffix().to_lowercase()),
        })
    }
}

#[async_trait]
impl ListingSource for IsinTableClient {
    async fn fetch_listing(&self) -> Result<Vec<Instrument>> {
        debug!(url = %self.url, source = %self.name, "Fetching listing page");

        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("Listing request failed for {}", self.name))?;

        if !resp.status().is_success() {
            return Err(ScanError::ListingSource {
                endpoint: self.name.clone(),
                message: format!("HTTP {}", resp.status()),
            }
            .into());
        }

        let body = resp
            .text()
            .await
            .with_context(|| format!("Failed to read listing body for {}", self.name))?;

        Ok(parse_isin_table(&body, self.board))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// HTML table extraction
// ---------------------------------------------------------------------------

/// Extract canonical instruments from a listing HTML page.
///
/// The page is a large table whose first column holds
/// `"<code>\u{3000}<name>"` cells. Anything that doesn't match the
/// canonical code format (warrants, bonds, header rows) is dropped.
/// Schema drift degrades to an empty result, never an error.
pub fn parse_isin_table(html: &str, board: Board) -> Vec<Instrument> {
    table_cells(html)
        .filter_map(|cell| {
            let (code, _name) = cell.split_once(CODE_NAME_SEPARATOR)?;
            Instrument::from_code(code.trim(), board)
        })
        .collect()
}

/// Iterate the text content of every `<td>` cell in a blob of HTML.
/// Tolerant of attributes and nested inline tags.
fn table_cells(html: &str) -> impl Iterator<Item = String> + '_ {
    let mut rest = html;
    std::iter::from_fn(move || {
        loop {
            let start = rest.find("<td")?;
            let after_tag = rest[start..].find('>')? + start + 1;
            let end = match rest[after_tag..].find("</td>") {
                Some(e) => after_tag + e,
                None => {
                    rest = "";
                    return None;
                }
            };
            let cell = strip_tags(&rest[after_tag..end]);
            rest = &rest[end + 5..];
            if !cell.is_empty() {
                return Some(cell);
            }
        }
    })
}

/// Drop any nested markup inside a cell, keeping the text.
fn strip_tags(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    let mut in_tag = false;
    for c in fragment.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// Deduplicated, optionally shuffled instrument pool with a TTL cache.
pub struct InstrumentPool {
    sources: Vec<Box<dyn ListingSource>>,
    ttl: Duration,
    shuffle: bool,
    cache: Option<(Instant, Vec<Instrument>)>,
}

impl InstrumentPool {
    pub fn new(sources: Vec<Box<dyn ListingSource>>, ttl: Duration, shuffle: bool) -> Self {
        Self {
            sources,
            ttl,
            shuffle,
            cache: None,
        }
    }

    /// The current pool, served from cache when fresh.
    ///
    /// Individual source failures are logged and skipped; when every
    /// source fails this returns an empty pool rather than an error.
    pub async fn instruments(&mut self) -> Vec<Instrument> {
        if let Some((fetched_at, cached)) = &self.cache {
            if fetched_at.elapsed() < self.ttl {
                debug!(count = cached.len(), "Instrument pool served from cache");
                return cached.clone();
            }
        }

        let mut pool = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for source in &self.sources {
            match source.fetch_listing().await {
                Ok(listed) => {
                    debug!(source = source.name(), count = listed.len(), "Listing fetched");
                    for inst in listed {
                        if seen.insert(inst.symbol()) {
                            pool.push(inst);
                        }
                    }
                }
                Err(e) => {
                    warn!(source = source.name(), error = %e, "Listing source failed, skipping");
                }
            }
        }

        if self.shuffle {
            pool.shuffle(&mut rand::thread_rng());
        }

        info!(count = pool.len(), sources = self.sources.len(), "Instrument pool built");
        self.cache = Some((Instant::now(), pool.clone()));
        pool
    }

    /// Drop the cached pool so the next call refetches.
    pub fn invalidate(&mut self) {
        self.cache = None;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
