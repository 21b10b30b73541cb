//! Result synchronization into an external key-value row store.
//!
//! The store is a remote sheet of `(key, value)` rows behind a small
//! HTTP gateway. Upserts are deliberately single-read/batch-write: one
//! bulk read of every row, an in-memory index by key, then an in-place
//! cell update for existing keys or an appended row for new ones. This
//! keeps round-trips to the remote store at a minimum and keeps keys
//! unique at all times.
//!
//! Sync failure is never fatal to a scan: the caller logs the error and
//! the already-computed summary stays valid.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use crate::types::{ScanError, ScanOutcome, SyncRecord};

/// Column (1-indexed) holding the key in each row.
const KEY_COL: usize = 1;
/// Column (1-indexed) holding the value.
const VALUE_COL: usize = 2;

// ---------------------------------------------------------------------------
// Store abstraction
// ---------------------------------------------------------------------------

/// Minimal surface of the remote row store.
/// Rows and columns are 1-indexed, matching the gateway's addressing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyValueSheet: Send + Sync {
    /// Read every row in one call.
    async fn get_all_rows(&self) -> Result<Vec<Vec<String>>>;

    /// Overwrite a single cell in place.
    async fn update_cell(&self, row: usize, col: usize, value: &str) -> Result<()>;

    /// Append a new row after the last existing one.
    async fn append_row(&self, values: Vec<String>) -> Result<()>;
}

// ---------------------------------------------------------------------------
// HTTP gateway client
// ---------------------------------------------------------------------------

/// Pre-parsed, structured store credentials. Loading and scrubbing the
/// raw secret material happens outside the core.
#[derive(Clone)]
pub struct StoreCredentials {
    pub base_url: String,
    pub api_key: SecretString,
}

impl StoreCredentials {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: SecretString::new(api_key.into()),
        }
    }
}

/// Client for the sheet gateway's REST surface.
pub struct SheetApiClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
}

impl SheetApiClient {
    pub fn new(creds: StoreCredentials) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("stockscan/0.1.0")
            .build()
            .context("Failed to build HTTP client for sheet store")?;

        Ok(Self {
            http,
            base_url: creds.base_url.trim_end_matches('/').to_string(),
            api_key: creds.api_key,
        })
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", self.api_key.expose_secret())
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("Content-Type", "application/json")
    }
}

#[async_trait]
impl KeyValueSheet for SheetApiClient {
    async fn get_all_rows(&self) -> Result<Vec<Vec<String>>> {
        let url = format!("{}/rows", self.base_url);
        let resp = self
            .authed(self.http.get(&url))
            .send()
            .await
            .context("Sheet read request failed")?
            .error_for_status()
            .context("Sheet read rejected")?;

        let rows: Vec<Vec<String>> = resp.json().await.context("Malformed sheet payload")?;
        debug!(rows = rows.len(), "Sheet rows fetched");
        Ok(rows)
    }

    async fn update_cell(&self, row: usize, col: usize, value: &str) -> Result<()> {
        let url = format!("{}/rows/{row}/{col}", self.base_url);
        self.authed(self.http.patch(&url))
            .json(&serde_json::json!({ "value": value }))
            .send()
            .await
            .context("Cell update request failed")?
            .error_for_status()
            .context("Cell update rejected")?;
        Ok(())
    }

    async fn append_row(&self, values: Vec<String>) -> Result<()> {
        let url = format!("{}/rows", self.base_url);
        self.authed(self.http.post(&url))
            .json(&serde_json::json!({ "values": values }))
            .send()
            .await
            .context("Row append request failed")?
            .error_for_status()
            .context("Row append rejected")?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Synchronizer
// ---------------------------------------------------------------------------

/// Upserts scan metadata into the store, deduplicating by key.
pub struct ResultSynchronizer {
    sheet: Box<dyn KeyValueSheet>,
}

impl ResultSynchronizer {
    pub fn new(sheet: Box<dyn KeyValueSheet>) -> Self {
        Self { sheet }
    }

    /// Upsert every record: one bulk read, then in-place updates for
    /// keys that already exist and appends for those that don't.
    ///
    /// Keys appended during this call join the index immediately, so a
    /// key repeated within one batch still ends up as a single row
    /// holding the last value.
    pub async fn upsert(&self, records: &[SyncRecord]) -> Result<(), ScanError> {
        if records.is_empty() {
            return Ok(());
        }

        let rows = self
            .sheet
            .get_all_rows()
            .await
            .map_err(|e| ScanError::Sync(format!("bulk read failed: {e}")))?;

        // Key → 1-indexed row number; first occurrence wins.
        let mut index: HashMap<String, usize> = HashMap::new();
        for (i, row) in rows.iter().enumerate() {
            if let Some(key) = row.get(KEY_COL - 1) {
                index.entry(key.clone()).or_insert(i + 1);
            }
        }
        let mut row_count = rows.len();

        for record in records {
            match index.get(&record.key) {
                Some(&row) => {
                    self.sheet
                        .update_cell(row, VALUE_COL, &record.value)
                        .await
                        .map_err(|e| {
                            ScanError::Sync(format!("update of key {} failed: {e}", record.key))
                        })?;
                }
                None => {
                    self.sheet
                        .append_row(vec![record.key.clone(), record.value.clone()])
                        .await
                        .map_err(|e| {
                            ScanError::Sync(format!("append of key {} failed: {e}", record.key))
                        })?;
                    row_count += 1;
                    index.insert(record.key.clone(), row_count);
                }
            }
        }

        info!(records = records.len(), "Scan metadata synced to store");
        Ok(())
    }
}

/// Build the per-run metadata records from a scan outcome.
pub fn summary_records(outcome: &ScanOutcome, completed_at: DateTime<Utc>) -> Vec<SyncRecord> {
    vec![
        SyncRecord::new("last_scan", completed_at.format("%H:%M:%S").to_string()),
        SyncRecord::new("found", outcome.results().len().to_string()),
        SyncRecord::new("scanned", outcome.scanned().to_string()),
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
