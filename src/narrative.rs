//! Optional narrative commentary for scan results.
//!
//! A stateless one-shot collaborator: takes one `ScanResult`'s numbers,
//! asks a chat-completions endpoint for a short prose read, returns the
//! text. No retries, no state, no algorithmic content — disabled unless
//! configured.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::types::ScanResult;

const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const DEFAULT_MODEL: &str = "anthropic/claude-3.5-haiku";

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// One-shot prose generator for a single scan result.
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn narrate(&self, result: &ScanResult) -> Result<String>;

    fn model_name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Request/response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

// ---------------------------------------------------------------------------
// OpenRouter client
// ---------------------------------------------------------------------------

/// Chat-completions client used for commentary.
pub struct OpenRouterNarrator {
    http: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl OpenRouterNarrator {
    pub fn new(api_key: String, model: Option<String>, max_tokens: u32) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to build HTTP client for narrative generator")?;

        Ok(Self {
            http,
            api_key,
            model: model
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens,
        })
    }
}

/// Render the numeric fields of a result into the user message.
fn commentary_prompt(result: &ScanResult) -> String {
    format!(
        "Instrument {symbol}: current close {current:.2}, suggested limit entry \
         {buy:.2}, simulated target {sell:.2} expected within {days} trading days \
         (projected return {ret:.2}%). Model note: {insight}. \
         Write two sentences of plain-language commentary on this setup for a \
         retail investor. No financial advice disclaimer needed.",
        symbol = result.instrument.symbol(),
        current = result.current_price,
        buy = result.buy_price,
        sell = result.sell_price,
        days = result.days_to_target,
        ret = result.projected_return * 100.0,
        insight = result.insight,
    )
}

#[async_trait]
impl NarrativeGenerator for OpenRouterNarrator {
    async fn narrate(&self, result: &ScanResult) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: commentary_prompt(result),
            }],
        };

        debug!(model = %self.model, symbol = %result.instrument, "Requesting commentary");

        let resp = self
            .http
            .post(OPENROUTER_API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .context("Narrative request failed")?
            .error_for_status()
            .context("Narrative request rejected")?;

        let body: ChatResponse = resp
            .json()
            .await
            .context("Failed to parse narrative response")?;

        let text = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .filter(|t| !t.is_empty())
            .context("Narrative response contained no text")?;

        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
