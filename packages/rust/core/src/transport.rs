//! Transport seam between the pipeline and the remote language model.
//!
//! [`ModelTransport`] sends a built [`TaskRequest`] and returns the model's
//! raw text payload, or `None` when the envelope carries no text at all.
//! [`GeminiTransport`] is the production implementation over `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use clearmind_shared::{ClearMindError, Result};

use crate::request::TaskRequest;

/// User-Agent string for model requests.
const USER_AGENT: &str = concat!("ClearMind/", env!("CARGO_PKG_VERSION"));

/// Cap on how much of an HTTP error body is kept in the error message.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Sends requests to the model and extracts the text payload.
#[async_trait]
pub trait ModelTransport: Send + Sync {
    async fn send(&self, request: &TaskRequest) -> Result<Option<String>>;
}

// Gemini response envelope

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

/// Pull the first candidate's text out of a `generateContent` envelope.
///
/// Multiple text parts are concatenated in order. Returns `None` when there
/// is no candidate or no text part.
fn extract_text(envelope: &str) -> Result<Option<String>> {
    let parsed: GenerateContentResponse = serde_json::from_str(envelope)
        .map_err(|e| ClearMindError::Transport(format!("invalid response envelope: {e}")))?;

    let Some(content) = parsed.candidates.into_iter().next().and_then(|c| c.content) else {
        return Ok(None);
    };
    let texts: Vec<String> = content.parts.into_iter().filter_map(|p| p.text).collect();
    if texts.is_empty() {
        return Ok(None);
    }
    Ok(Some(texts.concat()))
}

/// `generateContent` client.
pub struct GeminiTransport {
    client: Client,
}

impl GeminiTransport {
    /// Build a client. `timeout` bounds the HTTP exchange itself; the
    /// pipeline applies its own bound on top.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ClearMindError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ModelTransport for GeminiTransport {
    #[instrument(skip_all, fields(kind = %request.kind, endpoint = %request.endpoint))]
    async fn send(&self, request: &TaskRequest) -> Result<Option<String>> {
        let response = self
            .client
            .post(&request.endpoint)
            .headers(request.headers.clone())
            .json(&request.body())
            .send()
            .await
            .map_err(|e| ClearMindError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            return Err(ClearMindError::Transport(format!("HTTP {status}: {snippet}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ClearMindError::Transport(format!("failed to read body: {e}")))?;
        debug!(bytes = body.len(), "model response received");

        extract_text(&body)
    }
}
