//! Page summarization through the Gemini `generateContent` API
//!
//! Every call waits on its own [`RateLimiter`] configured with the selected
//! model's quota. Failures never propagate to the crawl: [`Summarizer::summarize`]
//! returns a marker string starting with [`FAILURE_PREFIX`] instead.

use crate::config::SummarizationConfig;
use crate::ratelimit::RateLimiter;
use crate::{ConfigError, GatherError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Start of every stored failure marker
pub const FAILURE_PREFIX: &str = "[summary unavailable";

const PROMPT: &str = "Summarize the following text in a concise paragraph:\n\n";

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Client for one summarization model
pub struct Summarizer {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    max_input_chars: usize,
    limiter: Arc<RateLimiter>,
}

impl Summarizer {
    /// Builds a summarizer for the configured model
    ///
    /// Fails when the model has no entry in the quota table.
    pub fn new(
        client: Client,
        config: &SummarizationConfig,
        api_key: impl Into<String>,
    ) -> Result<Self, GatherError> {
        let quota = config.selected_quota().ok_or_else(|| {
            ConfigError::Validation(format!(
                "summarization model '{}' has no entry in summarization.models",
                config.model
            ))
        })?;

        let limiter = RateLimiter::new(
            format!("summarizer:{}", quota.name),
            quota.requests_per_minute,
            quota.requests_per_day,
        );

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.into(),
            max_input_chars: config.max_input_chars,
            limiter: Arc::new(limiter),
        })
    }

    /// Builds a summarizer reading the API key from the configured variable
    pub fn from_env(client: Client, config: &SummarizationConfig) -> Result<Self, GatherError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnv(config.api_key_env.clone()))?;
        Self::new(client, config, api_key)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Summarizes page text, returning a failure marker on any error
    pub async fn summarize(&self, text: &str) -> String {
        match self.request_summary(text).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(model = %self.model, error = %e, "Summarization failed");
                failure_marker(&e.to_string())
            }
        }
    }

    /// Summarizes page text
    ///
    /// Blank input is rejected without a request.
    pub async fn request_summary(&self, text: &str) -> Result<String, GatherError> {
        if text.trim().is_empty() {
            return Err(GatherError::Summarizer("empty input".to_string()));
        }

        let prompt = format!("{}{}", PROMPT, truncate_chars(text, self.max_input_chars));
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: &prompt }],
            }],
        };
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint, self.model
        );

        self.limiter.acquire().await;

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|source| GatherError::Http {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let reason = serde_json::from_slice::<ErrorResponse>(&bytes)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("HTTP {}", status.as_u16()));
            return Err(GatherError::Summarizer(reason));
        }

        let parsed: GenerateResponse = serde_json::from_slice(&bytes)?;
        parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.text)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| GatherError::Summarizer("response contained no text".to_string()))
    }
}

/// Formats the string stored in place of a summary
pub fn failure_marker(reason: &str) -> String {
    format!("{}: {}]", FAILURE_PREFIX, reason)
}

/// Returns at most `max` characters of `text`, cut on a char boundary
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
