//! Gemini provider and session
//!
//! `GeminiProvider` is cheap to share: it owns a pooled `reqwest::Client` and
//! the endpoint settings. Sessions clone the client handle and own their key
//! and history, so they can be dropped freely after a failed attempt.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use common::Secret;
use provider::{ChatSession, Provider, ProviderError, Turn};
use tracing::{debug, instrument, warn};

use crate::constants::{API_KEY_HEADER, DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::wire::{GenerateContentRequest, GenerateContentResponse, error_message};

/// Session factory for the Gemini `generateContent` API.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    http: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl GeminiProvider {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            model: model.into(),
            timeout,
        }
    }

    /// Provider pointed at the production API with the default model.
    pub fn with_defaults(http: reqwest::Client) -> Self {
        Self::new(http, DEFAULT_BASE_URL, DEFAULT_MODEL, Duration::from_secs(60))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Full `generateContent` URL for the configured model.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

impl Provider for GeminiProvider {
    fn id(&self) -> &str {
        "gemini"
    }

    fn start_session(&self, credential: Secret<String>, seed: Vec<Turn>) -> Box<dyn ChatSession> {
        Box::new(GeminiSession {
            http: self.http.clone(),
            endpoint: self.endpoint(),
            timeout: self.timeout,
            key: credential,
            history: seed,
        })
    }
}

/// One conversation bound to a single API key.
pub struct GeminiSession {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    key: Secret<String>,
    history: Vec<Turn>,
}

impl GeminiSession {
    #[instrument(skip_all, fields(endpoint = %self.endpoint, turns = self.history.len()))]
    async fn generate(&mut self, text: &str) -> provider::Result<String> {
        let prompt = Turn::user(text);
        let payload = {
            let request = GenerateContentRequest::new(&self.history, &prompt);
            serde_json::to_vec(&request)
                .map_err(|e| ProviderError::Malformed(format!("failed to encode request: {e}")))?
        };

        let response = self
            .http
            .post(&self.endpoint)
            .header(API_KEY_HEADER, self.key.expose().as_str())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .timeout(self.timeout)
            .body(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Transport(format!(
                        "request timed out after {}s",
                        self.timeout.as_secs()
                    ))
                } else {
                    ProviderError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            let message = error_message(&body);
            warn!(status = status.as_u16(), %message, "gemini returned an error");
            return Err(ProviderError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::Malformed(format!("invalid generateContent body: {e}")))?;

        let reply = parsed.text().ok_or_else(|| {
            ProviderError::Malformed(format!(
                "response has no text (finish reason: {})",
                parsed.finish_reason().unwrap_or("none")
            ))
        })?;

        debug!(chars = reply.len(), "gemini reply received");
        self.history.push(prompt);
        self.history.push(Turn::model(reply.clone()));
        Ok(reply)
    }
}

impl ChatSession for GeminiSession {
    fn send<'a>(
        &'a mut self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = provider::Result<String>> + Send + 'a>> {
        Box::pin(self.generate(text))
    }

    fn history(&self) -> &[Turn] {
        &self.history
    }
}
