//! Backend abstraction for text-completion providers
//!
//! Defines the `Provider` trait that decouples the gateway's retry/rotation
//! logic from the wire protocol of a particular model vendor. A provider is a
//! session factory: given one credential and a seed history it returns a
//! `ChatSession` that accepts prompts. Sessions are bound to exactly one
//! credential, so rotating credentials always means starting a new session.

use common::Secret;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One turn of conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// Build the two-turn seed every session starts from: the instruction as a
/// user turn, then the model's acknowledgment.
pub fn seed_history(instruction: &str, acknowledgment: &str) -> Vec<Turn> {
    vec![Turn::user(instruction), Turn::model(acknowledgment)]
}

/// Classification of a failed send, driving the retry decision.
///
/// - QuotaExceeded: the credential hit its rate limit, rotate and retry
/// - ServiceOverloaded: backend is shedding load, back off, rotate and retry
/// - Fatal: anything else, surfaced immediately
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClassification {
    QuotaExceeded,
    ServiceOverloaded,
    Fatal,
}

impl ErrorClassification {
    pub fn is_retryable(self) -> bool {
        !matches!(self, ErrorClassification::Fatal)
    }

    /// Label for logs and metrics.
    pub fn label(self) -> &'static str {
        match self {
            ErrorClassification::QuotaExceeded => "quota_exceeded",
            ErrorClassification::ServiceOverloaded => "service_overloaded",
            ErrorClassification::Fatal => "fatal",
        }
    }
}

/// Errors from a provider session.
///
/// `Upstream` carries the HTTP status so callers can classify on a structured
/// code; its display form keeps the status inline for message-based matching.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("[{status}] {message}")]
    Upstream { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Upstream HTTP status, if the failure came from a backend response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result alias for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// A single conversation bound to one credential.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Box<dyn ChatSession>`).
pub trait ChatSession: Send {
    /// Send a user prompt and return the model's raw text reply.
    ///
    /// On success both the prompt and the reply are appended to the history.
    fn send<'a>(
        &'a mut self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

    /// Conversation so far, seed turns included.
    fn history(&self) -> &[Turn];
}

/// Session factory for a model vendor.
pub trait Provider: Send + Sync {
    /// Identifier for logging and health reporting (e.g. "gemini")
    fn id(&self) -> &str;

    /// Start a session bound to `credential`, primed with `seed`.
    fn start_session(&self, credential: Secret<String>, seed: Vec<Turn>) -> Box<dyn ChatSession>;
}
