//! Retry/rotation loop
//!
//! States: Init → Attempting → {Succeeded | RotateAndRetry → Attempting | Failed}
//!
//! Every attempt starts a fresh session, which takes the next key from the
//! pool. Quota and overload failures rotate to the next key and try again
//! (overload after a flat backoff); anything else fails the request at once.
//! The ceiling is `attempts_per_key × pool size`, two full passes over the
//! pool by default.

use std::time::Duration;

use key_pool::classify_failure;
use provider::{ErrorClassification, ProviderError};
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::error::GatewayError;
use crate::factory::SessionFactory;
use crate::journal::Journal;
use crate::metrics;
use crate::normalize::{NormalizedResponse, normalize};

/// Result of one send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success(String),
    RetryableFailure {
        kind: ErrorClassification,
        message: String,
    },
    FatalFailure(String),
}

impl AttemptOutcome {
    pub fn from_result(result: provider::Result<String>) -> Self {
        match result {
            Ok(raw) => AttemptOutcome::Success(raw),
            Err(err) => Self::from_error(&err),
        }
    }

    fn from_error(err: &ProviderError) -> Self {
        let message = err.to_string();
        let kind = classify_failure(err);
        if kind.is_retryable() {
            AttemptOutcome::RetryableFailure { kind, message }
        } else {
            AttemptOutcome::FatalFailure(message)
        }
    }

    fn label(&self) -> &'static str {
        match self {
            AttemptOutcome::Success(_) => "success",
            AttemptOutcome::RetryableFailure { kind, .. } => kind.label(),
            AttemptOutcome::FatalFailure(_) => "fatal",
        }
    }
}

/// A successful request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub response: NormalizedResponse,
    /// Attempts used, including the successful one.
    pub attempts: usize,
}

pub struct Orchestrator {
    factory: SessionFactory,
    journal: Journal,
    attempts_per_key: usize,
    overload_backoff: Duration,
}

impl Orchestrator {
    pub fn new(
        factory: SessionFactory,
        journal: Journal,
        attempts_per_key: usize,
        overload_backoff: Duration,
    ) -> Self {
        Self {
            factory,
            journal,
            attempts_per_key,
            overload_backoff,
        }
    }

    pub fn factory(&self) -> &SessionFactory {
        &self.factory
    }

    /// Total attempts allowed per request.
    pub fn max_attempts(&self) -> usize {
        self.attempts_per_key * self.factory.pool_size()
    }

    /// Run `query` through the backend, rotating keys on retryable failures.
    ///
    /// `query` is assumed non-empty; validation happens at the endpoint.
    #[instrument(skip_all)]
    pub async fn handle(&self, request_id: &str, query: &str) -> Result<Completion, GatewayError> {
        if self.factory.pool_size() == 0 {
            return Err(GatewayError::NoCredential);
        }

        let max_attempts = self.max_attempts();
        let mut last_failure = String::new();

        for attempt in 1..=max_attempts {
            let mut session = self.factory.create_session()?;
            let key = session.key.label();
            self.journal.info(
                "attempt",
                json!({
                    "request_id": request_id,
                    "attempt": attempt,
                    "max_attempts": max_attempts,
                    "key": key,
                    "key_hint": session.key.key.hint(),
                }),
            );

            let outcome = AttemptOutcome::from_result(session.chat.send(query).await);
            metrics::record_attempt(outcome.label());

            match outcome {
                AttemptOutcome::Success(raw) => {
                    self.journal.info(
                        "raw_response",
                        json!({
                            "request_id": request_id,
                            "attempt": attempt,
                            "key": key,
                            "raw": raw,
                        }),
                    );
                    info!(attempt, key = %key, "backend reply received");
                    return Ok(Completion {
                        response: normalize(&raw),
                        attempts: attempt,
                    });
                }
                AttemptOutcome::FatalFailure(message) => {
                    self.journal.error(
                        "backend_error",
                        json!({
                            "request_id": request_id,
                            "attempt": attempt,
                            "key": key,
                            "message": message,
                        }),
                    );
                    return Err(GatewayError::Backend(message));
                }
                AttemptOutcome::RetryableFailure { kind, message } => {
                    let backoff = if kind == ErrorClassification::ServiceOverloaded {
                        self.overload_backoff
                    } else {
                        Duration::ZERO
                    };
                    let retrying = attempt < max_attempts;
                    self.journal.warn(
                        "retry",
                        json!({
                            "request_id": request_id,
                            "attempt": attempt,
                            "key": key,
                            "kind": kind.label(),
                            "message": message,
                            "retrying": retrying,
                            "backoff_ms": backoff.as_millis() as u64,
                        }),
                    );
                    warn!(attempt, key = %key, kind = kind.label(), retrying, "retryable backend failure");
                    last_failure = message;

                    if retrying && !backoff.is_zero() {
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }

        self.journal.error(
            "retry_exhausted",
            json!({
                "request_id": request_id,
                "attempts": max_attempts,
                "last_error": last_failure,
            }),
        );
        Err(GatewayError::RetryExhausted {
            attempts: max_attempts,
            last: last_failure,
        })
    }
}
