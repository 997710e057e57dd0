//! Gateway error taxonomy
//!
//! Every failure a request can hit is one of these variants. None of them
//! escape the endpoint: `gateway::handle_prompt` turns each into a JSON
//! envelope with the status from `GatewayError::status`.

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    /// `query` absent or empty. Caller error, never retried.
    #[error("Missing 'query' parameter.")]
    MissingQuery,

    /// No API keys were configured at startup. Fails every request until the
    /// operator fixes the environment.
    #[error("Server config error: No API keys.")]
    NoCredential,

    /// Backend failure that is not quota or overload related.
    #[error("backend request failed: {0}")]
    Backend(String),

    /// Every attempt hit a retryable failure.
    #[error("all {attempts} attempts failed, last error: {last}")]
    RetryExhausted { attempts: usize, last: String },
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::MissingQuery => StatusCode::BAD_REQUEST,
            GatewayError::NoCredential
            | GatewayError::Backend(_)
            | GatewayError::RetryExhausted { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to callers in the `message` field.
    pub fn public_message(&self) -> String {
        match self {
            GatewayError::MissingQuery | GatewayError::NoCredential => self.to_string(),
            GatewayError::Backend(_) | GatewayError::RetryExhausted { .. } => {
                "Internal Server Error".to_string()
            }
        }
    }

    /// Last underlying backend message, for the `details` field.
    pub fn details(&self) -> Option<&str> {
        match self {
            GatewayError::Backend(message) => Some(message),
            GatewayError::RetryExhausted { last, .. } => Some(last),
            GatewayError::MissingQuery | GatewayError::NoCredential => None,
        }
    }
}
