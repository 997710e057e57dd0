//! Failure classification for backend responses
//!
//! Distinguishes per-key quota exhaustion and backend overload (both worth
//! rotating to another key) from everything else. The HTTP status is used
//! when the failure carries one; message matching covers failures that only
//! surface as text.

use provider::{ErrorClassification, ProviderError};

/// Case-insensitive markers of per-key quota exhaustion.
const QUOTA_PATTERNS: &[&str] = &["429", "quota"];

/// Case-sensitive markers of backend overload.
const OVERLOAD_PATTERNS: &[&str] = &["503", "Overloaded"];

/// Classify a failure message by substring.
///
/// Quota markers are checked first, so a message mentioning both a quota and
/// an overload is treated as quota exhaustion.
pub fn classify_message(message: &str) -> ErrorClassification {
    let lower = message.to_lowercase();
    if QUOTA_PATTERNS.iter().any(|p| lower.contains(p)) {
        return ErrorClassification::QuotaExceeded;
    }
    if OVERLOAD_PATTERNS.iter().any(|p| message.contains(p)) {
        return ErrorClassification::ServiceOverloaded;
    }
    ErrorClassification::Fatal
}

/// Classify a provider failure.
///
/// 429 → QuotaExceeded, 503 → ServiceOverloaded. Any other status, and
/// failures without a status, fall back to `classify_message` on the
/// rendered error.
pub fn classify_failure(err: &ProviderError) -> ErrorClassification {
    match err.status() {
        Some(429) => ErrorClassification::QuotaExceeded,
        Some(503) => ErrorClassification::ServiceOverloaded,
        _ => classify_message(&err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream(status: u16, message: &str) -> ProviderError {
        ProviderError::Upstream {
            status,
            message: message.into(),
        }
    }

    #[test]
    fn message_with_429_is_quota() {
        assert_eq!(
            classify_message("got status 429 from upstream"),
            ErrorClassification::QuotaExceeded
        );
    }

    #[test]
    fn message_with_quota_any_case_is_quota() {
        assert_eq!(
            classify_message("You exceeded your current QUOTA"),
            ErrorClassification::QuotaExceeded
        );
        assert_eq!(
            classify_message("Quota exceeded for metric"),
            ErrorClassification::QuotaExceeded
        );
    }

    #[test]
    fn message_with_503_is_overloaded() {
        assert_eq!(
            classify_message("503 Service Unavailable"),
            ErrorClassification::ServiceOverloaded
        );
    }

    #[test]
    fn message_with_overloaded_is_overloaded() {
        assert_eq!(
            classify_message("Overloaded, try later"),
            ErrorClassification::ServiceOverloaded
        );
    }

    #[test]
    fn overloaded_match_is_case_sensitive() {
        assert_eq!(
            classify_message("the model is overloaded"),
            ErrorClassification::Fatal
        );
    }

    #[test]
    fn quota_wins_over_overload() {
        assert_eq!(
            classify_message("503 Overloaded: quota pressure"),
            ErrorClassification::QuotaExceeded
        );
    }

    #[test]
    fn unrelated_message_is_fatal() {
        assert_eq!(
            classify_message("API key not valid"),
            ErrorClassification::Fatal
        );
        assert_eq!(classify_message(""), ErrorClassification::Fatal);
    }

    #[test]
    fn status_429_is_quota_regardless_of_message() {
        assert_eq!(
            classify_failure(&upstream(429, "Resource has been exhausted")),
            ErrorClassification::QuotaExceeded
        );
    }

    #[test]
    fn status_503_is_overloaded_regardless_of_message() {
        assert_eq!(
            classify_failure(&upstream(503, "The model is overloaded.")),
            ErrorClassification::ServiceOverloaded
        );
    }

    #[test]
    fn other_status_falls_back_to_message() {
        assert_eq!(
            classify_failure(&upstream(400, "API key not valid")),
            ErrorClassification::Fatal
        );
        assert_eq!(
            classify_failure(&upstream(403, "quota project not set")),
            ErrorClassification::QuotaExceeded
        );
    }

    #[test]
    fn transport_error_uses_message() {
        assert_eq!(
            classify_failure(&ProviderError::Transport("connection reset".into())),
            ErrorClassification::Fatal
        );
        assert_eq!(
            classify_failure(&ProviderError::Transport("upstream said Overloaded".into())),
            ErrorClassification::ServiceOverloaded
        );
    }
}
