//! Raw model text to `{ "code": ... }`
//!
//! The first fenced block wins: an opening ``` with an optional language
//! tag, a line break, then everything up to the next ```. Text around the
//! block, and any later blocks, is discarded. Replies without a complete
//! block have every ``` removed and are trimmed.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

const FENCE: &str = "```";

/// Body of a successful response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedResponse {
    pub code: String,
}

fn fenced_block() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?s)```[\w+#.-]*[ \t]*\r?\n(.*?)```").ok())
        .as_ref()
}

/// Normalize a raw backend reply. Never fails; the result may be empty.
pub fn normalize(raw: &str) -> NormalizedResponse {
    if let Some(captures) = fenced_block().and_then(|re| re.captures(raw))
        && let Some(body) = captures.get(1)
    {
        return NormalizedResponse {
            code: body.as_str().trim().to_string(),
        };
    }

    NormalizedResponse {
        code: raw.replace(FENCE, "").trim().to_string(),
    }
}
