//! Gemini API defaults and the fixed session seed

/// Production Generative Language API host
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Model used when none is configured
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Header carrying the API key (keeps keys out of URLs and therefore out of logs)
pub const API_KEY_HEADER: &str = "x-goog-api-key";

/// Instruction sent as the first user turn of every session.
pub const SYSTEM_INSTRUCTION: &str = "You are a code generator. For every request, reply with \
only the requested code inside a single fenced code block. Do not add explanations, notes, \
or any text outside the code block.";

/// Model turn acknowledging the instruction.
pub const SYSTEM_ACKNOWLEDGMENT: &str = "Understood. I will reply with code only.";
