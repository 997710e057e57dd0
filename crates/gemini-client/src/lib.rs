//! Gemini REST backend for the code gateway
//!
//! Implements `provider::Provider` on top of the Generative Language API's
//! `generateContent` method. Each session keeps its own conversation history
//! and sends the whole history on every call, matching the API's stateless
//! request model.
//!
//! Request flow:
//! 1. `GeminiProvider::start_session()` binds a key and the seed turns
//! 2. `GeminiSession::send()` POSTs history + prompt to `{base}/v1beta/models/{model}:generateContent`
//! 3. Non-2xx responses become `ProviderError::Upstream` with the status and the API's error message
//! 4. Successful responses yield the concatenated text parts of the first candidate

pub mod client;
pub mod constants;
pub mod wire;

pub use client::{GeminiProvider, GeminiSession};
pub use constants::*;
