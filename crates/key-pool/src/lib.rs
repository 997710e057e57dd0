//! Credential pool for backend API keys
//!
//! Holds the fixed list of API keys configured at startup and hands them out
//! round-robin. Every selection advances the shared cursor, so a retry after a
//! quota error always lands on a different key (unless only one is
//! configured).
//!
//! Key lifecycle:
//! 1. Keys are read from configuration once at process start
//! 2. Each request attempt selects the next key via `KeyPool::next`
//! 3. A failed attempt is classified by `classify_failure`; retryable failures
//!    simply select again, the pool itself keeps no per-key state

pub mod error;
pub mod pool;
pub mod quota;

pub use error::{Error, Result};
pub use pool::{KeyPool, SelectedKey};
pub use quota::{classify_failure, classify_message};
