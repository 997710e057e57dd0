//! Session factory: one key, one seeded session per attempt

use std::sync::Arc;

use key_pool::{KeyPool, SelectedKey};
use provider::{ChatSession, Provider, Turn, seed_history};

use crate::error::GatewayError;

/// A freshly seeded session and the key it is bound to.
pub struct Session {
    pub key: SelectedKey,
    pub chat: Box<dyn ChatSession>,
}

/// Builds sessions from the key pool and a provider.
///
/// `pool` is `None` when no keys were configured; the gateway still starts so
/// it can answer every request with a configuration error.
#[derive(Clone)]
pub struct SessionFactory {
    pool: Option<Arc<KeyPool>>,
    provider: Arc<dyn Provider>,
    seed: Vec<Turn>,
}

impl SessionFactory {
    pub fn new(
        pool: Option<Arc<KeyPool>>,
        provider: Arc<dyn Provider>,
        instruction: &str,
        acknowledgment: &str,
    ) -> Self {
        Self {
            pool,
            provider,
            seed: seed_history(instruction, acknowledgment),
        }
    }

    /// Take the next key and start a session primed with the seed turns.
    pub fn create_session(&self) -> Result<Session, GatewayError> {
        let pool = self.pool.as_ref().ok_or(GatewayError::NoCredential)?;
        let key = pool.next();
        let chat = self
            .provider
            .start_session(key.key.clone(), self.seed.clone());
        Ok(Session { key, chat })
    }

    /// Number of configured keys (0 when none).
    pub fn pool_size(&self) -> usize {
        self.pool.as_ref().map_or(0, |p| p.len())
    }

    pub fn provider_id(&self) -> &str {
        self.provider.id()
    }
}
