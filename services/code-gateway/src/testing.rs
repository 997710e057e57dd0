//! Scripted provider for unit tests
//!
//! Replies are popped from a queue shared by every session the provider
//! starts, so a test can script a whole retry sequence across rotated keys.
//! Each send records the key it was made with and the prompt text.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use common::Secret;
use key_pool::KeyPool;
use provider::{ChatSession, Provider, ProviderError, Turn};

#[derive(Default)]
struct ScriptState {
    replies: Mutex<VecDeque<provider::Result<String>>>,
    keys_used: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
    sessions_started: Mutex<usize>,
}

pub struct ScriptedProvider {
    state: Arc<ScriptState>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<provider::Result<String>>) -> Arc<Self> {
        let state = ScriptState {
            replies: Mutex::new(replies.into()),
            ..Default::default()
        };
        Arc::new(Self {
            state: Arc::new(state),
        })
    }

    /// Keys (exposed) in the order sends were made.
    pub fn keys_used(&self) -> Vec<String> {
        self.state.keys_used.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.state.prompts.lock().unwrap().clone()
    }

    pub fn sends(&self) -> usize {
        self.state.keys_used.lock().unwrap().len()
    }

    pub fn sessions_started(&self) -> usize {
        *self.state.sessions_started.lock().unwrap()
    }
}

impl Provider for ScriptedProvider {
    fn id(&self) -> &str {
        "scripted"
    }

    fn start_session(&self, credential: Secret<String>, seed: Vec<Turn>) -> Box<dyn ChatSession> {
        *self.state.sessions_started.lock().unwrap() += 1;
        Box::new(ScriptedSession {
            state: self.state.clone(),
            key: credential,
            history: seed,
        })
    }
}

struct ScriptedSession {
    state: Arc<ScriptState>,
    key: Secret<String>,
    history: Vec<Turn>,
}

impl ChatSession for ScriptedSession {
    fn send<'a>(
        &'a mut self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = provider::Result<String>> + Send + 'a>> {
        Box::pin(async move {
            self.state
                .keys_used
                .lock()
                .unwrap()
                .push(self.key.expose().clone());
            self.state.prompts.lock().unwrap().push(text.to_string());
            let reply = self
                .state
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Err(ProviderError::Upstream {
                        status: 500,
                        message: "script exhausted".into(),
                    })
                });
            if let Ok(text_reply) = &reply {
                self.history.push(Turn::user(text));
                self.history.push(Turn::model(text_reply.clone()));
            }
            reply
        })
    }

    fn history(&self) -> &[Turn] {
        &self.history
    }
}

pub fn pool_of(keys: &[&str]) -> Arc<KeyPool> {
    Arc::new(KeyPool::new(keys.iter().map(|k| Secret::from(*k)).collect()).unwrap())
}

pub fn quota_error() -> provider::Result<String> {
    Err(ProviderError::Upstream {
        status: 429,
        message: "RESOURCE_EXHAUSTED: quota exceeded".into(),
    })
}

pub fn overloaded_error() -> provider::Result<String> {
    Err(ProviderError::Upstream {
        status: 503,
        message: "UNAVAILABLE: The model is overloaded.".into(),
    })
}

pub fn fatal_error() -> provider::Result<String> {
    Err(ProviderError::Upstream {
        status: 400,
        message: "INVALID_ARGUMENT: API key not valid.".into(),
    })
}
