//! Deterministic in-process agent for tests and offline runs.

use super::traits::{AgentAnswer, AgentError, AgentQuery, DataAgent};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Serves queued replies FIFO, then a fixed fallback line; counts every call.
pub struct ScriptedAgent {
    replies: Mutex<VecDeque<Value>>,
    failures: Mutex<VecDeque<String>>,
    fallback: String,
    calls: AtomicU64,
}

impl ScriptedAgent {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            failures: Mutex::new(VecDeque::new()),
            fallback: fallback.into(),
            calls: AtomicU64::new(0),
        }
    }

    /// Queue one reply value, served before the fallback kicks in.
    pub fn push_reply(&self, value: Value) {
        self.replies.lock().expect("replies lock").push_back(value);
    }

    /// Make one upcoming call fail instead of answering.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.failures
            .lock()
            .expect("failures lock")
            .push_back(message.into());
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DataAgent for ScriptedAgent {
    async fn ask(&self, _query: &AgentQuery) -> Result<AgentAnswer, AgentError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(message) = self.failures.lock().expect("failures lock").pop_front() {
            return Err(AgentError::Transport(message));
        }
        let next = self.replies.lock().expect("replies lock").pop_front();
        Ok(match next {
            Some(value) => AgentAnswer::from_value(value),
            None => AgentAnswer::Structured {
                text: self.fallback.clone(),
            },
        })
    }

    fn provider(&self) -> &'static str {
        "scripted"
    }
}
