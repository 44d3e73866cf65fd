//! The external data agent: boundary trait, Groq client, test double, and
//! the construction cache.

mod groq;
mod llm;
mod scripted;
mod traits;

pub use groq::GroqAgent;
pub use llm::{ChatMessage, LlmClient};
pub use scripted::ScriptedAgent;
pub use traits::{AgentAnswer, AgentError, AgentQuery, DataAgent};

use crate::config::Config;
use crate::credential::ApiKey;
use crate::error::Result;
use crate::table::Table;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// Build the configured agent for one (table, credential) pairing.
pub fn build_agent(config: &Config, api_key: ApiKey, table: &Table) -> Result<Arc<dyn DataAgent>> {
    match config.agent.provider.as_str() {
        "scripted" => {
            let (rows, cols) = table.shape();
            Ok(Arc::new(ScriptedAgent::new(format!(
                "La tabla tiene {} filas y {} columnas.",
                rows, cols
            ))))
        }
        _ => Ok(Arc::new(GroqAgent::new(
            &config.agent,
            api_key,
            table,
            config.table.max_prompt_bytes,
        )?)),
    }
}

/// Agent cache key: table content fingerprint plus credential fingerprint.
pub type AgentKey = (String, String);

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct AgentCacheStats {
    pub hits: u64,
    pub builds: u64,
}

/// Bounded LRU of constructed agents.
///
/// Construction embeds the whole table into the system prompt, so reusing
/// the agent across interactions with the same table and credential skips
/// that work. Either half of the key changing means a fresh build.
pub struct AgentCache {
    entries: Mutex<LruCache<AgentKey, Arc<dyn DataAgent>>>,
    hits: AtomicU64,
    builds: AtomicU64,
}

impl AgentCache {
    pub fn new(max: usize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(
                NonZeroUsize::new(max).unwrap_or(NonZeroUsize::MIN),
            )),
            hits: AtomicU64::new(0),
            builds: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> AgentCacheStats {
        AgentCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            builds: self.builds.load(Ordering::Relaxed),
        }
    }

    pub async fn get(&self, key: &AgentKey) -> Option<Arc<dyn DataAgent>> {
        let mut entries = self.entries.lock().await;
        let found = entries.get(key).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    pub async fn insert(&self, key: AgentKey, agent: Arc<dyn DataAgent>) {
        self.builds.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().await.put(key, agent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_pairing_reuses_the_agent() {
        let cache = AgentCache::new(4);
        let key: AgentKey = ("tabla-abc".into(), "clave-123".into());
        assert!(cache.get(&key).await.is_none());

        let agent: Arc<dyn DataAgent> = Arc::new(ScriptedAgent::new("hola"));
        cache.insert(key.clone(), agent).await;

        assert!(cache.get(&key).await.is_some());
        let stats = cache.stats();
        assert_eq!(stats.builds, 1);
        assert_eq!(stats.hits, 1);
    }

    #[tokio::test]
    async fn a_new_credential_is_a_different_entry() {
        let cache = AgentCache::new(4);
        let first: AgentKey = ("tabla-abc".into(), "clave-123".into());
        cache
            .insert(first.clone(), Arc::new(ScriptedAgent::new("uno")))
            .await;

        let other: AgentKey = ("tabla-abc".into(), "clave-456".into());
        assert!(cache.get(&other).await.is_none());
        assert!(cache.get(&first).await.is_some());
    }
}
