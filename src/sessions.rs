//! In-memory session store carrying per-session credentials.
//!
//! A session exists so the typed-in API key has somewhere to live between
//! requests. Entries past the TTL answer as if they never existed; lookups
//! re-check the cutoff, and every create sweeps out what already expired,
//! so the map tracks the live set.

use crate::credential::ApiKey;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub api_key: Option<ApiKey>,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

pub struct SessionStore {
    ttl_secs: i64,
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl SessionStore {
    pub fn new(ttl_secs: u64) -> Self {
        // chrono's TimeDelta counts milliseconds in an i64
        let max_secs = (i64::MAX / 1_000) as u64;
        Self {
            ttl_secs: ttl_secs.min(max_secs) as i64,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    fn cutoff(&self) -> DateTime<Utc> {
        Utc::now()
            .checked_sub_signed(Duration::seconds(self.ttl_secs))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Create a session, optionally seeded with a credential. Expired
    /// entries are pruned on the way in.
    pub async fn create(&self, api_key: Option<ApiKey>) -> Uuid {
        self.sweep().await;
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            api_key,
            created_at: now,
            last_used: now,
        };
        let id = session.id;
        self.sessions.write().await.insert(id, session);
        id
    }

    /// Look up a live session and refresh its last_used stamp.
    pub async fn touch(&self, id: Uuid) -> Option<Session> {
        let cutoff = self.cutoff();
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&id) {
            Some(session) if session.last_used > cutoff => {
                session.last_used = Utc::now();
                Some(session.clone())
            }
            Some(_) => {
                sessions.remove(&id);
                None
            }
            None => None,
        }
    }

    /// Store the credential on a live session. False means the session is
    /// unknown or expired and the caller should hand out a fresh one.
    pub async fn set_key(&self, id: Uuid, api_key: ApiKey) -> bool {
        let cutoff = self.cutoff();
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&id) {
            Some(session) if session.last_used > cutoff => {
                session.api_key = Some(api_key);
                session.last_used = Utc::now();
                true
            }
            _ => false,
        }
    }

    /// Drop entries past the TTL, returning how many went away.
    pub async fn sweep(&self) -> usize {
        let cutoff = self.cutoff();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.last_used > cutoff);
        before - sessions.len()
    }

    /// Live sessions right now, for the info endpoint.
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
