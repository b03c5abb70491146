use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::debug;
use tokio::sync::RwLock;

use crate::error::SessionStoreError;
use crate::persist::{SessionRecord, SessionStore};

/// How long a nonce may wait for its login.
pub const DEFAULT_NONCE_TTL: Duration = Duration::from_secs(15 * 60);

struct Entry {
    record: SessionRecord,
    saved_at: Instant,
}

impl Entry {
    /// Only records still waiting for a login expire.
    fn is_stale(&self, ttl: Duration) -> bool {
        self.record.session.is_none() && self.saved_at.elapsed() > ttl
    }
}

/// Process-local session store. Sessions are lost on restart.
///
/// Records left empty by a consumed nonce are dropped, and pending nonces
/// older than the TTL are swept on every write.
pub struct MemoryStore {
    records: RwLock<HashMap<String, Entry>>,
    nonce_ttl: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_nonce_ttl(DEFAULT_NONCE_TTL)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nonce_ttl(nonce_ttl: Duration) -> Self {
        Self {
            records: RwLock::default(),
            nonce_ttl,
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn sweep(&self, records: &mut HashMap<String, Entry>) {
        let before = records.len();
        records.retain(|_, entry| !entry.is_stale(self.nonce_ttl));
        let swept = before - records.len();
        if swept > 0 {
            debug!("dropped {swept} expired pending nonce(s)");
        }
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self, id: &str) -> Result<Option<SessionRecord>, SessionStoreError> {
        Ok(self
            .records
            .read()
            .await
            .get(id)
            .filter(|entry| !entry.is_stale(self.nonce_ttl))
            .map(|entry| entry.record.clone()))
    }

    async fn save(&self, id: &str, record: SessionRecord) -> Result<(), SessionStoreError> {
        let mut records = self.records.write().await;
        self.sweep(&mut records);
        if record.is_empty() {
            records.remove(id);
        } else {
            records.insert(
                id.to_string(),
                Entry {
                    record,
                    saved_at: Instant::now(),
                },
            );
        }
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<(), SessionStoreError> {
        self.records.write().await.remove(id);
        Ok(())
    }

    // Holds the write lock across read and clear so two concurrent logins
    // cannot both observe the same nonce.
    async fn take_nonce(&self, id: &str) -> Result<Option<String>, SessionStoreError> {
        let mut records = self.records.write().await;
        let Some(entry) = records.get_mut(id) else {
            return Ok(None);
        };
        let stale = entry.is_stale(self.nonce_ttl);
        let nonce = entry.record.nonce.take();
        if stale || entry.record.is_empty() {
            records.remove(id);
        }
        Ok(nonce.filter(|_| !stale))
    }
}
