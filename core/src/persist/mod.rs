use async_trait::async_trait;
use rpc::ServerSession;
use serde::{Deserialize, Serialize};

use crate::error::SessionStoreError;

pub mod memory;

pub use memory::MemoryStore;

/// What the server keeps per session id: a pending nonce between the nonce
/// and login calls, and the established session after a successful login.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<ServerSession>,
}

impl SessionRecord {
    pub fn with_nonce(nonce: String) -> Self {
        Self {
            nonce: Some(nonce),
            session: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nonce.is_none() && self.session.is_none()
    }
}

/// Keyed session storage. Implementations must make each call atomic per key.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &str) -> Result<Option<SessionRecord>, SessionStoreError>;

    async fn save(&self, id: &str, record: SessionRecord) -> Result<(), SessionStoreError>;

    /// Remove the record. Unknown ids are not an error.
    async fn destroy(&self, id: &str) -> Result<(), SessionStoreError>;

    /// Remove and return the pending nonce in one step.
    async fn take_nonce(&self, id: &str) -> Result<Option<String>, SessionStoreError> {
        let Some(mut record) = self.load(id).await? else {
            return Ok(None);
        };
        let nonce = record.nonce.take();
        if record.is_empty() {
            self.destroy(id).await?;
        } else {
            self.save(id, record).await?;
        }
        Ok(nonce)
    }
}
