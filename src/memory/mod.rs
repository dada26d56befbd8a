//! Session transcript memory
//!
//! Append-only record of each chat session's questions and answers. The
//! HTTP layer reads recent turns from it as context and writes to it after
//! every query; the collaboration core never touches it.

pub mod store;

pub use store::{InMemoryTranscriptStore, PostgresTranscriptStore, TranscriptEntry, TranscriptRole};

use crate::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[async_trait]
pub trait TranscriptStore: Send + Sync {
    fn backend(&self) -> &'static str;

    /// Up to `limit` most recent entries, oldest first.
    async fn load_recent(&self, session: Uuid, limit: usize) -> Result<Vec<TranscriptEntry>>;

    async fn append(&self, session: Uuid, entry: TranscriptEntry) -> Result<()>;
}

/// Session ids that are not UUIDs map to a UUID derived from their SHA-256.
pub fn session_key(session_id: &str) -> Uuid {
    if let Ok(id) = Uuid::parse_str(session_id) {
        return id;
    }
    let id = session_id.strip_prefix("session_").unwrap_or(session_id);
    if let Ok(id) = Uuid::parse_str(id) {
        return id;
    }

    let hash = Sha256::digest(session_id.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);
    Uuid::from_bytes(bytes)
}

/// Postgres when a database URL is configured and the pool builds, otherwise in-memory.
pub fn build_transcript_store(database_url: Option<&str>) -> Arc<dyn TranscriptStore> {
    if let Some(url) = database_url {
        match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(url)
        {
            Ok(pool) => {
                info!("Transcript store backend: postgres");
                return Arc::new(PostgresTranscriptStore::new(pool));
            }
            Err(error) => {
                warn!(
                    "Failed to initialize postgres transcript store, falling back to in-memory: {}",
                    error
                );
            }
        }
    }

    info!("Transcript store backend: in-memory");
    Arc::new(InMemoryTranscriptStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_key_is_stable() {
        assert_eq!(session_key("chat-42"), session_key("chat-42"));
        assert_ne!(session_key("chat-42"), session_key("chat-43"));
    }

    #[test]
    fn test_uuid_session_ids_pass_through() {
        let id = Uuid::new_v4();
        assert_eq!(session_key(&id.to_string()), id);
        assert_eq!(session_key(&format!("session_{}", id)), id);
    }

    #[test]
    fn test_no_database_url_uses_memory() {
        assert_eq!(build_transcript_store(None).backend(), "in-memory");
    }
}
