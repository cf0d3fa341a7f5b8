//! File-backed cache layer
//!
//! One file per key, named by the sha256 of the rendered key. Entries are
//! JSON envelopes carrying a payload checksum and expiry; anything that fails
//! validation is evicted and treated as a miss. Writes go through a
//! temporary file and a rename so readers never observe a torn entry.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::CacheKey;
use crate::application::errors::CacheError;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    key: String,
    checksum: String,
    fetched_at: i64,
    expires_at: i64,
    payload: serde_json::Value,
}

pub struct FileCacheRepository {
    directory: PathBuf,
}

impl FileCacheRepository {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.directory.join(format!("{}.json", key.file_stem()))
    }

    fn payload_checksum(payload: &serde_json::Value) -> String {
        let mut hasher = Sha256::new();
        hasher.update(payload.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Read a valid, unexpired entry; anything else is evicted.
    pub async fn get(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<serde_json::Value> {
        let path = self.entry_path(key);
        let raw = tokio::fs::read(&path).await.ok()?;
        let envelope: Envelope = match serde_json::from_slice(&raw) {
            Ok(envelope) => envelope,
            Err(error) => {
                warn!(path = %path.display(), %error, "evicting unreadable cache entry");
                self.evict(&path).await;
                return None;
            }
        };
        if envelope.key != key.render() {
            warn!(path = %path.display(), "evicting cache entry with mismatched key");
            self.evict(&path).await;
            return None;
        }
        if envelope.checksum != Self::payload_checksum(&envelope.payload) {
            warn!(path = %path.display(), "evicting corrupt cache entry");
            self.evict(&path).await;
            return None;
        }
        if envelope.expires_at <= now.timestamp() {
            debug!(key = %envelope.key, "cache entry expired");
            self.evict(&path).await;
            return None;
        }
        Some(envelope.payload)
    }

    /// Persist an entry atomically (write-then-rename).
    pub async fn set(
        &self,
        key: &CacheKey,
        payload: &serde_json::Value,
        ttl_seconds: u64,
        now: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.directory).await?;
        let envelope = Envelope {
            key: key.render(),
            checksum: Self::payload_checksum(payload),
            fetched_at: now.timestamp(),
            expires_at: now.timestamp() + ttl_seconds as i64,
            payload: payload.clone(),
        };
        let serialized = serde_json::to_vec(&envelope)?;
        let path = self.entry_path(key);
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, &serialized).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn evict(&self, path: &Path) {
        let _ = tokio::fs::remove_file(path).await;
    }
}
