//! Provider result cache
//!
//! A keyed cache shared by every provider. Keys are content-addressed over
//! `(source, ecosystem, name, version-or-wildcard)`; the in-memory layer is
//! bounded per source and coalesces concurrent misses into a single upstream
//! fetch, and an optional file layer persists entries across runs with
//! checksum validation and atomic writes.

pub mod file_cache;
pub mod service;

pub use file_cache::FileCacheRepository;
pub use service::CacheService;

use sha2::{Digest, Sha256};

use crate::domain::trust::Ecosystem;

/// Cache key for one provider query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub source: String,
    pub ecosystem: Ecosystem,
    pub name: String,
    /// `None` caches a per-package answer shared across versions.
    pub version: Option<String>,
}

impl CacheKey {
    pub fn new(
        source: impl Into<String>,
        ecosystem: Ecosystem,
        name: impl Into<String>,
        version: Option<String>,
    ) -> Self {
        Self {
            source: source.into(),
            ecosystem,
            name: name.into(),
            version,
        }
    }

    /// Canonical string form of the key.
    pub fn render(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.source,
            self.ecosystem,
            self.name,
            self.version.as_deref().unwrap_or("*")
        )
    }

    /// Stable filename stem for the on-disk layer.
    pub fn file_stem(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.render().as_bytes());
        hex::encode(hasher.finalize())
    }
}
