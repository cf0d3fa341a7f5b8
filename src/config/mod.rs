//! Configuration management
//!
//! Configuration lives in an `rtx.toml` document under the `[rtx]` table and
//! is overridable per key by environment variables with the `RTX__` prefix
//! (double-underscore separator), e.g. `RTX__HTTP__TIMEOUT_SECONDS=10`.
//! Unknown keys under `[rtx]` are ignored with a warning.

pub mod validation;

pub use validation::{Validate, ValidationError};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

const KNOWN_SECTIONS: &[&str] = &[
    "cache",
    "http",
    "providers",
    "analysis",
    "policy",
    "logging",
];

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub http: HttpConfig,
    pub providers: ProvidersConfig,
    pub analysis: AnalysisConfig,
    pub policy: PolicyThresholds,
    pub logging: LoggingConfig,
}

/// Cache bounds and persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory for the persistent cache; in-memory only when unset.
    pub directory: Option<PathBuf>,
    /// Maximum entries retained per source before eviction.
    pub max_entries_per_source: u64,
    /// Default entry TTL in seconds.
    pub ttl_seconds: u64,
    /// Per-source TTL overrides keyed by source tag, e.g. `"osv.dev" = 3600`.
    pub source_ttl_seconds: std::collections::BTreeMap<String, u64>,
    /// TTL for cached "not found" answers; negative caching is off when unset.
    pub negative_ttl_seconds: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: None,
            max_entries_per_source: 512,
            ttl_seconds: 6 * 3600,
            source_ttl_seconds: std::collections::BTreeMap::new(),
            negative_ttl_seconds: None,
        }
    }
}

/// Shared HTTP client behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    /// Retries after the initial attempt, with exponential backoff and jitter.
    pub retries: u32,
    pub backoff_initial_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 5,
            retries: 2,
            backoff_initial_ms: 500,
            backoff_max_ms: 10_000,
        }
    }
}

/// External advisory source configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub osv: OsvConfig,
    pub github: GithubConfig,
}

/// OSV batch vulnerability service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OsvConfig {
    pub base_url: String,
    pub batch_size: usize,
    pub max_concurrency: usize,
    pub disabled: bool,
}

impl Default for OsvConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.osv.dev".to_string(),
            batch_size: 18,
            max_concurrency: 4,
            disabled: false,
        }
    }
}

/// GitHub Security Advisories GraphQL API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub graphql_url: String,
    /// Token; `RTX_GITHUB_TOKEN` or `GITHUB_TOKEN` are consulted when unset.
    pub token: Option<String>,
    pub max_concurrency: usize,
    pub disabled: bool,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            graphql_url: "https://api.github.com/graphql".to_string(),
            token: None,
            max_concurrency: 6,
            disabled: false,
        }
    }
}

impl GithubConfig {
    /// Resolve the effective token from config or environment.
    pub fn resolve_token(&self) -> Option<String> {
        self.token
            .clone()
            .or_else(|| std::env::var("RTX_GITHUB_TOKEN").ok())
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .filter(|token| !token.is_empty())
    }
}

/// Orchestrator scheduling limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Ceiling across all provider calls, regardless of source.
    pub global_concurrency: usize,
    /// Ceiling for registry metadata fetches (shares the global ceiling).
    pub registry_concurrency: usize,
    /// Optional wall-clock budget for a whole run.
    pub deadline_seconds: Option<u64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            global_concurrency: 16,
            registry_concurrency: 8,
            deadline_seconds: None,
        }
    }
}

/// Thresholds consumed by the signal deriver. Read-only after startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyThresholds {
    pub abandonment_threshold_days: i64,
    pub churn_high_threshold: u32,
    pub churn_medium_threshold: u32,
    pub bus_factor_zero_threshold: u32,
    pub bus_factor_one_threshold: u32,
    pub low_maturity_threshold: u32,
    pub typosquat_max_distance: u32,
}

impl Default for PolicyThresholds {
    fn default() -> Self {
        Self {
            abandonment_threshold_days: 540,
            churn_high_threshold: 10,
            churn_medium_threshold: 5,
            bus_factor_zero_threshold: 0,
            bus_factor_one_threshold: 1,
            low_maturity_threshold: 3,
            typosquat_max_distance: 2,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `rtx.toml` (if present) and the environment.
    pub fn load() -> Result<Self, ConfigLoadError> {
        Self::load_from(Path::new("rtx.toml"))
    }

    /// Load configuration from a specific TOML document.
    pub fn load_from(path: &Path) -> Result<Self, ConfigLoadError> {
        let mut builder = config::Config::builder();

        if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
                path: path.display().to_string(),
                source,
            })?;
            let document: toml::Value = toml::from_str(&raw)?;
            if let Some(table) = document.get("rtx").and_then(|value| value.as_table()) {
                for key in table.keys() {
                    if !KNOWN_SECTIONS.contains(&key.as_str()) {
                        warn!(key = %key, "ignoring unknown configuration key under [rtx]");
                    }
                }
                let subtree = toml::to_string(table)?;
                builder = builder
                    .add_source(config::File::from_str(&subtree, config::FileFormat::Toml));
            }
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("RTX")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration document error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("configuration serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("configuration validation error: {0}")]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_thresholds() {
        let config = Config::default();
        assert_eq!(config.policy.abandonment_threshold_days, 540);
        assert_eq!(config.policy.churn_high_threshold, 10);
        assert_eq!(config.policy.churn_medium_threshold, 5);
        assert_eq!(config.policy.low_maturity_threshold, 3);
        assert_eq!(config.policy.typosquat_max_distance, 2);
        assert_eq!(config.analysis.global_concurrency, 16);
        assert_eq!(config.cache.max_entries_per_source, 512);
        assert_eq!(config.http.timeout_seconds, 5);
        assert_eq!(config.http.retries, 2);
        assert!(config.cache.negative_ttl_seconds.is_none());
    }

    #[test]
    fn loads_values_from_rtx_table() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("rtx.toml");
        let mut file = std::fs::File::create(&path).expect("create config");
        writeln!(
            file,
            "[rtx.http]\ntimeout_seconds = 9\n\n[rtx.policy]\nchurn_high_threshold = 20\n"
        )
        .expect("write config");

        let config = Config::load_from(&path).expect("load config");
        assert_eq!(config.http.timeout_seconds, 9);
        assert_eq!(config.policy.churn_high_threshold, 20);
        // Untouched keys keep defaults.
        assert_eq!(config.policy.churn_medium_threshold, 5);
    }

    #[test]
    fn missing_document_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config::load_from(&dir.path().join("absent.toml")).expect("load config");
        assert_eq!(config.analysis.global_concurrency, 16);
    }

    #[test]
    fn invalid_values_fail_validation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("rtx.toml");
        std::fs::write(&path, "[rtx.http]\ntimeout_seconds = 0\n").expect("write config");
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigLoadError::Validation(_))
        ));
    }
}
