//! Error types shared across the application and infrastructure layers

use thiserror::Error;

/// Errors surfaced by advisory and registry providers.
///
/// Providers translate these into per-dependency `source_unavailable`
/// annotations; they never abort a run on their own.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("authentication rejected by upstream")]
    Auth,

    #[error("malformed upstream payload: {0}")]
    Malformed(String),

    #[error("cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Duplicate an error for delivery to every waiter of a coalesced fetch.
    /// `reqwest::Error` is not clonable, so transport errors degrade to their
    /// message; callers only branch on the HTTP variants.
    pub fn clone_for_waiters(&self) -> ProviderError {
        match self {
            ProviderError::Http { status, message } => ProviderError::Http {
                status: *status,
                message: message.clone(),
            },
            ProviderError::Network(error) => ProviderError::Malformed(format!("network error: {error}")),
            ProviderError::Timeout { seconds } => ProviderError::Timeout { seconds: *seconds },
            ProviderError::Auth => ProviderError::Auth,
            ProviderError::Malformed(message) => ProviderError::Malformed(message.clone()),
            ProviderError::Cancelled => ProviderError::Cancelled,
        }
    }

    /// Timeouts, transport failures, 5xx and 429 responses are worth a retry;
    /// everything else is terminal for the attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Network(_) | ProviderError::Timeout { .. } => true,
            ProviderError::Http { status, .. } => *status >= 500 || *status == 429,
            ProviderError::Auth | ProviderError::Malformed(_) | ProviderError::Cancelled => false,
        }
    }
}

/// Errors raised by the cache layer.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while scanning project manifests.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("unknown package manager(s): {0}")]
    UnknownManagers(String),

    #[error("no supported manifests found under {0}")]
    NoManifests(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },
}

/// Errors raised while rendering or persisting reports.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("{0}")]
    Rendering(String),

    #[error("failed to write report to {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid report JSON: {0}")]
    Json(#[from] serde_json::Error),
}
