//! npm registry client

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::{count_maintainers, error_for_status, parse_registry_date, ReleaseTally};
use super::RegistryMetadataProvider;
use crate::application::errors::ProviderError;
use crate::config::HttpConfig;
use crate::domain::trust::{Dependency, Ecosystem, ReleaseMetadata};

#[derive(Debug, Deserialize)]
struct NpmDocument {
    #[serde(default)]
    time: HashMap<String, String>,
    #[serde(default)]
    maintainers: Vec<NpmMaintainer>,
    #[serde(default)]
    versions: HashMap<String, NpmVersion>,
}

#[derive(Debug, Deserialize)]
struct NpmMaintainer {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct NpmVersion {
    #[serde(default)]
    deprecated: Option<serde_json::Value>,
}

pub struct NpmRegistry {
    http: Client,
    base_url: String,
}

impl NpmRegistry {
    pub fn new(http_config: &HttpConfig) -> Result<Self, ProviderError> {
        Self::with_base_url(http_config, "https://registry.npmjs.org")
    }

    pub fn with_base_url(
        http_config: &HttpConfig,
        base_url: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(http_config.timeout_seconds))
            .user_agent(concat!("rtx/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl RegistryMetadataProvider for NpmRegistry {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Npm
    }

    async fn fetch(
        &self,
        dependency: &Dependency,
        cancel: &CancellationToken,
    ) -> Result<ReleaseMetadata, ProviderError> {
        let url = format!("{}/{}", self.base_url, dependency.name);
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            response = self.http.get(&url).send() => response?,
        };
        let response = error_for_status(response).await?;
        let document: NpmDocument = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let now = Utc::now();
        let mut tally = ReleaseTally::default();
        for (version, timestamp) in &document.time {
            // The time map mixes release entries with document bookkeeping.
            if version == "created" || version == "modified" {
                continue;
            }
            if let Some(released) = parse_registry_date(timestamp) {
                tally.record(released, now);
            }
        }

        let maintainer_count = count_maintainers(
            document
                .maintainers
                .iter()
                .filter_map(|maintainer| maintainer.name.as_deref()),
        );
        let deprecated = document
            .versions
            .get(&dependency.version)
            .map(|version| version.deprecated.is_some());

        Ok(ReleaseMetadata {
            latest_release: tally.latest,
            releases_last_30d: Some(tally.last_30d),
            total_releases: Some(tally.total),
            maintainer_count: Some(maintainer_count),
            deprecated,
            ..ReleaseMetadata::unknown(Ecosystem::Npm, dependency.normalized_name())
        })
    }
}
