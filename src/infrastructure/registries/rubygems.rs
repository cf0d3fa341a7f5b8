//! RubyGems registry client

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
struct GemVersion {
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    built_at: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct GemDetail {
    #[serde(default)]
    authors: Option<String>,
    #[serde(default)]
    downloads: Option<u64>,
}

pub struct RubyGemsRegistry {
    http: Client,
    base_url: String,
}

impl RubyGemsRegistry {
    pub fn new(http_config: &HttpConfig) -> Result<Self, ProviderError> {
        Self::with_base_url(http_config, "https://rubygems.org")
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
impl RegistryMetadataProvider for RubyGemsRegistry {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::RubyGems
    }

    async fn fetch(
        &self,
        dependency: &Dependency,
        cancel: &CancellationToken,
    ) -> Result<ReleaseMetadata, ProviderError> {
        let versions_url = format!("{}/api/v1/versions/{}.json", self.base_url, dependency.name);
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            response = self.http.get(&versions_url).send() => response?,
        };
        let response = error_for_status(response).await?;
        let versions: Vec<GemVersion> = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let now = Utc::now();
        let mut tally = ReleaseTally::default();
        for version in &versions {
            let created = version
                .created_at
                .as_deref()
                .or(version.built_at.as_deref())
                .and_then(parse_registry_date);
            if let Some(created) = created {
                tally.record(created, now);
            }
        }

        // Authors live on the gem detail document; its absence only loses
        // the maintainer signal.
        let detail_url = format!("{}/api/v1/gems/{}.json", self.base_url, dependency.name);
        let detail: GemDetail = match self.http.get(&detail_url).send().await {
            Ok(response) if response.status().is_success() => {
                response.json().await.unwrap_or_default()
            }
            _ => GemDetail::default(),
        };
        let maintainer_count = detail
            .authors
            .as_deref()
            .map(|authors| count_maintainers(authors.split(',')));

        Ok(ReleaseMetadata {
            latest_release: tally.latest,
            releases_last_30d: Some(tally.last_30d),
            total_releases: Some(tally.total),
            maintainer_count,
            downloads: detail.downloads,
            ..ReleaseMetadata::unknown(Ecosystem::RubyGems, dependency.normalized_name())
        })
    }
}
