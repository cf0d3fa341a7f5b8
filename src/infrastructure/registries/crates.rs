//! crates.io registry client

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::{error_for_status, parse_registry_date, RegistryMetadataProvider, ReleaseTally};
use crate::application::errors::ProviderError;
use crate::config::HttpConfig;
use crate::domain::trust::{Dependency, Ecosystem, ReleaseMetadata};

#[derive(Debug, Deserialize)]
struct CratesDocument {
    #[serde(rename = "crate", default)]
    krate: Option<CrateInfo>,
    #[serde(default)]
    versions: Vec<CrateVersion>,
}

#[derive(Debug, Deserialize, Default)]
struct CrateInfo {
    #[serde(default)]
    downloads: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct CrateVersion {
    #[serde(default)]
    num: String,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    yanked: bool,
}

pub struct CratesRegistry {
    http: Client,
    base_url: String,
}

impl CratesRegistry {
    pub fn new(http_config: &HttpConfig) -> Result<Self, ProviderError> {
        Self::with_base_url(http_config, "https://crates.io")
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
impl RegistryMetadataProvider for CratesRegistry {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Cargo
    }

    async fn fetch(
        &self,
        dependency: &Dependency,
        cancel: &CancellationToken,
    ) -> Result<ReleaseMetadata, ProviderError> {
        let url = format!("{}/api/v1/crates/{}", self.base_url, dependency.name);
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            response = self.http.get(&url).send() => response?,
        };
        let response = error_for_status(response).await?;
        let document: CratesDocument = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let now = Utc::now();
        let mut tally = ReleaseTally::default();
        let mut version_yanked = None;
        for version in &document.versions {
            if let Some(created) = version.created_at.as_deref().and_then(parse_registry_date) {
                tally.record(created, now);
            }
            if version.num == dependency.version {
                version_yanked = Some(version.yanked);
            }
        }

        Ok(ReleaseMetadata {
            latest_release: tally.latest,
            releases_last_30d: Some(tally.last_30d),
            total_releases: Some(document.versions.len() as u32),
            // crates.io does not expose owner handles on this endpoint.
            maintainer_count: None,
            version_yanked,
            downloads: document.krate.and_then(|info| info.downloads),
            ..ReleaseMetadata::unknown(Ecosystem::Cargo, dependency.normalized_name())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn parses_versions_and_yank_status() {
        let mut server = mockito::Server::new_async().await;
        let recent = (Utc::now() - chrono::Duration::days(2)).to_rfc3339();
        let older = (Utc::now() - chrono::Duration::days(200)).to_rfc3339();
        server
            .mock("GET", "/api/v1/crates/serde")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "crate": {"downloads": 250000000u64},
                    "versions": [
                        {"num": "1.0.200", "created_at": recent, "yanked": false},
                        {"num": "1.0.199", "created_at": older, "yanked": true}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let registry = CratesRegistry::with_base_url(&HttpConfig::default(), server.url()).expect("registry");
        let dependency = Dependency::new(Ecosystem::Cargo, "serde", "1.0.199", "Cargo.lock", true);
        let metadata = registry
            .fetch(&dependency, &CancellationToken::new())
            .await
            .expect("metadata");

        assert_eq!(metadata.total_releases, Some(2));
        assert_eq!(metadata.releases_last_30d, Some(1));
        assert_eq!(metadata.version_yanked, Some(true));
        assert_eq!(metadata.downloads, Some(250000000));
        assert!(metadata.maintainer_count.is_none());
    }
}
