//! PyPI registry client

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::{count_maintainers, error_for_status, parse_registry_date, ReleaseTally};
use crate::application::errors::ProviderError;
use crate::config::HttpConfig;
use crate::domain::trust::{Dependency, Ecosystem, ReleaseMetadata};
use super::RegistryMetadataProvider;

#[derive(Debug, Deserialize)]
struct PypiDocument {
    #[serde(default)]
    info: PypiInfo,
    #[serde(default)]
    releases: HashMap<String, Vec<PypiFile>>,
}

#[derive(Debug, Deserialize, Default)]
struct PypiInfo {
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    maintainer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PypiFile {
    #[serde(default)]
    upload_time_iso_8601: Option<String>,
    #[serde(default)]
    upload_time: Option<String>,
    #[serde(default)]
    yanked: bool,
}

pub struct PypiRegistry {
    http: Client,
    base_url: String,
}

impl PypiRegistry {
    pub fn new(http_config: &HttpConfig) -> Result<Self, ProviderError> {
        Self::with_base_url(http_config, "https://pypi.org")
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
impl RegistryMetadataProvider for PypiRegistry {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::PyPI
    }

    async fn fetch(
        &self,
        dependency: &Dependency,
        cancel: &CancellationToken,
    ) -> Result<ReleaseMetadata, ProviderError> {
        let url = format!("{}/pypi/{}/json", self.base_url, dependency.name);
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            response = self.http.get(&url).send() => response?,
        };
        let response = error_for_status(response).await?;
        let document: PypiDocument = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let now = Utc::now();
        let mut tally = ReleaseTally::default();
        let mut version_yanked = None;
        for (version, files) in &document.releases {
            if files.is_empty() {
                continue;
            }
            let uploaded = files
                .iter()
                .filter_map(|file| {
                    file.upload_time_iso_8601
                        .as_deref()
                        .or(file.upload_time.as_deref())
                })
                .filter_map(parse_registry_date)
                .max();
            if let Some(uploaded) = uploaded {
                tally.record(uploaded, now);
            }
            if *version == dependency.version {
                version_yanked = Some(files.iter().all(|file| file.yanked));
            }
        }

        let maintainers = [
            document.info.author.as_deref(),
            document.info.maintainer.as_deref(),
        ];
        let maintainer_count = count_maintainers(maintainers.into_iter().flatten());

        Ok(ReleaseMetadata {
            latest_release: tally.latest,
            releases_last_30d: Some(tally.last_30d),
            total_releases: Some(tally.total),
            maintainer_count: (maintainer_count > 0).then_some(maintainer_count),
            version_yanked,
            ..ReleaseMetadata::unknown(Ecosystem::PyPI, dependency.normalized_name())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn requirements_dep(name: &str, version: &str) -> Dependency {
        Dependency::new(Ecosystem::PyPI, name, version, "requirements.txt", true)
    }

    #[tokio::test]
    async fn parses_release_history() {
        let mut server = mockito::Server::new_async().await;
        let old = (Utc::now() - chrono::Duration::days(1000)).to_rfc3339();
        let older = (Utc::now() - chrono::Duration::days(1400)).to_rfc3339();
        server
            .mock("GET", "/pypi/oldlib/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "info": {"author": "Sole Maintainer", "maintainer": null},
                    "releases": {
                        "1.0.0": [{"upload_time_iso_8601": old, "yanked": false}],
                        "0.9.0": [{"upload_time_iso_8601": older, "yanked": false}]
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let registry = PypiRegistry::with_base_url(&HttpConfig::default(), server.url()).expect("registry");
        let metadata = registry
            .fetch(&requirements_dep("oldlib", "1.0.0"), &CancellationToken::new())
            .await
            .expect("metadata");

        assert_eq!(metadata.total_releases, Some(2));
        assert_eq!(metadata.releases_last_30d, Some(0));
        assert_eq!(metadata.maintainer_count, Some(1));
        assert_eq!(metadata.version_yanked, Some(false));
        let age = Utc::now() - metadata.latest_release.expect("latest");
        assert!(age.num_days() >= 999);
    }

    #[tokio::test]
    async fn missing_package_is_a_404() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/pypi/ghost/json")
            .with_status(404)
            .create_async()
            .await;

        let registry = PypiRegistry::with_base_url(&HttpConfig::default(), server.url()).expect("registry");
        let error = registry
            .fetch(&requirements_dep("ghost", "1.0.0"), &CancellationToken::new())
            .await
            .expect_err("404");
        assert!(matches!(error, ProviderError::Http { status: 404, .. }));
    }
}
