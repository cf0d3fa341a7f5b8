//! Metadata client
//!
//! Multiplexes the per-ecosystem registry clients and layers the shared
//! cache (single-flight per key), the retry budget, and typosquat candidate
//! selection on top. Ecosystems with no registry client resolve to unknown
//! metadata without touching the network.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{PopularNameIndex, RegistryMetadataProvider};
use crate::application::errors::ProviderError;
use crate::config::Config;
use crate::domain::trust::{Dependency, Ecosystem, ReleaseMetadata};
use crate::infrastructure::cache::{CacheKey, CacheService};
use crate::infrastructure::registries::{crates::CratesRegistry, npm::NpmRegistry, pypi::PypiRegistry, rubygems::RubyGemsRegistry};
use crate::infrastructure::resilience::{retry_with_backoff, RetryConfig};

pub struct MetadataClient {
    providers: HashMap<Ecosystem, Arc<dyn RegistryMetadataProvider>>,
    cache: Arc<CacheService>,
    popular: &'static PopularNameIndex,
    retry: RetryConfig,
    limiter: Arc<Semaphore>,
    typosquat_max_distance: u32,
}

impl MetadataClient {
    /// Client with the default registry set for every supported ecosystem.
    pub fn from_config(config: &Config, cache: Arc<CacheService>) -> Result<Self, ProviderError> {
        let mut providers: HashMap<Ecosystem, Arc<dyn RegistryMetadataProvider>> = HashMap::new();
        providers.insert(Ecosystem::PyPI, Arc::new(PypiRegistry::new(&config.http)?));
        providers.insert(Ecosystem::Npm, Arc::new(NpmRegistry::new(&config.http)?));
        providers.insert(Ecosystem::Cargo, Arc::new(CratesRegistry::new(&config.http)?));
        providers.insert(
            Ecosystem::RubyGems,
            Arc::new(RubyGemsRegistry::new(&config.http)?),
        );
        Ok(Self::new(providers, cache, config))
    }

    pub fn new(
        providers: HashMap<Ecosystem, Arc<dyn RegistryMetadataProvider>>,
        cache: Arc<CacheService>,
        config: &Config,
    ) -> Self {
        Self {
            providers,
            cache,
            popular: PopularNameIndex::bundled(),
            retry: RetryConfig::from_http(&config.http),
            limiter: Arc::new(Semaphore::new(config.analysis.registry_concurrency)),
            typosquat_max_distance: config.policy.typosquat_max_distance,
        }
    }

    /// Source tag used in cache keys and the report's sources section.
    pub fn source_tag(ecosystem: Ecosystem) -> String {
        format!("registry:{ecosystem}")
    }

    /// Whether a registry client exists for this ecosystem.
    pub fn supports(&self, ecosystem: Ecosystem) -> bool {
        self.providers.contains_key(&ecosystem)
    }

    fn cache_key(&self, dependency: &Dependency) -> CacheKey {
        CacheKey::new(
            Self::source_tag(dependency.ecosystem),
            dependency.ecosystem,
            dependency.normalized_name(),
            Some(dependency.version.clone()),
        )
    }

    /// Fetch release metadata for one dependency.
    ///
    /// `Ok` carries real or unknown metadata (unknown for unsupported
    /// ecosystems and absent packages); `Err` means the registry could not
    /// answer and the dependency should carry a `source_unavailable` mark.
    pub async fn fetch(
        &self,
        dependency: &Dependency,
        cancel: &CancellationToken,
    ) -> Result<ReleaseMetadata, ProviderError> {
        let normalized = dependency.normalized_name();
        let Some(provider) = self.providers.get(&dependency.ecosystem) else {
            debug!(ecosystem = %dependency.ecosystem, "no registry client; metadata unknown");
            return Ok(self.decorate(ReleaseMetadata::unknown(dependency.ecosystem, normalized)));
        };

        let key = self.cache_key(dependency);
        if self.cache.is_known_absent(&key).await {
            return Ok(self.decorate(ReleaseMetadata::unknown(dependency.ecosystem, normalized)));
        }

        let fetched = self
            .cache
            .get_or_fetch::<ReleaseMetadata, _, _>(&key, || async {
                let _permit = self
                    .limiter
                    .acquire()
                    .await
                    .map_err(|_| ProviderError::Cancelled)?;
                if cancel.is_cancelled() {
                    return Err(ProviderError::Cancelled);
                }
                let metadata =
                    retry_with_backoff(&self.retry, || provider.fetch(dependency, cancel)).await?;
                Ok(self.decorate(metadata))
            })
            .await;

        match fetched {
            Ok(metadata) => Ok(metadata),
            Err(ProviderError::Http { status: 404, .. }) => {
                // Package absent from the registry: a definite answer, not a
                // provider failure. Remembered only when negative caching is
                // turned on.
                self.cache.remember_absent(&key).await;
                Ok(self.decorate(ReleaseMetadata::unknown(dependency.ecosystem, normalized)))
            }
            Err(error) => Err(error),
        }
    }

    /// Attach the popularity rank and typosquat candidates.
    fn decorate(&self, mut metadata: ReleaseMetadata) -> ReleaseMetadata {
        metadata.popularity_rank = self
            .popular
            .rank_of(metadata.ecosystem, &metadata.canonical_name);
        metadata.close_names = self.popular.candidates(
            metadata.ecosystem,
            &metadata.canonical_name,
            self.typosquat_max_distance,
        );
        metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::registries::pypi::PypiRegistry;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn client_with_pypi(server_url: &str, config: &Config) -> MetadataClient {
        let mut providers: HashMap<Ecosystem, Arc<dyn RegistryMetadataProvider>> = HashMap::new();
        providers.insert(
            Ecosystem::PyPI,
            Arc::new(
                PypiRegistry::with_base_url(&config.http, server_url).expect("registry"),
            ),
        );
        MetadataClient::new(providers, Arc::new(CacheService::in_memory()), config)
    }

    #[tokio::test]
    async fn unsupported_ecosystem_is_unknown_without_network() {
        let config = Config::default();
        let client = client_with_pypi("http://127.0.0.1:1", &config);
        let dependency = Dependency::new(Ecosystem::Go, "golang.org/x/text", "0.3.7", "go.mod", true);
        let metadata = client
            .fetch(&dependency, &CancellationToken::new())
            .await
            .expect("metadata");
        assert!(metadata.latest_release.is_none());
        assert!(metadata.maintainer_count.is_none());
    }

    #[tokio::test]
    async fn absent_package_resolves_to_unknown() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/pypi/ghost/json")
            .with_status(404)
            .create_async()
            .await;
        let config = Config {
            http: crate::config::HttpConfig {
                retries: 0,
                ..Default::default()
            },
            ..Config::default()
        };
        let client = client_with_pypi(&server.url(), &config);
        let dependency = Dependency::new(Ecosystem::PyPI, "ghost", "1.0.0", "requirements.txt", true);
        let metadata = client
            .fetch(&dependency, &CancellationToken::new())
            .await
            .expect("metadata");
        assert!(metadata.latest_release.is_none());
    }

    #[tokio::test]
    async fn transport_failure_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/pypi/flaky/json")
            .with_status(500)
            .create_async()
            .await;
        let config = Config {
            http: crate::config::HttpConfig {
                retries: 0,
                ..Default::default()
            },
            ..Config::default()
        };
        let client = client_with_pypi(&server.url(), &config);
        let dependency = Dependency::new(Ecosystem::PyPI, "flaky", "1.0.0", "requirements.txt", true);
        assert!(client
            .fetch(&dependency, &CancellationToken::new())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn concurrent_fetches_for_one_key_hit_upstream_once() {
        let mut server = mockito::Server::new_async().await;
        let hits = Arc::new(AtomicU32::new(0));
        let mock = server
            .mock("GET", "/pypi/requests/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"info": {}, "releases": {}}).to_string())
            .expect(1)
            .create_async()
            .await;

        let config = Config::default();
        let client = Arc::new(client_with_pypi(&server.url(), &config));
        let dependency =
            Dependency::new(Ecosystem::PyPI, "requests", "2.31.0", "requirements.txt", true);

        let mut handles = Vec::new();
        for _ in 0..6 {
            let client = client.clone();
            let dependency = dependency.clone();
            let hits = hits.clone();
            handles.push(tokio::spawn(async move {
                let result = client.fetch(&dependency, &CancellationToken::new()).await;
                hits.fetch_add(result.is_ok() as u32, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.expect("join");
        }
        assert_eq!(hits.load(Ordering::SeqCst), 6);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn typosquat_candidates_are_attached() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/pypi/reqursts/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"info": {}, "releases": {}}).to_string())
            .create_async()
            .await;

        let config = Config::default();
        let client = client_with_pypi(&server.url(), &config);
        let dependency =
            Dependency::new(Ecosystem::PyPI, "reqursts", "1.0.0", "requirements.txt", true);
        let metadata = client
            .fetch(&dependency, &CancellationToken::new())
            .await
            .expect("metadata");
        assert_eq!(metadata.close_names[0].name, "requests");
    }
}
