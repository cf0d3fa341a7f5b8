//! Shared fixtures and builders for integration tests

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::{json, Value};

use rtx::application::Orchestrator;
use rtx::config::{Config, GithubConfig, HttpConfig, OsvConfig};
use rtx::domain::trust::{Dependency, Ecosystem};
use rtx::infrastructure::api_clients::{AdvisoryProvider, GhsaClient, OsvClient};
use rtx::infrastructure::cache::CacheService;
use rtx::infrastructure::registries::{
    crates::CratesRegistry, npm::NpmRegistry, pypi::PypiRegistry, MetadataClient,
    RegistryMetadataProvider,
};

/// Configuration tuned for tests: no retries, short timeouts.
pub fn test_config() -> Config {
    Config {
        http: HttpConfig {
            timeout_seconds: 5,
            retries: 0,
            backoff_initial_ms: 1,
            backoff_max_ms: 2,
        },
        ..Config::default()
    }
}

pub fn dependency(ecosystem: Ecosystem, name: &str, version: &str) -> Dependency {
    let manifest = match ecosystem {
        Ecosystem::Npm => "package-lock.json",
        Ecosystem::PyPI => "requirements.txt",
        Ecosystem::Cargo => "Cargo.lock",
        _ => "manifest",
    };
    Dependency::new(ecosystem, name, version, manifest, true)
}

/// Build an orchestrator whose OSV client and registry clients all point at
/// the given mock server. GitHub is enabled only when a token is supplied.
pub fn orchestrator_against(server_url: &str, config: &Config, github_token: Option<&str>) -> Orchestrator {
    let cache = Arc::new(CacheService::in_memory());

    let osv = OsvClient::new(
        &OsvConfig {
            base_url: server_url.to_string(),
            ..config.providers.osv.clone()
        },
        &config.http,
        cache.clone(),
    )
    .expect("osv client");
    let ghsa = GhsaClient::new(
        &GithubConfig {
            graphql_url: format!("{server_url}/graphql"),
            token: github_token.map(String::from),
            // Keep tests hermetic: never fall back to ambient GITHUB_TOKEN.
            disabled: github_token.is_none(),
            ..config.providers.github.clone()
        },
        &config.http,
        cache.clone(),
    )
    .expect("ghsa client");
    let providers: Vec<Arc<dyn AdvisoryProvider>> = vec![Arc::new(osv), Arc::new(ghsa)];

    let mut registries: HashMap<Ecosystem, Arc<dyn RegistryMetadataProvider>> = HashMap::new();
    registries.insert(
        Ecosystem::Npm,
        Arc::new(NpmRegistry::with_base_url(&config.http, server_url).expect("npm registry")),
    );
    registries.insert(
        Ecosystem::PyPI,
        Arc::new(PypiRegistry::with_base_url(&config.http, server_url).expect("pypi registry")),
    );
    registries.insert(
        Ecosystem::Cargo,
        Arc::new(CratesRegistry::with_base_url(&config.http, server_url).expect("crates registry")),
    );
    let metadata = Arc::new(MetadataClient::new(registries, cache, config));

    Orchestrator::new(providers, metadata, config)
}

/// An OSV batch response with no findings for `count` queries.
pub fn osv_empty_results(count: usize) -> Value {
    json!({ "results": (0..count).map(|_| json!({"vulns": []})).collect::<Vec<_>>() })
}

/// Healthy npm registry document: several maintainers, steady releases,
/// latest release fresh enough to avoid every metadata signal.
pub fn npm_healthy_document() -> Value {
    let now = Utc::now();
    json!({
        "time": {
            "created": "2015-01-01T00:00:00Z",
            "modified": (now - Duration::days(10)).to_rfc3339(),
            "1.0.0": (now - Duration::days(700)).to_rfc3339(),
            "1.1.0": (now - Duration::days(300)).to_rfc3339(),
            "1.2.0": (now - Duration::days(120)).to_rfc3339(),
            "1.3.0": (now - Duration::days(10)).to_rfc3339()
        },
        "maintainers": [{"name": "alice"}, {"name": "bob"}, {"name": "carol"}],
        "versions": {}
    })
}

/// Healthy PyPI document with a configurable release history.
pub fn pypi_document(latest_days_ago: i64, total_releases: usize, maintainers: &[&str]) -> Value {
    let now = Utc::now();
    let mut releases = serde_json::Map::new();
    for index in 0..total_releases {
        let uploaded = now - Duration::days(latest_days_ago + (index as i64) * 90);
        releases.insert(
            format!("1.{index}.0"),
            json!([{"upload_time_iso_8601": uploaded.to_rfc3339(), "yanked": false}]),
        );
    }
    json!({
        "info": {
            "author": maintainers.first().copied().unwrap_or(""),
            "maintainer": maintainers.get(1).copied()
        },
        "releases": releases
    })
}

/// Healthy crates.io document.
pub fn crates_healthy_document(version: &str) -> Value {
    let now = Utc::now();
    json!({
        "crate": {"downloads": 100_000_000u64},
        "versions": [
            {"num": version, "created_at": (now - Duration::days(20)).to_rfc3339(), "yanked": false},
            {"num": "0.9.0", "created_at": (now - Duration::days(300)).to_rfc3339(), "yanked": false},
            {"num": "0.8.0", "created_at": (now - Duration::days(500)).to_rfc3339(), "yanked": false}
        ]
    })
}
