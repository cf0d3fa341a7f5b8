//! GitHub Security Advisories GraphQL client

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::traits::{AdvisoryProvider, BatchOutcome};
use crate::application::errors::ProviderError;
use crate::config::{GithubConfig, HttpConfig};
use crate::domain::trust::{Advisory, Dependency, Ecosystem, Severity, Version, VersionRange};
use crate::infrastructure::cache::{CacheKey, CacheService};
use crate::infrastructure::resilience::{retry_with_backoff, RetryConfig};

pub const GITHUB_SOURCE: &str = "github";

const VULNERABILITIES_QUERY: &str = r#"
query($ecosystem: SecurityAdvisoryEcosystem!, $package: String!) {
  securityVulnerabilities(first: 20, ecosystem: $ecosystem, package: $package) {
    nodes {
      advisory {
        ghsaId
        summary
        severity
        withdrawnAt
        references { url }
      }
      severity
      vulnerableVersionRange
      firstPatchedVersion { identifier }
    }
  }
}
"#;

#[derive(Debug, Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<QueryData>,
    #[serde(default)]
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    #[serde(rename = "securityVulnerabilities")]
    security_vulnerabilities: Option<VulnerabilityConnection>,
}

#[derive(Debug, Deserialize, Default)]
struct VulnerabilityConnection {
    #[serde(default)]
    nodes: Vec<VulnerabilityNode>,
}

#[derive(Debug, Deserialize)]
struct VulnerabilityNode {
    advisory: Option<AdvisoryNode>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(rename = "vulnerableVersionRange", default)]
    vulnerable_version_range: Option<String>,
    #[serde(rename = "firstPatchedVersion", default)]
    first_patched_version: Option<FirstPatchedVersion>,
}

#[derive(Debug, Deserialize)]
struct AdvisoryNode {
    #[serde(rename = "ghsaId")]
    ghsa_id: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    severity: Option<String>,
    #[serde(rename = "withdrawnAt", default)]
    withdrawn_at: Option<String>,
    #[serde(default)]
    references: Vec<Reference>,
}

#[derive(Debug, Deserialize)]
struct Reference {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FirstPatchedVersion {
    identifier: String,
}

/// Client for GitHub's security advisory GraphQL endpoint.
///
/// Requires a token; an authentication rejection disables the provider for
/// the remainder of the run rather than failing it.
pub struct GhsaClient {
    http: Client,
    graphql_url: String,
    token: Option<String>,
    cache: Arc<CacheService>,
    limiter: Arc<Semaphore>,
    retry: RetryConfig,
    disabled: bool,
    auth_failed: AtomicBool,
    auth_warned: AtomicBool,
}

impl GhsaClient {
    pub fn new(
        config: &GithubConfig,
        http: &HttpConfig,
        cache: Arc<CacheService>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(http.timeout_seconds))
            .user_agent(concat!("rtx/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http: client,
            graphql_url: config.graphql_url.clone(),
            token: config.resolve_token(),
            cache,
            limiter: Arc::new(Semaphore::new(config.max_concurrency)),
            retry: RetryConfig::from_http(http),
            disabled: config.disabled,
            auth_failed: AtomicBool::new(false),
            auth_warned: AtomicBool::new(false),
        })
    }

    fn package_key(ecosystem: Ecosystem, name: &str) -> CacheKey {
        // Advisories are keyed per package: the version filter happens at
        // signal derivation against the declared ranges.
        CacheKey::new(GITHUB_SOURCE, ecosystem, name, None)
    }

    fn record_auth_failure(&self) {
        self.auth_failed.store(true, Ordering::SeqCst);
        if !self.auth_warned.swap(true, Ordering::SeqCst) {
            warn!(
                source = GITHUB_SOURCE,
                "authentication rejected; disabling GitHub advisories for this run"
            );
        }
    }

    async fn query_package(
        &self,
        ecosystem: Ecosystem,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Advisory>, ProviderError> {
        let token = self.token.as_deref().ok_or(ProviderError::Auth)?;
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| ProviderError::Cancelled)?;
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        let request = GraphQlRequest {
            query: VULNERABILITIES_QUERY,
            variables: serde_json::json!({
                "ecosystem": ecosystem.ghsa_name(),
                "package": name,
            }),
        };
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            response = self
                .http
                .post(&self.graphql_url)
                .bearer_auth(token)
                .json(&request)
                .send() => response?,
        };

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            self.record_auth_failure();
            return Err(ProviderError::Auth);
        }
        if !status.is_success() {
            return Err(ProviderError::Http {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let payload: GraphQlResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        if let Some(errors) = payload.errors {
            let message = errors
                .into_iter()
                .map(|error| error.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ProviderError::Malformed(format!("GraphQL error: {message}")));
        }

        let nodes = payload
            .data
            .and_then(|data| data.security_vulnerabilities)
            .unwrap_or_default()
            .nodes;
        Ok(convert_nodes(nodes))
    }
}

#[async_trait]
impl AdvisoryProvider for GhsaClient {
    fn name(&self) -> &'static str {
        GITHUB_SOURCE
    }

    fn batch_size(&self) -> usize {
        // One GraphQL query per distinct package; batches just bound task
        // granularity for the scheduler.
        8
    }

    fn is_enabled(&self) -> bool {
        !self.disabled && self.token.is_some() && !self.auth_failed.load(Ordering::SeqCst)
    }

    async fn enrich_batch(&self, batch: &[Dependency], cancel: &CancellationToken) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let mut per_package: HashMap<(Ecosystem, String), Vec<&Dependency>> = HashMap::new();
        for dependency in batch {
            per_package
                .entry((dependency.ecosystem, dependency.name.clone()))
                .or_default()
                .push(dependency);
        }

        for ((ecosystem, name), dependencies) in per_package {
            if cancel.is_cancelled() || !self.is_enabled() {
                for dependency in dependencies {
                    outcome.mark_unavailable(dependency.coordinate());
                }
                continue;
            }
            let key = Self::package_key(ecosystem, &name);
            let fetched = self
                .cache
                .get_or_fetch::<Vec<Advisory>, _, _>(&key, || {
                    retry_with_backoff(&self.retry, || {
                        self.query_package(ecosystem, &name, cancel)
                    })
                })
                .await;
            match fetched {
                Ok(advisories) => {
                    for dependency in dependencies {
                        outcome.record(dependency.coordinate(), advisories.clone());
                    }
                }
                Err(error) => {
                    if !self.auth_failed.load(Ordering::SeqCst) {
                        warn!(source = GITHUB_SOURCE, package = %name, %error, "advisory lookup failed");
                    }
                    for dependency in dependencies {
                        outcome.mark_unavailable(dependency.coordinate());
                    }
                }
            }
        }
        outcome
    }
}

fn convert_nodes(nodes: Vec<VulnerabilityNode>) -> Vec<Advisory> {
    let mut advisories = Vec::new();
    for node in nodes {
        let Some(advisory) = node.advisory else {
            continue;
        };
        let label = node.severity.or(advisory.severity);
        let severity = match label.as_deref() {
            Some(value) => {
                let parsed = Severity::from_label(value);
                if parsed == Severity::None {
                    // GHSA always scores its advisories; an unrecognized
                    // label still warrants the floor.
                    Severity::Low
                } else {
                    parsed
                }
            }
            None => Severity::Low,
        };
        let affected = parse_vulnerable_range(
            node.vulnerable_version_range.as_deref(),
            node.first_patched_version.as_ref().map(|v| v.identifier.as_str()),
        );
        advisories.push(Advisory {
            id: advisory.ghsa_id,
            source: GITHUB_SOURCE.to_string(),
            severity,
            summary: advisory.summary,
            withdrawn: advisory.withdrawn_at.is_some(),
            yanked: false,
            affected,
            references: advisory
                .references
                .into_iter()
                .filter_map(|reference| reference.url)
                .collect(),
        });
    }
    advisories.sort_by(|a, b| a.id.cmp(&b.id));
    advisories
}

/// Parse GHSA's constraint syntax (`>= 4.0.0, < 4.17.21`, `= 1.2.3`, ...)
/// into declared ranges. OR-segments separated by `||` become separate
/// ranges; a missing upper bound falls back to the first patched version.
fn parse_vulnerable_range(range: Option<&str>, first_patched: Option<&str>) -> Vec<VersionRange> {
    let Some(range) = range else {
        return match first_patched {
            Some(fixed) => vec![VersionRange {
                introduced: None,
                fixed: Some(Version::parse(fixed)),
                last_affected: None,
            }],
            None => Vec::new(),
        };
    };

    let mut out = Vec::new();
    for segment in range.split("||") {
        let mut parsed = VersionRange::default();
        for token in segment.split(',') {
            let token = token.trim();
            if let Some(rest) = token.strip_prefix(">=") {
                parsed.introduced = Some(Version::parse(rest.trim()));
            } else if let Some(rest) = token.strip_prefix("<=") {
                parsed.last_affected = Some(Version::parse(rest.trim()));
            } else if let Some(rest) = token.strip_prefix('<') {
                parsed.fixed = Some(Version::parse(rest.trim()));
            } else if let Some(rest) = token.strip_prefix('>') {
                parsed.introduced = Some(Version::parse(rest.trim()));
            } else if let Some(rest) = token.strip_prefix('=') {
                let exact = Version::parse(rest.trim());
                parsed.introduced = Some(exact.clone());
                parsed.last_affected = Some(exact);
            }
        }
        if parsed.fixed.is_none() && parsed.last_affected.is_none() {
            if let Some(fixed) = first_patched {
                parsed.fixed = Some(Version::parse(fixed));
            }
        }
        if parsed.introduced.is_some() || parsed.fixed.is_some() || parsed.last_affected.is_some() {
            out.push(parsed);
        }
    }
    out
}
