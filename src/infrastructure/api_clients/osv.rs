//! OSV batch vulnerability service client

use std::collections::HashMap;
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
use crate::config::{HttpConfig, OsvConfig};
use crate::domain::trust::{Advisory, Dependency, Severity, Version, VersionRange};
use crate::infrastructure::cache::{CacheKey, CacheService};
use crate::infrastructure::resilience::{retry_with_backoff, RetryConfig};

pub const OSV_SOURCE: &str = "osv.dev";

#[derive(Debug, Serialize)]
struct BatchQuery<'a> {
    queries: Vec<PackageQuery<'a>>,
}

#[derive(Debug, Serialize)]
struct PackageQuery<'a> {
    package: PackageRef<'a>,
    version: &'a str,
}

#[derive(Debug, Serialize)]
struct PackageRef<'a> {
    name: &'a str,
    ecosystem: &'a str,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    #[serde(default)]
    results: Vec<Option<QueryResult>>,
}

#[derive(Debug, Deserialize, Default)]
struct QueryResult {
    #[serde(default)]
    vulns: Vec<OsvVulnerability>,
}

#[derive(Debug, Deserialize)]
struct OsvVulnerability {
    id: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    withdrawn: Option<String>,
    #[serde(default)]
    severity: Vec<OsvSeverity>,
    #[serde(default)]
    affected: Vec<OsvAffected>,
    #[serde(default)]
    references: Vec<OsvReference>,
    #[serde(default)]
    database_specific: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OsvSeverity {
    #[serde(default)]
    score: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, Default)]
struct OsvAffected {
    #[serde(default)]
    ranges: Vec<OsvRange>,
}

#[derive(Debug, Deserialize, Default)]
struct OsvRange {
    #[serde(default)]
    events: Vec<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct OsvReference {
    #[serde(default)]
    url: Option<String>,
}

/// Client for the OSV `querybatch` endpoint.
pub struct OsvClient {
    http: Client,
    base_url: String,
    cache: Arc<CacheService>,
    limiter: Arc<Semaphore>,
    retry: RetryConfig,
    batch_size: usize,
    disabled: bool,
}

impl OsvClient {
    pub fn new(
        config: &OsvConfig,
        http: &HttpConfig,
        cache: Arc<CacheService>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(http.timeout_seconds))
            .user_agent(concat!("rtx/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http: client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cache,
            limiter: Arc::new(Semaphore::new(config.max_concurrency)),
            retry: RetryConfig::from_http(http),
            batch_size: config.batch_size,
            disabled: config.disabled,
        })
    }

    fn cache_key(dependency: &Dependency) -> CacheKey {
        CacheKey::new(
            OSV_SOURCE,
            dependency.ecosystem,
            dependency.normalized_name(),
            Some(dependency.version.clone()),
        )
    }

    async fn query_batch(
        &self,
        batch: &[&Dependency],
        cancel: &CancellationToken,
    ) -> Result<Vec<Vec<Advisory>>, ProviderError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| ProviderError::Cancelled)?;
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        let body = BatchQuery {
            queries: batch
                .iter()
                .map(|dependency| PackageQuery {
                    package: PackageRef {
                        name: &dependency.name,
                        ecosystem: dependency.ecosystem.osv_name(),
                    },
                    version: &dependency.version,
                })
                .collect(),
        };

        let url = format!("{}/v1/querybatch", self.base_url);
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            response = self.http.post(&url).json(&body).send() => response?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Http {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let payload: BatchResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let mut results = Vec::with_capacity(batch.len());
        for index in 0..batch.len() {
            let vulns = payload
                .results
                .get(index)
                .and_then(|entry| entry.as_ref())
                .map(|entry| entry.vulns.as_slice())
                .unwrap_or(&[]);
            results.push(vulns.iter().map(convert_vulnerability).collect());
        }
        Ok(results)
    }
}

#[async_trait]
impl AdvisoryProvider for OsvClient {
    fn name(&self) -> &'static str {
        OSV_SOURCE
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn is_enabled(&self) -> bool {
        !self.disabled
    }

    async fn enrich_batch(&self, batch: &[Dependency], cancel: &CancellationToken) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let mut misses: Vec<&Dependency> = Vec::new();
        for dependency in batch {
            let key = Self::cache_key(dependency);
            match self.cache.get::<Vec<Advisory>>(&key).await {
                Some(advisories) => outcome.record(dependency.coordinate(), advisories),
                None => misses.push(dependency),
            }
        }
        if misses.is_empty() {
            return outcome;
        }
        if cancel.is_cancelled() {
            for dependency in misses {
                outcome.mark_unavailable(dependency.coordinate());
            }
            return outcome;
        }

        match retry_with_backoff(&self.retry, || self.query_batch(&misses, cancel)).await {
            Ok(results) => {
                for (dependency, advisories) in misses.iter().zip(results) {
                    self.cache
                        .insert(&Self::cache_key(dependency), &advisories)
                        .await;
                    outcome.record(dependency.coordinate(), advisories);
                }
            }
            Err(error) => {
                warn!(source = OSV_SOURCE, %error, "batch query failed; marking batch unavailable");
                for dependency in misses {
                    outcome.mark_unavailable(dependency.coordinate());
                }
            }
        }
        outcome
    }
}

fn convert_vulnerability(vuln: &OsvVulnerability) -> Advisory {
    let severity = severity_of(vuln);
    let affected = vuln
        .affected
        .iter()
        .flat_map(|affected| affected.ranges.iter())
        .filter_map(range_from_events)
        .collect();
    Advisory {
        id: vuln.id.clone(),
        source: OSV_SOURCE.to_string(),
        severity,
        summary: vuln.summary.clone(),
        withdrawn: vuln.withdrawn.is_some(),
        yanked: false,
        affected,
        references: vuln
            .references
            .iter()
            .filter_map(|reference| reference.url.clone())
            .collect(),
    }
}

fn range_from_events(range: &OsvRange) -> Option<VersionRange> {
    let mut out = VersionRange::default();
    for event in &range.events {
        if let Some(introduced) = event.get("introduced") {
            if introduced != "0" {
                out.introduced = Some(Version::parse(introduced));
            } else {
                out.introduced = None;
            }
        } else if let Some(fixed) = event.get("fixed") {
            out.fixed = Some(Version::parse(fixed));
        } else if let Some(last) = event.get("last_affected") {
            out.last_affected = Some(Version::parse(last));
        }
    }
    if out.introduced.is_none() && out.fixed.is_none() && out.last_affected.is_none() {
        None
    } else {
        Some(out)
    }
}

fn severity_of(vuln: &OsvVulnerability) -> Severity {
    let max_score = vuln
        .severity
        .iter()
        .filter_map(|entry| entry.score.as_ref())
        .map(numeric_score)
        .fold(0.0_f64, f64::max);
    let severity = Severity::from_cvss_score(max_score);
    if severity != Severity::None {
        return severity;
    }
    vuln.database_specific
        .as_ref()
        .and_then(|extra| extra.get("severity"))
        .and_then(|label| label.as_str())
        .map(Severity::from_label)
        .unwrap_or(Severity::None)
}

/// Extract a numeric score from the mixed representations OSV publishes:
/// bare numbers, numeric strings, or CVSS vector strings (which score 0
/// here and defer to the database-specific label).
fn numeric_score(raw: &serde_json::Value) -> f64 {
    match raw {
        serde_json::Value::Number(number) => number.as_f64().unwrap_or(0.0),
        serde_json::Value::String(text) => {
            let trimmed = text.trim();
            if let Ok(value) = trimmed.parse::<f64>() {
                return value;
            }
            if trimmed.starts_with("CVSS:") {
                return 0.0;
            }
            first_number(trimmed).unwrap_or(0.0)
        }
        _ => 0.0,
    }
}

fn first_number(text: &str) -> Option<f64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let tail = &text[start..];
    let end = tail
        .char_indices()
        .take_while(|(_, c)| c.is_ascii_digit() || *c == '.')
        .map(|(i, c)| i + c.len_utf8())
        .last()?;
    tail[..end].trim_end_matches('.').parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_client(server_url: &str) -> OsvClient {
        OsvClient::new(
            &OsvConfig {
                base_url: server_url.to_string(),
                ..OsvConfig::default()
            },
            &HttpConfig {
                retries: 0,
                ..HttpConfig::default()
            },
            Arc::new(CacheService::in_memory()),
        )
        .expect("client")
    }

    fn lodash() -> Dependency {
        Dependency::new(
            crate::domain::trust::Ecosystem::Npm,
            "lodash",
            "4.17.20",
            "package-lock.json",
            true,
        )
    }

    #[tokio::test]
    async fn parses_batch_results_in_query_order() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/querybatch")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "results": [
                        {
                            "vulns": [{
                                "id": "GHSA-zzzz",
                                "summary": "Prototype pollution",
                                "severity": [{"type": "CVSS_V3", "score": "9.1"}],
                                "affected": [{
                                    "ranges": [{
                                        "type": "SEMVER",
                                        "events": [
                                            {"introduced": "4.0.0"},
                                            {"fixed": "4.17.21"}
                                        ]
                                    }]
                                }],
                                "references": [{"url": "https://example.com/a"}]
                            }, {
                                "id": "GHSA-aaaa",
                                "summary": "Lesser issue",
                                "severity": [{"type": "CVSS_V3", "score": "5.0"}]
                            }]
                        }
                    ]
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let batch = vec![lodash()];
        let outcome = client
            .enrich_batch(&batch, &CancellationToken::new())
            .await;

        mock.assert_async().await;
        assert!(outcome.covers(&batch));
        let advisories = &outcome.advisories[&batch[0].coordinate()];
        // Sorted by id despite response order.
        assert_eq!(advisories[0].id, "GHSA-aaaa");
        assert_eq!(advisories[1].id, "GHSA-zzzz");
        assert_eq!(advisories[1].severity, Severity::Critical);
        let range = &advisories[1].affected[0];
        assert!(range.contains(&Version::parse("4.17.20")));
        assert!(!range.contains(&Version::parse("4.17.21")));
    }

    #[tokio::test]
    async fn server_failure_marks_batch_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/querybatch")
            .with_status(500)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let batch = vec![lodash()];
        let outcome = client
            .enrich_batch(&batch, &CancellationToken::new())
            .await;
        assert!(outcome.unavailable.contains(&batch[0].coordinate()));
        assert!(outcome.covers(&batch));
    }

    #[tokio::test]
    async fn second_call_is_served_from_cache() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/querybatch")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"results": [{"vulns": []}]}).to_string())
            .expect(1)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let batch = vec![lodash()];
        for _ in 0..2 {
            let outcome = client
                .enrich_batch(&batch, &CancellationToken::new())
                .await;
            assert!(outcome.advisories[&batch[0].coordinate()].is_empty());
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn cancelled_batches_are_unavailable_not_partial() {
        let server = mockito::Server::new_async().await;
        let client = test_client(&server.url());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let batch = vec![lodash()];
        let outcome = client.enrich_batch(&batch, &cancel).await;
        assert!(outcome.unavailable.contains(&batch[0].coordinate()));
    }

    #[test]
    fn numeric_score_handles_mixed_forms() {
        assert_eq!(numeric_score(&json!(7.5)), 7.5);
        assert_eq!(numeric_score(&json!("9.8")), 9.8);
        assert_eq!(numeric_score(&json!("CVSS:3.1/AV:N/AC:L")), 0.0);
        assert_eq!(numeric_score(&json!("score 6.1 of 10")), 6.1);
        assert_eq!(numeric_score(&json!(null)), 0.0);
    }
}
