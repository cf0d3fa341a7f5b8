//! Per-ecosystem registry metadata providers
//!
//! One client per ecosystem registry, unified by [`MetadataClient`], which
//! layers caching, single-flight, retry, and typosquat candidate selection
//! on top. Registry lookups are per dependency (no batching) and share the
//! orchestrator's global concurrency budget.

pub mod client;
pub mod crates;
pub mod npm;
pub mod popular;
pub mod pypi;
pub mod rubygems;

pub use client::MetadataClient;
pub use popular::PopularNameIndex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use tokio_util::sync::CancellationToken;

use crate::application::errors::ProviderError;
use crate::domain::trust::{Dependency, Ecosystem, ReleaseMetadata};

/// A single ecosystem registry client.
///
/// A missing package surfaces as `Err(ProviderError::Http { status: 404 })`
/// so the caller can decide whether to remember the absence; every other
/// error is a provider failure and yields unknown metadata upstream.
#[async_trait]
pub trait RegistryMetadataProvider: Send + Sync {
    fn ecosystem(&self) -> Ecosystem;

    async fn fetch(
        &self,
        dependency: &Dependency,
        cancel: &CancellationToken,
    ) -> Result<ReleaseMetadata, ProviderError>;
}

/// Lenient timestamp parsing across registry payload dialects.
pub(crate) fn parse_registry_date(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }
    None
}

/// Accumulates release timestamps into the scalars the deriver needs.
#[derive(Debug, Default)]
pub(crate) struct ReleaseTally {
    pub latest: Option<DateTime<Utc>>,
    pub last_30d: u32,
    pub total: u32,
}

impl ReleaseTally {
    pub fn record(&mut self, released: DateTime<Utc>, now: DateTime<Utc>) {
        self.total += 1;
        if self.latest.map_or(true, |latest| released > latest) {
            self.latest = Some(released);
        }
        if (now - released).num_days() <= 30 {
            self.last_30d += 1;
        }
    }
}

/// Count distinct, non-empty maintainer handles case-insensitively.
pub(crate) fn count_maintainers<'a>(names: impl IntoIterator<Item = &'a str>) -> u32 {
    let mut unique = std::collections::BTreeSet::new();
    for name in names {
        let cleaned = name.trim();
        if !cleaned.is_empty() {
            unique.insert(cleaned.to_lowercase());
        }
    }
    unique.len() as u32
}

/// Map an HTTP response status to a provider error, if it is one.
pub(crate) async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(ProviderError::Http {
        status: status.as_u16(),
        message: response.text().await.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn parses_common_registry_date_forms() {
        assert!(parse_registry_date("2023-05-01T12:30:45.123456Z").is_some());
        assert!(parse_registry_date("2023-05-01T12:30:45+02:00").is_some());
        assert!(parse_registry_date("2023-05-01T12:30:45").is_some());
        assert!(parse_registry_date("2023-05-01").is_some());
        assert!(parse_registry_date("not a date").is_none());
        assert!(parse_registry_date("").is_none());
    }

    #[test]
    fn tally_tracks_latest_and_recent_releases() {
        let now = Utc::now();
        let mut tally = ReleaseTally::default();
        tally.record(now - Duration::days(400), now);
        tally.record(now - Duration::days(10), now);
        tally.record(now - Duration::days(3), now);
        assert_eq!(tally.total, 3);
        assert_eq!(tally.last_30d, 2);
        assert_eq!(tally.latest, Some(now - Duration::days(3)));
    }

    #[test]
    fn maintainer_counting_dedupes_case_insensitively() {
        assert_eq!(count_maintainers(["Alice", "alice", "", "  ", "Bob"]), 2);
        assert_eq!(count_maintainers([] as [&str; 0]), 0);
    }
}
