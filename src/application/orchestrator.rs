//! Evaluation orchestrator
//!
//! Drives the pipeline end-to-end: builds the working set, fans provider
//! calls out under a global concurrency ceiling (each source also enforces
//! its own), merges asynchronous completions into per-dependency bundles,
//! runs the pure derive/evaluate stages, and assembles the deterministic
//! report. Provider failures degrade fidelity per dependency; they never
//! fail the run.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::dependency_set::build_working_set;
use crate::application::errors::ProviderError;
use crate::application::policy;
use crate::application::reporting::models::{DependencyVerdict, Report, SourceStatus};
use crate::application::signals::derive_signals;
use crate::config::{Config, PolicyThresholds};
use crate::domain::trust::{Advisory, Dependency, ReleaseMetadata};
use crate::infrastructure::api_clients::{AdvisoryProvider, BatchOutcome, GhsaClient, OsvClient};
use crate::infrastructure::cache::CacheService;
use crate::infrastructure::registries::MetadataClient;

/// Accumulated provider results for one dependency.
#[derive(Debug, Default)]
struct ResultBundle {
    advisories_by_source: BTreeMap<String, Vec<Advisory>>,
    unavailable_sources: BTreeSet<String>,
    metadata: Option<ReleaseMetadata>,
    metadata_failed: bool,
}

enum TaskResult {
    Advisories {
        source: &'static str,
        outcome: BatchOutcome,
    },
    Metadata {
        coordinate: String,
        result: Result<ReleaseMetadata, ProviderError>,
    },
}

/// Outcome of a pre-upgrade evaluation: the baseline and proposed reports
/// plus the reason diff for the changed package.
#[derive(Debug, Clone, serde::Serialize)]
pub struct UpgradeAssessment {
    pub baseline: Report,
    pub proposed: Report,
    pub added_reasons: Vec<String>,
    pub removed_reasons: Vec<String>,
    pub exit_code: i32,
}

pub struct Orchestrator {
    advisory_providers: Vec<Arc<dyn AdvisoryProvider>>,
    metadata: Arc<MetadataClient>,
    thresholds: PolicyThresholds,
    global_concurrency: usize,
    deadline: Option<Duration>,
}

impl Orchestrator {
    /// Wire the default provider set against the shared cache.
    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        let cache = Arc::new(CacheService::new(config.cache.clone()));
        let advisory_providers: Vec<Arc<dyn AdvisoryProvider>> = vec![
            Arc::new(OsvClient::new(&config.providers.osv, &config.http, cache.clone())?),
            Arc::new(GhsaClient::new(&config.providers.github, &config.http, cache.clone())?),
        ];
        let metadata = Arc::new(MetadataClient::from_config(config, cache)?);
        Ok(Self::new(advisory_providers, metadata, config))
    }

    pub fn new(
        advisory_providers: Vec<Arc<dyn AdvisoryProvider>>,
        metadata: Arc<MetadataClient>,
        config: &Config,
    ) -> Self {
        Self {
            advisory_providers,
            metadata,
            thresholds: config.policy.clone(),
            global_concurrency: config.analysis.global_concurrency,
            deadline: config.analysis.deadline_seconds.map(Duration::from_secs),
        }
    }

    /// Evaluate a set of scanner observations into a report.
    pub async fn run(
        &self,
        observations: Vec<Dependency>,
        managers: Vec<String>,
        cancel: &CancellationToken,
    ) -> Report {
        let working_set = build_working_set(observations);
        let now = Utc::now();
        info!(dependencies = working_set.len(), "starting trust evaluation");

        let cancel = cancel.child_token();
        let watchdog = self.deadline.map(|deadline| {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                warn!("global deadline reached; cancelling in-flight work");
                cancel.cancel();
            })
        });

        let bundles = self.gather(&working_set, &cancel).await;
        if let Some(watchdog) = watchdog {
            watchdog.abort();
        }

        let enabled_sources: Vec<&'static str> = self
            .advisory_providers
            .iter()
            .filter(|provider| provider.is_enabled())
            .map(|provider| provider.name())
            .collect();

        let mut verdicts = Vec::with_capacity(working_set.len());
        for dependency in &working_set {
            let coordinate = dependency.coordinate();
            let bundle = bundles.get(&coordinate);

            let mut unavailable: BTreeSet<String> = bundle
                .map(|bundle| bundle.unavailable_sources.clone())
                .unwrap_or_default();
            // A source that answered neither way counts as unavailable: the
            // distinction between "no advisories" and "no answer" must never
            // be blurred by a lost task.
            for source in &enabled_sources {
                let answered = bundle
                    .map(|bundle| bundle.advisories_by_source.contains_key(*source))
                    .unwrap_or(false);
                if !answered {
                    unavailable.insert((*source).to_string());
                }
            }

            let metadata = match bundle.and_then(|bundle| bundle.metadata.clone()) {
                Some(metadata) => metadata,
                None => {
                    if self.metadata.supports(dependency.ecosystem) {
                        unavailable.insert(MetadataClient::source_tag(dependency.ecosystem));
                    }
                    ReleaseMetadata::unknown(dependency.ecosystem, dependency.normalized_name())
                }
            };

            let advisories = bundle
                .map(|bundle| merge_advisories(&bundle.advisories_by_source))
                .unwrap_or_default();

            let signal = derive_signals(dependency, &advisories, &metadata, &self.thresholds, now);
            let verdict = policy::evaluate(&signal);
            verdicts.push(DependencyVerdict::from_verdict(
                dependency,
                verdict,
                advisories,
                unavailable.into_iter().collect(),
            ));
        }

        let sources = self.source_statuses(&working_set, &bundles);
        let report = Report::build(managers, verdicts, sources);
        info!(
            total = report.summary.total,
            exit_code = report.summary.exit_code,
            "trust evaluation finished"
        );
        report
    }

    /// Pre-upgrade mode: evaluate the currently resolved version and the
    /// proposed one as synthetic working sets and diff the outcome.
    pub async fn evaluate_upgrade(
        &self,
        baseline_dependency: Dependency,
        proposed_version: &str,
        cancel: &CancellationToken,
    ) -> UpgradeAssessment {
        let managers = vec![baseline_dependency.ecosystem.canonical_name().to_string()];
        let proposed_dependency = Dependency {
            version: proposed_version.to_string(),
            ..baseline_dependency.clone()
        };

        let baseline = self
            .run(vec![baseline_dependency], managers.clone(), cancel)
            .await;
        let proposed = self.run(vec![proposed_dependency], managers, cancel).await;

        let baseline_reasons = reason_names(&baseline);
        let proposed_reasons = reason_names(&proposed);
        let added_reasons = proposed_reasons
            .difference(&baseline_reasons)
            .cloned()
            .collect();
        let removed_reasons = baseline_reasons
            .difference(&proposed_reasons)
            .cloned()
            .collect();
        let exit_code = baseline.exit_code().max(proposed.exit_code());

        UpgradeAssessment {
            baseline,
            proposed,
            added_reasons,
            removed_reasons,
            exit_code,
        }
    }

    /// Fan out every provider call and merge completions as they arrive.
    /// Completion order is unconstrained; determinism is recovered when the
    /// bundles are folded in working-set order.
    async fn gather(
        &self,
        working_set: &[Dependency],
        cancel: &CancellationToken,
    ) -> HashMap<String, ResultBundle> {
        let global = Arc::new(Semaphore::new(self.global_concurrency));
        let mut tasks: JoinSet<TaskResult> = JoinSet::new();

        for provider in &self.advisory_providers {
            if !provider.is_enabled() {
                debug!(source = provider.name(), "advisory source disabled");
                continue;
            }
            for chunk in working_set.chunks(provider.batch_size().max(1)) {
                let provider = provider.clone();
                let batch: Vec<Dependency> = chunk.to_vec();
                let global = global.clone();
                let cancel = cancel.clone();
                tasks.spawn(async move {
                    let source = provider.name();
                    let Ok(_permit) = global.acquire_owned().await else {
                        return TaskResult::Advisories {
                            source,
                            outcome: BatchOutcome::unavailable_for(&batch),
                        };
                    };
                    if cancel.is_cancelled() {
                        return TaskResult::Advisories {
                            source,
                            outcome: BatchOutcome::unavailable_for(&batch),
                        };
                    }
                    let outcome = provider.enrich_batch(&batch, &cancel).await;
                    TaskResult::Advisories { source, outcome }
                });
            }
        }

        for dependency in working_set {
            let metadata = self.metadata.clone();
            let dependency = dependency.clone();
            let global = global.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let coordinate = dependency.coordinate();
                let Ok(_permit) = global.acquire_owned().await else {
                    return TaskResult::Metadata {
                        coordinate,
                        result: Err(ProviderError::Cancelled),
                    };
                };
                if cancel.is_cancelled() {
                    return TaskResult::Metadata {
                        coordinate,
                        result: Err(ProviderError::Cancelled),
                    };
                }
                let result = metadata.fetch(&dependency, &cancel).await;
                TaskResult::Metadata { coordinate, result }
            });
        }

        let mut bundles: HashMap<String, ResultBundle> = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            let task_result = match joined {
                Ok(task_result) => task_result,
                Err(error) => {
                    warn!(%error, "provider task panicked or was aborted");
                    continue;
                }
            };
            match task_result {
                TaskResult::Advisories { source, outcome } => {
                    for (coordinate, advisories) in outcome.advisories {
                        bundles
                            .entry(coordinate)
                            .or_default()
                            .advisories_by_source
                            .insert(source.to_string(), advisories);
                    }
                    for coordinate in outcome.unavailable {
                        bundles
                            .entry(coordinate)
                            .or_default()
                            .unavailable_sources
                            .insert(source.to_string());
                    }
                }
                TaskResult::Metadata { coordinate, result } => {
                    let bundle = bundles.entry(coordinate.clone()).or_default();
                    match result {
                        Ok(metadata) => bundle.metadata = Some(metadata),
                        Err(error) => {
                            debug!(%coordinate, %error, "registry metadata unavailable");
                            bundle.metadata_failed = true;
                        }
                    }
                }
            }
        }
        bundles
    }

    fn source_statuses(
        &self,
        working_set: &[Dependency],
        bundles: &HashMap<String, ResultBundle>,
    ) -> BTreeMap<String, SourceStatus> {
        let mut sources = BTreeMap::new();

        for provider in &self.advisory_providers {
            let name = provider.name().to_string();
            let status = if !provider.is_enabled() {
                SourceStatus::Disabled
            } else if bundles
                .values()
                .any(|bundle| bundle.unavailable_sources.contains(&name))
            {
                SourceStatus::Degraded
            } else {
                SourceStatus::Ok
            };
            sources.insert(name, status);
        }

        let ecosystems: BTreeSet<_> = working_set
            .iter()
            .map(|dependency| dependency.ecosystem)
            .filter(|ecosystem| self.metadata.supports(*ecosystem))
            .collect();
        for ecosystem in ecosystems {
            let degraded = working_set
                .iter()
                .filter(|dependency| dependency.ecosystem == ecosystem)
                .any(|dependency| {
                    bundles
                        .get(&dependency.coordinate())
                        .map(|bundle| bundle.metadata_failed || bundle.metadata.is_none())
                        .unwrap_or(true)
                });
            sources.insert(
                MetadataClient::source_tag(ecosystem),
                if degraded {
                    SourceStatus::Degraded
                } else {
                    SourceStatus::Ok
                },
            );
        }
        sources
    }
}

/// Merge advisories across sources, deduplicating on `(source, id)` and
/// sorting by the same key so merged output is stable.
fn merge_advisories(by_source: &BTreeMap<String, Vec<Advisory>>) -> Vec<Advisory> {
    let mut merged: BTreeMap<(String, String), Advisory> = BTreeMap::new();
    for advisories in by_source.values() {
        for advisory in advisories {
            merged
                .entry((advisory.source.clone(), advisory.id.clone()))
                .or_insert_with(|| advisory.clone());
        }
    }
    merged.into_values().collect()
}

fn reason_names(report: &Report) -> BTreeSet<String> {
    report
        .verdicts
        .iter()
        .flat_map(|verdict| verdict.reasons.iter())
        .map(|reason| reason.signal.name().to_string())
        .collect()
}
