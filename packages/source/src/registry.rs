//! Source registry: loads source definitions from embedded TOML configs and
//! fans queries out to every enabled source.
//!
//! Each `.toml` file in `packages/source/sources/` is baked into the binary
//! at compile time via [`include_str!`]. Adding a new source is as simple as
//! creating a new TOML file and adding it to the list below.

use std::sync::Arc;

use futures::StreamExt as _;
use futures::stream::FuturesUnordered;
use response_planner_source_models::{Feature, FetcherConfig, SourceDefinition, SourceQuery};
use tokio::sync::mpsc;

use crate::config::parse_source_toml;
use crate::dataset::DatasetSource;
use crate::diagnostics::Diagnostics;
use crate::feature_service::FeatureServiceSource;
use crate::progress::{ProgressCallback, null_progress};
use crate::{FacilitySource, SourceSettings};

/// TOML configs embedded at compile time.
const SOURCE_TOMLS: &[(&str, &str)] = &[
    // ── Hosted datasets ──────────────────────────────────────────────
    ("fire_stations", include_str!("../sources/fire_stations.toml")),
    (
        "law_enforcement",
        include_str!("../sources/law_enforcement.toml"),
    ),
    ("hospitals", include_str!("../sources/hospitals.toml")),
    ("ems_stations", include_str!("../sources/ems_stations.toml")),
    (
        "emergency_operations_centers",
        include_str!("../sources/emergency_operations_centers.toml"),
    ),
    // ── Feature services (disabled by default) ───────────────────────
    (
        "hifld_fire_stations",
        include_str!("../sources/hifld_fire_stations.toml"),
    ),
    (
        "hifld_hospitals",
        include_str!("../sources/hifld_hospitals.toml"),
    ),
];

/// Total number of configured sources (used in tests).
#[cfg(test)]
const EXPECTED_SOURCE_COUNT: usize = 7;

/// Returns all configured source definitions, parsed from embedded TOML.
///
/// # Panics
///
/// Panics if any TOML config is malformed (this is a compile-time guarantee
/// since the configs are embedded).
#[must_use]
pub fn all_definitions() -> Vec<SourceDefinition> {
    SOURCE_TOMLS
        .iter()
        .map(|(name, toml)| {
            parse_source_toml(toml).unwrap_or_else(|e| panic!("Failed to parse {name}.toml: {e}"))
        })
        .collect()
}

/// Instantiates the adapter described by `def`.
#[must_use]
pub fn build_source(def: &SourceDefinition, client: &reqwest::Client) -> Arc<dyn FacilitySource> {
    let settings = SourceSettings::from(def);
    match &def.fetcher {
        FetcherConfig::FeatureService {
            service_name,
            service_index,
            base_url,
        } => {
            let source = FeatureServiceSource::new(
                settings,
                service_name.clone(),
                *service_index,
                client.clone(),
            );
            match base_url {
                Some(url) => Arc::new(source.with_base_url(url.clone())),
                None => Arc::new(source),
            }
        }
        FetcherConfig::Dataset { dataset, base_url } => {
            let source = DatasetSource::new(settings, dataset.clone(), client.clone());
            match base_url {
                Some(url) => Arc::new(source.with_base_url(url.clone())),
                None => Arc::new(source),
            }
        }
    }
}

/// A registered adapter and whether it takes part in dispatches.
#[derive(Clone)]
pub struct RegisteredSource {
    /// The adapter.
    pub source: Arc<dyn FacilitySource>,
    /// Disabled sources stay listed but are skipped at dispatch.
    pub enabled: bool,
}

/// Everything a dispatch needs besides the query.
#[derive(Clone)]
pub struct DispatchContext {
    /// Where adapter failures are reported.
    pub diagnostics: Diagnostics,
    /// Ticked once per completed source.
    pub progress: Arc<dyn ProgressCallback>,
}

impl DispatchContext {
    /// Context reporting to `diagnostics` with no progress display.
    #[must_use]
    pub fn new(diagnostics: Diagnostics) -> Self {
        Self {
            diagnostics,
            progress: null_progress(),
        }
    }

    /// Replaces the progress callback.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }
}

/// Outcome counts of one [`SourceRegistry::dispatch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Enabled sources that were queried.
    pub completed: usize,
    /// Sources that returned no features (including failed ones).
    pub empty: usize,
    /// Disabled sources that were skipped.
    pub skipped: usize,
    /// Total features delivered.
    pub features: usize,
}

/// One source's result, as delivered by [`SourceRegistry::dispatch_channel`].
#[derive(Debug, Clone)]
pub struct SourceBatch {
    /// Id of the source that produced the batch.
    pub source_id: String,
    /// Name of the source that produced the batch.
    pub source_name: String,
    /// The query the batch answers.
    pub query: SourceQuery,
    /// Normalized features, empty when the source failed.
    pub features: Vec<Feature>,
}

/// Ordered, append-only list of adapters.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    entries: Vec<RegisteredSource>,
}

/// Builds a [`SourceRegistry`]. Registration order is preserved.
#[derive(Default)]
pub struct SourceRegistryBuilder {
    entries: Vec<RegisteredSource>,
}

impl SourceRegistryBuilder {
    /// Appends an adapter.
    #[must_use]
    pub fn register(mut self, source: Arc<dyn FacilitySource>, enabled: bool) -> Self {
        self.entries.push(RegisteredSource { source, enabled });
        self
    }

    /// Appends the adapter for each definition.
    #[must_use]
    pub fn definitions(mut self, defs: &[SourceDefinition], client: &reqwest::Client) -> Self {
        for def in defs {
            self.entries.push(RegisteredSource {
                source: build_source(def, client),
                enabled: def.enabled,
            });
        }
        self
    }

    /// Freezes the list.
    #[must_use]
    pub fn build(self) -> SourceRegistry {
        SourceRegistry {
            entries: self.entries,
        }
    }
}

impl SourceRegistry {
    /// Starts an empty registry.
    #[must_use]
    pub fn builder() -> SourceRegistryBuilder {
        SourceRegistryBuilder::default()
    }

    /// Registry with one adapter per definition, in order.
    #[must_use]
    pub fn from_definitions(defs: &[SourceDefinition], client: &reqwest::Client) -> Self {
        Self::builder().definitions(defs, client).build()
    }

    /// All registered sources, enabled or not.
    #[must_use]
    pub fn entries(&self) -> &[RegisteredSource] {
        &self.entries
    }

    /// The sources a dispatch will query.
    pub fn enabled(&self) -> impl Iterator<Item = &Arc<dyn FacilitySource>> {
        self.entries
            .iter()
            .filter(|e| e.enabled)
            .map(|e| &e.source)
    }

    /// Number of registered sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no sources are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of enabled sources.
    #[must_use]
    pub fn enabled_count(&self) -> usize {
        self.entries.iter().filter(|e| e.enabled).count()
    }

    /// Queries every enabled source concurrently on the caller's task.
    ///
    /// `on_features` runs once per source, in completion order, as soon as
    /// that source finishes. Failed sources deliver an empty batch.
    pub async fn dispatch<F>(
        &self,
        query: &SourceQuery,
        ctx: &DispatchContext,
        mut on_features: F,
    ) -> DispatchReport
    where
        F: FnMut(&dyn FacilitySource, Vec<Feature>),
    {
        let mut report = DispatchReport {
            skipped: self.len() - self.enabled_count(),
            ..DispatchReport::default()
        };

        ctx.progress.set_total(self.enabled_count() as u64);
        log::info!(
            "Dispatching {query} to {} sources ({} disabled)",
            self.enabled_count(),
            report.skipped
        );

        let mut pending: FuturesUnordered<_> = self
            .enabled()
            .map(|source| async move {
                let features = source.query(query, &ctx.diagnostics).await;
                (source, features)
            })
            .collect();

        while let Some((source, features)) = pending.next().await {
            log::info!("{}: {} features", source.id(), features.len());
            report.completed += 1;
            report.features += features.len();
            if features.is_empty() {
                report.empty += 1;
            }
            ctx.progress.set_message(source.name().to_string());
            ctx.progress.inc(1);
            on_features(source.as_ref(), features);
        }

        ctx.progress.finish(format!(
            "{} features from {} sources",
            report.features, report.completed
        ));

        report
    }

    /// Spawns one task per enabled source and streams their batches.
    ///
    /// The receiver closes once every source has delivered.
    #[must_use]
    pub fn dispatch_channel(
        &self,
        query: &SourceQuery,
        ctx: &DispatchContext,
    ) -> mpsc::Receiver<SourceBatch> {
        let total = self.enabled_count();
        let (tx, rx) = mpsc::channel(total.max(1));

        ctx.progress.set_total(total as u64);
        log::info!("Dispatching {query} to {total} sources");

        let handles: Vec<_> = self
            .enabled()
            .map(|source| {
                let source = Arc::clone(source);
                let query = query.clone();
                let ctx = ctx.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let features = source.query(&query, &ctx.diagnostics).await;
                    log::info!("{}: {} features", source.id(), features.len());
                    ctx.progress.set_message(source.name().to_string());
                    ctx.progress.inc(1);

                    let batch = SourceBatch {
                        source_id: source.id().to_string(),
                        source_name: source.name().to_string(),
                        query,
                        features,
                    };
                    if tx.send(batch).await.is_err() {
                        log::debug!("{}: batch receiver dropped", source.id());
                    }
                })
            })
            .collect();
        drop(tx);

        let progress = Arc::clone(&ctx.progress);
        tokio::spawn(async move {
            for handle in handles {
                if let Err(e) = handle.await {
                    log::error!("Source task failed: {e}");
                }
            }
            progress.finish(format!("{total} sources done"));
        });

        rx
    }
}
