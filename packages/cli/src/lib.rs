#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Headless driver for the response planner.
//!
//! Every operation runs against a [`HeadlessSurface`], so a full load can be
//! inspected without a map widget: how many markers each source produced,
//! which icons they got, and what sizes they end up at after a zoom
//! sequence.

pub mod interactive;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use response_planner_cli_utils::{IndicatifProgress, MultiProgress};
use response_planner_map::{MapController, MapEvent, MapUpdate};
use response_planner_marker::{HeadlessSurface, IconResolver, MarkerSet, marker_size_for_zoom};
use response_planner_source::config::resolve_definitions;
use response_planner_source::diagnostics::{Diagnostic, Diagnostics, drain};
use response_planner_source::http;
use response_planner_source::registry::{DispatchContext, SourceRegistry};
use response_planner_source_models::{Feature, Position, SourceQuery};

/// Builds the registry from the embedded definitions, or from
/// `config_path`, with the optional `--sources` filter applied.
///
/// # Errors
///
/// Returns an error if the config file cannot be loaded or the HTTP client
/// cannot be built.
pub fn build_registry(
    config_path: Option<&Path>,
    sources: Option<String>,
) -> Result<SourceRegistry, Box<dyn std::error::Error>> {
    let definitions = resolve_definitions(config_path, sources)?;
    let client = http::client()?;
    Ok(SourceRegistry::from_definitions(&definitions, &client))
}

/// Prints every registered source.
pub fn list_sources(registry: &SourceRegistry) {
    println!("{:<32} {:<8} NAME", "ID", "ENABLED");
    println!("{}", "-".repeat(72));
    for entry in registry.entries() {
        println!(
            "{:<32} {:<8} {}",
            entry.source.id(),
            if entry.enabled { "yes" } else { "no" },
            entry.source.name()
        );
    }
}

/// Result of [`load`].
pub struct LoadSummary {
    /// Markers as they stand after the zoom sequence.
    pub markers: MarkerSet<HeadlessSurface>,
    /// Everything reported during the run.
    pub diagnostics: Vec<Diagnostic>,
}

impl LoadSummary {
    /// Marker count per source.
    #[must_use]
    pub fn markers_by_source(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for marker in self.markers.markers() {
            *counts.entry(marker.source_id.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// Marker count per icon category.
    #[must_use]
    pub fn markers_by_icon(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for marker in self.markers.markers() {
            *counts.entry(marker.icon.category).or_insert(0) += 1;
        }
        counts
    }

    /// Diagnostic count per kind.
    #[must_use]
    pub fn diagnostics_by_kind(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for diagnostic in &self.diagnostics {
            *counts.entry(diagnostic.kind.as_ref()).or_insert(0) += 1;
        }
        counts
    }

    /// Prints the summary tables.
    pub fn print(&self) {
        println!();
        println!("{} markers placed", self.markers.len());
        if let Some(zoom) = self.markers.zoom() {
            println!(
                "Zoom {zoom}: markers are {}px",
                self.markers.current_size()
            );
        }

        println!();
        println!("{:<32} MARKERS", "SOURCE");
        for (source, count) in self.markers_by_source() {
            println!("{source:<32} {count}");
        }

        println!();
        println!("{:<32} MARKERS", "ICON");
        for (icon, count) in self.markers_by_icon() {
            println!("{icon:<32} {count}");
        }

        if !self.diagnostics.is_empty() {
            println!();
            println!("{:<32} COUNT", "DIAGNOSTIC");
            for (kind, count) in self.diagnostics_by_kind() {
                println!("{kind:<32} {count}");
            }
        }
    }
}

/// Loads every enabled source onto a headless map, then replays `zooms`.
///
/// # Errors
///
/// Returns an error if the icons cannot be loaded or the map controller
/// stops unexpectedly.
pub async fn load(
    registry: SourceRegistry,
    zooms: &[u32],
    multi: &MultiProgress,
) -> Result<LoadSummary, Box<dyn std::error::Error>> {
    let (diagnostics, mut diag_rx) = Diagnostics::channel();
    let progress = IndicatifProgress::sources_bar(multi, "Loading facilities");
    let ctx = DispatchContext::new(diagnostics).with_progress(progress);

    let (handle, mut updates, task) = MapController::spawn(
        Arc::new(registry),
        Arc::new(IconResolver::embedded()?),
        HeadlessSurface::new(),
        ctx,
    );

    handle.load_all()?;
    while let Some(update) = updates.recv().await {
        match update {
            MapUpdate::MarkersPlaced {
                source_id, placed, ..
            } => log::debug!("{source_id}: {placed} markers"),
            MapUpdate::DispatchFinished { .. } => break,
            _ => {}
        }
    }

    for &zoom in zooms {
        handle.event(MapEvent::ZoomChanged(zoom))?;
        while let Some(update) = updates.recv().await {
            if let MapUpdate::Rescaled { size_px, .. } = update {
                log::info!("Zoom {zoom}: {size_px}px");
                break;
            }
        }
    }

    handle.shutdown()?;
    let markers = task.await?;

    Ok(LoadSummary {
        markers,
        diagnostics: drain(&mut diag_rx),
    })
}

/// Queries every enabled source for features near a point.
///
/// Results are grouped by source, in completion order.
///
/// # Errors
///
/// Returns an error if the coordinates are out of range.
pub async fn query_near(
    registry: &SourceRegistry,
    latitude: f64,
    longitude: f64,
    multi: &MultiProgress,
) -> Result<Vec<(String, Vec<Feature>)>, Box<dyn std::error::Error>> {
    let query = SourceQuery::near(Position::from_lat_lng(latitude, longitude))?.with_tag("query");
    let progress = IndicatifProgress::sources_bar(multi, "Querying");
    let ctx = DispatchContext::new(Diagnostics::log_only()).with_progress(progress);

    let mut results = Vec::new();
    registry
        .dispatch(&query, &ctx, |source, features| {
            results.push((source.id().to_string(), features));
        })
        .await;

    Ok(results)
}

/// Prints the output of [`query_near`].
pub fn print_features(results: &[(String, Vec<Feature>)]) {
    for (source_id, features) in results {
        println!();
        println!("{source_id} ({} features)", features.len());
        for feature in features {
            println!(
                "  {:<40} {:<28} {}",
                feature.label, feature.category, feature.position
            );
        }
    }
}

/// Prints how `category` resolves to an icon.
///
/// # Errors
///
/// Returns an error if the embedded icons cannot be loaded.
pub fn print_icon(category: &str) -> Result<(), Box<dyn std::error::Error>> {
    let resolver = IconResolver::embedded()?;
    let found = resolver.resolve_match(category);
    println!(
        "{category:?} -> {} ({}, {}, {} bytes)",
        found.asset.category,
        found.kind,
        found.asset.file_name,
        found.asset.bytes.len()
    );
    Ok(())
}

/// Prints the marker size for each zoom level.
pub fn print_scale(zooms: &[u32]) {
    println!("{:<6} SIZE", "ZOOM");
    for &zoom in zooms {
        println!("{zoom:<6} {}px", marker_size_for_zoom(zoom));
    }
}

/// Parses a comma-separated list of zoom levels.
///
/// # Errors
///
/// Returns an error naming the first entry that is not a valid zoom level.
pub fn parse_zooms(input: &str) -> Result<Vec<u32>, String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().map_err(|_| format!("invalid zoom level: {s:?}")))
        .collect()
}
