//! Hosted dataset adapter.
//!
//! Fetches `{base}/{dataset}.json`, which is either an envelope
//! `{name, type, updated_at, features}` or a bare array of features. The
//! features are already `GeoJSON`-feature shaped, so the only normalization
//! is the field mapping pass. The point of a [`SourceQuery`] is ignored.

use async_trait::async_trait;
use response_planner_source_models::{FieldMapping, SourceQuery};
use serde::Deserialize;

use crate::normalize::{Normalized, normalize_features};
use crate::{FacilitySource, SourceError, SourceSettings, http};

/// Root of the hosted datasets.
pub const DATASET_BASE_URL: &str = "https://data.response-planner.org/datasets";

/// Builds the URL of a hosted dataset.
#[must_use]
pub fn build_dataset_url(base_url: &str, dataset: &str) -> String {
    format!("{}/{dataset}.json", base_url.trim_end_matches('/'))
}

/// The envelope a hosted dataset is published in.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetEnvelope {
    /// Dataset display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Publisher-defined dataset type.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Last publication time, as published.
    #[serde(default)]
    pub updated_at: Option<String>,
    /// The features.
    pub features: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DatasetBody {
    Envelope(DatasetEnvelope),
    Bare(Vec<serde_json::Value>),
}

/// Extracts the feature records from a dataset response.
///
/// # Errors
///
/// Returns [`SourceError::Parse`] if the body is neither an envelope nor an
/// array.
pub fn parse_dataset_body(
    body: serde_json::Value,
    label: &str,
) -> Result<Vec<serde_json::Value>, SourceError> {
    let parsed: DatasetBody = serde_json::from_value(body).map_err(|_| SourceError::Parse {
        message: "expected a dataset envelope with a features array, or a bare feature array"
            .to_string(),
    })?;

    Ok(match parsed {
        DatasetBody::Envelope(envelope) => {
            log::debug!(
                "{label}: dataset {:?} (type {:?}) updated at {:?}",
                envelope.name,
                envelope.kind,
                envelope.updated_at,
            );
            envelope.features
        }
        DatasetBody::Bare(features) => features,
    })
}

/// A hosted dataset adapter.
#[derive(Debug, Clone)]
pub struct DatasetSource {
    settings: SourceSettings,
    base_url: String,
    dataset: String,
    client: reqwest::Client,
}

impl DatasetSource {
    /// Creates an adapter for `dataset` on the default dataset host.
    #[must_use]
    pub fn new(
        settings: SourceSettings,
        dataset: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            settings,
            base_url: DATASET_BASE_URL.to_string(),
            dataset: dataset.into(),
            client,
        }
    }

    /// Points the adapter at a different dataset host.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl FacilitySource for DatasetSource {
    fn id(&self) -> &str {
        &self.settings.id
    }

    fn name(&self) -> &str {
        &self.settings.name
    }

    fn field_mapping(&self) -> &FieldMapping {
        &self.settings.fields
    }

    fn request_url(&self, _query: &SourceQuery) -> String {
        build_dataset_url(&self.base_url, &self.dataset)
    }

    async fn fetch(&self, query: &SourceQuery) -> Result<Normalized, SourceError> {
        let url = self.request_url(query);
        log::info!(
            "{}: fetching dataset {} ({query})",
            self.settings.id,
            self.dataset
        );

        let body = http::get_json(&self.client, &url, &self.settings.id).await?;
        let records = parse_dataset_body(body, &self.settings.id)?;

        let normalized = normalize_features(
            &records,
            &self.settings.id,
            &self.settings.fields,
            self.settings.geometry,
        );
        log::info!(
            "{}: normalized {} features from {} records",
            self.settings.id,
            normalized.features.len(),
            records.len()
        );

        Ok(normalized)
    }
}

#[cfg(test)]
mod tests {
    use response_planner_source_models::Position;

    use super::*;
    use crate::diagnostics::{DiagnosticKind, Diagnostics, drain};
    use crate::test_support::serve_once;

    fn fire_settings() -> SourceSettings {
        SourceSettings::new("fire_stations", "Fire Stations").with_fields(
            FieldMapping::builder()
                .category("SITE_TYPE")
                .label("SITE_NAME")
                .build(),
        )
    }

    #[test]
    fn builds_dataset_url() {
        assert_eq!(
            build_dataset_url("https://host/datasets/", "fire-stations"),
            "https://host/datasets/fire-stations.json"
        );
        let source = DatasetSource::new(fire_settings(), "fire-stations", reqwest::Client::new());
        assert_eq!(
            source.request_url(&SourceQuery::all()),
            format!("{DATASET_BASE_URL}/fire-stations.json")
        );
    }

    #[test]
    fn parses_envelope_and_bare_array() {
        let envelope = serde_json::json!({
            "name": "Fire Stations",
            "type": "FeatureCollection",
            "updated_at": "2024-05-01T00:00:00Z",
            "features": [{"properties": {}, "geometry": {"coordinates": [0.0, 0.0]}}]
        });
        assert_eq!(parse_dataset_body(envelope, "t").unwrap().len(), 1);

        let bare = serde_json::json!([{}, {}]);
        assert_eq!(parse_dataset_body(bare, "t").unwrap().len(), 2);
    }

    #[test]
    fn rejects_body_without_features() {
        let err = parse_dataset_body(serde_json::json!({"name": "x"}), "t").unwrap_err();
        assert!(matches!(err, SourceError::Parse { .. }));
    }

    #[tokio::test]
    async fn fetches_and_normalizes_envelope() {
        let body = serde_json::json!({
            "features": [{
                "properties": {"SITE_TYPE": "FIRE STATION", "SITE_NAME": "Station 1"},
                "geometry": {"coordinates": [-117.0, 33.7]}
            }]
        });
        let base = serve_once("200 OK", body.to_string()).await;
        let source =
            DatasetSource::new(fire_settings(), "fire", reqwest::Client::new()).with_base_url(base);

        let (diagnostics, mut rx) = Diagnostics::channel();
        let features = source.query(&SourceQuery::all(), &diagnostics).await;

        assert_eq!(features.len(), 1);
        assert_eq!(features[0].category, "FIRE STATION");
        assert_eq!(features[0].label, "Station 1");
        assert_eq!(features[0].position, Position::from_lng_lat(-117.0, 33.7));
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn transport_failure_yields_empty_and_reports() {
        let source = DatasetSource::new(fire_settings(), "fire", reqwest::Client::new())
            .with_base_url("http://127.0.0.1:1");

        let (diagnostics, mut rx) = Diagnostics::channel();
        let features = source.query(&SourceQuery::all(), &diagnostics).await;

        assert!(features.is_empty());
        let seen = drain(&mut rx);
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, DiagnosticKind::Transport);
        assert_eq!(seen[0].source_id, "fire_stations");
    }

    #[tokio::test]
    async fn error_status_and_garbage_body_are_reported() {
        let base = serve_once("503 Service Unavailable", "{}".to_string()).await;
        let source =
            DatasetSource::new(fire_settings(), "fire", reqwest::Client::new()).with_base_url(base);
        let (diagnostics, mut rx) = Diagnostics::channel();
        assert!(source.query(&SourceQuery::all(), &diagnostics).await.is_empty());
        assert_eq!(drain(&mut rx)[0].kind, DiagnosticKind::Transport);

        let base = serve_once("200 OK", "<html>oops</html>".to_string()).await;
        let source =
            DatasetSource::new(fire_settings(), "fire", reqwest::Client::new()).with_base_url(base);
        assert!(source.query(&SourceQuery::all(), &diagnostics).await.is_empty());
        assert_eq!(drain(&mut rx)[0].kind, DiagnosticKind::Parse);
    }

    #[tokio::test]
    async fn dropped_geometry_is_reported_per_record() {
        let body = serde_json::json!([
            {"properties": {"SITE_NAME": "A"}, "geometry": {"coordinates": [-117.0, 33.7]}},
            {"properties": {"SITE_NAME": "B"}}
        ]);
        let base = serve_once("200 OK", body.to_string()).await;
        let source =
            DatasetSource::new(fire_settings(), "fire", reqwest::Client::new()).with_base_url(base);

        let (diagnostics, mut rx) = Diagnostics::channel();
        let features = source.query(&SourceQuery::all(), &diagnostics).await;

        assert_eq!(features.len(), 1);
        let seen = drain(&mut rx);
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, DiagnosticKind::Geometry);
        assert!(seen[0].message.contains("record 1"));
    }
}
