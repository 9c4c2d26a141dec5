//! `ArcGIS` REST feature service adapter.
//!
//! Queries one `FeatureServer` layer with a fixed query string: every field,
//! an unrestricted `where` clause, and an envelope covering the continental
//! United States. Esri JSON features (`attributes` + `geometry`) are
//! reshaped into `GeoJSON`-style records before normalization. The point of
//! a [`SourceQuery`] is ignored; the service is always queried in full.

use async_trait::async_trait;
use response_planner_source_models::{FieldMapping, SourceQuery};

use crate::normalize::{Normalized, normalize_features};
use crate::{FacilitySource, SourceError, SourceSettings, http};

/// Root of the hosted feature services.
pub const FEATURE_SERVICE_BASE_URL: &str =
    "https://services1.arcgis.com/Hp6G80Pky0om7QvQ/arcgis/rest/services";

/// Continental envelope `[xmin, ymin, xmax, ymax]` in WGS84.
pub const CONTINENTAL_ENVELOPE: [f64; 4] = [-125.0, 24.0, -66.0, 50.0];

/// Builds the query URL for a feature service layer.
#[must_use]
pub fn build_query_url(base_url: &str, service_name: &str, service_index: u32) -> String {
    let base = base_url.trim_end_matches('/');
    let [xmin, ymin, xmax, ymax] = CONTINENTAL_ENVELOPE;
    format!(
        "{base}/{service_name}/FeatureServer/{service_index}/query\
         ?where=1%3D1\
         &outFields=*\
         &geometry={xmin},{ymin},{xmax},{ymax}\
         &geometryType=esriGeometryEnvelope\
         &inSR=4326\
         &spatialRel=esriSpatialRelIntersects\
         &outSR=4326\
         &f=json"
    )
}

/// Extracts the feature records from an Esri JSON query response.
///
/// # Errors
///
/// Returns [`SourceError::Parse`] if the body carries an `error` member or
/// has no `features` array.
pub fn parse_query_body(
    body: &serde_json::Value,
    label: &str,
) -> Result<Vec<serde_json::Value>, SourceError> {
    if let Some(error) = body.get("error") {
        return Err(SourceError::Parse {
            message: format!(
                "ArcGIS API error: {}",
                error
                    .get("message")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("unknown error")
            ),
        });
    }

    let features = body
        .get("features")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| SourceError::Parse {
            message: "No features array in ArcGIS response".to_string(),
        })?;

    if body
        .get("exceededTransferLimit")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false)
    {
        log::warn!(
            "{label}: server truncated the result at {} features (transfer limit)",
            features.len()
        );
    }

    Ok(features
        .iter()
        .map(|feature| {
            serde_json::json!({
                "properties": feature.get("attributes").cloned().unwrap_or_default(),
                "geometry": feature.get("geometry").cloned().unwrap_or_default(),
            })
        })
        .collect())
}

/// A feature service layer adapter.
#[derive(Debug, Clone)]
pub struct FeatureServiceSource {
    settings: SourceSettings,
    base_url: String,
    service_name: String,
    service_index: u32,
    client: reqwest::Client,
}

impl FeatureServiceSource {
    /// Creates an adapter for `service_name` layer `service_index` under the
    /// default services root.
    #[must_use]
    pub fn new(
        settings: SourceSettings,
        service_name: impl Into<String>,
        service_index: u32,
        client: reqwest::Client,
    ) -> Self {
        Self {
            settings,
            base_url: FEATURE_SERVICE_BASE_URL.to_string(),
            service_name: service_name.into(),
            service_index,
            client,
        }
    }

    /// Points the adapter at a different services root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl FacilitySource for FeatureServiceSource {
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
        build_query_url(&self.base_url, &self.service_name, self.service_index)
    }

    async fn fetch(&self, query: &SourceQuery) -> Result<Normalized, SourceError> {
        let url = self.request_url(query);
        log::info!(
            "{}: querying feature service {}/{} ({query})",
            self.settings.id,
            self.service_name,
            self.service_index
        );

        let body = http::get_json(&self.client, &url, &self.settings.id).await?;
        let records = parse_query_body(&body, &self.settings.id)?;

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
    use super::*;

    #[test]
    fn builds_fixed_query_url() {
        let url = build_query_url("https://example.com/rest/services/", "Fire_Stations", 0);
        assert_eq!(
            url,
            "https://example.com/rest/services/Fire_Stations/FeatureServer/0/query\
             ?where=1%3D1&outFields=*&geometry=-125,24,-66,50\
             &geometryType=esriGeometryEnvelope&inSR=4326\
             &spatialRel=esriSpatialRelIntersects&outSR=4326&f=json"
        );
    }

    #[test]
    fn request_url_ignores_point() {
        let source = FeatureServiceSource::new(
            SourceSettings::new("hifld_fire", "Fire"),
            "Fire_Stations",
            2,
            reqwest::Client::new(),
        );
        let near = SourceQuery::near(response_planner_source_models::Position::from_lat_lng(
            33.7, -117.0,
        ))
        .unwrap();
        assert_eq!(source.request_url(&near), source.request_url(&SourceQuery::all()));
        assert!(source.request_url(&near).starts_with(FEATURE_SERVICE_BASE_URL));
        assert!(source.request_url(&near).contains("/Fire_Stations/FeatureServer/2/query?"));
    }

    #[test]
    fn reshapes_esri_features() {
        let body = serde_json::json!({
            "exceededTransferLimit": true,
            "features": [
                {"attributes": {"OBJECTID": 5, "NAME": "Engine 5"}, "geometry": {"x": -117.0, "y": 33.7}}
            ]
        });
        let records = parse_query_body(&body, "t").unwrap();
        assert_eq!(
            records,
            vec![serde_json::json!({
                "properties": {"OBJECTID": 5, "NAME": "Engine 5"},
                "geometry": {"x": -117.0, "y": 33.7}
            })]
        );
    }

    #[test]
    fn api_error_member_is_a_parse_error() {
        let body = serde_json::json!({"error": {"code": 400, "message": "Invalid URL"}});
        let err = parse_query_body(&body, "t").unwrap_err();
        assert_eq!(err.to_string(), "Unexpected response: ArcGIS API error: Invalid URL");
    }

    #[test]
    fn missing_features_is_a_parse_error() {
        let err = parse_query_body(&serde_json::json!({"count": 3}), "t").unwrap_err();
        assert!(matches!(err, SourceError::Parse { .. }));
    }
}
