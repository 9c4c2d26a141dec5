//! Normalizes raw feature records into canonical [`Feature`] values.
//!
//! Uses the source's [`FieldMapping`] to pull `category` and `label` out of
//! each record's properties, regardless of the provider's field naming.
//! Records are expected in `GeoJSON` feature shape (`properties` +
//! `geometry`); Esri geometries (`x`/`y`, `rings`, `paths`) are accepted in
//! the `geometry` slot as well.

use std::collections::BTreeMap;
use std::fmt;

use geo::Centroid;
use response_planner_source_models::{
    Feature, FeatureId, FieldMapping, GeometryPolicy, Position, PropertyValue,
};

/// Attribute names tried for the feature id when no id field is mapped and
/// the record has no top-level `id`.
const FALLBACK_ID_FIELDS: &[&str] = &["OBJECTID", "FID"];

/// Output of a normalization pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    /// Features that passed normalization.
    pub features: Vec<Feature>,
    /// Records dropped because they had no usable point geometry.
    pub rejected: Vec<RejectedRecord>,
}

/// A record dropped during normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecord {
    /// Position of the record in the response.
    pub index: usize,
    /// The record's id, when one could be read.
    pub id: Option<FeatureId>,
    /// Why it was dropped.
    pub reason: String,
}

impl fmt::Display for RejectedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "record {} (id {id}): {}", self.index, self.reason),
            None => write!(f, "record {}: {}", self.index, self.reason),
        }
    }
}

/// Normalizes a list of raw records.
///
/// A record with missing or unusable geometry is dropped and listed in
/// [`Normalized::rejected`]; it never fails the batch. Missing mapped fields
/// become empty strings.
#[must_use]
pub fn normalize_features(
    records: &[serde_json::Value],
    source_id: &str,
    fields: &FieldMapping,
    policy: GeometryPolicy,
) -> Normalized {
    let mut normalized = Normalized {
        features: Vec::with_capacity(records.len()),
        rejected: Vec::new(),
    };

    for (index, record) in records.iter().enumerate() {
        let props = record
            .get("properties")
            .and_then(serde_json::Value::as_object);
        let id = extract_id(record, props, fields, index);

        let position = match extract_position(record.get("geometry"), policy) {
            Ok(position) => position,
            Err(reason) => {
                normalized.rejected.push(RejectedRecord {
                    index,
                    id: Some(id),
                    reason,
                });
                continue;
            }
        };

        normalized.features.push(Feature {
            id,
            source_id: source_id.to_string(),
            position,
            category: mapped_text(props, fields.category()),
            label: mapped_text(props, fields.label()),
            properties: scalar_properties(props),
        });
    }

    normalized
}

/// Reads a mapped field as text. Absent, null, or non-scalar values become
/// an empty string.
fn mapped_text(props: Option<&serde_json::Map<String, serde_json::Value>>, field: &str) -> String {
    match props.and_then(|p| p.get(field)) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(serde_json::Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Resolves the feature id: mapped field, then `GeoJSON` `id`, then
/// `OBJECTID`/`FID`, then the record's index.
fn extract_id(
    record: &serde_json::Value,
    props: Option<&serde_json::Map<String, serde_json::Value>>,
    fields: &FieldMapping,
    index: usize,
) -> FeatureId {
    let mapped = fields
        .id()
        .and_then(|field| props.and_then(|p| p.get(field)))
        .and_then(id_from_value);
    if let Some(id) = mapped {
        return id;
    }

    if let Some(id) = record.get("id").and_then(id_from_value) {
        return id;
    }

    FALLBACK_ID_FIELDS
        .iter()
        .find_map(|field| props.and_then(|p| p.get(*field)).and_then(id_from_value))
        .unwrap_or_else(|| FeatureId::Number(i64::try_from(index).unwrap_or(i64::MAX)))
}

fn id_from_value(value: &serde_json::Value) -> Option<FeatureId> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(FeatureId::Text(s.clone())),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(FeatureId::Number)
            .or_else(|| Some(FeatureId::Text(n.to_string()))),
        _ => None,
    }
}

/// Copies the scalar properties of a record. Nested values and nulls are
/// skipped; booleans are kept as text.
fn scalar_properties(
    props: Option<&serde_json::Map<String, serde_json::Value>>,
) -> BTreeMap<String, PropertyValue> {
    let Some(props) = props else {
        return BTreeMap::new();
    };

    props
        .iter()
        .filter_map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => PropertyValue::Text(s.clone()),
                serde_json::Value::Number(n) => n
                    .as_i64()
                    .map(PropertyValue::Integer)
                    .or_else(|| n.as_f64().map(PropertyValue::Float))?,
                serde_json::Value::Bool(b) => PropertyValue::Text(b.to_string()),
                _ => return None,
            };
            Some((key.clone(), value))
        })
        .collect()
}

/// Extracts a point from a record's geometry.
///
/// A `[lng, lat]` coordinate pair or an Esri `{x, y}` point is always
/// accepted. Anything else is rejected or reduced to its centroid depending
/// on `policy`.
fn extract_position(
    geometry: Option<&serde_json::Value>,
    policy: GeometryPolicy,
) -> Result<Position, String> {
    let geometry = match geometry {
        None | Some(serde_json::Value::Null) => return Err("missing geometry".to_string()),
        Some(g) => g,
    };

    let position = if let Some(position) = point_pair(geometry) {
        position
    } else if let (Some(x), Some(y)) = (
        geometry.get("x").and_then(serde_json::Value::as_f64),
        geometry.get("y").and_then(serde_json::Value::as_f64),
    ) {
        Position::from_lng_lat(x, y)
    } else {
        match policy {
            GeometryPolicy::Reject => {
                return Err(format!(
                    "non-point geometry ({})",
                    geometry_type(geometry).unwrap_or("unknown")
                ));
            }
            GeometryPolicy::Centroid => centroid(geometry)?,
        }
    };

    if position.is_valid() {
        Ok(position)
    } else {
        Err(format!(
            "coordinates out of range (lng={}, lat={})",
            position.longitude, position.latitude
        ))
    }
}

/// `{"coordinates": [lng, lat, ...]}` with or without a `type` member.
fn point_pair(geometry: &serde_json::Value) -> Option<Position> {
    let coords = geometry.get("coordinates")?.as_array()?;
    let lng = coords.first()?.as_f64()?;
    let lat = coords.get(1)?.as_f64()?;
    Some(Position::from_lng_lat(lng, lat))
}

fn geometry_type(geometry: &serde_json::Value) -> Option<&str> {
    if let Some(kind) = geometry.get("type").and_then(serde_json::Value::as_str) {
        return Some(kind);
    }
    if geometry.get("rings").is_some() {
        return Some("esri rings");
    }
    if geometry.get("paths").is_some() {
        return Some("esri paths");
    }
    None
}

/// Reduces a `GeoJSON` or Esri geometry to its centroid.
fn centroid(geometry: &serde_json::Value) -> Result<Position, String> {
    let geojson_value = match esri_to_geojson(geometry) {
        Some(converted) => converted,
        None => geometry.clone(),
    };

    let parsed: geojson::Geometry = serde_json::from_value(geojson_value)
        .map_err(|e| format!("unreadable geometry: {e}"))?;
    let shape = geo::Geometry::<f64>::try_from(parsed)
        .map_err(|e| format!("unsupported geometry: {e}"))?;
    let point = shape
        .centroid()
        .ok_or_else(|| "empty geometry has no centroid".to_string())?;

    Ok(Position::from_lng_lat(point.x(), point.y()))
}

/// Converts Esri JSON polygons (`rings`) and polylines (`paths`) to their
/// `GeoJSON` equivalents. Returns `None` for anything else.
fn esri_to_geojson(esri_geom: &serde_json::Value) -> Option<serde_json::Value> {
    if let Some(rings) = esri_geom.get("rings").and_then(serde_json::Value::as_array) {
        if rings.len() == 1 {
            return Some(serde_json::json!({
                "type": "Polygon",
                "coordinates": rings,
            }));
        }
        // Holes are not distinguished from exteriors; each ring becomes its
        // own polygon.
        let polygons: Vec<serde_json::Value> =
            rings.iter().map(|ring| serde_json::json!([ring])).collect();
        return Some(serde_json::json!({
            "type": "MultiPolygon",
            "coordinates": polygons,
        }));
    }

    if let Some(paths) = esri_geom.get("paths").and_then(serde_json::Value::as_array) {
        if paths.len() == 1 {
            return Some(serde_json::json!({
                "type": "LineString",
                "coordinates": paths[0],
            }));
        }
        return Some(serde_json::json!({
            "type": "MultiLineString",
            "coordinates": paths,
        }));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site_mapping() -> FieldMapping {
        FieldMapping::builder()
            .category("SITE_TYPE")
            .label("SITE_NAME")
            .build()
    }

    #[test]
    fn normalizes_mapped_fields_and_point() {
        let records = vec![serde_json::json!({
            "properties": {"SITE_TYPE": "FIRE STATION", "SITE_NAME": "Station 1"},
            "geometry": {"coordinates": [-117.0, 33.7]}
        })];
        let out = normalize_features(&records, "fire", &site_mapping(), GeometryPolicy::Reject);

        assert!(out.rejected.is_empty());
        assert_eq!(out.features.len(), 1);
        let feature = &out.features[0];
        assert_eq!(feature.category, "FIRE STATION");
        assert_eq!(feature.label, "Station 1");
        assert_eq!(feature.source_id, "fire");
        assert!((feature.position.longitude - -117.0).abs() < f64::EPSILON);
        assert!((feature.position.latitude - 33.7).abs() < f64::EPSILON);
        assert_eq!(
            feature.property("SITE_NAME"),
            Some(&PropertyValue::Text("Station 1".to_string()))
        );
    }

    #[test]
    fn absent_mapped_fields_become_empty_strings() {
        let records = vec![
            serde_json::json!({
                "properties": {"SITE_NAME": "Station 2"},
                "geometry": {"type": "Point", "coordinates": [-117.1, 33.8]}
            }),
            serde_json::json!({
                "geometry": {"type": "Point", "coordinates": [-117.2, 33.9]}
            }),
        ];
        let out = normalize_features(&records, "fire", &site_mapping(), GeometryPolicy::Reject);

        assert_eq!(out.features.len(), 2);
        assert_eq!(out.features[0].category, "");
        assert_eq!(out.features[0].label, "Station 2");
        assert_eq!(out.features[1].category, "");
        assert_eq!(out.features[1].label, "");
    }

    #[test]
    fn numeric_mapped_values_are_rendered_as_text() {
        let records = vec![serde_json::json!({
            "properties": {"TYPE": 7, "NAME": "Depot"},
            "geometry": {"coordinates": [-100.0, 40.0]}
        })];
        let out = normalize_features(
            &records,
            "depots",
            &FieldMapping::default(),
            GeometryPolicy::Reject,
        );
        assert_eq!(out.features[0].category, "7");
    }

    #[test]
    fn id_prefers_mapped_then_geojson_then_objectid_then_index() {
        let mapping = FieldMapping::builder().id("FACILITY_ID").build();
        let records = vec![
            serde_json::json!({
                "id": 99,
                "properties": {"FACILITY_ID": "H-1"},
                "geometry": {"coordinates": [-100.0, 40.0]}
            }),
            serde_json::json!({
                "id": 99,
                "properties": {},
                "geometry": {"coordinates": [-100.0, 40.0]}
            }),
            serde_json::json!({
                "properties": {"OBJECTID": 12},
                "geometry": {"coordinates": [-100.0, 40.0]}
            }),
            serde_json::json!({
                "properties": {},
                "geometry": {"coordinates": [-100.0, 40.0]}
            }),
        ];
        let out = normalize_features(&records, "s", &mapping, GeometryPolicy::Reject);
        let ids: Vec<FeatureId> = out.features.into_iter().map(|f| f.id).collect();
        assert_eq!(
            ids,
            vec![
                FeatureId::Text("H-1".to_string()),
                FeatureId::Number(99),
                FeatureId::Number(12),
                FeatureId::Number(3),
            ]
        );
    }

    #[test]
    fn accepts_esri_xy_point() {
        let records = vec![serde_json::json!({
            "properties": {"OBJECTID": 1, "TYPE": "HOSPITAL", "NAME": "General"},
            "geometry": {"x": -118.25, "y": 34.05}
        })];
        let out = normalize_features(
            &records,
            "hospitals",
            &FieldMapping::default(),
            GeometryPolicy::Reject,
        );
        assert_eq!(out.features.len(), 1);
        assert!((out.features[0].position.latitude - 34.05).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_polygon_under_reject_policy_without_failing_batch() {
        let records = vec![
            serde_json::json!({
                "properties": {"NAME": "Campus"},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0], [0.0, 0.0]]]
                }
            }),
            serde_json::json!({
                "properties": {"NAME": "Station"},
                "geometry": {"coordinates": [1.0, 1.0]}
            }),
            serde_json::json!({"properties": {"NAME": "Nowhere"}, "geometry": null}),
        ];
        let out = normalize_features(
            &records,
            "s",
            &FieldMapping::default(),
            GeometryPolicy::Reject,
        );

        assert_eq!(out.features.len(), 1);
        assert_eq!(out.features[0].label, "Station");
        assert_eq!(out.rejected.len(), 2);
        assert_eq!(out.rejected[0].index, 0);
        assert!(out.rejected[0].reason.contains("Polygon"));
        assert_eq!(out.rejected[1].reason, "missing geometry");
    }

    #[test]
    fn reduces_polygon_to_centroid_under_centroid_policy() {
        let records = vec![serde_json::json!({
            "properties": {"NAME": "Campus"},
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0], [0.0, 0.0]]]
            }
        })];
        let out = normalize_features(
            &records,
            "s",
            &FieldMapping::default(),
            GeometryPolicy::Centroid,
        );

        assert_eq!(out.features.len(), 1);
        let position = out.features[0].position;
        assert!((position.longitude - 1.0).abs() < 1e-9);
        assert!((position.latitude - 1.0).abs() < 1e-9);
    }

    #[test]
    fn reduces_esri_rings_to_centroid() {
        let records = vec![serde_json::json!({
            "properties": {"NAME": "Yard"},
            "geometry": {"rings": [[[10.0, 10.0], [14.0, 10.0], [14.0, 14.0], [10.0, 14.0], [10.0, 10.0]]]}
        })];
        let out = normalize_features(
            &records,
            "s",
            &FieldMapping::default(),
            GeometryPolicy::Centroid,
        );
        let position = out.features[0].position;
        assert!((position.longitude - 12.0).abs() < 1e-9);
        assert!((position.latitude - 12.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        let records = vec![serde_json::json!({
            "properties": {},
            "geometry": {"x": 6_500_000.0, "y": 1_900_000.0}
        })];
        let out = normalize_features(
            &records,
            "s",
            &FieldMapping::default(),
            GeometryPolicy::Centroid,
        );
        assert!(out.features.is_empty());
        assert!(out.rejected[0].reason.starts_with("coordinates out of range"));
    }

    #[test]
    fn skips_nested_and_null_properties() {
        let records = vec![serde_json::json!({
            "properties": {"NAME": "A", "BEDS": 120, "RATIO": 0.5, "OPEN": true, "META": {"x": 1}, "NOTE": null},
            "geometry": {"coordinates": [0.0, 0.0]}
        })];
        let out = normalize_features(
            &records,
            "s",
            &FieldMapping::default(),
            GeometryPolicy::Reject,
        );
        let props = &out.features[0].properties;
        assert_eq!(props.get("BEDS"), Some(&PropertyValue::Integer(120)));
        assert_eq!(props.get("RATIO"), Some(&PropertyValue::Float(0.5)));
        assert_eq!(props.get("OPEN"), Some(&PropertyValue::Text("true".to_string())));
        assert!(!props.contains_key("META"));
        assert!(!props.contains_key("NOTE"));
    }
}
