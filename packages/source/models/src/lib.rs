#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Canonical facility feature model and data source configuration types.
//!
//! Every facility data provider (feature service, hosted dataset, etc.)
//! produces [`Feature`] records that conform to this shared schema, so the
//! icon resolver and marker layer never need to know which provider a
//! feature came from.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Raw field read for the `category` property when no override is given.
pub const DEFAULT_CATEGORY_FIELD: &str = "TYPE";

/// Raw field read for the `label` property when no override is given.
pub const DEFAULT_LABEL_FIELD: &str = "NAME";

// ── Geometry ─────────────────────────────────────────────────────────────

/// A WGS84 point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Latitude in decimal degrees.
    pub latitude: f64,
}

impl Position {
    /// Creates a position from a `GeoJSON`-ordered `[lng, lat]` pair.
    #[must_use]
    pub const fn from_lng_lat(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// Creates a position from a map-ordered `(lat, lng)` pair.
    #[must_use]
    pub const fn from_lat_lng(latitude: f64, longitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// Returns `true` if both coordinates are finite and inside the WGS84
    /// range.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// Error returned when a latitude/longitude pair is outside the WGS84 range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvalidPositionError {
    /// The rejected position.
    pub position: Position,
}

impl fmt::Display for InvalidPositionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid position lat={} lng={}: expected lat in [-90, 90] and lng in [-180, 180]",
            self.position.latitude, self.position.longitude
        )
    }
}

impl std::error::Error for InvalidPositionError {}

/// What an adapter does with geometries that are not a single point.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GeometryPolicy {
    /// Drop the record.
    #[default]
    Reject,
    /// Reduce the geometry to its centroid.
    Centroid,
}

// ── Feature ──────────────────────────────────────────────────────────────

/// Source-local feature identifier. Unique within one source only.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureId {
    /// Numeric identifier (e.g. an `OBJECTID`).
    Number(i64),
    /// String identifier.
    Text(String),
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// A scalar property value carried over from the raw record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Integer value.
    Integer(i64),
    /// Floating point value.
    Float(f64),
    /// String value.
    Text(String),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// A facility normalized to the canonical schema.
///
/// `category` and `label` are always present. When the source record lacks
/// the mapped field they are empty strings rather than missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    /// Identifier from the originating source.
    pub id: FeatureId,
    /// Id of the adapter that produced this feature.
    pub source_id: String,
    /// Point location.
    pub position: Position,
    /// Facility type, used for icon lookup.
    pub category: String,
    /// Display name.
    pub label: String,
    /// Raw scalar properties keyed by the source's own field names.
    pub properties: BTreeMap<String, PropertyValue>,
}

impl Feature {
    /// Looks up a raw property by its source field name.
    #[must_use]
    pub fn property(&self, field: &str) -> Option<&PropertyValue> {
        self.properties.get(field)
    }
}

// ── Field mapping ────────────────────────────────────────────────────────

/// Maps canonical property names to the raw field names of one source.
///
/// Resolved once (via [`FieldMapping::builder`] or deserialization) and
/// immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "FieldMappingOverride", into = "FieldMappingOverride")]
pub struct FieldMapping {
    category: String,
    label: String,
    id: Option<String>,
}

impl FieldMapping {
    /// Starts a mapping from the defaults (`TYPE` / `NAME`).
    #[must_use]
    pub fn builder() -> FieldMappingBuilder {
        FieldMappingBuilder::default()
    }

    /// Raw field holding the facility category.
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Raw field holding the display label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Raw field holding the feature id, if one is configured.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`FieldMapping`]. Unset entries fall back to the defaults.
#[derive(Debug, Clone, Default)]
pub struct FieldMappingBuilder {
    category: Option<String>,
    label: Option<String>,
    id: Option<String>,
}

impl FieldMappingBuilder {
    /// Overrides the raw category field.
    #[must_use]
    pub fn category(mut self, field: impl Into<String>) -> Self {
        self.category = Some(field.into());
        self
    }

    /// Overrides the raw label field.
    #[must_use]
    pub fn label(mut self, field: impl Into<String>) -> Self {
        self.label = Some(field.into());
        self
    }

    /// Sets the raw id field.
    #[must_use]
    pub fn id(mut self, field: impl Into<String>) -> Self {
        self.id = Some(field.into());
        self
    }

    /// Resolves the mapping.
    #[must_use]
    pub fn build(self) -> FieldMapping {
        FieldMapping {
            category: self
                .category
                .unwrap_or_else(|| DEFAULT_CATEGORY_FIELD.to_string()),
            label: self.label.unwrap_or_else(|| DEFAULT_LABEL_FIELD.to_string()),
            id: self.id,
        }
    }
}

/// The `[fields]` table as written in a source definition. Every key is
/// optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldMappingOverride {
    /// Raw category field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Raw label field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Raw id field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl From<FieldMappingOverride> for FieldMapping {
    fn from(value: FieldMappingOverride) -> Self {
        FieldMappingBuilder {
            category: value.category,
            label: value.label,
            id: value.id,
        }
        .build()
    }
}

impl From<FieldMapping> for FieldMappingOverride {
    fn from(value: FieldMapping) -> Self {
        Self {
            category: Some(value.category),
            label: Some(value.label),
            id: value.id,
        }
    }
}

// ── Query ────────────────────────────────────────────────────────────────

/// A geographic query dispatched to every source.
///
/// Without a point the query asks for the full dataset. With a point it asks
/// for features relevant to that location; sources that cannot filter
/// server-side may return everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceQuery {
    point: Option<Position>,
    tag: Option<String>,
}

impl SourceQuery {
    /// Query for the full dataset.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            point: None,
            tag: None,
        }
    }

    /// Query for features near `point`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPositionError`] if the point is outside the WGS84
    /// range.
    pub fn near(point: Position) -> Result<Self, InvalidPositionError> {
        if !point.is_valid() {
            return Err(InvalidPositionError { position: point });
        }
        Ok(Self {
            point: Some(point),
            tag: None,
        })
    }

    /// Attaches a free-form tag used in log lines.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// The optional point.
    #[must_use]
    pub const fn point(&self) -> Option<Position> {
        self.point
    }

    /// The optional tag.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }
}

impl fmt::Display for SourceQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.point {
            Some(point) => write!(f, "near {point}")?,
            None => f.write_str("all")?,
        }
        if let Some(tag) = &self.tag {
            write!(f, " [{tag}]")?;
        }
        Ok(())
    }
}

// ── Source definitions ───────────────────────────────────────────────────

/// A facility data source, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDefinition {
    /// Unique identifier (e.g., `"fire_stations"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Disabled sources stay registered but are skipped at dispatch.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// How to fetch the raw data.
    pub fetcher: FetcherConfig,
    /// Field name overrides.
    #[serde(default)]
    pub fields: FieldMapping,
    /// Handling of non-point geometries.
    #[serde(default)]
    pub geometry: GeometryPolicy,
}

const fn default_enabled() -> bool {
    true
}

impl SourceDefinition {
    /// Returns the source identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the human-readable source name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// How to fetch facility data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FetcherConfig {
    /// `ArcGIS` REST feature service layer.
    FeatureService {
        /// Service name under the services root (e.g., `"Fire_Stations"`).
        service_name: String,
        /// Layer index within the `FeatureServer`.
        service_index: u32,
        /// Overrides the built-in services root.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
    },
    /// Hosted dataset returning a feature envelope.
    Dataset {
        /// Dataset identifier (e.g., `"fire-stations"`).
        dataset: String,
        /// Overrides the built-in dataset host.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
    },
}

impl FetcherConfig {
    /// Short name of the fetcher kind, for listings.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::FeatureService { .. } => "feature_service",
            Self::Dataset { .. } => "dataset",
        }
    }
}
