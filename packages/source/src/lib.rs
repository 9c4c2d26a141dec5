#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Facility data source adapters and normalization logic.
//!
//! Each data provider implements the [`FacilitySource`] trait to define how
//! raw data is requested, parsed, and mapped onto the canonical
//! [`Feature`] schema. The [`registry::SourceRegistry`] fans one query out
//! to every enabled source without waiting for the slowest one.

pub mod config;
pub mod dataset;
pub mod diagnostics;
pub mod feature_service;
pub mod http;
pub mod normalize;
pub mod progress;
pub mod registry;

#[cfg(test)]
mod test_support;

use async_trait::async_trait;
use response_planner_source_models::{
    Feature, FieldMapping, GeometryPolicy, SourceDefinition, SourceQuery,
};

use crate::diagnostics::{DiagnosticKind, Diagnostics};
pub use crate::normalize::{Normalized, RejectedRecord};

/// Errors that can occur during data source operations.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// Requested URL.
        url: String,
        /// Status code returned.
        status: u16,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The body parsed but did not have the expected shape.
    #[error("Unexpected response: {message}")]
    Parse {
        /// Description of what went wrong.
        message: String,
    },
}

impl SourceError {
    /// Maps the error onto the diagnostics taxonomy.
    #[must_use]
    pub const fn kind(&self) -> DiagnosticKind {
        match self {
            Self::Http(_) | Self::Status { .. } => DiagnosticKind::Transport,
            Self::Json(_) | Self::Parse { .. } => DiagnosticKind::Parse,
        }
    }
}

/// Settings shared by every adapter kind.
#[derive(Debug, Clone)]
pub struct SourceSettings {
    /// Unique source identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Resolved field mapping.
    pub fields: FieldMapping,
    /// Handling of non-point geometries.
    pub geometry: GeometryPolicy,
}

impl SourceSettings {
    /// Settings with the default field mapping and geometry policy.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            fields: FieldMapping::default(),
            geometry: GeometryPolicy::default(),
        }
    }

    /// Replaces the field mapping.
    #[must_use]
    pub fn with_fields(mut self, fields: FieldMapping) -> Self {
        self.fields = fields;
        self
    }

    /// Replaces the geometry policy.
    #[must_use]
    pub const fn with_geometry(mut self, geometry: GeometryPolicy) -> Self {
        self.geometry = geometry;
        self
    }
}

impl From<&SourceDefinition> for SourceSettings {
    fn from(def: &SourceDefinition) -> Self {
        Self {
            id: def.id.clone(),
            name: def.name.clone(),
            fields: def.fields.clone(),
            geometry: def.geometry,
        }
    }
}

/// Trait that all facility data sources must implement.
///
/// Implementations share no mutable state, so any number of queries may run
/// concurrently against the same instance.
#[async_trait]
pub trait FacilitySource: Send + Sync {
    /// Returns a unique identifier for this source (e.g., `"fire_stations"`).
    fn id(&self) -> &str;

    /// Returns the human-readable name of this source.
    fn name(&self) -> &str;

    /// Returns the resolved raw field names for `category` and `label`.
    fn field_mapping(&self) -> &FieldMapping;

    /// Builds the request URL for `query`.
    fn request_url(&self, query: &SourceQuery) -> String;

    /// Issues one request and normalizes the response.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the request fails or the body cannot be
    /// parsed.
    async fn fetch(&self, query: &SourceQuery) -> Result<Normalized, SourceError>;

    /// Runs [`Self::fetch`] and never fails.
    ///
    /// Errors are reported to `diagnostics` and yield an empty sequence.
    /// Records dropped for bad geometry are reported individually.
    async fn query(&self, query: &SourceQuery, diagnostics: &Diagnostics) -> Vec<Feature> {
        match self.fetch(query).await {
            Ok(normalized) => {
                for rejected in &normalized.rejected {
                    diagnostics.report(
                        self.id(),
                        DiagnosticKind::Geometry,
                        rejected.to_string(),
                    );
                }
                normalized.features
            }
            Err(e) => {
                diagnostics.report(self.id(), e.kind(), e.to_string());
                Vec::new()
            }
        }
    }
}
