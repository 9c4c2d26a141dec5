//! The set of markers currently on the surface.
//!
//! Markers are created by [`MarkerSet::place`] and only ever resized
//! afterwards, by [`MarkerSet::rescale`].

use response_planner_source_models::{Feature, FeatureId, Position};

use crate::icon::IconAsset;
use crate::scale::{DEFAULT_MARKER_SIZE, marker_size_for_zoom};
use crate::surface::RenderSurface;

/// Position of a marker within its set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MarkerId(pub usize);

/// A placed marker.
#[derive(Debug, Clone)]
pub struct Marker<H> {
    /// Set-local id.
    pub id: MarkerId,
    /// Where the marker sits.
    pub position: Position,
    /// Its icon.
    pub icon: IconAsset,
    /// Current edge length in pixels.
    pub size_px: u32,
    /// Hover title (the feature label).
    pub title: String,
    /// Source that produced the feature.
    pub source_id: String,
    /// Feature id within that source.
    pub source_feature_id: FeatureId,
    /// Surface-side handle.
    pub handle: H,
}

/// Owns the placed markers and the surface they are drawn on.
pub struct MarkerSet<S: RenderSurface> {
    surface: S,
    markers: Vec<Marker<S::Handle>>,
    zoom: Option<u32>,
}

impl<S: RenderSurface> MarkerSet<S> {
    /// Creates an empty set drawing on `surface`.
    pub const fn new(surface: S) -> Self {
        Self {
            surface,
            markers: Vec::new(),
            zoom: None,
        }
    }

    /// Size new markers get at the current zoom.
    #[must_use]
    pub fn current_size(&self) -> u32 {
        self.zoom
            .map_or(DEFAULT_MARKER_SIZE, marker_size_for_zoom)
    }

    /// Last zoom level seen by [`Self::rescale`].
    #[must_use]
    pub const fn zoom(&self) -> Option<u32> {
        self.zoom
    }

    /// Draws a marker for `feature` and keeps it.
    pub fn place(&mut self, feature: &Feature, icon: &IconAsset) -> &Marker<S::Handle> {
        let size_px = self.current_size();
        let handle = self
            .surface
            .place_marker(feature.position, icon, size_px, &feature.label);

        let id = MarkerId(self.markers.len());
        self.markers.push(Marker {
            id,
            position: feature.position,
            icon: icon.clone(),
            size_px,
            title: feature.label.clone(),
            source_id: feature.source_id.clone(),
            source_feature_id: feature.id.clone(),
            handle,
        });
        &self.markers[id.0]
    }

    /// Resizes every marker for `zoom`.
    ///
    /// Sizes come straight from the lookup table, so repeated calls with the
    /// same zoom leave everything unchanged.
    pub fn rescale(&mut self, zoom: u32) {
        self.zoom = Some(zoom);
        let size_px = marker_size_for_zoom(zoom);
        for marker in &mut self.markers {
            marker.size_px = size_px;
            self.surface.resize_marker(&marker.handle, size_px);
        }
        log::debug!(
            "Rescaled {} markers to {size_px}px for zoom {zoom}",
            self.markers.len()
        );
    }

    /// Placed markers, in placement order.
    #[must_use]
    pub fn markers(&self) -> &[Marker<S::Handle>] {
        &self.markers
    }

    /// Number of placed markers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    /// Whether no markers are placed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// The surface markers are drawn on.
    #[must_use]
    pub const fn surface(&self) -> &S {
        &self.surface
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::icon::IconResolver;
    use crate::surface::HeadlessSurface;

    fn feature(n: i64, category: &str) -> Feature {
        Feature {
            id: FeatureId::Number(n),
            source_id: "fire_stations".to_string(),
            position: Position::from_lng_lat(-117.0, 33.7),
            category: category.to_string(),
            label: format!("Station {n}"),
            properties: BTreeMap::new(),
        }
    }

    fn placed(count: i64) -> MarkerSet<HeadlessSurface> {
        let resolver = IconResolver::embedded().unwrap();
        let mut set = MarkerSet::new(HeadlessSurface::new());
        for n in 0..count {
            let f = feature(n, "FIRE STATION");
            set.place(&f, resolver.resolve(&f.category));
        }
        set
    }

    fn sizes(set: &MarkerSet<HeadlessSurface>) -> Vec<u32> {
        set.markers().iter().map(|m| m.size_px).collect()
    }

    #[test]
    fn places_at_default_size_before_any_zoom() {
        let set = placed(2);
        assert_eq!(sizes(&set), vec![25, 25]);
        let marker = &set.markers()[1];
        assert_eq!(marker.id, MarkerId(1));
        assert_eq!(marker.title, "Station 1");
        assert_eq!(marker.icon.category, "FIRE & EMERGENCY SERVICES");
        assert_eq!(marker.source_feature_id, FeatureId::Number(1));
        assert_eq!(set.surface().markers()[1].size_px, 25);
    }

    #[test]
    fn zoom_sequence_rescales_every_marker() {
        let mut set = placed(3);
        let mut seen = Vec::new();
        for zoom in [10, 15, 12, 25] {
            set.rescale(zoom);
            let current = sizes(&set);
            assert!(current.windows(2).all(|w| w[0] == w[1]));
            seen.push(current[0]);
        }
        assert_eq!(seen, vec![25, 50, 30, 25]);
        assert!(
            set.surface()
                .markers()
                .iter()
                .all(|m| m.size_px == 25)
        );
    }

    #[test]
    fn rescale_is_idempotent() {
        let mut set = placed(2);
        set.rescale(16);
        let once = sizes(&set);
        set.rescale(16);
        set.rescale(16);
        assert_eq!(sizes(&set), once);
        assert_eq!(once, vec![75, 75]);
    }

    #[test]
    fn markers_placed_after_zoom_use_current_size() {
        let resolver = IconResolver::embedded().unwrap();
        let mut set = MarkerSet::new(HeadlessSurface::new());
        set.rescale(13);
        let f = feature(7, "");
        let marker = set.place(&f, resolver.resolve(&f.category));
        assert_eq!(marker.size_px, 50);
        assert_eq!(marker.icon.category, "INFORMATION TECHNOLOGY");
    }
}
