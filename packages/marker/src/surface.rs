//! The rendering surface markers are drawn on.
//!
//! The map widget itself is external; it is seen only through
//! [`RenderSurface`]. [`HeadlessSurface`] records calls instead of drawing,
//! for the CLI and tests.

use response_planner_source_models::Position;

use crate::icon::IconAsset;

/// A surface that can draw and resize markers.
pub trait RenderSurface {
    /// Surface-side reference to a drawn marker.
    type Handle;

    /// Draws a marker and returns its handle.
    fn place_marker(
        &mut self,
        position: Position,
        icon: &IconAsset,
        size_px: u32,
        title: &str,
    ) -> Self::Handle;

    /// Changes a drawn marker's size.
    fn resize_marker(&mut self, handle: &Self::Handle, size_px: u32);
}

/// A marker as recorded by [`HeadlessSurface`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedMarker {
    /// Where it was placed.
    pub position: Position,
    /// Icon file name.
    pub icon: &'static str,
    /// Current size.
    pub size_px: u32,
    /// Hover title.
    pub title: String,
}

/// Records placements and resizes without drawing anything.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    markers: Vec<RecordedMarker>,
    resizes: usize,
}

impl HeadlessSurface {
    /// Creates an empty surface.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Markers drawn so far, in placement order.
    #[must_use]
    pub fn markers(&self) -> &[RecordedMarker] {
        &self.markers
    }

    /// Number of resize calls received.
    #[must_use]
    pub const fn resize_count(&self) -> usize {
        self.resizes
    }
}

impl RenderSurface for HeadlessSurface {
    type Handle = usize;

    fn place_marker(
        &mut self,
        position: Position,
        icon: &IconAsset,
        size_px: u32,
        title: &str,
    ) -> usize {
        self.markers.push(RecordedMarker {
            position,
            icon: icon.file_name,
            size_px,
            title: title.to_string(),
        });
        self.markers.len() - 1
    }

    fn resize_marker(&mut self, handle: &usize, size_px: u32) {
        self.resizes += 1;
        if let Some(marker) = self.markers.get_mut(*handle) {
            marker.size_px = size_px;
        } else {
            log::warn!("Resize for unknown marker handle {handle}");
        }
    }
}
