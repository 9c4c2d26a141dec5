//! Zoom level to marker size lookup.

/// Marker size before any zoom level is known, and outside the table.
pub const DEFAULT_MARKER_SIZE: u32 = 25;

/// Returns the marker edge length in pixels for a zoom level.
#[must_use]
pub const fn marker_size_for_zoom(zoom: u32) -> u32 {
    match zoom {
        12 => 30,
        13..=15 => 50,
        16..=21 => 75,
        _ => DEFAULT_MARKER_SIZE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follows_the_zoom_table() {
        for zoom in 0..12 {
            assert_eq!(marker_size_for_zoom(zoom), 25, "zoom {zoom}");
        }
        assert_eq!(marker_size_for_zoom(12), 30);
        for zoom in 13..=15 {
            assert_eq!(marker_size_for_zoom(zoom), 50, "zoom {zoom}");
        }
        for zoom in 16..=21 {
            assert_eq!(marker_size_for_zoom(zoom), 75, "zoom {zoom}");
        }
        assert_eq!(marker_size_for_zoom(22), 25);
        assert_eq!(marker_size_for_zoom(u32::MAX), 25);
    }
}
