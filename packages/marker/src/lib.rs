#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Presentation side of the facility pipeline.
//!
//! Resolves a feature's category to an embedded icon ([`icon`]), maps zoom
//! levels to marker sizes ([`scale`]), and owns the placed markers
//! ([`marker_set`]) on top of an opaque rendering surface ([`surface`]).

pub mod icon;
pub mod marker_set;
pub mod scale;
pub mod surface;

pub use icon::{IconAsset, IconError, IconMatch, IconResolver, MatchKind};
pub use marker_set::{Marker, MarkerId, MarkerSet};
pub use scale::{DEFAULT_MARKER_SIZE, marker_size_for_zoom};
pub use surface::{HeadlessSurface, RenderSurface};
