//! Marker Grid - Viewport-Driven Visibility for Large Marker Sets
//!
//! This library keeps the on-screen subset of a very large population of geographic
//! markers in sync with a moving map viewport. Markers are bucketed into a
//! multi-resolution grid of Web-Mercator tiles, and every time the viewport settles only
//! the markers whose cells changed visibility are revealed or concealed.
//!
//! # Architecture
//!
//! - **[`projection`]**: Web Mercator pixel and tile arithmetic
//! - **[`GridBounds`]**: Padded tile rectangle with antimeridian-aware containment
//! - **[`SpatialGrid`]**: Per-zoom sparse buckets of [`MarkerId`]s with parent/child nesting
//! - **[`diff`]**: Rectangle difference of old and new viewports
//! - **[`MarkerManager`]**: Visibility controller driving a [`DisplaySurface`]
//!
//! # Performance Characteristics
//!
//! - **Insert**: O(Z) cell updates per marker, Z = number of zoom levels
//! - **Pan**: O(C + K) where C = cells in the changed strips, K = markers they hold
//! - **Relocate**: O(Z) worst case, stops at the first level both positions share
//! - **Counting**: O(Z), read from per-level counters

mod bounds;
pub mod diff;
mod grid;
mod lifecycle;
mod manager;
mod marker;
pub mod projection;
mod surface;

// Public API exports
pub use bounds::{GeoBounds, GridBounds};
pub use grid::{Cell, SpatialGrid};
pub use lifecycle::{Readiness, ReadinessGate};
pub use manager::{Config, MarkerManager};
pub use marker::{Marker, MarkerId};
pub use projection::{GeoPoint, PixelOffset, PixelPoint, TileCoord};
pub use surface::{
    ChangedEvent, DisplaySurface, MemorySurface, StaticViewport, Viewport, ViewportSource,
};

/// Error types for the marker grid
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("Invalid tile size: {0} (must be at least 1 pixel)")]
    InvalidTileSize(u32),

    #[error("Invalid maximum zoom: {0} (supported up to {max})", max = projection::MAX_SUPPORTED_ZOOM)]
    InvalidMaxZoom(u32),

    #[error("Unknown marker: {0}")]
    UnknownMarker(MarkerId),
}

pub type Result<T> = std::result::Result<T, GridError>;
