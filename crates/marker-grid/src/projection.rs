//! Projection of geographic coordinates onto the zoom-dependent pixel and tile grids
//!
//! The pixel space is the classic world-wrapping Web Mercator plane used by slippy maps:
//! at zoom `z` the world is `256 * 2^z` pixels wide, with the origin at the antimeridian
//! and north at the top. Tiles (grid cells) are fixed-size squares of that plane.

use std::f64::consts::PI;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum latitude that can be represented in Web Mercator
pub const MAX_LATITUDE: f64 = 85.05112878;

/// World width in pixels at zoom 0
pub const BASE_WORLD_WIDTH: i64 = 256;

/// Highest zoom level the pixel arithmetic supports
pub const MAX_SUPPORTED_ZOOM: u32 = 30;

/// A geographic coordinate in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    #[inline]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// `geo` points follow the (x = longitude, y = latitude) convention
impl From<geo::Point<f64>> for GeoPoint {
    #[inline]
    fn from(point: geo::Point<f64>) -> Self {
        Self::new(point.y(), point.x())
    }
}

impl From<geo::Coord<f64>> for GeoPoint {
    #[inline]
    fn from(coord: geo::Coord<f64>) -> Self {
        Self::new(coord.y, coord.x)
    }
}

impl From<GeoPoint> for geo::Point<f64> {
    #[inline]
    fn from(point: GeoPoint) -> Self {
        geo::Point::new(point.lng, point.lat)
    }
}

/// Integer position in the pixel space of one zoom level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelPoint {
    pub x: i64,
    pub y: i64,
}

/// Pixel margin added to a projected point before it is bucketed into a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PixelOffset {
    pub dx: i64,
    pub dy: i64,
}

impl PixelOffset {
    pub const ZERO: Self = Self { dx: 0, dy: 0 };

    #[inline]
    pub const fn new(dx: i64, dy: i64) -> Self {
        Self { dx, dy }
    }
}

/// Address of a grid cell at some zoom level
///
/// Raw tile coordinates may fall outside `[0, grid_width)` horizontally (bounds that
/// straddle the antimeridian use a negative west edge); the grid folds them back when
/// the cell is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TileCoord {
    pub x: i64,
    pub y: i64,
}

impl TileCoord {
    #[inline]
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// The cell containing this one at the next coarser zoom level
    #[inline]
    pub const fn parent(self) -> Self {
        Self {
            x: self.x >> 1,
            y: self.y >> 1,
        }
    }

    /// The cell containing this one `levels` zoom levels coarser
    #[inline]
    pub const fn ancestor(self, levels: u32) -> Self {
        Self {
            x: self.x >> levels,
            y: self.y >> levels,
        }
    }
}

/// Map a longitude onto `[0, 2]`, 0 at -180°
#[inline(always)]
pub fn lng_to_unit(lng: f64) -> f64 {
    1.0 + lng / 180.0
}

/// Map a latitude onto `[0, 2]`, 0 at the northern Mercator limit
#[inline(always)]
pub fn lat_to_unit(lat: f64) -> f64 {
    let sin_phi = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians().sin();
    1.0 - (0.5 / PI) * ((1.0 + sin_phi) / (1.0 - sin_phi)).ln()
}

/// Project a geographic point into the pixel space of `zoom`
#[inline]
pub fn pixel_of(point: GeoPoint, zoom: u32) -> PixelPoint {
    let scale = (1u64 << (zoom.min(MAX_SUPPORTED_ZOOM) + 7)) as f64;
    PixelPoint {
        x: (0.5 + lng_to_unit(point.lng) * scale).round() as i64,
        y: (0.5 + lat_to_unit(point.lat) * scale).round() as i64,
    }
}

/// Tile containing `point` at `zoom`, after shifting the projected pixel by `padding`
#[inline]
pub fn tile_of(point: GeoPoint, zoom: u32, tile_size: u32, padding: PixelOffset) -> TileCoord {
    let pixel = pixel_of(point, zoom);
    let tile_size = i64::from(tile_size.max(1));
    TileCoord {
        x: (pixel.x + padding.dx).div_euclid(tile_size),
        y: (pixel.y + padding.dy).div_euclid(tile_size),
    }
}

/// World width in pixels at `zoom`
#[inline]
pub fn world_width(zoom: u32) -> i64 {
    BASE_WORLD_WIDTH << zoom.min(MAX_SUPPORTED_ZOOM)
}

/// Number of tile columns spanning the world at `zoom` (never less than one)
#[inline]
pub fn grid_width(zoom: u32, tile_size: u32) -> i64 {
    let tile_size = i64::from(tile_size.max(1));
    (world_width(zoom) + tile_size - 1) / tile_size
}
