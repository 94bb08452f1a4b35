//! Geographic viewport rectangles and their tile-space counterparts

use crate::projection::{GeoPoint, PixelOffset, TileCoord, grid_width, tile_of};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A geographic rectangle given by its south-west and north-east corners
///
/// The corners are kept as given: a rectangle that crosses the antimeridian has a
/// south-west longitude greater than its north-east longitude.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeoBounds {
    pub south_west: GeoPoint,
    pub north_east: GeoPoint,
}

impl GeoBounds {
    #[inline]
    pub const fn new(south_west: GeoPoint, north_east: GeoPoint) -> Self {
        Self {
            south_west,
            north_east,
        }
    }

    /// Whether the rectangle wraps across the 180° meridian
    #[inline]
    pub fn crosses_antimeridian(&self) -> bool {
        self.north_east.lng < self.south_west.lng
    }
}

/// Bounds from a `geo` rectangle (x = longitude, y = latitude); never antimeridian-crossing
impl From<geo::Rect<f64>> for GeoBounds {
    fn from(rect: geo::Rect<f64>) -> Self {
        Self::new(rect.min().into(), rect.max().into())
    }
}

/// Inclusive rectangle of tile coordinates computed at one zoom level
///
/// `min_x` is negative when the rectangle straddles the antimeridian; the cells west
/// of it are then addressed as `min_x..0` instead of `grid_width + min_x..grid_width`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GridBounds {
    pub min_x: i64,
    pub max_x: i64,
    pub min_y: i64,
    pub max_y: i64,
    pub zoom: u32,
}

impl GridBounds {
    /// Smallest rectangle containing both corners
    pub fn from_corners(a: TileCoord, b: TileCoord, zoom: u32) -> Self {
        Self {
            min_x: a.x.min(b.x),
            max_x: a.x.max(b.x),
            min_y: a.y.min(b.y),
            max_y: a.y.max(b.y),
            zoom,
        }
    }

    /// Tile rectangle covering `bounds` at `zoom`, expanded by `padding` pixels on every side
    ///
    /// Applies the antimeridian shift and clamps rectangles wider than the world to
    /// exactly one world width. The caller is responsible for clamping `zoom`.
    pub fn covering(bounds: &GeoBounds, zoom: u32, tile_size: u32, padding: i64) -> Self {
        // Pixel y grows southwards, so the south-west corner is padded down and left
        let mut sw = tile_of(
            bounds.south_west,
            zoom,
            tile_size,
            PixelOffset::new(-padding, padding),
        );
        let mut ne = tile_of(
            bounds.north_east,
            zoom,
            tile_size,
            PixelOffset::new(padding, -padding),
        );
        let width = grid_width(zoom, tile_size);

        if bounds.crosses_antimeridian() || ne.x < sw.x {
            sw.x -= width;
        }
        if ne.x - sw.x + 1 >= width {
            sw.x = 0;
            ne.x = width - 1;
        }

        Self::from_corners(sw, ne, zoom)
    }

    /// Same rectangle, ignoring the zoom level
    #[inline]
    pub fn same_extent(&self, other: &Self) -> bool {
        self.min_x == other.min_x
            && self.max_x == other.max_x
            && self.min_y == other.min_y
            && self.max_y == other.max_y
    }

    /// Inclusive point-in-rectangle test on raw coordinates
    #[inline]
    pub fn contains(&self, tile: TileCoord) -> bool {
        tile.x >= self.min_x && tile.x <= self.max_x && tile.y >= self.min_y && tile.y <= self.max_y
    }

    /// Containment that understands the antimeridian
    ///
    /// The tile's column is folded into `[0, grid_width)` first; when the rectangle
    /// starts west of column 0 the column is re-tested one world to the west.
    pub fn is_tile_visible(&self, tile: TileCoord, grid_width: i64) -> bool {
        if tile.y < self.min_y || tile.y > self.max_y {
            return false;
        }
        let width = grid_width.max(1);
        let x = tile.x.rem_euclid(width);
        if x >= self.min_x && x <= self.max_x {
            return true;
        }
        if self.min_x < 0 {
            let shifted = x - width;
            return shifted >= self.min_x && shifted <= self.max_x;
        }
        // Padding can push the east edge one world width past the last column
        let wrapped = x + width;
        self.max_x >= width && wrapped >= self.min_x && wrapped <= self.max_x
    }

    #[inline]
    pub fn width(&self) -> i64 {
        self.max_x - self.min_x + 1
    }

    #[inline]
    pub fn height(&self) -> i64 {
        self.max_y - self.min_y + 1
    }

    /// Number of cells in the rectangle
    #[inline]
    pub fn cell_count(&self) -> u64 {
        (self.width() as u64) * (self.height() as u64)
    }

    /// All cells, column by column
    pub fn cells(&self) -> impl Iterator<Item = TileCoord> + use<> {
        let (min_y, max_y) = (self.min_y, self.max_y);
        (self.min_x..=self.max_x)
            .flat_map(move |x| (min_y..=max_y).map(move |y| TileCoord::new(x, y)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(min_x: i64, max_x: i64, min_y: i64, max_y: i64) -> GridBounds {
        GridBounds {
            min_x,
            max_x,
            min_y,
            max_y,
            zoom: 4,
        }
    }

    #[test]
    fn test_from_corners_sorts() {
        let b = GridBounds::from_corners(TileCoord::new(5, 1), TileCoord::new(2, 7), 3);
        assert_eq!(b, bounds(2, 5, 1, 7).with_zoom(3));
    }

    #[test]
    fn test_contains_is_inclusive() {
        let b = bounds(2, 4, 2, 4);
        assert!(b.contains(TileCoord::new(2, 2)));
        assert!(b.contains(TileCoord::new(4, 4)));
        assert!(!b.contains(TileCoord::new(5, 3)));
        assert!(!b.contains(TileCoord::new(3, 1)));
    }

    #[test]
    fn test_same_extent_ignores_zoom() {
        let a = bounds(0, 3, 0, 3);
        let b = a.with_zoom(9);
        assert!(a.same_extent(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_covering_simple_viewport() {
        let view = GeoBounds::new(GeoPoint::new(0.0, 0.0), GeoPoint::new(10.0, 10.0));
        let b = GridBounds::covering(&view, 10, 1024, 0);
        assert_eq!(b.min_x, 128);
        assert!(b.max_x > b.min_x);
        // North-east corner has the smaller pixel y
        assert!(b.min_y < 128);
        assert_eq!(b.max_y, 128);
        assert_eq!(b.zoom, 10);
    }

    #[test]
    fn test_covering_antimeridian() {
        let view = GeoBounds::new(GeoPoint::new(-5.0, 170.0), GeoPoint::new(5.0, -170.0));
        assert!(view.crosses_antimeridian());

        let width = grid_width(8, 256);
        let b = GridBounds::covering(&view, 8, 256, 0);
        assert!(b.min_x < 0);
        assert!(b.max_x >= 0);
        assert!(b.width() < width);

        // Last column (just west of 180°) and first column (just east of -180°) are inside
        let y = (b.min_y + b.max_y) / 2;
        assert!(b.is_tile_visible(TileCoord::new(width - 1, y), width));
        assert!(b.is_tile_visible(TileCoord::new(0, y), width));
        // The far side of the world is not
        assert!(!b.is_tile_visible(TileCoord::new(width / 2, y), width));
    }

    #[test]
    fn test_covering_wider_than_world_clamps() {
        let view = GeoBounds::new(GeoPoint::new(-10.0, -179.0), GeoPoint::new(10.0, 179.0));
        let b = GridBounds::covering(&view, 3, 256, 100);
        assert_eq!(b.min_x, 0);
        assert_eq!(b.max_x, grid_width(3, 256) - 1);

        let full = GeoBounds::new(GeoPoint::new(-60.0, -180.0), GeoPoint::new(60.0, 180.0));
        let b = GridBounds::covering(&full, 10, 1024, 0);
        assert_eq!((b.min_x, b.max_x), (0, 255));
    }

    #[test]
    fn test_visible_folds_columns() {
        let width = 16;
        let b = bounds(3, 6, 0, 2);
        assert!(b.is_tile_visible(TileCoord::new(4, 1), width));
        assert!(b.is_tile_visible(TileCoord::new(4 + width, 1), width));
        assert!(b.is_tile_visible(TileCoord::new(4 - width, 1), width));
        assert!(!b.is_tile_visible(TileCoord::new(4, 3), width));
        assert!(!b.is_tile_visible(TileCoord::new(7, 1), width));
    }

    #[test]
    fn test_visible_past_east_edge() {
        let width = 16;
        let b = bounds(14, 16, 0, 0);
        assert!(b.is_tile_visible(TileCoord::new(0, 0), width));
        assert!(b.is_tile_visible(TileCoord::new(15, 0), width));
        assert!(!b.is_tile_visible(TileCoord::new(1, 0), width));
    }

    #[test]
    fn test_cells_enumerates_area() {
        let b = bounds(-1, 1, 5, 6);
        let cells: Vec<_> = b.cells().collect();
        assert_eq!(cells.len() as u64, b.cell_count());
        assert_eq!(cells.first(), Some(&TileCoord::new(-1, 5)));
        assert_eq!(cells.last(), Some(&TileCoord::new(1, 6)));
    }

    #[test]
    fn test_from_geo_rect() {
        let rect = geo::Rect::new(
            geo::Coord { x: 10.0, y: -5.0 },
            geo::Coord { x: -10.0, y: 5.0 },
        );
        // geo normalises min/max, so the result never wraps
        let b = GeoBounds::from(rect);
        assert!(!b.crosses_antimeridian());
        assert_eq!(b.south_west, GeoPoint::new(-5.0, -10.0));
    }

    impl GridBounds {
        fn with_zoom(mut self, zoom: u32) -> Self {
            self.zoom = zoom;
            self
        }
    }
}
