//! Multi-resolution spatial grid of marker ids
//!
//! Each zoom level owns a sparse map from tile coordinate to a bucket of marker ids.
//! A marker registered for `[min_zoom, max_zoom]` sits in exactly one cell per level in
//! that range, and the cell at zoom `z` is the cell at `z + 1` with both coordinates
//! halved, so a coarse cell always holds the union of its four finer children.

use crate::projection::{
    BASE_WORLD_WIDTH, GeoPoint, MAX_SUPPORTED_ZOOM, PixelOffset, TileCoord, tile_of,
};
use crate::{GridError, MarkerId, Result};
use smallvec::SmallVec;
use std::collections::HashMap;

/// Bucket of markers occupying one cell; most cells hold only a handful
pub type Cell = SmallVec<[MarkerId; 4]>;

/// Cells and bookkeeping for a single zoom level
#[derive(Debug, Clone, Default)]
struct Level {
    /// Sparse cells keyed by column-normalised tile coordinate
    cells: HashMap<TileCoord, Cell>,
    /// Number of tile columns spanning the world at this zoom
    grid_width: i64,
    /// Markers registered with this level as their minimum zoom
    registered: usize,
}

/// Per-zoom bucket structure holding marker ids
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    levels: Vec<Level>,
    max_zoom: u32,
    tile_size: u32,
}

/// Reject grid configurations the pixel arithmetic cannot represent
pub fn validate(max_zoom: u32, tile_size: u32) -> Result<()> {
    if tile_size == 0 {
        return Err(GridError::InvalidTileSize(tile_size));
    }
    if max_zoom > MAX_SUPPORTED_ZOOM {
        return Err(GridError::InvalidMaxZoom(max_zoom));
    }
    Ok(())
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl SpatialGrid {
    /// Create an empty grid covering zoom levels `0..=max_zoom`
    pub fn new(max_zoom: u32, tile_size: u32) -> Result<Self> {
        validate(max_zoom, tile_size)?;
        Ok(Self {
            levels: Self::build_levels(max_zoom, tile_size),
            max_zoom,
            tile_size,
        })
    }

    /// Drop every marker and count, rebuilding the levels for a new configuration
    pub fn reset(&mut self, max_zoom: u32, tile_size: u32) -> Result<()> {
        validate(max_zoom, tile_size)?;
        self.levels = Self::build_levels(max_zoom, tile_size);
        self.max_zoom = max_zoom;
        self.tile_size = tile_size;
        tracing::debug!(max_zoom, tile_size, "Spatial grid reset");
        Ok(())
    }

    /// Drop every marker and count, keeping the configuration
    pub fn clear(&mut self) {
        self.levels = Self::build_levels(self.max_zoom, self.tile_size);
    }

    fn build_levels(max_zoom: u32, tile_size: u32) -> Vec<Level> {
        let tile_size = i64::from(tile_size);
        let mut world_width = BASE_WORLD_WIDTH;
        let mut levels = Vec::with_capacity(max_zoom as usize + 1);
        for _ in 0..=max_zoom {
            levels.push(Level {
                grid_width: (world_width + tile_size - 1) / tile_size,
                ..Level::default()
            });
            world_width <<= 1;
        }
        levels
    }

    #[inline]
    pub fn max_zoom(&self) -> u32 {
        self.max_zoom
    }

    #[inline]
    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Clamp a caller-supplied zoom into `0..=max_zoom`
    #[inline]
    pub fn clamp_zoom(&self, zoom: u32) -> u32 {
        zoom.min(self.max_zoom)
    }

    /// Number of tile columns spanning the world at `zoom`
    #[inline]
    pub fn grid_width(&self, zoom: u32) -> i64 {
        self.level(zoom).grid_width
    }

    #[inline]
    fn level(&self, zoom: u32) -> &Level {
        &self.levels[self.clamp_zoom(zoom) as usize]
    }

    #[inline]
    fn level_mut(&mut self, zoom: u32) -> &mut Level {
        let zoom = self.clamp_zoom(zoom);
        &mut self.levels[zoom as usize]
    }

    /// Tile containing `position` at the grid's finest zoom
    ///
    /// Every coarser tile of a marker is derived from this one, so all levels agree on
    /// which cell holds it.
    #[inline]
    pub fn anchor_tile(&self, position: GeoPoint) -> TileCoord {
        tile_of(position, self.max_zoom, self.tile_size, PixelOffset::ZERO)
    }

    /// Tile containing `position` at `zoom`, derived from the anchor tile
    #[inline]
    pub fn tile_at(&self, position: GeoPoint, zoom: u32) -> TileCoord {
        self.anchor_tile(position)
            .ancestor(self.max_zoom - self.clamp_zoom(zoom))
    }

    /// Fetch the cell at `(x, y, zoom)`, creating it if needed
    ///
    /// Columns outside `[0, grid_width)` are folded back into the world first.
    pub fn cell_create(&mut self, x: i64, y: i64, zoom: u32) -> &mut Cell {
        let level = self.level_mut(zoom);
        let key = TileCoord::new(x.rem_euclid(level.grid_width), y);
        level.cells.entry(key).or_default()
    }

    /// Fetch the cell at `(x, y, zoom)` if it was ever created
    pub fn cell_lookup(&self, x: i64, y: i64, zoom: u32) -> Option<&Cell> {
        let level = self.level(zoom);
        let key = TileCoord::new(x.rem_euclid(level.grid_width), y);
        level.cells.get(&key)
    }

    fn cell_lookup_mut(&mut self, x: i64, y: i64, zoom: u32) -> Option<&mut Cell> {
        let level = self.level_mut(zoom);
        let key = TileCoord::new(x.rem_euclid(level.grid_width), y);
        level.cells.get_mut(&key)
    }

    /// Insert `id` at every zoom in `[min_zoom, max_zoom]`
    pub fn insert_batch(&mut self, id: MarkerId, position: GeoPoint, min_zoom: u32, max_zoom: u32) {
        let anchor = self.anchor_tile(position);
        self.insert_from_anchor(id, anchor, min_zoom, max_zoom);
    }

    /// Insert `id` given its precomputed [`anchor_tile`](Self::anchor_tile)
    ///
    /// The anchor is shifted down to `max_zoom`, then halved once per level on the way
    /// down to `min_zoom`.
    pub fn insert_from_anchor(
        &mut self,
        id: MarkerId,
        anchor: TileCoord,
        min_zoom: u32,
        max_zoom: u32,
    ) {
        let max_zoom = self.clamp_zoom(max_zoom);
        let mut tile = anchor.ancestor(self.max_zoom - max_zoom);
        for zoom in (min_zoom..=max_zoom).rev() {
            self.cell_create(tile.x, tile.y, zoom).push(id);
            tile = tile.parent();
        }
    }

    /// Remove every occurrence of `id` from the cell at `(tile, zoom)`
    ///
    /// Returns how many entries were removed. Cells left empty are dropped.
    pub fn remove_item(&mut self, id: MarkerId, tile: TileCoord, zoom: u32) -> usize {
        let Some(cell) = self.cell_lookup_mut(tile.x, tile.y, zoom) else {
            return 0;
        };
        let before = cell.len();
        cell.retain(|entry| *entry != id);
        let removed = before - cell.len();

        if cell.is_empty() {
            let level = self.level_mut(zoom);
            let key = TileCoord::new(tile.x.rem_euclid(level.grid_width), tile.y);
            level.cells.remove(&key);
        }
        removed
    }

    /// Remove `id` from every zoom level, walking down from `max_zoom`
    ///
    /// Returns the number of entries removed per zoom, indexed by zoom.
    pub fn remove_everywhere(&mut self, id: MarkerId, position: GeoPoint) -> Vec<usize> {
        let mut removed = vec![0; self.levels.len()];
        let mut tile = self.anchor_tile(position);
        for zoom in (0..=self.max_zoom).rev() {
            removed[zoom as usize] = self.remove_item(id, tile, zoom);
            tile = tile.parent();
        }
        removed
    }

    /// Move `id` from the cells of `old` to the cells of `new`
    ///
    /// Walks from `max_zoom` towards zoom 0 and stops as soon as both positions fall in
    /// the same cell, since every coarser level then agrees as well. At each level where
    /// the marker was actually present it is moved and `on_move(zoom, old_tile, new_tile)`
    /// is called. Returns the number of levels the marker moved at.
    pub fn relocate(
        &mut self,
        id: MarkerId,
        old: GeoPoint,
        new: GeoPoint,
        mut on_move: impl FnMut(u32, TileCoord, TileCoord),
    ) -> u32 {
        let mut old_tile = self.anchor_tile(old);
        let mut new_tile = self.anchor_tile(new);
        let mut moved = 0;

        for zoom in (0..=self.max_zoom).rev() {
            if old_tile == new_tile {
                break;
            }
            let removed = self.remove_item(id, old_tile, zoom);
            if removed > 0 {
                let cell = self.cell_create(new_tile.x, new_tile.y, zoom);
                cell.extend(std::iter::repeat_n(id, removed));
                moved += 1;
                on_move(zoom, old_tile, new_tile);
            }
            old_tile = old_tile.parent();
            new_tile = new_tile.parent();
        }

        tracing::trace!(%id, levels = moved, "Marker relocated in grid");
        moved
    }

    /// Count `count` registrations keyed by their minimum zoom
    #[inline]
    pub fn record_registrations(&mut self, min_zoom: u32, count: usize) {
        self.level_mut(min_zoom).registered += count;
    }

    /// Forget one registration keyed by its minimum zoom
    ///
    /// Returns false (and leaves the count at zero) when there was nothing to release.
    pub fn release_registration(&mut self, min_zoom: u32) -> bool {
        let level = self.level_mut(min_zoom);
        if level.registered == 0 {
            tracing::debug!(min_zoom, "Registration count already zero; ignoring release");
            return false;
        }
        level.registered -= 1;
        true
    }

    /// Markers registered with exactly `zoom` as their minimum zoom
    #[inline]
    pub fn registered_at(&self, zoom: u32) -> usize {
        self.level(zoom).registered
    }

    /// Sum of registration counts for zoom levels `0..=zoom`
    pub fn count_at_or_below(&self, zoom: u32) -> usize {
        let zoom = self.clamp_zoom(zoom) as usize;
        self.levels[..=zoom].iter().map(|level| level.registered).sum()
    }

    /// Total bucket entries at `zoom`
    pub fn occupancy(&self, zoom: u32) -> usize {
        self.level(zoom).cells.values().map(|cell| cell.len()).sum()
    }

    /// Whether the cell containing `position` at `zoom` holds `id`
    pub fn holds(&self, id: MarkerId, position: GeoPoint, zoom: u32) -> bool {
        let tile = self.tile_at(position, zoom);
        self.cell_lookup(tile.x, tile.y, zoom)
            .is_some_and(|cell| cell.contains(&id))
    }
}
