//! MarkerManager - keeps the shown marker set in step with a moving viewport
//!
//! The manager owns the spatial grid, the currently shown grid bounds and the set of
//! materialised markers. Every external signal (viewport settled, marker added, removed
//! or moved, visibility toggled) is turned into the minimal set of `reveal`/`conceal`
//! calls on the display surface, followed by one "changed" notification.

use crate::bounds::GridBounds;
use crate::diff::{self, CellChange, CellDirection};
use crate::grid::{self, SpatialGrid};
use crate::lifecycle::ReadinessGate;
use crate::marker::{Marker, MarkerId};
use crate::projection::{GeoPoint, PixelOffset, TileCoord, tile_of};
use crate::surface::{ChangedEvent, DisplaySurface, Viewport, ViewportSource};
use crate::{GridError, Result};

use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Configuration for the marker manager
///
/// All values are fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct Config {
    /// Finest zoom level tracked by the grid; viewport zooms above it are clamped.
    /// Default: 19
    pub max_zoom: u32,
    /// Edge length of a grid cell in pixels. Default: 1024
    pub tile_size: u32,
    /// Pixels added around the viewport so markers just outside it are preloaded.
    /// Default: 100
    pub border_padding: u32,
    /// Whether marker relocations are followed at all. Static workloads can turn this
    /// off and skip the per-move grid updates. Default: true
    pub track_relocations: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_zoom: 19,
            tile_size: 1024,
            border_padding: 100,
            track_relocations: true,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        grid::validate(self.max_zoom, self.tile_size)
    }
}

/// What the manager remembers about a registered marker
#[derive(Debug, Clone, Copy, PartialEq)]
struct MarkerRecord {
    position: GeoPoint,
    min_zoom: u32,
    max_zoom: u32,
}

type ChangedListener = Box<dyn FnMut(&ChangedEvent)>;

/// Top-level visibility controller
pub struct MarkerManager<S, V> {
    config: Config,
    grid: SpatialGrid,
    registry: HashMap<MarkerId, MarkerRecord>,
    /// Bounds currently materialised; `None` until the host is ready
    shown_bounds: Option<GridBounds>,
    /// Markers revealed on the surface and not yet concealed
    shown: HashSet<MarkerId>,
    visible: bool,
    readiness: ReadinessGate,
    surface: S,
    viewport: V,
    listeners: Vec<ChangedListener>,
}

impl<S: std::fmt::Debug, V: std::fmt::Debug> std::fmt::Debug for MarkerManager<S, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkerManager")
            .field("config", &self.config)
            .field("markers", &self.registry.len())
            .field("shown_bounds", &self.shown_bounds)
            .field("shown_count", &self.shown.len())
            .field("visible", &self.visible)
            .field("readiness", &self.readiness)
            .field("surface", &self.surface)
            .field("viewport", &self.viewport)
            .finish()
    }
}

/// Apply one cell's visibility change to the display surface
///
/// Only markers that are actually materialised are concealed, and a marker that is
/// already materialised is not revealed again. Free function so callers can
/// split-borrow the manager's fields.
fn materialize_cell<S: DisplaySurface>(
    grid: &SpatialGrid,
    surface: &mut S,
    shown: &mut HashSet<MarkerId>,
    change: CellChange,
) {
    let Some(cell) = grid.cell_lookup(change.cell.x, change.cell.y, change.zoom) else {
        return;
    };
    tracing::trace!(cell = ?change.cell, zoom = change.zoom, direction = ?change.direction, markers = cell.len(), "Cell visibility changed");
    for &id in cell.iter().rev() {
        match change.direction {
            CellDirection::Leaving => {
                if shown.remove(&id) {
                    surface.conceal(id);
                }
            }
            CellDirection::Entering => {
                if shown.insert(id) {
                    surface.reveal(id);
                }
            }
        }
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl<S: DisplaySurface, V: ViewportSource> MarkerManager<S, V> {
    /// Create a manager that is not yet ready
    ///
    /// Markers can be registered straight away; nothing is revealed until
    /// [`mark_ready`](Self::mark_ready) is called.
    pub fn new(config: Config, surface: S, viewport: V) -> Result<Self> {
        config.validate()?;
        let grid = SpatialGrid::new(config.max_zoom, config.tile_size)?;
        Ok(Self {
            config,
            grid,
            registry: HashMap::new(),
            shown_bounds: None,
            shown: HashSet::new(),
            visible: true,
            readiness: ReadinessGate::new(),
            surface,
            viewport,
            listeners: Vec::new(),
        })
    }

    /// Create a manager and open its readiness gate immediately
    pub fn new_ready(config: Config, surface: S, viewport: V) -> Result<Self> {
        let mut manager = Self::new(config, surface, viewport)?;
        manager.mark_ready();
        Ok(manager)
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    #[inline]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    #[inline]
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    #[inline]
    pub fn viewport(&self) -> &V {
        &self.viewport
    }

    /// Mutable access to the viewport source; changes take effect on the next settle
    #[inline]
    pub fn viewport_mut(&mut self) -> &mut V {
        &mut self.viewport
    }

    /// Give back the collaborators
    pub fn into_parts(self) -> (S, V) {
        (self.surface, self.viewport)
    }

    /// Subscribe to "changed" notifications
    pub fn on_changed(&mut self, listener: impl FnMut(&ChangedEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Run `callback` once the manager is ready (immediately if it already is)
    pub fn on_ready(&mut self, callback: impl FnOnce() + 'static) {
        self.readiness.on_ready(callback);
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    /// Host readiness signal: compute the initial shown bounds and reveal them
    ///
    /// Only the first call has any effect.
    pub fn mark_ready(&mut self) -> bool {
        if self.readiness.is_ready() {
            return false;
        }
        let bounds = self.grid_bounds_for(&self.viewport.current_viewport());
        self.shown_bounds = Some(bounds);
        if self.visible {
            self.reveal_all(&bounds);
        }
        tracing::debug!(?bounds, shown = self.shown.len(), "Marker manager ready");
        self.notify_changed();
        self.readiness.mark_ready()
    }

    /// Tile bounds for a viewport, with zoom clamped and padding applied
    pub fn grid_bounds_for(&self, viewport: &Viewport) -> GridBounds {
        let zoom = self.grid.clamp_zoom(viewport.zoom);
        GridBounds::covering(
            &viewport.bounds,
            zoom,
            self.config.tile_size,
            i64::from(self.config.border_padding),
        )
    }

    /// Clamp the optional zoom range of a registration
    fn zoom_range(&self, min_zoom: u32, max_zoom: Option<u32>) -> (u32, u32) {
        let max_zoom = self.grid.clamp_zoom(max_zoom.unwrap_or(self.config.max_zoom));
        if min_zoom > max_zoom {
            tracing::warn!(
                min_zoom,
                max_zoom,
                "Minimum zoom above maximum; clamping to maximum"
            );
            return (max_zoom, max_zoom);
        }
        (min_zoom, max_zoom)
    }

    /// Register a marker for zooms `[min_zoom, max_zoom]` (max defaults to the configured one)
    ///
    /// If the marker lands inside the shown bounds at an eligible zoom it is revealed
    /// immediately. Re-adding a known id replaces its previous registration.
    pub fn add_marker(&mut self, marker: Marker, min_zoom: u32, max_zoom: Option<u32>) {
        let (min_zoom, max_zoom) = self.zoom_range(min_zoom, max_zoom);
        let mut changed = self.unregister_existing(marker.id);

        self.grid
            .insert_batch(marker.id, marker.position, min_zoom, max_zoom);
        self.grid.record_registrations(min_zoom, 1);
        self.registry.insert(
            marker.id,
            MarkerRecord {
                position: marker.position,
                min_zoom,
                max_zoom,
            },
        );

        if let Some(bounds) = self.shown_bounds
            && self.visible
            && (min_zoom..=max_zoom).contains(&bounds.zoom)
        {
            let tile = self.grid.tile_at(marker.position, bounds.zoom);
            if bounds.is_tile_visible(tile, self.grid.grid_width(bounds.zoom))
                && self.shown.insert(marker.id)
            {
                self.surface.reveal(marker.id);
                changed = true;
            }
        }

        if changed {
            self.notify_changed();
        }
    }

    /// Register many markers without touching the display surface
    ///
    /// The new markers are materialised on the next viewport settle (or
    /// [`refresh`](Self::refresh)). Anchor tiles are computed in parallel.
    pub fn add_markers(&mut self, markers: Vec<Marker>, min_zoom: u32, max_zoom: Option<u32>) {
        #[cfg(feature = "profiling")]
        profiling::scope!("manager::add_markers");

        let (min_zoom, max_zoom) = self.zoom_range(min_zoom, max_zoom);
        let anchor_zoom = self.grid.max_zoom();
        let tile_size = self.config.tile_size;
        let anchors: Vec<TileCoord> = markers
            .par_iter()
            .map(|marker| tile_of(marker.position, anchor_zoom, tile_size, PixelOffset::ZERO))
            .collect();

        let mut changed = false;
        for (marker, anchor) in markers.iter().zip(anchors) {
            changed |= self.unregister_existing(marker.id);
            self.grid
                .insert_from_anchor(marker.id, anchor, min_zoom, max_zoom);
            self.grid.record_registrations(min_zoom, 1);
            self.registry.insert(
                marker.id,
                MarkerRecord {
                    position: marker.position,
                    min_zoom,
                    max_zoom,
                },
            );
        }
        tracing::debug!(
            count = markers.len(),
            min_zoom,
            max_zoom,
            "Registered marker batch"
        );

        if changed {
            self.notify_changed();
        }
    }

    /// Drop a previous registration of `id`, if any; returns whether it was concealed
    fn unregister_existing(&mut self, id: MarkerId) -> bool {
        match self.registry.remove(&id) {
            Some(record) => {
                tracing::debug!(%id, "Marker registered again; replacing previous registration");
                let concealed = self.detach(id, &record);
                self.grid.release_registration(record.min_zoom);
                concealed
            }
            None => false,
        }
    }

    /// Remove `id` from every level, concealing it if it is currently materialised
    fn detach(&mut self, id: MarkerId, record: &MarkerRecord) -> bool {
        self.grid.remove_everywhere(id, record.position);
        if self.shown.remove(&id) {
            self.surface.conceal(id);
            true
        } else {
            false
        }
    }

    /// Unregister a marker, concealing it if it is shown
    ///
    /// Returns whether the shown set changed.
    pub fn remove_marker(&mut self, id: MarkerId) -> Result<bool> {
        let record = self
            .registry
            .remove(&id)
            .ok_or(GridError::UnknownMarker(id))?;
        let changed = self.detach(id, &record);
        self.grid.release_registration(record.min_zoom);

        if changed {
            self.notify_changed();
        }
        Ok(changed)
    }

    /// Follow a marker from `old` to `new`
    ///
    /// Only the levels where the marker's cell actually changes are touched. At the
    /// shown zoom the marker is concealed or revealed if it crossed the shown bounds.
    /// Returns whether the shown set changed.
    pub fn relocate_marker(&mut self, id: MarkerId, old: GeoPoint, new: GeoPoint) -> bool {
        if !self.config.track_relocations {
            tracing::trace!(%id, "Relocation tracking disabled; ignoring move");
            return false;
        }
        match self.registry.get_mut(&id) {
            Some(record) => record.position = new,
            None => tracing::warn!(%id, "Relocating a marker that was never registered"),
        }

        let Self {
            grid,
            surface,
            shown,
            shown_bounds,
            visible,
            ..
        } = self;
        let tracked = if *visible { *shown_bounds } else { None };
        let tracked_width = tracked.map(|bounds| grid.grid_width(bounds.zoom));
        let mut changed = false;

        grid.relocate(id, old, new, |zoom, old_tile, new_tile| {
            let (Some(bounds), Some(width)) = (tracked, tracked_width) else {
                return;
            };
            if zoom != bounds.zoom {
                return;
            }
            let was_visible = bounds.is_tile_visible(old_tile, width);
            let is_visible = bounds.is_tile_visible(new_tile, width);
            if was_visible && !is_visible && shown.remove(&id) {
                surface.conceal(id);
                changed = true;
            } else if !was_visible && is_visible && shown.insert(id) {
                surface.reveal(id);
                changed = true;
            }
        });

        if changed {
            self.notify_changed();
        }
        changed
    }

    /// Move a registered marker to `new`, using its recorded position as the origin
    pub fn move_marker(&mut self, id: MarkerId, new: GeoPoint) -> Result<bool> {
        let old = self
            .registry
            .get(&id)
            .map(|record| record.position)
            .ok_or(GridError::UnknownMarker(id))?;
        Ok(self.relocate_marker(id, old, new))
    }

    /// The host reports that the viewport stopped moving
    ///
    /// Recomputes the grid bounds from the live viewport and, if they differ from the
    /// shown ones, conceals/reveals exactly the markers whose cells changed visibility.
    /// Returns whether a transition ran.
    pub fn on_viewport_settled(&mut self) -> bool {
        #[cfg(feature = "profiling")]
        profiling::scope!("manager::on_viewport_settled");

        let Some(old) = self.shown_bounds else {
            tracing::debug!("Viewport settled before the manager was ready; ignoring");
            return false;
        };
        let new = self.grid_bounds_for(&self.viewport.current_viewport());
        if new.same_extent(&old) && new.zoom == old.zoom {
            return false;
        }

        let Self {
            grid,
            surface,
            shown,
            visible,
            ..
        } = self;
        let visible = *visible;
        let transition = diff::apply_transition(&old, &new, visible, |change| {
            // A hidden layer has nothing materialised to conceal
            if visible {
                materialize_cell(grid, surface, shown, change);
            }
        });

        tracing::debug!(?transition, ?new, shown = self.shown.len(), "Viewport settled");
        self.shown_bounds = Some(new);
        self.notify_changed();
        true
    }

    /// Show or hide the whole layer
    ///
    /// Whatever is materialised is concealed first; when turning on, the full shown
    /// rectangle is revealed again.
    pub fn set_visible(&mut self, visible: bool) {
        let Some(bounds) = self.shown_bounds else {
            self.visible = visible;
            return;
        };
        self.conceal_all();
        self.visible = visible;
        if visible {
            self.reveal_all(&bounds);
        }
        self.notify_changed();
    }

    #[inline]
    pub fn show(&mut self) {
        self.set_visible(true);
    }

    #[inline]
    pub fn hide(&mut self) {
        self.set_visible(false);
    }

    #[inline]
    pub fn toggle(&mut self) {
        self.set_visible(!self.visible);
    }

    /// Re-materialise the shown rectangle (picks up markers added in a batch)
    #[inline]
    pub fn refresh(&mut self) {
        self.set_visible(self.visible);
    }

    #[inline]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Conceal everything and forget every marker and count
    pub fn clear_all(&mut self) {
        let had_shown = self.conceal_all();
        self.grid.clear();
        self.registry.clear();
        tracing::debug!("Cleared all markers");

        if had_shown {
            self.notify_changed();
        }
    }

    /// Conceal every materialised marker; returns whether there were any
    fn conceal_all(&mut self) -> bool {
        let had_shown = !self.shown.is_empty();
        let mut ids: Vec<_> = self.shown.drain().collect();
        ids.sort_unstable();
        for id in ids {
            self.surface.conceal(id);
        }
        had_shown
    }

    fn reveal_all(&mut self, bounds: &GridBounds) {
        let Self {
            grid,
            surface,
            shown,
            ..
        } = self;
        let zoom = bounds.zoom;
        diff::for_each_cell(bounds, |cell| {
            materialize_cell(
                grid,
                surface,
                shown,
                CellChange {
                    cell,
                    zoom,
                    direction: CellDirection::Entering,
                },
            )
        });
    }

    fn notify_changed(&mut self) {
        let Some(bounds) = self.shown_bounds else {
            return;
        };
        let event = ChangedEvent {
            bounds,
            shown_count: self.shown.len(),
        };
        for listener in &mut self.listeners {
            listener(&event);
        }
    }

    /// Markers registered with a minimum zoom in `0..=zoom`
    ///
    /// Reads the per-level counters; does not scan the grid.
    #[inline]
    pub fn count_at_or_below_zoom(&self, zoom: u32) -> usize {
        self.grid.count_at_or_below(zoom)
    }

    /// A registered marker at exactly `position`, looked up in its cell at `zoom`
    pub fn marker_at(&self, position: GeoPoint, zoom: u32) -> Option<MarkerId> {
        let zoom = self.grid.clamp_zoom(zoom);
        let tile = self.grid.tile_at(position, zoom);
        let cell = self.grid.cell_lookup(tile.x, tile.y, zoom)?;
        cell.iter().copied().find(|id| {
            self.registry
                .get(id)
                .is_some_and(|record| record.position == position)
        })
    }

    /// Recorded position of a registered marker
    #[inline]
    pub fn position_of(&self, id: MarkerId) -> Option<GeoPoint> {
        self.registry.get(&id).map(|record| record.position)
    }

    /// Zoom range a marker was registered for
    #[inline]
    pub fn zoom_range_of(&self, id: MarkerId) -> Option<(u32, u32)> {
        self.registry
            .get(&id)
            .map(|record| (record.min_zoom, record.max_zoom))
    }

    #[inline]
    pub fn shown_bounds(&self) -> Option<GridBounds> {
        self.shown_bounds
    }

    /// Markers currently materialised on the display surface
    #[inline]
    pub fn shown_count(&self) -> usize {
        self.shown.len()
    }

    /// Whether `id` is currently materialised on the display surface
    #[inline]
    pub fn is_shown(&self, id: MarkerId) -> bool {
        self.shown.contains(&id)
    }

    /// Registered markers
    #[inline]
    pub fn marker_count(&self) -> usize {
        self.registry.len()
    }
}
