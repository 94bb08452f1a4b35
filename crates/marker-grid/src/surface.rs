//! Collaborator seams: the display surface that materialises markers and the
//! viewport source that reports what the user is looking at

use crate::bounds::{GeoBounds, GridBounds};
use crate::marker::MarkerId;
use std::collections::HashSet;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Something that can draw and erase markers
///
/// The manager calls `reveal` exactly once when a marker becomes visible and `conceal`
/// exactly once when it stops being visible; implementations need not tolerate
/// repeated calls.
pub trait DisplaySurface {
    fn reveal(&mut self, id: MarkerId);
    fn conceal(&mut self, id: MarkerId);
}

impl<T: DisplaySurface + ?Sized> DisplaySurface for &mut T {
    #[inline]
    fn reveal(&mut self, id: MarkerId) {
        (**self).reveal(id)
    }

    #[inline]
    fn conceal(&mut self, id: MarkerId) {
        (**self).conceal(id)
    }
}

impl<T: DisplaySurface + ?Sized> DisplaySurface for Box<T> {
    #[inline]
    fn reveal(&mut self, id: MarkerId) {
        (**self).reveal(id)
    }

    #[inline]
    fn conceal(&mut self, id: MarkerId) {
        (**self).conceal(id)
    }
}

/// The visible map region and its zoom level
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Viewport {
    pub bounds: GeoBounds,
    pub zoom: u32,
}

/// Where the manager reads the live viewport from when it settles
pub trait ViewportSource {
    fn current_viewport(&self) -> Viewport;
}

impl<F: Fn() -> Viewport> ViewportSource for F {
    #[inline]
    fn current_viewport(&self) -> Viewport {
        self()
    }
}

/// A viewport that only changes when told to
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticViewport {
    viewport: Viewport,
}

impl StaticViewport {
    pub fn new(bounds: GeoBounds, zoom: u32) -> Self {
        Self {
            viewport: Viewport { bounds, zoom },
        }
    }

    pub fn set(&mut self, bounds: GeoBounds, zoom: u32) {
        self.viewport = Viewport { bounds, zoom };
    }

    pub fn set_zoom(&mut self, zoom: u32) {
        self.viewport.zoom = zoom;
    }
}

impl ViewportSource for StaticViewport {
    #[inline]
    fn current_viewport(&self) -> Viewport {
        self.viewport
    }
}

/// Payload of the "changed" notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChangedEvent {
    pub bounds: GridBounds,
    pub shown_count: usize,
}

/// In-memory surface that tracks which markers are materialised
///
/// Double reveals and stray conceals are counted instead of panicking so that callers
/// can assert on them.
#[derive(Debug, Clone, Default)]
pub struct MemorySurface {
    shown: HashSet<MarkerId>,
    reveals: usize,
    conceals: usize,
    violations: usize,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_shown(&self, id: MarkerId) -> bool {
        self.shown.contains(&id)
    }

    #[inline]
    pub fn shown(&self) -> &HashSet<MarkerId> {
        &self.shown
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.shown.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.shown.is_empty()
    }

    /// Total reveal calls received
    #[inline]
    pub fn reveals(&self) -> usize {
        self.reveals
    }

    /// Total conceal calls received
    #[inline]
    pub fn conceals(&self) -> usize {
        self.conceals
    }

    /// Reveals of already-shown markers plus conceals of hidden ones
    #[inline]
    pub fn violations(&self) -> usize {
        self.violations
    }
}

impl DisplaySurface for MemorySurface {
    fn reveal(&mut self, id: MarkerId) {
        self.reveals += 1;
        if !self.shown.insert(id) {
            tracing::warn!(%id, "Marker revealed twice");
            self.violations += 1;
        }
    }

    fn conceal(&mut self, id: MarkerId) {
        self.conceals += 1;
        if !self.shown.remove(&id) {
            tracing::warn!(%id, "Concealed a marker that was not shown");
            self.violations += 1;
        }
    }
}
