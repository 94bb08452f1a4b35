//! Marker identity as seen by the grid and the display surface

use crate::projection::GeoPoint;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Opaque handle the display surface uses to find a marker's visual representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct MarkerId(pub u64);

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for MarkerId {
    #[inline]
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A point-located item to be managed
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Marker {
    pub id: MarkerId,
    pub position: GeoPoint,
}

impl Marker {
    #[inline]
    pub fn new(id: impl Into<MarkerId>, position: GeoPoint) -> Self {
        Self {
            id: id.into(),
            position,
        }
    }
}
