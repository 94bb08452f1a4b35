//! Scenario file format
//!
//! A scenario is a JSON document with an optional manager configuration, the initial
//! viewport, markers registered before the host becomes ready, and an ordered list of
//! events to replay.

use marker_grid::{Config, GeoBounds, GeoPoint, Marker, MarkerId, Viewport};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Errors raised while loading or replaying a scenario
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid scenario JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Event {index} failed: {source}")]
    Event {
        index: usize,
        #[source]
        source: marker_grid::GridError,
    },

    #[error(transparent)]
    Grid(#[from] marker_grid::GridError),
}

pub type Result<T> = std::result::Result<T, ReplayError>;

/// A marker entry: position plus the zoom range it is shown at
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerSpec {
    pub id: MarkerId,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub min_zoom: u32,
    #[serde(default)]
    pub max_zoom: Option<u32>,
}

impl MarkerSpec {
    pub fn marker(&self) -> Marker {
        Marker::new(self.id, GeoPoint::new(self.lat, self.lng))
    }
}

/// One step of a replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The host signals readiness
    Ready,
    /// The viewport moved and settled
    Settle {
        south: f64,
        west: f64,
        north: f64,
        east: f64,
        zoom: u32,
    },
    /// Register one marker (revealed immediately when in view)
    Add(MarkerSpec),
    /// Register many markers at once; materialised on the next settle or refresh
    AddBatch {
        markers: Vec<MarkerSpec>,
        #[serde(default)]
        min_zoom: u32,
        #[serde(default)]
        max_zoom: Option<u32>,
    },
    Remove {
        id: MarkerId,
    },
    Move {
        id: MarkerId,
        lat: f64,
        lng: f64,
    },
    Visible {
        visible: bool,
    },
    Refresh,
    Clear,
}

/// A complete recorded session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub config: Config,
    pub viewport: Viewport,
    /// Registered before the first event
    #[serde(default)]
    pub markers: Vec<MarkerSpec>,
    #[serde(default)]
    pub events: Vec<Event>,
}

impl Scenario {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| ReplayError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let scenario = Self::from_json(&json)?;
        tracing::info!(
            path = %path.display(),
            markers = scenario.markers.len(),
            events = scenario.events.len(),
            "Loaded scenario"
        );
        Ok(scenario)
    }
}

/// Viewport from the flat corner fields of a settle event
pub fn viewport(south: f64, west: f64, north: f64, east: f64, zoom: u32) -> Viewport {
    Viewport {
        bounds: GeoBounds::new(GeoPoint::new(south, west), GeoPoint::new(north, east)),
        zoom,
    }
}
