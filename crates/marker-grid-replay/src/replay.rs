//! Drives a `MarkerManager` through a scenario and collects what happened

use crate::scenario::{self, Event, ReplayError, Result, Scenario};
use marker_grid::{
    ChangedEvent, Config, DisplaySurface, MarkerId, MarkerManager, StaticViewport,
};
use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

/// Display surface that logs every call and keeps the shown set
#[derive(Debug, Default)]
pub struct LoggingSurface {
    shown: HashSet<MarkerId>,
    reveals: usize,
    conceals: usize,
}

impl DisplaySurface for LoggingSurface {
    fn reveal(&mut self, id: MarkerId) {
        tracing::trace!(%id, "reveal");
        self.reveals += 1;
        if !self.shown.insert(id) {
            tracing::warn!(%id, "Marker revealed while already shown");
        }
    }

    fn conceal(&mut self, id: MarkerId) {
        tracing::trace!(%id, "conceal");
        self.conceals += 1;
        if !self.shown.remove(&id) {
            tracing::warn!(%id, "Marker concealed while not shown");
        }
    }
}

/// Outcome of a replay
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub changes: Vec<ChangedEvent>,
    pub reveals: usize,
    pub conceals: usize,
    pub shown_count: usize,
    pub marker_count: usize,
    /// Shown ids in ascending order
    pub shown: Vec<MarkerId>,
}

/// Replay `scenario` with `config`, calling `on_change` for every notification
pub fn run(
    scenario: &Scenario,
    config: Config,
    mut on_change: impl FnMut(&ChangedEvent) + 'static,
) -> Result<Report> {
    #[cfg(feature = "profiling")]
    profiling::scope!("replay::run");

    let viewport = StaticViewport::new(scenario.viewport.bounds, scenario.viewport.zoom);
    let mut manager = MarkerManager::new(config, LoggingSurface::default(), viewport)?;

    let changes = Rc::new(RefCell::new(Vec::new()));
    let sink = changes.clone();
    manager.on_changed(move |event| {
        on_change(event);
        sink.borrow_mut().push(*event);
    });

    for spec in &scenario.markers {
        manager.add_marker(spec.marker(), spec.min_zoom, spec.max_zoom);
    }

    for (index, event) in scenario.events.iter().enumerate() {
        tracing::debug!(index, ?event, "Replaying event");
        apply(&mut manager, event).map_err(|source| ReplayError::Event { index, source })?;
    }

    let marker_count = manager.marker_count();
    let (surface, _) = manager.into_parts();
    let mut shown: Vec<_> = surface.shown.iter().copied().collect();
    shown.sort_unstable();
    let changes = changes.borrow().clone();

    Ok(Report {
        changes,
        reveals: surface.reveals,
        conceals: surface.conceals,
        shown_count: shown.len(),
        marker_count,
        shown,
    })
}

fn apply(
    manager: &mut MarkerManager<LoggingSurface, StaticViewport>,
    event: &Event,
) -> marker_grid::Result<()> {
    match event {
        Event::Ready => {
            manager.mark_ready();
        }
        Event::Settle {
            south,
            west,
            north,
            east,
            zoom,
        } => {
            let viewport = scenario::viewport(*south, *west, *north, *east, *zoom);
            manager.viewport_mut().set(viewport.bounds, viewport.zoom);
            manager.on_viewport_settled();
        }
        Event::Add(spec) => manager.add_marker(spec.marker(), spec.min_zoom, spec.max_zoom),
        Event::AddBatch {
            markers,
            min_zoom,
            max_zoom,
        } => {
            let markers = markers.iter().map(|spec| spec.marker()).collect();
            manager.add_markers(markers, *min_zoom, *max_zoom);
        }
        Event::Remove { id } => {
            manager.remove_marker(*id)?;
        }
        Event::Move { id, lat, lng } => {
            manager.move_marker(*id, marker_grid::GeoPoint::new(*lat, *lng))?;
        }
        Event::Visible { visible } => manager.set_visible(*visible),
        Event::Refresh => manager.refresh(),
        Event::Clear => manager.clear_all(),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(events: &str) -> Scenario {
        let json = format!(
            r#"{{
                "config": {{ "max_zoom": 12, "tile_size": 256 }},
                "viewport": {{
                    "bounds": {{
                        "south_west": {{ "lat": 45.0, "lng": -2.0 }},
                        "north_east": {{ "lat": 50.0, "lng": 6.0 }}
                    }},
                    "zoom": 6
                }},
                "markers": [
                    {{ "id": 1, "lat": 48.8566, "lng": 2.3522 }},
                    {{ "id": 2, "lat": 40.4168, "lng": -3.7038 }}
                ],
                "events": {events}
            }}"#
        );
        Scenario::from_json(&json).unwrap()
    }

    #[test]
    fn test_replay_ready_and_pan() {
        let scenario = scenario(
            r#"[
                { "type": "ready" },
                { "type": "settle", "south": 36, "west": -8, "north": 42, "east": 0, "zoom": 6 }
            ]"#,
        );
        let seen = Rc::new(RefCell::new(0));
        let counter = seen.clone();
        let report = run(&scenario, scenario.config.clone(), move |_| {
            *counter.borrow_mut() += 1
        })
        .unwrap();

        assert_eq!(report.changes.len(), 2);
        assert_eq!(*seen.borrow(), 2);
        assert_eq!(report.changes[0].shown_count, 1);
        assert_eq!(report.shown, vec![MarkerId(2)]);
        assert_eq!(report.reveals, 2);
        assert_eq!(report.conceals, 1);
        assert_eq!(report.marker_count, 2);
    }

    #[test]
    fn test_replay_move_and_hide() {
        let scenario = scenario(
            r#"[
                { "type": "ready" },
                { "type": "move", "id": 2, "lat": 47.0, "lng": 3.0 },
                { "type": "visible", "visible": false }
            ]"#,
        );
        let report = run(&scenario, scenario.config.clone(), |_| {}).unwrap();
        assert_eq!(report.changes.last().map(|c| c.shown_count), Some(0));
        assert_eq!(report.changes[1].shown_count, 2);
        assert!(report.shown.is_empty());
    }

    #[test]
    fn test_unknown_marker_reports_event_index() {
        let scenario = scenario(r#"[{ "type": "ready" }, { "type": "remove", "id": 99 }]"#);
        let err = run(&scenario, scenario.config.clone(), |_| {}).unwrap_err();
        assert!(matches!(err, ReplayError::Event { index: 1, .. }));
    }

    #[test]
    fn test_invalid_config() {
        let scenario = scenario("[]");
        let config = Config {
            tile_size: 0,
            ..scenario.config.clone()
        };
        assert!(matches!(
            run(&scenario, config, |_| {}),
            Err(ReplayError::Grid(_))
        ));
    }

    #[test]
    fn test_bundled_scenario() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("scenarios/europe.json");
        let scenario = Scenario::load(&path).unwrap();
        let report = run(&scenario, scenario.config.clone(), |_| {}).unwrap();

        assert_eq!(report.shown, vec![MarkerId(11)]);
        assert_eq!(report.marker_count, 5);
        assert_eq!(report.reveals - report.conceals, 1);
    }
}
