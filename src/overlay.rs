//! Map overlay presentation sink
//!
//! The overlay receives the viewer's location and the latest batch of
//! detected objects and re-renders its sink whenever either changes.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Map centre used until a location is known
pub const DEFAULT_CENTER: GeoPoint = GeoPoint {
    latitude: 51.505,
    longitude: -0.09,
};
pub const DEFAULT_ZOOM: u8 = 13;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl From<(f64, f64)> for GeoPoint {
    fn from((latitude, longitude): (f64, f64)) -> Self {
        Self::new(latitude, longitude)
    }
}

/// A labeled object the processing service found at a location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub label: String,
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lng")]
    pub longitude: f64,
}

impl DetectionEvent {
    pub fn new(label: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            label: label.to_string(),
            latitude,
            longitude,
        }
    }

    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// Props handed to the sink on every render
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OverlayFrame {
    pub current_location: Option<GeoPoint>,
    pub detected_objects: Vec<DetectionEvent>,
}

/// Something that can draw the overlay
pub trait MapOverlaySink: Send + Sync {
    fn render(&self, frame: &OverlayFrame);
}

/// Holds the overlay props and pushes them to the sink on change
pub struct MapOverlay {
    sink: Arc<dyn MapOverlaySink>,
    frame: Mutex<OverlayFrame>,
}

impl MapOverlay {
    pub fn new(sink: Arc<dyn MapOverlaySink>, initial_location: Option<GeoPoint>) -> Self {
        Self {
            sink,
            frame: Mutex::new(OverlayFrame {
                current_location: initial_location,
                detected_objects: Vec::new(),
            }),
        }
    }

    pub fn set_location(&self, location: GeoPoint) {
        let frame = {
            let mut frame = self.frame.lock();
            if frame.current_location == Some(location) {
                return;
            }
            frame.current_location = Some(location);
            frame.clone()
        };
        self.sink.render(&frame);
    }

    /// Replace the detected objects with the latest batch
    pub fn show_detections(&self, objects: Vec<DetectionEvent>) {
        let frame = {
            let mut frame = self.frame.lock();
            frame.detected_objects = objects;
            frame.clone()
        };
        self.sink.render(&frame);
    }

    pub fn frame(&self) -> OverlayFrame {
        self.frame.lock().clone()
    }
}

/// A marker placed on the map
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub position: GeoPoint,
    pub popup: String,
}

#[derive(Debug, Default)]
struct LayerState {
    markers: Vec<Marker>,
    center: Option<GeoPoint>,
    renders: usize,
}

/// Marker-accumulating map layer.
///
/// Markers are added on every render and never removed, so re-rendering the
/// same detections duplicates them.
#[derive(Debug, Default, Clone)]
pub struct MarkerLayer {
    state: Arc<Mutex<LayerState>>,
}

impl MarkerLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn markers(&self) -> Vec<Marker> {
        self.state.lock().markers.clone()
    }

    /// Map centre, falling back to [`DEFAULT_CENTER`]
    pub fn center(&self) -> GeoPoint {
        self.state.lock().center.unwrap_or(DEFAULT_CENTER)
    }

    pub fn zoom(&self) -> u8 {
        DEFAULT_ZOOM
    }

    pub fn render_count(&self) -> usize {
        self.state.lock().renders
    }
}

impl MapOverlaySink for MarkerLayer {
    fn render(&self, frame: &OverlayFrame) {
        let mut state = self.state.lock();
        state.renders += 1;

        if let Some(location) = frame.current_location {
            state.markers.push(Marker {
                position: location,
                popup: "You are here".to_string(),
            });
            state.center = Some(location);
        }

        for object in &frame.detected_objects {
            state.markers.push(Marker {
                position: object.position(),
                popup: format!("Detected: {}", object.label),
            });
        }

        debug!("Marker layer now holds {} markers", state.markers.len());
    }
}

/// Sink that logs each render, used by the CLI
#[derive(Debug, Default)]
pub struct TracingOverlaySink;

impl MapOverlaySink for TracingOverlaySink {
    fn render(&self, frame: &OverlayFrame) {
        if let Some(location) = frame.current_location {
            info!(
                "Map centred on {:.5}, {:.5}",
                location.latitude, location.longitude
            );
        }
        for object in &frame.detected_objects {
            info!(
                "Detected: {} at {:.5}, {:.5}",
                object.label, object.latitude, object.longitude
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_batches_render_in_order() {
        let layer = MarkerLayer::new();
        let overlay = MapOverlay::new(Arc::new(layer.clone()), None);

        overlay.show_detections(vec![DetectionEvent::new("car", 51.5, -0.1)]);
        overlay.show_detections(vec![
            DetectionEvent::new("person", 51.6, -0.2),
            DetectionEvent::new("dog", 51.7, -0.3),
        ]);

        let popups: Vec<String> = layer.markers().into_iter().map(|m| m.popup).collect();
        assert_eq!(
            popups,
            vec!["Detected: car", "Detected: person", "Detected: dog"]
        );
        assert_eq!(layer.render_count(), 2);
        assert_eq!(overlay.frame().detected_objects.len(), 2);
    }

    #[test]
    fn test_default_center_until_location_known() {
        let layer = MarkerLayer::new();
        let overlay = MapOverlay::new(Arc::new(layer.clone()), None);
        assert_eq!(layer.center(), DEFAULT_CENTER);
        assert_eq!(layer.zoom(), 13);

        overlay.set_location(GeoPoint::new(48.85, 2.35));
        assert_eq!(layer.center(), GeoPoint::new(48.85, 2.35));
        assert_eq!(layer.markers()[0].popup, "You are here");

        overlay.set_location(GeoPoint::new(48.85, 2.35));
        assert_eq!(layer.render_count(), 1);
    }

    #[test]
    fn test_rerender_duplicates_markers() {
        let layer = MarkerLayer::new();
        let overlay = MapOverlay::new(Arc::new(layer.clone()), None);

        let batch = vec![DetectionEvent::new("car", 1.0, 2.0)];
        overlay.show_detections(batch.clone());
        overlay.show_detections(batch);
        assert_eq!(layer.markers().len(), 2);
    }

    #[test]
    fn test_detection_wire_names() {
        let event: DetectionEvent =
            serde_json::from_str(r#"{"label":"bus","lat":10.5,"lng":-3.25}"#).unwrap();
        assert_eq!(event, DetectionEvent::new("bus", 10.5, -3.25));
    }
}
