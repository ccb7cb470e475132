//! Search-area drawing tool.
//!
//! A small state machine that turns map clicks into a polygon:
//!
//! ```text
//! Idle --start--> Drawing --finish--> Finished
//!   ^                |                    |
//!   +-----clear------+--------clear-------+
//! ```
//!
//! Vertices are only accepted while `Drawing`. Each one redraws a live preview (a lone
//! point, then a line, then a filled polygon). Only one drawn area exists at a time:
//! starting again discards the previous one.

use log::debug;
use serde_json::{json, Value};

use crate::renderer::{remove_layers_and_source, Cursor, LayerKind, LayerSpec, MapRenderer};
use crate::GeoPoint;

pub const DRAW_SOURCE_ID: &str = "draw-area";
pub const DRAW_FILL_LAYER_ID: &str = "draw-area-fill";
pub const DRAW_LINE_LAYER_ID: &str = "draw-area-line";
pub const DRAW_VERTEX_LAYER_ID: &str = "draw-area-vertices";

const DRAW_LAYERS: [&str; 3] = [DRAW_VERTEX_LAYER_ID, DRAW_LINE_LAYER_ID, DRAW_FILL_LAYER_ID];

/// A polygon needs at least this many vertices.
pub const MIN_POLYGON_VERTICES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawState {
    #[default]
    Idle,
    Drawing,
    Finished,
}

/// Captures map clicks into a search polygon.
#[derive(Debug, Default)]
pub struct DrawingTool {
    state: DrawState,
    vertices: Vec<GeoPoint>,
    overlay_attached: bool,
}

impl DrawingTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DrawState {
        self.state
    }

    pub fn is_drawing(&self) -> bool {
        self.state == DrawState::Drawing
    }

    /// Vertices in click order, unclosed.
    pub fn vertices(&self) -> &[GeoPoint] {
        &self.vertices
    }

    pub fn has_overlay(&self) -> bool {
        self.overlay_attached
    }

    /// The finished polygon, if drawing ended with enough vertices.
    pub fn polygon(&self) -> Option<&[GeoPoint]> {
        if self.state == DrawState::Finished && self.vertices.len() >= MIN_POLYGON_VERTICES {
            Some(&self.vertices)
        } else {
            None
        }
    }

    /// Begin a new area, discarding any previous one.
    pub fn start<R: MapRenderer + ?Sized>(&mut self, renderer: &mut R) {
        if self.state != DrawState::Idle || self.overlay_attached {
            self.clear(renderer);
        }
        self.vertices.clear();
        self.state = DrawState::Drawing;
        renderer.set_cursor(Cursor::Crosshair);
        debug!("[DrawingTool] started");
    }

    /// Append a vertex and redraw the preview. Ignored unless drawing.
    pub fn add_vertex<R: MapRenderer + ?Sized>(
        &mut self,
        renderer: &mut R,
        point: GeoPoint,
    ) -> bool {
        if !self.stage_vertex(point) {
            return false;
        }
        self.redraw(renderer);
        true
    }

    /// Append a vertex without touching the map (style not ready yet).
    ///
    /// The preview appears on the next [`DrawingTool::restore`].
    pub fn stage_vertex(&mut self, point: GeoPoint) -> bool {
        if self.state != DrawState::Drawing {
            return false;
        }
        self.vertices.push(point);
        debug!(
            "[DrawingTool] vertex #{} at ({:.6}, {:.6})",
            self.vertices.len(),
            point.lat,
            point.lng
        );
        true
    }

    /// Stop drawing. Returns the vertices (unclosed, in click order) when they form a
    /// polygon; fewer than three vertices yield nothing.
    pub fn finish<R: MapRenderer + ?Sized>(&mut self, renderer: &mut R) -> Option<Vec<GeoPoint>> {
        if self.state != DrawState::Drawing {
            return None;
        }
        self.state = DrawState::Finished;
        renderer.set_cursor(Cursor::Default);

        if self.vertices.len() >= MIN_POLYGON_VERTICES {
            debug!("[DrawingTool] finished with {} vertices", self.vertices.len());
            Some(self.vertices.clone())
        } else {
            debug!("[DrawingTool] finished with {} vertices, no polygon", self.vertices.len());
            None
        }
    }

    /// Back to idle: drop the vertices and remove the preview overlay.
    ///
    /// Returns whether there was anything to clear; a second call in a row does nothing.
    pub fn clear<R: MapRenderer + ?Sized>(&mut self, renderer: &mut R) -> bool {
        let was_active =
            self.state != DrawState::Idle || !self.vertices.is_empty() || self.overlay_attached;
        if self.state == DrawState::Drawing {
            renderer.set_cursor(Cursor::Default);
        }
        if self.overlay_attached {
            remove_layers_and_source(renderer, &DRAW_LAYERS, DRAW_SOURCE_ID);
            self.overlay_attached = false;
        }
        self.vertices.clear();
        self.state = DrawState::Idle;
        if was_active {
            debug!("[DrawingTool] cleared");
        }
        was_active
    }

    /// The renderer dropped all custom layers (style swap).
    pub fn mark_discarded(&mut self) {
        self.overlay_attached = false;
    }

    /// Redraw the overlay for the current vertices, if there are any.
    pub fn restore<R: MapRenderer + ?Sized>(&mut self, renderer: &mut R) {
        if !self.vertices.is_empty() {
            self.redraw(renderer);
        }
    }

    fn redraw<R: MapRenderer + ?Sized>(&mut self, renderer: &mut R) {
        let data = preview_geojson(&self.vertices);
        if self.overlay_attached && renderer.has_source(DRAW_SOURCE_ID) {
            renderer.set_source_data(DRAW_SOURCE_ID, data);
            return;
        }

        remove_layers_and_source(renderer, &DRAW_LAYERS, DRAW_SOURCE_ID);
        renderer.add_source(DRAW_SOURCE_ID, data);
        for layer in preview_layers() {
            renderer.add_layer(&layer);
        }
        self.overlay_attached = true;
    }
}

/// Vertices with the first one repeated at the end.
pub fn closed_ring(vertices: &[GeoPoint]) -> Vec<GeoPoint> {
    let mut ring = vertices.to_vec();
    if let (Some(first), Some(last)) = (vertices.first(), vertices.last()) {
        if first != last {
            ring.push(*first);
        }
    }
    ring
}

/// Preview shape plus one point per vertex.
fn preview_geojson(vertices: &[GeoPoint]) -> Value {
    let mut features: Vec<Value> = Vec::new();

    match vertices.len() {
        0 | 1 => {}
        2 => features.push(json!({
            "type": "Feature",
            "geometry": {
                "type": "LineString",
                "coordinates": vertices.iter().map(GeoPoint::to_lng_lat).collect::<Vec<_>>(),
            },
            "properties": { "role": "outline" },
        })),
        _ => features.push(json!({
            "type": "Feature",
            "geometry": {
                "type": "Polygon",
                "coordinates": [closed_ring(vertices)
                    .iter()
                    .map(GeoPoint::to_lng_lat)
                    .collect::<Vec<_>>()],
            },
            "properties": { "role": "area" },
        })),
    }

    for (i, v) in vertices.iter().enumerate() {
        features.push(json!({
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": v.to_lng_lat() },
            "properties": { "role": "vertex", "index": i },
        }));
    }

    json!({ "type": "FeatureCollection", "features": features })
}

fn preview_layers() -> Vec<LayerSpec> {
    vec![
        LayerSpec {
            id: DRAW_FILL_LAYER_ID.to_string(),
            source: DRAW_SOURCE_ID.to_string(),
            kind: LayerKind::Fill,
            paint: json!({ "fill-color": "#3b82f6", "fill-opacity": 0.2 }),
        },
        LayerSpec {
            id: DRAW_LINE_LAYER_ID.to_string(),
            source: DRAW_SOURCE_ID.to_string(),
            kind: LayerKind::Line,
            paint: json!({ "line-color": "#2563eb", "line-width": 2, "line-dasharray": [2, 1] }),
        },
        LayerSpec {
            id: DRAW_VERTEX_LAYER_ID.to_string(),
            source: DRAW_SOURCE_ID.to_string(),
            kind: LayerKind::Circle,
            paint: json!({
                "circle-radius": 5,
                "circle-color": "#ffffff",
                "circle-stroke-color": "#2563eb",
                "circle-stroke-width": 2,
            }),
        },
    ]
}
