//! The narrow interface to the imperative map library.
//!
//! A renderer owns the live map surface: basemap style, DOM-style markers with
//! popups, GeoJSON sources and the layers drawn from them. Everything above this
//! trait holds only the opaque handles and ids it hands out.
//!
//! Implementations must follow the usual vector-map semantics:
//! - replacing the style discards every custom source and layer (markers survive)
//! - adding a source or layer whose id already exists is a caller error
//! - removing a handle twice is a caller error

use serde_json::Value;

use crate::GeoPoint;

/// Opaque reference to an on-map marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerHandle(pub u64);

/// Opaque reference to a popup anchored to a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PopupHandle(pub u64);

/// What a marker represents, for styling on the renderer side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    Property,
    Cluster,
    Selection,
    UserLocation,
}

/// Visual description of a marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSpec {
    pub kind: MarkerKind,
    pub position: GeoPoint,
    /// Text on the marker (formatted price)
    pub label: Option<String>,
    /// Member count bubble for clusters
    pub badge: Option<u32>,
    /// CSS color
    pub color: String,
    /// Diameter in pixels, 0 for a label-sized pill
    pub size: u32,
}

impl MarkerSpec {
    /// Plain pin with no label.
    pub fn pin(kind: MarkerKind, position: GeoPoint, color: &str) -> Self {
        Self {
            kind,
            position,
            label: None,
            badge: None,
            color: color.to_string(),
            size: 0,
        }
    }
}

/// Content of a hover popup.
#[derive(Debug, Clone, PartialEq)]
pub struct PopupSpec {
    pub title: String,
    pub lines: Vec<String>,
    pub image_url: Option<String>,
}

/// Map cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    Default,
    Pointer,
    Crosshair,
}

/// Layer types the core draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    Heatmap,
    Fill,
    Line,
    Circle,
}

/// A style layer drawn from a GeoJSON source.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
    pub id: String,
    pub source: String,
    pub kind: LayerKind,
    /// Style-spec paint properties
    pub paint: Value,
}

/// Operations the core needs from a live map.
pub trait MapRenderer {
    /// Replace the basemap style. Custom sources and layers are discarded.
    fn set_style(&mut self, style_url: &str);

    fn add_marker(&mut self, spec: &MarkerSpec) -> MarkerHandle;
    fn remove_marker(&mut self, marker: MarkerHandle);

    /// Create a popup bound to `marker`, initially closed.
    fn attach_popup(&mut self, marker: MarkerHandle, spec: &PopupSpec) -> PopupHandle;
    fn set_popup_open(&mut self, popup: PopupHandle, open: bool);
    fn remove_popup(&mut self, popup: PopupHandle);

    fn add_source(&mut self, id: &str, data: Value);
    fn set_source_data(&mut self, id: &str, data: Value);
    fn remove_source(&mut self, id: &str);
    fn has_source(&self, id: &str) -> bool;

    fn add_layer(&mut self, layer: &LayerSpec);
    fn remove_layer(&mut self, id: &str);
    fn has_layer(&self, id: &str) -> bool;

    fn set_cursor(&mut self, cursor: Cursor);

    /// Animate the camera to `center` at `zoom`.
    fn ease_to(&mut self, center: GeoPoint, zoom: f64);

    /// Tear down the map instance. No other call is valid afterwards.
    fn destroy(&mut self);
}

/// Remove a layer, then its source, when present.
///
/// Both overlays (heatmap, drawn area) use this so that a detach after a style swap,
/// which has already discarded them, is a no-op.
pub(crate) fn remove_layers_and_source<R: MapRenderer + ?Sized>(
    renderer: &mut R,
    layer_ids: &[&str],
    source_id: &str,
) -> bool {
    let mut removed = false;
    for id in layer_ids {
        if renderer.has_layer(id) {
            renderer.remove_layer(id);
            removed = true;
        }
    }
    if renderer.has_source(source_id) {
        renderer.remove_source(source_id);
        removed = true;
    }
    removed
}
