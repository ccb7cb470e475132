//! In-memory renderer.
//!
//! Keeps the same object graph a real map would (markers, popups, sources, layers,
//! camera) without drawing anything. Misuse that a real map library would throw on,
//! such as duplicate ids or removing a handle twice, is recorded in
//! [`HeadlessRenderer::violations`] instead of panicking.

use std::collections::HashMap;

use log::debug;
use serde_json::Value;

use crate::renderer::{
    Cursor, LayerSpec, MapRenderer, MarkerHandle, MarkerSpec, PopupHandle, PopupSpec,
};
use crate::GeoPoint;

#[derive(Debug, Clone)]
struct PopupState {
    marker: MarkerHandle,
    spec: PopupSpec,
    open: bool,
}

/// Renderer that records state instead of drawing.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    next_id: u64,
    style_url: Option<String>,
    style_changes: u32,
    markers: HashMap<MarkerHandle, MarkerSpec>,
    popups: HashMap<PopupHandle, PopupState>,
    sources: HashMap<String, Value>,
    layers: Vec<LayerSpec>,
    cursor: Option<Cursor>,
    camera: Option<(GeoPoint, f64)>,
    destroyed: bool,

    // Counters for removal side effects
    markers_removed: u32,
    popups_removed: u32,
    sources_removed: u32,
    layers_removed: u32,

    violations: Vec<String>,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_handle(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_alive(&mut self, op: &str) {
        if self.destroyed {
            self.violations.push(format!("{} after destroy", op));
        }
    }

    pub fn style_url(&self) -> Option<&str> {
        self.style_url.as_deref()
    }

    /// Number of `set_style` calls.
    pub fn style_changes(&self) -> u32 {
        self.style_changes
    }

    pub fn live_marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn live_popup_count(&self) -> usize {
        self.popups.len()
    }

    pub fn open_popup_count(&self) -> usize {
        self.popups.values().filter(|p| p.open).count()
    }

    /// Content of every popup currently shown.
    pub fn open_popups(&self) -> impl Iterator<Item = &PopupSpec> {
        self.popups.values().filter(|p| p.open).map(|p| &p.spec)
    }

    pub fn markers(&self) -> impl Iterator<Item = &MarkerSpec> {
        self.markers.values()
    }

    pub fn marker(&self, handle: MarkerHandle) -> Option<&MarkerSpec> {
        self.markers.get(&handle)
    }

    pub fn source(&self, id: &str) -> Option<&Value> {
        self.sources.get(id)
    }

    pub fn layer(&self, id: &str) -> Option<&LayerSpec> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn layer_ids(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.id.as_str()).collect()
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn cursor(&self) -> Option<Cursor> {
        self.cursor
    }

    /// Last requested camera position and zoom.
    pub fn camera(&self) -> Option<(GeoPoint, f64)> {
        self.camera
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn markers_removed(&self) -> u32 {
        self.markers_removed
    }

    pub fn popups_removed(&self) -> u32 {
        self.popups_removed
    }

    pub fn sources_removed(&self) -> u32 {
        self.sources_removed
    }

    pub fn layers_removed(&self) -> u32 {
        self.layers_removed
    }

    /// Calls a real map library would have rejected.
    pub fn violations(&self) -> &[String] {
        &self.violations
    }
}

impl MapRenderer for HeadlessRenderer {
    fn set_style(&mut self, style_url: &str) {
        self.check_alive("set_style");
        debug!(
            "[HeadlessRenderer] style -> {} (dropping {} sources, {} layers)",
            style_url,
            self.sources.len(),
            self.layers.len()
        );
        self.style_url = Some(style_url.to_string());
        self.style_changes += 1;
        self.sources.clear();
        self.layers.clear();
    }

    fn add_marker(&mut self, spec: &MarkerSpec) -> MarkerHandle {
        self.check_alive("add_marker");
        let handle = MarkerHandle(self.next_handle());
        self.markers.insert(handle, spec.clone());
        handle
    }

    fn remove_marker(&mut self, marker: MarkerHandle) {
        if self.popups.values().any(|p| p.marker == marker) {
            self.violations.push(format!("remove_marker: {:?} still has a popup", marker));
        }
        if self.markers.remove(&marker).is_some() {
            self.markers_removed += 1;
        } else {
            self.violations.push(format!("remove_marker: unknown {:?}", marker));
        }
    }

    fn attach_popup(&mut self, marker: MarkerHandle, spec: &PopupSpec) -> PopupHandle {
        self.check_alive("attach_popup");
        if !self.markers.contains_key(&marker) {
            self.violations.push(format!("attach_popup: unknown {:?}", marker));
        }
        let handle = PopupHandle(self.next_handle());
        self.popups.insert(
            handle,
            PopupState {
                marker,
                spec: spec.clone(),
                open: false,
            },
        );
        handle
    }

    fn set_popup_open(&mut self, popup: PopupHandle, open: bool) {
        match self.popups.get_mut(&popup) {
            Some(state) => state.open = open,
            None => self.violations.push(format!("set_popup_open: unknown {:?}", popup)),
        }
    }

    fn remove_popup(&mut self, popup: PopupHandle) {
        if self.popups.remove(&popup).is_some() {
            self.popups_removed += 1;
        } else {
            self.violations.push(format!("remove_popup: unknown {:?}", popup));
        }
    }

    fn add_source(&mut self, id: &str, data: Value) {
        self.check_alive("add_source");
        if self.sources.contains_key(id) {
            self.violations.push(format!("add_source: '{}' already exists", id));
        }
        self.sources.insert(id.to_string(), data);
    }

    fn set_source_data(&mut self, id: &str, data: Value) {
        match self.sources.get_mut(id) {
            Some(existing) => *existing = data,
            None => self.violations.push(format!("set_source_data: unknown source '{}'", id)),
        }
    }

    fn remove_source(&mut self, id: &str) {
        if self.layers.iter().any(|l| l.source == id) {
            self.violations.push(format!("remove_source: '{}' still used by a layer", id));
        }
        if self.sources.remove(id).is_some() {
            self.sources_removed += 1;
        } else {
            self.violations.push(format!("remove_source: unknown source '{}'", id));
        }
    }

    fn has_source(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    fn add_layer(&mut self, layer: &LayerSpec) {
        self.check_alive("add_layer");
        if self.has_layer(&layer.id) {
            self.violations.push(format!("add_layer: '{}' already exists", layer.id));
            return;
        }
        if !self.sources.contains_key(&layer.source) {
            self.violations.push(format!(
                "add_layer: '{}' references missing source '{}'",
                layer.id, layer.source
            ));
        }
        self.layers.push(layer.clone());
    }

    fn remove_layer(&mut self, id: &str) {
        let before = self.layers.len();
        self.layers.retain(|l| l.id != id);
        if self.layers.len() < before {
            self.layers_removed += 1;
        } else {
            self.violations.push(format!("remove_layer: unknown layer '{}'", id));
        }
    }

    fn has_layer(&self, id: &str) -> bool {
        self.layers.iter().any(|l| l.id == id)
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        self.cursor = Some(cursor);
    }

    fn ease_to(&mut self, center: GeoPoint, zoom: f64) {
        self.check_alive("ease_to");
        self.camera = Some((center, zoom));
    }

    fn destroy(&mut self) {
        if self.destroyed {
            self.violations.push("destroy called twice".to_string());
        }
        self.destroyed = true;
    }
}
