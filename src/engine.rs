//! Stateful map engine.
//!
//! `MapEngine` owns the renderer and every handle created on it: listing markers (through
//! the [`MarkerRegistry`]), the heatmap and drawn-area overlays, the selection and
//! user-location markers, and the zoom-debounce and style-settle timers.
//!
//! The host forwards renderer events (`handle_*`) and host inputs (`set_*`), and calls
//! [`MapEngine::tick`] when [`MapEngine::next_deadline`] passes. Everything runs on the
//! caller's thread; only location and geocoding requests suspend.
//!
//! ## Style swaps
//!
//! The renderer drops custom sources and layers when its style is replaced, and its
//! "loaded" signal does not mean every sub-layer is usable. After "loaded" the engine waits
//! `style_settle_delay`, then re-attaches the heatmap (when enabled), the drawn area (when
//! there is one) and the user-location marker (when resolved). A renderer that reports a
//! reliable idle state can short-circuit the wait with [`MapEngine::handle_renderer_idle`].
//! A new style request cancels a pending settle so re-attachment targets the final style.

use std::time::Instant;

use log::{debug, info, warn};

use crate::clustering::build_clusters;
use crate::config::{BasemapStyle, MapConfig};
use crate::drawing::{DrawState, DrawingTool};
use crate::error::MapError;
use crate::heatmap::HeatmapLayer;
use crate::location::{LocationService, PlaceInfo, PositionProvider, ReverseGeocoder};
use crate::markers::{entries_for, MarkerAction, MarkerRegistry};
use crate::renderer::{MapRenderer, MarkerHandle, MarkerKind, MarkerSpec};
use crate::spatial::PropertyIndex;
use crate::timer::Timer;
use crate::{Bounds, GeoPoint, Property};

const SELECTION_COLOR: &str = "#ef4444";
const USER_LOCATION_COLOR: &str = "#0ea5e9";

// ============================================================================
// Host-facing types
// ============================================================================

pub type PropertyClickCallback = Box<dyn FnMut(&str)>;
pub type AreaSelectCallback = Box<dyn FnMut(&[GeoPoint])>;
pub type MapClickCallback = Box<dyn FnMut(f64, f64)>;
pub type LocationSelectCallback = Box<dyn FnMut(f64, f64, Option<&PlaceInfo>)>;

/// Host callbacks. Coordinates are passed longitude first.
#[derive(Default)]
pub struct MapCallbacks {
    /// A single-listing marker was clicked; receives the listing id.
    pub on_property_click: Option<PropertyClickCallback>,
    /// A drawn area was finished with at least three vertices.
    pub on_area_select: Option<AreaSelectCallback>,
    /// The map (not a marker) was clicked outside drawing mode.
    pub on_map_click: Option<MapClickCallback>,
    /// A picked location finished reverse geocoding, with or without an address.
    pub on_location_select: Option<LocationSelectCallback>,
}

impl MapCallbacks {
    pub fn with_property_click(mut self, f: impl FnMut(&str) + 'static) -> Self {
        self.on_property_click = Some(Box::new(f));
        self
    }

    pub fn with_area_select(mut self, f: impl FnMut(&[GeoPoint]) + 'static) -> Self {
        self.on_area_select = Some(Box::new(f));
        self
    }

    pub fn with_map_click(mut self, f: impl FnMut(f64, f64) + 'static) -> Self {
        self.on_map_click = Some(Box::new(f));
        self
    }

    pub fn with_location_select(
        mut self,
        f: impl FnMut(f64, f64, Option<&PlaceInfo>) + 'static,
    ) -> Self {
        self.on_location_select = Some(Box::new(f));
        self
    }
}

/// What the user currently sees.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    /// Zoom of the last applied (debounced) zoom-end event.
    pub zoom: f64,
    pub style: BasemapStyle,
    pub show_clusters: bool,
    pub show_heatmap: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapStatus {
    /// Waiting for the first style "loaded" signal.
    Loading,
    Ready,
}

/// A picked location waiting for its address.
///
/// Returned by [`MapEngine::handle_click`]; hand it back through
/// [`MapEngine::complete_location_lookup`] once reverse geocoding has finished.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationLookup {
    pub point: GeoPoint,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClickOutcome {
    /// Added a vertex to the area being drawn.
    Vertex,
    /// Placed the selection marker; the address lookup is up to the host.
    LocationPicked(LocationLookup),
    /// The engine is disposed.
    Ignored,
}

// ============================================================================
// Engine
// ============================================================================

pub struct MapEngine<R: MapRenderer> {
    config: MapConfig,
    renderer: R,
    callbacks: MapCallbacks,

    view: ViewState,
    status: MapStatus,
    last_error: Option<MapError>,

    properties: Vec<Property>,
    index: PropertyIndex,
    registry: MarkerRegistry,
    heatmap: HeatmapLayer,
    drawing: DrawingTool,

    selected_location: Option<GeoPoint>,
    selection_marker: Option<MarkerHandle>,
    user_location: Option<GeoPoint>,
    user_marker: Option<MarkerHandle>,

    // Custom sources/layers may be added only when true
    style_ready: bool,
    zoom_debounce: Timer,
    pending_zoom: Option<f64>,
    style_settle: Timer,

    disposed: bool,
}

impl<R: MapRenderer> MapEngine<R> {
    /// Create the engine and point the renderer at the configured style and `center`.
    ///
    /// Fails with [`MapError::MissingApiKey`] before touching the renderer when no key is
    /// configured.
    pub fn new(
        config: MapConfig,
        mut renderer: R,
        center: GeoPoint,
        callbacks: MapCallbacks,
    ) -> Result<Self, MapError> {
        config.validate()?;
        if !center.is_valid() {
            return Err(MapError::InvalidCoordinates(format!(
                "initial center ({}, {})",
                center.lat, center.lng
            )));
        }

        let view = ViewState {
            zoom: config.default_zoom,
            style: config.style,
            show_clusters: true,
            show_heatmap: false,
        };

        renderer.set_style(&config.style_url(config.style));
        renderer.ease_to(center, config.default_zoom);
        info!(
            "[MapEngine] Created at ({:.5}, {:.5}) zoom {} with style {}",
            center.lat, center.lng, config.default_zoom, config.style
        );

        let heatmap = HeatmapLayer::new(config.heatmap.clone());
        Ok(Self {
            config,
            renderer,
            callbacks,
            view,
            status: MapStatus::Loading,
            last_error: None,
            properties: Vec::new(),
            index: PropertyIndex::default(),
            registry: MarkerRegistry::new(),
            heatmap,
            drawing: DrawingTool::new(),
            selected_location: None,
            selection_marker: None,
            user_location: None,
            user_marker: None,
            style_ready: false,
            zoom_debounce: Timer::new(),
            pending_zoom: None,
            style_settle: Timer::new(),
            disposed: false,
        })
    }

    /// Resolve the device location, then create the engine centered on it.
    ///
    /// The configuration is checked first so a missing key never waits on the device.
    /// Location failures fall back to `config.default_center`.
    pub async fn initialize<P, G>(
        config: MapConfig,
        renderer: R,
        location: &mut LocationService<P, G>,
        callbacks: MapCallbacks,
    ) -> Result<Self, MapError>
    where
        P: PositionProvider,
        G: ReverseGeocoder,
    {
        config.validate()?;

        let resolved = location.resolve_once().await.ok();
        let center = resolved.unwrap_or(config.default_center);
        if resolved.is_none() {
            info!("[MapEngine] Using default center");
        }

        let mut engine = Self::new(config, renderer, center, callbacks)?;
        if let Some(point) = resolved {
            engine.show_user_location(point);
        }
        Ok(engine)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn status(&self) -> MapStatus {
        self.status
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn registry(&self) -> &MarkerRegistry {
        &self.registry
    }

    pub fn heatmap(&self) -> &HeatmapLayer {
        &self.heatmap
    }

    pub fn drawing(&self) -> &DrawingTool {
        &self.drawing
    }

    pub fn selected_location(&self) -> Option<GeoPoint> {
        self.selected_location
    }

    pub fn user_location(&self) -> Option<GeoPoint> {
        self.user_location
    }

    /// The last renderer error, until dismissed.
    pub fn error(&self) -> Option<&MapError> {
        self.last_error.as_ref()
    }

    /// Banner text for the last renderer error, until dismissed.
    pub fn error_banner(&self) -> Option<String> {
        self.last_error.as_ref().map(|e| e.to_string())
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    /// Earliest pending timer deadline; call [`MapEngine::tick`] once it has passed.
    pub fn next_deadline(&self) -> Option<Instant> {
        [self.zoom_debounce.deadline(), self.style_settle.deadline()]
            .into_iter()
            .flatten()
            .min()
    }

    // ========================================================================
    // Host inputs
    // ========================================================================

    /// Replace the listing set. Markers are rebuilt immediately at the current zoom.
    ///
    /// Listings with invalid coordinates are dropped.
    pub fn set_properties(&mut self, mut properties: Vec<Property>) {
        if self.disposed {
            return;
        }
        let before = properties.len();
        properties.retain(|p| p.coordinates.is_valid());
        if properties.len() < before {
            warn!(
                "[MapEngine] Dropped {} listings with invalid coordinates",
                before - properties.len()
            );
        }

        self.index = PropertyIndex::new(&properties);
        self.properties = properties;
        self.rebuild_markers();
        self.refresh_heatmap();
    }

    pub fn set_show_clusters(&mut self, show: bool) {
        if self.disposed || self.view.show_clusters == show {
            return;
        }
        self.view.show_clusters = show;
        self.rebuild_markers();
    }

    pub fn set_show_heatmap(&mut self, show: bool) {
        if self.disposed || self.view.show_heatmap == show {
            return;
        }
        self.view.show_heatmap = show;
        self.rebuild_markers();
        self.refresh_heatmap();
    }

    /// Switch basemap. Overlays come back after the new style has loaded and settled.
    pub fn set_style(&mut self, style: BasemapStyle) {
        if self.disposed {
            return;
        }
        if self.style_settle.cancel() {
            debug!("[MapEngine] Style change supersedes pending settle");
        }

        self.style_ready = false;
        self.heatmap.detach(&mut self.renderer);
        self.drawing.mark_discarded();
        self.remove_user_marker();

        self.view.style = style;
        let url = self.config.style_url(style);
        self.renderer.set_style(&url);
        info!("[MapEngine] Style -> {}", style);
    }

    /// Place, move or remove the selection marker.
    pub fn set_selected_location(&mut self, location: Option<GeoPoint>) {
        if self.disposed {
            return;
        }
        if let Some(handle) = self.selection_marker.take() {
            self.renderer.remove_marker(handle);
        }
        self.selected_location = location.filter(|p| p.is_valid());
        if let Some(point) = self.selected_location {
            let spec = MarkerSpec::pin(MarkerKind::Selection, point, SELECTION_COLOR);
            self.selection_marker = Some(self.renderer.add_marker(&spec));
        }
    }

    // ========================================================================
    // Renderer events
    // ========================================================================

    /// The renderer reported that the current style finished loading.
    pub fn handle_style_loaded(&mut self, now: Instant) {
        if self.disposed {
            return;
        }
        if self.status == MapStatus::Loading {
            self.status = MapStatus::Ready;
            info!("[MapEngine] Map ready");
        }
        self.style_settle.schedule(now, self.config.style_settle_delay);
        debug!(
            "[MapEngine] Style loaded, re-attaching overlays in {:?}",
            self.config.style_settle_delay
        );
    }

    /// The renderer reported that all sub-systems are idle. Re-attaches overlays at once
    /// when a settle wait is pending.
    pub fn handle_renderer_idle(&mut self) {
        if self.disposed {
            return;
        }
        if self.style_settle.cancel() {
            debug!("[MapEngine] Renderer idle, settling early");
            self.restore_overlays();
        }
    }

    /// A zoom gesture ended. Markers are rebuilt once the gesture has been quiet for
    /// `zoom_debounce`; earlier events in the window are dropped.
    pub fn handle_zoom_end(&mut self, zoom: f64, now: Instant) {
        if self.disposed || !zoom.is_finite() {
            return;
        }
        self.pending_zoom = Some(zoom.clamp(0.0, self.config.max_zoom));
        self.zoom_debounce.schedule(now, self.config.zoom_debounce);
    }

    /// The renderer failed to load tiles or a style, or threw at runtime.
    ///
    /// Shown as a banner; markers and overlays already on the map stay.
    pub fn handle_render_error(&mut self, message: &str) {
        if self.disposed {
            return;
        }
        warn!("[MapEngine] Renderer error: {}", message);
        self.last_error = Some(MapError::Renderer(message.to_string()));
    }

    /// Run timers whose deadline has passed.
    pub fn tick(&mut self, now: Instant) {
        if self.disposed {
            return;
        }

        if self.zoom_debounce.fire_if_due(now) {
            if let Some(zoom) = self.pending_zoom.take() {
                self.view.zoom = zoom;
            }
            debug!("[MapEngine] Zoom settled at {}", self.view.zoom);
            self.rebuild_markers();
        }

        if self.style_settle.fire_if_due(now) {
            self.restore_overlays();
        }
    }

    // ========================================================================
    // Clicks
    // ========================================================================

    /// Route a click on the map surface.
    ///
    /// While drawing, the point becomes a vertex. Otherwise it is a location pick: the
    /// selection marker moves there, `on_map_click` fires, and the returned lookup should
    /// be completed with the reverse-geocoded address.
    ///
    /// Marker clicks go to [`MapEngine::marker_click`] instead.
    pub fn handle_click(&mut self, point: GeoPoint) -> ClickOutcome {
        if self.disposed {
            return ClickOutcome::Ignored;
        }

        if self.drawing.is_drawing() {
            if self.style_ready {
                self.drawing.add_vertex(&mut self.renderer, point);
            } else {
                // Drawn by restore_overlays once the style has settled
                self.drawing.stage_vertex(point);
            }
            return ClickOutcome::Vertex;
        }

        self.set_selected_location(Some(point));
        if let Some(on_map_click) = self.callbacks.on_map_click.as_mut() {
            on_map_click(point.lng, point.lat);
        }
        ClickOutcome::LocationPicked(LocationLookup { point })
    }

    /// Deliver the address of a picked location to `on_location_select`.
    ///
    /// Returns `false` (and fires nothing) once the engine is disposed.
    pub fn complete_location_lookup(
        &mut self,
        lookup: LocationLookup,
        place: Option<PlaceInfo>,
    ) -> bool {
        if self.disposed {
            debug!("[MapEngine] Dropping location result after dispose");
            return false;
        }
        if let Some(on_location_select) = self.callbacks.on_location_select.as_mut() {
            on_location_select(lookup.point.lng, lookup.point.lat, place.as_ref());
        }
        true
    }

    /// Reverse-geocode a picked location and deliver it.
    pub async fn resolve_location_lookup<P, G>(
        &mut self,
        lookup: LocationLookup,
        location: &LocationService<P, G>,
    ) -> bool
    where
        P: PositionProvider,
        G: ReverseGeocoder,
    {
        if self.disposed {
            return false;
        }
        let place = location.reverse_geocode(lookup.point).await;
        self.complete_location_lookup(lookup, place)
    }

    pub fn marker_pointer_enter(&mut self, key: &str) -> bool {
        !self.disposed && self.registry.pointer_enter(&mut self.renderer, key)
    }

    pub fn marker_pointer_leave(&mut self, key: &str) -> bool {
        !self.disposed && self.registry.pointer_leave(&mut self.renderer, key)
    }

    /// A listing or cluster marker was clicked.
    ///
    /// Single listings go to `on_property_click`; clusters zoom the map in on their
    /// centroid.
    pub fn marker_click(&mut self, key: &str) -> Option<MarkerAction> {
        if self.disposed {
            return None;
        }
        let action = self.registry.click(key, self.view.zoom, &self.config.cluster)?;
        match &action {
            MarkerAction::SelectProperty(id) => {
                if let Some(on_property_click) = self.callbacks.on_property_click.as_mut() {
                    on_property_click(id);
                }
            }
            MarkerAction::ZoomTo { center, zoom } => {
                self.renderer.ease_to(*center, zoom.min(self.config.max_zoom));
            }
        }
        Some(action)
    }

    // ========================================================================
    // Area drawing
    // ========================================================================

    pub fn start_drawing(&mut self) {
        if self.disposed {
            return;
        }
        self.drawing.start(&mut self.renderer);
    }

    /// End the drawing session. With three or more vertices, `on_area_select` receives
    /// them in click order.
    pub fn finish_drawing(&mut self) -> Option<Vec<GeoPoint>> {
        if self.disposed {
            return None;
        }
        let polygon = self.drawing.finish(&mut self.renderer)?;
        if let Some(on_area_select) = self.callbacks.on_area_select.as_mut() {
            on_area_select(&polygon);
        }
        info!("[MapEngine] Area selected with {} vertices", polygon.len());
        Some(polygon)
    }

    pub fn clear_drawing(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        self.drawing.clear(&mut self.renderer)
    }

    pub fn drawing_state(&self) -> DrawState {
        self.drawing.state()
    }

    /// Listings inside the finished drawn area.
    pub fn properties_in_area(&self) -> Vec<&Property> {
        match self.drawing.polygon() {
            Some(vertices) => self
                .index
                .within_polygon(vertices)
                .into_iter()
                .map(|i| &self.properties[i])
                .collect(),
            None => Vec::new(),
        }
    }

    /// Listings inside a bounding box, such as the visible viewport.
    pub fn properties_in_bounds(&self, bounds: &Bounds) -> Vec<&Property> {
        self.index
            .within_bounds(bounds)
            .into_iter()
            .map(|i| &self.properties[i])
            .collect()
    }

    // ========================================================================
    // User location
    // ========================================================================

    /// Ask for the device location again and center the map on it.
    ///
    /// Failures are logged and leave the map where it is.
    pub async fn locate_user<P, G>(
        &mut self,
        location: &mut LocationService<P, G>,
    ) -> Option<GeoPoint>
    where
        P: PositionProvider,
        G: ReverseGeocoder,
    {
        if self.disposed {
            return None;
        }
        match location.resolve_once().await {
            Ok(point) => {
                self.show_user_location(point);
                let zoom = self.config.locate_zoom.min(self.config.max_zoom);
                self.renderer.ease_to(point, zoom);
                Some(point)
            }
            Err(e) => {
                warn!("[MapEngine] Could not locate user: {}", e);
                None
            }
        }
    }

    fn show_user_location(&mut self, point: GeoPoint) {
        self.user_location = Some(point);
        self.remove_user_marker();
        self.add_user_marker();
    }

    fn add_user_marker(&mut self) {
        if let (Some(point), None) = (self.user_location, self.user_marker) {
            let spec = MarkerSpec::pin(MarkerKind::UserLocation, point, USER_LOCATION_COLOR);
            self.user_marker = Some(self.renderer.add_marker(&spec));
        }
    }

    fn remove_user_marker(&mut self) {
        if let Some(handle) = self.user_marker.take() {
            self.renderer.remove_marker(handle);
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn rebuild_markers(&mut self) {
        let clusters = build_clusters(
            &self.properties,
            self.view.zoom,
            self.view.show_clusters,
            &self.config.cluster,
        );
        self.registry.reconcile(&mut self.renderer, entries_for(clusters));
    }

    fn refresh_heatmap(&mut self) {
        if self.style_ready {
            self.heatmap
                .set(&mut self.renderer, &self.properties, self.view.show_heatmap);
        } else {
            self.heatmap.stage(&self.properties, self.view.show_heatmap);
        }
    }

    fn restore_overlays(&mut self) {
        self.style_ready = true;
        self.heatmap
            .set(&mut self.renderer, &self.properties, self.view.show_heatmap);
        self.drawing.restore(&mut self.renderer);
        self.add_user_marker();
        debug!(
            "[MapEngine] Overlays restored (heatmap: {}, area: {}, user: {})",
            self.heatmap.is_attached(),
            self.drawing.has_overlay(),
            self.user_marker.is_some()
        );
    }

    /// Cancel timers, remove everything the engine put on the map and destroy the renderer.
    ///
    /// Idempotent. No callback fires afterwards.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }

        self.zoom_debounce.cancel();
        self.style_settle.cancel();
        self.pending_zoom = None;

        let markers = self.registry.clear(&mut self.renderer);
        if let Some(handle) = self.selection_marker.take() {
            self.renderer.remove_marker(handle);
        }
        self.remove_user_marker();
        self.heatmap.detach(&mut self.renderer);
        self.drawing.clear(&mut self.renderer);

        self.renderer.destroy();
        self.disposed = true;
        info!("[MapEngine] Disposed ({} listing markers removed)", markers);
    }
}

impl<R: MapRenderer> Drop for MapEngine<R> {
    fn drop(&mut self) {
        self.dispose();
    }
}
