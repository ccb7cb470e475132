//! Price-density heatmap overlay.
//!
//! Turns the listing set into a GeoJSON point source where every point carries a
//! price-derived weight, and draws it with a heatmap layer:
//! - weight interpolates 0 at price 0, 0.5 at 100k, 1 at 1M and above
//! - a fixed five-stop blue to red density ramp
//! - a radius that grows with zoom
//!
//! The layer is derived from the current listings every time it is attached, so a
//! re-enable or a style swap never reuses stale layer state.

use log::debug;
use serde_json::{json, Value};

use crate::renderer::{remove_layers_and_source, LayerKind, LayerSpec, MapRenderer};
use crate::Property;

/// Configuration for the heatmap overlay
#[derive(Debug, Clone)]
pub struct HeatmapConfig {
    pub source_id: String,
    pub layer_id: String,
    /// (price, weight) stops, linear between them, clamped at both ends
    pub weight_stops: Vec<(f64, f64)>,
    /// (density, color) stops
    pub color_ramp: Vec<(f64, String)>,
    /// (zoom, radius px) stops
    pub radius_stops: Vec<(f64, f64)>,
    /// (zoom, intensity) stops
    pub intensity_stops: Vec<(f64, f64)>,
    /// Default: 0.8
    pub opacity: f64,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            source_id: "properties-heat".to_string(),
            layer_id: "properties-heatmap".to_string(),
            weight_stops: vec![(0.0, 0.0), (100_000.0, 0.5), (1_000_000.0, 1.0)],
            color_ramp: vec![
                (0.0, "rgba(33,102,172,0)".to_string()),
                (0.25, "rgb(103,169,207)".to_string()),
                (0.5, "rgb(209,229,240)".to_string()),
                (0.75, "rgb(239,138,98)".to_string()),
                (1.0, "rgb(178,24,43)".to_string()),
            ],
            radius_stops: vec![(0.0, 2.0), (9.0, 20.0), (15.0, 40.0)],
            intensity_stops: vec![(0.0, 1.0), (15.0, 3.0)],
            opacity: 0.8,
        }
    }
}

/// Piecewise-linear interpolation over sorted `(x, y)` stops, clamped at both ends.
fn interpolate(stops: &[(f64, f64)], x: f64) -> f64 {
    let (first, last) = match (stops.first(), stops.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return 0.0,
    };
    if x <= first.0 {
        return first.1;
    }
    if x >= last.0 {
        return last.1;
    }
    for w in stops.windows(2) {
        let (x0, y0) = w[0];
        let (x1, y1) = w[1];
        if x <= x1 {
            if x1 == x0 {
                return y1;
            }
            return y0 + (y1 - y0) * (x - x0) / (x1 - x0);
        }
    }
    last.1
}

/// Heatmap weight for a price with the default stops.
///
/// ```
/// use property_map::price_weight;
///
/// assert_eq!(price_weight(0.0), 0.0);
/// assert_eq!(price_weight(100_000.0), 0.5);
/// assert_eq!(price_weight(5_000_000.0), 1.0);
/// ```
pub fn price_weight(price: f64) -> f64 {
    interpolate(&HeatmapConfig::default().weight_stops, price)
}

/// Style expression `["interpolate", ["linear"], input, x0, y0, x1, y1, ...]`.
fn interpolate_expr(input: Value, stops: impl IntoIterator<Item = (f64, Value)>) -> Value {
    let mut expr = vec![json!("interpolate"), json!(["linear"]), input];
    for (x, y) in stops {
        expr.push(json!(x));
        expr.push(y);
    }
    Value::Array(expr)
}

/// The heatmap overlay and its backing source.
#[derive(Debug, Default)]
pub struct HeatmapLayer {
    config: HeatmapConfig,
    points: Vec<Property>,
    enabled: bool,
    attached: bool,
}

impl HeatmapLayer {
    pub fn new(config: HeatmapConfig) -> Self {
        Self {
            config,
            points: Vec::new(),
            enabled: false,
            attached: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the layer is currently on the map.
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn config(&self) -> &HeatmapConfig {
        &self.config
    }

    /// Record the listings and toggle without touching the map (style not ready yet).
    pub fn stage(&mut self, points: &[Property], enabled: bool) {
        self.points = points.to_vec();
        self.enabled = enabled;
    }

    /// Update listings and toggle, then bring the map in line.
    pub fn set<R: MapRenderer + ?Sized>(
        &mut self,
        renderer: &mut R,
        points: &[Property],
        enabled: bool,
    ) {
        self.stage(points, enabled);
        self.sync(renderer);
    }

    /// Bring the map in line with the staged state.
    pub fn sync<R: MapRenderer + ?Sized>(&mut self, renderer: &mut R) {
        if !self.enabled {
            self.detach(renderer);
            return;
        }

        let on_map = renderer.has_source(&self.config.source_id)
            && renderer.has_layer(&self.config.layer_id);
        if self.attached && on_map {
            renderer.set_source_data(&self.config.source_id, self.source_data());
            debug!("[HeatmapLayer] updated {} points", self.points.len());
        } else {
            self.attach(renderer);
        }
    }

    fn attach<R: MapRenderer + ?Sized>(&mut self, renderer: &mut R) {
        // Start clean: anything left over belongs to an older derivation
        remove_layers_and_source(renderer, &[&self.config.layer_id], &self.config.source_id);

        renderer.add_source(&self.config.source_id, self.source_data());
        renderer.add_layer(&self.layer_spec());
        self.attached = true;
        debug!("[HeatmapLayer] attached with {} points", self.points.len());
    }

    /// Remove the layer and its source. Returns whether anything was on the map.
    pub fn detach<R: MapRenderer + ?Sized>(&mut self, renderer: &mut R) -> bool {
        self.attached = false;
        let removed =
            remove_layers_and_source(renderer, &[&self.config.layer_id], &self.config.source_id);
        if removed {
            debug!("[HeatmapLayer] detached");
        }
        removed
    }

    /// The renderer dropped all custom layers (style swap).
    pub fn mark_discarded(&mut self) {
        self.attached = false;
    }

    /// GeoJSON FeatureCollection of weighted listing points.
    pub fn source_data(&self) -> Value {
        let features: Vec<Value> = self
            .points
            .iter()
            .filter(|p| p.coordinates.is_valid())
            .map(|p| {
                json!({
                    "type": "Feature",
                    "geometry": {
                        "type": "Point",
                        "coordinates": p.coordinates.to_lng_lat(),
                    },
                    "properties": {
                        "id": p.id,
                        "price": p.price,
                        "weight": interpolate(&self.config.weight_stops, p.price),
                    },
                })
            })
            .collect();

        json!({ "type": "FeatureCollection", "features": features })
    }

    pub fn layer_spec(&self) -> LayerSpec {
        let cfg = &self.config;
        let paint = json!({
            "heatmap-weight": ["get", "weight"],
            "heatmap-intensity": interpolate_expr(
                json!(["zoom"]),
                cfg.intensity_stops.iter().map(|(z, v)| (*z, json!(v))),
            ),
            "heatmap-color": interpolate_expr(
                json!(["heatmap-density"]),
                cfg.color_ramp.iter().map(|(d, c)| (*d, json!(c))),
            ),
            "heatmap-radius": interpolate_expr(
                json!(["zoom"]),
                cfg.radius_stops.iter().map(|(z, r)| (*z, json!(r))),
            ),
            "heatmap-opacity": cfg.opacity,
        });

        LayerSpec {
            id: cfg.layer_id.clone(),
            source: cfg.source_id.clone(),
            kind: LayerKind::Heatmap,
            paint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GeoPoint, HeadlessRenderer, ListingType, MapRenderer};

    fn listing(id: &str, price: f64) -> Property {
        Property::new(id, GeoPoint::new(40.4168, -3.7038), price, ListingType::Sale)
    }

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_price_weight_stops() {
        assert!(approx_eq(price_weight(0.0), 0.0));
        assert!(approx_eq(price_weight(50_000.0), 0.25));
        assert!(approx_eq(price_weight(100_000.0), 0.5));
        assert!(approx_eq(price_weight(550_000.0), 0.75));
        assert!(approx_eq(price_weight(1_000_000.0), 1.0));
        assert!(approx_eq(price_weight(20_000_000.0), 1.0));
        assert!(approx_eq(price_weight(-5.0), 0.0));
    }

    #[test]
    fn test_enable_adds_source_and_layer() {
        let mut renderer = HeadlessRenderer::new();
        let mut heatmap = HeatmapLayer::new(HeatmapConfig::default());

        heatmap.set(&mut renderer, &[listing("a", 100_000.0), listing("b", 2_000_000.0)], true);

        assert!(heatmap.is_attached());
        let source = renderer.source("properties-heat").unwrap();
        let features = source["features"].as_array().unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0]["properties"]["weight"], json!(0.5));
        assert_eq!(features[1]["properties"]["weight"], json!(1.0));
        assert_eq!(features[0]["geometry"]["coordinates"], json!([-3.7038, 40.4168]));

        let layer = renderer.layer("properties-heatmap").unwrap();
        assert_eq!(layer.kind, LayerKind::Heatmap);
        let ramp = layer.paint["heatmap-color"].as_array().unwrap();
        // "interpolate", ["linear"], input, then five (stop, color) pairs
        assert_eq!(ramp.len(), 3 + 5 * 2);
        assert!(renderer.violations().is_empty());
    }

    #[test]
    fn test_disable_removes_source_and_layer() {
        let mut renderer = HeadlessRenderer::new();
        let mut heatmap = HeatmapLayer::new(HeatmapConfig::default());

        heatmap.set(&mut renderer, &[listing("a", 100_000.0)], true);
        heatmap.set(&mut renderer, &[listing("a", 100_000.0)], false);

        assert!(!renderer.has_source("properties-heat"));
        assert!(!renderer.has_layer("properties-heatmap"));
        assert!(!heatmap.is_attached());
        assert!(renderer.violations().is_empty());

        // Disabling again touches nothing
        heatmap.set(&mut renderer, &[], false);
        assert_eq!(renderer.sources_removed(), 1);
        assert_eq!(renderer.layers_removed(), 1);
    }

    #[test]
    fn test_update_while_enabled_replaces_data() {
        let mut renderer = HeadlessRenderer::new();
        let mut heatmap = HeatmapLayer::new(HeatmapConfig::default());

        heatmap.set(&mut renderer, &[listing("a", 100_000.0)], true);
        heatmap.set(&mut renderer, &[listing("a", 100_000.0), listing("b", 10.0)], true);

        let features = renderer.source("properties-heat").unwrap()["features"]
            .as_array()
            .unwrap()
            .len();
        assert_eq!(features, 2);
        assert!(renderer.violations().is_empty());
    }

    #[test]
    fn test_reenable_after_style_swap_rederives() {
        let mut renderer = HeadlessRenderer::new();
        let mut heatmap = HeatmapLayer::new(HeatmapConfig::default());

        heatmap.set(&mut renderer, &[listing("a", 100_000.0)], true);
        renderer.set_style("https://example/other.json");
        heatmap.mark_discarded();

        heatmap.stage(&[listing("a", 100_000.0), listing("b", 900_000.0)], true);
        heatmap.sync(&mut renderer);

        let features = renderer.source("properties-heat").unwrap()["features"]
            .as_array()
            .unwrap()
            .len();
        assert_eq!(features, 2);
        assert!(renderer.has_layer("properties-heatmap"));
        assert!(renderer.violations().is_empty());
    }
}
