//! # Property Map
//!
//! Core of an interactive real-estate map: listing markers, zoom-dependent clustering,
//! a price-weighted heatmap, free-hand search areas and user location.
//!
//! This library provides:
//! - Greedy distance-based clustering of listings for the current zoom
//! - A marker registry that owns every on-map marker/popup handle
//! - A price-density heatmap overlay
//! - A polygon drawing tool for area search
//! - Best-effort device location with reverse geocoding
//! - A [`MapEngine`] that ties all of the above to a live map renderer
//!
//! The underlying map library is reached only through the [`MapRenderer`] trait, so the
//! whole core runs headless in tests via [`HeadlessRenderer`].
//!
//! ## Features
//!
//! - **`http`** - Enable the MapTiler reverse-geocoding client
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use property_map::{
//!     GeoPoint, HeadlessRenderer, ListingType, MapCallbacks, MapConfig, MapEngine, Property,
//! };
//!
//! let config = MapConfig {
//!     api_key: "demo-key".to_string(),
//!     ..MapConfig::default()
//! };
//!
//! let mut engine = MapEngine::new(
//!     config,
//!     HeadlessRenderer::new(),
//!     GeoPoint::new(40.4168, -3.7038),
//!     MapCallbacks::default(),
//! )
//! .expect("api key is set");
//!
//! engine.set_properties(vec![Property::new(
//!     "flat-1",
//!     GeoPoint::new(40.4170, -3.7040),
//!     250_000.0,
//!     ListingType::Sale,
//! )]);
//!
//! assert_eq!(engine.renderer().live_marker_count(), 1);
//! ```

use serde::{Deserialize, Serialize};

pub mod config;
pub mod error;
pub mod geo_utils;

// Zoom-dependent grouping of listings
pub mod clustering;
pub use clustering::{cluster_properties, Cluster, ClusterConfig};

// Marker/popup ownership
pub mod markers;
pub use markers::{MarkerAction, MarkerRegistry, RenderSpec};

// Price-density overlay
pub mod heatmap;
pub use heatmap::{price_weight, HeatmapConfig, HeatmapLayer};

// Search-area polygon
pub mod drawing;
pub use drawing::{DrawState, DrawingTool};

// Device location and reverse geocoding
pub mod location;
pub use location::{
    LocationConfig, LocationService, PlaceInfo, PositionProvider, ReverseGeocoder,
};

// HTTP module for reverse geocoding
#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::MapTilerGeocoder;

pub mod renderer;
pub use renderer::MapRenderer;

pub mod headless;
pub use headless::HeadlessRenderer;

pub mod spatial;
pub use spatial::PropertyIndex;

pub mod timer;

pub mod engine;
pub use engine::{ClickOutcome, LocationLookup, MapCallbacks, MapEngine, MapStatus, ViewState};

pub use config::{BasemapStyle, MapConfig};
pub use error::{GeocodeError, LocationError, MapError};

// ============================================================================
// Core Types
// ============================================================================

/// A WGS84 coordinate.
///
/// # Example
/// ```
/// use property_map::GeoPoint;
/// let point = GeoPoint::new(40.4168, -3.7038); // Madrid
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    /// Create a new point.
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && self.lat >= -90.0
            && self.lat <= 90.0
            && self.lng >= -180.0
            && self.lng <= 180.0
    }

    /// `[lng, lat]`, the GeoJSON position order.
    pub fn to_lng_lat(&self) -> [f64; 2] {
        [self.lng, self.lat]
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from points.
    pub fn from_points(points: &[GeoPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        Some(geo_utils::compute_bounds(points))
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }

    /// Check whether a point lies inside (edges inclusive).
    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.lat >= self.min_lat
            && point.lat <= self.max_lat
            && point.lng >= self.min_lng
            && point.lng <= self.max_lng
    }
}

/// Whether a listing is for sale or for rent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingType {
    Sale,
    Rent,
}

/// A real-estate listing as supplied by the host page.
///
/// Read-only to the core. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: String,
    pub coordinates: GeoPoint,
    pub price: f64,
    /// Free-form kind ("apartment", "house", ...)
    #[serde(rename = "type", default)]
    pub property_type: Option<String>,
    pub listing_type: ListingType,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub beds: Option<u32>,
    #[serde(default)]
    pub baths: Option<u32>,
    /// Pre-formatted floor area ("85 m²")
    #[serde(default)]
    pub area_label: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

impl Property {
    /// Create a listing with only the fields the map needs.
    pub fn new(id: &str, coordinates: GeoPoint, price: f64, listing_type: ListingType) -> Self {
        Self {
            id: id.to_string(),
            coordinates,
            price,
            property_type: None,
            listing_type,
            address: None,
            beds: None,
            baths: None,
            area_label: None,
            images: Vec::new(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
