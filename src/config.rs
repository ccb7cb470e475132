//! Map configuration, basemap styles and provider URLs.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::clustering::ClusterConfig;
use crate::error::MapError;
use crate::heatmap::HeatmapConfig;
use crate::location::LocationConfig;
use crate::GeoPoint;

/// Environment variable holding the map provider API key.
pub const API_KEY_ENV: &str = "MAPTILER_API_KEY";

/// Basemap styles offered by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasemapStyle {
    Streets,
    Basic,
    Bright,
    Outdoor,
    Satellite,
}

impl BasemapStyle {
    pub const ALL: [BasemapStyle; 5] = [
        BasemapStyle::Streets,
        BasemapStyle::Basic,
        BasemapStyle::Bright,
        BasemapStyle::Outdoor,
        BasemapStyle::Satellite,
    ];

    /// Provider style id, as used in the style URL.
    pub fn id(&self) -> &'static str {
        match self {
            BasemapStyle::Streets => "streets-v2",
            BasemapStyle::Basic => "basic-v2",
            BasemapStyle::Bright => "bright-v2",
            BasemapStyle::Outdoor => "outdoor-v2",
            BasemapStyle::Satellite => "hybrid",
        }
    }

    /// Human-readable name for a style picker.
    pub fn label(&self) -> &'static str {
        match self {
            BasemapStyle::Streets => "Streets",
            BasemapStyle::Basic => "Basic",
            BasemapStyle::Bright => "Bright",
            BasemapStyle::Outdoor => "Outdoor",
            BasemapStyle::Satellite => "Satellite",
        }
    }
}

impl fmt::Display for BasemapStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for BasemapStyle {
    type Err = String;

    /// Accepts either the provider id (`streets-v2`) or the short name (`streets`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        BasemapStyle::ALL
            .iter()
            .copied()
            .find(|style| style.id() == lower || style.label().to_ascii_lowercase() == lower)
            .ok_or_else(|| format!("Unknown basemap style: {}", s))
    }
}

/// Configuration for the map engine.
#[derive(Debug, Clone)]
pub struct MapConfig {
    /// Provider API key. Required: an empty key fails initialization.
    pub api_key: String,

    /// Base URL of the tile/style and geocoding provider.
    /// Default: "https://api.maptiler.com"
    pub provider_url: String,

    /// Initial basemap style. Default: streets
    pub style: BasemapStyle,

    /// Center used when the device location cannot be resolved.
    /// Default: Madrid (40.4168, -3.7038)
    pub default_center: GeoPoint,

    /// Initial zoom level. Default: 12
    pub default_zoom: f64,

    /// Upper zoom bound for any zoom the engine requests. Default: 18
    pub max_zoom: f64,

    /// Quiet period after the last zoom-end event before markers are rebuilt.
    /// Default: 150ms
    pub zoom_debounce: Duration,

    /// Wait after a style "loaded" signal before custom overlays are re-attached.
    /// Default: 500ms
    pub style_settle_delay: Duration,

    /// Zoom level used when centering on the user's location. Default: 14
    pub locate_zoom: f64,

    pub cluster: ClusterConfig,
    pub heatmap: HeatmapConfig,
    pub location: LocationConfig,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            provider_url: "https://api.maptiler.com".to_string(),
            style: BasemapStyle::Streets,
            default_center: GeoPoint::new(40.4168, -3.7038),
            default_zoom: 12.0,
            max_zoom: 18.0,
            zoom_debounce: Duration::from_millis(150),
            style_settle_delay: Duration::from_millis(500),
            locate_zoom: 14.0,
            cluster: ClusterConfig::default(),
            heatmap: HeatmapConfig::default(),
            location: LocationConfig::default(),
        }
    }
}

impl MapConfig {
    /// Default configuration with the API key read from `MAPTILER_API_KEY`.
    ///
    /// A missing variable is not an error here; [`MapConfig::validate`] reports it
    /// when the engine is created.
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var(API_KEY_ENV).unwrap_or_default(),
            ..Self::default()
        }
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<(), MapError> {
        if self.api_key.trim().is_empty() {
            return Err(MapError::MissingApiKey);
        }
        if !self.default_center.is_valid() {
            return Err(MapError::InvalidCoordinates(format!(
                "default center ({}, {})",
                self.default_center.lat, self.default_center.lng
            )));
        }
        Ok(())
    }

    /// Style URL for the given basemap.
    pub fn style_url(&self, style: BasemapStyle) -> String {
        style_url(&self.provider_url, style, &self.api_key)
    }
}

/// `{provider}/maps/{styleId}/style.json?key={apiKey}`
pub fn style_url(provider_url: &str, style: BasemapStyle, api_key: &str) -> String {
    format!(
        "{}/maps/{}/style.json?key={}",
        provider_url.trim_end_matches('/'),
        style.id(),
        api_key
    )
}

/// `{provider}/geocoding/{lng},{lat}.json?key={apiKey}`
pub fn reverse_geocode_url(provider_url: &str, point: &GeoPoint, api_key: &str) -> String {
    format!(
        "{}/geocoding/{},{}.json?key={}",
        provider_url.trim_end_matches('/'),
        point.lng,
        point.lat,
        api_key
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_url() {
        let url = style_url("https://api.maptiler.com/", BasemapStyle::Outdoor, "abc");
        assert_eq!(url, "https://api.maptiler.com/maps/outdoor-v2/style.json?key=abc");
    }

    #[test]
    fn test_reverse_geocode_url_is_lng_first() {
        let url = reverse_geocode_url("https://api.maptiler.com", &GeoPoint::new(40.5, -3.25), "k");
        assert_eq!(url, "https://api.maptiler.com/geocoding/-3.25,40.5.json?key=k");
    }

    #[test]
    fn test_style_from_str() {
        assert_eq!("satellite".parse::<BasemapStyle>(), Ok(BasemapStyle::Satellite));
        assert_eq!("bright-v2".parse::<BasemapStyle>(), Ok(BasemapStyle::Bright));
        assert_eq!(" Streets ".parse::<BasemapStyle>(), Ok(BasemapStyle::Streets));
        assert!("toner".parse::<BasemapStyle>().is_err());
    }

    #[test]
    fn test_validate_requires_api_key() {
        let config = MapConfig::default();
        assert_eq!(config.validate(), Err(MapError::MissingApiKey));

        let config = MapConfig { api_key: "   ".to_string(), ..MapConfig::default() };
        assert_eq!(config.validate(), Err(MapError::MissingApiKey));

        let config = MapConfig { api_key: "key".to_string(), ..MapConfig::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_default_center() {
        let config = MapConfig {
            api_key: "key".to_string(),
            default_center: GeoPoint::new(120.0, 0.0),
            ..MapConfig::default()
        };
        assert!(matches!(config.validate(), Err(MapError::InvalidCoordinates(_))));
    }
}
