//! Device location and reverse geocoding.
//!
//! [`LocationService`] wraps two collaborators:
//! - a [`PositionProvider`] (device geolocation), asked with a 10 s timeout and
//!   answered from a 5 minute position cache when possible
//! - a [`ReverseGeocoder`], whose failures are absorbed: an address is enrichment,
//!   never a requirement, so every error resolves to `None`
//!
//! Location failures are returned to the caller, which picks the final fallback
//! (the engine uses its configured default center).

use std::time::Duration;

use log::{debug, info, warn};
use serde::Deserialize;
use tokio::time::Instant;

use crate::config::MapConfig;
use crate::error::{GeocodeError, LocationError};
use crate::GeoPoint;

/// Configuration for location requests
#[derive(Debug, Clone)]
pub struct LocationConfig {
    /// Give up on the device after this long. Default: 10s
    pub timeout: Duration,
    /// Reuse a position younger than this. Default: 5 minutes
    pub maximum_age: Duration,
    /// Ask the device for its most precise fix. Default: true
    pub enable_high_accuracy: bool,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            maximum_age: Duration::from_secs(5 * 60),
            enable_high_accuracy: true,
        }
    }
}

/// A resolved address for a coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceInfo {
    /// Full human-readable place name
    pub label: String,
    pub city: Option<String>,
    pub country: Option<String>,
}

/// Source of the device's current position.
#[allow(async_fn_in_trait)]
pub trait PositionProvider {
    async fn current_position(&self, config: &LocationConfig) -> Result<GeoPoint, LocationError>;
}

/// Coordinate to place-name lookup.
#[allow(async_fn_in_trait)]
pub trait ReverseGeocoder {
    /// `Ok(None)` when the service has no place for the coordinate.
    async fn reverse_geocode(&self, point: GeoPoint) -> Result<Option<PlaceInfo>, GeocodeError>;
}

/// Provider for devices without a geolocation API.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPosition;

impl PositionProvider for NoPosition {
    async fn current_position(&self, _config: &LocationConfig) -> Result<GeoPoint, LocationError> {
        Err(LocationError::Unsupported)
    }
}

/// Provider that always reports the same position (configured or IP-derived location).
#[derive(Debug, Clone, Copy)]
pub struct FixedPosition(pub GeoPoint);

impl PositionProvider for FixedPosition {
    async fn current_position(&self, _config: &LocationConfig) -> Result<GeoPoint, LocationError> {
        Ok(self.0)
    }
}

/// Geocoder used when no geocoding service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGeocoder;

impl ReverseGeocoder for NoGeocoder {
    async fn reverse_geocode(&self, _point: GeoPoint) -> Result<Option<PlaceInfo>, GeocodeError> {
        Err(GeocodeError::MissingApiKey)
    }
}

/// Best-effort user location.
pub struct LocationService<P, G> {
    provider: P,
    geocoder: G,
    config: LocationConfig,
    cached: Option<(GeoPoint, Instant)>,
}

impl<P: PositionProvider, G: ReverseGeocoder> LocationService<P, G> {
    pub fn new(provider: P, geocoder: G, config: LocationConfig) -> Self {
        Self {
            provider,
            geocoder,
            config,
            cached: None,
        }
    }

    /// Service using the location settings of a map configuration.
    pub fn from_config(provider: P, geocoder: G, config: &MapConfig) -> Self {
        Self::new(provider, geocoder, config.location.clone())
    }

    pub fn config(&self) -> &LocationConfig {
        &self.config
    }

    /// Last position obtained from the device, however old.
    pub fn last_known(&self) -> Option<GeoPoint> {
        self.cached.map(|(point, _)| point)
    }

    /// Forget the cached position so the next request asks the device.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    /// Resolve the current position once.
    ///
    /// A cached fix younger than `maximum_age` is returned without asking the device.
    pub async fn resolve_once(&mut self) -> Result<GeoPoint, LocationError> {
        if let Some((point, at)) = self.cached {
            if at.elapsed() <= self.config.maximum_age {
                debug!(
                    "[LocationService] Using cached position ({:.1}s old)",
                    at.elapsed().as_secs_f64()
                );
                return Ok(point);
            }
        }

        let result = match tokio::time::timeout(
            self.config.timeout,
            self.provider.current_position(&self.config),
        )
        .await
        {
            Err(_) => Err(LocationError::Timeout),
            Ok(Err(e)) => Err(e),
            Ok(Ok(point)) if !point.is_valid() => Err(LocationError::Unavailable(format!(
                "device reported invalid coordinates ({}, {})",
                point.lat, point.lng
            ))),
            Ok(Ok(point)) => Ok(point),
        };

        match &result {
            Ok(point) => {
                info!("[LocationService] Resolved position ({:.5}, {:.5})", point.lat, point.lng);
                self.cached = Some((*point, Instant::now()));
            }
            Err(e) => warn!("[LocationService] Location unavailable: {}", e),
        }

        result
    }

    /// Resolve the current position, or `fallback` on any failure.
    pub async fn resolve_or(&mut self, fallback: GeoPoint) -> GeoPoint {
        self.resolve_once().await.unwrap_or(fallback)
    }

    /// Look up a place name. Every failure resolves to `None`.
    pub async fn reverse_geocode(&self, point: GeoPoint) -> Option<PlaceInfo> {
        match self.geocoder.reverse_geocode(point).await {
            Ok(Some(place)) => Some(place),
            Ok(None) => {
                debug!("[LocationService] No place found at ({:.5}, {:.5})", point.lat, point.lng);
                None
            }
            Err(e) => {
                warn!("[LocationService] Reverse geocoding failed: {}", e);
                None
            }
        }
    }
}

// ============================================================================
// Geocoding response parsing
// ============================================================================

/// Reverse-geocoding response (GeoJSON FeatureCollection).
#[derive(Debug, Deserialize)]
pub struct GeocodingResponse {
    #[serde(default)]
    pub features: Vec<GeocodingFeature>,
}

#[derive(Debug, Deserialize)]
pub struct GeocodingFeature {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub place_name: Option<String>,
    #[serde(default)]
    pub context: Vec<GeocodingContext>,
}

/// Enclosing administrative area of a feature.
#[derive(Debug, Deserialize)]
pub struct GeocodingContext {
    pub id: String,
    pub text: String,
}

const CITY_KINDS: [&str; 4] = ["municipality", "place", "city", "locality"];

/// `municipality.1234` -> `municipality`
fn kind_of(id: &str) -> &str {
    id.split('.').next().unwrap_or(id)
}

/// Extract label, city and country from the most relevant feature.
pub fn place_from_response(response: &GeocodingResponse) -> Option<PlaceInfo> {
    let feature = response.features.first()?;

    let label = feature
        .place_name
        .clone()
        .or_else(|| feature.text.clone())
        .filter(|s| !s.trim().is_empty())?;

    // The feature itself may be the city
    let own = std::iter::once((feature.id.as_str(), feature.text.as_deref()));
    let contexts = feature.context.iter().map(|c| (c.id.as_str(), Some(c.text.as_str())));
    let areas: Vec<(&str, Option<&str>)> = own.chain(contexts).collect();

    let find = |kinds: &[&str]| -> Option<String> {
        areas
            .iter()
            .find(|(id, text)| kinds.contains(&kind_of(id)) && text.is_some())
            .and_then(|(_, text)| text.map(str::to_string))
    };

    Some(PlaceInfo {
        label,
        city: find(&CITY_KINDS),
        country: find(&["country"]),
    })
}

/// Parse a raw reverse-geocoding response body.
pub fn parse_reverse_geocode(body: &[u8]) -> Result<Option<PlaceInfo>, GeocodeError> {
    let response: GeocodingResponse =
        serde_json::from_slice(body).map_err(|e| GeocodeError::Parse(e.to_string()))?;
    Ok(place_from_response(&response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct CountingProvider {
        point: GeoPoint,
        calls: Cell<u32>,
    }

    impl PositionProvider for CountingProvider {
        async fn current_position(
            &self,
            _config: &LocationConfig,
        ) -> Result<GeoPoint, LocationError> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.point)
        }
    }

    struct HangingProvider;

    impl PositionProvider for HangingProvider {
        async fn current_position(
            &self,
            _config: &LocationConfig,
        ) -> Result<GeoPoint, LocationError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(GeoPoint::new(0.0, 0.0))
        }
    }

    struct DeniedProvider;

    impl PositionProvider for DeniedProvider {
        async fn current_position(
            &self,
            _config: &LocationConfig,
        ) -> Result<GeoPoint, LocationError> {
            Err(LocationError::PermissionDenied)
        }
    }

    struct FailingGeocoder;

    impl ReverseGeocoder for FailingGeocoder {
        async fn reverse_geocode(
            &self,
            _point: GeoPoint,
        ) -> Result<Option<PlaceInfo>, GeocodeError> {
            Err(GeocodeError::Network("connection refused".to_string()))
        }
    }

    const SAMPLE_RESPONSE: &str = r#"{
        "type": "FeatureCollection",
        "features": [{
            "id": "address.123",
            "text": "Calle de Alcalá",
            "place_name": "Calle de Alcalá 42, Madrid, Spain",
            "context": [
                { "id": "postal_code.1", "text": "28014" },
                { "id": "municipality.77", "text": "Madrid" },
                { "id": "region.5", "text": "Community of Madrid" },
                { "id": "country.9", "text": "Spain" }
            ]
        }]
    }"#;

    #[tokio::test]
    async fn test_resolve_once_caches_position() {
        let provider = CountingProvider { point: GeoPoint::new(40.4, -3.7), calls: Cell::new(0) };
        let mut service = LocationService::new(provider, NoGeocoder, LocationConfig::default());

        assert_eq!(service.resolve_once().await, Ok(GeoPoint::new(40.4, -3.7)));
        assert_eq!(service.resolve_once().await, Ok(GeoPoint::new(40.4, -3.7)));
        assert_eq!(service.provider.calls.get(), 1);

        service.invalidate();
        service.resolve_once().await.unwrap();
        assert_eq!(service.provider.calls.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_expires_after_maximum_age() {
        let provider = CountingProvider { point: GeoPoint::new(40.4, -3.7), calls: Cell::new(0) };
        let mut service = LocationService::new(provider, NoGeocoder, LocationConfig::default());

        service.resolve_once().await.unwrap();
        tokio::time::advance(Duration::from_secs(6 * 60)).await;
        service.resolve_once().await.unwrap();
        assert_eq!(service.provider.calls.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_once_times_out() {
        let mut service =
            LocationService::new(HangingProvider, NoGeocoder, LocationConfig::default());
        assert_eq!(service.resolve_once().await, Err(LocationError::Timeout));
        assert!(service.last_known().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_from_config_uses_map_location_settings() {
        let mut config = MapConfig::default();
        config.location.timeout = Duration::from_secs(2);
        let mut service = LocationService::from_config(HangingProvider, NoGeocoder, &config);
        assert_eq!(service.config().timeout, Duration::from_secs(2));
        assert_eq!(service.config().maximum_age, Duration::from_secs(5 * 60));

        let started = Instant::now();
        assert_eq!(service.resolve_once().await, Err(LocationError::Timeout));
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_unsupported_and_denied_propagate() {
        let mut service = LocationService::new(NoPosition, NoGeocoder, LocationConfig::default());
        assert_eq!(service.resolve_once().await, Err(LocationError::Unsupported));

        let mut service =
            LocationService::new(DeniedProvider, NoGeocoder, LocationConfig::default());
        assert_eq!(service.resolve_once().await, Err(LocationError::PermissionDenied));

        let fallback = GeoPoint::new(1.0, 2.0);
        assert_eq!(service.resolve_or(fallback).await, fallback);
    }

    #[tokio::test]
    async fn test_invalid_device_coordinates_rejected() {
        let provider = CountingProvider {
            point: GeoPoint::new(f64::NAN, 0.0),
            calls: Cell::new(0),
        };
        let mut service = LocationService::new(provider, NoGeocoder, LocationConfig::default());
        assert!(matches!(service.resolve_once().await, Err(LocationError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_reverse_geocode_failures_resolve_to_none() {
        let service = LocationService::new(NoPosition, FailingGeocoder, LocationConfig::default());
        assert_eq!(service.reverse_geocode(GeoPoint::new(40.4, -3.7)).await, None);

        let service = LocationService::new(NoPosition, NoGeocoder, LocationConfig::default());
        assert_eq!(service.reverse_geocode(GeoPoint::new(40.4, -3.7)).await, None);
    }

    #[test]
    fn test_parse_reverse_geocode() {
        let place = parse_reverse_geocode(SAMPLE_RESPONSE.as_bytes()).unwrap().unwrap();
        assert_eq!(place.label, "Calle de Alcalá 42, Madrid, Spain");
        assert_eq!(place.city.as_deref(), Some("Madrid"));
        assert_eq!(place.country.as_deref(), Some("Spain"));
    }

    #[test]
    fn test_parse_feature_that_is_the_city() {
        let body = r#"{"features":[{
            "id":"municipality.1","text":"Toledo","place_name":"Toledo, Spain",
            "context":[{"id":"country.9","text":"Spain"}]}]}"#;
        let place = parse_reverse_geocode(body.as_bytes()).unwrap().unwrap();
        assert_eq!(place.city.as_deref(), Some("Toledo"));
    }

    #[test]
    fn test_parse_empty_and_invalid() {
        assert_eq!(parse_reverse_geocode(br#"{"features":[]}"#).unwrap(), None);
        assert!(matches!(parse_reverse_geocode(b"not json"), Err(GeocodeError::Parse(_))));
    }
}
