//! Error taxonomy.
//!
//! Only [`MapError`] is ever shown to the user. Location and geocoding errors are
//! absorbed by the engine and degrade to a default center or a missing address.

/// Errors surfaced by the map engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MapError {
    /// No basemap API key configured. Fatal to initialization.
    #[error("Map API key is missing (set MAPTILER_API_KEY)")]
    MissingApiKey,

    /// Tile/style load failure or runtime error from the map library.
    #[error("Renderer error: {0}")]
    Renderer(String),

    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),
}

/// Device location failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LocationError {
    #[error("Geolocation is not supported on this device")]
    Unsupported,

    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Position unavailable: {0}")]
    Unavailable(String),

    #[error("Location request timed out")]
    Timeout,
}

/// Reverse-geocoding failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeocodeError {
    #[error("Geocoding API key is missing")]
    MissingApiKey,

    #[error("Request error: {0}")]
    Network(String),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("JSON parse error: {0}")]
    Parse(String),
}
