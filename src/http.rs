//! HTTP client for the MapTiler reverse-geocoding API.
//!
//! - Connection pooling with a short request timeout
//! - Retry with exponential backoff on 429 and transport errors
//! - Missing API key short-circuits without a request

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use reqwest::Client;

use crate::config::reverse_geocode_url;
use crate::error::GeocodeError;
use crate::location::{parse_reverse_geocode, PlaceInfo, ReverseGeocoder};
use crate::GeoPoint;

const REQUEST_TIMEOUT_SECS: u64 = 10;
const MAX_RETRIES: u32 = 2;

/// Reverse geocoder backed by `{provider}/geocoding/{lng},{lat}.json`.
pub struct MapTilerGeocoder {
    client: Client,
    provider_url: String,
    api_key: String,
}

impl MapTilerGeocoder {
    /// Create a geocoder for the given provider and API key
    pub fn new(provider_url: &str, api_key: &str) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(30))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| GeocodeError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            provider_url: provider_url.to_string(),
            api_key: api_key.to_string(),
        })
    }

    async fn fetch(&self, point: GeoPoint) -> Result<Option<PlaceInfo>, GeocodeError> {
        if self.api_key.trim().is_empty() {
            return Err(GeocodeError::MissingApiKey);
        }

        let url = reverse_geocode_url(&self.provider_url, &point, &self.api_key);
        let mut retries = 0;
        let req_start = Instant::now();

        loop {
            let response = self.client.get(&url).send().await;

            match response {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        retries += 1;
                        if retries > MAX_RETRIES {
                            return Err(GeocodeError::Status(status.as_u16()));
                        }
                        let wait = Duration::from_millis(500 * (1 << retries));
                        warn!(
                            "[Geocoder] 429 Too Many Requests, retry {} with {:?} backoff",
                            retries, wait
                        );
                        tokio::time::sleep(wait).await;
                        continue;
                    }

                    if !status.is_success() {
                        return Err(GeocodeError::Status(status.as_u16()));
                    }

                    let bytes = resp
                        .bytes()
                        .await
                        .map_err(|e| GeocodeError::Network(format!("Body download error: {}", e)))?;

                    let place = parse_reverse_geocode(&bytes)?;
                    info!(
                        "[Geocoder] ({:.5}, {:.5}) -> {:?} in {:?}",
                        point.lat,
                        point.lng,
                        place.as_ref().map(|p| p.label.as_str()),
                        req_start.elapsed()
                    );
                    return Ok(place);
                }
                Err(e) => {
                    retries += 1;
                    if retries > MAX_RETRIES {
                        return Err(GeocodeError::Network(e.to_string()));
                    }
                    let wait = Duration::from_millis(200 * (1 << retries));
                    debug!("[Geocoder] Error: {}, retry {} after {:?}", e, retries, wait);
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}

impl ReverseGeocoder for MapTilerGeocoder {
    async fn reverse_geocode(&self, point: GeoPoint) -> Result<Option<PlaceInfo>, GeocodeError> {
        self.fetch(point).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_api_key_skips_request() {
        let geocoder = MapTilerGeocoder::new("http://127.0.0.1:9", "").unwrap();
        let result = geocoder.reverse_geocode(GeoPoint::new(40.4, -3.7)).await;
        assert_eq!(result, Err(GeocodeError::MissingApiKey));
    }
}
