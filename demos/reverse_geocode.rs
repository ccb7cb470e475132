//! Reverse-geocode a point through MapTiler.
//! Run with:
//! MAPTILER_API_KEY=... cargo run --example reverse_geocode --features http -- 40.4168 -3.7038

use property_map::location::NoPosition;
use property_map::{GeoPoint, LocationService, MapConfig, MapTilerGeocoder};

#[tokio::main]
async fn main() {
    let args: Vec<f64> = std::env::args().skip(1).filter_map(|a| a.parse().ok()).collect();
    let point = match args.as_slice() {
        [lat, lng] => GeoPoint::new(*lat, *lng),
        _ => GeoPoint::new(40.4168, -3.7038),
    };

    let config = MapConfig::from_env();
    if let Err(e) = config.validate() {
        eprintln!("{}", e);
        return;
    }

    let geocoder = match MapTilerGeocoder::new(&config.provider_url, &config.api_key) {
        Ok(geocoder) => geocoder,
        Err(e) => {
            eprintln!("{}", e);
            return;
        }
    };
    let location = LocationService::from_config(NoPosition, geocoder, &config);

    println!("Reverse geocoding ({}, {})", point.lat, point.lng);
    match location.reverse_geocode(point).await {
        Some(place) => {
            println!("   Label:   {}", place.label);
            println!("   City:    {}", place.city.as_deref().unwrap_or("-"));
            println!("   Country: {}", place.country.as_deref().unwrap_or("-"));
        }
        None => println!("   No address found"),
    }
}
