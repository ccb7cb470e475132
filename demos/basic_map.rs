//! Drive a map engine against the headless renderer.
//!
//! Run with: cargo run --example basic_map

use std::time::{Duration, Instant};

use property_map::{
    BasemapStyle, GeoPoint, HeadlessRenderer, ListingType, MapCallbacks, MapConfig, MapEngine,
    Property,
};

fn main() {
    let config = MapConfig {
        api_key: "demo-key".to_string(),
        ..MapConfig::default()
    };

    let callbacks = MapCallbacks::default()
        .with_property_click(|id| println!("   -> property clicked: {}", id))
        .with_area_select(|vertices| {
            println!("   -> area selected with {} vertices", vertices.len())
        });

    let center = GeoPoint::new(40.4168, -3.7038);
    let mut engine = match MapEngine::new(config, HeadlessRenderer::new(), center, callbacks) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Could not create map: {}", e);
            return;
        }
    };

    // A handful of listings around Puerta del Sol, plus a couple further out
    let mut listings: Vec<Property> = (0..8)
        .map(|i| {
            Property::new(
                &format!("sol-{}", i),
                GeoPoint::new(40.4168 + i as f64 * 0.0002, -3.7038 + i as f64 * 0.0001),
                180_000.0 + i as f64 * 35_000.0,
                if i % 3 == 0 { ListingType::Rent } else { ListingType::Sale },
            )
        })
        .collect();
    listings.push(Property::new(
        "retiro",
        GeoPoint::new(40.4153, -3.6845),
        1_450_000.0,
        ListingType::Sale,
    ));
    listings.push(Property::new(
        "chamberi",
        GeoPoint::new(40.4340, -3.7040),
        2_100.0,
        ListingType::Rent,
    ));

    let start = Instant::now();
    engine.handle_style_loaded(start);
    engine.tick(start + engine.config().style_settle_delay);
    engine.set_properties(listings);

    println!("Property Map Example\n");
    println!("1. Zoom {}: {} markers", engine.view().zoom, engine.renderer().live_marker_count());

    for (step, zoom) in [10.0, 14.0, 17.0].into_iter().enumerate() {
        let now = start + Duration::from_secs(step as u64 + 1);
        engine.handle_zoom_end(zoom, now);
        engine.tick(now + engine.config().zoom_debounce);
        println!("   Zoom {}: {} markers", zoom, engine.renderer().live_marker_count());
    }

    println!("\n2. Clicking a listing marker:");
    engine.marker_click("retiro");

    println!("\n3. Heatmap on, then switch to satellite:");
    engine.set_show_heatmap(true);
    engine.set_style(BasemapStyle::Satellite);
    let now = start + Duration::from_secs(10);
    engine.handle_style_loaded(now);
    engine.tick(now + engine.config().style_settle_delay);
    println!("   Layers after settle: {:?}", engine.renderer().layer_ids());

    println!("\n4. Drawing a search area:");
    engine.start_drawing();
    for (lat, lng) in [(40.410, -3.710), (40.410, -3.695), (40.425, -3.695), (40.425, -3.710)] {
        engine.handle_click(GeoPoint::new(lat, lng));
    }
    engine.finish_drawing();
    let ids: Vec<&str> = engine.properties_in_area().iter().map(|p| p.id.as_str()).collect();
    println!("   Listings inside: {:?}", ids);

    engine.dispose();
    println!("\n5. Disposed: {} markers left", engine.renderer().live_marker_count());
}
