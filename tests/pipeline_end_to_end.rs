mod common;

use std::net::TcpListener;
use std::time::Duration;

use crit_courses::course_summary::{region_label, UNKNOWN_REGION};
use crit_courses::{
    build_preview, build_summary, load_track, GeocodeError, GeocoderConfig, LapDetectionConfig,
    NominatimResolver, OfflineResolver, RegionResolver, SmoothingConfig,
};

use common::{laps, square_lap, synthetic_laps, write_track};

#[test]
fn three_lap_square_course() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("square_crit_2024.gpx");
    write_track(&path, "Evening Race", &laps(&square_lap(40, 200.0, 41.9, -87.9), 3));

    let track = load_track(&path).unwrap();
    assert_eq!(track.len(), 120);

    let summary = build_summary(
        &track,
        &synthetic_laps(LapDetectionConfig::detailed()),
        &SmoothingConfig::default(),
        &OfflineResolver,
    )
    .unwrap();

    let shape = &summary.shape;
    assert_eq!(shape.lap.boundary_count, 3);
    assert_eq!(shape.lap.end - shape.lap.start, 40);
    assert!(shape.lap.closing_point_added);
    assert_eq!(shape.ring.len(), 41);
    assert_eq!(shape.ring.first(), shape.ring.last());
    assert_eq!(shape.elevations_m.len(), shape.ring.len());

    let total = shape.analysis.total_distance_m;
    assert!((195.0..=205.0).contains(&total), "lap distance {}", total);
    assert!(shape.analysis.climb_density_m_per_km > 0.0);
    assert!(summary.stats.elevation_gain_m >= 0.0);
    assert_eq!(summary.stats.region, UNKNOWN_REGION);
    assert_eq!(summary.profile.elevation_feet.len(), 41);
}

#[test]
fn preview_uses_the_middle_lap() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("square_crit_2024.gpx");
    write_track(&path, "Evening Race", &laps(&square_lap(40, 200.0, 41.9, -87.9), 3));

    let track = load_track(&path).unwrap();
    let preview = build_preview(&track, &synthetic_laps(LapDetectionConfig::preview())).unwrap();
    assert_eq!(preview.ring.len(), 41);
    assert_eq!(preview.ring.first(), preview.ring.last());
    assert!(preview.bounds.north > preview.bounds.south);
}

#[test]
fn single_lap_is_not_a_course() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("solo_crit_2024.gpx");
    write_track(&path, "Warmup", &square_lap(40, 200.0, 41.9, -87.9));

    let track = load_track(&path).unwrap();
    let result = build_summary(
        &track,
        &synthetic_laps(LapDetectionConfig::detailed()),
        &SmoothingConfig::default(),
        &OfflineResolver,
    );
    assert!(result.is_err());
}

/// A listener that never accepts: connections open but nothing answers.
fn silent_endpoint() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    (listener, url)
}

#[test]
fn geocoder_timeout_is_reported_as_timeout() {
    let (_listener, url) = silent_endpoint();
    let config = GeocoderConfig {
        base_url: url,
        min_interval_ms: 0,
        ..GeocoderConfig::default()
    };
    let resolver = NominatimResolver::with_timeout(&config, Duration::from_millis(300)).unwrap();

    let err = resolver.resolve(41.9, -87.9).unwrap_err();
    assert!(matches!(err, GeocodeError::Timeout), "got {:?}", err);
    assert_eq!(region_label(&resolver, 41.9, -87.9), UNKNOWN_REGION);
}

#[test]
fn summary_survives_geocoder_timeout() {
    let (_listener, url) = silent_endpoint();
    let config = GeocoderConfig {
        base_url: url,
        min_interval_ms: 0,
        ..GeocoderConfig::default()
    };
    let resolver = NominatimResolver::with_timeout(&config, Duration::from_millis(300)).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("square_crit_2024.gpx");
    write_track(&path, "Evening Race", &laps(&square_lap(40, 200.0, 41.9, -87.9), 3));
    let track = load_track(&path).unwrap();

    let summary = build_summary(
        &track,
        &synthetic_laps(LapDetectionConfig::detailed()),
        &SmoothingConfig::default(),
        &resolver,
    )
    .unwrap();
    assert_eq!(summary.stats.region, UNKNOWN_REGION);
    assert!(summary.stats.distance_km > 0.19);
}
