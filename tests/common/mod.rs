#![allow(dead_code)]

use std::f64::consts::PI;
use std::fs::File;
use std::path::Path;

use crit_courses::{CourseConfig, Fix, LapDetectionConfig};
use geo::point;
use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint};

/// One lap around a square of `perimeter_m`, starting at its south-west
/// corner and heading east. Elevation swings 2 m peak to peak, ten fixes
/// per swing.
pub fn square_lap(points: usize, perimeter_m: f64, lat0: f64, lon0: f64) -> Vec<Fix> {
    let per_side = points / 4;
    let side = perimeter_m / 4.0;
    let step = side / per_side as f64;
    let dlat = step / 111_035.0;
    let dlon = step / (111_320.0 * lat0.to_radians().cos());
    let n = per_side as f64;

    let mut xy = Vec::with_capacity(points);
    for i in 0..per_side {
        xy.push((0.0, i as f64));
    }
    for i in 0..per_side {
        xy.push((i as f64, n));
    }
    for i in 0..per_side {
        xy.push((n, n - i as f64));
    }
    for i in 0..per_side {
        xy.push((n - i as f64, 0.0));
    }

    xy.into_iter()
        .enumerate()
        .map(|(i, (y, x))| {
            let ele = 200.0 + (2.0 * PI * i as f64 / 10.0).sin();
            Fix::new(lat0 + y * dlat, lon0 + x * dlon, ele)
        })
        .collect()
}

pub fn laps(lap: &[Fix], count: usize) -> Vec<Fix> {
    (0..count).flat_map(|_| lap.iter().copied()).collect()
}

/// Writes `fixes` as a single-segment GPX 1.1 track.
pub fn write_track(path: &Path, name: &str, fixes: &[Fix]) {
    let mut segment = TrackSegment::new();
    for fix in fixes {
        let mut wp = Waypoint::new(point!(x: fix.lon, y: fix.lat));
        wp.elevation = Some(fix.ele);
        segment.points.push(wp);
    }

    let mut track = Track::new();
    track.name = Some(name.to_string());
    track.segments.push(segment);

    let gpx = Gpx {
        version: GpxVersion::Gpx11,
        creator: Some("Garmin Connect".to_string()),
        tracks: vec![track],
        ..Gpx::default()
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    gpx::write(&gpx, File::create(path).unwrap()).unwrap();
}

/// Detection tuned for the synthetic laps: only exact revisits of the
/// start count, and the 5 m gap back to the start is closed.
pub fn synthetic_laps(base: LapDetectionConfig) -> LapDetectionConfig {
    LapDetectionConfig {
        proximity_m: 4.0,
        guard: 20,
        closure_tolerance_m: 3.0,
        ..base
    }
}

pub fn offline_config() -> CourseConfig {
    let mut config = CourseConfig::default();
    config.detailed = synthetic_laps(LapDetectionConfig::detailed());
    config.preview = synthetic_laps(LapDetectionConfig::preview());
    config.geocoder.enabled = false;
    config
}
