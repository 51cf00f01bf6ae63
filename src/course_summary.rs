/// COURSE SUMMARY BUILDER
///
/// Runs segment -> close -> smooth -> analyze on one track and packages the
/// result for the output layer. The geometry part is pure; the only outside
/// call is the region lookup, which can fail without losing the summary.

use geo::{BoundingRect, LineString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{LapDetectionConfig, SmoothingConfig};
use crate::course_geometry::{analyze_ring, Orientation, RingAnalysis, FEET_PER_METRE, METRES_PER_MILE};
use crate::elevation_smoother::smooth_elevations;
use crate::error::CourseError;
use crate::lap_segmenter::{extract_lap, LapSelection};
use crate::loop_closer::close_loop;
use crate::region_resolver::RegionResolver;
use crate::track_loader::{Fix, Track};

pub const UNKNOWN_REGION: &str = "Unknown";

/// Where the representative lap came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LapInfo {
    pub boundary_count: usize,
    pub candidate_index: usize,
    pub start: usize,
    pub end: usize,
    /// A copy of the first fix was appended to close the ring
    pub closing_point_added: bool,
}

/// Closed, smoothed lap plus its geometry. No network involved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseShape {
    /// Ring vertices as (lat, lon)
    pub ring: Vec<(f64, f64)>,
    /// Smoothed elevation per vertex (m)
    pub elevations_m: Vec<f64>,
    pub analysis: RingAnalysis,
    pub lap: LapInfo,
}

impl CourseShape {
    /// Arithmetic mean of the ring vertices.
    pub fn centroid(&self) -> (f64, f64) {
        let n = self.ring.len().max(1) as f64;
        let lat = self.ring.iter().map(|p| p.0).sum::<f64>() / n;
        let lon = self.ring.iter().map(|p| p.1).sum::<f64>() / n;
        (lat, lon)
    }
}

/// Display statistics, keyed the way course pages read them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseStats {
    #[serde(rename = "Lap Distance (km)")]
    pub distance_km: f64,
    #[serde(rename = "Lap Distance (mi)")]
    pub distance_mi: f64,
    #[serde(rename = "Average Gradient (%)")]
    pub mean_gradient_percent: Option<f64>,
    #[serde(rename = "Max Gradient (%)")]
    pub max_gradient_percent: Option<f64>,
    #[serde(rename = "Min Gradient (%)")]
    pub min_gradient_percent: Option<f64>,
    #[serde(rename = "Elevation Gain (m)")]
    pub elevation_gain_m: f64,
    #[serde(rename = "Elevation Gain (ft)")]
    pub elevation_gain_ft: f64,
    #[serde(rename = "Climb Density (m/km)")]
    pub climb_density_m_per_km: f64,
    #[serde(rename = "Direction")]
    pub orientation: Orientation,
    #[serde(rename = "State")]
    pub region: String,
}

/// Distance/elevation pairs for the elevation chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElevationProfile {
    pub distance_miles: Vec<f64>,
    pub elevation_feet: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseSummary {
    #[serde(flatten)]
    pub shape: CourseShape,
    pub stats: CourseStats,
    pub profile: ElevationProfile,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

/// Lightweight ring for thumbnails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewRing {
    pub ring: Vec<(f64, f64)>,
    pub bounds: Bounds,
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Detailed path: typical lap, closed, smoothed and analyzed.
pub fn build_shape(
    track: &Track,
    laps: &LapDetectionConfig,
    smoothing: &SmoothingConfig,
) -> Result<CourseShape, CourseError> {
    let lap = extract_lap(&track.fixes, laps, LapSelection::Typical)?;
    debug!(
        "Picked lap {} of {} ([{}, {}), {} fixes)",
        lap.candidate_index,
        lap.boundary_count - 1,
        lap.candidate.start,
        lap.candidate.end,
        lap.fixes.len()
    );

    let mut ring = lap.fixes;
    let closing_point_added = close_loop(&mut ring, laps.closure_tolerance_m);

    let raw: Vec<f64> = ring.iter().map(|f| f.ele).collect();
    let smoothed = smooth_elevations(&raw, smoothing)?;
    let ring: Vec<Fix> = ring
        .iter()
        .zip(&smoothed)
        .map(|(f, ele)| Fix::new(f.lat, f.lon, *ele))
        .collect();

    let analysis = analyze_ring(&ring);

    Ok(CourseShape {
        ring: ring.iter().map(|f| (f.lat, f.lon)).collect(),
        elevations_m: smoothed,
        analysis,
        lap: LapInfo {
            boundary_count: lap.boundary_count,
            candidate_index: lap.candidate_index,
            start: lap.candidate.start,
            end: lap.candidate.end,
            closing_point_added,
        },
    })
}

/// Looks up the region, degrading any failure to [`UNKNOWN_REGION`].
pub fn region_label(resolver: &dyn RegionResolver, lat: f64, lon: f64) -> String {
    match resolver.resolve(lat, lon) {
        Ok(Some(region)) => region,
        Ok(None) => {
            debug!("No region found for ({:.5}, {:.5})", lat, lon);
            UNKNOWN_REGION.to_string()
        }
        Err(e) => {
            warn!("Region lookup for ({:.5}, {:.5}) failed: {}", lat, lon, e);
            UNKNOWN_REGION.to_string()
        }
    }
}

/// Attaches display stats, chart profile and region to a shape.
pub fn summarize(shape: CourseShape, region: String) -> CourseSummary {
    let a = &shape.analysis;
    let stats = CourseStats {
        distance_km: round_to(a.total_distance_m / 1000.0, 2),
        distance_mi: round_to(a.total_distance_m / METRES_PER_MILE, 2),
        mean_gradient_percent: a.mean_gradient_percent.map(|g| round_to(g, 2)),
        max_gradient_percent: a.max_gradient_percent.map(|g| round_to(g, 2)),
        min_gradient_percent: a.min_gradient_percent.map(|g| round_to(g, 2)),
        elevation_gain_m: a.elevation_gain_m.round(),
        elevation_gain_ft: (a.elevation_gain_m * FEET_PER_METRE).round(),
        climb_density_m_per_km: round_to(a.climb_density_m_per_km, 1),
        orientation: a.orientation,
        region,
    };

    let profile = ElevationProfile {
        distance_miles: a.cumulative_distance_mi.clone(),
        elevation_feet: shape.elevations_m.iter().map(|e| e * FEET_PER_METRE).collect(),
    };

    CourseSummary { shape, stats, profile }
}

/// The full detailed pipeline for one track.
pub fn build_summary(
    track: &Track,
    laps: &LapDetectionConfig,
    smoothing: &SmoothingConfig,
    resolver: &dyn RegionResolver,
) -> Result<CourseSummary, CourseError> {
    let shape = build_shape(track, laps, smoothing)?;
    let (lat, lon) = shape.centroid();
    let region = region_label(resolver, lat, lon);
    Ok(summarize(shape, region))
}

/// Quick-preview path: middle lap, closed, no smoothing or stats.
pub fn build_preview(track: &Track, laps: &LapDetectionConfig) -> Result<PreviewRing, CourseError> {
    let lap = extract_lap(&track.fixes, laps, LapSelection::Middle)?;
    let mut fixes = lap.fixes;
    close_loop(&mut fixes, laps.closure_tolerance_m);

    let ring: Vec<(f64, f64)> = fixes.iter().map(|f| (f.lat, f.lon)).collect();
    let line: LineString<f64> = fixes.iter().map(|f| (f.lon, f.lat)).collect::<Vec<_>>().into();
    let rect = line.bounding_rect().ok_or(CourseError::InsufficientLaps {
        found: lap.boundary_count,
        required: laps.min_boundaries,
    })?;
    let bounds = Bounds {
        south: rect.min().y,
        west: rect.min().x,
        north: rect.max().y,
        east: rect.max().x,
    };

    Ok(PreviewRing { ring, bounds })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeocodeError;
    use crate::region_resolver::OfflineResolver;

    struct FixedResolver(Result<Option<String>, ()>);

    impl RegionResolver for FixedResolver {
        fn resolve(&self, _lat: f64, _lon: f64) -> Result<Option<String>, GeocodeError> {
            match &self.0 {
                Ok(v) => Ok(v.clone()),
                Err(()) => Err(GeocodeError::Timeout),
            }
        }
    }

    /// `laps` loops around a 50 m square starting at its south-west corner,
    /// `per_side` fixes per side, climbing 4 m up the east side
    fn square_course(laps: usize, per_side: usize) -> Track {
        let lat0: f64 = 40.0;
        let lon0: f64 = -105.0;
        let step = 50.0 / per_side as f64;
        let dlat = step / 111_035.0;
        let dlon = step / (111_320.0 * lat0.to_radians().cos());
        let rise = 4.0 / per_side as f64;
        let n = per_side as f64;

        let mut lap = Vec::new();
        for i in 0..per_side {
            lap.push(Fix::new(lat0, lon0 + i as f64 * dlon, 1600.0));
        }
        for i in 0..per_side {
            let i = i as f64;
            lap.push(Fix::new(lat0 + i * dlat, lon0 + n * dlon, 1600.0 + i * rise));
        }
        for i in 0..per_side {
            let i = i as f64;
            lap.push(Fix::new(lat0 + n * dlat, lon0 + (n - i) * dlon, 1604.0));
        }
        for i in 0..per_side {
            let i = i as f64;
            lap.push(Fix::new(lat0 + (n - i) * dlat, lon0, 1604.0 - i * rise));
        }
        Track {
            name: None,
            fixes: (0..laps).flat_map(|_| lap.iter().copied()).collect(),
        }
    }

    fn small_course(laps: usize) -> Track {
        square_course(laps, 4)
    }

    fn fast_laps() -> LapDetectionConfig {
        LapDetectionConfig {
            proximity_m: 5.0,
            guard: 8,
            ..LapDetectionConfig::detailed()
        }
    }

    #[test]
    fn shape_is_closed_and_parallel() {
        let shape = build_shape(&small_course(4), &fast_laps(), &SmoothingConfig::default()).unwrap();
        assert_eq!(shape.lap.boundary_count, 4);
        assert_eq!(shape.ring.len(), shape.elevations_m.len());
        assert_eq!(shape.ring.len(), shape.analysis.cumulative_distance_m.len());
        assert!(shape.lap.closing_point_added);
        assert_eq!(shape.ring.first(), shape.ring.last());
        // counter-clockwise: east along the bottom, north up the right
        assert_eq!(shape.analysis.orientation, Orientation::CounterClockwise);
        assert!((shape.analysis.total_distance_m - 200.0).abs() < 2.0);
    }

    #[test]
    fn geocode_timeout_degrades_to_unknown() {
        let summary = build_summary(
            &small_course(3),
            &fast_laps(),
            &SmoothingConfig::default(),
            &FixedResolver(Err(())),
        )
        .unwrap();
        assert_eq!(summary.stats.region, UNKNOWN_REGION);
    }

    #[test]
    fn resolved_region_is_used() {
        let resolver = FixedResolver(Ok(Some("Colorado".to_string())));
        let summary =
            build_summary(&small_course(3), &fast_laps(), &SmoothingConfig::default(), &resolver).unwrap();
        assert_eq!(summary.stats.region, "Colorado");

        let none = build_summary(&small_course(3), &fast_laps(), &SmoothingConfig::default(), &OfflineResolver)
            .unwrap();
        assert_eq!(none.stats.region, UNKNOWN_REGION);
    }

    #[test]
    fn profile_is_in_miles_and_feet() {
        let summary =
            build_summary(&small_course(3), &fast_laps(), &SmoothingConfig::default(), &OfflineResolver).unwrap();
        let profile = &summary.profile;
        assert_eq!(profile.distance_miles.len(), profile.elevation_feet.len());
        let first_ft = summary.shape.elevations_m[0] * FEET_PER_METRE;
        assert!((profile.elevation_feet[0] - first_ft).abs() < 1e-9);
        let last_mi = *profile.distance_miles.last().unwrap();
        assert!((last_mi - summary.shape.analysis.total_distance_m / METRES_PER_MILE).abs() < 1e-9);
    }

    #[test]
    fn too_few_laps_for_detail() {
        let err = build_shape(&small_course(2), &fast_laps(), &SmoothingConfig::default()).unwrap_err();
        assert!(matches!(err, CourseError::InsufficientLaps { found: 2, required: 3 }));
    }

    #[test]
    fn short_lap_fails_smoothing() {
        // corners only: 4 fixes per lap, 5 once closed
        let track = square_course(4, 1);
        let laps = LapDetectionConfig {
            proximity_m: 5.0,
            guard: 2,
            ..LapDetectionConfig::detailed()
        };
        let err = build_shape(&track, &laps, &SmoothingConfig::default()).unwrap_err();
        assert!(matches!(err, CourseError::SmoothingWindow { len: 5, min: 7 }));
    }

    #[test]
    fn preview_ring_and_bounds() {
        let laps = LapDetectionConfig {
            proximity_m: 5.0,
            guard: 8,
            ..LapDetectionConfig::preview()
        };
        let preview = build_preview(&small_course(2), &laps).unwrap();
        assert_eq!(preview.ring.len(), 17);
        assert_eq!(preview.ring.first(), preview.ring.last());
        assert!(preview.bounds.south < preview.bounds.north);
        assert!(preview.bounds.west < preview.bounds.east);
        assert_eq!(preview.bounds.south, 40.0);
        assert_eq!(preview.bounds.west, -105.0);
    }

    #[test]
    fn centroid_is_vertex_mean() {
        let shape = CourseShape {
            ring: vec![(0.0, 0.0), (0.0, 2.0), (2.0, 2.0), (2.0, 0.0)],
            elevations_m: vec![0.0; 4],
            analysis: analyze_ring(&[]),
            lap: LapInfo {
                boundary_count: 3,
                candidate_index: 0,
                start: 0,
                end: 4,
                closing_point_added: false,
            },
        };
        assert_eq!(shape.centroid(), (1.0, 1.0));
    }
}
