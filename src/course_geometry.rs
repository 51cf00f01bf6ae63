/// COURSE GEOMETRY & GRADIENT ANALYZER
///
/// Distance, gradient, climb and direction figures for a closed, smoothed
/// lap ring. Everything here is pure: same ring in, same numbers out.

use serde::{Deserialize, Serialize};

use crate::track_loader::Fix;

pub const METRES_PER_MILE: f64 = 1609.34;
pub const FEET_PER_METRE: f64 = 3.28084;

/// Gradients with a magnitude under this read as flat.
const FLAT_GRADIENT_PERCENT: f64 = 0.01;

/// Travel direction around the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    #[serde(rename = "Clockwise")]
    Clockwise,
    #[serde(rename = "Counter-Clockwise")]
    CounterClockwise,
}

impl Orientation {
    pub fn label(&self) -> &'static str {
        match self {
            Orientation::Clockwise => "Clockwise",
            Orientation::CounterClockwise => "Counter-Clockwise",
        }
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Colour step a segment falls into on the course map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradientBand {
    Flat,
    Descent,  // below -2%
    Level,    // -2% to 2%
    Rolling,  // 2% to 5%
    Climb,    // 5% to 10%
    Steep,    // 10% to 20%
    Wall,     // 20% and up
}

impl GradientBand {
    pub fn classify(gradient_percent: f64) -> Self {
        if gradient_percent.abs() < FLAT_GRADIENT_PERCENT {
            GradientBand::Flat
        } else if gradient_percent < -2.0 {
            GradientBand::Descent
        } else if gradient_percent < 2.0 {
            GradientBand::Level
        } else if gradient_percent < 5.0 {
            GradientBand::Rolling
        } else if gradient_percent < 10.0 {
            GradientBand::Climb
        } else if gradient_percent < 20.0 {
            GradientBand::Steep
        } else {
            GradientBand::Wall
        }
    }
}

/// One step between consecutive ring vertices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub horizontal_m: f64,
    pub gradient_percent: f64,
    pub band: GradientBand,
}

/// Figures derived from one closed ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RingAnalysis {
    pub cumulative_distance_m: Vec<f64>,
    pub cumulative_distance_mi: Vec<f64>,
    pub segments: Vec<Segment>,
    pub total_distance_m: f64,
    pub elevation_gain_m: f64,
    pub climb_density_m_per_km: f64,
    /// Over segments with non-zero horizontal distance; `None` if there are none
    pub mean_gradient_percent: Option<f64>,
    pub max_gradient_percent: Option<f64>,
    pub min_gradient_percent: Option<f64>,
    pub orientation: Orientation,
}

/// Grade in percent; zero when there is no horizontal run.
pub fn segment_gradient(rise_m: f64, run_m: f64) -> f64 {
    if run_m == 0.0 {
        0.0
    } else {
        rise_m / run_m * 100.0
    }
}

/// Running geodesic distance, starting at 0.
pub fn cumulative_distance(ring: &[Fix]) -> Vec<f64> {
    let mut distances = Vec::with_capacity(ring.len());
    let mut total = 0.0;
    if !ring.is_empty() {
        distances.push(0.0);
    }
    for w in ring.windows(2) {
        total += w[0].distance_to(&w[1]);
        distances.push(total);
    }
    distances
}

/// Sum of positive elevation steps.
pub fn elevation_gain(elevations: &[f64]) -> f64 {
    elevations
        .windows(2)
        .map(|w| if w[1] > w[0] { w[1] - w[0] } else { 0.0 })
        .sum()
}

/// Metres climbed per kilometre travelled.
pub fn climb_density(gain_m: f64, distance_m: f64) -> f64 {
    let km = distance_m / 1000.0;
    if km == 0.0 {
        0.0
    } else {
        gain_m / km
    }
}

/// Shoelace sum over (lon, lat) treated as a flat (x, y) plane.
///
/// A planar approximation: fine for a criterium-sized loop, not for rings
/// spanning the poles or the antimeridian.
pub fn signed_area(ring: &[(f64, f64)]) -> f64 {
    let n = ring.len();
    (0..n)
        .map(|i| {
            let (lat1, lon1) = ring[i];
            let (lat2, lon2) = ring[(i + 1) % n];
            (lon2 - lon1) * (lat2 + lat1)
        })
        .sum()
}

/// Positive shoelace sum reads as clockwise.
pub fn orientation(ring: &[(f64, f64)]) -> Orientation {
    if signed_area(ring) > 0.0 {
        Orientation::Clockwise
    } else {
        Orientation::CounterClockwise
    }
}

/// Analyzes a closed ring whose `ele` values are already smoothed.
pub fn analyze_ring(ring: &[Fix]) -> RingAnalysis {
    let cumulative_distance_m = cumulative_distance(ring);
    let cumulative_distance_mi = cumulative_distance_m
        .iter()
        .map(|d| d / METRES_PER_MILE)
        .collect();

    let segments: Vec<Segment> = ring
        .windows(2)
        .map(|w| {
            let horizontal_m = w[0].distance_to(&w[1]);
            let gradient_percent = segment_gradient(w[1].ele - w[0].ele, horizontal_m);
            Segment {
                horizontal_m,
                gradient_percent,
                band: GradientBand::classify(gradient_percent),
            }
        })
        .collect();

    let total_distance_m = cumulative_distance_m.last().copied().unwrap_or(0.0);
    let elevations: Vec<f64> = ring.iter().map(|f| f.ele).collect();
    let gain = elevation_gain(&elevations);

    let moving: Vec<f64> = segments
        .iter()
        .filter(|s| s.horizontal_m > 0.0)
        .map(|s| s.gradient_percent)
        .collect();
    let mean = if moving.is_empty() {
        None
    } else {
        Some(moving.iter().sum::<f64>() / moving.len() as f64)
    };
    let max = moving.iter().copied().reduce(f64::max);
    let min = moving.iter().copied().reduce(f64::min);

    let latlon: Vec<(f64, f64)> = ring.iter().map(|f| (f.lat, f.lon)).collect();

    RingAnalysis {
        cumulative_distance_m,
        cumulative_distance_mi,
        segments,
        total_distance_m,
        elevation_gain_m: gain,
        climb_density_m_per_km: climb_density(gain, total_distance_m),
        mean_gradient_percent: mean,
        max_gradient_percent: max,
        min_gradient_percent: min,
        orientation: orientation(&latlon),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradient_sign_convention() {
        assert_eq!(segment_gradient(5.0, 100.0), 5.0);
        assert_eq!(segment_gradient(-5.0, 100.0), -5.0);
        assert_eq!(segment_gradient(3.0, 0.0), 0.0);
    }

    #[test]
    fn unit_square_orientation() {
        let ring = [(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0), (0.0, 0.0)];
        assert_eq!(signed_area(&ring), -2.0);
        assert_eq!(orientation(&ring), Orientation::CounterClockwise);

        let reversed: Vec<(f64, f64)> = ring.iter().rev().copied().collect();
        assert_eq!(orientation(&reversed), Orientation::Clockwise);
        // same answer on every call
        assert_eq!(orientation(&ring), orientation(&ring));
    }

    #[test]
    fn gain_counts_only_climbs() {
        assert_eq!(elevation_gain(&[100.0, 103.0, 101.0, 104.0, 90.0]), 6.0);
        assert_eq!(elevation_gain(&[5.0]), 0.0);
    }

    #[test]
    fn climb_density_per_km() {
        assert_eq!(climb_density(12.0, 2000.0), 6.0);
        assert_eq!(climb_density(12.0, 0.0), 0.0);
    }

    #[test]
    fn cumulative_distance_is_monotonic() {
        let ring = vec![
            Fix::new(42.0, -71.0, 0.0),
            Fix::new(42.001, -71.0, 0.0),
            Fix::new(42.001, -71.0, 0.0),
            Fix::new(42.001, -71.001, 0.0),
        ];
        let d = cumulative_distance(&ring);
        assert_eq!(d.len(), 4);
        assert_eq!(d[0], 0.0);
        assert!(d.windows(2).all(|w| w[1] >= w[0]));
        assert_eq!(d[1], d[2]);
    }

    #[test]
    fn degenerate_segment_is_flat_and_excluded() {
        let a = Fix::new(42.0, -71.0, 100.0);
        let dup = Fix::new(42.0, -71.0, 110.0);
        let b = Fix::new(42.0009, -71.0, 105.0);
        let analysis = analyze_ring(&[a, dup, b]);

        assert_eq!(analysis.segments[0].horizontal_m, 0.0);
        assert_eq!(analysis.segments[0].gradient_percent, 0.0);
        assert_eq!(analysis.segments[0].band, GradientBand::Flat);

        let only = analysis.segments[1].gradient_percent;
        assert!(only < 0.0);
        assert_eq!(analysis.mean_gradient_percent, Some(only));
        assert_eq!(analysis.max_gradient_percent, Some(only));
        assert_eq!(analysis.min_gradient_percent, Some(only));
        // the zero-distance jump still counts as climbing
        assert_eq!(analysis.elevation_gain_m, 10.0);
    }

    #[test]
    fn stationary_ring_has_no_gradient_stats() {
        let p = Fix::new(42.0, -71.0, 100.0);
        let analysis = analyze_ring(&[p, p, p]);
        assert_eq!(analysis.total_distance_m, 0.0);
        assert_eq!(analysis.mean_gradient_percent, None);
        assert_eq!(analysis.climb_density_m_per_km, 0.0);
    }

    #[test]
    fn bands_follow_colour_steps() {
        assert_eq!(GradientBand::classify(0.005), GradientBand::Flat);
        assert_eq!(GradientBand::classify(-12.0), GradientBand::Descent);
        assert_eq!(GradientBand::classify(-2.0), GradientBand::Level);
        assert_eq!(GradientBand::classify(1.0), GradientBand::Level);
        assert_eq!(GradientBand::classify(2.0), GradientBand::Rolling);
        assert_eq!(GradientBand::classify(7.5), GradientBand::Climb);
        assert_eq!(GradientBand::classify(15.0), GradientBand::Steep);
        assert_eq!(GradientBand::classify(25.0), GradientBand::Wall);
    }

    #[test]
    fn orientation_serializes_as_label() {
        let json = serde_json::to_string(&Orientation::CounterClockwise).unwrap();
        assert_eq!(json, "\"Counter-Clockwise\"");
        assert_eq!(Orientation::Clockwise.to_string(), "Clockwise");
    }
}
