/// LAP SEGMENTER
///
/// Finds the fixes where a rider passes the start point again and cuts the
/// track into lap candidates. No lap count is needed up front.
///
/// A fix is a return when it lies within `proximity_m` of the first fix and
/// is more than `guard` fixes after the previous return. The guard stops a
/// rider lingering near the line from producing a burst of one-fix laps.

use serde::{Deserialize, Serialize};

use crate::config::LapDetectionConfig;
use crate::error::CourseError;
use crate::track_loader::Fix;

/// Ordered fix indices where laps start. Always begins with 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LapBoundaries(Vec<usize>);

/// Half-open fix range `[start, end)` covering one lap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LapCandidate {
    pub start: usize,
    pub end: usize,
}

impl LapCandidate {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

impl LapBoundaries {
    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consecutive boundary pairs, in track order.
    pub fn candidates(&self) -> Vec<LapCandidate> {
        self.0
            .windows(2)
            .map(|w| LapCandidate { start: w[0], end: w[1] })
            .collect()
    }

    /// Fails unless at least `required` boundaries were found.
    pub fn require(&self, required: usize) -> Result<&Self, CourseError> {
        if self.0.len() < required {
            return Err(CourseError::InsufficientLaps {
                found: self.0.len(),
                required,
            });
        }
        Ok(self)
    }
}

/// Scans `fixes` for returns to the first fix.
pub fn detect_boundaries(fixes: &[Fix], config: &LapDetectionConfig) -> LapBoundaries {
    let mut boundaries = vec![0];
    let start = match fixes.first() {
        Some(fix) => *fix,
        None => return LapBoundaries(boundaries),
    };

    for (i, fix) in fixes.iter().enumerate().skip(1) {
        if start.distance_to(fix) < config.proximity_m {
            let last = boundaries[boundaries.len() - 1];
            if i - last > config.guard {
                boundaries.push(i);
            }
        }
    }

    LapBoundaries(boundaries)
}

/// The lap whose fix count sits closest to the median lap length.
///
/// First and last laps are often truncated or carry warm-up wandering, so
/// the most typical lap stands in for the course. Ties go to the earliest
/// candidate. Returns the candidate's position in `candidates`.
pub fn select_typical_lap(candidates: &[LapCandidate]) -> Option<usize> {
    let lengths: Vec<f64> = candidates.iter().map(|c| c.len() as f64).collect();
    let median = median(&lengths)?;

    lengths
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            let da = (*a - median).abs();
            let db = (*b - median).abs();
            da.total_cmp(&db)
        })
        .map(|(idx, _)| idx)
}

/// The candidate in the middle of the boundary list, for previews.
pub fn select_middle_lap(boundaries: &LapBoundaries) -> Option<usize> {
    let mid = boundaries.len() / 2;
    if mid == 0 {
        None
    } else {
        Some(mid - 1)
    }
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Which selection rule picked the lap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LapSelection {
    Typical,
    Middle,
}

/// A chosen lap cut out of the track.
#[derive(Debug, Clone)]
pub struct RepresentativeLap {
    pub candidate: LapCandidate,
    pub candidate_index: usize,
    pub boundary_count: usize,
    pub fixes: Vec<Fix>,
}

/// Detects boundaries and materializes one lap using `selection`.
pub fn extract_lap(
    fixes: &[Fix],
    config: &LapDetectionConfig,
    selection: LapSelection,
) -> Result<RepresentativeLap, CourseError> {
    let boundaries = detect_boundaries(fixes, config);
    boundaries.require(config.min_boundaries.max(2))?;

    let candidates = boundaries.candidates();
    let picked = match selection {
        LapSelection::Typical => select_typical_lap(&candidates),
        LapSelection::Middle => select_middle_lap(&boundaries),
    };
    let candidate_index = picked.ok_or(CourseError::InsufficientLaps {
        found: boundaries.len(),
        required: 2,
    })?;
    let candidate = candidates[candidate_index];

    Ok(RepresentativeLap {
        candidate,
        candidate_index,
        boundary_count: boundaries.len(),
        fixes: fixes[candidate.start..candidate.end].to_vec(),
    })
}
