/// TRACK LOADER
///
/// Reads a GPX recording and flattens it into one ordered sequence of fixes.
/// Track-style recordings (trk/trkseg/trkpt) win over route-style ones
/// (rte/rtept) when a file carries both.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use geo::{point, GeodesicDistance, Point};
use gpx::{read, Gpx, Waypoint};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CourseError;

/// One recorded position + elevation sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub lat: f64,
    pub lon: f64,
    pub ele: f64,
}

impl Fix {
    pub fn new(lat: f64, lon: f64, ele: f64) -> Self {
        Fix { lat, lon, ele }
    }

    pub fn point(&self) -> Point<f64> {
        point!(x: self.lon, y: self.lat)
    }

    /// Ellipsoidal (WGS84) distance in metres, ignoring elevation.
    pub fn distance_to(&self, other: &Fix) -> f64 {
        if self.lat == other.lat && self.lon == other.lon {
            return 0.0;
        }
        self.point().geodesic_distance(&other.point())
    }
}

/// An ordered, non-empty sequence of fixes from one recording.
#[derive(Debug, Clone)]
pub struct Track {
    pub name: Option<String>,
    pub fixes: Vec<Fix>,
}

impl Track {
    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }
}

/// Parses a GPX file without interpreting it.
pub fn load_gpx(path: &Path) -> Result<Gpx, CourseError> {
    let file = File::open(path).map_err(|source| CourseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_gpx(BufReader::new(file), path)
}

/// Parses GPX from any reader; `origin` only labels errors.
pub fn parse_gpx<R: Read>(reader: R, origin: &Path) -> Result<Gpx, CourseError> {
    read(reader).map_err(|e| CourseError::Parse {
        path: origin.to_path_buf(),
        message: e.to_string(),
    })
}

/// Loads a GPX file straight into a [`Track`].
pub fn load_track(path: &Path) -> Result<Track, CourseError> {
    let gpx = load_gpx(path)?;
    track_from_gpx(&gpx, path)
}

/// Flattens a parsed document into a [`Track`].
pub fn track_from_gpx(gpx: &Gpx, origin: &Path) -> Result<Track, CourseError> {
    let track_points: Vec<&Waypoint> = gpx
        .tracks
        .iter()
        .flat_map(|track| track.segments.iter())
        .flat_map(|segment| segment.points.iter())
        .collect();

    let (name, waypoints) = if !track_points.is_empty() {
        let name = gpx.tracks.iter().find_map(|t| t.name.clone());
        (name, track_points)
    } else {
        let route_points: Vec<&Waypoint> = gpx
            .routes
            .iter()
            .flat_map(|route| route.points.iter())
            .collect();
        let name = gpx.routes.iter().find_map(|r| r.name.clone());
        (name, route_points)
    };

    let mut skipped = 0;
    let mut fixes = Vec::with_capacity(waypoints.len());
    for pt in waypoints {
        match pt.elevation {
            Some(ele) => {
                let p = pt.point();
                fixes.push(Fix::new(p.y(), p.x(), ele));
            }
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!("{}: skipped {} points without elevation", origin.display(), skipped);
    }

    if fixes.is_empty() {
        return Err(CourseError::EmptyTrack {
            path: PathBuf::from(origin),
        });
    }

    Ok(Track { name, fixes })
}
