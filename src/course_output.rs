/// COURSE OUTPUT
///
/// Writes the per-course files (anonymized GPX, stats, elevation chart data,
/// full summary, preview) and the batch-level index.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use gpx::{write, Gpx, GpxVersion};
use serde::Serialize;
use tracing::debug;

use crate::config::OutputConfig;
use crate::course_catalog::{BatchReport, CourseId};
use crate::course_summary::{CourseStats, CourseSummary, PreviewRing};
use crate::error::BatchError;

/// Pipeline result for one recording, ready to write.
#[derive(Debug, Clone)]
pub struct ProcessedCourse {
    /// Source document, anonymized on write
    pub gpx: Gpx,
    pub summary: CourseSummary,
    pub preview: Option<PreviewRing>,
}

/// Paths of one course's output files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseFiles {
    pub dir: PathBuf,
    pub gpx: PathBuf,
    pub stats: PathBuf,
    pub elevation: PathBuf,
    pub course: PathBuf,
    pub preview: PathBuf,
}

impl CourseFiles {
    pub fn new(output_root: &Path, id: &CourseId) -> Self {
        let dir = output_root.join(id.folder_name());
        let stem = id.file_stem();
        CourseFiles {
            gpx: dir.join(format!("{}.gpx", stem)),
            stats: dir.join(format!("{}_stats.json", stem)),
            elevation: dir.join(format!("{}_elevation_data.json", stem)),
            course: dir.join(format!("{}_course.json", stem)),
            preview: dir.join(format!("{}_preview.json", stem)),
            dir,
        }
    }
}

/// Strips identifying metadata and renames every track.
pub fn anonymize(gpx: &Gpx, track_name: &str, creator: &str) -> Gpx {
    let mut out = gpx.clone();
    out.version = GpxVersion::Gpx11;
    out.creator = Some(creator.to_string());

    if let Some(metadata) = out.metadata.as_mut() {
        metadata.name = None;
        metadata.description = None;
        metadata.author = None;
    }

    for track in out.tracks.iter_mut() {
        track.name = Some(track_name.to_string());
        track.description = None;
        track.comment = None;
        track.source = None;
        track.type_ = None;
        track.number = None;
    }

    out
}

fn create(path: &Path) -> Result<BufWriter<File>, BatchError> {
    let file = File::create(path).map_err(|source| BatchError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufWriter::new(file))
}

/// Pretty-printed JSON to `path`.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), BatchError> {
    let writer = create(path)?;
    serde_json::to_writer_pretty(writer, value).map_err(|source| BatchError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn write_gpx(path: &Path, gpx: &Gpx) -> Result<(), BatchError> {
    let writer = create(path)?;
    write(gpx, writer).map_err(|e| BatchError::GpxWrite {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Writes every file for one course and returns their paths.
pub fn write_course(
    output_root: &Path,
    id: &CourseId,
    track_name: &str,
    processed: &ProcessedCourse,
    config: &OutputConfig,
) -> Result<CourseFiles, BatchError> {
    let files = CourseFiles::new(output_root, id);
    fs::create_dir_all(&files.dir).map_err(|source| BatchError::Io {
        path: files.dir.clone(),
        source,
    })?;

    write_gpx(&files.gpx, &anonymize(&processed.gpx, track_name, &config.creator))?;
    write_json(&files.stats, &processed.summary.stats)?;
    write_json(&files.elevation, &processed.summary.profile)?;
    write_json(&files.course, &processed.summary)?;

    match &processed.preview {
        Some(preview) => write_json(&files.preview, preview)?,
        // don't leave a preview from an earlier run next to fresh stats
        None => {
            if files.preview.exists() {
                fs::remove_file(&files.preview).map_err(|source| BatchError::Io {
                    path: files.preview.clone(),
                    source,
                })?;
            }
        }
    }

    debug!("Wrote course files to {}", files.dir.display());
    Ok(files)
}

/// Stats from an earlier run, if present and readable.
pub fn read_cached_stats(path: &Path) -> Option<CourseStats> {
    let file = File::open(path).ok()?;
    match serde_json::from_reader(BufReader::new(file)) {
        Ok(stats) => Some(stats),
        Err(e) => {
            debug!("Ignoring unreadable cached stats {}: {}", path.display(), e);
            None
        }
    }
}

/// One row of `courses.csv`.
#[derive(Debug, Serialize)]
struct CourseRow<'a> {
    id: &'a str,
    name: &'a str,
    year: u16,
    region: &'a str,
    direction: &'static str,
    distance_km: f64,
    elevation_gain_m: f64,
    climb_density_m_per_km: f64,
}

/// Writes `index.json` and `courses.csv` under `output_root`.
pub fn write_index(output_root: &Path, report: &BatchReport) -> Result<(), BatchError> {
    write_json(&output_root.join("index.json"), report)?;

    let mut wtr = csv::Writer::from_path(output_root.join("courses.csv"))?;
    for course in &report.courses {
        wtr.serialize(CourseRow {
            id: &course.id,
            name: &course.name,
            year: course.year,
            region: &course.region,
            direction: course.direction.label(),
            distance_km: course.distance_km,
            elevation_gain_m: course.elevation_gain_m,
            climb_density_m_per_km: course.climb_density_m_per_km,
        })?;
    }
    wtr.flush().map_err(|source| BatchError::Io {
        path: output_root.join("courses.csv"),
        source,
    })?;
    Ok(())
}
