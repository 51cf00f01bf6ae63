/// COURSE CATALOG
///
/// Turns a directory of `<name>_crit_<year>.gpx` recordings into course
/// outputs plus one [`BatchReport`]. A bad track is logged and skipped; only
/// an unreadable input directory stops the batch.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::CourseConfig;
use crate::course_geometry::Orientation;
use crate::course_output::{self, CourseFiles, ProcessedCourse};
use crate::course_summary::{build_preview, build_summary, CourseStats};
use crate::error::{BatchError, CourseError};
use crate::region_resolver::RegionResolver;
use crate::track_loader::{load_gpx, track_from_gpx};

const CRIT_MARKER: &str = "_crit_";

/// Identity of a course, parsed from its recording's file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CourseId {
    /// Name part as written in the file name, e.g. `elmhurst`
    pub slug: String,
    pub year: u16,
}

impl CourseId {
    /// Parses `<slug>_crit_<yyyy>.gpx`. The year is the last four
    /// characters of the stem, so the slug may itself contain `_crit_`.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(".gpx")?;
        let split = stem.len().checked_sub(CRIT_MARKER.len() + 4)?;
        if split == 0 || !stem.is_char_boundary(split) {
            return None;
        }
        let (slug, tail) = stem.split_at(split);
        let year = tail.strip_prefix(CRIT_MARKER)?;
        if !year.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(CourseId {
            slug: slug.to_string(),
            year: year.parse().ok()?,
        })
    }

    /// Output directory name, e.g. `elmhurst_2024`.
    pub fn folder_name(&self) -> String {
        format!("{}_{}", self.slug, self.year)
    }

    /// Prefix of every per-course file, e.g. `elmhurst_crit_2024`.
    pub fn file_stem(&self) -> String {
        format!("{}{}{}", self.slug, CRIT_MARKER, self.year)
    }
}

/// `lake_bluff` -> `Lake Bluff`; words listed in `special` stay verbatim.
pub fn display_name(slug: &str, special: &[String]) -> String {
    slug.replace('_', " ")
        .split_whitespace()
        .map(|word| {
            if special.iter().any(|s| s == word) {
                word.to_string()
            } else {
                capitalize(word)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

/// A recording found while scanning.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub path: PathBuf,
    pub id: CourseId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedTrack {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BatchWarning {
    /// Two recordings map to one output directory; the later one wins
    DuplicateOutput {
        course_id: String,
        previous: PathBuf,
        current: PathBuf,
    },
}

/// One course as listed in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseEntry {
    pub id: String,
    pub name: String,
    pub year: u16,
    pub region: String,
    pub direction: Orientation,
    pub distance_km: f64,
    pub elevation_gain_m: f64,
    pub climb_density_m_per_km: f64,
    pub source: PathBuf,
    /// Stats were reused from an earlier run
    pub cached: bool,
}

impl CourseEntry {
    fn new(entry: &CatalogEntry, name: String, stats: &CourseStats, cached: bool) -> Self {
        CourseEntry {
            id: entry.id.folder_name(),
            name,
            year: entry.id.year,
            region: stats.region.clone(),
            direction: stats.orientation,
            distance_km: stats.distance_km,
            elevation_gain_m: stats.elevation_gain_m,
            climb_density_m_per_km: stats.climb_density_m_per_km,
            source: entry.path.clone(),
            cached,
        }
    }
}

/// Everything a batch produced, for the index pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub generated_at: DateTime<Utc>,
    pub courses: Vec<CourseEntry>,
    /// Distinct region labels, sorted
    pub regions: BTreeSet<String>,
    /// Year -> course ids
    pub calendar: BTreeMap<u16, Vec<String>>,
    pub skipped: Vec<SkippedTrack>,
    pub warnings: Vec<BatchWarning>,
}

impl BatchReport {
    fn new() -> Self {
        BatchReport {
            generated_at: Utc::now(),
            courses: Vec::new(),
            regions: BTreeSet::new(),
            calendar: BTreeMap::new(),
            skipped: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Adds a course, replacing an earlier one with the same id.
    fn record(&mut self, course: CourseEntry) {
        match self.courses.iter_mut().find(|c| c.id == course.id) {
            Some(existing) => *existing = course,
            None => self.courses.push(course),
        }
    }

    fn finish(&mut self) {
        self.regions = self.courses.iter().map(|c| c.region.clone()).collect();
        self.calendar.clear();
        for course in &self.courses {
            self.calendar.entry(course.year).or_default().push(course.id.clone());
        }
    }

    fn skip(&mut self, path: &Path, reason: String) {
        self.skipped.push(SkippedTrack {
            path: path.to_path_buf(),
            reason,
        });
    }
}

/// Lists recordings under `dir`, sorted by file name. Files that are not
/// `.gpx` are ignored; `.gpx` files with a nonconforming name are returned
/// as skipped.
pub fn scan_directory(dir: &Path) -> Result<(Vec<CatalogEntry>, Vec<SkippedTrack>), BatchError> {
    std::fs::read_dir(dir).map_err(|e| BatchError::InputDir {
        path: dir.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut entries = Vec::new();
    let mut skipped = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Cannot read directory entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = match entry.file_name().to_str() {
            Some(name) => name,
            None => continue,
        };
        if !file_name.ends_with(".gpx") {
            continue;
        }

        match CourseId::from_file_name(file_name) {
            Some(id) => entries.push(CatalogEntry {
                path: entry.path().to_path_buf(),
                id,
            }),
            None => {
                info!("Skipping invalid filename: {}", file_name);
                skipped.push(SkippedTrack {
                    path: entry.path().to_path_buf(),
                    reason: format!("file name does not match <name>{}<year>.gpx", CRIT_MARKER),
                });
            }
        }
    }

    Ok((entries, skipped))
}

/// Detailed summary, preview and source document for one recording.
pub fn process_track(
    entry: &CatalogEntry,
    config: &CourseConfig,
    resolver: &dyn RegionResolver,
) -> Result<ProcessedCourse, CourseError> {
    let gpx = load_gpx(&entry.path)?;
    let track = track_from_gpx(&gpx, &entry.path)?;
    let summary = build_summary(&track, &config.detailed, &config.smoothing, resolver)?;

    let preview = match build_preview(&track, &config.preview) {
        Ok(preview) => Some(preview),
        Err(e) => {
            warn!("No preview for {}: {}", entry.path.display(), e);
            None
        }
    };

    Ok(ProcessedCourse { gpx, summary, preview })
}

enum Plan {
    Process,
    Cached(CourseStats),
}

/// Processes every recording under `input` and writes outputs under
/// `output`.
pub fn run_batch(
    input: &Path,
    output: &Path,
    config: &CourseConfig,
    resolver: &dyn RegionResolver,
) -> Result<BatchReport, BatchError> {
    let (entries, skipped) = scan_directory(input)?;
    let mut report = BatchReport::new();
    report.skipped = skipped;

    std::fs::create_dir_all(output).map_err(|source| BatchError::Io {
        path: output.to_path_buf(),
        source,
    })?;

    // Decide up front, before this run writes anything, which outputs came
    // from an earlier run.
    let mut seen: HashMap<String, PathBuf> = HashMap::new();
    let mut plans = Vec::with_capacity(entries.len());
    for entry in &entries {
        let folder = entry.id.folder_name();
        if let Some(previous) = seen.insert(folder.clone(), entry.path.clone()) {
            warn!(
                "{} and {} both map to {}; the later one overwrites",
                previous.display(),
                entry.path.display(),
                folder
            );
            report.warnings.push(BatchWarning::DuplicateOutput {
                course_id: folder,
                previous,
                current: entry.path.clone(),
            });
            plans.push(Plan::Process);
            continue;
        }

        let files = CourseFiles::new(output, &entry.id);
        let plan = if config.force {
            Plan::Process
        } else {
            match course_output::read_cached_stats(&files.stats) {
                Some(stats) => Plan::Cached(stats),
                None => Plan::Process,
            }
        };
        plans.push(plan);
    }

    let work: Vec<&CatalogEntry> = entries
        .iter()
        .zip(&plans)
        .filter(|(_, plan)| matches!(plan, Plan::Process))
        .map(|(entry, _)| entry)
        .collect();

    let threads = config.worker_threads();
    let run = |entry: &&CatalogEntry| {
        info!("Processing: {}", entry.id.folder_name());
        process_track(entry, config, resolver)
    };
    let outcomes: Vec<Result<ProcessedCourse, CourseError>> = if threads > 1 && work.len() > 1 {
        info!("Using parallel processing on {} threads", threads);
        match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => pool.install(|| work.par_iter().map(run).collect()),
            Err(e) => {
                warn!("Could not start worker pool ({}); processing sequentially", e);
                work.iter().map(run).collect()
            }
        }
    } else {
        work.iter().map(run).collect()
    };
    let mut results = outcomes.into_iter();

    // Write in catalog order so a duplicate's later recording wins on disk
    for (entry, plan) in entries.iter().zip(plans) {
        let name = display_name(&entry.id.slug, &config.output.special_case_words);
        match plan {
            Plan::Cached(stats) => {
                info!("Reusing existing output for {}", entry.id.folder_name());
                report.record(CourseEntry::new(entry, name, &stats, true));
            }
            Plan::Process => match results.next() {
                Some(Ok(processed)) => {
                    let track_name = format!("{} Crit {}", name, entry.id.year);
                    course_output::write_course(output, &entry.id, &track_name, &processed, &config.output)?;
                    report.record(CourseEntry::new(entry, name, &processed.summary.stats, false));
                }
                Some(Err(e)) => {
                    warn!("Skipping {}: {}", entry.path.display(), e);
                    report.skip(&entry.path, e.to_string());
                }
                None => {}
            },
        }
    }

    report.finish();
    course_output::write_index(output, &report)?;
    Ok(report)
}
