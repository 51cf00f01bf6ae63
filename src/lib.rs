//! Crit course extraction: pulls one representative lap out of a
//! multi-lap GPX recording, smooths its elevation and derives the course
//! figures and files a course page is built from.

pub mod config;
pub mod course_catalog;
pub mod course_geometry;
pub mod course_output;
pub mod course_summary;
pub mod elevation_smoother;
pub mod error;
pub mod lap_segmenter;
pub mod loop_closer;
pub mod region_resolver;
pub mod track_loader;

pub use config::{CourseConfig, GeocoderConfig, LapDetectionConfig, OutputConfig, SmoothingConfig};
pub use course_catalog::{run_batch, BatchReport, BatchWarning, CourseEntry, CourseId, SkippedTrack};
pub use course_geometry::{GradientBand, Orientation, RingAnalysis};
pub use course_summary::{build_preview, build_summary, CourseStats, CourseSummary, PreviewRing};
pub use error::{BatchError, ConfigError, CourseError, GeocodeError};
pub use lap_segmenter::{LapBoundaries, LapCandidate};
pub use region_resolver::{resolver_from_config, NominatimResolver, OfflineResolver, RegionResolver};
pub use track_loader::{load_track, Fix, Track};
