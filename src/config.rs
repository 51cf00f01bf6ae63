/// CONFIG
///
/// Tuning knobs for lap detection, smoothing, geocoding and output. Every
/// value has a default, so a config file only needs the keys it changes,
/// e.g. `jobs = 4` plus `[detailed] guard = 40`.

use std::path::Path;

use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;

/// Lap detection and loop closing parameters for one extraction path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LapDetectionConfig {
    /// A fix closer than this to the start point counts as a return (m)
    pub proximity_m: f64,
    /// Minimum fix-index gap between two recorded returns
    pub guard: usize,
    /// First/last points further apart than this get a closing point (m)
    pub closure_tolerance_m: f64,
    /// Boundaries needed before a lap can be picked
    pub min_boundaries: usize,
}

impl LapDetectionConfig {
    /// Full-detail analysis: looser guard, needs at least two full laps.
    pub fn detailed() -> Self {
        LapDetectionConfig {
            proximity_m: 15.0,
            guard: 50,
            closure_tolerance_m: 5.0,
            min_boundaries: 3,
        }
    }

    /// Thumbnail extraction: tighter guard, one lap is enough.
    pub fn preview() -> Self {
        LapDetectionConfig {
            proximity_m: 15.0,
            guard: 20,
            closure_tolerance_m: 3.0,
            min_boundaries: 2,
        }
    }

    fn validate(&self, section: &str) -> Result<(), ConfigError> {
        if self.proximity_m.is_nan() || self.proximity_m <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "[{}] proximity_m must be positive, got {}",
                section, self.proximity_m
            )));
        }
        if self.closure_tolerance_m < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "[{}] closure_tolerance_m must not be negative",
                section
            )));
        }
        if self.min_boundaries < 2 {
            return Err(ConfigError::Invalid(format!(
                "[{}] min_boundaries must be at least 2 to form a lap",
                section
            )));
        }
        Ok(())
    }
}

/// A `[detailed]` or `[preview]` table; absent keys keep the preset.
#[derive(Debug, Default, Deserialize)]
struct LapDetectionOverrides {
    proximity_m: Option<f64>,
    guard: Option<usize>,
    closure_tolerance_m: Option<f64>,
    min_boundaries: Option<usize>,
}

impl LapDetectionOverrides {
    fn over(self, preset: LapDetectionConfig) -> LapDetectionConfig {
        LapDetectionConfig {
            proximity_m: self.proximity_m.unwrap_or(preset.proximity_m),
            guard: self.guard.unwrap_or(preset.guard),
            closure_tolerance_m: self.closure_tolerance_m.unwrap_or(preset.closure_tolerance_m),
            min_boundaries: self.min_boundaries.unwrap_or(preset.min_boundaries),
        }
    }
}

fn detailed_section<'de, D: Deserializer<'de>>(d: D) -> Result<LapDetectionConfig, D::Error> {
    LapDetectionOverrides::deserialize(d).map(|o| o.over(LapDetectionConfig::detailed()))
}

fn preview_section<'de, D: Deserializer<'de>>(d: D) -> Result<LapDetectionConfig, D::Error> {
    LapDetectionOverrides::deserialize(d).map(|o| o.over(LapDetectionConfig::preview()))
}

/// Savitzky-Golay window policy.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    pub min_window: usize,
    /// Window grows as `len / density_divisor`
    pub density_divisor: usize,
    pub poly_order: usize,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        SmoothingConfig {
            min_window: 7,
            density_divisor: 50,
            poly_order: 2,
        }
    }
}

impl SmoothingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.min_window % 2 == 0 {
            return Err(ConfigError::Invalid(format!(
                "[smoothing] min_window must be odd, got {}",
                self.min_window
            )));
        }
        if self.density_divisor == 0 {
            return Err(ConfigError::Invalid(
                "[smoothing] density_divisor must be positive".to_string(),
            ));
        }
        if self.poly_order >= self.min_window {
            return Err(ConfigError::Invalid(format!(
                "[smoothing] poly_order {} must be below min_window {}",
                self.poly_order, self.min_window
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    pub enabled: bool,
    pub base_url: String,
    pub user_agent: String,
    pub language: String,
    pub timeout_secs: u64,
    /// Nominatim's usage policy allows one request per second
    pub min_interval_ms: u64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        GeocoderConfig {
            enabled: true,
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: "crit-course-processor".to_string(),
            language: "en".to_string(),
            timeout_secs: 8,
            min_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Written into the `creator` attribute of anonymized GPX copies
    pub creator: String,
    /// Words kept verbatim when building display names
    pub special_case_words: Vec<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            creator: "crit-course-script".to_string(),
            special_case_words: vec!["ToAD".to_string(), "CBR".to_string()],
        }
    }
}

/// Everything a batch run needs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CourseConfig {
    #[serde(deserialize_with = "detailed_section")]
    pub detailed: LapDetectionConfig,
    #[serde(deserialize_with = "preview_section")]
    pub preview: LapDetectionConfig,
    pub smoothing: SmoothingConfig,
    pub geocoder: GeocoderConfig,
    pub output: OutputConfig,
    /// Worker threads for pipeline runs; 0 means one per core
    pub jobs: usize,
    /// Reprocess tracks even when their outputs already exist
    pub force: bool,
}

impl Default for CourseConfig {
    fn default() -> Self {
        CourseConfig {
            detailed: LapDetectionConfig::detailed(),
            preview: LapDetectionConfig::preview(),
            smoothing: SmoothingConfig::default(),
            geocoder: GeocoderConfig::default(),
            output: OutputConfig::default(),
            jobs: 1,
            force: false,
        }
    }
}

impl CourseConfig {
    /// Loads a TOML config file, or the defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                toml::from_str(&content).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            None => CourseConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.detailed.validate("detailed")?;
        self.preview.validate("preview")?;
        self.smoothing.validate()?;
        if self.geocoder.enabled && self.geocoder.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "[geocoder] timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Thread count after resolving `jobs = 0`.
    pub fn worker_threads(&self) -> usize {
        if self.jobs == 0 {
            num_cpus::get()
        } else {
            self.jobs
        }
    }
}
