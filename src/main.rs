use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use crit_courses::{resolver_from_config, run_batch, BatchWarning, CourseConfig};

/// Builds course pages' data from crit race recordings
#[derive(Parser, Debug)]
#[command(name = "crit-courses")]
#[command(about = "Extract a representative lap and course stats from crit GPX recordings")]
#[command(version)]
struct Args {
    /// Folder of `<name>_crit_<year>.gpx` recordings
    #[arg(short, long, default_value = "gpx_files", env = "CRIT_INPUT")]
    input: PathBuf,

    /// Where course folders, index.json and courses.csv go
    #[arg(short, long, default_value = "courses", env = "CRIT_OUTPUT")]
    output: PathBuf,

    /// TOML config file
    #[arg(short, long, env = "CRIT_CONFIG")]
    config: Option<PathBuf>,

    /// Skip reverse geocoding; every region reads "Unknown"
    #[arg(long)]
    offline: bool,

    /// Reprocess courses that already have output
    #[arg(long)]
    force: bool,

    /// Worker threads (0 = one per core)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Start-point proximity in metres, both lap paths
    #[arg(long)]
    proximity: Option<f64>,

    /// Fixes to skip after a detailed-path boundary
    #[arg(long)]
    detailed_guard: Option<usize>,

    /// Fixes to skip after a preview-path boundary
    #[arg(long)]
    preview_guard: Option<usize>,
}

impl Args {
    fn apply(&self, config: &mut CourseConfig) {
        if self.offline {
            config.geocoder.enabled = false;
        }
        if self.force {
            config.force = true;
        }
        if let Some(jobs) = self.jobs {
            config.jobs = jobs;
        }
        if let Some(proximity) = self.proximity {
            config.detailed.proximity_m = proximity;
            config.preview.proximity_m = proximity;
        }
        if let Some(guard) = self.detailed_guard {
            config.detailed.guard = guard;
        }
        if let Some(guard) = self.preview_guard {
            config.preview.guard = guard;
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = CourseConfig::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    let resolver = resolver_from_config(&config.geocoder).context("could not set up reverse geocoding")?;

    info!(
        "Reading {} -> {} ({} worker threads)",
        args.input.display(),
        args.output.display(),
        config.worker_threads()
    );

    let report = run_batch(&args.input, &args.output, &config, resolver.as_ref())
        .with_context(|| format!("batch over {} failed", args.input.display()))?;

    println!("\n🚴 CRIT COURSE SUMMARY");
    println!("======================");
    for course in &report.courses {
        println!(
            "  {:<30} {:>6.2} km  {:>4.0} m gain  {:>5.1} m/km  {:<17}  {}{}",
            format!("{} ({})", course.name, course.year),
            course.distance_km,
            course.elevation_gain_m,
            course.climb_density_m_per_km,
            course.direction.label(),
            course.region,
            if course.cached { "  [cached]" } else { "" }
        );
    }

    println!(
        "\n✅ {} courses written to {}",
        report.courses.len(),
        args.output.display()
    );
    if !report.regions.is_empty() {
        let regions: Vec<&str> = report.regions.iter().map(String::as_str).collect();
        println!("🗺️  Regions: {}", regions.join(", "));
    }
    for (year, ids) in &report.calendar {
        println!("📅 {}: {} courses", year, ids.len());
    }

    if !report.skipped.is_empty() {
        println!("\n⚠️  Skipped {} files:", report.skipped.len());
        for skipped in &report.skipped {
            println!("   • {}: {}", skipped.path.display(), skipped.reason);
        }
    }
    for warning in &report.warnings {
        match warning {
            BatchWarning::DuplicateOutput { course_id, previous, current } => println!(
                "⚠️  {} came from both {} and {}; kept the later one",
                course_id,
                previous.display(),
                current.display()
            ),
        }
    }

    Ok(())
}
