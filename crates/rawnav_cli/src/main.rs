use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{info, warn};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use rawnav_core::{run_pipeline, MatchSettings, ProjectionOrigin, RawnavDataset};
use rawnav_report::{write_outputs, ReportInputs, RunReport};

#[derive(Debug, Parser)]
#[command(name = "rawnav-matcher")]
#[command(about = "Match rawnav AVL traces to schedule stops and summarize trips")]
struct Args {
    /// Trace CSV (one row per rawnav fix)
    #[arg(short = 't', long = "trace")]
    trace: PathBuf,

    /// Schedule stop CSV (one row per stop of each route pattern)
    #[arg(short = 'r', long = "reference")]
    reference: PathBuf,

    /// Optional CSV of segment start/end boundaries
    #[arg(short = 's', long = "segment-boundaries", alias = "segment_boundaries")]
    segment_boundaries: Option<PathBuf>,

    #[arg(short = 'o', long = "output")]
    output: PathBuf,

    /// JSON settings file; flags below override its values
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    #[arg(long = "max-stop-distance-ft")]
    max_stop_distance_ft: Option<f64>,

    #[arg(long = "max-segment-distance-ft")]
    max_segment_distance_ft: Option<f64>,

    #[arg(long = "origin-lat", requires = "origin_lon")]
    origin_lat: Option<f64>,

    #[arg(long = "origin-lon", requires = "origin_lat")]
    origin_lon: Option<f64>,

    #[arg(short = 'p', long = "pretty")]
    pretty: bool,

    /// Worker threads for per-trip matching (0 uses all cores)
    #[arg(long = "threads", default_value_t = 0)]
    threads: usize,

    /// Hide progress bars
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();
    let args = Args::parse();

    if args.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.threads)
            .build_global()
            .context("configure worker threads")?;
    }

    let settings = resolve_settings(&args)?;
    info!(
        "max stop distance {} ft, max segment distance {} ft",
        settings.max_stop_distance_ft, settings.max_segment_distance_ft
    );

    let dataset = RawnavDataset::from_paths(
        &args.trace,
        &args.reference,
        args.segment_boundaries.as_deref(),
    )
    .context("load input tables")?;

    let started_at = Instant::now();
    let progress = (!args.quiet).then(IndicatifHandler::new);
    let outcome = run_pipeline(
        &dataset,
        &settings,
        progress
            .as_ref()
            .map(|handler| handler as &dyn ProgressHandler),
    )
    .context("run stop matching")?;
    if let Some(progress) = progress.as_ref() {
        progress.finish();
    }
    info!("pipeline took {:?}", started_at.elapsed());

    if outcome.summaries.is_empty() && !dataset.traces.is_empty() {
        warn!("no trip could be summarized; check route/pattern values in both inputs");
    }

    let report = RunReport::from_outcome(
        ReportInputs {
            trace: args.trace.clone(),
            reference: args.reference.clone(),
            segment_boundaries: args.segment_boundaries.clone(),
        },
        &settings,
        &outcome,
    )
    .with_version(env!("CARGO_PKG_VERSION"));
    write_outputs(&args.output, &outcome, &report, args.pretty)?;
    info!(
        "wrote {} matches, {} summaries and {} notices to {}",
        outcome.matches.len(),
        outcome.summaries.len(),
        outcome.notices.len(),
        args.output.display()
    );
    Ok(())
}

fn resolve_settings(args: &Args) -> anyhow::Result<MatchSettings> {
    let mut settings = match args.config.as_deref() {
        Some(path) => MatchSettings::from_json_file(path)
            .with_context(|| format!("read settings {}", path.display()))?,
        None => MatchSettings::default(),
    };
    if let Some(value) = args.max_stop_distance_ft {
        settings.max_stop_distance_ft = value;
    }
    if let Some(value) = args.max_segment_distance_ft {
        settings.max_segment_distance_ft = value;
    }
    if let (Some(lat), Some(lon)) = (args.origin_lat, args.origin_lon) {
        settings.projection_origin = Some(ProjectionOrigin { lat, lon });
    }

    if !settings.max_stop_distance_ft.is_finite() || settings.max_stop_distance_ft <= 0.0 {
        bail!(
            "--max-stop-distance-ft must be positive, got {}",
            settings.max_stop_distance_ft
        );
    }
    if !settings.max_segment_distance_ft.is_finite() || settings.max_segment_distance_ft <= 0.0 {
        bail!(
            "--max-segment-distance-ft must be positive, got {}",
            settings.max_segment_distance_ft
        );
    }
    if let Some(origin) = settings.projection_origin {
        if !(-90.0..=90.0).contains(&origin.lat) || !(-180.0..=180.0).contains(&origin.lon) {
            bail!("projection origin {}, {} is out of range", origin.lat, origin.lon);
        }
    }
    Ok(settings)
}

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use rawnav_core::ProgressHandler;

struct IndicatifHandler {
    _multi: MultiProgress,
    stage_pb: ProgressBar,
    trips_pb: ProgressBar,
}

impl IndicatifHandler {
    fn new() -> Self {
        let multi = MultiProgress::new();

        let stage_pb = multi.add(ProgressBar::new_spinner());
        stage_pb.set_style(
            ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        stage_pb.set_message("Waiting to start...");

        let trips_pb = multi.add(ProgressBar::new(0));
        trips_pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} trips {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
        );

        Self {
            _multi: multi,
            stage_pb,
            trips_pb,
        }
    }

    fn finish(&self) {
        self.trips_pb.finish();
        self.stage_pb.finish_with_message("Matching complete");
    }
}

impl ProgressHandler for IndicatifHandler {
    fn on_start_stage(&self, stage: &str) {
        self.stage_pb.set_message(format!("{}...", stage));
    }

    fn on_finish_stage(&self, _stage: &str) {
        self.stage_pb.tick();
    }

    fn set_total_groups(&self, count: usize) {
        self.trips_pb.set_length(count as u64);
    }

    fn increment_group_progress(&self) {
        self.trips_pb.inc(1);
    }
}
