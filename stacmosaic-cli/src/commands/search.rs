//! Search command - run the full pipeline and report progress.

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use stacmosaic::catalog::{CatalogClient, SearchRequest};
use stacmosaic::config::{CollectionRegistry, ConfigFile};
use stacmosaic::executor::{ProgressSink, RunnerConfig, TaskEvent, TaskOutcome, TaskRunner};
use stacmosaic::geo::{BoundingBox, Geometry};
use stacmosaic::logging::init_logging;
use stacmosaic::vrt::{GdalBuildVrt, GdalInfo};
use tracing::info;

use crate::error::CliError;

/// Arguments for the search command.
pub struct SearchArgs {
    pub collection: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub bbox: Option<String>,
    pub area: Option<PathBuf>,
    pub resolution: Option<f64>,
    pub output: Option<PathBuf>,
    pub verbose: bool,
}

/// Run the search command.
pub fn run(args: SearchArgs) -> Result<(), CliError> {
    let config = ConfigFile::load()?;
    let _log_guard = init_logging(&config.logging, args.verbose)?;
    info!(version = stacmosaic::VERSION, "stacmosaic search");

    let area = match (&args.bbox, &args.area) {
        (Some(bbox), _) => parse_bbox(bbox)?.into(),
        (None, Some(path)) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| CliError::Area(format!("{}: {}", path.display(), e)))?;
            Geometry::from_geojson_str(&text)?
        }
        (None, None) => {
            return Err(CliError::Area(
                "either --bbox or --area is required".to_string(),
            ))
        }
    };

    let mut request = SearchRequest::new(&args.collection, args.start, args.end, area)?;
    if let Some(resolution) = args.resolution {
        request = request.with_resolution(resolution)?;
    }

    let registry = CollectionRegistry::load_from(&config.catalog.collections_file)?;
    let output_dir = args
        .output
        .unwrap_or_else(|| config.output.directory.clone());
    let catalog =
        CatalogClient::from_config(config.catalog_config())?.with_inspector(GdalInfo::new());
    let runner = TaskRunner::new(
        catalog,
        GdalBuildVrt::new(),
        RunnerConfig::new(&output_dir)
            .with_registry(registry)
            .with_reuse_last_search(config.search.reuse_last_search),
    );

    println!("stacmosaic v{}", stacmosaic::VERSION);
    println!("Catalog:    {}", config.catalog.url);
    println!("Collection: {}", request.collection());
    println!("Dates:      {} to {}", request.start(), request.end());
    println!("Area:       {}", request.bbox().to_query());
    println!("Output:     {}", output_dir.display());
    println!();

    let (sink, mut events) = ProgressSink::channel();
    let handle = runner.start(request, sink)?;

    let canceller = runner.clone();
    ctrlc::set_handler(move || {
        let _ = canceller.cancel();
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let spinner = spinner();
    spinner.set_message("Searching catalog...");
    while let Some(event) = events.blocking_recv() {
        match &event {
            TaskEvent::BuildProgress { .. } => spinner.println(event.to_string()),
            TaskEvent::Finished(_) => break,
            _ => spinner.set_message(event.to_string()),
        }
    }
    spinner.finish_and_clear();

    report(handle.join())
}

fn spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Prints the outcome; runs that were cancelled or failed become errors.
fn report(outcome: TaskOutcome) -> Result<(), CliError> {
    match &outcome {
        TaskOutcome::Completed(summary) => {
            println!("{}", style(&outcome).green().bold());
            println!("  Received: {} scenes", summary.received);
            if summary.reused_search {
                println!("  (reused the previous search)");
            }
            println!("  Output:   {}", summary.output_dir.display());
            let failures: Vec<_> = summary.failures().collect();
            if !failures.is_empty() {
                println!();
                println!("{}", style(format!("{} builds failed:", failures.len())).yellow());
                for failure in failures {
                    println!(
                        "  {}: {}",
                        failure.target,
                        failure.reason().unwrap_or_default()
                    );
                }
            }
            Ok(())
        }
        TaskOutcome::NoScenesFound { .. } | TaskOutcome::NoScenesAfterFilter { .. } => {
            println!("{}", style(&outcome).yellow());
            Ok(())
        }
        TaskOutcome::Cancelled { .. } | TaskOutcome::Failed { .. } => {
            Err(CliError::Run(outcome.to_string()))
        }
    }
}

/// Parses `min_lon,min_lat,max_lon,max_lat`.
fn parse_bbox(text: &str) -> Result<BoundingBox, CliError> {
    let values = text
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| CliError::Area(format!("'{}': {}", text, e)))?;

    match values.as_slice() {
        [min_x, min_y, max_x, max_y] => Ok(BoundingBox::new(*min_x, *min_y, *max_x, *max_y)?),
        _ => Err(CliError::Area(format!(
            "'{}': expected 4 comma-separated numbers",
            text
        ))),
    }
}
