//! stacmosaic CLI - search a STAC catalog and build virtual-raster mosaics
//!
//! ```text
//! stacmosaic search CB4-16D-2 --start 2024-01-01 --end 2024-01-31 \
//!     --bbox=-48.0,-16.0,-47.0,-15.0
//! stacmosaic collections
//! stacmosaic config list
//! ```

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::search::SearchArgs;

#[derive(Debug, Parser)]
#[command(name = "stacmosaic", version = stacmosaic::VERSION)]
#[command(about = "Search STAC catalogs and assemble virtual-raster mosaics")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Search a collection and build mosaics for an area of interest
    Search {
        /// Collection id or registry name
        collection: String,

        /// First acquisition date (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,

        /// Last acquisition date, inclusive (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,

        /// Area of interest as min_lon,min_lat,max_lon,max_lat
        #[arg(long, conflicts_with = "area", required_unless_present = "area")]
        bbox: Option<String>,

        /// GeoJSON file holding a Polygon or MultiPolygon area of interest
        #[arg(long)]
        area: Option<PathBuf>,

        /// Only use assets at this resolution, in meters
        #[arg(long)]
        resolution: Option<f64>,

        /// Output directory (defaults to the configured one)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Show log output on the console
        #[arg(short, long)]
        verbose: bool,
    },

    /// List the collections of the registry
    Collections,

    /// View configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Search {
            collection,
            start,
            end,
            bbox,
            area,
            resolution,
            output,
            verbose,
        } => commands::search::run(SearchArgs {
            collection,
            start,
            end,
            bbox,
            area,
            resolution,
            output,
            verbose,
        }),
        Commands::Collections => commands::collections::run(),
        Commands::Config { command } => commands::config::run(command),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
