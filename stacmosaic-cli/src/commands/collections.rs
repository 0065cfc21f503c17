//! Collections command - show the collection registry.

use console::style;
use stacmosaic::config::{CollectionRegistry, ConfigFile};

use crate::error::CliError;

/// List every registered collection with its settings.
pub fn run() -> Result<(), CliError> {
    let config = ConfigFile::load()?;
    let path = &config.catalog.collections_file;
    let registry = CollectionRegistry::load_from(path)?;

    println!("Collections ({})", path.display());
    println!();

    if registry.is_empty() {
        println!("  (none registered; any catalog id can still be searched)");
        return Ok(());
    }

    for (name, collection) in registry.iter() {
        if *name == collection.id {
            println!("{}", style(name).bold());
        } else {
            println!("{} -> {}", style(name).bold(), collection.id);
        }
        if let Some(index) = collection.orbit_token {
            match collection.orbit_len {
                Some(len) => println!("  orbit:  id token {} ({} chars)", index, len),
                None => println!("  orbit:  id token {}", index),
            }
        }
        if let Some(nodata) = collection.nodata {
            println!("  nodata: {}", nodata);
        }
        if !collection.exists_geom {
            println!("  footprints read from rasters");
        }
        for composite in &collection.composites {
            println!(
                "  {}m:    {}",
                composite.resolution,
                composite.bands.join(", ")
            );
        }
    }

    Ok(())
}
