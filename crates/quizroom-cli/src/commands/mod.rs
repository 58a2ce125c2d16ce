pub mod bot;
pub mod catalog;
pub mod config;
pub mod import;
pub mod serve;
pub mod stats;

use std::path::PathBuf;

use quizroom_core::{Catalog, Config};

/// Load the catalog from `dir`, or from the configured directory.
pub fn load_catalog(
    config: &Config,
    dir: Option<PathBuf>,
) -> Result<Catalog, Box<dyn std::error::Error>> {
    let dir = dir.unwrap_or_else(|| config.catalog.dir.clone());
    Ok(Catalog::load_dir(&dir, &config.catalog.free_text_marker)?)
}
