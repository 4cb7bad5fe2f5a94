//! Command-line interface for the masktile batch generator.
//!
//! ## Responsibilities
//! - Parse the command line and the JSON batch configuration.
//! - Wire the Overpass and Bing clients into the batch loop.
//!
//! ## Boundaries
//! - All tile, geometry, and rasterisation behaviour lives in
//!   `masktile-core`; all network and filesystem collaborators live in
//!   `masktile-data`.
#![forbid(unsafe_code)]

use std::path::PathBuf;

use clap::Parser;
use log::info;
use masktile_data::{BingImagery, ClientBuildError, ImageryError, ImagerySource, OverpassClient};
use thiserror::Error;

mod batch;
mod config;

pub use batch::BatchError;
pub use config::{Config, ConfigError};

/// Failures that abort the process.
#[derive(Debug, Error)]
pub enum CliError {
    /// Command-line parsing failed.
    #[error(transparent)]
    ArgumentParsing(clap::Error),
    /// The configuration file could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// An HTTP client could not be constructed.
    #[error(transparent)]
    Build(#[from] ClientBuildError),
    /// Bing imagery discovery failed.
    #[error(transparent)]
    Imagery(#[from] ImageryError),
    /// The batch run failed.
    #[error(transparent)]
    Batch(#[from] BatchError),
}

#[derive(Debug, Parser)]
#[command(
    name = "masktile",
    about = "Generate training masks and aerial imagery from OpenStreetMap tiles",
    version
)]
struct Cli {
    /// Path to the JSON batch configuration.
    #[arg(short, long)]
    config: PathBuf,
    /// Bing Maps access token; omit to skip imagery downloads.
    #[arg(short = 'k', long, default_value = "")]
    bing_access_token: String,
    /// Fix the bounding-box visiting order for reproducible runs.
    #[arg(long)]
    seed: Option<u64>,
}

/// Run the masktile CLI with the current process arguments.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let config = Config::load(&cli.config)?;

    let vector = match &config.options.overpass_endpoint {
        Some(endpoint) => OverpassClient::with_endpoint(endpoint)?,
        None => OverpassClient::new()?,
    };

    let imagery = BingImagery::discover(&cli.bing_access_token)?;
    if imagery.is_none() {
        info!("no imagery source configured, writing masks only");
    }
    let imagery_ref = imagery.as_ref().map(|source| source as &dyn ImagerySource);

    batch::run_batch(&config, &vector, imagery_ref, cli.seed)
        .map_err(CliError::from)
}
