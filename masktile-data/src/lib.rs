//! External collaborators for the masktile engine.
//!
//! Responsibilities:
//! - Fetch raw vector features for a bounding box from an Overpass
//!   endpoint ([`overpass`]).
//! - Fetch matching aerial imagery tiles from Bing Maps ([`imagery`]).
//! - Keep the append-only registry of completed tiles ([`registry`]).
//!
//! Boundaries:
//! - No rendering logic; geometry assembly and rasterization live in
//!   `masktile-core`.
//! - The collaborator traits are synchronous; HTTP clients bridge to
//!   async `reqwest` by blocking on an internally owned Tokio runtime.

use thiserror::Error;

pub mod imagery;
pub mod overpass;
pub mod registry;

pub use imagery::{BingImagery, ImageryError, ImagerySource};
pub use overpass::{OverpassClient, VectorSource, VectorSourceError};
pub use registry::{RegistryError, TileRegistry};

/// Errors raised while constructing an HTTP-backed collaborator.
#[derive(Debug, Error)]
pub enum ClientBuildError {
    /// Failed to build the HTTP client.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
    /// Failed to build the Tokio runtime.
    #[error("failed to build Tokio runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Default user agent for outgoing requests.
pub const DEFAULT_USER_AGENT: &str = "masktile-data/0.1";
