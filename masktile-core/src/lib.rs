//! Tile-based vector-to-raster mask generation.
//!
//! This crate turns crowd-sourced vector map features (ways and
//! multi-ring relations in geodetic coordinates) into pixel-aligned
//! binary label masks, tiled in the standard Web Mercator scheme so
//! each mask lines up with an aerial image tile of the same size.
//!
//! Responsibilities:
//! - Tile arithmetic: bounding box → tiles, geodetic point → tile-local
//!   pixel coordinates ([`tile`]).
//! - Geometry assembly: relations with roles become polygons with
//!   holes, highway ways become buffered bands ([`assemble`]).
//! - Rasterization: merged or instance-separated compositing onto a
//!   fixed-size single-channel raster ([`mask`]).
//! - Per-tile orchestration and the empty/non-empty verdict
//!   ([`pipeline`]).
//!
//! Boundaries:
//! - No I/O beyond writing a finished mask to disk on request; fetching
//!   vector data and imagery lives in `masktile-data`.
//! - Single-threaded and synchronous; every invocation owns its buffers,
//!   so callers may process independent tiles in parallel if they wish.

pub mod assemble;
pub mod bbox;
pub mod mask;
pub mod osm;
pub mod pipeline;
pub mod tile;

pub use assemble::{Assembler, HighwayWidths};
pub use bbox::{BoundingBox, BoundingBoxSpec, InvalidBoundingBox};
pub use mask::{Mask, MaskMode};
pub use osm::{Node, Relation, RelationMember, TagQuery, Tags, VectorData, Way};
pub use pipeline::{DEFAULT_IMAGE_WIDTH, MaskBuilder, TileMasks, TileVerdict};
pub use tile::{Tile, tiles_for_bbox};
