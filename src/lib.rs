//! Facade crate for the masktile engine.
//!
//! Re-exports the pure tile, geometry, and rasterisation surface of
//! `masktile-core`. Network collaborators live in `masktile-data` and
//! the batch binary in `masktile-cli`.

#![forbid(unsafe_code)]

pub use masktile_core::{
    Assembler, BoundingBox, BoundingBoxSpec, DEFAULT_IMAGE_WIDTH, HighwayWidths,
    InvalidBoundingBox, Mask, MaskBuilder, MaskMode, Node, Relation, RelationMember, TagQuery,
    Tags, Tile, TileMasks, TileVerdict, VectorData, Way, tiles_for_bbox,
};
