//! Per-tile orchestration: one mask per requested tag.
//!
//! The pipeline runs the assembler and the rasterizer for every
//! requested tag over one tile's vector data and reports whether
//! anything was rendered at all. The emptiness verdict is the signal
//! external collaborators use to decide whether the tile is worth
//! persisting and worth fetching imagery for.

use std::collections::HashMap;

use log::warn;

use crate::assemble::{Assembler, HighwayWidths};
use crate::mask::{Mask, MaskMode};
use crate::osm::{TagQuery, VectorData};
use crate::tile::Tile;

/// Default mask edge length in pixels.
pub const DEFAULT_IMAGE_WIDTH: u32 = 256;

/// Whether a tile produced any labelled pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileVerdict {
    /// Every mask is all-background; skip imagery and persistence.
    Empty,
    /// At least one mask holds a labelled pixel.
    NonEmpty,
}

/// Builds the per-tag masks for single tiles.
///
/// All configuration is held by value; nothing is shared across tiles,
/// so independent tiles may be processed by independent builders (or
/// clones of one) without coordination.
#[derive(Debug, Clone)]
pub struct MaskBuilder {
    image_width: u32,
    mode: MaskMode,
    widths: HighwayWidths,
}

impl Default for MaskBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_IMAGE_WIDTH, MaskMode::Merged)
    }
}

impl MaskBuilder {
    /// A builder with the default highway width table.
    pub fn new(image_width: u32, mode: MaskMode) -> Self {
        Self {
            image_width,
            mode,
            widths: HighwayWidths::default(),
        }
    }

    /// Replaces the highway width table.
    #[must_use]
    pub fn with_widths(mut self, widths: HighwayWidths) -> Self {
        self.widths = widths;
        self
    }

    /// Mask edge length in pixels.
    pub fn image_width(&self) -> u32 {
        self.image_width
    }

    /// Builds one fresh mask per query label for a tile.
    ///
    /// Two queries sharing a label (say `building` and
    /// `amenity=building`) would file under the same name; the first
    /// query keeps the label and later claimants are logged and skipped.
    ///
    /// Deterministic: identical vector data, tile and queries yield
    /// byte-identical masks.
    pub fn build(&self, data: &VectorData, tile: Tile, queries: &[TagQuery]) -> TileMasks {
        let assembler = Assembler::new(&self.widths, tile, self.image_width);
        let mut masks = HashMap::new();
        for query in queries {
            let label = query.label();
            if masks.contains_key(label) {
                warn!("query {query} duplicates mask label {label:?}, skipping");
                continue;
            }
            let mut mask = Mask::new(self.image_width);
            for shape in assembler.assemble(data, query) {
                mask.paint(shape, self.mode);
            }
            masks.insert(label.to_owned(), mask);
        }
        TileMasks { masks }
    }
}

/// The rendered masks of one tile, keyed by query label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileMasks {
    /// Label → mask mapping.
    pub masks: HashMap<String, Mask>,
}

impl TileMasks {
    /// Empty/non-empty verdict over all masks.
    pub fn verdict(&self) -> TileVerdict {
        if self.masks.values().any(|mask| !mask.is_empty()) {
            TileVerdict::NonEmpty
        } else {
            TileVerdict::Empty
        }
    }

    /// Iterates the masks that actually rendered something.
    pub fn non_empty(&self) -> impl Iterator<Item = (&str, &Mask)> {
        self.masks
            .iter()
            .filter(|(_, mask)| !mask.is_empty())
            .map(|(label, mask)| (label.as_str(), mask))
    }
}
