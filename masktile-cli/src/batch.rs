//! The sequential batch loop.
//!
//! Bounding boxes are visited in an order randomised once up front,
//! then fixed; tiles within a box are processed strictly in sequence.
//! Completed tiles are recorded in the per-box registry, so a rerun
//! after an interruption or a rate-limit backoff picks up where the
//! previous pass stopped. No partial output is ever recorded: a tile
//! is registered only after its masks (and imagery, when configured)
//! are on disk.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use masktile_core::{BoundingBox, MaskBuilder, TagQuery, TileVerdict, tiles_for_bbox};
use masktile_data::{
    ImageryError, ImagerySource, RegistryError, TileRegistry, VectorSource, VectorSourceError,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use thiserror::Error;

use crate::config::Config;

/// Pause between passes after an upstream rate limit.
const BACKOFF: Duration = Duration::from_secs(2);

/// Fatal failures of a batch run.
///
/// Per-shape geometry problems never reach this level; they are logged
/// and dropped inside the core. Rate limiting is handled by the outer
/// loop in [`run_batch`] and only escapes through it if mapped here by
/// a caller of [`run_pass`].
#[derive(Debug, Error)]
pub enum BatchError {
    /// The vector data source failed.
    #[error(transparent)]
    Vector(#[from] VectorSourceError),
    /// The imagery source failed.
    #[error(transparent)]
    Imagery(#[from] ImageryError),
    /// The tile registry could not be read or appended.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// A rendered mask could not be encoded to disk.
    #[error("failed to write mask {path:?}: {source}")]
    MaskWrite {
        /// Destination path.
        path: PathBuf,
        /// Underlying encode failure.
        #[source]
        source: image::ImageError,
    },
    /// A directory or imagery file could not be written.
    #[error("failed to write {path:?}: {source}")]
    Io {
        /// Destination path.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}

/// Runs passes over the whole configuration until one completes
/// without being rate limited.
pub fn run_batch(
    config: &Config,
    vector: &dyn VectorSource,
    imagery: Option<&dyn ImagerySource>,
    seed: Option<u64>,
) -> Result<(), BatchError> {
    loop {
        match run_pass(config, vector, imagery, seed) {
            Ok(()) => {
                info!("all bounding boxes processed");
                return Ok(());
            }
            Err(BatchError::Vector(VectorSourceError::RateLimited)) => {
                warn!(
                    "upstream rate limited; waiting {}s before the next pass",
                    BACKOFF.as_secs()
                );
                thread::sleep(BACKOFF);
            }
            Err(err) => return Err(err),
        }
    }
}

/// One pass over every bounding box and zoom level.
fn run_pass(
    config: &Config,
    vector: &dyn VectorSource,
    imagery: Option<&dyn ImagerySource>,
    seed: Option<u64>,
) -> Result<(), BatchError> {
    let mut names: Vec<&String> = config.boundingboxes.keys().collect();
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    names.shuffle(&mut rng);

    let queries: Vec<TagQuery> = config
        .query
        .tags
        .iter()
        .map(|tag| TagQuery::parse(tag))
        .collect();
    let builder = MaskBuilder::new(config.options.image_width, config.options.mode());

    for name in names {
        let entry = &config.boundingboxes[name];
        let bbox = match BoundingBox::try_from(entry.spec()) {
            Ok(bbox) => bbox,
            Err(err) => {
                warn!("skipping bounding box {name:?}: {err}");
                continue;
            }
        };
        info!("processing {name:?}");
        for &zoom in entry.effective_zoom_levels(&config.options.zoom_levels) {
            process_bbox(config, vector, imagery, &builder, &queries, name, bbox, zoom)?;
        }
    }
    Ok(())
}

/// Every tile of one bounding box at one zoom level.
#[allow(clippy::too_many_arguments)]
fn process_bbox(
    config: &Config,
    vector: &dyn VectorSource,
    imagery: Option<&dyn ImagerySource>,
    builder: &MaskBuilder,
    queries: &[TagQuery],
    name: &str,
    bbox: BoundingBox,
    zoom: u8,
) -> Result<(), BatchError> {
    let box_dir = config.options.target_dir.join(name);
    let zoom_dir = box_dir.join(zoom.to_string());
    create_dir(&zoom_dir)?;
    let mut registry = TileRegistry::open(box_dir.join("tiles.txt"))?;

    let tiles = tiles_for_bbox(&bbox, zoom);
    let total = tiles.len();
    for (index, tile) in tiles.into_iter().enumerate() {
        let tile_name = tile.name();
        if registry.contains(&tile_name) {
            debug!("{tile_name} already recorded, skipping");
            continue;
        }
        info!(
            "{name} @ zoom {zoom}: tile {}/{total} ({tile_name})",
            index + 1
        );

        let data = vector.fetch(&tile.bounds(), queries)?;
        let masks = builder.build(&data, tile, queries);
        match masks.verdict() {
            TileVerdict::NonEmpty => {
                for (label, mask) in masks.non_empty() {
                    let path = zoom_dir.join(format!("{tile_name}_{label}.png"));
                    mask.write_png(&path)
                        .map_err(|source| BatchError::MaskWrite { path, source })?;
                }
                if let Some(imagery) = imagery {
                    store_imagery(imagery, &zoom_dir, &tile_name, &tile.quadkey())?;
                }
            }
            TileVerdict::Empty => debug!("tile {tile_name} is empty"),
        }
        registry.record(&tile_name)?;
    }
    Ok(())
}

/// Fetches and stores the aerial image for one tile, unless it is
/// already on disk from a prior pass.
fn store_imagery(
    imagery: &dyn ImagerySource,
    zoom_dir: &Path,
    tile_name: &str,
    quadkey: &str,
) -> Result<(), BatchError> {
    let path = zoom_dir.join(format!("{tile_name}.jpeg"));
    if path.exists() {
        return Ok(());
    }
    let bytes = imagery.fetch_tile(quadkey)?;
    fs::write(&path, bytes).map_err(|source| BatchError::Io { path, source })
}

fn create_dir(path: &Path) -> Result<(), BatchError> {
    fs::create_dir_all(path).map_err(|source| BatchError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Coord;
    use masktile_core::{Tags, Tile, VectorData, Way};
    use masktile_core::tile::geodetic;
    use std::cell::Cell;
    use tempfile::tempdir;

    /// A vector source serving fixed data, counting its invocations.
    struct FixedSource {
        data: VectorData,
        calls: Cell<usize>,
    }

    impl VectorSource for FixedSource {
        fn fetch(
            &self,
            _bbox: &BoundingBox,
            _queries: &[TagQuery],
        ) -> Result<VectorData, VectorSourceError> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.data.clone())
        }
    }

    struct RateLimitedSource;

    impl VectorSource for RateLimitedSource {
        fn fetch(
            &self,
            _bbox: &BoundingBox,
            _queries: &[TagQuery],
        ) -> Result<VectorData, VectorSourceError> {
            Err(VectorSourceError::RateLimited)
        }
    }

    const ZOOM: u8 = 18;

    fn sample_tile() -> Tile {
        Tile::at(47.2231, 8.8188, ZOOM)
    }

    /// A config whose single bounding box sits strictly inside the
    /// sample tile.
    fn config_for(dir: &Path) -> Config {
        let tile = sample_tile();
        let bounds = tile.bounds();
        let pad_lat = (bounds.max_lat() - bounds.min_lat()) / 4.0;
        let pad_lon = (bounds.max_lon() - bounds.min_lon()) / 4.0;
        let json = format!(
            r#"{{
                "options": {{"target_dir": {:?}, "zoom_levels": [{ZOOM}]}},
                "boundingboxes": {{"sample": [{}, {}, {}, {}]}}
            }}"#,
            dir.to_str().unwrap(),
            bounds.min_lon() + pad_lon,
            bounds.min_lat() + pad_lat,
            bounds.max_lon() - pad_lon,
            bounds.max_lat() - pad_lat,
        );
        serde_json::from_str(&json).unwrap()
    }

    fn building_data(tile: Tile) -> VectorData {
        let (ox, oy) = tile.pixel_origin(256);
        let points = [(40.0, 40.0), (120.0, 40.0), (120.0, 120.0), (40.0, 120.0), (40.0, 40.0)]
            .iter()
            .map(|&(x, y)| {
                let (lat, lon) = geodetic(ox + x, oy + y, tile.zoom, 256);
                Coord { x: lon, y: lat }
            })
            .collect();
        let tags: Tags = [("building".to_owned(), "yes".to_owned())].into_iter().collect();
        VectorData {
            ways: vec![Way { id: 1, tags, points }],
            relations: Vec::new(),
        }
    }

    #[test]
    fn pass_writes_masks_and_records_tiles() {
        let dir = tempdir().unwrap();
        let config = config_for(dir.path());
        let tile = sample_tile();
        let source = FixedSource {
            data: building_data(tile),
            calls: Cell::new(0),
        };

        run_pass(&config, &source, None, Some(7)).unwrap();

        let tile_name = tile.name();
        let mask_path = dir
            .path()
            .join("sample")
            .join(ZOOM.to_string())
            .join(format!("{tile_name}_building.png"));
        assert!(mask_path.is_file(), "missing {mask_path:?}");

        let registry = std::fs::read_to_string(dir.path().join("sample").join("tiles.txt")).unwrap();
        assert!(registry.contains(&tile_name));
    }

    #[test]
    fn recorded_tiles_are_not_refetched() {
        let dir = tempdir().unwrap();
        let config = config_for(dir.path());
        let source = FixedSource {
            data: building_data(sample_tile()),
            calls: Cell::new(0),
        };

        run_pass(&config, &source, None, Some(7)).unwrap();
        let first_pass_calls = source.calls.get();
        assert!(first_pass_calls > 0);

        run_pass(&config, &source, None, Some(7)).unwrap();
        assert_eq!(source.calls.get(), first_pass_calls);
    }

    #[test]
    fn empty_tiles_are_recorded_but_write_no_masks() {
        let dir = tempdir().unwrap();
        let config = config_for(dir.path());
        let source = FixedSource {
            data: VectorData::default(),
            calls: Cell::new(0),
        };

        run_pass(&config, &source, None, Some(7)).unwrap();

        let registry = std::fs::read_to_string(dir.path().join("sample").join("tiles.txt")).unwrap();
        assert!(!registry.is_empty());

        let zoom_dir = dir.path().join("sample").join(ZOOM.to_string());
        let pngs = std::fs::read_dir(&zoom_dir).unwrap().count();
        assert_eq!(pngs, 0);
    }

    #[test]
    fn rate_limit_escapes_the_pass_without_recording() {
        let dir = tempdir().unwrap();
        let config = config_for(dir.path());

        let result = run_pass(&config, &RateLimitedSource, None, Some(7));
        assert!(matches!(
            result,
            Err(BatchError::Vector(VectorSourceError::RateLimited))
        ));
        assert!(!dir.path().join("sample").join("tiles.txt").exists());
    }

    #[test]
    fn invalid_bounding_box_skips_only_that_box() {
        let dir = tempdir().unwrap();
        let tile = sample_tile();
        let bounds = tile.bounds();
        let json = format!(
            r#"{{
                "options": {{"target_dir": {:?}, "zoom_levels": [{ZOOM}]}},
                "boundingboxes": {{
                    "bad": [1.0, 2.0, 3.0],
                    "good": [{}, {}, {}, {}]
                }}
            }}"#,
            dir.path().to_str().unwrap(),
            bounds.min_lon(),
            bounds.min_lat(),
            bounds.min_lon(),
            bounds.min_lat(),
        );
        let config: Config = serde_json::from_str(&json).unwrap();
        let source = FixedSource {
            data: VectorData::default(),
            calls: Cell::new(0),
        };

        run_pass(&config, &source, None, Some(7)).unwrap();
        assert!(dir.path().join("good").join("tiles.txt").exists());
        assert!(!dir.path().join("bad").exists());
    }
}
