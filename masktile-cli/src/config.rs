//! The JSON batch configuration.
//!
//! A configuration names bounding boxes, the zoom levels to process
//! them at, the tags to render masks for, and where the output goes.
//! Example:
//!
//! ```json
//! {
//!   "options": {
//!     "target_dir": "./output",
//!     "zoom_levels": [18],
//!     "separate_instances": false
//!   },
//!   "query": { "tags": ["building", "highway"] },
//!   "boundingboxes": {
//!     "rapperswil": [8.8183594613, 47.2228679539, 8.819253978, 47.2234162581]
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use masktile_core::{BoundingBoxSpec, DEFAULT_IMAGE_WIDTH, MaskMode};
use serde::Deserialize;
use thiserror::Error;

/// Highest accepted zoom level. The tile arithmetic shifts
/// `1u32 << zoom`, and no aerial imagery layer goes deeper anyway.
const MAX_ZOOM: u8 = 23;

/// Errors raised while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read configuration {path:?}: {source}")]
    Io {
        /// Configuration file path.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The file was not a valid configuration document.
    #[error("failed to parse configuration {path:?}: {source}")]
    Parse {
        /// Configuration file path.
        path: PathBuf,
        /// Underlying decode failure.
        #[source]
        source: serde_json::Error,
    },
    /// No bounding boxes were specified.
    #[error("no 'boundingboxes' were specified in the configuration")]
    NoBoundingBoxes,
    /// A zoom level is deeper than the tiling scheme supports.
    #[error("zoom level {zoom} is out of range; the deepest supported level is 23")]
    ZoomOutOfRange {
        /// The rejected zoom level.
        zoom: u8,
    },
    /// A bounding box has no zoom levels, neither its own nor global.
    #[error("neither the configuration nor bounding box {name:?} specify any zoom levels")]
    NoZoomLevels {
        /// Name of the offending bounding box.
        name: String,
    },
}

/// A parsed and validated batch configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Global processing options.
    #[serde(default)]
    pub options: Options,
    /// The tag queries to render masks for.
    #[serde(default)]
    pub query: Query,
    /// Named bounding boxes to process.
    pub boundingboxes: BTreeMap<String, BoundingBoxEntry>,
}

/// Global processing options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Root output directory.
    pub target_dir: PathBuf,
    /// Zoom levels applied to boxes without their own override.
    pub zoom_levels: Vec<u8>,
    /// Render with instance separation instead of merging.
    pub separate_instances: bool,
    /// Mask (and imagery) edge length in pixels.
    pub image_width: u32,
    /// Alternative Overpass interpreter endpoint.
    pub overpass_endpoint: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            target_dir: PathBuf::from("."),
            zoom_levels: Vec::new(),
            separate_instances: false,
            image_width: DEFAULT_IMAGE_WIDTH,
            overpass_endpoint: None,
        }
    }
}

impl Options {
    /// The rendering mode the options ask for.
    pub fn mode(&self) -> MaskMode {
        if self.separate_instances {
            MaskMode::InstanceSeparated
        } else {
            MaskMode::Merged
        }
    }
}

/// The tag filter section.
#[derive(Debug, Clone, Deserialize)]
pub struct Query {
    /// Tags to render, each `"key"` or `"key=value"`.
    #[serde(default = "default_tags")]
    pub tags: Vec<String>,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            tags: default_tags(),
        }
    }
}

fn default_tags() -> Vec<String> {
    vec!["building".to_owned()]
}

/// One named bounding box: either the flat list form or the corner
/// mapping, the latter optionally carrying its own zoom levels.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BoundingBoxEntry {
    /// `[min_lon, min_lat, max_lon, max_lat]`.
    List(Vec<f64>),
    /// Corner mapping with an optional per-box zoom override.
    Detailed {
        /// Latitude of the first corner.
        tl: f64,
        /// Longitude of the first corner.
        tr: f64,
        /// Latitude of the opposite corner.
        bl: f64,
        /// Longitude of the opposite corner.
        br: f64,
        /// Zoom levels overriding the global list.
        #[serde(default)]
        zoom_levels: Option<Vec<u8>>,
    },
}

impl BoundingBoxEntry {
    /// The entry as a core bounding-box specification.
    pub fn spec(&self) -> BoundingBoxSpec {
        match self {
            Self::List(values) => BoundingBoxSpec::Edges(values.clone()),
            Self::Detailed { tl, tr, bl, br, .. } => BoundingBoxSpec::Corners {
                tl: *tl,
                tr: *tr,
                bl: *bl,
                br: *br,
            },
        }
    }

    /// The per-box zoom override, when present.
    pub fn zoom_levels(&self) -> Option<&[u8]> {
        match self {
            Self::List(_) => None,
            Self::Detailed { zoom_levels, .. } => zoom_levels.as_deref(),
        }
    }

    /// Effective zoom levels given the global list.
    pub fn effective_zoom_levels<'a>(&'a self, global: &'a [u8]) -> &'a [u8] {
        self.zoom_levels().unwrap_or(global)
    }
}

impl Config {
    /// Loads and validates a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.boundingboxes.is_empty() {
            return Err(ConfigError::NoBoundingBoxes);
        }
        check_zoom_levels(&self.options.zoom_levels)?;
        for (name, entry) in &self.boundingboxes {
            let levels = entry.effective_zoom_levels(&self.options.zoom_levels);
            if levels.is_empty() {
                return Err(ConfigError::NoZoomLevels { name: name.clone() });
            }
            check_zoom_levels(levels)?;
        }
        Ok(())
    }
}

fn check_zoom_levels(levels: &[u8]) -> Result<(), ConfigError> {
    match levels.iter().find(|&&zoom| zoom > MAX_ZOOM) {
        Some(&zoom) => Err(ConfigError::ZoomOutOfRange { zoom }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use masktile_core::BoundingBox;
    use rstest::rstest;

    fn parse(json: &str) -> Config {
        let config: Config = serde_json::from_str(json).unwrap();
        config.validate().unwrap();
        config
    }

    #[test]
    fn minimal_configuration_applies_defaults() {
        let config = parse(
            r#"{
                "options": {"zoom_levels": [18]},
                "boundingboxes": {"empty": [11, 43, 10, 43]}
            }"#,
        );
        assert_eq!(config.query.tags, vec!["building".to_owned()]);
        assert_eq!(config.options.image_width, 256);
        assert!(!config.options.separate_instances);
        assert_eq!(config.options.mode(), MaskMode::Merged);
    }

    #[test]
    fn list_entry_converts_to_bounding_box() {
        let config = parse(
            r#"{
                "options": {"zoom_levels": [18]},
                "boundingboxes": {
                    "single_building": [8.8183594613, 47.2228679539, 8.819253978, 47.2234162581]
                }
            }"#,
        );
        let entry = &config.boundingboxes["single_building"];
        let bbox = BoundingBox::try_from(entry.spec()).unwrap();
        assert!((bbox.min_lon() - 8.8183594613).abs() < 1e-12);
        assert!((bbox.max_lat() - 47.2234162581).abs() < 1e-12);
    }

    #[test]
    fn corner_entry_carries_its_own_zoom_levels() {
        let config = parse(
            r#"{
                "options": {"zoom_levels": [17]},
                "boundingboxes": {
                    "city": {"tl": 47.0, "tr": 8.0, "bl": 47.1, "br": 8.1, "zoom_levels": [18, 19]}
                }
            }"#,
        );
        let entry = &config.boundingboxes["city"];
        assert_eq!(entry.effective_zoom_levels(&config.options.zoom_levels), &[18, 19]);
    }

    #[rstest]
    #[case(r#"{"boundingboxes": {}}"#)]
    fn missing_bounding_boxes_is_rejected(#[case] json: &str) {
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NoBoundingBoxes)
        ));
    }

    #[test]
    fn missing_zoom_levels_anywhere_is_rejected() {
        let config: Config = serde_json::from_str(
            r#"{"boundingboxes": {"city": [8.0, 47.0, 8.1, 47.1]}}"#,
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NoZoomLevels { name }) if name == "city"
        ));
    }

    #[rstest]
    #[case::global(r#"{"options": {"zoom_levels": [40]}, "boundingboxes": {"city": [8.0, 47.0, 8.1, 47.1]}}"#)]
    #[case::per_box(r#"{"options": {"zoom_levels": [18]}, "boundingboxes": {"city": {"tl": 47.0, "tr": 8.0, "bl": 47.1, "br": 8.1, "zoom_levels": [40]}}}"#)]
    fn zoom_levels_beyond_the_tiling_scheme_are_rejected(#[case] json: &str) {
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZoomOutOfRange { zoom: 40 })
        ));
    }

    #[test]
    fn deepest_supported_zoom_level_is_accepted() {
        parse(
            r#"{
                "options": {"zoom_levels": [23]},
                "boundingboxes": {"city": [8.0, 47.0, 8.1, 47.1]}
            }"#,
        );
    }

    #[test]
    fn separate_instances_selects_instance_mode() {
        let config = parse(
            r#"{
                "options": {"zoom_levels": [18], "separate_instances": true},
                "boundingboxes": {"city": [8.0, 47.0, 8.1, 47.1]}
            }"#,
        );
        assert_eq!(config.options.mode(), MaskMode::InstanceSeparated);
    }

    #[test]
    fn wrong_length_list_surfaces_as_invalid_bounding_box() {
        let config = parse(
            r#"{
                "options": {"zoom_levels": [18]},
                "boundingboxes": {"bad": [8.0, 47.0, 8.1]}
            }"#,
        );
        let entry = &config.boundingboxes["bad"];
        assert!(BoundingBox::try_from(entry.spec()).is_err());
    }
}
