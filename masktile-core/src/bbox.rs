//! Geodetic bounding boxes and the accepted input spellings.
//!
//! Configurations may spell a bounding box either as a flat
//! `[min_lon, min_lat, max_lon, max_lat]` list or as a named corner
//! mapping. Both forms normalise to the same canonical [`BoundingBox`]
//! before any tile arithmetic runs.

use serde::Deserialize;
use thiserror::Error;

/// Errors produced when normalising a bounding-box specification.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidBoundingBox {
    /// The flat list form did not have exactly four entries.
    #[error("bounding box list must have exactly four entries, got {0}")]
    WrongLength(usize),
    /// A coordinate was not a finite number within its valid range.
    #[error("{axis} {value} is outside the valid range")]
    OutOfRange {
        /// Which axis the offending value belongs to.
        axis: &'static str,
        /// The rejected value.
        value: f64,
    },
}

/// A canonical geodetic rectangle in degrees.
///
/// Immutable once constructed; the constructor normalises swapped
/// extremes so `min_lat <= max_lat` and `min_lon <= max_lon` always
/// hold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    min_lat: f64,
    min_lon: f64,
    max_lat: f64,
    max_lon: f64,
}

impl BoundingBox {
    /// Validates and constructs a [`BoundingBox`], swapping inverted
    /// extreme pairs.
    pub fn new(
        min_lat: f64,
        min_lon: f64,
        max_lat: f64,
        max_lon: f64,
    ) -> Result<Self, InvalidBoundingBox> {
        check_axis("latitude", min_lat, 90.0)?;
        check_axis("latitude", max_lat, 90.0)?;
        check_axis("longitude", min_lon, 180.0)?;
        check_axis("longitude", max_lon, 180.0)?;
        Ok(Self::from_extremes(min_lat, min_lon, max_lat, max_lon))
    }

    /// Constructs from values already known to be valid coordinates.
    pub(crate) fn from_extremes(a_lat: f64, a_lon: f64, b_lat: f64, b_lon: f64) -> Self {
        Self {
            min_lat: a_lat.min(b_lat),
            min_lon: a_lon.min(b_lon),
            max_lat: a_lat.max(b_lat),
            max_lon: a_lon.max(b_lon),
        }
    }

    /// Southern latitude extreme in degrees.
    pub fn min_lat(&self) -> f64 {
        self.min_lat
    }

    /// Western longitude extreme in degrees.
    pub fn min_lon(&self) -> f64 {
        self.min_lon
    }

    /// Northern latitude extreme in degrees.
    pub fn max_lat(&self) -> f64 {
        self.max_lat
    }

    /// Eastern longitude extreme in degrees.
    pub fn max_lon(&self) -> f64 {
        self.max_lon
    }
}

fn check_axis(axis: &'static str, value: f64, limit: f64) -> Result<(), InvalidBoundingBox> {
    if value.is_finite() && value.abs() <= limit {
        Ok(())
    } else {
        Err(InvalidBoundingBox::OutOfRange { axis, value })
    }
}

/// The raw forms a configuration may spell a bounding box in.
///
/// The corner mapping follows the historical convention: `tl`/`tr` hold
/// the latitude and longitude of one corner, `bl`/`br` the latitude and
/// longitude of the opposite one.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum BoundingBoxSpec {
    /// Flat `[min_lon, min_lat, max_lon, max_lat]` list.
    Edges(Vec<f64>),
    /// Named corner mapping.
    Corners {
        /// Latitude of the first corner.
        tl: f64,
        /// Longitude of the first corner.
        tr: f64,
        /// Latitude of the opposite corner.
        bl: f64,
        /// Longitude of the opposite corner.
        br: f64,
    },
}

impl TryFrom<BoundingBoxSpec> for BoundingBox {
    type Error = InvalidBoundingBox;

    fn try_from(spec: BoundingBoxSpec) -> Result<Self, Self::Error> {
        match spec {
            BoundingBoxSpec::Edges(values) => match values.as_slice() {
                &[min_lon, min_lat, max_lon, max_lat] => {
                    Self::new(min_lat, min_lon, max_lat, max_lon)
                }
                other => Err(InvalidBoundingBox::WrongLength(other.len())),
            },
            BoundingBoxSpec::Corners { tl, tr, bl, br } => Self::new(tl, tr, bl, br),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn list_form_normalises_to_canonical_order() {
        let spec = BoundingBoxSpec::Edges(vec![11.0, 43.5, 10.0, 43.0]);
        let bbox = BoundingBox::try_from(spec).unwrap();
        assert_eq!(bbox.min_lon(), 10.0);
        assert_eq!(bbox.max_lon(), 11.0);
        assert_eq!(bbox.min_lat(), 43.0);
        assert_eq!(bbox.max_lat(), 43.5);
    }

    #[rstest]
    #[case(0)]
    #[case(3)]
    #[case(5)]
    fn list_form_rejects_wrong_length(#[case] len: usize) {
        let spec = BoundingBoxSpec::Edges(vec![1.0; len]);
        assert_eq!(
            BoundingBox::try_from(spec),
            Err(InvalidBoundingBox::WrongLength(len))
        );
    }

    #[rstest]
    fn corner_form_matches_list_form() {
        let corners = BoundingBoxSpec::Corners {
            tl: 47.2228679539,
            tr: 8.8183594613,
            bl: 47.2234162581,
            br: 8.819253978,
        };
        let edges = BoundingBoxSpec::Edges(vec![8.8183594613, 47.2228679539, 8.819253978, 47.2234162581]);
        assert_eq!(
            BoundingBox::try_from(corners).unwrap(),
            BoundingBox::try_from(edges).unwrap()
        );
    }

    #[rstest]
    #[case(91.0, 0.0)]
    #[case(f64::NAN, 0.0)]
    #[case(0.0, -180.5)]
    #[case(0.0, f64::INFINITY)]
    fn out_of_range_coordinates_are_rejected(#[case] lat: f64, #[case] lon: f64) {
        assert!(matches!(
            BoundingBox::new(lat, lon, 0.0, 0.0),
            Err(InvalidBoundingBox::OutOfRange { .. })
        ));
    }

    #[test]
    fn corner_spec_deserialises_from_json_object() {
        let spec: BoundingBoxSpec =
            serde_json::from_str(r#"{"tl": 47.0, "tr": 8.0, "bl": 47.1, "br": 8.1}"#).unwrap();
        assert!(matches!(spec, BoundingBoxSpec::Corners { .. }));
    }
}
