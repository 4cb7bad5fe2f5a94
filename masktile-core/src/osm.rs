//! Raw vector features as handed over by the data source.
//!
//! Ways arrive with their node references already resolved to geodetic
//! coordinates (`x = longitude`, `y = latitude`); relations reference
//! ways by id together with a member role.

use std::collections::HashMap;

use geo::Coord;

/// String key/value tags attached to a feature.
pub type Tags = HashMap<String, String>;

/// A geodetic point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

impl Node {
    /// The point as a coordinate with `x = longitude`, `y = latitude`.
    pub fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.lon,
            y: self.lat,
        }
    }
}

/// An ordered polyline of geodetic points with tags.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Way {
    /// Stable id, used to deduplicate ways consumed as relation members.
    pub id: i64,
    /// Key/value tags.
    pub tags: Tags,
    /// Resolved node coordinates, `x = longitude`, `y = latitude`.
    pub points: Vec<Coord<f64>>,
}

/// One member of a relation: a way reference plus its role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationMember {
    /// Id of the referenced way.
    pub way: i64,
    /// Member role; `"outer"` contributes to the exterior ring, every
    /// other role becomes an interior ring.
    pub role: String,
}

/// A grouping of ways with roles, expressing a multi-ring polygon.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Relation {
    /// Stable id.
    pub id: i64,
    /// Key/value tags.
    pub tags: Tags,
    /// Member ways with roles.
    pub members: Vec<RelationMember>,
}

/// The feature set returned for one bounding box query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VectorData {
    /// All ways, including those only referenced by relations.
    pub ways: Vec<Way>,
    /// All relations.
    pub relations: Vec<Relation>,
}

impl VectorData {
    /// Looks a way up by id. Linear scan, meant for one-off lookups;
    /// bulk member resolution builds an id index instead.
    pub fn way(&self, id: i64) -> Option<&Way> {
        self.ways.iter().find(|way| way.id == id)
    }

    /// True when the data contains no features at all.
    pub fn is_empty(&self) -> bool {
        self.ways.is_empty() && self.relations.is_empty()
    }
}

/// A feature filter parsed from `"key"` or `"key=value"`.
///
/// The label of the rendered mask is the value when a pair was given,
/// otherwise the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagQuery {
    key: String,
    value: Option<String>,
}

impl TagQuery {
    /// Parses a query from its textual form.
    pub fn parse(text: &str) -> Self {
        match text.split_once('=') {
            Some((key, value)) => Self {
                key: key.trim().to_owned(),
                value: Some(value.trim().to_owned()),
            },
            None => Self {
                key: text.trim().to_owned(),
                value: None,
            },
        }
    }

    /// The tag key the query filters on.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The required tag value, if the query named one.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// The name under which the resulting mask is filed.
    pub fn label(&self) -> &str {
        self.value.as_deref().unwrap_or(&self.key)
    }

    /// True when a feature's tags satisfy the query.
    pub fn matches(&self, tags: &Tags) -> bool {
        match (&self.value, tags.get(&self.key)) {
            (Some(wanted), Some(actual)) => wanted == actual,
            (None, Some(_)) => true,
            (_, None) => false,
        }
    }
}

impl std::fmt::Display for TagQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={value}", self.key),
            None => f.write_str(&self.key),
        }
    }
}
