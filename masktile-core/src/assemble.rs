//! Assembly of tagged planar shapes from raw features.
//!
//! Relations become multi-ring polygons: `outer` member ways
//! concatenate into the exterior ring, every other role becomes a hole.
//! Leftover ways either form plain closed polygons or, for highways,
//! buffered bands whose width depends on the road class. All output is
//! in one tile's local pixel space.

use std::collections::{HashMap, HashSet};

use geo::{BooleanOps, Coord, LineString, MultiPolygon, Polygon};
use log::{debug, warn};

use crate::osm::{Relation, TagQuery, VectorData, Way};
use crate::tile::Tile;

/// Immutable lookup from highway class to rendered band width in
/// pixels.
///
/// A class mapped to zero renders nothing; a class absent from the
/// table is reported and skipped. Passed into the assembler rather than
/// held as shared state, so differing runs can carry differing tables.
#[derive(Debug, Clone, PartialEq)]
pub struct HighwayWidths(HashMap<String, f64>);

impl Default for HighwayWidths {
    fn default() -> Self {
        let classes = [
            ("motorway", 11.0),
            ("trunk", 11.0),
            ("primary", 8.0),
            ("secondary", 8.0),
            ("tertiary", 6.0),
            ("unclassified", 5.0),
            ("residential", 5.0),
            ("living_street", 5.0),
            ("service", 4.0),
            ("track", 3.0),
            ("cycleway", 2.0),
            ("path", 1.0),
            ("footway", 0.0),
        ];
        Self(
            classes
                .into_iter()
                .map(|(class, width)| (class.to_owned(), width))
                .collect(),
        )
    }
}

impl HighwayWidths {
    /// Band width in pixels for a highway class, if the class is known.
    pub fn width(&self, class: &str) -> Option<f64> {
        self.0.get(class).copied()
    }
}

impl FromIterator<(String, f64)> for HighwayWidths {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Builds tile-local polygon sets from the raw features of one
/// bounding box.
#[derive(Debug, Clone, Copy)]
pub struct Assembler<'a> {
    widths: &'a HighwayWidths,
    tile: Tile,
    tile_size: u32,
}

impl<'a> Assembler<'a> {
    /// Creates an assembler for one tile.
    pub fn new(widths: &'a HighwayWidths, tile: Tile, tile_size: u32) -> Self {
        Self {
            widths,
            tile,
            tile_size,
        }
    }

    /// Produces every shape matching the query, projected into the
    /// tile's local pixel space.
    ///
    /// Ways consumed as relation members are excluded from the
    /// standalone pass. A shape that cannot be built is dropped; the
    /// remaining shapes are always assembled.
    pub fn assemble(&self, data: &VectorData, query: &TagQuery) -> Vec<Polygon<f64>> {
        let mut shapes = Vec::new();
        let mut handled: HashSet<i64> = HashSet::new();
        let ways_by_id: HashMap<i64, &Way> =
            data.ways.iter().map(|way| (way.id, way)).collect();

        for relation in data.relations.iter().filter(|r| query.matches(&r.tags)) {
            if let Some(polygon) = self.relation_polygon(&ways_by_id, relation, &mut handled) {
                shapes.push(polygon);
            }
        }

        for way in data.ways.iter().filter(|w| query.matches(&w.tags)) {
            if handled.contains(&way.id) {
                continue;
            }
            shapes.extend(self.way_shapes(way));
        }

        shapes
    }

    /// One multi-ring polygon from a relation's members, or `None` when
    /// the exterior cannot be formed.
    fn relation_polygon(
        &self,
        ways_by_id: &HashMap<i64, &Way>,
        relation: &Relation,
        handled: &mut HashSet<i64>,
    ) -> Option<Polygon<f64>> {
        let mut exterior: Vec<Coord<f64>> = Vec::new();
        let mut interiors: Vec<LineString<f64>> = Vec::new();

        for member in &relation.members {
            let Some(&way) = ways_by_id.get(&member.way) else {
                debug!(
                    "relation {}: member way {} not present in the data",
                    relation.id, member.way
                );
                continue;
            };
            handled.insert(way.id);
            let ring = self.project(way);
            if member.role == "outer" {
                exterior.extend(ring);
            } else {
                interiors.push(LineString::from(ring));
            }
        }

        if exterior.len() < 3 {
            warn!(
                "dropping relation {}: exterior ring has only {} points",
                relation.id,
                exterior.len()
            );
            return None;
        }
        Some(Polygon::new(LineString::from(exterior), interiors))
    }

    /// Shapes for a standalone way: a buffered band for recognised
    /// highways, otherwise one closed polygon.
    fn way_shapes(&self, way: &Way) -> Vec<Polygon<f64>> {
        if let Some(class) = way.tags.get("highway") {
            if way.tags.contains_key("tunnel") {
                debug!("skipping tunnel way {}", way.id);
                return Vec::new();
            }
            let Some(width) = self.widths.width(class) else {
                warn!("unknown highway class {class:?} on way {}, skipping", way.id);
                return Vec::new();
            };
            if width <= 0.0 {
                return Vec::new();
            }
            let line = self.project(way);
            return buffer_polyline(&line, width / 2.0).0;
        }

        let ring = self.project(way);
        if ring.len() < 3 {
            warn!(
                "dropping way {}: only {} points, cannot close a ring",
                way.id,
                ring.len()
            );
            return Vec::new();
        }
        vec![Polygon::new(LineString::from(ring), Vec::new())]
    }

    fn project(&self, way: &Way) -> Vec<Coord<f64>> {
        way.points
            .iter()
            .map(|point| self.tile.local_pixel(point.y, point.x, self.tile_size))
            .collect()
    }
}

/// Inflates an open polyline into an area band reaching `half` pixels
/// out on each side.
///
/// Each segment contributes a rectangle; a square patch at every vertex
/// closes the joints between consecutive segments and caps the ends.
fn buffer_polyline(points: &[Coord<f64>], half: f64) -> MultiPolygon<f64> {
    let mut band: Option<MultiPolygon<f64>> = None;
    let mut add = |polygon: Polygon<f64>| {
        let piece = MultiPolygon::new(vec![polygon]);
        band = Some(match band.take() {
            Some(existing) => existing.union(&piece),
            None => piece,
        });
    };

    for pair in points.windows(2) {
        if let Some(quad) = segment_quad(pair[0], pair[1], half) {
            add(quad);
        }
    }
    for &vertex in points {
        add(vertex_patch(vertex, half));
    }

    band.unwrap_or_else(|| MultiPolygon::new(Vec::new()))
}

/// Rectangle of half-width `half` along one segment, or `None` for a
/// zero-length segment.
fn segment_quad(a: Coord<f64>, b: Coord<f64>, half: f64) -> Option<Polygon<f64>> {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length = dx.hypot(dy);
    if length == 0.0 {
        return None;
    }
    let nx = -dy / length * half;
    let ny = dx / length * half;
    Some(Polygon::new(
        LineString::from(vec![
            Coord { x: a.x + nx, y: a.y + ny },
            Coord { x: b.x + nx, y: b.y + ny },
            Coord { x: b.x - nx, y: b.y - ny },
            Coord { x: a.x - nx, y: a.y - ny },
        ]),
        Vec::new(),
    ))
}

fn vertex_patch(v: Coord<f64>, half: f64) -> Polygon<f64> {
    Polygon::new(
        LineString::from(vec![
            Coord { x: v.x - half, y: v.y - half },
            Coord { x: v.x + half, y: v.y - half },
            Coord { x: v.x + half, y: v.y + half },
            Coord { x: v.x - half, y: v.y + half },
        ]),
        Vec::new(),
    )
}
