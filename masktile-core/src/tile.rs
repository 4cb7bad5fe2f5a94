//! Web Mercator tile arithmetic.
//!
//! Tiles are addressed in XYZ (Google) indexing internally: `x` grows
//! eastward, `y` grows southward, matching raster conventions. The TMS
//! row used in output names and the Bing quadkey are derived views.
//! All pixel math takes the tile edge length as a parameter; it equals
//! the configured mask width (256 or 512).

use std::f64::consts::PI;

use geo::Coord;

use crate::bbox::BoundingBox;

/// Latitude limit of the Web Mercator projection in degrees.
const LAT_LIMIT: f64 = 85.051_128_78;

/// A square raster region addressed by `(zoom, x, y)`.
///
/// Two tiles with equal coordinates are interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tile {
    /// Zoom level; the scheme holds `2^zoom × 2^zoom` tiles.
    pub zoom: u8,
    /// Column, growing eastward from the antimeridian.
    pub x: u32,
    /// Row in XYZ indexing, growing southward from the north edge.
    pub y: u32,
}

impl Tile {
    /// Returns the tile containing a geodetic point.
    pub fn at(lat: f64, lon: f64, zoom: u8) -> Self {
        let n = tile_count(zoom);
        let scale = f64::from(n);
        let x = (lon + 180.0) / 360.0 * scale;
        let lat_rad = lat.clamp(-LAT_LIMIT, LAT_LIMIT).to_radians();
        let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * scale;
        Self {
            zoom,
            x: (x.floor() as u32).min(n - 1),
            y: (y.floor() as u32).min(n - 1),
        }
    }

    /// The `(x, y)` pair in TMS indexing, where the row grows northward.
    pub fn tms(&self) -> (u32, u32) {
        (self.x, tile_count(self.zoom) - 1 - self.y)
    }

    /// Deterministic `{zoom}_{tms_x}_{tms_y}` key used for output files
    /// and the tile registry.
    pub fn name(&self) -> String {
        let (tms_x, tms_y) = self.tms();
        format!("{}_{}_{}", self.zoom, tms_x, tms_y)
    }

    /// Bing-style quadkey addressing for the imagery collaborator.
    pub fn quadkey(&self) -> String {
        let mut key = String::with_capacity(usize::from(self.zoom));
        for i in (1..=self.zoom).rev() {
            let mask = 1u32 << (i - 1);
            let mut digit = 0u8;
            if self.x & mask != 0 {
                digit += 1;
            }
            if self.y & mask != 0 {
                digit += 2;
            }
            key.push(char::from(b'0' + digit));
        }
        key
    }

    /// Geodetic bounding box of this tile.
    pub fn bounds(&self) -> BoundingBox {
        let scale = f64::from(tile_count(self.zoom));
        let west = f64::from(self.x) / scale * 360.0 - 180.0;
        let east = f64::from(self.x + 1) / scale * 360.0 - 180.0;
        let north = row_edge_latitude(f64::from(self.y), scale);
        let south = row_edge_latitude(f64::from(self.y + 1), scale);
        BoundingBox::from_extremes(south, west, north, east)
    }

    /// Absolute pixel coordinate of the tile's top-left corner.
    pub fn pixel_origin(&self, tile_size: u32) -> (f64, f64) {
        let size = f64::from(tile_size);
        (f64::from(self.x) * size, f64::from(self.y) * size)
    }

    /// Projects a geodetic point into this tile's local pixel space.
    ///
    /// The origin is the tile's top-left pixel and `y` increases
    /// downward, so a higher latitude maps to a smaller local `y`.
    pub fn local_pixel(&self, lat: f64, lon: f64, tile_size: u32) -> Coord<f64> {
        let (gx, gy) = global_pixel(lat, lon, self.zoom, tile_size);
        let (ox, oy) = self.pixel_origin(tile_size);
        Coord {
            x: gx - ox,
            y: gy - oy,
        }
    }
}

/// Number of tiles along one axis at a zoom level.
fn tile_count(zoom: u8) -> u32 {
    debug_assert!(zoom < 31, "zoom level out of range");
    1u32 << zoom
}

/// Latitude of a horizontal tile-row edge, `row` in `[0, scale]`.
fn row_edge_latitude(row: f64, scale: f64) -> f64 {
    (PI * (1.0 - 2.0 * row / scale)).sinh().atan().to_degrees()
}

/// Absolute pixel coordinate of a geodetic point at a zoom level.
///
/// `x` grows eastward and `y` grows southward from the projection's
/// north-west corner.
pub fn global_pixel(lat: f64, lon: f64, zoom: u8, tile_size: u32) -> (f64, f64) {
    let world = f64::from(tile_count(zoom)) * f64::from(tile_size);
    let x = (lon + 180.0) / 360.0 * world;
    let lat_rad = lat.clamp(-LAT_LIMIT, LAT_LIMIT).to_radians();
    let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * world;
    (x, y)
}

/// Inverse of [`global_pixel`]: geodetic `(lat, lon)` of an absolute
/// pixel coordinate.
pub fn geodetic(x: f64, y: f64, zoom: u8, tile_size: u32) -> (f64, f64) {
    let world = f64::from(tile_count(zoom)) * f64::from(tile_size);
    let lon = x / world * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y / world)).sinh().atan().to_degrees();
    (lat, lon)
}

/// Enumerates every tile touched by a bounding box at a zoom level.
///
/// The tiles at the two corners bound an inclusive rectangle of integer
/// tile coordinates; the result covers that rectangle row-major with no
/// gaps.
pub fn tiles_for_bbox(bbox: &BoundingBox, zoom: u8) -> Vec<Tile> {
    let a = Tile::at(bbox.min_lat(), bbox.min_lon(), zoom);
    let b = Tile::at(bbox.max_lat(), bbox.max_lon(), zoom);
    let (x_min, x_max) = (a.x.min(b.x), a.x.max(b.x));
    let (y_min, y_max) = (a.y.min(b.y), a.y.max(b.y));
    let mut tiles = Vec::with_capacity(
        ((x_max - x_min + 1) as usize) * ((y_max - y_min + 1) as usize),
    );
    for y in y_min..=y_max {
        for x in x_min..=x_max {
            tiles.push(Tile { zoom, x, y });
        }
    }
    tiles
}
