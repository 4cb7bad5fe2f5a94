//! Fixed-size binary label rasters and the painting rules.
//!
//! A [`Mask`] is a `width × width` single-channel byte grid: 0 for
//! background, 255 for labelled pixels. Painting clips each polygon to
//! the tile rectangle, then composites it under one of two modes:
//!
//! - **merged** — the filled exterior overwrites with 255 and the holes
//!   carve back to 0; overlapping shapes fuse into one silhouette.
//! - **instance-separated** — outline and fill compose via bit-XOR, so
//!   two shapes sharing a boundary keep a zeroed seam between them and
//!   stay visually distinguishable without an instance-id channel.

use std::path::Path;

use geo::{BooleanOps, Coord, LineString, Polygon, Rect};
use image::{GrayImage, Luma};
use imageproc::drawing::{draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point;
use log::debug;

/// Byte value of a labelled pixel.
const LABEL: u8 = 255;

/// How overlapping shapes compose on a mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaskMode {
    /// Shapes overwrite; adjoining shapes merge into one region.
    #[default]
    Merged,
    /// Outline and fill XOR into the mask, leaving seams between
    /// adjoining shapes.
    InstanceSeparated,
}

/// A square single-channel label raster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    image: GrayImage,
}

impl Mask {
    /// A fresh all-background mask of `width × width` pixels.
    pub fn new(width: u32) -> Self {
        Self {
            image: GrayImage::new(width, width),
        }
    }

    /// Edge length in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// True when no pixel is labelled; the signal that a tile needs no
    /// imagery or persistence.
    pub fn is_empty(&self) -> bool {
        self.image.as_raw().iter().all(|&byte| byte == 0)
    }

    /// Value of one pixel.
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.image.get_pixel(x, y)[0]
    }

    /// The underlying raster.
    pub fn as_image(&self) -> &GrayImage {
        &self.image
    }

    /// Encodes the mask as an 8-bit greyscale PNG.
    pub fn write_png(&self, path: &Path) -> image::ImageResult<()> {
        self.image.save(path)
    }

    /// Paints one polygon, given in this mask's pixel space.
    ///
    /// The polygon is clipped to the mask rectangle first; the clip's
    /// boolean sweep also resolves self-intersecting input, so a
    /// degenerate shape either comes out repaired or renders nothing.
    /// When the clip splits a shape into several disjoint parts, the
    /// parts are painted with instance separation forced, so fragments
    /// of one source shape never silently fuse with a neighbour.
    ///
    /// Decomposition runs over an explicit worklist; a malformed
    /// polygon degrades to "not rendered" and never aborts the tile.
    pub fn paint(&mut self, polygon: Polygon<f64>, mode: MaskMode) {
        let extent = f64::from(self.width());
        let window = Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: extent, y: extent })
            .to_polygon();

        let mut work: Vec<(Polygon<f64>, MaskMode)> = vec![(polygon, mode)];
        while let Some((shape, shape_mode)) = work.pop() {
            let mut parts: Vec<Polygon<f64>> = shape.intersection(&window).into_iter().collect();
            match parts.len() {
                0 => debug!("shape clipped away entirely"),
                1 => {
                    if let Some(part) = parts.pop() {
                        self.render(&part, shape_mode);
                    }
                }
                _ => {
                    for part in parts {
                        work.push((part, MaskMode::InstanceSeparated));
                    }
                }
            }
        }
    }

    /// Rasterizes one clipped, validity-resolved polygon.
    fn render(&mut self, polygon: &Polygon<f64>, mode: MaskMode) {
        let width = self.width();
        let Some(exterior) = ring_points(polygon.exterior()) else {
            debug!("degenerate exterior ring skipped");
            return;
        };

        let mut outline = GrayImage::new(width, width);
        let mut fill = GrayImage::new(width, width);
        draw_polygon_mut(&mut fill, &exterior, Luma([LABEL]));
        draw_ring(&mut outline, &exterior, Luma([LABEL]));
        // The boundary belongs to the outline scratch alone, so the
        // XOR passes never flip a boundary pixel twice.
        draw_ring(&mut fill, &exterior, Luma([0]));

        let mut holes = GrayImage::new(width, width);
        for ring in polygon.interiors() {
            if let Some(points) = ring_points(ring) {
                draw_polygon_mut(&mut holes, &points, Luma([LABEL]));
            }
        }

        match mode {
            MaskMode::Merged => {
                for ((pixel, o), f) in self
                    .image
                    .iter_mut()
                    .zip(outline.iter())
                    .zip(fill.iter())
                {
                    if *o != 0 || *f != 0 {
                        *pixel = LABEL;
                    }
                }
                for (pixel, h) in self.image.iter_mut().zip(holes.iter()) {
                    if *h != 0 {
                        *pixel = 0;
                    }
                }
            }
            MaskMode::InstanceSeparated => {
                for (((pixel, o), f), h) in self
                    .image
                    .iter_mut()
                    .zip(outline.iter())
                    .zip(fill.iter())
                    .zip(holes.iter())
                {
                    if *o != 0 {
                        *pixel ^= LABEL;
                    }
                    if *f != 0 {
                        *pixel ^= LABEL;
                    }
                    if *h != 0 {
                        *pixel ^= LABEL;
                    }
                }
            }
        }
    }
}

/// A ring as an open integer pixel path, or `None` when fewer than
/// three distinct vertices remain after rounding.
fn ring_points(ring: &LineString<f64>) -> Option<Vec<Point<i32>>> {
    let mut points: Vec<Point<i32>> = Vec::with_capacity(ring.0.len());
    for coord in &ring.0 {
        let point = Point::new(coord.x.round() as i32, coord.y.round() as i32);
        if points.last() != Some(&point) {
            points.push(point);
        }
    }
    while points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    (points.len() >= 3).then_some(points)
}

/// Draws every ring segment, including the closing one.
fn draw_ring(image: &mut GrayImage, points: &[Point<i32>], colour: Luma<u8>) {
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        draw_line_segment_mut(
            image,
            (a.x as f32, a.y as f32),
            (b.x as f32, b.y as f32),
            colour,
        );
    }
}
