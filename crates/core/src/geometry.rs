//! Uniform page geometry derived from the optimized image set.

use serde::{Deserialize, Serialize};

use crate::error::GeometryError;

/// PostScript points per inch.
pub const POINTS_PER_INCH: f64 = 72.0;

/// One page size shared by every page of a run, in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub avg_width_px: f64,
    pub avg_height_px: f64,
    pub dpi: f64,
    pub width_pt: f64,
    pub height_pt: f64,
}

/// Where an image is drawn on the page, in points from the lower-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PageGeometry {
    /// Average the pixel dimensions and convert them to points at `dpi`.
    pub fn from_dimensions(dimensions: &[(u32, u32)], dpi: f64) -> Result<Self, GeometryError> {
        if dimensions.is_empty() {
            return Err(GeometryError::EmptyBatch);
        }
        let count = dimensions.len() as f64;
        let total_w: u64 = dimensions.iter().map(|&(w, _)| w as u64).sum();
        let total_h: u64 = dimensions.iter().map(|&(_, h)| h as u64).sum();
        let avg_width_px = total_w as f64 / count;
        let avg_height_px = total_h as f64 / count;

        Ok(Self {
            avg_width_px,
            avg_height_px,
            dpi,
            width_pt: avg_width_px * POINTS_PER_INCH / dpi,
            height_pt: avg_height_px * POINTS_PER_INCH / dpi,
        })
    }

    /// Fit an image of `width` x `height` pixels inside the page, preserving
    /// aspect ratio and centring it. The limiting axis is covered edge to
    /// edge; the other axis is letterboxed.
    pub fn fit_image(&self, width: u32, height: u32) -> Placement {
        if width == 0 || height == 0 {
            return Placement {
                x: 0.0,
                y: 0.0,
                width: self.width_pt,
                height: self.height_pt,
            };
        }
        let scale = (self.width_pt / width as f64).min(self.height_pt / height as f64);
        let drawn_w = width as f64 * scale;
        let drawn_h = height as f64 * scale;
        Placement {
            x: (self.width_pt - drawn_w) / 2.0,
            y: (self.height_pt - drawn_h) / 2.0,
            width: drawn_w,
            height: drawn_h,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn averages_and_converts_at_200_dpi() {
        let g = PageGeometry::from_dimensions(&[(800, 600), (800, 1000)], 200.0).unwrap();
        assert!(approx(g.avg_width_px, 800.0));
        assert!(approx(g.avg_height_px, 800.0));
        assert!(approx(g.width_pt, 288.0));
        assert!(approx(g.height_pt, 288.0));
    }

    #[test]
    fn fractional_average() {
        let g = PageGeometry::from_dimensions(&[(800, 600), (801, 600)], 72.0).unwrap();
        assert!(approx(g.avg_width_px, 800.5));
        assert!(approx(g.width_pt, 800.5));
    }

    #[test]
    fn empty_batch_is_an_error() {
        let err = PageGeometry::from_dimensions(&[], 200.0).unwrap_err();
        assert!(matches!(err, GeometryError::EmptyBatch));
    }

    #[test]
    fn fit_matching_aspect_covers_page() {
        let g = PageGeometry::from_dimensions(&[(800, 800)], 200.0).unwrap();
        let p = g.fit_image(400, 400);
        assert!(approx(p.width, 288.0) && approx(p.height, 288.0));
        assert!(approx(p.x, 0.0) && approx(p.y, 0.0));
    }

    #[test]
    fn fit_tall_image_is_pillarboxed_and_centred() {
        let g = PageGeometry::from_dimensions(&[(800, 800)], 200.0).unwrap();
        let p = g.fit_image(400, 800);
        assert!(approx(p.height, 288.0));
        assert!(approx(p.width, 144.0));
        assert!(approx(p.x, 72.0));
        assert!(approx(p.y, 0.0));
    }

    #[test]
    fn fit_wide_image_is_letterboxed() {
        let g = PageGeometry::from_dimensions(&[(800, 800)], 200.0).unwrap();
        let p = g.fit_image(800, 400);
        assert!(approx(p.width, 288.0));
        assert!(approx(p.height, 144.0));
        assert!(approx(p.y, 72.0));
    }
}
