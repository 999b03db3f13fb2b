//! Raster → vector: outline every ink stroke of a generated drawing.
//!
//! ```text
//! DynamicImage ─► luma ─► inverse threshold ─► border following ─► run compression ─► sort
//! ```

use std::path::Path;

use image::{DynamicImage, GrayImage, Luma};
use thiserror::Error;

use crate::drawing::geometry::{Contour, Point};

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("image has no pixels")]
    EmptyImage,

    #[error("could not open image: {0}")]
    Open(#[from] image::ImageError),
}

/// Load an image file and trace it.
pub fn trace_file(path: &Path, threshold: u8) -> Result<Vec<Contour>, TraceError> {
    let img = image::open(path)?;
    trace_image(&img, threshold)
}

/// Outline every ink region of `img`.
///
/// Pixels with luma `<= threshold` are ink.  Every border is returned (outer
/// and hole borders alike, no hierarchy), with straight runs reduced to their
/// end points, longest open arc length first.
pub fn trace_image(img: &DynamicImage, threshold: u8) -> Result<Vec<Contour>, TraceError> {
    if img.width() == 0 || img.height() == 0 {
        return Err(TraceError::EmptyImage);
    }

    let binary = with_paper_border(&ink_mask(&img.to_luma8(), threshold));

    let mut contours: Vec<Contour> = imageproc::contours::find_contours::<i32>(&binary)
        .into_iter()
        .map(|c| {
            let points: Vec<Point> = c
                .points
                .iter()
                .map(|p| Point::new(f64::from(p.x - 1), f64::from(p.y - 1)))
                .collect();
            Contour::new(compress_runs(&points))
        })
        .filter(|c| !c.is_empty())
        .collect();

    contours.sort_by(|a, b| b.arc_length(false).total_cmp(&a.arc_length(false)));
    log::info!("Traced {} contour(s)", contours.len());
    Ok(contours)
}

/// Ink becomes 255, paper 0.
pub fn ink_mask(gray: &GrayImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y)[0] <= threshold {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Surround `mask` with a 1 px paper frame so ink touching the image edge
/// still has an outer border.  Coordinates shift by `(+1, +1)`.
fn with_paper_border(mask: &GrayImage) -> GrayImage {
    let mut padded = GrayImage::new(mask.width() + 2, mask.height() + 2);
    for (x, y, px) in mask.enumerate_pixels() {
        padded.put_pixel(x + 1, y + 1, *px);
    }
    padded
}

/// Drop every point that continues the previous step in the same direction,
/// keeping the end points of horizontal, vertical and diagonal runs.
pub fn compress_runs(points: &[Point]) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let mut out = Vec::with_capacity(points.len());
    out.push(points[0]);
    for w in points.windows(3) {
        let (a, b, c) = (w[0], w[1], w[2]);
        let step_in = (b.x - a.x, b.y - a.y);
        let step_out = (c.x - b.x, c.y - b.y);
        if step_in != step_out {
            out.push(b);
        }
    }
    out.push(points[points.len() - 1]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn canvas(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([255, 255, 255]))
    }

    fn fill(img: &mut RgbImage, x0: u32, y0: u32, x1: u32, y1: u32, shade: u8) {
        for y in y0..=y1 {
            for x in x0..=x1 {
                img.put_pixel(x, y, Rgb([shade, shade, shade]));
            }
        }
    }

    #[test]
    fn threshold_is_inclusive() {
        let gray = GrayImage::from_raw(3, 1, vec![200, 201, 0]).unwrap();
        let mask = ink_mask(&gray, 200);
        assert_eq!(mask.as_raw(), &vec![255, 0, 255]);
    }

    #[test]
    fn straight_runs_collapse_to_corners() {
        let pts: Vec<Point> = [(0, 0), (1, 0), (2, 0), (3, 0), (3, 1), (3, 2), (2, 3), (1, 4)]
            .iter()
            .map(|&(x, y)| Point::new(x as f64, y as f64))
            .collect();
        let out = compress_runs(&pts);
        assert_eq!(
            out,
            vec![
                Point::new(0.0, 0.0),
                Point::new(3.0, 0.0),
                Point::new(3.0, 2.0),
                Point::new(1.0, 4.0)
            ]
        );
    }

    #[test]
    fn blank_page_has_no_contours() {
        let img = DynamicImage::ImageRgb8(canvas(20, 20));
        assert!(trace_image(&img, 200).unwrap().is_empty());
    }

    #[test]
    fn two_strokes_sorted_longest_first() {
        let mut img = canvas(40, 40);
        fill(&mut img, 2, 2, 4, 4, 0);
        fill(&mut img, 10, 10, 30, 30, 50);
        let contours = trace_image(&DynamicImage::ImageRgb8(img), 200).unwrap();

        assert!(contours.len() >= 2);
        let lengths: Vec<f64> = contours.iter().map(|c| c.arc_length(false)).collect();
        assert!(lengths.windows(2).all(|w| w[0] >= w[1]));

        let big = contours[0].bounds().unwrap();
        assert_eq!((big.min_x, big.min_y, big.max_x, big.max_y), (10.0, 10.0, 30.0, 30.0));
        // A filled square's border compresses to its corners.
        assert!(contours[0].len() <= 5);
    }

    #[test]
    fn frame_touching_every_edge_keeps_outer_and_hole_borders() {
        let mut img = canvas(40, 30);
        fill(&mut img, 0, 0, 39, 1, 0);
        fill(&mut img, 0, 28, 39, 29, 0);
        fill(&mut img, 0, 0, 1, 29, 0);
        fill(&mut img, 38, 0, 39, 29, 0);

        let contours = trace_image(&DynamicImage::ImageRgb8(img), 200).unwrap();
        let mut boxes: Vec<_> = contours
            .iter()
            .map(|c| {
                let b = c.bounds().unwrap();
                (b.min_x, b.min_y, b.max_x, b.max_y)
            })
            .collect();
        boxes.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(boxes, [(0.0, 0.0, 39.0, 29.0), (1.0, 1.0, 38.0, 28.0)]);
    }

    #[test]
    fn stroke_along_the_top_row_is_traced() {
        let mut img = canvas(40, 30);
        fill(&mut img, 0, 0, 39, 0, 0);

        let contours = trace_image(&DynamicImage::ImageRgb8(img), 200).unwrap();
        assert_eq!(contours.len(), 1);
        let b = contours[0].bounds().unwrap();
        assert_eq!((b.min_x, b.min_y, b.max_x, b.max_y), (0.0, 0.0, 39.0, 0.0));
    }

    #[test]
    fn edge_rows_survive_next_to_interior_strokes() {
        let mut img = canvas(100, 60);
        fill(&mut img, 0, 0, 99, 0, 0);
        fill(&mut img, 0, 59, 99, 59, 0);
        fill(&mut img, 50, 10, 50, 40, 0);

        let contours = trace_image(&DynamicImage::ImageRgb8(img), 200).unwrap();
        assert_eq!(contours.len(), 3);
    }

    #[test]
    fn light_grey_is_paper() {
        let mut img = canvas(20, 20);
        fill(&mut img, 5, 5, 10, 10, 230);
        assert!(trace_image(&DynamicImage::ImageRgb8(img), 200).unwrap().is_empty());
    }

    #[test]
    fn zero_sized_image_is_rejected() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        assert!(matches!(trace_image(&img, 200), Err(TraceError::EmptyImage)));
    }
}
