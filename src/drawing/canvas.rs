//! Pixel contours → millimetre contours centred on the canvas origin.

use thiserror::Error;

use crate::config::CanvasSettings;
use crate::drawing::geometry::{bounds_of, Contour, Point};

#[derive(Debug, Error, PartialEq)]
pub enum ScaleError {
    #[error("nothing to scale: no contour points")]
    Empty,

    #[error("drawing has zero extent ({width} x {height} px)")]
    ZeroSize { width: f64, height: f64 },

    #[error("margins leave no drawable area on a {width} x {height} mm canvas")]
    NoDrawableArea { width: f64, height: f64 },
}

/// Scale and centre `contours` so they fit inside the canvas minus margins.
///
/// The scale factor is the smaller of the two axis ratios, so neither axis
/// overflows.  The result is centred on `(0, 0)`.  When
/// `small_area_cutoff` is set, contours whose scaled area is not above it are
/// dropped.
pub fn scale_contours_to_canvas(
    contours: &[Contour],
    canvas: &CanvasSettings,
) -> Result<Vec<Contour>, ScaleError> {
    let bbox = bounds_of(contours).ok_or(ScaleError::Empty)?;
    let (px_w, px_h) = (bbox.width(), bbox.height());

    let avail_w = canvas.width - 2.0 * canvas.margin;
    let avail_h = canvas.height - 2.0 * canvas.margin;
    if avail_w <= 0.0 || avail_h <= 0.0 {
        return Err(ScaleError::NoDrawableArea {
            width: canvas.width,
            height: canvas.height,
        });
    }

    let factor = match (px_w > 0.0, px_h > 0.0) {
        (true, true) => (avail_w / px_w).min(avail_h / px_h),
        (true, false) => avail_w / px_w,
        (false, true) => avail_h / px_h,
        (false, false) => {
            return Err(ScaleError::ZeroSize {
                width: px_w,
                height: px_h,
            })
        }
    };
    log::debug!("scale factor {factor:.4} mm/px for {px_w} x {px_h} px");

    let offset_x = bbox.min_x * factor + px_w * factor / 2.0;
    let offset_y = bbox.min_y * factor + px_h * factor / 2.0;

    let scaled = contours
        .iter()
        .filter(|c| match canvas.small_area_cutoff {
            Some(cutoff) => c.area() * factor * factor > cutoff,
            None => true,
        })
        .map(|c| {
            Contour::new(
                c.points
                    .iter()
                    .map(|p| Point::new(p.x * factor - offset_x, p.y * factor - offset_y))
                    .collect(),
            )
        })
        .collect();

    Ok(scaled)
}
