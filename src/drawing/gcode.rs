//! Contours → G-code text.
//!
//! Each contour becomes one pen stroke:
//!
//! ```text
//! G0 Z<up>        lift
//! G0 X.. Y..      travel to the first point
//! G0 Z<down>      lower
//! G1 X.. Y..      draw, skipping points closer than min_step to the last one
//! G0 Z<up>        lift
//! ```
//!
//! Image rows grow downwards, machine Y grows upwards, so every emitted Y is
//! negated.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::GcodeSettings;
use crate::drawing::geometry::{Contour, Point};

#[derive(Debug, Error)]
pub enum GcodeError {
    #[error("could not write G-code to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A complete program, one instruction per line.
#[derive(Debug, Clone, PartialEq)]
pub struct GcodeProgram {
    lines: Vec<String>,
    strokes: usize,
}

/// Millimetres with three decimals; never prints `-0.000`.
fn mm(v: f64) -> String {
    let rounded = (v * 1000.0).round() / 1000.0;
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{rounded:.3}")
}

fn xy(p: &Point) -> String {
    format!("X{} Y{}", mm(p.x), mm(-p.y))
}

impl GcodeProgram {
    pub fn from_contours(contours: &[Contour], settings: &GcodeSettings) -> Self {
        let mut lines = vec![
            "G21 ; Set units to mm".to_string(),
            "G90 ; Absolute positioning".to_string(),
            format!("G0 F{}", settings.feedrate),
        ];
        let pen_up = format!("G0 Z{}", mm(settings.pen_up));
        let pen_down = format!("G0 Z{}", mm(settings.pen_down));

        let mut strokes = 0;
        for contour in contours {
            let Some(first) = contour.points.first() else {
                continue;
            };
            strokes += 1;

            lines.push(pen_up.clone());
            lines.push(format!("G0 {}", xy(first)));
            lines.push(pen_down.clone());

            let mut last = *first;
            for p in &contour.points[1..] {
                if p.distance(&last) > settings.min_step_mm {
                    lines.push(format!("G1 {}", xy(p)));
                    last = *p;
                }
            }
            lines.push(pen_up.clone());
        }

        Self { lines, strokes }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Number of pen strokes (non-empty contours).
    pub fn strokes(&self) -> usize {
        self.strokes
    }

    pub fn write_to(&self, path: &Path) -> Result<(), GcodeError> {
        std::fs::write(path, self.to_string()).map_err(|source| GcodeError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write `<dir>/<timestamp>.nc`, creating `dir` if needed.
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf, GcodeError> {
        std::fs::create_dir_all(dir).map_err(|source| GcodeError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let stamp = chrono::Local::now().format("%Y-%m-%dT%H-%M-%S%.6f");
        let path = dir.join(format!("{stamp}.nc"));
        self.write_to(&path)?;
        log::info!(
            "Wrote {} stroke(s), {} line(s) to {}",
            self.strokes,
            self.lines.len(),
            path.display()
        );
        Ok(path)
    }
}

impl fmt::Display for GcodeProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lines.join("\n"))
    }
}
