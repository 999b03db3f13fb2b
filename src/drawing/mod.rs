//! Prompt → image → contours → G-code.
//!
//! ```text
//! make_prompt ─► ImageGenerator ─► trace_image ─► scale_contours_to_canvas ─► GcodeProgram
//!                 (images API)      (pixels)       (mm, centred)              (.nc file)
//! ```

pub mod canvas;
pub mod gcode;
pub mod generate;
pub mod geometry;
pub mod prompt;
pub mod trace;

pub use canvas::{scale_contours_to_canvas, ScaleError};
pub use gcode::{GcodeError, GcodeProgram};
pub use generate::{ImageGenError, ImageGenerator, OpenAiImageGenerator};
pub use geometry::{bounds_of, Bounds, Contour, Point};
pub use prompt::make_prompt;
pub use trace::{trace_file, trace_image, TraceError};
