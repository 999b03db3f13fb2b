//! The robot station seam.
//!
//! A [`Station`] is anything that can load a work cell, turn a G-code file
//! into a named program, run it, and report where the tool is.  The drawing
//! loop in [`crate::robot::program`] only talks to this trait.

use std::path::{Path, PathBuf};

use thiserror::Error;

// ---------------------------------------------------------------------------
// StationError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StationError {
    #[error("no station loaded")]
    NoStation,

    #[error("station file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid station file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no program named {0:?}")]
    ProgramNotFound(String),

    #[error("G-code line {line}: {message}")]
    Gcode { line: usize, message: String },
}

// ---------------------------------------------------------------------------
// Tool pose and spray
// ---------------------------------------------------------------------------

/// Tool centre point in station millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ToolPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl ToolPosition {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn lerp(&self, to: &ToolPosition, t: f64) -> ToolPosition {
        ToolPosition {
            x: self.x + (to.x - self.x) * t,
            y: self.y + (to.y - self.y) * t,
            z: self.z + (to.z - self.z) * t,
        }
    }

    pub fn distance(&self, other: &ToolPosition) -> f64 {
        let (dx, dy, dz) = (other.x - self.x, other.y - self.y, other.z - self.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Whether the pen leaves ink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SprayState {
    On,
    #[default]
    Off,
}

impl SprayState {
    /// On when the tool is below the paper contact height.
    pub fn for_height(z: f64, contact_z: f64) -> Self {
        if z < contact_z {
            SprayState::On
        } else {
            SprayState::Off
        }
    }
}

/// Tracks the pen state and reports only changes.
#[derive(Debug, Clone)]
pub struct SprayToggle {
    contact_z: f64,
    state: SprayState,
}

impl SprayToggle {
    pub fn new(contact_z: f64) -> Self {
        Self {
            contact_z,
            state: SprayState::Off,
        }
    }

    pub fn state(&self) -> SprayState {
        self.state
    }

    /// New state if `z` flips the pen, `None` otherwise.
    pub fn update(&mut self, z: f64) -> Option<SprayState> {
        let next = SprayState::for_height(z, self.contact_z);
        if next == self.state {
            return None;
        }
        self.state = next;
        Some(next)
    }
}

// ---------------------------------------------------------------------------
// Station trait
// ---------------------------------------------------------------------------

/// A robot work cell that can execute G-code programs.
///
/// Calls are short and non-blocking; long-running work (program execution)
/// happens behind `run_program` and is observed with `is_busy`.
pub trait Station: Send + Sync {
    /// Load a station file, closing any active station first.
    fn load_station(&self, path: &Path) -> Result<(), StationError>;

    /// Build program `name` from a G-code file, replacing an existing one.
    fn create_program(&self, name: &str, gcode_file: &Path) -> Result<(), StationError>;

    fn run_program(&self, name: &str) -> Result<(), StationError>;

    fn is_busy(&self) -> Result<bool, StationError>;

    fn tool_position(&self) -> Result<ToolPosition, StationError>;

    fn set_spray(&self, state: SprayState) -> Result<(), StationError>;

    /// Remove every mark left on the canvas.
    fn clear_spray(&self) -> Result<(), StationError>;

    fn stop_program(&self) -> Result<(), StationError>;

    /// Back the tool off along its axis by `mm`.
    fn retract(&self, mm: f64) -> Result<(), StationError>;
}
