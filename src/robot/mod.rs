//! Robot station control.
//!
//! ```text
//! load_drawing_program ─► Station::load_station + create_program
//! draw_on_canvas       ─► run_program ─► poll is_busy / tool_position every poll_interval
//!                                          └─ SprayToggle ─► set_spray (transitions only)
//!                          Ctrl-C ─► spray off ─► stop_program ─► retract
//! ```
//!
//! [`SimStation`] is the shipped [`Station`] backend.

pub mod program;
pub mod sim;
pub mod station;

pub use program::{draw_on_canvas, load_drawing_program, DrawOutcome};
pub use sim::{parse_gcode, Clock, ManualClock, MonotonicClock, SimCamera, SimStation, StationScene};
pub use station::{SprayState, SprayToggle, Station, StationError, ToolPosition};
