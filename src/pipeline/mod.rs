//! Pipeline orchestrator for the drawing robot.
//!
//! This module wires the full prompt → image → G-code → machine run and
//! exposes the shared state a caller can watch while it progresses.
//!
//! # Architecture
//!
//! ```text
//! DrawingPipeline::run(prompt?)   ← async tokio task
//!        │
//!        ├─ Narrator (TTS cache + rodio)
//!        ├─ PromptListener (cpal → WAV → Whisper, spawn_blocking)
//!        ├─ ImageGenerator (images API)
//!        ├─ trace_image → scale_contours_to_canvas → GcodeProgram
//!        │
//!        └─ DrawingTarget
//!              ├─ SimulatorTarget  (SimStation + optional CameraRecorder)
//!              └─ OctoPrintTarget  (upload, select, print)
//! ```
//!
//! Progress is published through [`SharedState`] (`Arc<Mutex<AppState>>`).

pub mod runner;
pub mod state;
pub mod target;

pub use runner::{
    needs_spoken_prompt, DrawingOptions, DrawingOutput, DrawingPipeline, ListenOptions,
    PipelineError, ACKNOWLEDGEMENT, GREETING, READY,
};
pub use state::{log_progress, new_shared_state, progress_line, AppState, PipelineState, SharedState};
pub use target::{ctrl_c, DrawingTarget, OctoPrintTarget, SimulatorTarget, FRAME_SIZE};
