//! Drawing pipeline: prompt → image → contours → G-code → target.
//!
//! # Pipeline flow
//!
//! ```text
//! run(None)
//!   ├─ narrator.say(greeting)                          [Prompting]
//!   ├─ spawn_blocking(listener.record_and_transcribe)  [Listening]
//!   └─ narrator.say(acknowledgement)
//! run(Some(prompt)) joins here
//!   ├─ generator.generate(prompt)                      [Generating]
//!   ├─ spawn_blocking(trace_image) → scale             [Tracing]
//!   ├─ GcodeProgram::write_to_dir                      [Emitting]
//!   ├─ narrator.say(ready)
//!   └─ target.draw(gcode_file)                         [Drawing] → [Done]
//! ```
//!
//! Narration is best-effort: a failed TTS call or playback is logged and
//! the run continues.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::{CanvasSettings, GcodeSettings, SpeechSettings, TraceSettings};
use crate::drawing::{
    scale_contours_to_canvas, trace_image, GcodeError, GcodeProgram, ImageGenError, ImageGenerator,
    ScaleError, TraceError,
};
use crate::stt::{ListenError, PromptListener};
use crate::voice::Narrator;

use super::state::{PipelineState, SharedState};
use super::target::DrawingTarget;

pub const GREETING: &str = "Hello! I am a drawing robot. What would you like me to draw?";
pub const ACKNOWLEDGEMENT: &str = "Great! I will draw that for you. Please wait a moment.";
pub const READY: &str = "Drawing is ready. I will start drawing now.";

// ---------------------------------------------------------------------------
// PipelineError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("a drawing is already in progress ({0})")]
    AlreadyRunning(&'static str),

    #[error("no prompt given and no listener configured")]
    NoListener,

    #[error("nothing was heard; please say what to draw")]
    EmptyPrompt,

    #[error("listening failed: {0}")]
    Listen(#[from] ListenError),

    #[error("image generation failed: {0}")]
    ImageGen(#[from] ImageGenError),

    #[error("tracing failed: {0}")]
    Trace(#[from] TraceError),

    #[error("scaling failed: {0}")]
    Scale(#[from] ScaleError),

    #[error("G-code emission failed: {0}")]
    Gcode(#[from] GcodeError),

    #[error("drawing failed: {0}")]
    Target(String),

    #[error("internal error: {0}")]
    Internal(String),
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// How the spoken prompt is captured.
#[derive(Debug, Clone, PartialEq)]
pub struct ListenOptions {
    pub duration: Duration,
    /// Relative names land in the prompt recordings directory.
    pub filename: PathBuf,
    pub keep_file: bool,
}

impl From<&SpeechSettings> for ListenOptions {
    fn from(s: &SpeechSettings) -> Self {
        Self {
            duration: Duration::from_secs(u64::from(s.duration_secs)),
            filename: PathBuf::from("response.wav"),
            keep_file: s.keep_file,
        }
    }
}

/// Everything the image → G-code stages need.
#[derive(Debug, Clone)]
pub struct DrawingOptions {
    pub trace: TraceSettings,
    pub canvas: CanvasSettings,
    pub gcode: GcodeSettings,
    pub gcode_dir: PathBuf,
    pub listen: ListenOptions,
}

/// What a completed run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawingOutput {
    pub human_prompt: String,
    pub gcode_file: PathBuf,
    pub strokes: usize,
}

/// `true` when the user must be asked out loud: no prompt, or a blank one.
pub fn needs_spoken_prompt(human_prompt: Option<&str>) -> bool {
    human_prompt.map_or(true, |p| p.trim().is_empty())
}

// ---------------------------------------------------------------------------
// DrawingPipeline
// ---------------------------------------------------------------------------

pub struct DrawingPipeline {
    state: SharedState,
    narrator: Arc<dyn Narrator>,
    listener: Option<Arc<PromptListener>>,
    generator: Arc<dyn ImageGenerator>,
    target: Arc<dyn DrawingTarget>,
    options: DrawingOptions,
}

impl DrawingPipeline {
    pub fn new(
        state: SharedState,
        narrator: Arc<dyn Narrator>,
        generator: Arc<dyn ImageGenerator>,
        target: Arc<dyn DrawingTarget>,
        options: DrawingOptions,
    ) -> Self {
        Self {
            state,
            narrator,
            listener: None,
            generator,
            target,
            options,
        }
    }

    /// Enables spoken prompts.
    pub fn with_listener(mut self, listener: Arc<PromptListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Run once.  Without `human_prompt` the user is asked out loud.
    pub async fn run(&self, human_prompt: Option<String>) -> Result<DrawingOutput, PipelineError> {
        {
            let mut st = self.state.lock().unwrap();
            if st.pipeline.is_busy() {
                return Err(PipelineError::AlreadyRunning(st.pipeline.label()));
            }
            st.error_message = None;
            st.gcode_file = None;
            st.contour_count = 0;
        }

        match self.run_stages(human_prompt).await {
            Ok(out) => {
                self.set_pipeline(PipelineState::Done);
                Ok(out)
            }
            Err(e) => {
                self.set_error(e.to_string());
                Err(e)
            }
        }
    }

    async fn run_stages(&self, human_prompt: Option<String>) -> Result<DrawingOutput, PipelineError> {
        // ── 1. Prompt ────────────────────────────────────────────────────
        let human_prompt = match human_prompt {
            Some(p) if !needs_spoken_prompt(Some(&p)) => p,
            _ => self.ask_for_prompt().await?,
        };
        self.state.lock().unwrap().human_prompt = Some(human_prompt.clone());

        // ── 2. Image ─────────────────────────────────────────────────────
        self.set_pipeline(PipelineState::Generating);
        let image = self.generator.generate(&human_prompt).await?;

        // ── 3. Contours ──────────────────────────────────────────────────
        self.set_pipeline(PipelineState::Tracing);
        let threshold = self.options.trace.threshold;
        let (image, contours) = tokio::task::spawn_blocking(move || {
            let contours = trace_image(&image, threshold);
            (image, contours)
        })
        .await
        .map_err(|e| PipelineError::Internal(e.to_string()))?;
        let contours = scale_contours_to_canvas(&contours?, &self.options.canvas)?;
        self.state.lock().unwrap().contour_count = contours.len();

        // ── 4. G-code ────────────────────────────────────────────────────
        self.set_pipeline(PipelineState::Emitting);
        let program = GcodeProgram::from_contours(&contours, &self.options.gcode);
        let gcode_file = program.write_to_dir(&self.options.gcode_dir)?;
        let preview = gcode_file.with_extension("png");
        if let Err(e) = image.save(&preview) {
            log::warn!("could not save preview {}: {e}", preview.display());
        }
        self.state.lock().unwrap().gcode_file = Some(gcode_file.clone());

        // ── 5. Draw ──────────────────────────────────────────────────────
        self.say(READY).await;
        self.set_pipeline(PipelineState::Drawing);
        self.target
            .draw(&gcode_file)
            .await
            .map_err(|e| PipelineError::Target(format!("{e:#}")))?;

        Ok(DrawingOutput {
            human_prompt,
            gcode_file,
            strokes: program.strokes(),
        })
    }

    async fn ask_for_prompt(&self) -> Result<String, PipelineError> {
        let listener = self.listener.clone().ok_or(PipelineError::NoListener)?;

        self.set_pipeline(PipelineState::Prompting);
        self.say(GREETING).await;

        self.set_pipeline(PipelineState::Listening);
        let opts = self.options.listen.clone();
        let text = tokio::task::spawn_blocking(move || {
            listener.record_and_transcribe(opts.duration, &opts.filename, opts.keep_file)
        })
        .await
        .map_err(|e| PipelineError::Internal(e.to_string()))??;

        if text.trim().is_empty() {
            return Err(PipelineError::EmptyPrompt);
        }

        self.say(ACKNOWLEDGEMENT).await;
        Ok(text)
    }

    async fn say(&self, text: &str) {
        if let Err(e) = self.narrator.say(text).await {
            log::warn!("narration failed: {e}");
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn set_pipeline(&self, state: PipelineState) {
        log::debug!("pipeline: → {}", state.label());
        self.state.lock().unwrap().pipeline = state;
    }

    fn set_error(&self, message: String) {
        let mut st = self.state.lock().unwrap();
        st.pipeline = PipelineState::Error;
        st.error_message = Some(message.clone());
        log::error!("pipeline error: {message}");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
