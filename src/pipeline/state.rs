//! Pipeline phases and shared run state.
//!
//! [`PipelineState`] is the phase the drawing run is in.  [`AppState`]
//! collects what a run has produced so far and is shared behind
//! [`SharedState`] (`Arc<Mutex<AppState>>`), so a caller can watch progress
//! from another task.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

/// Phases of one drawing run.
///
/// ```text
/// Idle ─▶ Prompting ─▶ Listening ─▶ Generating      (no prompt given)
/// Idle ───────────────────────────▶ Generating      (prompt given)
/// Generating ─▶ Tracing ─▶ Emitting ─▶ Drawing ─▶ Done
/// any state ──error──▶ Error
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Idle,

    /// Greeting the user.
    Prompting,

    /// Microphone open, waiting for the spoken prompt.
    Listening,

    /// Waiting on the image API.
    Generating,

    /// Turning the image into scaled contours.
    Tracing,

    /// Writing the G-code file.
    Emitting,

    /// The drawing target is executing the program.
    Drawing,

    Done,

    Error,
}

impl PipelineState {
    /// `true` while a run is in progress.
    ///
    /// ```
    /// use drawbot::pipeline::PipelineState;
    ///
    /// assert!(!PipelineState::Idle.is_busy());
    /// assert!(PipelineState::Listening.is_busy());
    /// assert!(PipelineState::Drawing.is_busy());
    /// assert!(!PipelineState::Done.is_busy());
    /// assert!(!PipelineState::Error.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        !matches!(
            self,
            PipelineState::Idle | PipelineState::Done | PipelineState::Error
        )
    }

    /// `true` once a run has ended, successfully or not.
    pub fn is_finished(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Error)
    }

    pub fn label(&self) -> &'static str {
        match self {
            PipelineState::Idle => "Idle",
            PipelineState::Prompting => "Prompting",
            PipelineState::Listening => "Listening",
            PipelineState::Generating => "Generating",
            PipelineState::Tracing => "Tracing",
            PipelineState::Emitting => "Emitting",
            PipelineState::Drawing => "Drawing",
            PipelineState::Done => "Done",
            PipelineState::Error => "Error",
        }
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct AppState {
    pub pipeline: PipelineState,

    /// Subject being drawn, once known.
    pub human_prompt: Option<String>,

    /// Contours left after scaling.
    pub contour_count: usize,

    /// G-code file of the current run, once written.
    pub gcode_file: Option<PathBuf>,

    /// Set when `pipeline == PipelineState::Error`.
    pub error_message: Option<String>,
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Lock with `.lock().unwrap()` for a short critical section; never hold
/// the guard across `.await`.
pub type SharedState = Arc<Mutex<AppState>>;

pub fn new_shared_state() -> SharedState {
    Arc::new(Mutex::new(AppState::default()))
}

// ---------------------------------------------------------------------------
// Progress log
// ---------------------------------------------------------------------------

/// One human-readable line for the current phase.
pub fn progress_line(st: &AppState) -> String {
    match st.pipeline {
        PipelineState::Generating => match &st.human_prompt {
            Some(p) => format!("Generating: \"{p}\""),
            None => "Generating".into(),
        },
        PipelineState::Emitting => format!("Emitting: {} contour(s)", st.contour_count),
        PipelineState::Drawing => match &st.gcode_file {
            Some(f) => format!("Drawing: {}", f.display()),
            None => "Drawing".into(),
        },
        PipelineState::Error => format!(
            "Error: {}",
            st.error_message.as_deref().unwrap_or("unknown")
        ),
        other => other.label().to_string(),
    }
}

/// Log each phase change of `state` at info level until the run finishes.
pub async fn log_progress(state: SharedState, interval: Duration) {
    let mut last = None;
    loop {
        let (phase, line) = {
            let st = state.lock().unwrap();
            (st.pipeline, progress_line(&st))
        };
        if last != Some(phase) {
            log::info!("{line}");
            last = Some(phase);
        }
        if phase.is_finished() {
            break;
        }
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [PipelineState; 9] = [
        PipelineState::Idle,
        PipelineState::Prompting,
        PipelineState::Listening,
        PipelineState::Generating,
        PipelineState::Tracing,
        PipelineState::Emitting,
        PipelineState::Drawing,
        PipelineState::Done,
        PipelineState::Error,
    ];

    // ---- is_busy ---

    #[test]
    fn only_terminal_and_idle_states_are_not_busy() {
        let idle: Vec<_> = ALL.iter().filter(|s| !s.is_busy()).collect();
        assert_eq!(
            idle,
            [&PipelineState::Idle, &PipelineState::Done, &PipelineState::Error]
        );
    }

    // ---- label ---

    #[test]
    fn labels_are_distinct() {
        let mut labels: Vec<_> = ALL.iter().map(|s| s.label()).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), ALL.len());
        assert_eq!(PipelineState::Emitting.label(), "Emitting");
    }

    // ---- AppState / SharedState ---

    #[test]
    fn default_state_is_idle_and_empty() {
        let st = AppState::default();
        assert_eq!(st.pipeline, PipelineState::Idle);
        assert!(st.human_prompt.is_none());
        assert!(st.gcode_file.is_none());
        assert!(st.error_message.is_none());
    }

    #[test]
    fn shared_state_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SharedState>();
    }

    #[test]
    fn only_done_and_error_are_finished() {
        let finished: Vec<_> = ALL.iter().filter(|s| s.is_finished()).collect();
        assert_eq!(finished, [&PipelineState::Done, &PipelineState::Error]);
    }

    // ---- progress ---

    #[test]
    fn progress_lines_carry_the_run_details() {
        let mut st = AppState {
            pipeline: PipelineState::Generating,
            human_prompt: Some("a kite".into()),
            ..AppState::default()
        };
        assert_eq!(progress_line(&st), "Generating: \"a kite\"");

        st.pipeline = PipelineState::Emitting;
        st.contour_count = 3;
        assert_eq!(progress_line(&st), "Emitting: 3 contour(s)");

        st.pipeline = PipelineState::Drawing;
        st.gcode_file = Some(PathBuf::from("out.nc"));
        assert_eq!(progress_line(&st), "Drawing: out.nc");

        st.pipeline = PipelineState::Error;
        st.error_message = Some("printer offline".into());
        assert_eq!(progress_line(&st), "Error: printer offline");

        st.pipeline = PipelineState::Tracing;
        assert_eq!(progress_line(&st), "Tracing");
    }

    #[tokio::test]
    async fn log_progress_returns_once_the_run_finishes() {
        let state = new_shared_state();
        let writer = Arc::clone(&state);
        let run = async move {
            for phase in [PipelineState::Generating, PipelineState::Drawing, PipelineState::Done] {
                tokio::time::sleep(Duration::from_millis(5)).await;
                writer.lock().unwrap().pipeline = phase;
            }
        };

        tokio::time::timeout(
            Duration::from_secs(5),
            async { tokio::join!(run, log_progress(state.clone(), Duration::from_millis(1))) },
        )
        .await
        .expect("progress log should stop at Done");
        assert_eq!(state.lock().unwrap().pipeline, PipelineState::Done);
    }

    #[test]
    fn shared_state_clones_see_mutations() {
        let state = new_shared_state();
        let other = Arc::clone(&state);
        state.lock().unwrap().pipeline = PipelineState::Drawing;
        assert_eq!(other.lock().unwrap().pipeline, PipelineState::Drawing);
    }
}
