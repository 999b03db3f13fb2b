//! Speech-to-text engine seam and the Whisper backend.
//!
//! [`SttEngine`] is held as `Arc<dyn SttEngine>` and called from blocking
//! code.  [`WhisperEngine`] loads the GGML weights once and creates a fresh
//! `WhisperState` per prompt.

use std::path::Path;

use thiserror::Error;
use whisper_rs::{WhisperContext, WhisperContextParameters, WhisperState};

use crate::stt::transcribe::TranscribeParams;

#[derive(Debug, Clone, Error)]
pub enum SttError {
    #[error("Whisper model not found at {0}")]
    ModelNotFound(String),

    #[error("could not initialise Whisper: {0}")]
    ContextInit(String),

    #[error("Whisper failed: {0}")]
    Transcription(String),

    #[error("prompt recording shorter than 0.5 s")]
    AudioTooShort,

    #[error("prompt recording longer than 60 s")]
    AudioTooLong,
}

/// 16 kHz mono `f32` in, transcript out.
pub trait SttEngine: Send + Sync {
    fn transcribe(&self, audio: &[f32]) -> Result<String, SttError>;
}

/// 0.5 s at 16 kHz.
pub const MIN_AUDIO_SAMPLES: usize = 8_000;
/// 60 s at 16 kHz.
pub const MAX_AUDIO_SAMPLES: usize = 960_000;

fn ensure_prompt_length(audio: &[f32]) -> Result<(), SttError> {
    match audio.len() {
        n if n < MIN_AUDIO_SAMPLES => Err(SttError::AudioTooShort),
        n if n > MAX_AUDIO_SAMPLES => Err(SttError::AudioTooLong),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// WhisperEngine
// ---------------------------------------------------------------------------

pub struct WhisperEngine {
    ctx: WhisperContext,
    params: TranscribeParams,
}

impl std::fmt::Debug for WhisperEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperEngine")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl WhisperEngine {
    /// Load a GGML model file.
    pub fn load(model_path: impl AsRef<Path>, params: TranscribeParams) -> Result<Self, SttError> {
        let path = model_path.as_ref();
        if !path.is_file() {
            return Err(SttError::ModelNotFound(path.display().to_string()));
        }
        let path_str = path
            .to_str()
            .ok_or_else(|| SttError::ModelNotFound(format!("non-UTF-8 path: {}", path.display())))?;

        let ctx = WhisperContext::new_with_params(path_str, WhisperContextParameters::default())
            .map_err(|e| SttError::ContextInit(e.to_string()))?;
        Ok(Self { ctx, params })
    }

    pub fn params(&self) -> &TranscribeParams {
        &self.params
    }
}

impl SttEngine for WhisperEngine {
    fn transcribe(&self, audio: &[f32]) -> Result<String, SttError> {
        ensure_prompt_length(audio)?;

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| SttError::ContextInit(e.to_string()))?;

        let started = std::time::Instant::now();
        state
            .full(self.params.full_params(), audio)
            .map_err(|e| SttError::Transcription(e.to_string()))?;
        let text = joined_segments(&state)?;
        log::debug!("whisper took {} ms", started.elapsed().as_millis());

        Ok(text.trim().to_string())
    }
}

fn joined_segments(state: &WhisperState) -> Result<String, SttError> {
    let n = state
        .full_n_segments()
        .map_err(|e| SttError::Transcription(e.to_string()))?;
    (0..n)
        .map(|i| {
            state
                .full_get_segment_text(i)
                .map_err(|e| SttError::Transcription(format!("segment {i}: {e}")))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// MockSttEngine  (test-only)
// ---------------------------------------------------------------------------

/// Canned transcript behind the same length checks as Whisper.
#[cfg(test)]
pub struct MockSttEngine {
    response: Result<String, SttError>,
}

#[cfg(test)]
impl MockSttEngine {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            response: Ok(text.into()),
        }
    }

    pub fn err(error: SttError) -> Self {
        Self {
            response: Err(error),
        }
    }
}

#[cfg(test)]
impl SttEngine for MockSttEngine {
    fn transcribe(&self, audio: &[f32]) -> Result<String, SttError> {
        ensure_prompt_length(audio)?;
        self.response.clone()
    }
}
