//! STT (speech-to-text) for the spoken drawing prompt.
//!
//! # Architecture
//!
//! ```text
//! PromptListener::record_and_transcribe
//!   ├─ PromptRecorder::record   (MicRecorder → cpal)
//!   ├─ save_wav / read_wav       (prompt recordings dir)
//!   ├─ resample_to_16k
//!   └─ SttEngine::transcribe     (WhisperEngine → whisper-rs)
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use std::time::Duration;
//! use drawbot::stt::{MicRecorder, PromptListener, TranscribeParams, WhisperEngine};
//!
//! let engine = WhisperEngine::load("models/ggml-tiny.en.bin", TranscribeParams::default())
//!     .expect("model not found");
//! let listener = PromptListener::new(Arc::new(MicRecorder), Arc::new(engine), "prompts");
//! let text = listener
//!     .record_and_transcribe(Duration::from_secs(10), Path::new("response.wav"), false)
//!     .unwrap();
//! println!("{text}");
//! ```

pub mod engine;
pub mod listen;
pub mod model;
pub mod transcribe;

pub use engine::{SttEngine, SttError, WhisperEngine, MAX_AUDIO_SAMPLES, MIN_AUDIO_SAMPLES};
pub use listen::{ListenError, MicRecorder, PromptListener, PromptRecorder};
pub use model::{find_model_by_id, ModelInfo, ModelPaths, WHISPER_MODELS};
pub use transcribe::TranscribeParams;

#[cfg(test)]
pub use engine::MockSttEngine;
