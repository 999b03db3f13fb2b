//! Audio plumbing for the spoken prompt: microphone capture, WAV files, 16 kHz mono.
//!
//! # Pipeline
//!
//! ```text
//! Microphone::record → cpal callback → stereo_to_mono → mpsc
//!           → save_wav (prompt recording) → read_wav → resample_to_16k → Whisper
//! ```

pub mod capture;
pub mod resample;
pub mod wav;

pub use capture::{CaptureError, CapturedAudio, Microphone};
pub use resample::{resample, resample_to_16k, stereo_to_mono, WHISPER_SAMPLE_RATE};
pub use wav::{read_wav, save_wav, WavError};
