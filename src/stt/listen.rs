//! Record a spoken prompt, keep it as a WAV file, and transcribe it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::audio::{read_wav, resample, resample_to_16k, save_wav, CaptureError, Microphone, CapturedAudio, WavError};
use crate::stt::{SttEngine, SttError};

#[derive(Debug, Error)]
pub enum ListenError {
    #[error("audio capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("prompt recording could not be stored: {0}")]
    Wav(#[from] WavError),

    #[error("transcription failed: {0}")]
    Stt(#[from] SttError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Source of fixed-length prompt recordings.
pub trait PromptRecorder: Send + Sync {
    fn record(&self, duration: Duration) -> Result<CapturedAudio, CaptureError>;
}

/// Records from the default microphone.
///
/// The cpal device is opened per recording so the recorder itself stays
/// `Send + Sync`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MicRecorder;

impl PromptRecorder for MicRecorder {
    fn record(&self, duration: Duration) -> Result<CapturedAudio, CaptureError> {
        Microphone::open()?.record(duration)
    }
}

/// Microphone → WAV → Whisper.
pub struct PromptListener {
    recorder: Arc<dyn PromptRecorder>,
    engine: Arc<dyn SttEngine>,
    recordings_dir: PathBuf,
    /// Rate the saved WAV is written at; the capture rate when `None`.
    sample_rate: Option<u32>,
}

impl PromptListener {
    pub fn new(
        recorder: Arc<dyn PromptRecorder>,
        engine: Arc<dyn SttEngine>,
        recordings_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            recorder,
            engine,
            recordings_dir: recordings_dir.into(),
            sample_rate: None,
        }
    }

    /// Store prompt recordings at `rate` Hz instead of the device rate.
    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = Some(rate).filter(|r| *r > 0);
        self
    }

    /// Where a prompt recording called `filename` is stored.
    ///
    /// Relative names land in the prompt recordings directory.
    pub fn resolve(&self, filename: &Path) -> PathBuf {
        if filename.is_absolute() {
            filename.to_path_buf()
        } else {
            self.recordings_dir.join(filename)
        }
    }

    /// Record for `duration`, save to `filename`, transcribe, and delete the
    /// file unless `keep_file` is set.  Blocking.
    pub fn record_and_transcribe(
        &self,
        duration: Duration,
        filename: &Path,
        keep_file: bool,
    ) -> Result<String, ListenError> {
        let path = self.resolve(filename);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ListenError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let audio = self.recorder.record(duration)?;
        match self.sample_rate {
            Some(rate) if rate != audio.sample_rate => {
                let samples = resample(&audio.samples, audio.sample_rate, rate);
                save_wav(&path, &samples, rate)?;
            }
            _ => save_wav(&path, &audio.samples, audio.sample_rate)?,
        }

        let transcript = self.transcribe_file(&path);

        if !keep_file {
            if let Err(e) = std::fs::remove_file(&path) {
                log::warn!("could not remove prompt recording {}: {e}", path.display());
            }
        }

        let text = transcript?;
        log::info!("Transcription:\n{text}");
        Ok(text)
    }

    /// Transcribe an existing WAV file.
    pub fn transcribe_file(&self, path: &Path) -> Result<String, ListenError> {
        let (samples, rate) = read_wav(path)?;
        let audio = resample_to_16k(&samples, rate);
        Ok(self.engine.transcribe(&audio)?.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stt::MockSttEngine;
    use tempfile::tempdir;

    struct ToneRecorder {
        sample_rate: u32,
    }

    impl PromptRecorder for ToneRecorder {
        fn record(&self, duration: Duration) -> Result<CapturedAudio, CaptureError> {
            let n = (duration.as_secs_f64() * self.sample_rate as f64) as usize;
            Ok(CapturedAudio {
                samples: (0..n).map(|i| ((i % 100) as f32 / 100.0) - 0.5).collect(),
                sample_rate: self.sample_rate,
            })
        }
    }

    struct DeadMic;

    impl PromptRecorder for DeadMic {
        fn record(&self, _duration: Duration) -> Result<CapturedAudio, CaptureError> {
            Err(CaptureError::NoDevice)
        }
    }

    fn listener(dir: &Path, recorder: Arc<dyn PromptRecorder>) -> PromptListener {
        PromptListener::new(recorder, Arc::new(MockSttEngine::ok("  a lighthouse  ")), dir)
    }

    #[test]
    fn transcript_is_trimmed_and_file_removed_by_default() {
        let dir = tempdir().unwrap();
        let l = listener(dir.path(), Arc::new(ToneRecorder { sample_rate: 44_100 }));

        let text = l
            .record_and_transcribe(Duration::from_secs(1), Path::new("response.wav"), false)
            .unwrap();

        assert_eq!(text, "a lighthouse");
        assert!(!dir.path().join("response.wav").exists());
    }

    #[test]
    fn keep_file_leaves_the_recording_in_place() {
        let dir = tempdir().unwrap();
        let l = listener(dir.path(), Arc::new(ToneRecorder { sample_rate: 16_000 }));

        l.record_and_transcribe(Duration::from_secs(1), Path::new("keep.wav"), true)
            .unwrap();
        assert!(dir.path().join("keep.wav").exists());
    }

    #[test]
    fn too_short_recordings_surface_the_stt_error_and_still_clean_up() {
        let dir = tempdir().unwrap();
        let l = listener(dir.path(), Arc::new(ToneRecorder { sample_rate: 16_000 }));

        let err = l
            .record_and_transcribe(Duration::from_millis(100), Path::new("short.wav"), false)
            .unwrap_err();
        assert!(matches!(err, ListenError::Stt(SttError::AudioTooShort)));
        assert!(!dir.path().join("short.wav").exists());
    }

    #[test]
    fn configured_sample_rate_is_used_for_the_saved_file() {
        let dir = tempdir().unwrap();
        let l = listener(dir.path(), Arc::new(ToneRecorder { sample_rate: 48_000 })).with_sample_rate(22_050);

        l.record_and_transcribe(Duration::from_secs(1), Path::new("rate.wav"), true)
            .unwrap();
        let (_, rate) = read_wav(&dir.path().join("rate.wav")).unwrap();
        assert_eq!(rate, 22_050);
    }

    #[test]
    fn capture_failure_is_reported() {
        let dir = tempdir().unwrap();
        let l = listener(dir.path(), Arc::new(DeadMic));
        let err = l
            .record_and_transcribe(Duration::from_secs(1), Path::new("x.wav"), false)
            .unwrap_err();
        assert!(matches!(err, ListenError::Capture(CaptureError::NoDevice)));
    }

    #[test]
    fn absolute_names_are_kept() {
        let dir = tempdir().unwrap();
        let l = listener(dir.path(), Arc::new(DeadMic));
        let abs = dir.path().join("elsewhere/out.wav");
        assert_eq!(l.resolve(&abs), abs);
        assert_eq!(l.resolve(Path::new("rel.wav")), dir.path().join("rel.wav"));
    }
}
