//! Frame-sequence recording of the simulated drawing.
//!
//! One worker thread pulls frames from a [`FrameSource`] and writes them as
//! numbered PNGs into `<recordings>/<timestamp>/`.  The only shared state is
//! the `recording` flag.
//!
//! ```text
//! start() ─► first frame (must exist) ─► spawn worker ─┐
//!                                                       ├─ loop while flag: snapshot → frame_NNNNN.png → sleep(delay)
//! stop()  ─► flag = false ─► join ◄─────────────────────┘
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use image::RgbImage;
use thiserror::Error;

use crate::config::RecorderSettings;

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("could not get frame from camera")]
    NoFrame,

    #[error("recorder is already running")]
    AlreadyRecording,

    #[error("recorder is not running")]
    NotRecording,

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not write frame {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("recording thread panicked")]
    WorkerPanicked,
}

/// Something that can produce a picture of the scene.
pub trait FrameSource: Send + Sync {
    /// Current frame, or `None` if none is available right now.
    fn snapshot(&self) -> Option<RgbImage>;
}

/// Result of a finished recording.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSummary {
    pub dir: PathBuf,
    pub frames: usize,
}

/// Seconds between frames: `timelapse_multiplier / fps`.
pub fn frame_delay(settings: &RecorderSettings) -> Duration {
    let fps = settings.fps.max(1) as f64;
    Duration::from_secs_f64((settings.timelapse_multiplier.max(0.0)) / fps)
}

pub fn frame_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("frame_{index:05}.png"))
}

fn save_frame(dir: &Path, index: usize, frame: &RgbImage) -> Result<(), RecorderError> {
    let path = frame_path(dir, index);
    frame
        .save(&path)
        .map_err(|source| RecorderError::Encode { path, source })
}

pub struct CameraRecorder {
    source: Arc<dyn FrameSource>,
    recordings_dir: PathBuf,
    frame_delay: Duration,
    recording: Arc<Mutex<bool>>,
    worker: Option<(PathBuf, JoinHandle<Result<usize, RecorderError>>)>,
}

impl CameraRecorder {
    pub fn new(
        source: Arc<dyn FrameSource>,
        recordings_dir: impl Into<PathBuf>,
        settings: &RecorderSettings,
    ) -> Self {
        let frame_delay = frame_delay(settings);
        log::info!("frame delay: {:?}", frame_delay);
        Self {
            source,
            recordings_dir: recordings_dir.into(),
            frame_delay,
            recording: Arc::new(Mutex::new(false)),
            worker: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        *self.recording.lock().unwrap()
    }

    /// Grab the first frame and start the worker.  Returns the output dir.
    pub fn start(&mut self) -> Result<PathBuf, RecorderError> {
        if self.worker.is_some() {
            return Err(RecorderError::AlreadyRecording);
        }

        let first = self.source.snapshot().ok_or(RecorderError::NoFrame)?;

        let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
        let mut dir = self.recordings_dir.join(&stamp);
        let mut n = 1;
        while dir.exists() {
            dir = self.recordings_dir.join(format!("{stamp}-{n}"));
            n += 1;
        }
        std::fs::create_dir_all(&dir).map_err(|source| RecorderError::Io {
            path: dir.clone(),
            source,
        })?;
        save_frame(&dir, 0, &first)?;
        log::info!(
            "Recording {}x{} frames to {}",
            first.width(),
            first.height(),
            dir.display()
        );

        *self.recording.lock().unwrap() = true;

        let source = Arc::clone(&self.source);
        let recording = Arc::clone(&self.recording);
        let delay = self.frame_delay;
        let out = dir.clone();
        let handle = std::thread::spawn(move || -> Result<usize, RecorderError> {
            let mut written = 1;
            loop {
                if !*recording.lock().unwrap() {
                    break;
                }
                match source.snapshot() {
                    Some(frame) => {
                        if let Err(e) = save_frame(&out, written, &frame) {
                            *recording.lock().unwrap() = false;
                            return Err(e);
                        }
                        written += 1;
                        log::debug!("Frame written");
                    }
                    None => log::warn!("Frame not written"),
                }
                std::thread::sleep(delay);
            }
            log::info!("Recording stopped after {written} frame(s)");
            Ok(written)
        });

        self.worker = Some((dir.clone(), handle));
        Ok(dir)
    }

    /// Stop the worker and wait for it.
    pub fn stop(&mut self) -> Result<RecordingSummary, RecorderError> {
        let (dir, handle) = self.worker.take().ok_or(RecorderError::NotRecording)?;
        *self.recording.lock().unwrap() = false;
        let frames = handle.join().map_err(|_| RecorderError::WorkerPanicked)??;
        log::info!("Video frames saved at {}", dir.display());
        Ok(RecordingSummary { dir, frames })
    }
}

impl Drop for CameraRecorder {
    fn drop(&mut self) {
        if self.worker.is_some() {
            if let Err(e) = self.stop() {
                log::warn!("recorder stopped with error: {e}");
            }
        }
    }
}
