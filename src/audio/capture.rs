//! Fixed-length microphone recordings via `cpal`.
//!
//! ```text
//! Microphone::record(d)
//!   └─ cpal input stream ─► callback down-mixes ─► InputBlock (mpsc)
//!        ─► take_frames(wanted) ─► CapturedAudio { mono, device rate }
//! ```
//!
//! The stream lives only for the duration of one recording.

use std::sync::mpsc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use crate::audio::stereo_to_mono;

/// A recording fails when the device goes quiet for this long.
const STALL_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("input stream stopped delivering audio")]
    Stalled,
}

/// One callback's worth of mono samples.
type InputBlock = Vec<f32>;

/// A finished mono recording at the device's native rate.
#[derive(Debug, Clone)]
pub struct CapturedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl CapturedAudio {
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// The default input device, opened for fixed-length recordings.
///
/// ```rust,no_run
/// use std::time::Duration;
/// use drawbot::audio::Microphone;
///
/// let mic = Microphone::open().unwrap();
/// let audio = mic.record(Duration::from_secs(10)).unwrap();
/// println!("{:.1} s @ {} Hz", audio.duration_secs(), audio.sample_rate);
/// ```
pub struct Microphone {
    device: cpal::Device,
    config: cpal::StreamConfig,
}

impl Microphone {
    pub fn open() -> Result<Self, CaptureError> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or(CaptureError::NoDevice)?;
        let config: cpal::StreamConfig = device.default_input_config()?.into();
        log::debug!(
            "input device: {} Hz, {} ch",
            config.sample_rate.0,
            config.channels
        );
        Ok(Self { device, config })
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    /// Record `duration` of mono audio.  Blocking.
    pub fn record(&self, duration: Duration) -> Result<CapturedAudio, CaptureError> {
        let sample_rate = self.sample_rate();
        let channels = self.config.channels;
        let wanted = (duration.as_secs_f64() * f64::from(sample_rate)).round() as usize;

        let (tx, rx) = mpsc::channel::<InputBlock>();
        let stream = self.device.build_input_stream(
            &self.config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // The receiver is gone once enough frames were taken.
                let _ = tx.send(stereo_to_mono(data, channels));
            },
            |err: cpal::StreamError| log::error!("cpal stream error: {err}"),
            None,
        )?;

        log::info!("Recording...");
        stream.play()?;
        let samples = take_frames(&rx, wanted, STALL_TIMEOUT);
        drop(stream);
        let samples = samples?;
        log::info!("Recording finished ({:.1} s)", samples.len() as f32 / sample_rate as f32);

        Ok(CapturedAudio {
            samples,
            sample_rate,
        })
    }
}

/// Concatenate blocks from `rx` until exactly `wanted` samples are held.
fn take_frames(
    rx: &mpsc::Receiver<InputBlock>,
    wanted: usize,
    stall: Duration,
) -> Result<Vec<f32>, CaptureError> {
    let mut out = Vec::with_capacity(wanted);
    while out.len() < wanted {
        let block = rx.recv_timeout(stall).map_err(|_| CaptureError::Stalled)?;
        out.extend(block);
    }
    out.truncate(wanted);
    Ok(out)
}
