//! Blocking audio-file playback through the default output device.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rodio::source::{Source, Zero};
use rodio::{Decoder, OutputStream, Sink};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("no audio output device: {0}")]
    Device(#[from] rodio::StreamError),

    #[error("could not create playback sink: {0}")]
    Sink(#[from] rodio::PlayError),

    #[error("could not decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: rodio::decoder::DecoderError,
    },

    #[error("could not open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Plays an audio file to completion.  Blocking.
pub trait AudioPlayer: Send + Sync {
    fn play(&self, path: &Path) -> Result<(), PlaybackError>;
}

/// rodio-backed player.
///
/// Some output devices swallow the first few hundred milliseconds after they
/// wake up, so `lead_in` of silence is queued ahead of the file.
#[derive(Debug, Clone)]
pub struct RodioPlayer {
    pub lead_in: Duration,
}

impl Default for RodioPlayer {
    fn default() -> Self {
        Self {
            lead_in: Duration::from_secs(1),
        }
    }
}

impl AudioPlayer for RodioPlayer {
    fn play(&self, path: &Path) -> Result<(), PlaybackError> {
        let file = File::open(path).map_err(|source| PlaybackError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let source = Decoder::new(BufReader::new(file)).map_err(|source| PlaybackError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

        let (_stream, handle) = OutputStream::try_default()?;
        let sink = Sink::try_new(&handle)?;

        if !self.lead_in.is_zero() {
            let silence =
                Zero::<f32>::new(source.channels(), source.sample_rate()).take_duration(self.lead_in);
            sink.append(silence);
        }
        sink.append(source);

        log::debug!("playing {}", path.display());
        sink.sleep_until_end();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_an_io_error() {
        let err = RodioPlayer::default()
            .play(Path::new("/nonexistent/recording.mp3"))
            .unwrap_err();
        assert!(matches!(err, PlaybackError::Io { .. }));
    }

    #[test]
    fn undecodable_file_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recording.mp3");
        std::fs::write(&path, b"definitely not audio").unwrap();

        let err = RodioPlayer::default().play(&path).unwrap_err();
        assert!(matches!(err, PlaybackError::Decode { .. }));
    }
}
