//! Spoken feedback: text-to-speech with an on-disk phrase cache.
//!
//! ```text
//! Narrator::say(text)
//!   ├─ Recordings::get_or_create   (dictations/<stamp>/recording.mp3)
//!   │    └─ SpeechSynthesizer      (TtsClient → /v1/audio/speech)
//!   └─ AudioPlayer::play           (RodioPlayer, spawn_blocking)
//! ```

pub mod playback;
pub mod recordings;
pub mod tts;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

pub use playback::{AudioPlayer, PlaybackError, RodioPlayer};
pub use recordings::{Recording, RecordingSetting, Recordings, RecordingsError};
pub use tts::{SpeechSynthesizer, TtsClient, TtsError};

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error(transparent)]
    Recordings(#[from] RecordingsError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error("playback task failed: {0}")]
    Join(String),
}

/// Speaks a line of text to the user.
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn say(&self, text: &str) -> Result<(), VoiceError>;
}

/// Cached TTS plus local playback.
pub struct TtsNarrator {
    recordings: Mutex<Recordings>,
    synth: Arc<dyn SpeechSynthesizer>,
    player: Arc<dyn AudioPlayer>,
    voice: String,
}

impl TtsNarrator {
    pub fn new(
        recordings: Recordings,
        synth: Arc<dyn SpeechSynthesizer>,
        player: Arc<dyn AudioPlayer>,
        voice: impl Into<String>,
    ) -> Self {
        Self {
            recordings: Mutex::new(recordings),
            synth,
            player,
            voice: voice.into(),
        }
    }

    /// Fetch or synthesize `settings` and play it.
    pub async fn speak(&self, settings: &RecordingSetting) -> Result<Recording, VoiceError> {
        let recording = {
            let mut cache = self.recordings.lock().await;
            cache.get_or_create(settings, self.synth.as_ref()).await?
        };

        let player = Arc::clone(&self.player);
        let path = recording.filename.clone();
        tokio::task::spawn_blocking(move || player.play(&path))
            .await
            .map_err(|e| VoiceError::Join(e.to_string()))??;

        Ok(recording)
    }
}

#[async_trait]
impl Narrator for TtsNarrator {
    async fn say(&self, text: &str) -> Result<(), VoiceError> {
        log::info!("Saying: {text}");
        let settings = RecordingSetting::new(text).with_voice(self.voice.clone());
        self.speak(&settings).await.map(|_| ())
    }
}

/// Logs instead of speaking, for headless runs.
#[derive(Debug, Default)]
pub struct SilentNarrator;

#[async_trait]
impl Narrator for SilentNarrator {
    async fn say(&self, text: &str) -> Result<(), VoiceError> {
        log::info!("(silent) {text}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex as StdMutex;
    use tempfile::tempdir;

    struct FileSynth;

    #[async_trait]
    impl SpeechSynthesizer for FileSynth {
        async fn synthesize(&self, text: &str, voice: &str, dest: &Path) -> Result<(), TtsError> {
            std::fs::write(dest, format!("{voice}:{text}")).unwrap();
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingPlayer {
        played: StdMutex<Vec<PathBuf>>,
    }

    impl AudioPlayer for RecordingPlayer {
        fn play(&self, path: &Path) -> Result<(), PlaybackError> {
            self.played.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }
    }

    #[tokio::test]
    async fn say_uses_configured_voice_and_plays_cached_file() {
        let dir = tempdir().unwrap();
        let player = Arc::new(RecordingPlayer::default());
        let narrator = TtsNarrator::new(
            Recordings::load(dir.path()).unwrap(),
            Arc::new(FileSynth),
            player.clone(),
            "shimmer",
        );

        narrator.say("Hello").await.unwrap();
        narrator.say("Hello").await.unwrap();

        let played = player.played.lock().unwrap().clone();
        assert_eq!(played.len(), 2);
        assert_eq!(played[0], played[1]);
        assert_eq!(std::fs::read_to_string(&played[0]).unwrap(), "shimmer:Hello");
    }

    #[tokio::test]
    async fn silent_narrator_never_fails() {
        assert!(SilentNarrator.say("anything").await.is_ok());
    }
}
