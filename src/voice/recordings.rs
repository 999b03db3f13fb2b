//! On-disk cache of synthesized phrases.
//!
//! ```text
//! dictations/
//!   2024-05-01T10-12-03.512345/
//!     settings.json     {"text": "...", "voice": "alloy"}
//!     recording.mp3
//! ```
//!
//! A phrase is synthesized once per `(text, voice)` pair and replayed from the
//! cache afterwards.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::voice::tts::{SpeechSynthesizer, TtsError};

pub const SETTINGS_FILE: &str = "settings.json";
pub const RECORDING_FILE: &str = "recording.mp3";

#[derive(Debug, Error)]
pub enum RecordingsError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not serialise recording settings: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Tts(#[from] TtsError),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> RecordingsError + '_ {
    move |source| RecordingsError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Cache key of one recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingSetting {
    pub text: String,
    #[serde(default = "default_voice")]
    pub voice: String,
}

fn default_voice() -> String {
    "alloy".into()
}

impl RecordingSetting {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: default_voice(),
        }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub settings: RecordingSetting,
    pub filename: PathBuf,
}

/// Every complete recording below the dictations directory.
#[derive(Debug)]
pub struct Recordings {
    dir: PathBuf,
    items: Vec<Recording>,
}

impl Recordings {
    /// Scan `dir`, creating it if needed.
    ///
    /// Subdirectories lacking either file are skipped, as are settings files
    /// that fail to parse.
    pub fn load(dir: impl Into<PathBuf>) -> Result<Self, RecordingsError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(io_err(&dir))?;

        let mut subdirs: Vec<PathBuf> = std::fs::read_dir(&dir)
            .map_err(io_err(&dir))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_dir())
            .collect();
        subdirs.sort();

        let mut items = Vec::new();
        for sub in subdirs {
            let settings_file = sub.join(SETTINGS_FILE);
            let recording_file = sub.join(RECORDING_FILE);
            if !settings_file.exists() || !recording_file.exists() {
                continue;
            }

            let raw = std::fs::read_to_string(&settings_file).map_err(io_err(&settings_file))?;
            match serde_json::from_str::<RecordingSetting>(&raw) {
                Ok(settings) => items.push(Recording {
                    settings,
                    filename: recording_file,
                }),
                Err(e) => log::warn!("skipping {}: {e}", settings_file.display()),
            }
        }

        log::debug!("{} cached recording(s) in {}", items.len(), dir.display());
        Ok(Self { dir, items })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Recording> {
        self.items.iter()
    }

    pub fn find(&self, settings: &RecordingSetting) -> Option<&Recording> {
        self.items.iter().find(|r| &r.settings == settings)
    }

    /// Cached recording for `settings`, synthesizing it on a miss.
    pub async fn get_or_create(
        &mut self,
        settings: &RecordingSetting,
        synth: &dyn SpeechSynthesizer,
    ) -> Result<Recording, RecordingsError> {
        if let Some(existing) = self.find(settings) {
            log::info!("Recording already exists");
            return Ok(existing.clone());
        }
        log::info!("Creating new recording");
        self.create(settings, synth).await
    }

    async fn create(
        &mut self,
        settings: &RecordingSetting,
        synth: &dyn SpeechSynthesizer,
    ) -> Result<Recording, RecordingsError> {
        let save_dir = self.unique_dir();
        std::fs::create_dir_all(&save_dir).map_err(io_err(&save_dir))?;

        let settings_file = save_dir.join(SETTINGS_FILE);
        let json = serde_json::to_string(settings)?;
        std::fs::write(&settings_file, json).map_err(io_err(&settings_file))?;

        let filename = save_dir.join(RECORDING_FILE);
        if let Err(e) = synth.synthesize(&settings.text, &settings.voice, &filename).await {
            // Half-written entries would be skipped by `load` anyway.
            let _ = std::fs::remove_dir_all(&save_dir);
            return Err(e.into());
        }

        let recording = Recording {
            settings: settings.clone(),
            filename,
        };
        self.items.push(recording.clone());
        Ok(recording)
    }

    fn unique_dir(&self) -> PathBuf {
        let stamp = chrono::Local::now()
            .format("%Y-%m-%dT%H-%M-%S%.6f")
            .to_string();
        let mut candidate = self.dir.join(&stamp);
        let mut n = 1;
        while candidate.exists() {
            candidate = self.dir.join(format!("{stamp}-{n}"));
            n += 1;
        }
        candidate
    }
}
