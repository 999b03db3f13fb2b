//! Settings sections, defaults and JSON persistence.
//!
//! Every subsystem owns one section struct.  A section implements
//! [`SettingsSection`], which ties it to a named block inside the shared
//! profile file:
//!
//! ```text
//! settings_files/default.json
//! {
//!     "CanvasSettings":    { "width": 550.0, ... },
//!     "OctoprintSettings": { "api_key": "...", "base_url": "..." }
//! }
//! ```
//!
//! All sections implement `Default`, so a block that is missing from the
//! file can always be materialised (and is written back for the user to
//! edit).

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AppPaths;

/// Environment variable selecting the settings profile.
pub const SETTINGS_NAME_VAR: &str = "SETTINGS_NAME";

/// Profile used when [`SETTINGS_NAME_VAR`] is unset.
pub const DEFAULT_PROFILE: &str = "default";

/// Environment variable consulted when [`OpenAiSettings::api_key`] is empty.
pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";

// ---------------------------------------------------------------------------
// SettingsError
// ---------------------------------------------------------------------------

/// Errors raised while reading or writing a settings profile.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("settings file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("settings file {0} must contain a JSON object at the top level")]
    NotAnObject(PathBuf),

    #[error("section {section} in {path} is invalid: {source}")]
    InvalidSection {
        section: &'static str,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no API key configured; set OPENAI_API_KEY or OpenAiSettings.api_key")]
    MissingApiKey,
}

// ---------------------------------------------------------------------------
// SettingsSection
// ---------------------------------------------------------------------------

/// A named, defaulted block of the settings profile.
pub trait SettingsSection: Serialize + DeserializeOwned + Default {
    /// Key of this block in the profile's top-level JSON object.
    const NAME: &'static str;
}

// ---------------------------------------------------------------------------
// SettingsStore
// ---------------------------------------------------------------------------

/// Resolve the active profile name from [`SETTINGS_NAME_VAR`].
pub fn settings_name() -> String {
    profile_name(std::env::var(SETTINGS_NAME_VAR).ok())
}

/// Profile name for a raw [`SETTINGS_NAME_VAR`] value; blank means unset.
pub fn profile_name(var: Option<String>) -> String {
    match var {
        Some(name) if !name.trim().is_empty() => name.trim().to_string(),
        _ => {
            log::info!("environment variable {SETTINGS_NAME_VAR} not set, using default settings");
            DEFAULT_PROFILE.to_string()
        }
    }
}

/// Handle to one settings profile file.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Profile selected by `SETTINGS_NAME` under the platform settings dir.
    pub fn from_env() -> Self {
        Self::from_env_in(&AppPaths::new())
    }

    /// Profile selected by `SETTINGS_NAME` under `paths.settings_dir`.
    pub fn from_env_in(paths: &AppPaths) -> Self {
        Self::for_profile(paths, &settings_name())
    }

    /// Profile `name` under `paths.settings_dir`.
    pub fn for_profile(paths: &AppPaths, name: &str) -> Self {
        Self::at(paths.settings_dir.join(format!("{name}.json")))
    }

    /// Profile at an explicit path (useful for tests).
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load section `S`.
    ///
    /// A missing file is created.  A missing block is filled with
    /// `S::default()`, written back to the file, and returned.
    pub fn load<S: SettingsSection>(&self) -> Result<S, SettingsError> {
        let mut root = self.read_root()?;

        if let Some(block) = root.get(S::NAME) {
            log::info!("loading settings for {} from {}", S::NAME, self.path.display());
            return serde_json::from_value(block.clone()).map_err(|source| {
                SettingsError::InvalidSection {
                    section: S::NAME,
                    path: self.path.clone(),
                    source,
                }
            });
        }

        let section = S::default();
        root.insert(S::NAME.to_string(), self.to_value::<S>(&section)?);
        self.write_root(&root)?;
        log::info!("added default {} block to {}", S::NAME, self.path.display());
        Ok(section)
    }

    /// Overwrite section `S`, keeping every other block intact.
    pub fn save<S: SettingsSection>(&self, section: &S) -> Result<(), SettingsError> {
        let mut root = self.read_root()?;
        root.insert(S::NAME.to_string(), self.to_value::<S>(section)?);
        self.write_root(&root)
    }

    fn to_value<S: SettingsSection>(&self, section: &S) -> Result<serde_json::Value, SettingsError> {
        serde_json::to_value(section).map_err(|source| SettingsError::InvalidSection {
            section: S::NAME,
            path: self.path.clone(),
            source,
        })
    }

    fn read_root(&self) -> Result<serde_json::Map<String, serde_json::Value>, SettingsError> {
        if !self.path.exists() {
            let empty = serde_json::Map::new();
            self.write_root(&empty)?;
            return Ok(empty);
        }

        let content = std::fs::read_to_string(&self.path).map_err(|source| SettingsError::Io {
            path: self.path.clone(),
            source,
        })?;
        let value: serde_json::Value =
            serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
                path: self.path.clone(),
                source,
            })?;

        match value {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(SettingsError::NotAnObject(self.path.clone())),
        }
    }

    fn write_root(
        &self,
        root: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), SettingsError> {
        let io_err = |source| SettingsError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = serde_json::to_string_pretty(root).map_err(|source| SettingsError::Parse {
            path: self.path.clone(),
            source,
        })?;
        std::fs::write(&self.path, content).map_err(io_err)
    }
}

// ---------------------------------------------------------------------------
// OpenAiSettings
// ---------------------------------------------------------------------------

/// Connection details shared by the image-generation and TTS clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    /// Base URL of the API, without the `/v1/...` path.
    pub base_url: String,
    /// API key.  `None` (or empty) falls back to `OPENAI_API_KEY`.
    pub api_key: Option<String>,
    /// Per-request timeout.  Image generation routinely takes tens of seconds.
    pub timeout_secs: u64,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".into(),
            api_key: None,
            timeout_secs: 120,
        }
    }
}

impl OpenAiSettings {
    /// The configured key, or the value of `OPENAI_API_KEY`.
    pub fn resolve_api_key(&self) -> Result<String, SettingsError> {
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            return Ok(key.to_string());
        }
        std::env::var(OPENAI_API_KEY_VAR)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or(SettingsError::MissingApiKey)
    }
}

impl SettingsSection for OpenAiSettings {
    const NAME: &'static str = "OpenAiSettings";
}

// ---------------------------------------------------------------------------
// ImageSettings
// ---------------------------------------------------------------------------

/// Text-to-image request parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    pub model: String,
    pub size: String,
    pub quality: String,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            model: "dall-e-3".into(),
            size: "1024x1024".into(),
            quality: "standard".into(),
        }
    }
}

impl SettingsSection for ImageSettings {
    const NAME: &'static str = "ImageSettings";
}

// ---------------------------------------------------------------------------
// SpeechSettings
// ---------------------------------------------------------------------------

/// Spoken-prompt capture and Whisper transcription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechSettings {
    /// Model id from the registry in [`crate::stt::model`].
    pub model: String,
    /// ISO-639-1 code, or `"auto"`.
    pub language: String,
    /// Length of the fixed recording window.
    pub duration_secs: u32,
    /// Sample rate the prompt WAV is written at.
    pub sample_rate: u32,
    /// Keep the prompt WAV after transcription.
    pub keep_file: bool,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            model: "tiny.en".into(),
            language: "en".into(),
            duration_secs: 10,
            sample_rate: 44_100,
            keep_file: false,
        }
    }
}

impl SettingsSection for SpeechSettings {
    const NAME: &'static str = "SpeechSettings";
}

// ---------------------------------------------------------------------------
// VoiceSettings
// ---------------------------------------------------------------------------

/// Text-to-speech request parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    pub model: String,
    pub voice: String,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            model: "tts-1".into(),
            voice: "alloy".into(),
        }
    }
}

impl SettingsSection for VoiceSettings {
    const NAME: &'static str = "VoiceSettings";
}

// ---------------------------------------------------------------------------
// TraceSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceSettings {
    /// Luma at or below which a pixel counts as ink.
    pub threshold: u8,
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self { threshold: 200 }
    }
}

impl SettingsSection for TraceSettings {
    const NAME: &'static str = "TraceSettings";
}

// ---------------------------------------------------------------------------
// CanvasSettings
// ---------------------------------------------------------------------------

/// Physical drawing surface, in millimetres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasSettings {
    pub width: f64,
    pub height: f64,
    /// Blank border kept on every side.
    pub margin: f64,
    /// Contours enclosing less than this area (mm², after scaling) are dropped.
    pub small_area_cutoff: Option<f64>,
}

impl Default for CanvasSettings {
    fn default() -> Self {
        Self {
            width: 550.0,
            height: 850.0,
            margin: 100.0,
            small_area_cutoff: None,
        }
    }
}

impl SettingsSection for CanvasSettings {
    const NAME: &'static str = "CanvasSettings";
}

// ---------------------------------------------------------------------------
// GcodeSettings
// ---------------------------------------------------------------------------

/// Toolpath emission parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GcodeSettings {
    /// Feed rate in mm/min.
    pub feedrate: u32,
    /// Pen-up height in mm.
    pub pen_up: f64,
    /// Pen-down height in mm.
    pub pen_down: f64,
    /// Points closer than this to the previous emitted point are skipped.
    pub min_step_mm: f64,
}

impl Default for GcodeSettings {
    fn default() -> Self {
        Self {
            feedrate: 30_000,
            pen_up: 50.0,
            pen_down: 0.0,
            min_step_mm: 0.5,
        }
    }
}

impl SettingsSection for GcodeSettings {
    const NAME: &'static str = "GcodeSettings";
}

// ---------------------------------------------------------------------------
// StationSettings
// ---------------------------------------------------------------------------

/// Robot station and drawing-loop parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationSettings {
    /// Station scene file.  `None` uses [`AppPaths::default_station_file`].
    pub station_file: Option<PathBuf>,
    /// Name of the program created from the G-code file.
    pub program_name: String,
    /// Tool z (mm) below which the pen is considered on the paper.
    pub pen_contact_z: f64,
    /// Busy/pose polling interval of the drawing loop.
    pub poll_interval_ms: u64,
    /// Distance the tool backs off after an interrupted drawing.
    pub retract_mm: f64,
    /// Simulator time multiplier (2.0 runs twice as fast as real time).
    pub sim_speed: f64,
}

impl Default for StationSettings {
    fn default() -> Self {
        Self {
            station_file: None,
            program_name: "drawing".into(),
            pen_contact_z: 0.05,
            poll_interval_ms: 10,
            retract_mm: 100.0,
            sim_speed: 1.0,
        }
    }
}

impl StationSettings {
    pub fn station_file_or_default(&self, paths: &AppPaths) -> PathBuf {
        self.station_file
            .clone()
            .unwrap_or_else(|| paths.default_station_file())
    }
}

impl SettingsSection for StationSettings {
    const NAME: &'static str = "StationSettings";
}

// ---------------------------------------------------------------------------
// RecorderSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderSettings {
    /// Nominal frame rate of the recording.
    pub fps: u32,
    /// Values above 1.0 slow the capture down into a timelapse.
    pub timelapse_multiplier: f64,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            fps: 20,
            timelapse_multiplier: 1.0,
        }
    }
}

impl SettingsSection for RecorderSettings {
    const NAME: &'static str = "RecorderSettings";
}

// ---------------------------------------------------------------------------
// OctoprintSettings
// ---------------------------------------------------------------------------

/// OctoPrint server connection.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OctoprintSettings {
    pub api_key: String,
    pub base_url: String,
}

impl Default for OctoprintSettings {
    fn default() -> Self {
        Self {
            api_key: "YOUR_API_KEY".into(),
            base_url: "http://3dprinter/".into(),
        }
    }
}

// The API key grants full printer control; keep it out of logs.
impl std::fmt::Debug for OctoprintSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OctoprintSettings")
            .field("api_key", &"**********")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl SettingsSection for OctoprintSettings {
    const NAME: &'static str = "OctoprintSettings";
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    // ---- profile selection ---

    #[test]
    fn profile_name_uses_the_variable_when_set() {
        assert_eq!(profile_name(Some("bench".into())), "bench");
        assert_eq!(profile_name(Some("  studio \n".into())), "studio");
    }

    #[test]
    fn unset_or_blank_variable_falls_back_to_default() {
        assert_eq!(profile_name(None), DEFAULT_PROFILE);
        assert_eq!(profile_name(Some(String::new())), DEFAULT_PROFILE);
        assert_eq!(profile_name(Some("   ".into())), DEFAULT_PROFILE);
    }

    #[test]
    fn profiles_live_in_the_settings_files_dir() {
        let dir = tempdir().expect("temp dir");
        let paths = AppPaths::rooted(dir.path().join("config"), dir.path().join("data"));

        let store = SettingsStore::for_profile(&paths, "bench");
        assert_eq!(store.path(), dir.path().join("config/settings_files/bench.json"));

        let from_env = SettingsStore::from_env_in(&paths);
        assert_eq!(
            from_env.path(),
            paths.settings_dir.join(format!("{}.json", settings_name()))
        );
        assert!(from_env.path().starts_with(dir.path().join("config/settings_files")));
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempdir().expect("temp dir");
        let store = SettingsStore::at(dir.path().join("settings_files/default.json"));

        let canvas: CanvasSettings = store.load().expect("load");
        assert_eq!(canvas, CanvasSettings::default());

        let written = std::fs::read_to_string(store.path()).expect("file written");
        let json: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(json["CanvasSettings"]["width"], 550.0);
        assert_eq!(json["CanvasSettings"]["margin"], 100.0);
    }

    #[test]
    fn existing_block_is_loaded_and_others_are_appended() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("bench.json");
        std::fs::write(
            &path,
            r#"{ "GcodeSettings": { "feedrate": 1200, "pen_up": 5.0, "pen_down": -1.0, "min_step_mm": 0.1 } }"#,
        )
        .unwrap();
        let store = SettingsStore::at(&path);

        let gcode: GcodeSettings = store.load().expect("load");
        assert_eq!(gcode.feedrate, 1200);
        assert_eq!(gcode.pen_down, -1.0);

        let _voice: VoiceSettings = store.load().expect("load voice");
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["GcodeSettings"]["feedrate"], 1200);
        assert_eq!(json["VoiceSettings"]["voice"], "alloy");
    }

    #[test]
    fn partial_block_is_filled_from_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("partial.json");
        std::fs::write(&path, r#"{ "CanvasSettings": { "margin": 20.0 } }"#).unwrap();

        let canvas: CanvasSettings = SettingsStore::at(&path).load().unwrap();
        assert_eq!(canvas.margin, 20.0);
        assert_eq!(canvas.width, 550.0);
        assert_eq!(canvas.height, 850.0);
    }

    #[test]
    fn save_replaces_only_its_block() {
        let dir = tempdir().expect("temp dir");
        let store = SettingsStore::at(dir.path().join("p.json"));
        let _: TraceSettings = store.load().unwrap();

        let octo = OctoprintSettings {
            api_key: "secret".into(),
            base_url: "http://printer.local/".into(),
        };
        store.save(&octo).unwrap();

        let loaded: OctoprintSettings = store.load().unwrap();
        assert_eq!(loaded, octo);
        let trace: TraceSettings = store.load().unwrap();
        assert_eq!(trace.threshold, 200);
    }

    #[test]
    fn non_object_root_is_rejected() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        let err = SettingsStore::at(&path).load::<TraceSettings>().unwrap_err();
        assert!(matches!(err, SettingsError::NotAnObject(_)));
    }

    #[test]
    fn invalid_block_names_the_section() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("bad_block.json");
        std::fs::write(&path, r#"{ "TraceSettings": { "threshold": "high" } }"#).unwrap();

        let err = SettingsStore::at(&path).load::<TraceSettings>().unwrap_err();
        assert!(err.to_string().contains("TraceSettings"));
    }

    #[test]
    fn configured_api_key_wins_over_environment() {
        let settings = OpenAiSettings {
            api_key: Some("sk-from-file".into()),
            ..OpenAiSettings::default()
        };
        assert_eq!(settings.resolve_api_key().unwrap(), "sk-from-file");
    }

    #[test]
    fn octoprint_debug_hides_api_key() {
        let octo = OctoprintSettings {
            api_key: "super-secret".into(),
            ..OctoprintSettings::default()
        };
        let rendered = format!("{octo:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("3dprinter"));
    }

    #[test]
    fn default_values_match_the_bench_setup() {
        let speech = SpeechSettings::default();
        assert_eq!(speech.model, "tiny.en");
        assert_eq!(speech.duration_secs, 10);

        let station = StationSettings::default();
        assert_eq!(station.program_name, "drawing");
        assert_eq!(station.poll_interval_ms, 10);
        assert!((station.pen_contact_z - 0.05).abs() < f64::EPSILON);

        assert_eq!(RecorderSettings::default().fps, 20);
        assert_eq!(ImageSettings::default().model, "dall-e-3");
    }
}
