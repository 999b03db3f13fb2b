//! Configuration module for drawbot.
//!
//! Provides `AppPaths` for cross-platform data directories and the
//! `SettingsStore`, which persists one JSON block per subsystem inside a
//! profile file chosen by the `SETTINGS_NAME` environment variable.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    profile_name, settings_name, CanvasSettings, GcodeSettings, ImageSettings, OctoprintSettings,
    OpenAiSettings, RecorderSettings, SettingsError, SettingsSection, SettingsStore,
    SpeechSettings, StationSettings, TraceSettings, VoiceSettings,
};
