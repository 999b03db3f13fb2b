//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings profiles):
//!   Windows: %APPDATA%\drawbot\settings_files\
//!   macOS:   ~/Library/Application Support/drawbot/settings_files/
//!   Linux:   ~/.config/drawbot/settings_files/
//!
//! Data dir (models, caches, outputs, logs):
//!   Windows: %LOCALAPPDATA%\drawbot\
//!   macOS:   ~/Library/Application Support/drawbot/
//!   Linux:   ~/.local/share/drawbot/

use std::path::PathBuf;

/// Holds all resolved application directory paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Root config directory.
    pub config_dir: PathBuf,
    /// Directory holding one `<profile>.json` settings file per profile.
    pub settings_dir: PathBuf,
    /// Directory for downloaded GGML Whisper model files.
    pub models_dir: PathBuf,
    /// Cache of synthesized speech, one sub-directory per recording.
    pub dictations_dir: PathBuf,
    /// Spoken prompts captured from the microphone.
    pub prompt_recordings_dir: PathBuf,
    /// Generated `.nc` G-code files.
    pub gcode_dir: PathBuf,
    /// Frame sequences captured from the simulated camera.
    pub recordings_dir: PathBuf,
    /// Per-command log files.
    pub logs_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "drawbot";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        Self::rooted(config_dir, data_dir)
    }

    /// Lay the tree out below explicit roots (tests, portable installs).
    pub fn rooted(config_dir: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            settings_dir: config_dir.join("settings_files"),
            config_dir,
            models_dir: data_dir.join("models"),
            dictations_dir: data_dir.join("dictations"),
            prompt_recordings_dir: data_dir.join("prompts"),
            gcode_dir: data_dir.join("gcode"),
            recordings_dir: data_dir.join("recordings"),
            logs_dir: data_dir.join("logs"),
        }
    }

    /// Default station scene shipped next to the settings profiles.
    pub fn default_station_file(&self) -> PathBuf {
        self.config_dir.join("main_station.json")
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_non_empty() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths.models_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths
            .settings_dir
            .file_name()
            .is_some_and(|n| n == "settings_files"));
    }

    #[test]
    fn rooted_layout_keeps_outputs_under_data_dir() {
        let paths = AppPaths::rooted(PathBuf::from("/cfg"), PathBuf::from("/data"));
        assert_eq!(paths.settings_dir, PathBuf::from("/cfg/settings_files"));
        assert_eq!(paths.gcode_dir, PathBuf::from("/data/gcode"));
        assert_eq!(paths.dictations_dir, PathBuf::from("/data/dictations"));
        assert_eq!(
            paths.default_station_file(),
            PathBuf::from("/cfg/main_station.json")
        );
    }
}
