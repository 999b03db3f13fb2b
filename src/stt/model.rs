//! Whisper GGML model registry and on-disk path resolution.
//!
//! The prompt is a short English phrase, so the small English-only models
//! are the useful ones; `tiny.en` is the default.

use std::path::PathBuf;

use crate::config::AppPaths;

/// Static metadata for one GGML model file.
#[derive(Debug)]
pub struct ModelInfo {
    /// Identifier used in `SpeechSettings::model` (e.g. `"tiny.en"`).
    pub id: &'static str,
    /// File name under the models directory.
    pub file_name: &'static str,
    pub file_size_mb: u64,
    /// `"en"` for English-only models, `"multilingual"` otherwise.
    pub language: &'static str,
}

const DOWNLOAD_BASE: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

pub const WHISPER_MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: "tiny.en",
        file_name: "ggml-tiny.en.bin",
        file_size_mb: 75,
        language: "en",
    },
    ModelInfo {
        id: "base.en",
        file_name: "ggml-base.en.bin",
        file_size_mb: 142,
        language: "en",
    },
    ModelInfo {
        id: "small.en",
        file_name: "ggml-small.en.bin",
        file_size_mb: 466,
        language: "en",
    },
    ModelInfo {
        id: "tiny",
        file_name: "ggml-tiny.bin",
        file_size_mb: 75,
        language: "multilingual",
    },
    ModelInfo {
        id: "base",
        file_name: "ggml-base.bin",
        file_size_mb: 142,
        language: "multilingual",
    },
];

impl ModelInfo {
    pub fn download_url(&self) -> String {
        format!("{DOWNLOAD_BASE}/{}", self.file_name)
    }
}

pub fn find_model_by_id(id: &str) -> Option<&'static ModelInfo> {
    WHISPER_MODELS.iter().find(|m| m.id == id)
}

/// Resolves model files below the models directory.
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub models_dir: PathBuf,
}

impl ModelPaths {
    pub fn from_app_paths(app_paths: &AppPaths) -> Self {
        Self::new(app_paths.models_dir.clone())
    }

    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
        }
    }

    /// Path of the model with `id`.
    ///
    /// Ids missing from the registry map to `ggml-<id>.bin`, so hand-placed
    /// models can still be selected.
    pub fn model_path(&self, id: &str) -> PathBuf {
        match find_model_by_id(id) {
            Some(model) => self.models_dir.join(model.file_name),
            None => self.models_dir.join(format!("ggml-{id}.bin")),
        }
    }

    pub fn is_available(&self, id: &str) -> bool {
        self.model_path(id).exists()
    }
}
