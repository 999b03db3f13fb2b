//! OpenAI-compatible text-to-speech client.
//!
//! Calls `POST {base_url}/v1/audio/speech` and streams the returned audio
//! straight into a file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::config::{OpenAiSettings, VoiceSettings};

// ---------------------------------------------------------------------------
// TtsError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TtsError {
    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("TTS request timed out")]
    Timeout,

    #[error("TTS endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not write speech to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<reqwest::Error> for TtsError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TtsError::Timeout
        } else {
            TtsError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// SpeechSynthesizer trait
// ---------------------------------------------------------------------------

/// Turns text into an audio file at `dest`.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &str, dest: &Path) -> Result<(), TtsError>;
}

// ---------------------------------------------------------------------------
// TtsClient
// ---------------------------------------------------------------------------

pub struct TtsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl TtsClient {
    pub fn new(openai: &OpenAiSettings, api_key: impl Into<String>, voice: &VoiceSettings) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(openai.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: openai.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: voice.model.clone(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for TtsClient {
    async fn synthesize(&self, text: &str, voice: &str, dest: &Path) -> Result<(), TtsError> {
        let url = format!("{}/v1/audio/speech", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "voice": voice,
            "input": text,
        });

        let mut response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TtsError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let io_err = |source| TtsError::Io {
            path: dest.to_path_buf(),
            source,
        };
        let mut file = tokio::fs::File::create(dest).await.map_err(io_err)?;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await.map_err(io_err)?;
        }
        file.flush().await.map_err(io_err)?;

        log::debug!("speech written to {}", dest.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{serve, Canned};
    use tempfile::tempdir;

    fn client(base_url: &str) -> TtsClient {
        let openai = OpenAiSettings {
            base_url: base_url.to_string(),
            ..OpenAiSettings::default()
        };
        TtsClient::new(&openai, "sk-test", &VoiceSettings::default())
    }

    #[tokio::test]
    async fn posts_model_voice_and_input_and_writes_body() {
        let (base, server) =
            serve(vec![Canned::bytes(200, "audio/mpeg", b"ID3fake-mp3".to_vec())]).await;
        let dir = tempdir().unwrap();
        let dest = dir.path().join("recording.mp3");

        client(&base).synthesize("hello there", "nova", &dest).await.unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"ID3fake-mp3");
        let req = &server.await.unwrap()[0];
        assert_eq!(req.method, "POST");
        assert_eq!(req.path, "/v1/audio/speech");
        assert_eq!(req.header("authorization"), Some("Bearer sk-test"));
        let json = req.body_json();
        assert_eq!(json["model"], "tts-1");
        assert_eq!(json["voice"], "nova");
        assert_eq!(json["input"], "hello there");
    }

    #[tokio::test]
    async fn error_status_is_reported_and_no_file_is_written() {
        let (base, _server) = serve(vec![Canned::json(
            401,
            serde_json::json!({"error": {"message": "bad key"}}),
        )])
        .await;
        let dir = tempdir().unwrap();
        let dest = dir.path().join("recording.mp3");

        let err = client(&base).synthesize("x", "alloy", &dest).await.unwrap_err();
        assert!(matches!(err, TtsError::Status { status: 401, .. }));
        assert!(!dest.exists());
    }
}
