//! OctoPrint REST client.
//!
//! Only the file-upload endpoint is used: the G-code is uploaded to local
//! storage and, optionally, selected and started in the same request.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use thiserror::Error;

use crate::config::OctoprintSettings;

#[derive(Debug, Error)]
pub enum PrinterError {
    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("OctoPrint request timed out")]
    Timeout,

    #[error("OctoPrint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to parse OctoPrint response: {0}")]
    Parse(String),

    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<reqwest::Error> for PrinterError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            PrinterError::Timeout
        } else {
            PrinterError::Request(e.to_string())
        }
    }
}

/// One stored file as reported after an upload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadedFile {
    pub name: String,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub refs: HashMap<String, String>,
}

/// Body of a successful `POST /api/files/local`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub done: bool,
    /// Keyed by storage location (`"local"`).
    #[serde(default)]
    pub files: HashMap<String, UploadedFile>,
}

pub struct OctoPrintClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OctoPrintClient {
    pub fn new(settings: &OctoprintSettings) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
        }
    }

    /// Upload `path` to local storage; `select` loads it, `print` starts it.
    pub async fn upload(&self, path: &Path, select: bool, print: bool) -> Result<UploadResponse, PrinterError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| PrinterError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "drawing.gcode".into());

        let form = Form::new()
            .part(
                "file",
                Part::bytes(bytes)
                    .file_name(file_name.clone())
                    .mime_str("application/octet-stream")?,
            )
            .text("select", select.to_string())
            .text("print", print.to_string());

        let url = format!("{}/api/files/local", self.base_url);
        log::info!("Uploading {file_name} to {url} (select={select}, print={print})");

        let response = self
            .client
            .post(&url)
            .header("X-Api-Key", &self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(PrinterError::Status {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|e| PrinterError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{serve, Canned};
    use tempfile::tempdir;

    fn settings(base: &str) -> OctoprintSettings {
        OctoprintSettings {
            api_key: "octo-key".into(),
            base_url: format!("{base}/"),
        }
    }

    #[tokio::test]
    async fn uploads_multipart_with_api_key() {
        let (base, server) = serve(vec![Canned::json(
            201,
            serde_json::json!({
                "done": true,
                "files": {"local": {"name": "drawing.nc", "origin": "local",
                                    "refs": {"resource": "http://x/api/files/local/drawing.nc"}}}
            }),
        )])
        .await;
        let dir = tempdir().unwrap();
        let file = dir.path().join("drawing.nc");
        std::fs::write(&file, "G21 ; Set units to mm\nG0 F30000").unwrap();

        let resp = OctoPrintClient::new(&settings(&base))
            .upload(&file, true, true)
            .await
            .unwrap();
        assert!(resp.done);
        assert_eq!(resp.files["local"].name, "drawing.nc");

        let req = &server.await.unwrap()[0];
        assert_eq!(req.method, "POST");
        assert_eq!(req.path, "/api/files/local");
        assert_eq!(req.header("x-api-key"), Some("octo-key"));
        assert!(req.header("content-type").unwrap().starts_with("multipart/form-data"));
        let body = req.body_text();
        assert!(body.contains("filename=\"drawing.nc\""));
        assert!(body.contains("G0 F30000"));
        assert!(body.contains("name=\"select\"\r\n\r\ntrue"));
        assert!(body.contains("name=\"print\"\r\n\r\ntrue"));
    }

    #[tokio::test]
    async fn rejected_upload_reports_status() {
        let (base, _server) = serve(vec![Canned::bytes(403, "text/plain", b"Invalid API key".to_vec())]).await;
        let dir = tempdir().unwrap();
        let file = dir.path().join("drawing.nc");
        std::fs::write(&file, "G21").unwrap();

        let err = OctoPrintClient::new(&settings(&base))
            .upload(&file, true, false)
            .await
            .unwrap_err();
        assert!(matches!(err, PrinterError::Status { status: 403, .. }));
    }

    #[tokio::test]
    async fn missing_file_fails_before_any_request() {
        let err = OctoPrintClient::new(&OctoprintSettings::default())
            .upload(Path::new("/nonexistent/drawing.nc"), true, true)
            .await
            .unwrap_err();
        assert!(matches!(err, PrinterError::Io { .. }));
    }
}
