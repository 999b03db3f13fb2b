//! Text-to-image generation.
//!
//! [`OpenAiImageGenerator`] speaks the OpenAI images API: it requests one
//! image for the line-art prompt, then downloads and decodes the returned URL.

use std::time::Duration;

use async_trait::async_trait;
use image::DynamicImage;
use thiserror::Error;

use crate::config::{ImageSettings, OpenAiSettings};
use crate::drawing::prompt::make_prompt;

// ---------------------------------------------------------------------------
// ImageGenError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ImageGenError {
    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("image request timed out")]
    Timeout,

    #[error("image API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("image API response carried no image URL")]
    MissingUrl,

    #[error("failed to retrieve image (HTTP {status})")]
    Download { status: u16 },

    #[error("could not decode generated image: {0}")]
    Decode(#[from] image::ImageError),
}

impl From<reqwest::Error> for ImageGenError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ImageGenError::Timeout
        } else {
            ImageGenError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// ImageGenerator trait
// ---------------------------------------------------------------------------

/// Produces a drawing for a short subject description.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, human_prompt: &str) -> Result<DynamicImage, ImageGenError>;
}

// ---------------------------------------------------------------------------
// OpenAiImageGenerator
// ---------------------------------------------------------------------------

pub struct OpenAiImageGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    settings: ImageSettings,
}

impl OpenAiImageGenerator {
    pub fn new(openai: &OpenAiSettings, api_key: impl Into<String>, settings: ImageSettings) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(openai.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: openai.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            settings,
        }
    }

    /// Ask the API for one image and return its URL.
    pub async fn request_image_url(&self, prompt: &str) -> Result<String, ImageGenError> {
        let url = format!("{}/v1/images/generations", self.base_url);
        let body = serde_json::json!({
            "model":   self.settings.model,
            "prompt":  prompt,
            "size":    self.settings.size,
            "quality": self.settings.quality,
            "n":       1,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImageGenError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let json: serde_json::Value = response.json().await?;
        json["data"][0]["url"]
            .as_str()
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .ok_or(ImageGenError::MissingUrl)
    }

    /// GET `url` and decode the body.
    pub async fn download(&self, url: &str) -> Result<DynamicImage, ImageGenError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(ImageGenError::Download {
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await?;
        Ok(image::load_from_memory(&bytes)?)
    }
}

#[async_trait]
impl ImageGenerator for OpenAiImageGenerator {
    async fn generate(&self, human_prompt: &str) -> Result<DynamicImage, ImageGenError> {
        log::info!("Generating drawing for prompt: {human_prompt}");
        let url = self.request_image_url(&make_prompt(human_prompt)).await?;
        log::info!("Generated image at {url}");
        self.download(&url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{serve, serve_with, Canned};
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let img = RgbImage::from_pixel(4, 3, Rgb([255, 255, 255]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn generator(base: &str) -> OpenAiImageGenerator {
        let openai = OpenAiSettings {
            base_url: base.to_string(),
            ..OpenAiSettings::default()
        };
        OpenAiImageGenerator::new(&openai, "sk-test", ImageSettings::default())
    }

    #[tokio::test]
    async fn generates_then_downloads_the_image() {
        let (base, server) = serve_with(|base| {
            vec![
                Canned::json(200, serde_json::json!({"data": [{"url": format!("{base}/img.png")}]})),
                Canned::bytes(200, "image/png", png_bytes()),
            ]
        })
        .await;

        let img = generator(&base).generate("cat").await.unwrap();
        assert_eq!((img.width(), img.height()), (4, 3));

        let requests = server.await.unwrap();
        assert_eq!(requests[0].path, "/v1/images/generations");
        let body = requests[0].body_json();
        assert_eq!(body["model"], "dall-e-3");
        assert_eq!(body["size"], "1024x1024");
        assert_eq!(body["quality"], "standard");
        assert_eq!(body["n"], 1);
        assert!(body["prompt"].as_str().unwrap().contains("drawing of a cat"));
        assert_eq!(requests[1].method, "GET");
        assert_eq!(requests[1].path, "/img.png");
    }

    #[tokio::test]
    async fn failed_download_is_a_download_error() {
        let (base, _server) = serve_with(|base| {
            vec![
                Canned::json(200, serde_json::json!({"data": [{"url": format!("{base}/gone.png")}]})),
                Canned::bytes(404, "text/plain", b"not found".to_vec()),
            ]
        })
        .await;

        let err = generator(&base).generate("cat").await.unwrap_err();
        assert!(matches!(err, ImageGenError::Download { status: 404 }));
    }

    #[tokio::test]
    async fn response_without_url_is_rejected() {
        let (base, _server) = serve(vec![Canned::json(200, serde_json::json!({"data": []}))]).await;
        let err = generator(&base).generate("cat").await.unwrap_err();
        assert!(matches!(err, ImageGenError::MissingUrl));
    }

    #[tokio::test]
    async fn api_error_status_is_surfaced() {
        let (base, _server) =
            serve(vec![Canned::json(400, serde_json::json!({"error": "content policy"}))]).await;
        let err = generator(&base).generate("cat").await.unwrap_err();
        assert!(matches!(err, ImageGenError::Api { status: 400, .. }));
    }
}
