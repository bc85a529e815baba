use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http::{check_status, request_error};
use super::{GatewayError, Result};
use crate::config::ArtConfig;

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model_name: &'a str,
    prompt: &'a str,
    steps: u32,
    cfg_scale: f32,
    enable_refiner: bool,
    height: u32,
    width: u32,
    backend: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    images: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    image: Option<String>,
}

/// Text-to-image client (Hyperbolic-style `/image/generation`)
pub struct ArtClient {
    client: reqwest::Client,
    config: ArtConfig,
}

impl ArtClient {
    pub fn new(client: reqwest::Client, config: ArtConfig) -> Self {
        Self { client, config }
    }

    pub async fn generate(&self, prompt: &str) -> Result<Vec<u8>> {
        let request = ImageRequest {
            model_name: &self.config.model,
            prompt,
            steps: self.config.steps,
            cfg_scale: self.config.cfg_scale,
            enable_refiner: false,
            height: self.config.height,
            width: self.config.width,
            backend: "auto",
        };

        let url = format!(
            "{}/image/generation",
            self.config.base_url.trim_end_matches('/')
        );
        debug!("Sending image request to {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(request_error)?;

        let response = check_status(response).await?;

        let body: ImageResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(format!("image response: {e}")))?;

        decode_image(body)
    }
}

fn decode_image(body: ImageResponse) -> Result<Vec<u8>> {
    let encoded = body
        .images
        .into_iter()
        .next()
        .and_then(|img| img.image)
        .ok_or_else(|| GatewayError::InvalidResponse("no image data in response".to_string()))?;

    base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| GatewayError::InvalidResponse(format!("image is not valid base64: {e}")))
}
