//! Content-addressed publication store.
//!
//! [`ContentStore`] is the seam the pinning protocol publishes through.
//! [`PinataClient`] implements it against the Pinata pinning API:
//!
//! ```bash
//! PINATA_JWT=eyJ...
//! PINATA_API_URL=https://api.pinata.cloud
//! PINATA_GATEWAY=example.mypinata.cloud
//! ```

use async_trait::async_trait;
use reqwest::{multipart, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::PinataConfig;
use crate::error::{AppError, Result};

const DEFAULT_GATEWAY: &str = "gateway.pinata.cloud";

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Publish a JSON document and return its content identifier.
    async fn pin_json(&self, name: &str, document: &serde_json::Value) -> Result<String>;

    /// Fetch the file at `file_url` and publish its bytes.
    async fn pin_file(&self, name: &str, file_url: &str, content_type: &str) -> Result<String>;

    /// Public retrieval URL for a content identifier.
    fn gateway_url(&self, content_id: &str) -> String;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PinJsonRequest<'a> {
    pinata_content: &'a serde_json::Value,
    pinata_metadata: PinMetadata<'a>,
}

#[derive(Debug, Serialize)]
struct PinMetadata<'a> {
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

/// Pinata REST client
pub struct PinataClient {
    client: Client,
    config: PinataConfig,
}

impl PinataClient {
    pub fn new(config: PinataConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        info!(api_url = %config.api_url, "Pinata content store initialized");
        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_url.trim_end_matches('/'), path)
    }

    async fn read_pin_response(response: reqwest::Response, what: &str) -> Result<String> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalUnavailable(format!(
                "Pinata {} failed: {} - {}",
                what, status, body
            )));
        }
        let pinned: PinResponse = response.json().await.map_err(|e| {
            AppError::ExternalUnavailable(format!("Failed to parse Pinata response: {}", e))
        })?;
        Ok(pinned.ipfs_hash)
    }
}

#[async_trait]
impl ContentStore for PinataClient {
    async fn pin_json(&self, name: &str, document: &serde_json::Value) -> Result<String> {
        let request = PinJsonRequest {
            pinata_content: document,
            pinata_metadata: PinMetadata { name },
        };
        debug!(name, "Pinning JSON document");

        let response = self
            .client
            .post(self.endpoint("pinning/pinJSONToIPFS"))
            .bearer_auth(&self.config.jwt)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::ExternalUnavailable(format!("Pinata request failed: {}", e)))?;

        Self::read_pin_response(response, "JSON pin").await
    }

    async fn pin_file(&self, name: &str, file_url: &str, content_type: &str) -> Result<String> {
        let download = self
            .client
            .get(file_url)
            .send()
            .await
            .map_err(|e| AppError::ExternalUnavailable(format!("File download failed: {}", e)))?;
        if !download.status().is_success() {
            return Err(AppError::ExternalUnavailable(format!(
                "File download failed: {}",
                download.status()
            )));
        }
        let bytes = download
            .bytes()
            .await
            .map_err(|e| AppError::ExternalUnavailable(format!("File download failed: {}", e)))?;
        debug!(name, size = bytes.len(), "Pinning file");

        let part = multipart::Part::bytes(bytes.to_vec())
            .file_name(name.to_string())
            .mime_str(content_type)
            .map_err(|e| AppError::Validation(format!("Invalid content type: {}", e)))?;
        let metadata = serde_json::json!({ "name": name }).to_string();
        let form = multipart::Form::new()
            .part("file", part)
            .text("pinataMetadata", metadata);

        let response = self
            .client
            .post(self.endpoint("pinning/pinFileToIPFS"))
            .bearer_auth(&self.config.jwt)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::ExternalUnavailable(format!("Pinata request failed: {}", e)))?;

        Self::read_pin_response(response, "file pin").await
    }

    fn gateway_url(&self, content_id: &str) -> String {
        let gateway = self.config.gateway.as_deref().unwrap_or(DEFAULT_GATEWAY);
        format!("https://{}/ipfs/{}", gateway, content_id)
    }
}
