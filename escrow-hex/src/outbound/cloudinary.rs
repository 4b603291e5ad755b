//! Cloudinary image hosting.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{
    Client,
    multipart::{Form, Part},
};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use escrow_types::ports::{GatewayError, ImageStore, ImageUpload};

use super::{http_error, json_response};

pub const DEFAULT_UPLOAD_FOLDER: &str = "nest-uploads";

const API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// Signed uploads to a Cloudinary account.
pub struct CloudinaryStore {
    http: Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
    folder: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
}

impl CloudinaryStore {
    pub fn new(
        cloud_name: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        folder: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            cloud_name: cloud_name.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            folder: folder.into(),
        }
    }

    fn upload_url(&self) -> String {
        format!("{}/{}/image/upload", API_BASE, self.cloud_name)
    }
}

/// Request signature: `k=v` pairs sorted by key, joined with `&`, secret
/// appended, SHA-256 hex digest.
pub(crate) fn sign_params(params: &[(&str, String)], secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl ImageStore for CloudinaryStore {
    async fn upload(&self, image: ImageUpload) -> Result<String, GatewayError> {
        let timestamp = Utc::now().timestamp().to_string();
        let signed = [
            ("folder", self.folder.clone()),
            ("timestamp", timestamp.clone()),
        ];
        let signature = sign_params(&signed, &self.api_secret);

        let mut part = Part::bytes(image.bytes).file_name(image.file_name);
        if let Some(content_type) = image.content_type {
            part = part.mime_str(&content_type).map_err(http_error)?;
        }

        let form = Form::new()
            .part("file", part)
            .text("api_key", self.api_key.clone())
            .text("folder", self.folder.clone())
            .text("timestamp", timestamp)
            .text("signature_algorithm", "sha256")
            .text("signature", signature);

        let response = self
            .http
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await
            .map_err(http_error)?;

        let uploaded: UploadResponse = json_response(response).await?;
        tracing::debug!(url = %uploaded.secure_url, "Image uploaded");
        Ok(uploaded.secure_url)
    }
}
