//! Cloudinary image storage
//!
//! Uploads and deletions are signed requests: the parameters are sorted,
//! joined as `k=v&k=v`, suffixed with the API secret and hashed with SHA-256.

use async_trait::async_trait;
use chrono::Utc;
use estate_core::{EstateError, ImageStore, ImageUpload, Result, StorageConfig};
use reqwest::{multipart, Client};
use serde::Deserialize;
use sha2::{Digest, Sha256};

const API_BASE: &str = "https://api.cloudinary.com/v1_1";

pub struct CloudinaryStore {
    client: Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
    folder: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

/// Hex SHA-256 over the sorted parameters followed by the secret
pub fn sign(params: &[(&str, &str)], secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let digest = Sha256::digest(format!("{joined}{secret}").as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// `.../image/upload/v1712/estate/abc.jpg` -> `estate/abc`
pub fn public_id_from_url(url: &str) -> Option<String> {
    let (_, path) = url.split_once("/upload/")?;
    let path = path.split(['?', '#']).next().unwrap_or(path);

    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let is_version =
        |s: &str| s.len() > 1 && s.starts_with('v') && s[1..].bytes().all(|b| b.is_ascii_digit());
    if let Some(pos) = segments.iter().position(|s| is_version(s)) {
        segments.drain(..=pos);
    }

    let last = segments.pop()?;
    let stem = last.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(last);
    segments.push(stem);

    let id = segments.join("/");
    (!id.is_empty()).then_some(id)
}

impl CloudinaryStore {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            client: Client::new(),
            cloud_name: config.cloud_name.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            folder: config.folder.clone(),
        }
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{API_BASE}/{}/image/{action}", self.cloud_name)
    }
}

#[async_trait]
impl ImageStore for CloudinaryStore {
    async fn upload(&self, image: ImageUpload) -> Result<String> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign(
            &[("folder", self.folder.as_str()), ("timestamp", timestamp.as_str())],
            &self.api_secret,
        );

        let file = multipart::Part::bytes(image.bytes)
            .file_name(image.file_name.clone())
            .mime_str(&image.content_type)
            .map_err(|e| EstateError::InvalidInput(format!("Bad image content type: {e}")))?;

        let form = multipart::Form::new()
            .part("file", file)
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", self.folder.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let response = self
            .client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| EstateError::Upstream(format!("Cloudinary upload failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(EstateError::Upstream(format!(
                "Cloudinary upload returned {status}: {error_text}"
            )));
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| EstateError::Upstream(format!("Failed to parse upload response: {e}")))?;

        tracing::debug!(file = %image.file_name, url = %body.secure_url, "Image uploaded");
        Ok(body.secure_url)
    }

    async fn delete(&self, url: &str) -> Result<()> {
        let public_id = public_id_from_url(url)
            .ok_or_else(|| EstateError::InvalidInput(format!("Not a stored image URL: {url}")))?;

        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign(
            &[("public_id", public_id.as_str()), ("timestamp", timestamp.as_str())],
            &self.api_secret,
        );

        let params = [
            ("public_id", public_id.as_str()),
            ("api_key", self.api_key.as_str()),
            ("timestamp", timestamp.as_str()),
            ("signature", signature.as_str()),
            ("signature_algorithm", "sha256"),
        ];

        let response = self
            .client
            .post(self.endpoint("destroy"))
            .form(&params)
            .send()
            .await
            .map_err(|e| EstateError::Upstream(format!("Cloudinary destroy failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(EstateError::Upstream(format!(
                "Cloudinary destroy returned {status}"
            )));
        }

        let body: DestroyResponse = response
            .json()
            .await
            .map_err(|e| EstateError::Upstream(format!("Failed to parse destroy response: {e}")))?;

        match body.result.as_str() {
            "ok" => Ok(()),
            "not found" => {
                tracing::debug!(public_id = %public_id, "Image already gone");
                Ok(())
            }
            other => Err(EstateError::Upstream(format!(
                "Cloudinary destroy result: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_id_with_version_and_folder() {
        assert_eq!(
            public_id_from_url("https://res.cloudinary.com/demo/image/upload/v1712345678/estate/abc123.jpg")
                .as_deref(),
            Some("estate/abc123")
        );
    }

    #[test]
    fn test_public_id_without_version() {
        assert_eq!(
            public_id_from_url("https://res.cloudinary.com/demo/image/upload/sample.png").as_deref(),
            Some("sample")
        );
    }

    #[test]
    fn test_public_id_rejects_foreign_urls() {
        assert_eq!(public_id_from_url("https://example.com/pic.jpg"), None);
    }

    #[test]
    fn test_signature_sorts_params() {
        let a = sign(&[("timestamp", "1"), ("folder", "estate")], "secret");
        let b = sign(&[("folder", "estate"), ("timestamp", "1")], "secret");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let expected: String = Sha256::digest(b"folder=estate&timestamp=1secret")
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        assert_eq!(a, expected);
    }
}
