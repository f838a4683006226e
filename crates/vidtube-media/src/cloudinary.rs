use anyhow::{Context, Result, anyhow, bail};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use crate::UploadedMedia;
use crate::staging::StagedFile;

const DEFAULT_API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// Remote media host speaking the Cloudinary upload API.
pub struct CloudinaryHost {
    client: reqwest::Client,
    api_base: String,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    #[serde(default)]
    duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

impl CloudinaryHost {
    pub fn new(cloud_name: String, api_key: String, api_secret: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            cloud_name,
            api_key,
            api_secret,
        }
    }

    /// Points the client at a different API root (used for local fakes).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub async fn upload(&self, file: &StagedFile) -> Result<UploadedMedia> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign(&[("timestamp", timestamp.as_str())], &self.api_secret);

        let handle = tokio::fs::File::open(file.path())
            .await
            .with_context(|| format!("opening staged file {}", file.path().display()))?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(handle));
        let mut part = Part::stream_with_length(body, file.size()).file_name(file.original_name().to_string());
        if let Some(mime) = file.content_type() {
            part = part.mime_str(mime)?;
        }

        let form = Form::new()
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature)
            .part("file", part);

        let url = format!("{}/{}/auto/upload", self.api_base, self.cloud_name);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await?
            .error_for_status()
            .context("media host rejected upload")?
            .json::<UploadResponse>()
            .await?;

        Ok(UploadedMedia {
            url: response.secure_url,
            duration: response.duration,
        })
    }

    pub async fn destroy(&self, url: &str) -> Result<()> {
        let (resource_type, public_id) =
            parse_asset_url(url).ok_or_else(|| anyhow!("Not a Cloudinary asset URL: {}", url))?;

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign(
            &[("public_id", public_id.as_str()), ("timestamp", timestamp.as_str())],
            &self.api_secret,
        );

        let endpoint = format!("{}/{}/{}/destroy", self.api_base, self.cloud_name, resource_type);
        let response = self
            .client
            .post(&endpoint)
            .form(&[
                ("public_id", public_id.as_str()),
                ("timestamp", timestamp.as_str()),
                ("api_key", self.api_key.as_str()),
                ("signature", signature.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<DestroyResponse>()
            .await?;

        match response.result.as_str() {
            "ok" => {
                info!("Destroyed {} asset {}", resource_type, public_id);
                Ok(())
            }
            "not found" => {
                warn!("Asset {} already gone", public_id);
                Ok(())
            }
            other => bail!("Destroy of {} failed: {}", public_id, other),
        }
    }
}

/// Request signature: parameters sorted by name, joined as `k=v` with `&`,
/// followed by the API secret, SHA-1 hex encoded.
pub fn sign(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted: Vec<_> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha1::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Splits a delivery URL such as
/// `https://res.cloudinary.com/demo/video/upload/v1712/folder/clip.mp4`
/// into its resource type (`video`) and public id (`folder/clip`).
pub fn parse_asset_url(url: &str) -> Option<(String, String)> {
    let (head, tail) = url.split_once("/upload/")?;
    let resource_type = head.rsplit('/').next().filter(|s| !s.is_empty())?;

    let tail = match tail.split_once('/') {
        Some((version, rest))
            if version.len() > 1
                && version.starts_with('v')
                && version[1..].chars().all(|c| c.is_ascii_digit()) =>
        {
            rest
        }
        _ => tail,
    };

    let public_id = match tail.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem,
        _ => tail,
    };
    if public_id.is_empty() {
        return None;
    }

    Some((resource_type.to_string(), public_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_order_independent_and_matches_manual_digest() {
        let a = sign(&[("timestamp", "1315060510"), ("public_id", "sample")], "abcd");
        let b = sign(&[("public_id", "sample"), ("timestamp", "1315060510")], "abcd");
        assert_eq!(a, b);

        let mut hasher = Sha1::new();
        hasher.update(b"public_id=sample&timestamp=1315060510abcd");
        assert_eq!(a, hex::encode(hasher.finalize()));
        assert_eq!(a.len(), 40);
    }

    #[test]
    fn empty_params_are_not_signed() {
        let with_empty = sign(&[("timestamp", "1"), ("folder", "")], "s");
        let without = sign(&[("timestamp", "1")], "s");
        assert_eq!(with_empty, without);
    }

    #[test]
    fn parses_versioned_and_plain_urls() {
        assert_eq!(
            parse_asset_url("https://res.cloudinary.com/demo/video/upload/v1712/folder/clip.mp4"),
            Some(("video".into(), "folder/clip".into()))
        );
        assert_eq!(
            parse_asset_url("http://res.cloudinary.com/demo/image/upload/avatar.png"),
            Some(("image".into(), "avatar".into()))
        );
        assert_eq!(parse_asset_url("https://example.com/media/a.png"), None);
    }
}
