//! Upload pipeline: incoming files are staged on local disk, then handed to a
//! media host that stores them and returns a public URL.

pub mod cloudinary;
pub mod local;
pub mod staging;

use anyhow::Result;
use tracing::info;

pub use cloudinary::CloudinaryHost;
pub use local::LocalHost;
pub use staging::{StagedFile, StagingWriter, TempStore};

/// Result of transferring a staged file to the media host.
#[derive(Debug, Clone)]
pub struct UploadedMedia {
    pub url: String,
    /// Playback length in seconds, when the host can tell.
    pub duration: Option<f64>,
}

/// Where uploaded media ends up.
pub enum MediaHost {
    Local(LocalHost),
    Cloudinary(CloudinaryHost),
}

impl MediaHost {
    pub async fn upload(&self, file: &StagedFile) -> Result<UploadedMedia> {
        let uploaded = match self {
            Self::Local(host) => host.upload(file).await?,
            Self::Cloudinary(host) => host.upload(file).await?,
        };
        info!(
            "Uploaded {} ({} bytes) to {}",
            file.original_name(),
            file.size(),
            uploaded.url
        );
        Ok(uploaded)
    }

    /// Removes a previously uploaded asset by its public URL.
    pub async fn destroy(&self, url: &str) -> Result<()> {
        match self {
            Self::Local(host) => host.destroy(url).await,
            Self::Cloudinary(host) => host.destroy(url).await,
        }
    }
}
