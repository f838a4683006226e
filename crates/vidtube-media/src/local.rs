use anyhow::{Result, bail};
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

use crate::UploadedMedia;
use crate::staging::StagedFile;

/// Media host backed by a local directory that the server exposes over HTTP.
pub struct LocalHost {
    dir: PathBuf,
    public_url: String,
}

impl LocalHost {
    pub async fn new(dir: PathBuf, public_url: impl Into<String>) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        let public_url = public_url.into().trim_end_matches('/').to_string();
        info!("Local media directory: {} (served at {})", dir.display(), public_url);
        Ok(Self { dir, public_url })
    }

    pub async fn upload(&self, file: &StagedFile) -> Result<UploadedMedia> {
        let id = Uuid::new_v4().to_string();
        let name = match file.extension() {
            Some(ext) => format!("{}.{}", id, ext),
            None => id,
        };

        fs::copy(file.path(), self.dir.join(&name)).await?;

        Ok(UploadedMedia {
            url: format!("{}/{}", self.public_url, name),
            duration: None,
        })
    }

    pub async fn destroy(&self, url: &str) -> Result<()> {
        let Some(name) = url
            .strip_prefix(&self.public_url)
            .and_then(|rest| rest.strip_prefix('/'))
        else {
            bail!("{} is not served by this media host", url);
        };

        // Only plain file names; anything with a separator could walk out of `dir`.
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            bail!("Refusing to delete suspicious media path {}", name);
        }

        match fs::remove_file(self.dir.join(name)).await {
            Ok(()) => {
                info!("Deleted media {}", name);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Media {} already gone", name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
