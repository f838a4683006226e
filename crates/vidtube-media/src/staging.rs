use anyhow::{Result, bail};
use rand::Rng;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Upper bound on the sanitized part of a staged file name.
const MAX_NAME_LEN: usize = 100;

/// Attempts at finding an unused staged name before giving up.
const NAME_ATTEMPTS: usize = 8;

/// Temporary on-disk area where multipart files land before transfer.
///
/// Files are named `{original name}-{random suffix}` and are removed as soon
/// as their [`StagedFile`] handle is dropped.
pub struct TempStore {
    dir: PathBuf,
}

impl TempStore {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Upload staging directory: {}", dir.display());
        Ok(Self { dir })
    }

    /// Opens a fresh staged file for `original_name`.
    pub async fn create(
        &self,
        original_name: &str,
        content_type: Option<String>,
    ) -> Result<StagingWriter> {
        let base = sanitize_file_name(original_name);

        for _ in 0..NAME_ATTEMPTS {
            let suffix: u32 = rand::rng().random_range(0..100_000);
            let path = self.dir.join(format!("{}-{}", base, suffix));
            match fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => {
                    debug!("Staging upload at {}", path.display());
                    return Ok(StagingWriter {
                        file,
                        staged: StagedFile {
                            path,
                            original_name: original_name.to_string(),
                            content_type,
                            size: 0,
                        },
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }

        bail!("Could not find a free staging name for {}", original_name)
    }
}

/// Open handle used while a multipart field streams in.
pub struct StagingWriter {
    file: fs::File,
    staged: StagedFile,
}

impl StagingWriter {
    pub async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        self.file.write_all(chunk).await?;
        self.staged.size += chunk.len() as u64;
        Ok(())
    }

    pub async fn finish(mut self) -> Result<StagedFile> {
        self.file.flush().await?;
        Ok(self.staged)
    }
}

/// A file sitting in the staging area. Dropping it deletes the file.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    original_name: String,
    content_type: Option<String>,
    size: u64,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Extension of the client-supplied name, lowercased, if it looks sane.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.original_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| ext.to_ascii_lowercase())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed staged file {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove staged file {}: {}", self.path.display(), e),
        }
    }
}

/// Keeps `[A-Za-z0-9._-]`, replaces everything else, and never returns a
/// name that could escape the staging directory.
pub fn sanitize_file_name(raw: &str) -> String {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .take(MAX_NAME_LEN)
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_paths_and_odd_characters() {
        assert_eq!(sanitize_file_name("clip.mp4"), "clip.mp4");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\my photo.png"), "my_photo.png");
        assert_eq!(sanitize_file_name(".."), "upload");
        assert_eq!(sanitize_file_name(""), "upload");
    }

    #[tokio::test]
    async fn staged_file_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let store = TempStore::new(dir.path().to_path_buf()).await.unwrap();

        let mut writer = store.create("avatar.PNG", Some("image/png".into())).await.unwrap();
        writer.write(b"hello ").await.unwrap();
        writer.write(b"world").await.unwrap();
        let staged = writer.finish().await.unwrap();

        let path = staged.path().to_path_buf();
        assert!(path.file_name().unwrap().to_str().unwrap().starts_with("avatar.PNG-"));
        assert_eq!(staged.size(), 11);
        assert_eq!(staged.extension().as_deref(), Some("png"));
        assert_eq!(std::fs::read(&path).unwrap(), b"hello world");

        drop(staged);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn abandoned_writer_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let store = TempStore::new(dir.path().to_path_buf()).await.unwrap();

        let mut writer = store.create("partial.bin", None).await.unwrap();
        writer.write(b"half").await.unwrap();
        drop(writer);

        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 0);
    }
}
