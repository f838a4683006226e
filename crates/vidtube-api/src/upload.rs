use std::collections::HashMap;

use axum::extract::Multipart;
use tracing::{error, warn};

use vidtube_media::{StagedFile, TempStore, UploadedMedia};

use crate::error::ApiError;
use crate::state::AppState;

/// A file field a form accepts, and how many files it may carry.
#[derive(Debug, Clone, Copy)]
pub struct FileRule {
    pub name: &'static str,
    pub max_count: usize,
}

impl FileRule {
    pub const fn single(name: &'static str) -> Self {
        Self { name, max_count: 1 }
    }

    pub const fn many(name: &'static str, max_count: usize) -> Self {
        Self { name, max_count }
    }
}

/// A parsed multipart body. Files stay staged on disk until the form (or the
/// taken [`StagedFile`]) is dropped.
#[derive(Debug, Default)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    files: HashMap<String, Vec<StagedFile>>,
}

impl UploadForm {
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn take_file(&mut self, name: &str) -> Option<StagedFile> {
        self.files.get_mut(name).and_then(|files| files.pop())
    }

    pub fn take_files(&mut self, name: &str) -> Vec<StagedFile> {
        self.files.remove(name).unwrap_or_default()
    }
}

/// Streams every part of `multipart`: text parts are collected, file parts
/// matching `rules` are staged in `temp`. Parts with an empty file name (a
/// form submitted without choosing a file) are skipped.
pub async fn read_form(
    mut multipart: Multipart,
    temp: &TempStore,
    rules: &[FileRule],
) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();

    while let Some(mut field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        let Some(file_name) = field.file_name().map(str::to_string) else {
            let value = field.text().await?;
            form.fields.insert(name, value);
            continue;
        };
        if file_name.is_empty() {
            continue;
        }

        let Some(rule) = rules.iter().find(|rule| rule.name == name) else {
            warn!("Rejected unexpected file field '{}'", name);
            return Err(ApiError::bad_request("Unexpected field"));
        };
        let staged = form.files.entry(name).or_default();
        if staged.len() >= rule.max_count {
            warn!("Too many files for field '{}'", rule.name);
            return Err(ApiError::bad_request("Unexpected field"));
        }

        let content_type = field.content_type().map(str::to_string);
        let mut writer = temp.create(&file_name, content_type).await?;
        while let Some(chunk) = field.chunk().await? {
            writer.write(&chunk).await?;
        }
        staged.push(writer.finish().await?);
    }

    Ok(form)
}

/// Transfers a staged file to the media host. `what` names the asset in the
/// client-facing error.
pub async fn publish(
    state: &AppState,
    file: &StagedFile,
    what: &str,
) -> Result<UploadedMedia, ApiError> {
    state.media.upload(file).await.map_err(|e| {
        error!("Uploading {} failed: {:#}", file.original_name(), e);
        ApiError::Internal(format!("Error while uploading {}", what))
    })
}

/// Best-effort removal of a previously published asset.
pub async fn discard_media(state: &AppState, url: &str) {
    if url.is_empty() {
        return;
    }
    if let Err(e) = state.media.destroy(url).await {
        warn!("Could not remove media {}: {:#}", url, e);
    }
}

/// Passes `outcome` through, removing the freshly published `urls` when the
/// write they belonged to failed.
pub async fn keep_or_discard<T>(
    state: &AppState,
    outcome: Result<T, ApiError>,
    urls: &[&str],
) -> Result<T, ApiError> {
    if outcome.is_err() {
        for url in urls {
            discard_media(state, url).await;
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use vidtube_db::Database;
    use vidtube_media::{LocalHost, MediaHost};

    use super::*;
    use crate::state::AppStateInner;
    use crate::tokens::TokenConfig;

    const MEDIA_URL: &str = "http://localhost:8000/media";

    async fn state(temp: &tempfile::TempDir, media: &tempfile::TempDir) -> AppState {
        Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            tokens: TokenConfig::new(
                "access",
                chrono::Duration::minutes(5),
                "refresh",
                chrono::Duration::days(1),
            ),
            media: MediaHost::Local(
                LocalHost::new(media.path().to_path_buf(), MEDIA_URL).await.unwrap(),
            ),
            temp: TempStore::new(temp.path().to_path_buf()).await.unwrap(),
            cookie_secure: false,
            max_upload_bytes: 1024,
        })
    }

    async fn published(state: &AppState) -> UploadedMedia {
        let mut writer = state.temp.create("thumb.png", None).await.unwrap();
        writer.write(b"png").await.unwrap();
        let staged = writer.finish().await.unwrap();
        publish(state, &staged, "thumbnail").await.unwrap()
    }

    fn media_files(media: &tempfile::TempDir) -> usize {
        std::fs::read_dir(media.path()).unwrap().count()
    }

    #[tokio::test]
    async fn failed_write_discards_new_media() {
        let (temp, media) = (tempfile::tempdir().unwrap(), tempfile::tempdir().unwrap());
        let state = state(&temp, &media).await;
        let uploaded = published(&state).await;
        assert_eq!(media_files(&media), 1);

        let outcome: Result<(), ApiError> = Err(ApiError::not_found("Video not found"));
        let err = keep_or_discard(&state, outcome, &[uploaded.url.as_str(), ""])
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::NotFound(_)));
        assert_eq!(media_files(&media), 0);
    }

    #[tokio::test]
    async fn successful_write_keeps_new_media() {
        let (temp, media) = (tempfile::tempdir().unwrap(), tempfile::tempdir().unwrap());
        let state = state(&temp, &media).await;
        let uploaded = published(&state).await;

        let kept = keep_or_discard(&state, Ok(7), &[uploaded.url.as_str()]).await.unwrap();

        assert_eq!(kept, 7);
        assert_eq!(media_files(&media), 1);
    }
}
