use axum::{Extension, extract::{Multipart, State}};
use tracing::info;
use uuid::Uuid;

use vidtube_db::models::NewVideo;
use vidtube_db::{VideoFilter, VideoSort};
use vidtube_types::api::{PublishStatus, VideoListQuery};
use vidtube_types::models::{Page, Video, VideoDetails, VideoWithOwner};

use crate::error::ApiError;
use crate::extract::{ApiPath, ApiQuery};
use crate::middleware::AuthUser;
use crate::reply::{Reply, empty};
use crate::state::AppState;
use crate::upload::{FileRule, discard_media, keep_or_discard, publish, read_form};
use crate::validate::is_blank;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

const PUBLISH_FILES: &[FileRule] = &[FileRule::single("video"), FileRule::single("thumbnail")];
const THUMBNAIL_FILE: &[FileRule] = &[FileRule::single("thumbnail")];

/// Normalizes `page`/`limit` query values into `(page, limit, offset)`.
pub fn page_window(page: Option<u32>, limit: Option<u32>) -> (u32, u32, u32) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    (page, limit, (page - 1).saturating_mul(limit))
}

/// Loads a video or fails with 404.
pub(crate) async fn load_video(state: &AppState, id: Uuid) -> Result<Video, ApiError> {
    state
        .query(move |db| db.get_video(&id.to_string()))
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))
}

/// Like [`load_video`], but drafts only resolve for their owner.
pub(crate) async fn load_visible_video(
    state: &AppState,
    id: Uuid,
    viewer: &AuthUser,
) -> Result<Video, ApiError> {
    let video = load_video(state, id).await?;
    if !video.is_published && video.owner != viewer.0.id {
        return Err(ApiError::not_found("Video not found"));
    }
    Ok(video)
}

/// GET /videos: the public, paginated catalogue of published videos.
pub async fn get_all_videos(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<VideoListQuery>,
) -> Result<Reply<Page<VideoWithOwner>>, ApiError> {
    let (page, limit, offset) = page_window(query.page, query.limit);

    let sort = match query.sort_by.as_deref() {
        None | Some("") => VideoSort::default(),
        Some(name) => VideoSort::from_param(name)
            .ok_or_else(|| ApiError::bad_request(format!("Cannot sort videos by '{}'", name)))?,
    };
    let descending = match query.sort_type.as_deref() {
        None | Some("") | Some("desc") => true,
        Some("asc") => false,
        Some(other) => {
            return Err(ApiError::bad_request(format!("Unknown sort type '{}'", other)));
        }
    };

    let filter = VideoFilter {
        search: query.query.map(|q| q.trim().to_string()).filter(|q| !q.is_empty()),
        owner_id: query.user_id.map(|id| id.to_string()),
        sort,
        descending,
        offset,
        limit,
    };

    let (docs, total) = state.query(move |db| db.list_published_videos(&filter)).await?;
    Ok(Reply::ok("Videos fetched successfully", Page::new(docs, total, page, limit)))
}

/// POST /videos/publish-video: multipart `title`, `description`, `video`
/// and `thumbnail`.
pub async fn publish_a_video(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    multipart: Multipart,
) -> Result<Reply<Video>, ApiError> {
    let mut form = read_form(multipart, &state.temp, PUBLISH_FILES).await?;

    let title = form.text("title").unwrap_or_default().trim().to_string();
    let description = form.text("description").unwrap_or_default().trim().to_string();
    if is_blank(&title) || is_blank(&description) {
        return Err(ApiError::bad_request("Title and description are required"));
    }

    let video_file = form
        .take_file("video")
        .ok_or_else(|| ApiError::bad_request("Video file is required"))?;
    let thumbnail_file = form
        .take_file("thumbnail")
        .ok_or_else(|| ApiError::bad_request("Thumbnail is required"))?;

    let video = publish(&state, &video_file, "video").await?;
    let thumbnail = match publish(&state, &thumbnail_file, "thumbnail").await {
        Ok(uploaded) => uploaded,
        Err(e) => {
            discard_media(&state, &video.url).await;
            return Err(e);
        }
    };

    let id = Uuid::new_v4().to_string();
    let owner_id = auth.id();
    let (video_url, thumbnail_url) = (video.url.clone(), thumbnail.url.clone());
    let duration = video.duration.unwrap_or(0.0);
    let inserted = state
        .query(move |db| {
            db.insert_video(&NewVideo {
                id: &id,
                owner_id: &owner_id,
                video_file: &video_url,
                thumbnail: &thumbnail_url,
                title: &title,
                description: &description,
                duration,
            })
        })
        .await;

    let video = keep_or_discard(&state, inserted, &[&video.url, &thumbnail.url]).await?;

    info!("Video {} published by {}", video.id, auth.0.username);
    Ok(Reply::created("Video published successfully", video))
}

/// GET /videos/{videoId}: counts a view and records it in the caller's
/// history. Unpublished videos are visible to their owner only.
pub async fn get_video_by_id(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(video_id): ApiPath<Uuid>,
) -> Result<Reply<VideoDetails>, ApiError> {
    let viewer = auth.0.id;
    let details = state
        .query(move |db| {
            let id = video_id.to_string();
            let viewer_id = viewer.to_string();
            let Some(mut details) = db.get_video_details(&id, &viewer_id)? else {
                return Ok(None);
            };
            if !details.video.is_published && details.video.owner != viewer {
                return Ok(None);
            }
            db.record_view(&id, &viewer_id)?;
            details.video.views += 1;
            Ok(Some(details))
        })
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;

    Ok(Reply::ok("Video fetched successfully", details))
}

/// PATCH /videos/{videoId}: multipart `title`, `description`, `thumbnail`.
pub async fn update_video(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(video_id): ApiPath<Uuid>,
    multipart: Multipart,
) -> Result<Reply<Video>, ApiError> {
    let existing = load_video(&state, video_id).await?;
    auth.ensure_owns(existing.owner, "edit this video")?;

    let mut form = read_form(multipart, &state.temp, THUMBNAIL_FILE).await?;
    let title = form.text("title").unwrap_or_default().trim().to_string();
    let description = form.text("description").unwrap_or_default().trim().to_string();
    if is_blank(&title) || is_blank(&description) {
        return Err(ApiError::bad_request("Title and description are required"));
    }
    let thumbnail_file = form
        .take_file("thumbnail")
        .ok_or_else(|| ApiError::bad_request("Thumbnail is required"))?;

    let thumbnail = publish(&state, &thumbnail_file, "thumbnail").await?;

    let url = thumbnail.url.clone();
    let updated = state
        .query(move |db| db.update_video(&video_id.to_string(), &title, &description, &url))
        .await
        .and_then(|video| video.ok_or_else(|| ApiError::not_found("Video not found")));

    let updated = keep_or_discard(&state, updated, &[&thumbnail.url]).await?;

    discard_media(&state, &existing.thumbnail).await;

    Ok(Reply::ok("Video updated successfully", updated))
}

/// DELETE /videos/{videoId}: comments, likes, playlist entries and history
/// rows go with the video.
pub async fn delete_video(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(video_id): ApiPath<Uuid>,
) -> Result<Reply<serde_json::Value>, ApiError> {
    let existing = load_video(&state, video_id).await?;
    auth.ensure_owns(existing.owner, "delete this video")?;

    let deleted = state.query(move |db| db.delete_video(&video_id.to_string())).await?;
    if !deleted {
        return Err(ApiError::not_found("Video not found"));
    }

    discard_media(&state, &existing.video_file).await;
    discard_media(&state, &existing.thumbnail).await;

    info!("Video {} deleted by {}", video_id, auth.0.username);
    Ok(Reply::ok("Video deleted successfully", empty()))
}

pub async fn toggle_publish_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(video_id): ApiPath<Uuid>,
) -> Result<Reply<PublishStatus>, ApiError> {
    let existing = load_video(&state, video_id).await?;
    auth.ensure_owns(existing.owner, "change this video")?;

    let is_published = state
        .query(move |db| db.toggle_publish(&video_id.to_string()))
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;

    Ok(Reply::ok(
        "Video publish status toggled successfully",
        PublishStatus { is_published },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_window_defaults_and_clamps() {
        assert_eq!(page_window(None, None), (1, 10, 0));
        assert_eq!(page_window(Some(3), Some(20)), (3, 20, 40));
        assert_eq!(page_window(Some(0), Some(0)), (1, 1, 0));
        assert_eq!(page_window(Some(2), Some(1000)), (2, 100, 100));
    }
}
