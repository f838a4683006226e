use axum::{Extension, extract::{Multipart, State}};
use tracing::info;
use uuid::Uuid;

use vidtube_types::api::UpdatePostRequest;
use vidtube_types::models::{CommunityPost, CommunityPostWithStats};

use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::AuthUser;
use crate::reply::{Reply, empty};
use crate::state::AppState;
use crate::upload::{FileRule, discard_media, keep_or_discard, publish, read_form};
use crate::validate::is_blank;

pub const MAX_POST_IMAGES: usize = 4;

const POST_FILES: &[FileRule] = &[FileRule::many("images", MAX_POST_IMAGES)];

async fn load_post(state: &AppState, id: Uuid) -> Result<CommunityPost, ApiError> {
    state
        .query(move |db| db.get_post(&id.to_string()))
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))
}

/// POST /community: multipart `content` and up to four `images`.
pub async fn create_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    multipart: Multipart,
) -> Result<Reply<CommunityPost>, ApiError> {
    let mut form = read_form(multipart, &state.temp, POST_FILES).await?;

    let content = form.text("content").unwrap_or_default().trim().to_string();
    if is_blank(&content) {
        return Err(ApiError::bad_request("Post content is required"));
    }

    let mut images = Vec::new();
    for file in form.take_files("images") {
        let uploaded = publish(&state, &file, "image").await;
        let earlier: Vec<&str> = images.iter().map(String::as_str).collect();
        let uploaded = keep_or_discard(&state, uploaded, &earlier).await?;
        images.push(uploaded.url);
    }

    let id = Uuid::new_v4().to_string();
    let owner_id = auth.id();
    let stored = images.clone();
    let inserted = state
        .query(move |db| db.insert_post(&id, &owner_id, &content, &stored))
        .await;

    let urls: Vec<&str> = images.iter().map(String::as_str).collect();
    let post = keep_or_discard(&state, inserted, &urls).await?;

    info!("Post {} created by {} with {} images", post.id, auth.0.username, images.len());
    Ok(Reply::created("Post created successfully", post))
}

/// GET /community/user/{userId}: newest first, with like counts.
pub async fn get_user_posts(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> Result<Reply<Vec<CommunityPostWithStats>>, ApiError> {
    let posts = state
        .query(move |db| {
            let id = user_id.to_string();
            if db.get_user_by_id(&id)?.is_none() {
                return Ok(None);
            }
            db.list_user_posts(&id).map(Some)
        })
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Reply::ok("Posts fetched successfully", posts))
}

pub async fn update_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(post_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdatePostRequest>,
) -> Result<Reply<CommunityPost>, ApiError> {
    let content = req.content.trim().to_string();
    if is_blank(&content) {
        return Err(ApiError::bad_request("Post content is required"));
    }

    let existing = load_post(&state, post_id).await?;
    auth.ensure_owns(existing.owner, "edit this post")?;

    let updated = state
        .query(move |db| db.update_post(&post_id.to_string(), &content))
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    Ok(Reply::ok("Post updated successfully", updated))
}

/// Likes on the post are removed with it; its images are dropped from the
/// media host.
pub async fn delete_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(post_id): ApiPath<Uuid>,
) -> Result<Reply<serde_json::Value>, ApiError> {
    let existing = load_post(&state, post_id).await?;
    auth.ensure_owns(existing.owner, "delete this post")?;

    state.query(move |db| db.delete_post(&post_id.to_string())).await?;
    for url in &existing.images {
        discard_media(&state, url).await;
    }

    Ok(Reply::ok("Post deleted successfully", empty()))
}
