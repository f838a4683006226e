use axum::{Extension, extract::State};
use uuid::Uuid;

use vidtube_types::api::{CommentRequest, PageQuery};
use vidtube_types::models::{Comment, CommentWithOwner, Page};

use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::AuthUser;
use crate::reply::{Reply, empty};
use crate::state::AppState;
use crate::validate::is_blank;
use crate::videos::{load_visible_video, page_window};

async fn load_comment(state: &AppState, id: Uuid) -> Result<Comment, ApiError> {
    state
        .query(move |db| db.get_comment(&id.to_string()))
        .await?
        .ok_or_else(|| ApiError::not_found("Comment not found"))
}

/// GET /comments/{videoId}: newest first.
pub async fn get_video_comments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(video_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Reply<Page<CommentWithOwner>>, ApiError> {
    load_visible_video(&state, video_id, &auth).await?;

    let (page, limit, offset) = page_window(query.page, query.limit);
    let (docs, total) = state
        .query(move |db| db.list_comments(&video_id.to_string(), offset, limit))
        .await?;

    Ok(Reply::ok("Comments fetched successfully", Page::new(docs, total, page, limit)))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(video_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<CommentRequest>,
) -> Result<Reply<Comment>, ApiError> {
    let content = req.content.trim().to_string();
    if is_blank(&content) {
        return Err(ApiError::bad_request("Comment content is required"));
    }
    load_visible_video(&state, video_id, &auth).await?;

    let id = Uuid::new_v4().to_string();
    let owner_id = auth.id();
    let comment = state
        .query(move |db| db.insert_comment(&id, &video_id.to_string(), &owner_id, &content))
        .await?;

    Ok(Reply::created("Comment added successfully", comment))
}

pub async fn update_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(comment_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<CommentRequest>,
) -> Result<Reply<Comment>, ApiError> {
    let content = req.content.trim().to_string();
    if is_blank(&content) {
        return Err(ApiError::bad_request("Comment content is required"));
    }

    let existing = load_comment(&state, comment_id).await?;
    auth.ensure_owns(existing.owner, "edit this comment")?;

    let updated = state
        .query(move |db| db.update_comment(&comment_id.to_string(), &content))
        .await?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;

    Ok(Reply::ok("Comment updated successfully", updated))
}

/// Likes on the comment are removed with it.
pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(comment_id): ApiPath<Uuid>,
) -> Result<Reply<serde_json::Value>, ApiError> {
    let existing = load_comment(&state, comment_id).await?;
    auth.ensure_owns(existing.owner, "delete this comment")?;

    state.query(move |db| db.delete_comment(&comment_id.to_string())).await?;
    Ok(Reply::ok("Comment deleted successfully", empty()))
}
