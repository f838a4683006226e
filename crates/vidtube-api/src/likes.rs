use axum::{Extension, extract::State};
use tracing::debug;
use uuid::Uuid;

use vidtube_db::LikeTarget;
use vidtube_types::api::LikeStatus;
use vidtube_types::models::VideoWithOwner;

use crate::error::ApiError;
use crate::extract::ApiPath;
use crate::middleware::AuthUser;
use crate::reply::Reply;
use crate::state::AppState;

#[derive(Debug, Clone, Copy)]
enum LikeKind {
    Video,
    Comment,
    Post,
}

impl LikeKind {
    fn label(self) -> &'static str {
        match self {
            Self::Video => "Video",
            Self::Comment => "Comment",
            Self::Post => "Post",
        }
    }
}

/// Checks the target exists, then flips the caller's like on it. Drafts
/// count as missing for anyone but their owner.
async fn toggle(
    state: &AppState,
    auth: &AuthUser,
    kind: LikeKind,
    target_id: Uuid,
) -> Result<Reply<LikeStatus>, ApiError> {
    let user_id = auth.id();
    let viewer = auth.0.id;
    let is_liked = state
        .query(move |db| {
            let id = target_id.to_string();
            let exists = match kind {
                LikeKind::Video => db
                    .get_video(&id)?
                    .is_some_and(|video| video.is_published || video.owner == viewer),
                LikeKind::Comment => db.get_comment(&id)?.is_some(),
                LikeKind::Post => db.get_post(&id)?.is_some(),
            };
            if !exists {
                return Ok(None);
            }

            let target = match kind {
                LikeKind::Video => LikeTarget::Video(&id),
                LikeKind::Comment => LikeTarget::Comment(&id),
                LikeKind::Post => LikeTarget::Post(&id),
            };
            let like_id = Uuid::new_v4().to_string();
            db.toggle_like(&like_id, target, &user_id).map(Some)
        })
        .await?
        .ok_or_else(|| ApiError::not_found(format!("{} not found", kind.label())))?;

    debug!("{} {} like -> {}", kind.label(), target_id, is_liked);
    let message = if is_liked { "Liked successfully" } else { "Like removed successfully" };
    Ok(Reply::ok(message, LikeStatus { is_liked }))
}

/// POST /likes/toggle/v/{videoId}
pub async fn toggle_video_like(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(video_id): ApiPath<Uuid>,
) -> Result<Reply<LikeStatus>, ApiError> {
    toggle(&state, &auth, LikeKind::Video, video_id).await
}

/// POST /likes/toggle/c/{commentId}
pub async fn toggle_comment_like(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(comment_id): ApiPath<Uuid>,
) -> Result<Reply<LikeStatus>, ApiError> {
    toggle(&state, &auth, LikeKind::Comment, comment_id).await
}

/// POST /likes/toggle/t/{postId}
pub async fn toggle_post_like(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(post_id): ApiPath<Uuid>,
) -> Result<Reply<LikeStatus>, ApiError> {
    toggle(&state, &auth, LikeKind::Post, post_id).await
}

pub async fn get_liked_videos(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Reply<Vec<VideoWithOwner>>, ApiError> {
    let id = auth.id();
    let videos = state.query(move |db| db.list_liked_videos(&id)).await?;
    Ok(Reply::ok("Liked videos fetched successfully", videos))
}
