use axum::{Extension, extract::State};

use vidtube_types::models::{ChannelStats, Video};

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::reply::Reply;
use crate::state::AppState;

/// GET /dashboard/stats: totals for the caller's channel.
pub async fn get_channel_stats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Reply<ChannelStats>, ApiError> {
    let id = auth.id();
    let stats = state.query(move |db| db.get_channel_stats(&id)).await?;
    Ok(Reply::ok("Channel stats fetched successfully", stats))
}

/// GET /dashboard/videos: every video of the caller, unpublished included.
pub async fn get_channel_videos(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Reply<Vec<Video>>, ApiError> {
    let id = auth.id();
    let videos = state.query(move |db| db.list_channel_videos(&id)).await?;
    Ok(Reply::ok("Channel videos fetched successfully", videos))
}
