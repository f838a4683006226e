use axum::{Extension, extract::State};
use uuid::Uuid;

use vidtube_types::api::PlaylistRequest;
use vidtube_types::models::{Playlist, PlaylistWithVideos};

use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::AuthUser;
use crate::reply::{Reply, empty};
use crate::state::AppState;
use crate::validate::is_blank;
use crate::videos::load_visible_video;

async fn load_playlist(state: &AppState, id: Uuid) -> Result<Playlist, ApiError> {
    state
        .query(move |db| db.get_playlist(&id.to_string()))
        .await?
        .ok_or_else(|| ApiError::not_found("Playlist not found"))
}

fn playlist_fields(req: PlaylistRequest) -> Result<(String, String), ApiError> {
    let name = req.name.trim().to_string();
    if is_blank(&name) {
        return Err(ApiError::bad_request("Playlist name is required"));
    }
    Ok((name, req.description.trim().to_string()))
}

pub async fn create_playlist(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(req): ApiJson<PlaylistRequest>,
) -> Result<Reply<Playlist>, ApiError> {
    let (name, description) = playlist_fields(req)?;

    let id = Uuid::new_v4().to_string();
    let owner_id = auth.id();
    let playlist = state
        .query(move |db| db.create_playlist(&id, &owner_id, &name, &description))
        .await?;

    Ok(Reply::created("Playlist created successfully", playlist))
}

/// GET /playlist/{playlistId}: the playlist with its videos in the order
/// they were added.
pub async fn get_playlist_by_id(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(playlist_id): ApiPath<Uuid>,
) -> Result<Reply<PlaylistWithVideos>, ApiError> {
    let playlist = load_playlist(&state, playlist_id).await?;

    let viewer = auth.id();
    let videos = state
        .query(move |db| db.list_playlist_videos(&playlist_id.to_string(), &viewer))
        .await?;

    Ok(Reply::ok(
        "Playlist fetched successfully",
        PlaylistWithVideos { playlist, videos },
    ))
}

pub async fn update_playlist(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(playlist_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<PlaylistRequest>,
) -> Result<Reply<Playlist>, ApiError> {
    let (name, description) = playlist_fields(req)?;

    let existing = load_playlist(&state, playlist_id).await?;
    auth.ensure_owns(existing.owner, "edit this playlist")?;

    let updated = state
        .query(move |db| db.update_playlist(&playlist_id.to_string(), &name, &description))
        .await?
        .ok_or_else(|| ApiError::not_found("Playlist not found"))?;

    Ok(Reply::ok("Playlist updated successfully", updated))
}

pub async fn delete_playlist(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(playlist_id): ApiPath<Uuid>,
) -> Result<Reply<serde_json::Value>, ApiError> {
    let existing = load_playlist(&state, playlist_id).await?;
    auth.ensure_owns(existing.owner, "delete this playlist")?;

    state.query(move |db| db.delete_playlist(&playlist_id.to_string())).await?;
    Ok(Reply::ok("Playlist deleted successfully", empty()))
}

/// PATCH /playlist/add/{videoId}/{playlistId}. Adding a video twice is a
/// no-op.
pub async fn add_video_to_playlist(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath((video_id, playlist_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<Reply<Playlist>, ApiError> {
    let playlist = load_playlist(&state, playlist_id).await?;
    auth.ensure_owns(playlist.owner, "change this playlist")?;
    load_visible_video(&state, video_id, &auth).await?;

    let updated = state
        .query(move |db| {
            db.add_video_to_playlist(&playlist_id.to_string(), &video_id.to_string())
        })
        .await?
        .ok_or_else(|| ApiError::not_found("Playlist not found"))?;

    Ok(Reply::ok("Video added to playlist", updated))
}

/// PATCH /playlist/remove/{videoId}/{playlistId}
pub async fn remove_video_from_playlist(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath((video_id, playlist_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<Reply<Playlist>, ApiError> {
    let playlist = load_playlist(&state, playlist_id).await?;
    auth.ensure_owns(playlist.owner, "change this playlist")?;

    let updated = state
        .query(move |db| {
            db.remove_video_from_playlist(&playlist_id.to_string(), &video_id.to_string())
        })
        .await?
        .ok_or_else(|| ApiError::not_found("Playlist not found"))?;

    Ok(Reply::ok("Video removed from playlist", updated))
}

/// GET /playlist/user/{userId}
pub async fn get_user_playlists(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> Result<Reply<Vec<Playlist>>, ApiError> {
    let playlists = state
        .query(move |db| {
            let id = user_id.to_string();
            if db.get_user_by_id(&id)?.is_none() {
                return Ok(None);
            }
            db.list_user_playlists(&id).map(Some)
        })
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Reply::ok("User playlists fetched successfully", playlists))
}
