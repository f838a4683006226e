use axum::{Extension, extract::{Multipart, State}};
use tracing::info;

use vidtube_db::is_unique_violation;
use vidtube_types::api::UpdateAccountRequest;
use vidtube_types::models::{ChannelProfile, User, VideoWithOwner};

use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::AuthUser;
use crate::reply::Reply;
use crate::state::AppState;
use crate::upload::{FileRule, discard_media, keep_or_discard, publish, read_form};
use crate::validate::{is_blank, is_valid_email};

const EMAIL_IN_USE: &str = "Email is already in use";

pub async fn get_current_user(Extension(auth): Extension<AuthUser>) -> Reply<User> {
    Reply::ok("Current user fetched successfully", auth.0)
}

/// PATCH /users/update-user: replaces `fullname` and `email`.
pub async fn update_user_details(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(req): ApiJson<UpdateAccountRequest>,
) -> Result<Reply<User>, ApiError> {
    let fullname = req.fullname.trim().to_string();
    let email = req.email.trim().to_lowercase();
    if is_blank(&fullname) || is_blank(&email) {
        return Err(ApiError::bad_request("All fields are required"));
    }
    if !is_valid_email(&email) {
        return Err(ApiError::bad_request("Invalid email address"));
    }

    let (id, lookup) = (auth.id(), email.clone());
    let taken = state
        .query(move |db| Ok(db.get_user_by_email(&lookup)?.is_some_and(|other| other.id != id)))
        .await?;
    if taken {
        return Err(ApiError::conflict(EMAIL_IN_USE));
    }

    let id = auth.id();
    let updated = state
        .query(move |db| match db.update_account(&id, &fullname, &email) {
            Ok(row) => Ok(Ok(row)),
            Err(e) if is_unique_violation(&e) => Ok(Err(ApiError::conflict(EMAIL_IN_USE))),
            Err(e) => Err(e),
        })
        .await??
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Reply::ok("Account details updated successfully", updated.to_user()?))
}

/// PATCH /users/update-avatar
pub async fn update_user_avatar(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    multipart: Multipart,
) -> Result<Reply<User>, ApiError> {
    replace_image(&state, &auth, multipart, ImageSlot::Avatar).await
}

/// PATCH /users/update-cover-image
pub async fn update_user_cover_image(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    multipart: Multipart,
) -> Result<Reply<User>, ApiError> {
    replace_image(&state, &auth, multipart, ImageSlot::Cover).await
}

#[derive(Clone, Copy)]
enum ImageSlot {
    Avatar,
    Cover,
}

impl ImageSlot {
    fn field(self) -> &'static str {
        match self {
            Self::Avatar => "avatar",
            Self::Cover => "coverImage",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Avatar => "avatar",
            Self::Cover => "cover image",
        }
    }
}

/// Uploads the new image, points the user at it, then drops the old asset.
async fn replace_image(
    state: &AppState,
    auth: &AuthUser,
    multipart: Multipart,
    slot: ImageSlot,
) -> Result<Reply<User>, ApiError> {
    let rules = [FileRule::single(slot.field())];
    let mut form = read_form(multipart, &state.temp, &rules).await?;
    let file = form
        .take_file(slot.field())
        .ok_or_else(|| ApiError::bad_request(format!("The {} file is missing", slot.label())))?;

    let uploaded = publish(state, &file, slot.label()).await?;

    let id = auth.id();
    let url = uploaded.url.clone();
    let updated = state
        .query(move |db| match slot {
            ImageSlot::Avatar => db.update_avatar(&id, &url),
            ImageSlot::Cover => db.update_cover_image(&id, &url),
        })
        .await
        .and_then(|row| row.ok_or_else(|| ApiError::not_found("User not found")));

    let row = keep_or_discard(state, updated, &[&uploaded.url]).await?;

    let previous = match slot {
        ImageSlot::Avatar => &auth.0.avatar,
        ImageSlot::Cover => &auth.0.cover_image,
    };
    discard_media(state, previous).await;

    info!("Updated {} for {}", slot.label(), row.username);
    Ok(Reply::ok(
        format!("The {} was updated successfully", slot.label()),
        row.to_user()?,
    ))
}

/// GET /users/channel/{username}
pub async fn get_user_channel_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(username): ApiPath<String>,
) -> Result<Reply<ChannelProfile>, ApiError> {
    let username = username.trim().to_lowercase();
    if username.is_empty() {
        return Err(ApiError::bad_request("Username is missing"));
    }

    let viewer = auth.id();
    let profile = state
        .query(move |db| db.get_channel_profile(&username, &viewer))
        .await?
        .ok_or_else(|| ApiError::not_found("Channel does not exist"))?;

    Ok(Reply::ok("User channel fetched successfully", profile))
}

/// Most recently watched first.
pub async fn get_user_watch_history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Reply<Vec<VideoWithOwner>>, ApiError> {
    let id = auth.id();
    let history = state.query(move |db| db.get_watch_history(&id)).await?;
    Ok(Reply::ok("Watch history fetched successfully", history))
}
