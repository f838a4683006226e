use axum::{Extension, extract::State};
use tracing::info;
use uuid::Uuid;

use vidtube_types::api::SubscriptionStatus;
use vidtube_types::models::SubscriptionEntry;

use crate::error::ApiError;
use crate::extract::ApiPath;
use crate::middleware::AuthUser;
use crate::reply::Reply;
use crate::state::AppState;

/// POST /subscriptions/c/{channelId}
pub async fn toggle_subscription(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(channel_id): ApiPath<Uuid>,
) -> Result<Reply<SubscriptionStatus>, ApiError> {
    if channel_id == auth.0.id {
        return Err(ApiError::bad_request("You cannot subscribe to your own channel"));
    }

    let subscriber_id = auth.id();
    let subscribed = state
        .query(move |db| {
            let channel = channel_id.to_string();
            if db.get_user_by_id(&channel)?.is_none() {
                return Ok(None);
            }
            let id = Uuid::new_v4().to_string();
            db.toggle_subscription(&id, &subscriber_id, &channel).map(Some)
        })
        .await?
        .ok_or_else(|| ApiError::not_found("Channel not found"))?;

    info!(
        "{} {} channel {}",
        auth.0.username,
        if subscribed { "subscribed to" } else { "unsubscribed from" },
        channel_id
    );
    let message = if subscribed { "Subscribed successfully" } else { "Unsubscribed successfully" };
    Ok(Reply::ok(message, SubscriptionStatus { subscribed }))
}

/// GET /subscriptions/c/{channelId}: who subscribes to the channel.
pub async fn get_channel_subscribers(
    State(state): State<AppState>,
    ApiPath(channel_id): ApiPath<Uuid>,
) -> Result<Reply<Vec<SubscriptionEntry>>, ApiError> {
    let subscribers = state
        .query(move |db| {
            let channel = channel_id.to_string();
            if db.get_user_by_id(&channel)?.is_none() {
                return Ok(None);
            }
            db.list_subscribers(&channel).map(Some)
        })
        .await?
        .ok_or_else(|| ApiError::not_found("Channel not found"))?;

    Ok(Reply::ok("Subscribers fetched successfully", subscribers))
}

/// GET /subscriptions/u/{subscriberId}: channels the user subscribes to.
pub async fn get_subscribed_channels(
    State(state): State<AppState>,
    ApiPath(subscriber_id): ApiPath<Uuid>,
) -> Result<Reply<Vec<SubscriptionEntry>>, ApiError> {
    let channels = state
        .query(move |db| {
            let subscriber = subscriber_id.to_string();
            if db.get_user_by_id(&subscriber)?.is_none() {
                return Ok(None);
            }
            db.list_subscribed_channels(&subscriber).map(Some)
        })
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Reply::ok("Subscribed channels fetched successfully", channels))
}
