use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post},
};
use serde_json::json;

use crate::middleware::require_auth;
use crate::reply::Reply;
use crate::state::AppState;
use crate::{auth, comments, community, dashboard, likes, playlists, subscriptions, users, videos};

/// Builds the `/api/v1` router. Routes registered before a `route_layer`
/// call require an access token; the ones after it are public.
pub fn create_router(state: AppState) -> Router {
    let auth_layer = middleware::from_fn_with_state(state.clone(), require_auth);

    let users_routes = Router::new()
        .route("/logout", post(auth::logout_user))
        .route("/change-password", post(auth::change_password))
        .route("/current-user", post(users::get_current_user).get(users::get_current_user))
        .route("/update-user", patch(users::update_user_details))
        .route("/update-avatar", patch(users::update_user_avatar))
        .route("/update-cover-image", patch(users::update_user_cover_image))
        .route("/channel/{username}", get(users::get_user_channel_profile))
        .route(
            "/watch-history",
            post(users::get_user_watch_history).get(users::get_user_watch_history),
        )
        .route_layer(auth_layer.clone())
        .route("/register", post(auth::register_user))
        .route("/login", post(auth::login_user))
        .route("/refresh-token", post(auth::refresh_access_token));

    let videos_routes = Router::new()
        .route("/publish-video", post(videos::publish_a_video))
        .route(
            "/{videoId}",
            get(videos::get_video_by_id)
                .patch(videos::update_video)
                .delete(videos::delete_video),
        )
        .route("/toggle/publish/{videoId}", patch(videos::toggle_publish_status))
        .route_layer(auth_layer.clone())
        .route("/", get(videos::get_all_videos));

    let comments_routes = Router::new()
        .route(
            "/{videoId}",
            get(comments::get_video_comments).post(comments::add_comment),
        )
        .route(
            "/c/{commentId}",
            patch(comments::update_comment).delete(comments::delete_comment),
        )
        .route_layer(auth_layer.clone());

    let likes_routes = Router::new()
        .route("/toggle/v/{videoId}", post(likes::toggle_video_like))
        .route("/toggle/c/{commentId}", post(likes::toggle_comment_like))
        .route("/toggle/t/{postId}", post(likes::toggle_post_like))
        .route("/videos", get(likes::get_liked_videos))
        .route_layer(auth_layer.clone());

    let playlists_routes = Router::new()
        .route("/", post(playlists::create_playlist))
        .route(
            "/{playlistId}",
            get(playlists::get_playlist_by_id)
                .patch(playlists::update_playlist)
                .delete(playlists::delete_playlist),
        )
        .route("/add/{videoId}/{playlistId}", patch(playlists::add_video_to_playlist))
        .route(
            "/remove/{videoId}/{playlistId}",
            patch(playlists::remove_video_from_playlist),
        )
        .route("/user/{userId}", get(playlists::get_user_playlists))
        .route_layer(auth_layer.clone());

    let subscriptions_routes = Router::new()
        .route(
            "/c/{channelId}",
            post(subscriptions::toggle_subscription).get(subscriptions::get_channel_subscribers),
        )
        .route("/u/{subscriberId}", get(subscriptions::get_subscribed_channels))
        .route_layer(auth_layer.clone());

    let community_routes = Router::new()
        .route("/", post(community::create_post))
        .route("/user/{userId}", get(community::get_user_posts))
        .route(
            "/{postId}",
            patch(community::update_post).delete(community::delete_post),
        )
        .route_layer(auth_layer.clone());

    let dashboard_routes = Router::new()
        .route("/stats", get(dashboard::get_channel_stats))
        .route("/videos", get(dashboard::get_channel_videos))
        .route_layer(auth_layer);

    let api = Router::new()
        .route("/healthcheck", get(healthcheck))
        .nest("/users", users_routes)
        .nest("/videos", videos_routes)
        .nest("/comments", comments_routes)
        .nest("/likes", likes_routes)
        .nest("/playlist", playlists_routes)
        .nest("/subscriptions", subscriptions_routes)
        .nest("/community", community_routes)
        .nest("/dashboard", dashboard_routes);

    Router::new()
        .nest("/api/v1", api)
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .with_state(state)
}

async fn healthcheck() -> Reply<serde_json::Value> {
    Reply::ok("OK", json!({ "status": "ok" }))
}
