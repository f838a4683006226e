use axum::{Extension, body::Bytes, extract::{Multipart, State}};
use axum_extra::extract::{CookieJar, cookie::Cookie};
use tracing::{info, warn};
use uuid::Uuid;

use vidtube_db::is_unique_violation;
use vidtube_db::models::NewUser;
use vidtube_types::api::{
    ChangePasswordRequest, LoginRequest, LoginResponse, RefreshRequest, TokenPair,
};
use vidtube_types::models::User;

use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::middleware::AuthUser;
use crate::password::{hash_password, verify_password};
use crate::reply::{Reply, empty};
use crate::state::AppState;
use crate::upload::{FileRule, discard_media, keep_or_discard, publish, read_form};
use crate::validate::{is_blank, is_valid_email};

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

const USER_EXISTS: &str = "User with email or username already exists";

const REGISTER_FILES: &[FileRule] = &[FileRule::single("avatar"), FileRule::single("coverImage")];

/// POST /users/register: multipart `fullname`, `username`, `email`,
/// `password`, `avatar` and optionally `coverImage`.
pub async fn register_user(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Reply<User>, ApiError> {
    let mut form = read_form(multipart, &state.temp, REGISTER_FILES).await?;

    let fullname = form.text("fullname").unwrap_or_default().trim().to_string();
    let username = form.text("username").unwrap_or_default().trim().to_lowercase();
    let email = form.text("email").unwrap_or_default().trim().to_lowercase();
    let password = form.text("password").unwrap_or_default().to_string();

    if [&fullname, &username, &email, &password].iter().any(|v| is_blank(v)) {
        return Err(ApiError::bad_request("All fields are required"));
    }
    if !is_valid_email(&email) {
        return Err(ApiError::bad_request("Invalid email address"));
    }

    let (u, e) = (username.clone(), email.clone());
    let taken = state
        .query(move |db| {
            Ok(db.get_user_by_username(&u)?.is_some() || db.get_user_by_email(&e)?.is_some())
        })
        .await?;
    if taken {
        return Err(ApiError::conflict(USER_EXISTS));
    }

    let avatar_file = form
        .take_file("avatar")
        .ok_or_else(|| ApiError::bad_request("Avatar file is required"))?;
    let avatar = publish(&state, &avatar_file, "avatar").await?;

    let cover_image = match form.take_file("coverImage") {
        Some(file) => match publish(&state, &file, "cover image").await {
            Ok(uploaded) => uploaded.url,
            Err(e) => {
                discard_media(&state, &avatar.url).await;
                return Err(e);
            }
        },
        None => String::new(),
    };

    let password_hash = hash_password(&password)?;
    let id = Uuid::new_v4().to_string();
    let (avatar_url, cover_url) = (avatar.url.clone(), cover_image.clone());
    let created = state
        .query(move |db| {
            let inserted = db.create_user(&NewUser {
                id: &id,
                username: &username,
                email: &email,
                fullname: &fullname,
                password_hash: &password_hash,
                avatar: &avatar_url,
                cover_image: &cover_url,
            });
            // A concurrent registration can claim the name after the check above.
            match inserted {
                Ok(row) => Ok(Some(row)),
                Err(e) if is_unique_violation(&e) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .and_then(|row| row.ok_or_else(|| ApiError::conflict(USER_EXISTS)));

    let row = keep_or_discard(&state, created, &[&avatar.url, &cover_image]).await?;

    info!("User registered: {}", row.username);
    Ok(Reply::created("User registered successfully", row.to_user()?))
}

/// POST /users/login: JSON with `email` or `username` plus `password`.
pub async fn login_user(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<(CookieJar, Reply<LoginResponse>), ApiError> {
    let email = req.email.map(|e| e.trim().to_lowercase()).filter(|e| !e.is_empty());
    let username = req.username.map(|u| u.trim().to_lowercase()).filter(|u| !u.is_empty());
    if email.is_none() && username.is_none() {
        return Err(ApiError::bad_request("Username or email is required"));
    }

    let row = state
        .query(move |db| db.find_user_by_login(email.as_deref(), username.as_deref()))
        .await?
        .ok_or_else(|| ApiError::not_found("User does not exist"))?;

    if !verify_password(&req.password, &row.password)? {
        warn!("Failed login for {}", row.username);
        return Err(ApiError::unauthorized("Invalid user credentials"));
    }

    let user = row.to_user()?;
    let tokens = issue_session(&state, &user).await?;
    let jar = set_session_cookies(&state, jar, &tokens);

    info!("User logged in: {}", user.username);
    Ok((
        jar,
        Reply::ok(
            "User logged in successfully",
            LoginResponse {
                user,
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
            },
        ),
    ))
}

/// POST /users/logout: forgets the stored refresh token and clears cookies.
pub async fn logout_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    jar: CookieJar,
) -> Result<(CookieJar, Reply<serde_json::Value>), ApiError> {
    let id = auth.id();
    state.query(move |db| db.set_refresh_token(&id, None)).await?;

    let jar = jar
        .add(expired_cookie(ACCESS_COOKIE, state.cookie_secure))
        .add(expired_cookie(REFRESH_COOKIE, state.cookie_secure));

    info!("User logged out: {}", auth.0.username);
    Ok((jar, Reply::ok("User logged out", empty())))
}

/// POST /users/refresh-token: rotates the token pair. The refresh token comes
/// from the `refreshToken` cookie or a JSON body field of the same name.
pub async fn refresh_access_token(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Bytes,
) -> Result<(CookieJar, Reply<TokenPair>), ApiError> {
    let from_body = if body.iter().all(u8::is_ascii_whitespace) {
        RefreshRequest::default()
    } else {
        serde_json::from_slice::<RefreshRequest>(&body)
            .map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e)))?
    };

    let incoming = jar
        .get(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
        .or(from_body.refresh_token)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Unauthorized request"))?;

    let claims = state
        .tokens
        .verify_refresh(&incoming)
        .map_err(|_| ApiError::unauthorized("Invalid refresh token"))?;

    let user_id = claims.sub.to_string();
    let row = state
        .query(move |db| db.get_user_by_id(&user_id))
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid refresh token"))?;

    if row.refresh_token.as_deref() != Some(incoming.as_str()) {
        warn!("Stale refresh token presented for {}", row.username);
        return Err(ApiError::unauthorized("Refresh token is expired or used"));
    }

    let tokens = issue_session(&state, &row.to_user()?).await?;
    let jar = set_session_cookies(&state, jar, &tokens);

    Ok((jar, Reply::ok("Access token refreshed", tokens)))
}

/// POST /users/change-password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> Result<Reply<serde_json::Value>, ApiError> {
    if is_blank(&req.new_password) {
        return Err(ApiError::bad_request("New password is required"));
    }

    let id = auth.id();
    let row = state
        .query(move |db| db.get_user_by_id(&id))
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid access token"))?;

    if !verify_password(&req.old_password, &row.password)? {
        return Err(ApiError::bad_request("Invalid old password"));
    }

    let password_hash = hash_password(&req.new_password)?;
    let id = auth.id();
    state.query(move |db| db.update_password(&id, &password_hash)).await?;

    info!("Password changed for {}", row.username);
    Ok(Reply::ok("Password changed successfully", empty()))
}

/// Mints a fresh token pair and makes the refresh token the only one the
/// user's record will accept.
async fn issue_session(state: &AppState, user: &User) -> Result<TokenPair, ApiError> {
    let access_token = state.tokens.issue_access(user)?;
    let refresh_token = state.tokens.issue_refresh(user.id)?;

    let id = user.id.to_string();
    let stored = refresh_token.clone();
    state.query(move |db| db.set_refresh_token(&id, Some(&stored))).await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

fn set_session_cookies(state: &AppState, jar: CookieJar, tokens: &TokenPair) -> CookieJar {
    jar.add(session_cookie(
        ACCESS_COOKIE,
        tokens.access_token.clone(),
        state.tokens.access_ttl(),
        state.cookie_secure,
    ))
    .add(session_cookie(
        REFRESH_COOKIE,
        tokens.refresh_token.clone(),
        state.tokens.refresh_ttl(),
        state.cookie_secure,
    ))
}

fn session_cookie(
    name: &'static str,
    value: String,
    ttl: chrono::Duration,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .path("/")
        .max_age(time::Duration::seconds(ttl.num_seconds()))
        .build()
}

/// Overwrites a session cookie with an empty, already-expired one. Sent
/// even when the request authenticated with a bearer header.
fn expired_cookie(name: &'static str, secure: bool) -> Cookie<'static> {
    Cookie::build((name, ""))
        .http_only(true)
        .secure(secure)
        .path("/")
        .max_age(time::Duration::ZERO)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookies_are_http_only_and_scoped_to_root() {
        let cookie = session_cookie(ACCESS_COOKIE, "tok".into(), chrono::Duration::hours(1), true);
        assert_eq!(cookie.name(), "accessToken");
        assert_eq!(cookie.value(), "tok");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(time::Duration::hours(1)));
    }

    #[test]
    fn expired_cookie_clears_value() {
        let cookie = expired_cookie(REFRESH_COOKIE, false);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
        assert_eq!(cookie.path(), Some("/"));
    }
}
