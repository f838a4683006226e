use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use tracing::debug;
use uuid::Uuid;

use vidtube_types::models::User;

use crate::auth::ACCESS_COOKIE;
use crate::error::ApiError;
use crate::state::AppState;

/// The authenticated caller, inserted into request extensions by
/// [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl AuthUser {
    pub fn id(&self) -> String {
        self.0.id.to_string()
    }

    /// 403 unless the caller is `owner`. `action` completes
    /// "You are not allowed to ...".
    pub fn ensure_owns(&self, owner: Uuid, action: &str) -> Result<(), ApiError> {
        if self.0.id == owner {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!("You are not allowed to {}", action)))
        }
    }
}

/// Accepts the access token from the `accessToken` cookie, falling back to
/// an `Authorization: Bearer` header, and loads the user it names.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = jar
        .get(ACCESS_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .or_else(|| bearer_token(&req))
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Unauthorized request"))?;

    let claims = state.tokens.verify_access(&token).map_err(|e| {
        debug!("Rejected access token: {}", e);
        ApiError::unauthorized("Invalid access token")
    })?;

    let user_id = claims.sub.to_string();
    let user = state
        .query(move |db| db.get_user_by_id(&user_id))
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid access token"))?
        .to_user()?;

    req.extensions_mut().insert(AuthUser(user));
    Ok(next.run(req).await)
}

fn bearer_token(req: &Request) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}
