use anyhow::{Result, bail};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use vidtube_types::api::{AccessClaims, RefreshClaims};
use vidtube_types::models::User;

/// Signing material and lifetimes for the two token kinds. Access and
/// refresh tokens use separate secrets so one can never pass as the other.
pub struct TokenConfig {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    refresh_ttl: Duration,
}

impl TokenConfig {
    pub fn new(
        access_secret: &str,
        access_ttl: Duration,
        refresh_secret: &str,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(access_secret.as_bytes()),
            access_ttl,
            refresh_encoding: EncodingKey::from_secret(refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.as_bytes()),
            refresh_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn issue_access(&self, user: &User) -> Result<String> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            fullname: user.fullname.clone(),
            iat: now.timestamp() as usize,
            exp: (now + self.access_ttl).timestamp() as usize,
        };

        Ok(encode(&Header::default(), &claims, &self.access_encoding)?)
    }

    pub fn issue_refresh(&self, user_id: Uuid) -> Result<String> {
        let now = Utc::now();
        let claims = RefreshClaims {
            sub: user_id,
            jti: Uuid::new_v4(),
            iat: now.timestamp() as usize,
            exp: (now + self.refresh_ttl).timestamp() as usize,
        };

        Ok(encode(&Header::default(), &claims, &self.refresh_encoding)?)
    }

    pub fn verify_access(&self, token: &str) -> jsonwebtoken::errors::Result<AccessClaims> {
        decode::<AccessClaims>(token, &self.access_decoding, &Validation::default())
            .map(|data| data.claims)
    }

    pub fn verify_refresh(&self, token: &str) -> jsonwebtoken::errors::Result<RefreshClaims> {
        decode::<RefreshClaims>(token, &self.refresh_decoding, &Validation::default())
            .map(|data| data.claims)
    }
}

/// Parses token lifetimes such as `3600`, `15m`, `1d` or `2w`.
pub fn parse_expiry(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    let split = raw.find(|c: char| !c.is_ascii_digit()).unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);

    if digits.is_empty() {
        bail!("Expiry '{}' has no amount", raw);
    }
    let amount: i64 = digits.parse()?;

    let duration = match unit {
        "" | "s" => Duration::seconds(amount),
        "m" => Duration::minutes(amount),
        "h" => Duration::hours(amount),
        "d" => Duration::days(amount),
        "w" => Duration::weeks(amount),
        other => bail!("Unknown expiry unit '{}' in '{}'", other, raw),
    };

    if duration <= Duration::zero() {
        bail!("Expiry '{}' must be positive", raw);
    }
    Ok(duration)
}
