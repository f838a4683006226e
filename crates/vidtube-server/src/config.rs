use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::Duration;

use vidtube_api::tokens::parse_expiry;

/// Token secrets that must never reach production.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me",
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "your-access-token-secret",
    "your-refresh-token-secret",
];

const DEFAULT_MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaBackend {
    Local {
        dir: PathBuf,
        public_url: String,
    },
    Cloudinary {
        cloud_name: String,
        api_key: String,
        api_secret: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub cors_origin: Option<String>,
    pub access_token_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_secret: String,
    pub refresh_token_ttl: Duration,
    pub cookie_secure: bool,
    pub upload_temp_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub media: MediaBackend,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let port: u16 = or("PORT", "8000").parse().context("PORT must be a port number")?;

        let access_token_secret = secret(get("ACCESS_TOKEN_SECRET"), "ACCESS_TOKEN_SECRET")?;
        let refresh_token_secret = secret(get("REFRESH_TOKEN_SECRET"), "REFRESH_TOKEN_SECRET")?;
        if access_token_secret == refresh_token_secret {
            bail!("ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ");
        }

        let access_token_ttl =
            parse_expiry(&or("ACCESS_TOKEN_EXPIRY", "1d")).context("ACCESS_TOKEN_EXPIRY")?;
        let refresh_token_ttl =
            parse_expiry(&or("REFRESH_TOKEN_EXPIRY", "10d")).context("REFRESH_TOKEN_EXPIRY")?;

        let cookie_secure = match or("COOKIE_SECURE", "true").to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            other => bail!("COOKIE_SECURE must be true or false, got '{}'", other),
        };

        let max_upload_bytes = match get("MAX_UPLOAD_BYTES") {
            Some(raw) => raw.parse().context("MAX_UPLOAD_BYTES must be a byte count")?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let media = match or("MEDIA_BACKEND", "local").as_str() {
            "local" => MediaBackend::Local {
                dir: or("MEDIA_DIR", "public/media").into(),
                public_url: get("MEDIA_PUBLIC_URL")
                    .unwrap_or_else(|| format!("http://localhost:{}/media", port)),
            },
            "cloudinary" => MediaBackend::Cloudinary {
                cloud_name: get("CLOUDINARY_CLOUD_NAME").context("CLOUDINARY_CLOUD_NAME is required")?,
                api_key: get("CLOUDINARY_API_KEY").context("CLOUDINARY_API_KEY is required")?,
                api_secret: get("CLOUDINARY_API_SECRET").context("CLOUDINARY_API_SECRET is required")?,
            },
            other => bail!("MEDIA_BACKEND must be 'local' or 'cloudinary', got '{}'", other),
        };

        Ok(Self {
            host: or("HOST", "0.0.0.0"),
            port,
            database_path: or("DATABASE_PATH", "vidtube.db").into(),
            cors_origin: get("CORS_ORIGIN"),
            access_token_secret,
            access_token_ttl,
            refresh_token_secret,
            refresh_token_ttl,
            cookie_secure,
            upload_temp_dir: or("UPLOAD_TEMP_DIR", "public/temp").into(),
            max_upload_bytes,
            media,
        })
    }
}

fn secret(value: Option<String>, name: &str) -> Result<String> {
    match value {
        Some(v) if !PLACEHOLDER_SECRETS.contains(&v.as_str()) => Ok(v),
        _ => bail!("{} is unset or still a placeholder", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    const SECRETS: &[(&str, &str)] = &[
        ("ACCESS_TOKEN_SECRET", "a-long-access-secret"),
        ("REFRESH_TOKEN_SECRET", "a-long-refresh-secret"),
    ];

    #[test]
    fn defaults() {
        let config = Config::from_lookup(lookup(SECRETS)).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert_eq!(config.database_path, PathBuf::from("vidtube.db"));
        assert_eq!(config.access_token_ttl, Duration::days(1));
        assert_eq!(config.refresh_token_ttl, Duration::days(10));
        assert!(config.cookie_secure);
        assert!(config.cors_origin.is_none());
        assert_eq!(config.max_upload_bytes, 512 * 1024 * 1024);
        assert_eq!(
            config.media,
            MediaBackend::Local {
                dir: PathBuf::from("public/media"),
                public_url: "http://localhost:8000/media".into(),
            }
        );
    }

    #[test]
    fn placeholder_or_missing_secrets_are_fatal() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
        assert!(
            Config::from_lookup(lookup(&[
                ("ACCESS_TOKEN_SECRET", "change-me"),
                ("REFRESH_TOKEN_SECRET", "a-long-refresh-secret"),
            ]))
            .is_err()
        );
        assert!(
            Config::from_lookup(lookup(&[
                ("ACCESS_TOKEN_SECRET", "same"),
                ("REFRESH_TOKEN_SECRET", "same"),
            ]))
            .is_err()
        );
    }

    #[test]
    fn cloudinary_needs_credentials() {
        let mut pairs = SECRETS.to_vec();
        pairs.push(("MEDIA_BACKEND", "cloudinary"));
        pairs.push(("CLOUDINARY_CLOUD_NAME", "demo"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());

        pairs.push(("CLOUDINARY_API_KEY", "key"));
        pairs.push(("CLOUDINARY_API_SECRET", "secret"));
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert!(matches!(config.media, MediaBackend::Cloudinary { ref cloud_name, .. } if cloud_name == "demo"));
    }

    #[test]
    fn overrides_are_parsed() {
        let mut pairs = SECRETS.to_vec();
        pairs.extend_from_slice(&[
            ("PORT", "9000"),
            ("ACCESS_TOKEN_EXPIRY", "15m"),
            ("COOKIE_SECURE", "false"),
            ("MAX_UPLOAD_BYTES", "1048576"),
            ("CORS_ORIGIN", "http://localhost:5173"),
        ]);
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.access_token_ttl, Duration::minutes(15));
        assert!(!config.cookie_secure);
        assert_eq!(config.max_upload_bytes, 1_048_576);
        assert_eq!(config.cors_origin.as_deref(), Some("http://localhost:5173"));

        pairs.push(("COOKIE_SECURE", "maybe"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());
    }
}
