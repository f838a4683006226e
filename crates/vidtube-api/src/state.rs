use std::sync::Arc;

use tracing::error;

use vidtube_db::Database;
use vidtube_media::{MediaHost, TempStore};

use crate::error::ApiError;
use crate::tokens::TokenConfig;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub tokens: TokenConfig,
    pub media: MediaHost,
    pub temp: TempStore,
    /// Whether auth cookies carry the `Secure` attribute.
    pub cookie_secure: bool,
    pub max_upload_bytes: usize,
}

impl AppStateInner {
    /// Runs a database closure on the blocking pool.
    pub async fn query<F, T>(self: &Arc<Self>, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let state = Arc::clone(self);
        tokio::task::spawn_blocking(move || f(&state.db))
            .await
            .map_err(|e| {
                error!("DB task panicked: {}", e);
                ApiError::internal()
            })?
            .map_err(ApiError::from)
    }
}
