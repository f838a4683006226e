mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{
    HeaderValue, Method,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use vidtube_api::tokens::TokenConfig;
use vidtube_api::{AppState, AppStateInner, create_router};
use vidtube_db::Database;
use vidtube_media::{CloudinaryHost, LocalHost, MediaHost, TempStore};

use crate::config::{Config, MediaBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vidtube=debug,tower_http=debug".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {:#}", e);
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
    };

    let db = Database::open(&config.database_path)?;
    let temp = TempStore::new(config.upload_temp_dir.clone()).await?;

    let (media, served_dir) = match &config.media {
        MediaBackend::Local { dir, public_url } => (
            MediaHost::Local(LocalHost::new(dir.clone(), public_url.clone()).await?),
            Some(dir.clone()),
        ),
        MediaBackend::Cloudinary {
            cloud_name,
            api_key,
            api_secret,
        } => {
            info!("Media uploads go to Cloudinary cloud '{}'", cloud_name);
            (
                MediaHost::Cloudinary(CloudinaryHost::new(
                    cloud_name.clone(),
                    api_key.clone(),
                    api_secret.clone(),
                )),
                None,
            )
        }
    };

    let state: AppState = Arc::new(AppStateInner {
        db,
        tokens: TokenConfig::new(
            &config.access_token_secret,
            config.access_token_ttl,
            &config.refresh_token_secret,
            config.refresh_token_ttl,
        ),
        media,
        temp,
        cookie_secure: config.cookie_secure,
        max_upload_bytes: config.max_upload_bytes,
    });

    let mut app = create_router(state);
    if let Some(dir) = served_dir {
        app = app.nest_service("/media", ServeDir::new(dir));
    }

    let cors = match &config.cors_origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin.parse::<HeaderValue>()?)
            .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
            .allow_headers([AUTHORIZATION, CONTENT_TYPE])
            .allow_credentials(true),
        None => CorsLayer::permissive(),
    };

    let app = app.layer(cors).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("VidTube server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
