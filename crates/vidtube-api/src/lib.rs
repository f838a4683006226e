pub mod auth;
pub mod comments;
pub mod community;
pub mod dashboard;
pub mod error;
pub mod extract;
pub mod likes;
pub mod middleware;
pub mod password;
pub mod playlists;
pub mod reply;
pub mod routes;
pub mod state;
pub mod subscriptions;
pub mod tokens;
pub mod upload;
pub mod users;
pub mod validate;
pub mod videos;

pub use routes::create_router;
pub use state::{AppState, AppStateInner};
