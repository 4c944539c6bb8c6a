//! HTTP surface of chatsync: the JSON API, the event stream, and the static
//! front-end mount.

pub mod api;
pub mod config;
pub mod events;
pub mod persist;

use std::path::Path;

use axum::Router;
use axum::routing::{get, post};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

pub use api::AppState;
pub use persist::SqliteBlobStore;

/// Build the application router. Static files are served from `public_dir`
/// when given, with `index.html` for any path not found there.
pub fn router(state: AppState, public_dir: Option<&Path>) -> Router {
    let app = Router::new()
        .route("/api/chat", post(api::chat))
        .route("/api/clear", post(api::clear))
        .route(
            "/api/admin-prompt",
            get(api::admin_prompt).post(api::set_admin_prompt),
        )
        .route(
            "/api/user-data",
            get(api::user_data).post(api::set_user_data),
        )
        .route("/api/events", get(events::events))
        .with_state(state);

    let app = match public_dir {
        Some(dir) => app.fallback_service(
            ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html"))),
        ),
        None => app,
    };

    app.layer(TraceLayer::new_for_http())
}
