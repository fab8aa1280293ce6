use std::path::Path;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::auth::{self, AppState};
use crate::messages;
use crate::middleware::require_auth;
use crate::oauth;

/// Assembles the full application. Static files are served from `static_dir`
/// under `/static`.
pub fn build(state: AppState, static_dir: &Path) -> Router {
    let public_routes = Router::new()
        .route("/", get(auth::home))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/auth/google", get(oauth::google_start))
        .route("/auth/google/chat", get(oauth::google_callback))
        .route("/health", get(|| async { "ok" }))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/chat", get(messages::chat_page).post(messages::send_message))
        .route("/clear", post(messages::clear_all_messages))
        .route("/clear/users", post(messages::clear_all_users))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
}
