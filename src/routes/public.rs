use crate::{
    AppState,
    handlers::{admin, welcome, works},
};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints open to anonymous readers, plus the credential exchange that
/// produces tokens for the protected routers. Mounted under `/api`.
///
/// Visibility: every work returned here goes through `Work::public_view`, so a
/// pending or rejected comment never leaves the server on these routes.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /api
        .route("/", get(welcome))
        // GET /api/works?page=&limit=
        .route("/works", get(works::list_works))
        // GET /api/works/search?q=&page=&limit=
        // Static segment, so it is matched ahead of `/works/{id}`.
        .route("/works/search", get(works::search_works))
        // GET /api/works/{id}
        .route("/works/{id}", get(works::get_work))
        // POST /api/works/{id}/like
        .route("/works/{id}/like", post(works::like_work))
        // POST /api/works/{id}/comments
        // The new comment is always pending until moderated.
        .route("/works/{id}/comments", post(works::add_comment))
        // --- Credentials ---
        .route("/admin/register", post(admin::register))
        .route("/admin/login", post(admin::login))
        // POST /api/token/refresh
        .route("/token/refresh", post(admin::refresh_token))
}
