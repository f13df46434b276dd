use crate::{AppState, handlers::works};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, post, put},
};

/// Authenticated Router Module
///
/// Work editing. Every route here sits behind the `require_admin` route layer
/// applied in `create_router`, so handlers receive an already verified
/// `AuthAdmin`.
///
/// `max_upload_bytes` caps the request body, which bounds the multipart image
/// upload on create and update.
pub fn authenticated_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::<AppState>::new()
        // POST /api/works (multipart: title, excerpt, fullContent, optional image)
        .route("/works", post(works::create_work))
        // PUT/DELETE /api/works/{id}
        // Shares its path with the public GET; axum merges the method routers.
        .route(
            "/works/{id}",
            put(works::update_work).delete(works::delete_work),
        )
        // DELETE /api/works/{id}/image
        // Resets the work to the placeholder and releases the stored file.
        .route("/works/{id}/image", delete(works::delete_work_image))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}
