use crate::{AppState, handlers::admin};
use axum::{
    Router,
    routing::{delete, get, put},
};

/// Admin Router Module
///
/// Moderation endpoints, nested under `/api/admin` and protected by the same
/// `require_admin` route layer as the work editing routes.
///
/// `DELETE .../comments/{comment_id}` removes the comment outright;
/// `PUT .../reject` keeps it but hides it permanently.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /api/admin/works/comments/pending
        .route("/works/comments/pending", get(admin::pending_comments))
        // GET /api/admin/works/{id}
        // The unfiltered work, used to prefill the edit form.
        .route("/works/{id}", get(admin::get_work_raw))
        // PUT /api/admin/works/{work_id}/comments/{comment_id}/approve
        .route(
            "/works/{work_id}/comments/{comment_id}/approve",
            put(admin::approve_comment),
        )
        // PUT /api/admin/works/{work_id}/comments/{comment_id}/reject
        .route(
            "/works/{work_id}/comments/{comment_id}/reject",
            put(admin::reject_comment),
        )
        // DELETE /api/admin/works/{work_id}/comments/{comment_id}
        .route(
            "/works/{work_id}/comments/{comment_id}",
            delete(admin::delete_comment),
        )
}
