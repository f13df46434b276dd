use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        Admin, Comment, CommentChange, CommentStatus, NewWork, PLACEHOLDER_IMAGE, Page,
        PendingComment, Work, WorkChanges, WorkUpdate,
    },
};

mod memory;
mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// Repository Trait
///
/// The abstract contract for all persistence: the Work Repository and the
/// Credential Store. Handlers only ever talk to `Arc<dyn Repository>`, so the
/// Postgres implementation and the in-memory one are interchangeable.
///
/// Every mutation is a single atomic write against one work row. Absence is
/// reported as `None` (or a `CommentChange` variant), never as an error.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Work Retrieval ---
    /// Newest first. Returns the page plus the total number of works.
    async fn list_works(&self, page: Page) -> AppResult<(Vec<Work>, i64)>;
    /// Full-text search, most relevant first, newer first on ties.
    async fn search_works(&self, query: &str, page: Page) -> AppResult<(Vec<Work>, i64)>;
    /// The full work including every comment status.
    async fn get_work(&self, id: Uuid) -> AppResult<Option<Work>>;

    // --- Work Actions ---
    async fn create_work(&self, new_work: NewWork) -> AppResult<Work>;
    /// Applies only the supplied fields. Reports the image that was replaced, if any.
    async fn update_work(&self, id: Uuid, changes: WorkChanges) -> AppResult<Option<WorkUpdate>>;
    /// Removes the work and returns the image url it held.
    async fn delete_work(&self, id: Uuid) -> AppResult<Option<String>>;
    /// Resets the image to the placeholder and returns the url it held before.
    async fn reset_work_image(&self, id: Uuid) -> AppResult<Option<String>>;
    /// Atomic increment. Returns the new count.
    async fn increment_likes(&self, id: Uuid) -> AppResult<Option<i64>>;

    // --- Comments & Moderation ---
    /// Inserts at the head of the comment sequence. `false` when the work is missing.
    async fn add_comment(&self, work_id: Uuid, comment: Comment) -> AppResult<bool>;
    /// Every pending comment across all works, newest first.
    async fn pending_comments(&self) -> AppResult<Vec<PendingComment>>;
    async fn set_comment_status(
        &self,
        work_id: Uuid,
        comment_id: Uuid,
        status: CommentStatus,
    ) -> AppResult<CommentChange>;
    /// Removes the comment from the embedded sequence.
    async fn delete_comment(&self, work_id: Uuid, comment_id: Uuid) -> AppResult<CommentChange>;

    // --- Credential Store ---
    /// Fails with `Conflict` when the username is taken.
    async fn create_admin(&self, username: &str, password_hash: &str) -> AppResult<Admin>;
    async fn find_admin_by_username(&self, username: &str) -> AppResult<Option<Admin>>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// The image an update orphaned: only when a new image was written and the old
/// one was a real upload.
fn replaced_image(previous: String, new_image: Option<&str>) -> Option<String> {
    match new_image {
        Some(new) if new != previous && previous != PLACEHOLDER_IMAGE => Some(previous),
        _ => None,
    }
}
