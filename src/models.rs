use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::AppError;

/// Sentinel stored in `Work.image_url` when no cover image was uploaded.
pub const PLACEHOLDER_IMAGE: &str = "placeholder";

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_LIMIT: u32 = 10;
/// Upper bound on `limit`, keeps list responses bounded.
pub const MAX_PAGE_LIMIT: u32 = 100;

pub const MAX_COMMENT_AUTHOR_LEN: usize = 100;
pub const MAX_COMMENT_TEXT_LEN: usize = 2000;

// --- Core Application Schemas (Mapped to Database) ---

/// Admin
///
/// A row of the `admins` table. Owned by the Credential Store; never serialized
/// to clients because it carries the password hash.
#[derive(Debug, Clone, FromRow)]
pub struct Admin {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// CommentStatus
///
/// Moderation state of a comment. Only `Approved` comments are ever shown publicly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum CommentStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl CommentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CommentStatus::Pending => "pending",
            CommentStatus::Approved => "approved",
            CommentStatus::Rejected => "rejected",
        }
    }
}

/// Comment
///
/// A reader remark embedded in its Work. Stored inside the `works.comments` JSONB
/// array with the same camelCase keys it has on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Comment {
    pub id: Uuid,
    pub author: String,
    pub text: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    pub status: CommentStatus,
}

impl Comment {
    /// New comments always start out pending, whatever the client asked for.
    pub fn pending(author: String, text: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            author,
            text,
            created_at: Utc::now(),
            status: CommentStatus::Pending,
        }
    }
}

/// Work
///
/// A literary work, the aggregate root of this service. Comments are ordered
/// newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Work {
    pub id: Uuid,
    pub title: String,
    pub excerpt: String,
    pub full_content: String,
    /// Public path of the cover image, or `"placeholder"`.
    pub image_url: String,
    #[ts(type = "number")]
    pub likes: i64,
    #[sqlx(json)]
    pub comments: Vec<Comment>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl Work {
    /// public_view
    ///
    /// The shape anonymous readers get: every comment that is not approved is dropped.
    pub fn public_view(mut self) -> Self {
        self.comments
            .retain(|comment| comment.status == CommentStatus::Approved);
        self
    }
}

/// PendingComment
///
/// One entry of the moderation queue: the comment plus enough of its Work to
/// locate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PendingComment {
    pub work_id: Uuid,
    pub work_title: String,
    #[sqlx(json)]
    pub comment: Comment,
}

// --- Repository Inputs ---

/// NewWork
///
/// Validated input for `Repository::create_work`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWork {
    pub title: String,
    pub excerpt: String,
    pub full_content: String,
    pub image_url: String,
}

/// WorkChanges
///
/// Validated partial update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkChanges {
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub full_content: Option<String>,
    /// Set only when a replacement image has already been stored.
    pub image_url: Option<String>,
}

impl WorkChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.excerpt.is_none()
            && self.full_content.is_none()
            && self.image_url.is_none()
    }
}

/// WorkUpdate
///
/// Result of an update: the new row, plus the image it stopped referencing
/// (if a new image replaced a real one).
#[derive(Debug, Clone, PartialEq)]
pub struct WorkUpdate {
    pub work: Work,
    pub replaced_image: Option<String>,
}

/// CommentChange
///
/// Outcome of a moderation write against one embedded comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentChange {
    Applied,
    WorkMissing,
    CommentMissing,
}

impl CommentChange {
    pub fn into_result(self) -> Result<(), AppError> {
        match self {
            CommentChange::Applied => Ok(()),
            CommentChange::WorkMissing => Err(AppError::work_not_found()),
            CommentChange::CommentMissing => {
                Err(AppError::NotFound("Comment not found".to_string()))
            }
        }
    }
}

// --- Paging ---

/// Page
///
/// Resolved, always-valid pagination window (1-based page).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl Page {
    /// Lenient parsing: missing, non-numeric or zero values fall back to the
    /// defaults; `limit` is capped at `MAX_PAGE_LIMIT`.
    pub fn from_raw(page: Option<&str>, limit: Option<&str>) -> Self {
        let parse = |raw: Option<&str>| {
            raw.and_then(|value| value.trim().parse::<u32>().ok())
                .filter(|value| *value >= 1)
        };

        Self {
            page: parse(page).unwrap_or(DEFAULT_PAGE),
            limit: parse(limit).unwrap_or(DEFAULT_PAGE_LIMIT).min(MAX_PAGE_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.limit)
    }

    /// Number of pages needed for `total` items. Zero items means zero pages.
    pub fn page_count(&self, total: i64) -> i64 {
        let limit = i64::from(self.limit);
        (total.max(0) + limit - 1) / limit
    }
}

/// PageQuery
///
/// Raw `?page=&limit=` parameters. Kept as strings so a malformed value degrades
/// to the default instead of rejecting the request.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// 1-based page number (default 1).
    pub page: Option<String>,
    /// Page size (default 10, max 100).
    pub limit: Option<String>,
}

impl PageQuery {
    pub fn resolve(&self) -> Page {
        Page::from_raw(self.page.as_deref(), self.limit.as_deref())
    }
}

/// SearchQuery
///
/// `?q=&page=&limit=` for `GET /api/works/search`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Full-text query over title, excerpt and full content.
    pub q: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl SearchQuery {
    pub fn resolve(&self) -> Page {
        Page::from_raw(self.page.as_deref(), self.limit.as_deref())
    }

    /// The trimmed query, or `BadRequest` when it is missing or blank.
    pub fn terms(&self) -> Result<&str, AppError> {
        self.q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| AppError::BadRequest("Search query is required".to_string()))
    }
}

/// --- Request Payloads (Input Schemas) ---

/// WorkFields
///
/// Text fields of a work as sent by the admin client, either as multipart form
/// fields or as a JSON body. All optional here; `into_new_work` / `into_changes`
/// decide what is required.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct WorkFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_content: Option<String>,
}

impl WorkFields {
    /// Every field is required and must not be blank. The title is trimmed.
    pub fn into_new_work(self, image_url: Option<String>) -> Result<NewWork, AppError> {
        Ok(NewWork {
            title: required("title", self.title)?.trim().to_string(),
            excerpt: required("excerpt", self.excerpt)?,
            full_content: required("fullContent", self.full_content)?,
            image_url: image_url.unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
        })
    }

    /// Only supplied fields change; a supplied field still must not be blank.
    pub fn into_changes(self, image_url: Option<String>) -> Result<WorkChanges, AppError> {
        Ok(WorkChanges {
            title: optional("title", self.title)?.map(|t| t.trim().to_string()),
            excerpt: optional("excerpt", self.excerpt)?,
            full_content: optional("fullContent", self.full_content)?,
            image_url,
        })
    }

    /// Validation without consuming, so handlers can reject before storing an upload.
    pub fn check_new(&self) -> Result<(), AppError> {
        self.clone().into_new_work(None).map(|_| ())
    }

    pub fn check_changes(&self) -> Result<(), AppError> {
        self.clone().into_changes(None).map(|_| ())
    }
}

fn required(field: &str, value: Option<String>) -> Result<String, AppError> {
    optional(field, value)?.ok_or_else(|| AppError::BadRequest(format!("{field} is required")))
}

fn optional(field: &str, value: Option<String>) -> Result<Option<String>, AppError> {
    match value {
        Some(v) if v.trim().is_empty() => {
            Err(AppError::BadRequest(format!("{field} must not be empty")))
        }
        other => Ok(other),
    }
}

/// CreateCommentRequest
///
/// Input payload for posting a comment. Unknown keys (such as a client-chosen
/// `status`) are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateCommentRequest {
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub text: String,
}

impl CreateCommentRequest {
    pub fn into_comment(self) -> Result<Comment, AppError> {
        let author = self.author.trim().to_string();
        let text = self.text.trim().to_string();

        if author.is_empty() || text.is_empty() {
            return Err(AppError::BadRequest("author and text are required".to_string()));
        }
        if author.chars().count() > MAX_COMMENT_AUTHOR_LEN {
            return Err(AppError::BadRequest(format!(
                "author must be at most {MAX_COMMENT_AUTHOR_LEN} characters"
            )));
        }
        if text.chars().count() > MAX_COMMENT_TEXT_LEN {
            return Err(AppError::BadRequest(format!(
                "text must be at most {MAX_COMMENT_TEXT_LEN} characters"
            )));
        }

        Ok(Comment::pending(author, text))
    }
}

/// CredentialsRequest
///
/// Body of both `POST /api/admin/register` and `POST /api/admin/login`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// RefreshRequest
///
/// Body of `POST /api/token/refresh`: the refresh token handed out at login.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RefreshRequest {
    #[serde(default)]
    pub token: String,
}

/// --- Response Schemas (Output) ---

/// WorkPage
///
/// Paged listing shared by `GET /api/works` and `GET /api/works/search`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct WorkPage {
    pub works: Vec<Work>,
    #[ts(type = "number")]
    pub total: i64,
    pub page: u32,
    #[ts(type = "number")]
    pub pages: i64,
}

impl WorkPage {
    /// Builds a public page: comments are filtered to approved ones.
    pub fn public(works: Vec<Work>, total: i64, page: Page) -> Self {
        Self {
            works: works.into_iter().map(Work::public_view).collect(),
            total,
            page: page.page,
            pages: page.page_count(total),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LikesResponse {
    #[ts(type = "number")]
    pub likes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterResponse {
    pub message: String,
    pub id: Uuid,
}

/// LoginResponse
///
/// `token` is the 8-hour session token; `refreshToken` feeds `/api/token/refresh`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AccessTokenResponse {
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PendingCommentsResponse {
    pub pending: Vec<PendingComment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(status: CommentStatus) -> Comment {
        Comment {
            status,
            ..Comment::pending("reader".to_string(), "lovely".to_string())
        }
    }

    fn work_with(comments: Vec<Comment>) -> Work {
        Work {
            id: Uuid::new_v4(),
            title: "T".to_string(),
            excerpt: "E".to_string(),
            full_content: "C".to_string(),
            image_url: PLACEHOLDER_IMAGE.to_string(),
            likes: 0,
            comments,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn public_view_keeps_only_approved_comments_in_order() {
        let approved_a = comment(CommentStatus::Approved);
        let approved_b = comment(CommentStatus::Approved);
        let work = work_with(vec![
            approved_a.clone(),
            comment(CommentStatus::Pending),
            comment(CommentStatus::Rejected),
            approved_b.clone(),
        ]);

        assert_eq!(work.public_view().comments, vec![approved_a, approved_b]);
    }

    #[test]
    fn page_defaults_and_cap() {
        assert_eq!(Page::from_raw(None, None), Page { page: 1, limit: 10 });
        assert_eq!(Page::from_raw(Some("abc"), Some("-3")), Page { page: 1, limit: 10 });
        assert_eq!(Page::from_raw(Some("0"), Some("0")), Page { page: 1, limit: 10 });
        assert_eq!(Page::from_raw(Some("3"), Some("500")), Page { page: 3, limit: 100 });
        assert_eq!(Page::from_raw(Some(" 2 "), Some("25")), Page { page: 2, limit: 25 });
    }

    #[test]
    fn page_arithmetic() {
        let page = Page { page: 3, limit: 10 };
        assert_eq!(page.offset(), 20);
        assert_eq!(page.page_count(0), 0);
        assert_eq!(page.page_count(10), 1);
        assert_eq!(page.page_count(11), 2);
    }

    #[test]
    fn blank_search_is_a_bad_request() {
        let blank = SearchQuery {
            q: Some("   ".to_string()),
            ..SearchQuery::default()
        };
        assert!(matches!(blank.terms(), Err(AppError::BadRequest(_))));
        assert!(matches!(SearchQuery::default().terms(), Err(AppError::BadRequest(_))));

        let query = SearchQuery {
            q: Some("  river  ".to_string()),
            ..SearchQuery::default()
        };
        assert_eq!(query.terms().unwrap(), "river");
    }

    #[test]
    fn comment_wire_format_is_camel_case_lowercase_status() {
        let json = serde_json::to_value(comment(CommentStatus::Approved)).unwrap();
        assert_eq!(json["status"], "approved");
        assert!(json.get("createdAt").is_some());
    }
}
