use axum::{Json, extract::State, http::StatusCode};
use uuid::Uuid;

use super::{ApiJson, ApiPath, ApiQuery, ImageUpload, WorkForm};
use crate::{
    AppState,
    auth::AuthAdmin,
    error::{AppError, AppResult},
    models::{
        Comment, CreateCommentRequest, LikesResponse, MessageResponse, PageQuery, SearchQuery,
        Work, WorkFields, WorkPage,
    },
    storage::{StorageService, release_image},
};

// --- Public Reading ---

/// list_works
///
/// [Public Route] Newest works first, paged. Only approved comments are included.
#[utoipa::path(
    get,
    path = "/api/works",
    params(PageQuery),
    responses((status = 200, description = "A page of works", body = WorkPage))
)]
pub async fn list_works(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> AppResult<Json<WorkPage>> {
    let page = query.resolve();
    let (works, total) = state.repo.list_works(page).await?;
    Ok(Json(WorkPage::public(works, total, page)))
}

/// search_works
///
/// [Public Route] Full-text search over title, excerpt and full content,
/// most relevant first. A missing or blank `q` is a 400.
#[utoipa::path(
    get,
    path = "/api/works/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching works", body = WorkPage),
        (status = 400, description = "Missing search query")
    )
)]
pub async fn search_works(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> AppResult<Json<WorkPage>> {
    let terms = query.terms()?;
    let page = query.resolve();
    let (works, total) = state.repo.search_works(terms, page).await?;
    Ok(Json(WorkPage::public(works, total, page)))
}

/// get_work
///
/// [Public Route] A single work with its approved comments.
#[utoipa::path(
    get,
    path = "/api/works/{id}",
    params(("id" = Uuid, Path, description = "Work ID")),
    responses(
        (status = 200, description = "Found", body = Work),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_work(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Work>> {
    let work = state
        .repo
        .get_work(id)
        .await?
        .ok_or_else(AppError::work_not_found)?;
    Ok(Json(work.public_view()))
}

/// like_work
///
/// [Public Route] Anonymous like. The increment happens inside a single store
/// write, so concurrent likes are all counted.
#[utoipa::path(
    post,
    path = "/api/works/{id}/like",
    params(("id" = Uuid, Path, description = "Work ID")),
    responses(
        (status = 200, description = "New like count", body = LikesResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn like_work(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<LikesResponse>> {
    let likes = state
        .repo
        .increment_likes(id)
        .await?
        .ok_or_else(AppError::work_not_found)?;
    Ok(Json(LikesResponse { likes }))
}

/// add_comment
///
/// [Public Route] Posts a reader comment. It is stored as `pending` whatever the
/// body says and stays hidden until an admin approves it.
#[utoipa::path(
    post,
    path = "/api/works/{id}/comments",
    params(("id" = Uuid, Path, description = "Work ID")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment queued for moderation", body = Comment),
        (status = 400, description = "Missing author or text"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn add_comment(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<CreateCommentRequest>,
) -> AppResult<(StatusCode, Json<Comment>)> {
    let comment = payload.into_comment()?;
    if !state.repo.add_comment(id, comment.clone()).await? {
        return Err(AppError::work_not_found());
    }
    Ok((StatusCode::CREATED, Json(comment)))
}

// --- Work Editing (Authenticated) ---

/// create_work
///
/// [Authenticated Route] Creates a work from a multipart form. The image is
/// optional; without one the work gets the placeholder. Text fields are
/// validated before anything is written to storage.
#[utoipa::path(
    post,
    path = "/api/works",
    request_body(
        content = WorkFields,
        content_type = "multipart/form-data",
        description = "title, excerpt, fullContent and an optional `image` file"
    ),
    responses(
        (status = 201, description = "Created", body = Work),
        (status = 400, description = "Missing field or unsupported image"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_work(
    admin: AuthAdmin,
    State(state): State<AppState>,
    form: WorkForm,
) -> AppResult<(StatusCode, Json<Work>)> {
    form.fields.check_new()?;
    let image_url = store_upload(&*state.storage, form.image).await?;
    let new_work = form.fields.into_new_work(image_url.clone())?;

    match state.repo.create_work(new_work).await {
        Ok(work) => {
            tracing::info!(admin = %admin.id, work = %work.id, "work created");
            Ok((StatusCode::CREATED, Json(work)))
        }
        Err(e) => {
            discard_upload(&*state.storage, image_url).await;
            Err(e)
        }
    }
}

/// update_work
///
/// [Authenticated Route] Partial update: fields absent from the body keep their
/// value. Accepts multipart (optionally with a new `image`) or JSON. When a new
/// image replaces an uploaded one, the old file is released after the write.
#[utoipa::path(
    put,
    path = "/api/works/{id}",
    params(("id" = Uuid, Path, description = "Work ID")),
    request_body(
        content = WorkFields,
        content_type = "multipart/form-data",
        description = "Any subset of title, excerpt, fullContent, plus an optional `image`. \
                       The same fields are accepted as a JSON body."
    ),
    responses(
        (status = 200, description = "Updated", body = Work),
        (status = 400, description = "Empty field or unsupported image"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_work(
    admin: AuthAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    form: WorkForm,
) -> AppResult<Json<Work>> {
    form.fields.check_changes()?;
    let image_url = store_upload(&*state.storage, form.image).await?;
    let changes = form.fields.into_changes(image_url.clone())?;

    // Nothing supplied: answer with the stored work without writing.
    if changes.is_empty() {
        let work = state
            .repo
            .get_work(id)
            .await?
            .ok_or_else(AppError::work_not_found)?;
        return Ok(Json(work));
    }

    match state.repo.update_work(id, changes).await {
        Ok(Some(update)) => {
            if let Some(old) = &update.replaced_image {
                release_image(&*state.storage, old).await;
            }
            tracing::info!(admin = %admin.id, work = %id, "work updated");
            Ok(Json(update.work))
        }
        Ok(None) => {
            discard_upload(&*state.storage, image_url).await;
            Err(AppError::work_not_found())
        }
        Err(e) => {
            discard_upload(&*state.storage, image_url).await;
            Err(e)
        }
    }
}

/// delete_work
///
/// [Authenticated Route] Deletes the work, then releases its image. A work that
/// still has the placeholder causes no storage call at all.
#[utoipa::path(
    delete,
    path = "/api/works/{id}",
    params(("id" = Uuid, Path, description = "Work ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_work(
    admin: AuthAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    let image_url = state
        .repo
        .delete_work(id)
        .await?
        .ok_or_else(AppError::work_not_found)?;

    release_image(&*state.storage, &image_url).await;
    tracing::info!(admin = %admin.id, work = %id, "work deleted");
    Ok(Json(MessageResponse::new("Work deleted successfully")))
}

/// delete_work_image
///
/// [Authenticated Route] Drops the cover image: the work goes back to the
/// placeholder and the previous file is released.
#[utoipa::path(
    delete,
    path = "/api/works/{id}/image",
    params(("id" = Uuid, Path, description = "Work ID")),
    responses(
        (status = 200, description = "Image removed", body = MessageResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_work_image(
    _admin: AuthAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    let previous = state
        .repo
        .reset_work_image(id)
        .await?
        .ok_or_else(AppError::work_not_found)?;

    release_image(&*state.storage, &previous).await;
    Ok(Json(MessageResponse::new("Image removed successfully")))
}

async fn store_upload(
    storage: &dyn StorageService,
    image: Option<ImageUpload>,
) -> AppResult<Option<String>> {
    let Some(upload) = image else {
        return Ok(None);
    };
    let path = storage
        .save_image(&upload.file_name, &upload.content_type, &upload.bytes)
        .await?;
    Ok(Some(path))
}

/// Releases an image this request stored but never managed to reference.
async fn discard_upload(storage: &dyn StorageService, image_url: Option<String>) {
    if let Some(url) = image_url {
        release_image(storage, &url).await;
    }
}
