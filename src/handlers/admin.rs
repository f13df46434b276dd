use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use uuid::Uuid;

use super::{ApiJson, ApiPath};
use crate::{
    AppState,
    auth::AuthAdmin,
    error::{AppError, AppResult},
    models::{
        AccessTokenResponse, CommentStatus, CredentialsRequest, LoginResponse, MessageResponse,
        PendingCommentsResponse, RefreshRequest, RegisterResponse, Work,
    },
    password::{check_credentials, hash_password, validate_registration},
};

// --- Authentication ---

/// register
///
/// [Public Route] Creates an admin account. Can be switched off with
/// `ALLOW_ADMIN_REGISTRATION=false`, in which case it answers 403.
#[utoipa::path(
    post,
    path = "/api/admin/register",
    request_body = CredentialsRequest,
    responses(
        (status = 201, description = "Admin created", body = RegisterResponse),
        (status = 400, description = "Username taken or input invalid"),
        (status = 403, description = "Registration disabled")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CredentialsRequest>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    if !state.config.allow_registration {
        return Err(AppError::Forbidden("Admin registration is disabled".to_string()));
    }

    let username = validate_registration(&payload.username, &payload.password)?;
    let password = payload.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(format!("hashing task failed: {e}")))??;

    let admin = state.repo.create_admin(&username, &password_hash).await?;
    tracing::info!(admin = %admin.id, username = %admin.username, "admin registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Admin user created successfully".to_string(),
            id: admin.id,
        }),
    ))
}

/// login
///
/// [Public Route] Exchanges credentials for an 8-hour session token and a
/// refresh token. An unknown username and a wrong password produce the same 400.
#[utoipa::path(
    post,
    path = "/api/admin/login",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 400, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CredentialsRequest>,
) -> AppResult<Json<LoginResponse>> {
    let admin = state
        .repo
        .find_admin_by_username(payload.username.trim())
        .await?;

    let stored_hash = admin.as_ref().map(|a| a.password_hash.clone());
    let password = payload.password;
    let matches = tokio::task::spawn_blocking(move || {
        check_credentials(&password, stored_hash.as_deref())
    })
    .await
    .map_err(|e| AppError::Internal(format!("verification task failed: {e}")))?;

    let admin = match admin {
        Some(admin) if matches => admin,
        _ => {
            tracing::info!("rejected admin login");
            return Err(AppError::InvalidCredentials);
        }
    };

    let now = Utc::now().timestamp();
    Ok(Json(LoginResponse {
        token: state.tokens.issue_session(admin.id, now)?,
        refresh_token: state.tokens.issue_refresh(admin.id, now)?,
    }))
}

/// refresh_token
///
/// [Public Route] Mints a short-lived access token from a refresh token.
/// Any problem with the refresh token is a 403.
#[utoipa::path(
    post,
    path = "/api/token/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = AccessTokenResponse),
        (status = 403, description = "Refresh token invalid or expired")
    )
)]
pub async fn refresh_token(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RefreshRequest>,
) -> AppResult<Json<AccessTokenResponse>> {
    let now = Utc::now().timestamp();
    let admin_id = state.tokens.verify_refresh(payload.token.trim(), now)?;
    Ok(Json(AccessTokenResponse {
        access_token: state.tokens.issue_access(admin_id, now)?,
    }))
}

// --- Moderation (Authenticated) ---

/// get_work_raw
///
/// [Admin Route] The stored work with every comment, whatever its status.
/// Used to prefill the edit form.
#[utoipa::path(
    get,
    path = "/api/admin/works/{id}",
    params(("id" = Uuid, Path, description = "Work ID")),
    responses(
        (status = 200, description = "Found", body = Work),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_work_raw(
    _admin: AuthAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Work>> {
    let work = state
        .repo
        .get_work(id)
        .await?
        .ok_or_else(AppError::work_not_found)?;
    Ok(Json(work))
}

/// pending_comments
///
/// [Admin Route] The moderation queue: every pending comment, newest first,
/// tagged with the work it belongs to.
#[utoipa::path(
    get,
    path = "/api/admin/works/comments/pending",
    responses((status = 200, description = "Pending comments", body = PendingCommentsResponse)),
    security(("bearer_auth" = []))
)]
pub async fn pending_comments(
    _admin: AuthAdmin,
    State(state): State<AppState>,
) -> AppResult<Json<PendingCommentsResponse>> {
    let pending = state.repo.pending_comments().await?;
    Ok(Json(PendingCommentsResponse { pending }))
}

/// approve_comment
///
/// [Admin Route] Makes a comment publicly visible.
#[utoipa::path(
    put,
    path = "/api/admin/works/{work_id}/comments/{comment_id}/approve",
    params(
        ("work_id" = Uuid, Path, description = "Work ID"),
        ("comment_id" = Uuid, Path, description = "Comment ID")
    ),
    responses(
        (status = 200, description = "Approved", body = MessageResponse),
        (status = 404, description = "Work or comment not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn approve_comment(
    admin: AuthAdmin,
    State(state): State<AppState>,
    ApiPath((work_id, comment_id)): ApiPath<(Uuid, Uuid)>,
) -> AppResult<Json<MessageResponse>> {
    moderate(&state, admin, work_id, comment_id, CommentStatus::Approved).await?;
    Ok(Json(MessageResponse::new("Comment approved")))
}

/// reject_comment
///
/// [Admin Route] Keeps the comment but hides it for good: it leaves the pending
/// queue and is never shown publicly.
#[utoipa::path(
    put,
    path = "/api/admin/works/{work_id}/comments/{comment_id}/reject",
    params(
        ("work_id" = Uuid, Path, description = "Work ID"),
        ("comment_id" = Uuid, Path, description = "Comment ID")
    ),
    responses(
        (status = 200, description = "Rejected", body = MessageResponse),
        (status = 404, description = "Work or comment not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn reject_comment(
    admin: AuthAdmin,
    State(state): State<AppState>,
    ApiPath((work_id, comment_id)): ApiPath<(Uuid, Uuid)>,
) -> AppResult<Json<MessageResponse>> {
    moderate(&state, admin, work_id, comment_id, CommentStatus::Rejected).await?;
    Ok(Json(MessageResponse::new("Comment rejected")))
}

/// delete_comment
///
/// [Admin Route] Removes the comment from its work entirely.
#[utoipa::path(
    delete,
    path = "/api/admin/works/{work_id}/comments/{comment_id}",
    params(
        ("work_id" = Uuid, Path, description = "Work ID"),
        ("comment_id" = Uuid, Path, description = "Comment ID")
    ),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Work or comment not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_comment(
    admin: AuthAdmin,
    State(state): State<AppState>,
    ApiPath((work_id, comment_id)): ApiPath<(Uuid, Uuid)>,
) -> AppResult<Json<MessageResponse>> {
    state
        .repo
        .delete_comment(work_id, comment_id)
        .await?
        .into_result()?;
    tracing::info!(admin = %admin.id, work = %work_id, comment = %comment_id, "comment deleted");
    Ok(Json(MessageResponse::new("Comment deleted successfully")))
}

async fn moderate(
    state: &AppState,
    admin: AuthAdmin,
    work_id: Uuid,
    comment_id: Uuid,
    status: CommentStatus,
) -> AppResult<()> {
    state
        .repo
        .set_comment_status(work_id, comment_id, status)
        .await?
        .into_result()?;
    tracing::info!(
        admin = %admin.id,
        work = %work_id,
        comment = %comment_id,
        status = status.as_str(),
        "comment moderated"
    );
    Ok(())
}
