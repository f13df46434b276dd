use std::{any::Any, time::Duration};

use axum::{
    Router,
    extract::FromRef,
    http::{HeaderName, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any as AnyOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod password;
pub mod repository;
pub mod storage;
pub mod tokens;

// Routing segregated by access level (Public, Authenticated, Admin).
pub mod routes;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{LocalDiskStorage, MockStorageService, StorageState};
pub use tokens::TokenService;

/// ApiDoc
///
/// OpenAPI document for every route, served at `/api-docs/openapi.json` and
/// browsable through Swagger UI at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::welcome,
        handlers::works::list_works, handlers::works::search_works, handlers::works::get_work,
        handlers::works::like_work, handlers::works::add_comment, handlers::works::create_work,
        handlers::works::update_work, handlers::works::delete_work,
        handlers::works::delete_work_image,
        handlers::admin::register, handlers::admin::login, handlers::admin::refresh_token,
        handlers::admin::get_work_raw, handlers::admin::pending_comments,
        handlers::admin::approve_comment, handlers::admin::reject_comment,
        handlers::admin::delete_comment
    ),
    components(
        schemas(
            models::Work, models::Comment, models::CommentStatus, models::PendingComment,
            models::WorkFields, models::WorkPage, models::CreateCommentRequest,
            models::CredentialsRequest, models::RefreshRequest, models::LikesResponse,
            models::MessageResponse, models::RegisterResponse, models::LoginResponse,
            models::AccessTokenResponse, models::PendingCommentsResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "sardia", description = "Sardia literary works API")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by the protected paths.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// AppState
///
/// The single, cloneable container for every service a handler can reach.
/// Built once in `main` (or in a test) and shared across all requests.
#[derive(Clone)]
pub struct AppState {
    /// Works and admin accounts.
    pub repo: RepositoryState,
    /// Cover image files.
    pub storage: StorageState,
    /// Token minting and verification, keyed from `config`.
    pub tokens: TokenService,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(repo: RepositoryState, storage: StorageState, config: AppConfig) -> Self {
        Self {
            repo,
            storage,
            tokens: TokenService::new(&config),
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for TokenService {
    fn from_ref(app_state: &AppState) -> TokenService {
        app_state.tokens.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles every route, the auth layer, and the global middleware stack.
///
/// Layout:
/// - `/api/...`: public routes, plus the authenticated and admin routers behind
///   `require_admin`.
/// - `/uploads/...`: stored cover images, straight from `UPLOAD_DIR`.
/// - `/health`, `/swagger-ui`, `/api-docs/openapi.json`.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(AnyOrigin)
        .allow_origin(AnyOrigin)
        .allow_headers(AnyOrigin);

    let x_request_id = HeaderName::from_static("x-request-id");

    // Protected routers share one gate; the handler never runs without a valid token.
    let protected = Router::new()
        .merge(authenticated::authenticated_routes(
            state.config.max_upload_bytes,
        ))
        .nest("/admin", admin::admin_routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    let api = public::public_routes().merge(protected);

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(|| async { "ok" }))
        .nest("/api", api)
        .nest_service(
            storage::PUBLIC_UPLOAD_PREFIX,
            ServeDir::new(&state.config.upload_dir),
        )
        .with_state(state.clone());

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(
                    x_request_id.clone(),
                    MakeRequestUuid,
                ))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id))
                .layer(middleware::map_response(render_bare_errors))
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    Duration::from_secs(state.config.request_timeout_secs),
                ))
                // Innermost, so a panicking handler still gets a request id and a log line.
                .layer(CatchPanicLayer::custom(panic_response)),
        )
        .layer(cors)
}

/// Turns a handler panic into the standard JSON 500.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    AppError::Internal(format!("handler panicked: {detail}")).into_response()
}

/// Gives the empty-bodied 404 and 408 that never reach a handler the standard
/// JSON error body.
async fn render_bare_errors<B>(response: axum::http::Response<B>) -> Response
where
    B: axum::body::HttpBody<Data = axum::body::Bytes> + Send + 'static,
    B::Error: Into<axum::BoxError>,
{
    let response = response.map(axum::body::Body::new);
    if response.headers().contains_key(header::CONTENT_TYPE) {
        return response;
    }
    match response.status() {
        StatusCode::NOT_FOUND => AppError::NotFound("Resource not found".to_string()).into_response(),
        StatusCode::REQUEST_TIMEOUT => AppError::Timeout.into_response(),
        _ => response,
    }
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: every log line emitted while serving a request
/// carries its method, URI and `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
