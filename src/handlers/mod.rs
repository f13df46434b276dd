//! HTTP handlers.
//!
//! `works` holds the public reading endpoints plus the protected work editing
//! endpoints; `admin` holds authentication and comment moderation. Every handler
//! returns `AppResult`, so failures render through `AppError`'s JSON body.

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts},
};

use crate::{error::AppError, models::MessageResponse};

pub mod admin;
pub mod form;
pub mod works;

pub use form::{ImageUpload, WorkForm};

pub const WELCOME_MESSAGE: &str = "Welcome to the Sardia API!";

/// `axum::Json` with rejections rendered as `AppError`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Path` with rejections rendered as `AppError`.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// `axum::extract::Query` with rejections rendered as `AppError`.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// welcome
///
/// [Public Route] API root, used by the admin client as a liveness check.
#[utoipa::path(
    get,
    path = "/api",
    responses((status = 200, description = "Welcome", body = MessageResponse))
)]
pub async fn welcome() -> Json<MessageResponse> {
    Json(MessageResponse::new(WELCOME_MESSAGE))
}
