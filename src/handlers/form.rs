use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::header,
};

use crate::{error::AppError, models::WorkFields};

/// Name of the multipart field that carries the cover image.
pub const IMAGE_FIELD: &str = "image";

/// ImageUpload
///
/// A cover image received in a multipart body, not yet stored.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// WorkForm
///
/// Body of the work create/update endpoints. The admin client sends
/// `multipart/form-data` (text fields plus an optional `image`) when a file is
/// attached and plain JSON otherwise, so both are accepted here.
#[derive(Debug, Clone, Default)]
pub struct WorkForm {
    pub fields: WorkFields,
    pub image: Option<ImageUpload>,
}

impl<S> FromRequest<S> for WorkForm
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state).await?;
            return read_multipart(multipart).await;
        }

        if content_type.starts_with("application/json") {
            let axum::Json(fields) = axum::Json::<WorkFields>::from_request(req, state).await?;
            return Ok(WorkForm {
                fields,
                image: None,
            });
        }

        Err(AppError::BadRequest(
            "Expected a multipart/form-data or application/json body".to_string(),
        ))
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<WorkForm, AppError> {
    let mut form = WorkForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => form.fields.title = Some(field.text().await?),
            "excerpt" => form.fields.excerpt = Some(field.text().await?),
            "fullContent" => form.fields.full_content = Some(field.text().await?),
            IMAGE_FIELD => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await?;

                // Browsers send an empty part when the file input was left blank.
                if bytes.is_empty() && file_name.is_empty() {
                    continue;
                }
                form.image = Some(ImageUpload {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            _ => {}
        }
    }

    Ok(form)
}
