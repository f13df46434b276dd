use async_trait::async_trait;
use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};
use thiserror::Error;
use tokio::fs;
use uuid::Uuid;

use crate::models::PLACEHOLDER_IMAGE;

/// Public path prefix uploaded images are served under.
pub const PUBLIC_UPLOAD_PREFIX: &str = "/uploads";

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "avif"];

#[derive(Debug, Error)]
pub enum StorageError {
    /// The upload is not an image we accept. Surfaces as 400.
    #[error("unsupported image: {0}")]
    Unsupported(String),

    /// The stored url does not point inside the upload directory.
    #[error("refusing to touch `{0}`: not an uploaded image")]
    OutsideRoot(String),

    #[error("storage i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("simulated storage failure")]
    Simulated,
}

// 1. StorageService Contract
/// StorageService
///
/// Abstract contract for cover-image persistence. Handlers only ever see the public
/// path returned by `save_image`; that path is what ends up in `Work.image_url`.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Stores the bytes under a server-generated name and returns the public path.
    async fn save_image(
        &self,
        original_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<String, StorageError>;

    /// Removes a previously saved image. Already-missing files count as removed.
    async fn delete_image(&self, public_path: &str) -> Result<(), StorageError>;
}

/// StorageState
///
/// The concrete type used to share the storage service across the application state.
pub type StorageState = Arc<dyn StorageService>;

// 2. The Real Implementation (local disk, served by ServeDir)
/// LocalDiskStorage
///
/// Writes images into a single flat directory. The router mounts the same
/// directory under `/uploads`.
#[derive(Clone, Debug)]
pub struct LocalDiskStorage {
    root: PathBuf,
}

impl LocalDiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl StorageService for LocalDiskStorage {
    async fn save_image(
        &self,
        original_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<String, StorageError> {
        let extension = image_extension(original_name, content_type)?;
        if bytes.is_empty() {
            return Err(StorageError::Unsupported("empty file".to_string()));
        }

        let file_name = format!("image-{}.{}", Uuid::new_v4(), extension);
        fs::create_dir_all(&self.root).await?;
        fs::write(self.root.join(&file_name), bytes).await?;

        tracing::debug!(file = %file_name, size = bytes.len(), "stored uploaded image");
        Ok(format!("{PUBLIC_UPLOAD_PREFIX}/{file_name}"))
    }

    async fn delete_image(&self, public_path: &str) -> Result<(), StorageError> {
        let file_name = upload_file_name(public_path)
            .ok_or_else(|| StorageError::OutsideRoot(public_path.to_string()))?;

        match fs::remove_file(self.root.join(file_name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// image_extension
///
/// Derives the stored extension from the client filename, after checking the
/// declared MIME type is an image.
fn image_extension(original_name: &str, content_type: &str) -> Result<String, StorageError> {
    if !content_type.starts_with("image/") {
        return Err(StorageError::Unsupported(format!(
            "content type `{content_type}` is not an image"
        )));
    }

    let extension = std::path::Path::new(original_name)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| StorageError::Unsupported("file has no extension".to_string()))?;

    if ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        Ok(extension)
    } else {
        Err(StorageError::Unsupported(format!("`.{extension}` files are not accepted")))
    }
}

/// upload_file_name
///
/// Maps `/uploads/<name>` back to `<name>`, rejecting anything that would escape
/// the upload directory (nested segments, `..`, empty names).
fn upload_file_name(public_path: &str) -> Option<&str> {
    let name = public_path
        .strip_prefix(PUBLIC_UPLOAD_PREFIX)?
        .strip_prefix('/')?;

    let traversal = name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name == "."
        || name == "..";
    (!traversal).then_some(name)
}

/// release_image
///
/// Best-effort cleanup of a stored image after the database no longer references
/// it. The placeholder sentinel is never sent to storage. Failures are logged and
/// swallowed: the database change has already been committed.
pub async fn release_image(storage: &dyn StorageService, image_url: &str) {
    if image_url == PLACEHOLDER_IMAGE || image_url.is_empty() {
        return;
    }

    if let Err(e) = storage.delete_image(image_url).await {
        tracing::warn!(image = %image_url, error = %e, "failed to release stored image");
    }
}

// 3. The Mock Implementation (For Tests)
/// MockStorageService
///
/// In-memory `StorageService` that records every call. Used by handler tests to
/// assert how many deletions a request triggered.
#[derive(Default)]
pub struct MockStorageService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
    saved: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Public paths handed out by `save_image`, in call order.
    pub fn saved(&self) -> Vec<String> {
        self.saved.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Paths passed to `delete_image`, in call order (including failed attempts).
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn save_image(
        &self,
        original_name: &str,
        content_type: &str,
        _bytes: &[u8],
    ) -> Result<String, StorageError> {
        if self.should_fail {
            return Err(StorageError::Simulated);
        }
        let extension = image_extension(original_name, content_type)?;
        let path = format!("{PUBLIC_UPLOAD_PREFIX}/image-{}.{}", Uuid::new_v4(), extension);
        if let Ok(mut saved) = self.saved.lock() {
            saved.push(path.clone());
        }
        Ok(path)
    }

    async fn delete_image(&self, public_path: &str) -> Result<(), StorageError> {
        if let Ok(mut deleted) = self.deleted.lock() {
            deleted.push(public_path.to_string());
        }
        if self.should_fail {
            return Err(StorageError::Simulated);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_comes_from_the_filename_and_is_normalised() {
        assert_eq!(image_extension("Cover.JPG", "image/jpeg").unwrap(), "jpg");
        assert_eq!(image_extension("a.b.webp", "image/webp").unwrap(), "webp");
    }

    #[test]
    fn non_images_are_refused() {
        assert!(matches!(
            image_extension("notes.pdf", "application/pdf"),
            Err(StorageError::Unsupported(_))
        ));
        assert!(matches!(
            image_extension("script.sh", "image/png"),
            Err(StorageError::Unsupported(_))
        ));
        assert!(matches!(
            image_extension("noext", "image/png"),
            Err(StorageError::Unsupported(_))
        ));
    }

    #[test]
    fn only_direct_children_of_the_upload_prefix_resolve() {
        assert_eq!(upload_file_name("/uploads/image-1.png"), Some("image-1.png"));
        assert_eq!(upload_file_name("/uploads/../etc/passwd"), None);
        assert_eq!(upload_file_name("/uploads/.."), None);
        assert_eq!(upload_file_name("/uploads/"), None);
        assert_eq!(upload_file_name("/elsewhere/image.png"), None);
        assert_eq!(upload_file_name("placeholder"), None);
    }

    #[tokio::test]
    async fn placeholder_is_never_sent_to_storage() {
        let mock = MockStorageService::new();
        release_image(&mock, PLACEHOLDER_IMAGE).await;
        assert!(mock.deleted().is_empty());
    }

    #[tokio::test]
    async fn failed_release_is_swallowed() {
        let mock = MockStorageService::new_failing();
        release_image(&mock, "/uploads/image-1.png").await;
        assert_eq!(mock.deleted(), vec!["/uploads/image-1.png".to_string()]);
    }
}
