//! # Object Storage
//!
//! Product images live behind the [`ObjectStore`] trait. Keys are
//! `/`-separated relative paths; every object a company owns sits below
//! `companies/<company_id>/`.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use crate::error::{ApiError, validation};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid object key: {0}")]
    InvalidKey(String),
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidKey(key) => validation(format!("invalid object key: {key}")),
            StorageError::Io(e) => {
                tracing::error!(error = %e, "Object storage failure");
                ApiError::from(crate::error::ErrorType::InternalServerError)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// `Ok(None)` when no object exists under `key`.
    async fn get(&self, key: &str) -> Result<Option<StoredObject>, StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Filesystem-backed store rooted at `STORAGE_ROOT`.
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |path, segment| path.join(segment)))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(key, size = bytes.len(), "Object stored");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredObject>, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(StoredObject {
                bytes,
                content_type: content_type_for(&path),
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Relative, non-empty segments of `[A-Za-z0-9._-]`, no `.`/`..`.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key.split('/').all(|segment| {
            !segment.is_empty()
                && segment != "."
                && segment != ".."
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        });
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

pub fn company_prefix(company_id: Uuid) -> String {
    format!("companies/{company_id}/")
}

pub fn belongs_to(key: &str, company_id: Uuid) -> bool {
    key.starts_with(&company_prefix(company_id))
}

/// `companies/<company>/products/<product>/<uuid>.<ext>`
pub fn product_image_key(company_id: Uuid, product_id: Uuid, extension: &str) -> String {
    format!(
        "{}products/{product_id}/{}.{extension}",
        company_prefix(company_id),
        Uuid::new_v4()
    )
}

/// Path-based reference served by `GET /storage/{*key}`.
pub fn public_url(key: &str) -> String {
    format!("/storage/{key}")
}

/// File extension for an accepted image content type.
pub fn image_extension(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    match essence.to_ascii_lowercase().as_str() {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}
