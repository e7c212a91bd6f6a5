//! Event image uploads stored on local disk

use std::path::PathBuf;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;
use crate::config::UploadConfig;
use crate::utils::errors::{MaabaraError, Result};

/// Public path segment under which uploaded files are served
pub const UPLOADS_ROUTE: &str = "/uploads";

#[derive(Debug, Clone, Serialize)]
pub struct UploadedImage {
    pub file_name: String,
    pub url: String,
    pub size: usize,
    pub content_type: String,
}

/// File extension for an accepted image content type
pub fn image_extension(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    match essence.as_str() {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

/// Content type for a stored file name, used when serving it back
pub fn content_type_for(file_name: &str) -> Option<&'static str> {
    match file_name.rsplit_once('.')?.1 {
        "png" => Some("image/png"),
        "jpg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

/// Stored names are `<uuid>.<ext>`; anything else is not ours to serve
pub fn is_stored_name(file_name: &str) -> bool {
    match file_name.rsplit_once('.') {
        Some((stem, _)) => Uuid::parse_str(stem).is_ok() && content_type_for(file_name).is_some(),
        None => false,
    }
}

#[derive(Debug, Clone)]
pub struct UploadService {
    directory: PathBuf,
    max_bytes: usize,
    public_url: String,
}

impl UploadService {
    pub fn new(config: &UploadConfig, public_url: &str) -> Self {
        Self {
            directory: PathBuf::from(&config.directory),
            max_bytes: config.max_bytes,
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Validate and store an image, returning its public URL
    pub async fn store_image(&self, content_type: &str, data: &[u8]) -> Result<UploadedImage> {
        let extension = image_extension(content_type).ok_or_else(|| {
            MaabaraError::InvalidInput(format!("Unsupported image type: {}", content_type))
        })?;

        if data.is_empty() {
            return Err(MaabaraError::InvalidInput("Uploaded file is empty".to_string()));
        }
        if data.len() > self.max_bytes {
            return Err(MaabaraError::InvalidInput(format!(
                "Image is too large ({} bytes, limit {} bytes)",
                data.len(),
                self.max_bytes
            )));
        }

        tokio::fs::create_dir_all(&self.directory).await?;

        let file_name = format!("{}.{}", Uuid::new_v4(), extension);
        tokio::fs::write(self.directory.join(&file_name), data).await?;

        info!(file = %file_name, size = data.len(), "Image uploaded");

        Ok(UploadedImage {
            url: format!("{}{}/{}", self.public_url, UPLOADS_ROUTE, file_name),
            file_name,
            size: data.len(),
            content_type: content_type.to_string(),
        })
    }

    /// Read a previously stored image
    pub async fn read_image(&self, file_name: &str) -> Result<(&'static str, Vec<u8>)> {
        let content_type = content_type_for(file_name)
            .filter(|_| is_stored_name(file_name))
            .ok_or_else(|| MaabaraError::InvalidInput(format!("Unknown upload: {}", file_name)))?;

        let bytes = tokio::fs::read(self.directory.join(file_name)).await?;
        Ok((content_type, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    fn service(dir: &TempDir, max_bytes: usize) -> UploadService {
        UploadService::new(
            &UploadConfig {
                directory: dir.path().to_string_lossy().to_string(),
                max_bytes,
            },
            "https://maabara.online/",
        )
    }

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension("image/png"), Some("png"));
        assert_eq!(image_extension("IMAGE/JPEG; charset=binary"), Some("jpg"));
        assert_eq!(image_extension("image/svg+xml"), None);
        assert_eq!(image_extension("application/pdf"), None);
    }

    #[test]
    fn test_stored_name_rejects_traversal() {
        assert!(!is_stored_name("../secrets.png"));
        assert!(!is_stored_name("banner.png"));
        assert!(is_stored_name(&format!("{}.webp", Uuid::new_v4())));
    }

    #[tokio::test]
    async fn test_store_and_read_image() {
        let dir = TempDir::new().unwrap();
        let uploads = service(&dir, 1024);

        let image = uploads.store_image("image/png", b"\x89PNG\r\n\x1a\n").await.unwrap();
        assert!(image.url.starts_with("https://maabara.online/uploads/"));
        assert!(image.file_name.ends_with(".png"));
        assert!(dir.path().join(&image.file_name).exists());

        let (content_type, bytes) = uploads.read_image(&image.file_name).await.unwrap();
        assert_eq!(content_type, "image/png");
        assert_eq!(bytes, b"\x89PNG\r\n\x1a\n");
    }

    #[tokio::test]
    async fn test_rejects_oversized_and_wrong_type() {
        let dir = TempDir::new().unwrap();
        let uploads = service(&dir, 4);

        assert_matches!(uploads.store_image("image/gif", b"GIF89a").await, Err(MaabaraError::InvalidInput(msg)) if msg.contains("too large"));
        assert_matches!(uploads.store_image("text/html", b"<p>").await, Err(MaabaraError::InvalidInput(_)));
        assert_matches!(uploads.store_image("image/png", b"").await, Err(MaabaraError::InvalidInput(_)));
    }
}
