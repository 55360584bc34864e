use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs;
use tracing::info;
use uuid::Uuid;

use crate::models::{StoredImage, VisitError};

pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

/// X-ray images on local disk, served back under `/uploads/`.
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub async fn save(&self, original_name: &str, bytes: &[u8]) -> Result<StoredImage, VisitError> {
        if bytes.is_empty() {
            return Err(VisitError::InvalidImage("No image file provided".to_string()));
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(VisitError::InvalidImage("Image file too large (max 10MB)".to_string()));
        }
        let extension = image_extension(original_name)?;

        let suffix: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
        let filename = format!("xray_{}_{}.{}", Utc::now().timestamp(), suffix, extension);

        fs::create_dir_all(&self.dir).await?;
        fs::write(self.dir.join(&filename), bytes).await?;

        info!(%filename, size = bytes.len(), "Image stored");
        Ok(StoredImage {
            url: format!("/uploads/{}", filename),
            filename,
            size: bytes.len(),
        })
    }

    /// Removes an image by its URL or bare file name. Only the final path segment is
    /// used, so a URL can never point outside the upload directory.
    pub async fn remove(&self, url: &str) -> Result<(), VisitError> {
        let filename = Path::new(url.trim())
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.starts_with('.'))
            .ok_or_else(|| VisitError::InvalidImage("Invalid file URL".to_string()))?;

        let path = self.dir.join(filename);
        if !fs::try_exists(&path).await? {
            return Err(VisitError::NotFound("File"));
        }
        fs::remove_file(&path).await?;

        info!(%filename, "Image deleted");
        Ok(())
    }
}

/// Lower-cased extension of an allowed image file name.
pub fn image_extension(name: &str) -> Result<String, VisitError> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .ok_or_else(|| {
            VisitError::InvalidImage("Invalid image format. Allowed: jpg, jpeg, png, webp, gif".to_string())
        })
}
