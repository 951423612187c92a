//! Show image storage.
//!
//! Uploads are decoded to prove they are images, then written unchanged to
//! `<media_root>/astronomy-shows/<sha256>.<ext>`. Identical uploads share a file.

use std::path::Path;

use image::ImageFormat;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::utils::error::{AppError, FieldErrors};

pub const IMAGE_DIR: &str = "astronomy-shows";
pub const MEDIA_URL_PREFIX: &str = "/media";

const SUPPORTED_FORMATS: [ImageFormat; 3] = [ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::WebP];

fn invalid_image(message: impl Into<String>) -> AppError {
    AppError::InvalidFields(FieldErrors::single("image", message))
}

/// Checks that `data` is a decodable image in a supported format.
pub fn detect_format(data: &[u8]) -> Result<ImageFormat, AppError> {
    if data.is_empty() {
        return Err(invalid_image("the submitted file is empty"));
    }
    let format = image::guess_format(data).map_err(|_| {
        invalid_image("upload a valid image; the file is either not an image or corrupted")
    })?;
    if !SUPPORTED_FORMATS.contains(&format) {
        return Err(invalid_image(format!(
            "unsupported image format {format:?}; use PNG, JPEG or WebP"
        )));
    }
    image::load_from_memory_with_format(data, format).map_err(|_| {
        invalid_image("upload a valid image; the file is either not an image or corrupted")
    })?;
    Ok(format)
}

fn content_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Writes an uploaded image below `media_root` and returns its public URL path.
pub async fn store_image(media_root: &Path, data: &[u8]) -> Result<String, AppError> {
    let format = detect_format(data)?;
    let extension = format.extensions_str().first().copied().unwrap_or("img");
    let filename = format!("{}.{extension}", content_hash(data));

    let dir = media_root.join(IMAGE_DIR);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| AppError::InternalServerError(format!("failed to create media dir: {e}")))?;

    let path = dir.join(&filename);
    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        info!(file = %filename, "Image already stored");
    } else {
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| AppError::InternalServerError(format!("failed to write image: {e}")))?;
        info!(file = %filename, bytes = data.len(), "Image stored");
    }

    Ok(format!("{MEDIA_URL_PREFIX}/{IMAGE_DIR}/{filename}"))
}
