use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Per-file upload cap
const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Stores an uploaded image on disk and returns its public path
///
/// Only JPEG, PNG, and GIF images up to 5 MiB are accepted. Files get a
/// unique name so uploads never collide; the returned path is relative
/// (`uploads/<name>`) and served by the static file layer.
pub async fn save_image(data: &[u8], content_type: &str, upload_dir: &str) -> AppResult<String> {
    let extension = match content_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        other => {
            return Err(AppError::InvalidInput(format!(
                "Only JPG, JPEG, PNG, and GIF files are allowed, got {}",
                other
            )))
        }
    };

    if data.len() > MAX_IMAGE_BYTES {
        return Err(AppError::InvalidInput(
            "Image exceeds the 5 MB size limit".to_string(),
        ));
    }

    let filename = format!("{}.{}", Uuid::new_v4(), extension);
    let path = std::path::Path::new(upload_dir).join(&filename);

    tokio::fs::create_dir_all(upload_dir)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to create upload dir: {}", e)))?;
    tokio::fs::write(&path, data)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to store upload: {}", e)))?;

    tracing::debug!(file = %filename, bytes = data.len(), "Stored uploaded image");

    Ok(format!("uploads/{}", filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir() -> String {
        std::env::temp_dir()
            .join(format!("bookworm-uploads-{}", Uuid::new_v4()))
            .to_string_lossy()
            .into_owned()
    }

    #[tokio::test]
    async fn test_save_image_writes_file_with_extension() {
        let dir = scratch_dir();
        let path = save_image(b"png-bytes", "image/png", &dir).await.unwrap();

        assert!(path.starts_with("uploads/"));
        assert!(path.ends_with(".png"));

        let on_disk = std::path::Path::new(&dir).join(path.trim_start_matches("uploads/"));
        assert_eq!(std::fs::read(on_disk).unwrap(), b"png-bytes");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_save_image_rejects_unsupported_type() {
        let result = save_image(b"%PDF-1.4", "application/pdf", &scratch_dir()).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_save_image_rejects_oversized_payload() {
        let data = vec![0u8; MAX_IMAGE_BYTES + 1];
        let result = save_image(&data, "image/png", &scratch_dir()).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }
}
