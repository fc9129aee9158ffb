// SPDX-License-Identifier: MIT

//! Content-addressed photo store.
//!
//! Uploads arrive as `data:<mime>;base64,<payload>` URLs. The bytes are
//! size-checked, hashed with SHA-256 and stored under `photo_<hex>`, so the
//! same image uploaded twice yields the same reference.

use crate::db::Db;
use crate::error::{AppError, Result};
use crate::models::StoredPhoto;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};

const ALLOWED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];

/// Decoded upload.
#[derive(Debug, PartialEq)]
pub struct DataUrl {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Parse a base64 data URL.
pub fn parse_data_url(data_url: &str) -> Result<DataUrl> {
    let rest = data_url
        .strip_prefix("data:")
        .ok_or_else(|| AppError::Validation("Photo must be a data URL".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| AppError::Validation("Malformed data URL".to_string()))?;
    let mime_type = header
        .strip_suffix(";base64")
        .ok_or_else(|| AppError::Validation("Data URL must be base64-encoded".to_string()))?;

    if !ALLOWED_MIME_TYPES.contains(&mime_type) {
        return Err(AppError::Validation(format!(
            "Unsupported image type: {}",
            mime_type
        )));
    }

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| AppError::Validation(format!("Invalid base64 payload: {}", e)))?;
    if bytes.is_empty() {
        return Err(AppError::Validation("Photo is empty".to_string()));
    }

    Ok(DataUrl {
        mime_type: mime_type.to_string(),
        bytes,
    })
}

/// `photo_<sha256 hex>` for the given bytes.
pub fn photo_reference(bytes: &[u8]) -> String {
    format!("photo_{}", hex::encode(Sha256::digest(bytes)))
}

/// Photo upload and retrieval.
#[derive(Clone)]
pub struct PhotoStore {
    db: Db,
    max_bytes: usize,
}

impl PhotoStore {
    pub fn new(db: Db, max_bytes: usize) -> Self {
        Self { db, max_bytes }
    }

    /// Store an uploaded photo and return its reference.
    pub async fn upload(&self, uploader_uid: &str, data_url: &str) -> Result<String> {
        let decoded = parse_data_url(data_url)?;
        if decoded.bytes.len() > self.max_bytes {
            return Err(AppError::Validation(format!(
                "Photo is {} bytes; limit is {}",
                decoded.bytes.len(),
                self.max_bytes
            )));
        }

        let reference = photo_reference(&decoded.bytes);
        if self.db.get_photo(&reference).await?.is_some() {
            tracing::debug!(reference = %reference, "Photo already stored");
            return Ok(reference);
        }

        let photo = StoredPhoto {
            reference: reference.clone(),
            mime_type: decoded.mime_type,
            data_base64: STANDARD.encode(&decoded.bytes),
            size_bytes: decoded.bytes.len() as u64,
            uploaded_by: uploader_uid.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        self.db.put_photo(&photo).await?;

        tracing::info!(reference = %reference, size_bytes = photo.size_bytes, "Photo stored");
        Ok(reference)
    }

    pub async fn get(&self, reference: &str) -> Result<StoredPhoto> {
        self.db
            .get_photo(reference)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Photo {} not found", reference)))
    }

    /// Raw bytes and MIME type of a stored photo.
    pub async fn get_bytes(&self, reference: &str) -> Result<(String, Vec<u8>)> {
        let photo = self.get(reference).await?;
        let bytes = STANDARD
            .decode(&photo.data_base64)
            .map_err(|e| AppError::Database(format!("Corrupt photo {}: {}", reference, e)))?;
        Ok((photo.mime_type, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    fn png_url() -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(PNG_HEADER))
    }

    #[test]
    fn test_parse_data_url() {
        let decoded = parse_data_url(&png_url()).unwrap();
        assert_eq!(decoded.mime_type, "image/png");
        assert_eq!(decoded.bytes, PNG_HEADER);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        for bad in [
            "image/png;base64,AAAA",
            "data:image/png;base64",
            "data:image/png,AAAA",
            "data:text/plain;base64,AAAA",
            "data:image/png;base64,!!!",
            "data:image/png;base64,",
        ] {
            assert!(
                matches!(parse_data_url(bad), Err(AppError::Validation(_))),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_reference_is_content_addressed() {
        let a = photo_reference(b"one");
        assert_eq!(a, photo_reference(b"one"));
        assert_ne!(a, photo_reference(b"two"));
        assert!(a.starts_with("photo_"));
        assert_eq!(a.len(), "photo_".len() + 64);
    }

    #[tokio::test]
    async fn test_upload_and_get() {
        let store = PhotoStore::new(Db::in_memory(), 1024);
        let reference = store.upload("citizen-1", &png_url()).await.unwrap();

        let (mime, bytes) = store.get_bytes(&reference).await.unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, PNG_HEADER);

        let again = store.upload("citizen-2", &png_url()).await.unwrap();
        assert_eq!(again, reference);
        assert_eq!(store.get(&reference).await.unwrap().uploaded_by, "citizen-1");
    }

    #[tokio::test]
    async fn test_upload_size_limit() {
        let store = PhotoStore::new(Db::in_memory(), 4);
        let result = store.upload("citizen-1", &png_url()).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = PhotoStore::new(Db::in_memory(), 1024);
        assert!(matches!(
            store.get("photo_missing").await,
            Err(AppError::NotFound(_))
        ));
    }
}
