//! Stored pickup photo.

use serde::{Deserialize, Serialize};

/// Photo bytes stored content-addressed.
///
/// Stored at: `photos/{reference}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPhoto {
    /// `photo_<sha256 hex>` (also used as document ID)
    pub reference: String,
    /// MIME type from the upload's data URL
    pub mime_type: String,
    /// Base64-encoded image bytes
    pub data_base64: String,
    pub size_bytes: u64,
    /// UID of the uploader
    pub uploaded_by: String,
    /// Upload timestamp (ISO 8601)
    pub created_at: String,
}
