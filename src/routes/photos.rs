// SPDX-License-Identifier: MIT

//! Photo upload and download.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::AppState;
use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Request body cap: a base64 data URL of the largest allowed photo plus slack.
const UPLOAD_BODY_LIMIT: usize = 2 * 1024 * 1024;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/photos",
            post(upload_photo).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/photos/{reference}", get(get_photo))
}

#[derive(Deserialize)]
struct UploadRequest {
    /// `data:<mime>;base64,<payload>`
    data_url: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UploadResponse {
    pub reference: String,
}

async fn upload_photo(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<UploadRequest>,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let reference = state.photos.upload(&user.uid, &req.data_url).await?;
    Ok((StatusCode::CREATED, Json(UploadResponse { reference })))
}

async fn get_photo(
    State(state): State<Arc<AppState>>,
    Path(reference): Path<String>,
) -> Result<impl IntoResponse> {
    let (mime_type, bytes) = state.photos.get_bytes(&reference).await?;
    Ok((
        [
            (header::CONTENT_TYPE, mime_type),
            (
                header::CACHE_CONTROL,
                "private, max-age=31536000, immutable".to_string(),
            ),
        ],
        bytes,
    ))
}
