// SPDX-License-Identifier: MIT

//! Pickup lifecycle routes.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::{BadgeInfo, ImpactKg, NewPickup, PickupRequest, PickupStatus};
use crate::services::route;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/pickups", get(list_pickups).post(create_pickup))
        .route("/api/pickups/queue", get(pending_queue))
        .route("/api/pickups/{id}", get(get_pickup))
        .route("/api/pickups/{id}/accept", post(accept_pickup))
        .route("/api/pickups/{id}/reject", post(reject_pickup))
        .route("/api/pickups/{id}/complete", post(complete_pickup))
}

async fn create_pickup(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<NewPickup>,
) -> Result<(StatusCode, Json<PickupRequest>)> {
    let pickup = state.pickups.create_pickup(&user.uid, input).await?;
    Ok((StatusCode::CREATED, Json(pickup)))
}

#[derive(Deserialize)]
struct ListQuery {
    status: Option<PickupStatus>,
}

/// The caller's own (citizen) or assigned (handler) pickups.
async fn list_pickups(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<PickupRequest>>> {
    let viewer = state.pickups.caller_profile(&user.uid).await?;
    let pickups = state.pickups.list_for(&viewer, query.status).await?;
    Ok(Json(pickups))
}

#[derive(Deserialize)]
struct QueueQuery {
    lat: Option<f64>,
    lon: Option<f64>,
}

impl QueueQuery {
    fn origin(&self) -> Result<Option<geo::Point<f64>>> {
        route::origin(self.lat, self.lon)
    }
}

/// Pending pickups for an entitled handler.
async fn pending_queue(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<QueueQuery>,
) -> Result<Json<Vec<PickupRequest>>> {
    let origin = query.origin()?;
    let handler = state.pickups.caller_profile(&user.uid).await?;
    let pending = state.pickups.pending_queue(&handler, origin).await?;
    Ok(Json(pending))
}

async fn get_pickup(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<PickupRequest>> {
    let viewer = state.pickups.caller_profile(&user.uid).await?;
    let pickup = state.pickups.get_pickup_for(&viewer, &id).await?;
    Ok(Json(pickup))
}

async fn accept_pickup(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<PickupRequest>> {
    let pickup = state.pickups.accept_pickup(&id, &user.uid).await?;
    Ok(Json(pickup))
}

async fn reject_pickup(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<PickupRequest>> {
    let pickup = state.pickups.reject_pickup(&id, &user.uid).await?;
    Ok(Json(pickup))
}

/// Completed pickup together with what the citizen gained.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CompletePickupResponse {
    pub pickup: PickupRequest,
    pub credits_awarded: u32,
    pub new_badges: Vec<BadgeInfo>,
    pub impact: ImpactKg,
}

async fn complete_pickup(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<CompletePickupResponse>> {
    let outcome = state.pickups.complete_pickup(&id, &user.uid).await?;
    let completion = outcome.completion.unwrap_or_default();

    Ok(Json(CompletePickupResponse {
        pickup: outcome.pickup,
        credits_awarded: completion.credits_awarded,
        new_badges: completion
            .new_badges
            .into_iter()
            .map(BadgeInfo::from)
            .collect(),
        impact: completion.impact.into(),
    }))
}
