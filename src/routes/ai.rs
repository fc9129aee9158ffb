// SPDX-License-Identifier: MIT

//! AI-assisted text endpoints.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::PickupStatus;
use crate::services::ai::ImpactReportInput;
use crate::services::route::{self, order_stops, RouteStop};
use crate::AppState;
use axum::{extract::State, routing::post, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/ai/describe", post(describe_photo))
        .route("/api/ai/route", post(plan_route))
        .route("/api/ai/impact-report", post(impact_report))
}

#[derive(Deserialize)]
struct DescribeRequest {
    photo_reference: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DescribeResponse {
    pub description: String,
}

/// Suggest a pickup description from an uploaded photo.
async fn describe_photo(
    State(state): State<Arc<AppState>>,
    Extension(_user): Extension<AuthUser>,
    Json(req): Json<DescribeRequest>,
) -> Result<Json<DescribeResponse>> {
    let photo = state.photos.get(&req.photo_reference).await?;
    let description = state
        .ai
        .describe_photo(&photo.mime_type, &photo.data_base64)
        .await?;
    Ok(Json(DescribeResponse { description }))
}

#[derive(Deserialize, Default)]
struct RouteRequest {
    lat: Option<f64>,
    lon: Option<f64>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RouteResponse {
    pub stops: Vec<RouteStop>,
    pub route: String,
}

/// Order the caller's accepted pickups and ask the model for a travel plan.
async fn plan_route(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<RouteRequest>,
) -> Result<Json<RouteResponse>> {
    let origin = route::origin(req.lat, req.lon)?;
    let handler = state.pickups.caller_profile(&user.uid).await?;
    if !handler.can_handle_pickups() {
        return Err(AppError::Unauthorized(format!(
            "{} is not entitled to handle pickups",
            handler.uid
        )));
    }

    let accepted = state
        .pickups
        .list_for(&handler, Some(PickupStatus::Accepted))
        .await?;
    let stops = order_stops(origin, &accepted);

    let route = state.ai.plan_route(&stops).await?;
    Ok(Json(RouteResponse { stops, route }))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ImpactReportResponse {
    pub report: String,
}

/// Personalized impact summary for a citizen.
async fn impact_report(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ImpactReportResponse>> {
    let citizen = state.pickups.caller_profile(&user.uid).await?;
    if !citizen.is_citizen() {
        return Err(AppError::Unauthorized(format!(
            "{} has no impact report",
            citizen.role()
        )));
    }

    let stats = state.pickups.get_citizen_stats(&user.uid).await?;
    let contribution_summary = stats.contribution_summary().ok_or_else(|| {
        AppError::Validation("Complete a pickup to get an impact report".to_string())
    })?;
    let community = state.pickups.get_community_stats().await?;

    let report = state
        .ai
        .impact_report(&ImpactReportInput {
            contribution_summary,
            latest_badge: citizen.latest_badge().map(|b| b.name().to_string()),
            community_co2_kg: community.totals.co2_reduced_kg(),
        })
        .await?;
    Ok(Json(ImpactReportResponse { report }))
}
