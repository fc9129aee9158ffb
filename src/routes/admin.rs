// SPDX-License-Identifier: MIT

//! Admin-only routes: recycler approval, leaderboard, overview, reconcile.

use crate::db::PickupFilter;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{PickupStatus, Role, RoleProfile, UserProfile};
use crate::routes::api::{CommunityStatsResponse, UserResponse};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

const DEFAULT_LEADERBOARD_LIMIT: usize = 10;
const MAX_LEADERBOARD_LIMIT: usize = 100;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/admin/recyclers", get(list_recyclers))
        .route("/api/admin/recyclers/{uid}/approval", put(set_approval))
        .route("/api/admin/leaderboard", get(leaderboard))
        .route("/api/admin/overview", get(overview))
        .route("/api/admin/pickups/{id}/reconcile", post(reconcile))
}

/// Load the caller's profile and require the Admin role.
async fn require_admin(state: &AppState, user: &AuthUser) -> Result<UserProfile> {
    let profile = state.pickups.caller_profile(&user.uid).await?;
    if !profile.is_admin() {
        return Err(AppError::Unauthorized(format!(
            "{} is not an admin",
            user.uid
        )));
    }
    Ok(profile)
}

async fn list_recyclers(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<UserResponse>>> {
    require_admin(&state, &user).await?;

    let mut recyclers = state.db.list_users_by_role(Role::Recycler).await?;
    recyclers.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Ok(Json(recyclers.into_iter().map(UserResponse::from).collect()))
}

#[derive(Deserialize)]
struct ApprovalRequest {
    approved: bool,
}

async fn set_approval(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(uid): Path<String>,
    Json(req): Json<ApprovalRequest>,
) -> Result<Json<UserResponse>> {
    require_admin(&state, &user).await?;

    let profile = state
        .db
        .update_user(&uid, |profile| match &mut profile.role {
            RoleProfile::Recycler { approved } => {
                *approved = req.approved;
                Ok(())
            }
            other => Err(AppError::Validation(format!(
                "{} is a {}, not a Recycler",
                uid,
                other.role()
            ))),
        })
        .await?;

    tracing::info!(admin = %user.uid, recycler_id = %uid, approved = req.approved, "Recycler approval changed");

    Ok(Json(profile.into()))
}

#[derive(Deserialize)]
struct LeaderboardQuery {
    limit: Option<usize>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub uid: String,
    pub name: String,
    pub credits: u32,
    pub badge_count: usize,
}

/// Top citizens by credits; ties broken by name.
async fn leaderboard(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>> {
    require_admin(&state, &user).await?;

    let limit = query
        .limit
        .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
        .clamp(1, MAX_LEADERBOARD_LIMIT);

    let mut citizens = state.db.list_users_by_role(Role::Citizen).await?;
    citizens.sort_by(|a, b| b.credits().cmp(&a.credits()).then_with(|| a.name.cmp(&b.name)));

    Ok(Json(
        citizens
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(i, c)| LeaderboardEntry {
                rank: i + 1,
                credits: c.credits(),
                badge_count: c.badges().len(),
                uid: c.uid,
                name: c.name,
            })
            .collect(),
    ))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct OverviewResponse {
    pub pickups_by_status: BTreeMap<String, usize>,
    pub users_by_role: BTreeMap<String, usize>,
    pub pending_recycler_approvals: usize,
    pub community: CommunityStatsResponse,
}

async fn overview(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<OverviewResponse>> {
    require_admin(&state, &user).await?;

    let pickups = state.db.list_pickups(&PickupFilter::default()).await?;
    let mut pickups_by_status: BTreeMap<String, usize> = PickupStatus::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();
    for pickup in &pickups {
        *pickups_by_status
            .entry(pickup.status.as_str().to_string())
            .or_insert(0) += 1;
    }

    let mut users_by_role = BTreeMap::new();
    let mut pending_recycler_approvals = 0;
    for role in Role::ALL {
        let users = state.db.list_users_by_role(role).await?;
        if role == Role::Recycler {
            pending_recycler_approvals = users
                .iter()
                .filter(|u| matches!(u.role, RoleProfile::Recycler { approved: false }))
                .count();
        }
        users_by_role.insert(role.as_str().to_string(), users.len());
    }

    let community = state.pickups.get_community_stats().await?;

    Ok(Json(OverviewResponse {
        pickups_by_status,
        users_by_role,
        pending_recycler_approvals,
        community: community.into(),
    }))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ReconcileResponse {
    pub applied: bool,
    pub credits_awarded: u32,
}

/// Apply completion effects that never landed (no-op if they did).
async fn reconcile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<ReconcileResponse>> {
    require_admin(&state, &user).await?;

    let outcome = state.pickups.reconcile_completion(&id).await?;
    Ok(Json(ReconcileResponse {
        applied: outcome.applied,
        credits_awarded: outcome.credits_awarded,
    }))
}
