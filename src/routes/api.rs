// SPDX-License-Identifier: MIT

//! API routes for profiles, stats and badges.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{
    Badge, BadgeInfo, Category, CommunityStats, ImpactKg, Role, RoleProfile, UserProfile,
};
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me).put(update_me))
        .route("/api/me/role", post(choose_role))
        .route("/api/me/stats", get(get_my_stats))
        .route("/api/stats/community", get(get_community_stats))
        .route("/api/badges", get(get_badges))
}

// ─── User Profile ────────────────────────────────────────────

/// Current user response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    pub uid: String,
    pub name: String,
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub photo_reference: Option<String>,
    pub role: Role,
    /// Citizens only
    pub credits: Option<u32>,
    /// Citizens only
    pub badges: Option<Vec<BadgeInfo>>,
    /// Recyclers only
    pub approved: Option<bool>,
}

impl From<UserProfile> for UserResponse {
    fn from(profile: UserProfile) -> Self {
        let (credits, badges, approved) = match &profile.role {
            RoleProfile::Citizen { credits, badges } => (
                Some(*credits),
                Some(badges.iter().copied().map(BadgeInfo::from).collect()),
                None,
            ),
            RoleProfile::Recycler { approved } => (None, None, Some(*approved)),
            RoleProfile::Admin | RoleProfile::Contractor => (None, None, None),
        };
        Self {
            role: profile.role(),
            uid: profile.uid,
            name: profile.name,
            username: profile.username,
            email: profile.email,
            phone: profile.phone,
            photo_reference: profile.photo_reference,
            credits,
            badges,
            approved,
        }
    }
}

/// Get current user profile.
///
/// 404 means the user has signed in but not chosen a role yet.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    let profile = state
        .db
        .get_user(&user.uid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.uid)))?;

    Ok(Json(profile.into()))
}

#[derive(Deserialize, Validate)]
struct ChooseRoleRequest {
    role: Role,
    #[validate(length(min = 1, max = 100))]
    name: String,
    #[validate(length(min = 3, max = 30))]
    username: Option<String>,
    #[validate(email)]
    email: Option<String>,
    photo_reference: Option<String>,
}

/// Create the caller's profile with their chosen role.
///
/// The role is fixed once chosen; Admin cannot be self-selected.
async fn choose_role(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<ChooseRoleRequest>,
) -> Result<Json<UserResponse>> {
    req.validate()?;
    if req.role == Role::Admin {
        return Err(AppError::Unauthorized(
            "Admin role cannot be self-assigned".to_string(),
        ));
    }

    let mut profile = UserProfile::new(
        user.uid.clone(),
        req.name.trim().to_string(),
        req.email,
        RoleProfile::initial(req.role),
        chrono::Utc::now(),
    );
    profile.username = req.username;
    profile.photo_reference = req.photo_reference;

    state.db.create_user(&profile).await?;
    tracing::info!(uid = %user.uid, role = %req.role, "Profile created");

    Ok(Json(profile.into()))
}

#[derive(Deserialize, Validate)]
struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100))]
    name: Option<String>,
    #[validate(length(min = 3, max = 30))]
    username: Option<String>,
    #[validate(length(min = 7, max = 20))]
    phone: Option<String>,
    photo_reference: Option<String>,
}

/// Edit non-role profile fields.
async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>> {
    req.validate()?;

    if let Some(reference) = &req.photo_reference {
        state.photos.get(reference).await.map_err(|_| {
            AppError::Validation(format!("Unknown photo reference: {}", reference))
        })?;
    }

    // Only the edited fields change; role fields keep their stored values
    let profile = state
        .db
        .update_user(&user.uid, |profile| {
            if let Some(name) = &req.name {
                profile.name = name.trim().to_string();
            }
            if req.username.is_some() {
                profile.username.clone_from(&req.username);
            }
            if req.phone.is_some() {
                profile.phone.clone_from(&req.phone);
            }
            if req.photo_reference.is_some() {
                profile.photo_reference.clone_from(&req.photo_reference);
            }
            Ok(())
        })
        .await?;

    Ok(Json(profile.into()))
}

// ─── Stats ───────────────────────────────────────────────────

/// Citizen dashboard numbers.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CitizenStatsResponse {
    pub completed_pickups: u32,
    pub category_counts: BTreeMap<Category, u32>,
    pub impact: ImpactKg,
    pub credits: u32,
    pub badges: Vec<BadgeInfo>,
    pub latest_badge: Option<BadgeInfo>,
}

async fn get_my_stats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<CitizenStatsResponse>> {
    let profile = state.pickups.caller_profile(&user.uid).await?;
    if !profile.is_citizen() {
        return Err(AppError::Unauthorized(format!(
            "{} has no citizen stats",
            profile.role()
        )));
    }

    let stats = state.pickups.get_citizen_stats(&user.uid).await?;

    Ok(Json(CitizenStatsResponse {
        completed_pickups: stats.completed_pickups,
        category_counts: stats.category_counts,
        impact: stats.impact.into(),
        credits: profile.credits(),
        badges: profile.badges().iter().copied().map(BadgeInfo::from).collect(),
        latest_badge: profile.latest_badge().map(BadgeInfo::from),
    }))
}

/// Platform-wide impact totals.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CommunityStatsResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub completed_pickups: u64,
    pub impact: ImpactKg,
    pub updated_at: String,
}

impl From<CommunityStats> for CommunityStatsResponse {
    fn from(stats: CommunityStats) -> Self {
        Self {
            completed_pickups: stats.completed_pickups,
            impact: stats.totals.into(),
            updated_at: stats.updated_at,
        }
    }
}

async fn get_community_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CommunityStatsResponse>> {
    let stats = state.pickups.get_community_stats().await?;
    Ok(Json(stats.into()))
}

async fn get_badges() -> Json<Vec<BadgeInfo>> {
    Json(Badge::ALL.iter().copied().map(BadgeInfo::from).collect())
}
