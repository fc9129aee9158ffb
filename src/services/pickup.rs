// SPDX-License-Identifier: MIT

//! Pickup workflow service.
//!
//! Handles:
//! 1. Pickup creation by citizens (validated input, known photo)
//! 2. Accept / reject / complete transitions (atomic, via `Db`)
//! 3. Role-scoped listings and the handler queue
//! 4. Citizen and community stats reads

use crate::db::{Db, PickupFilter, TransitionOutcome};
use crate::error::{AppError, Result};
use crate::models::{
    CitizenStats, CommunityStats, NewPickup, PickupRequest, PickupStatus, Transition, UserProfile,
};
use crate::services::aggregator::CompletionOutcome;
use crate::services::route;
use validator::Validate;

/// Pickup workflow operations.
#[derive(Clone)]
pub struct PickupService {
    db: Db,
}

impl PickupService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Load the caller's profile or fail with `Unauthorized` (no role chosen yet).
    pub async fn caller_profile(&self, uid: &str) -> Result<UserProfile> {
        self.db
            .get_user(uid)
            .await?
            .ok_or_else(|| AppError::Unauthorized(format!("No profile for {}", uid)))
    }

    /// Create a new `pending` pickup for a citizen.
    pub async fn create_pickup(&self, citizen_uid: &str, input: NewPickup) -> Result<PickupRequest> {
        input.validate()?;
        let category = input
            .category
            .ok_or_else(|| AppError::Validation("Category is required".to_string()))?;

        let citizen = self.caller_profile(citizen_uid).await?;
        if !citizen.is_citizen() {
            return Err(AppError::Unauthorized(format!(
                "{} cannot submit pickups",
                citizen.role()
            )));
        }

        if self.db.get_photo(&input.photo_reference).await?.is_none() {
            return Err(AppError::Validation(format!(
                "Unknown photo reference: {}",
                input.photo_reference
            )));
        }

        let id = uuid::Uuid::now_v7().to_string();
        let pickup = PickupRequest::new(id, &citizen, category, input, chrono::Utc::now());
        self.db.insert_pickup(&pickup).await?;

        tracing::info!(
            pickup_id = %pickup.id,
            citizen_id = %pickup.citizen_id,
            category = %pickup.category,
            "Pickup created"
        );
        Ok(pickup)
    }

    pub async fn accept_pickup(&self, pickup_id: &str, recycler_uid: &str) -> Result<PickupRequest> {
        self.transition(pickup_id, recycler_uid, Transition::Accept)
            .await
            .map(|outcome| outcome.pickup)
    }

    pub async fn reject_pickup(&self, pickup_id: &str, caller_uid: &str) -> Result<PickupRequest> {
        self.transition(pickup_id, caller_uid, Transition::Reject)
            .await
            .map(|outcome| outcome.pickup)
    }

    /// Complete an accepted pickup; credits, stats and badges update in the same commit.
    pub async fn complete_pickup(
        &self,
        pickup_id: &str,
        caller_uid: &str,
    ) -> Result<TransitionOutcome> {
        self.transition(pickup_id, caller_uid, Transition::Complete)
            .await
    }

    async fn transition(
        &self,
        pickup_id: &str,
        caller_uid: &str,
        transition: Transition,
    ) -> Result<TransitionOutcome> {
        let result = self
            .db
            .transition_pickup(pickup_id, caller_uid, transition)
            .await;

        match &result {
            Ok(outcome) => {
                tracing::info!(
                    pickup_id,
                    caller_uid,
                    transition = %transition,
                    status = %outcome.pickup.status,
                    "Pickup transitioned"
                );
                if let Some(completion) = &outcome.completion {
                    tracing::info!(
                        pickup_id,
                        citizen_id = %outcome.pickup.citizen_id,
                        applied = completion.applied,
                        credits_awarded = completion.credits_awarded,
                        new_badges = ?completion.new_badges,
                        "Completion aggregated"
                    );
                }
            }
            Err(e) => {
                tracing::debug!(pickup_id, caller_uid, transition = %transition, error = %e, "Transition refused");
            }
        }
        result
    }

    /// Re-apply completion effects for a completed pickup (no-op if already applied).
    pub async fn reconcile_completion(&self, pickup_id: &str) -> Result<CompletionOutcome> {
        let outcome = self.db.reconcile_completion(pickup_id).await?;
        tracing::info!(pickup_id, applied = outcome.applied, "Completion reconciled");
        Ok(outcome)
    }

    /// Get a pickup if `viewer` may see it.
    ///
    /// Pickups the viewer may not see are reported as not found.
    pub async fn get_pickup_for(&self, viewer: &UserProfile, pickup_id: &str) -> Result<PickupRequest> {
        self.db
            .get_pickup(pickup_id)
            .await?
            .filter(|p| p.is_visible_to(viewer))
            .ok_or_else(|| AppError::NotFound(format!("Pickup {} not found", pickup_id)))
    }

    /// Pickups owned by (citizen) or assigned to (handler) `viewer`, newest first.
    pub async fn list_for(
        &self,
        viewer: &UserProfile,
        status: Option<PickupStatus>,
    ) -> Result<Vec<PickupRequest>> {
        let filter = if viewer.is_citizen() {
            PickupFilter {
                citizen_id: Some(viewer.uid.clone()),
                status,
                ..Default::default()
            }
        } else if viewer.is_admin() {
            PickupFilter {
                status,
                ..Default::default()
            }
        } else {
            PickupFilter {
                recycler_id: Some(viewer.uid.clone()),
                status,
                ..Default::default()
            }
        };
        self.db.list_pickups(&filter).await
    }

    /// Pending pickups an entitled handler can take.
    ///
    /// Nearest first when `origin` is given, otherwise oldest first.
    pub async fn pending_queue(
        &self,
        handler: &UserProfile,
        origin: Option<geo::Point<f64>>,
    ) -> Result<Vec<PickupRequest>> {
        if !handler.can_handle_pickups() {
            return Err(AppError::Unauthorized(format!(
                "{} is not entitled to handle pickups",
                handler.uid
            )));
        }

        let mut pending = self
            .db
            .list_pickups(&PickupFilter {
                status: Some(PickupStatus::Pending),
                ..Default::default()
            })
            .await?;

        match origin {
            Some(origin) => pending.sort_by(|a, b| {
                route::distance_km(origin, a.location.point())
                    .total_cmp(&route::distance_km(origin, b.location.point()))
            }),
            None => pending.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        }
        Ok(pending)
    }

    /// Impact totals for a citizen (zeroed if nothing completed yet).
    pub async fn get_citizen_stats(&self, citizen_uid: &str) -> Result<CitizenStats> {
        Ok(self
            .db
            .get_citizen_stats(citizen_uid)
            .await?
            .unwrap_or_default())
    }

    pub async fn get_community_stats(&self) -> Result<CommunityStats> {
        self.db.get_community_stats().await
    }

    /// Recompute a citizen's totals from their completed pickups.
    pub async fn recompute_citizen_stats(&self, citizen_uid: &str) -> Result<CitizenStats> {
        let completed = self
            .db
            .list_pickups(&PickupFilter {
                citizen_id: Some(citizen_uid.to_string()),
                status: Some(PickupStatus::Completed),
                ..Default::default()
            })
            .await?;
        Ok(CitizenStats::from_pickups(
            &completed,
            &chrono::Utc::now().to_rfc3339(),
        ))
    }
}
