// SPDX-License-Identifier: MIT

//! Process-local storage backend.
//!
//! Pickups, profiles and aggregates live behind one mutex so that a status
//! transition and its completion effects are a single atomic step, exactly
//! like a Firestore transaction. The lock is never held across an await.

use crate::db::{PickupFilter, TransitionOutcome};
use crate::error::AppError;
use crate::models::{
    CitizenStats, CommunityStats, PickupRequest, PickupStatus, Role, StoredPhoto, Transition,
    UserProfile,
};
use crate::services::aggregator::{apply_completion, CompletionOutcome};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct Tables {
    users: HashMap<String, UserProfile>,
    pickups: HashMap<String, PickupRequest>,
    citizen_stats: HashMap<String, CitizenStats>,
    community: CommunityStats,
}

impl Tables {
    /// Stage completion effects for `pickup` and write them if they apply.
    fn apply_completion(
        &mut self,
        pickup: &PickupRequest,
        now: &str,
    ) -> Result<CompletionOutcome, AppError> {
        let mut citizen = self
            .users
            .get(&pickup.citizen_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", pickup.citizen_id)))?;
        let mut stats = self
            .citizen_stats
            .get(&pickup.citizen_id)
            .cloned()
            .unwrap_or_default();
        let mut community = self.community.clone();

        let outcome = apply_completion(pickup, &mut citizen, &mut stats, &mut community, now);
        if outcome.applied {
            self.users.insert(citizen.uid.clone(), citizen);
            self.citizen_stats.insert(pickup.citizen_id.clone(), stats);
            self.community = community;
        }
        Ok(outcome)
    }
}

/// In-memory database.
#[derive(Clone, Default)]
pub struct MemoryDb {
    tables: Arc<Mutex<Tables>>,
    photos: Arc<DashMap<String, StoredPhoto>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, AppError> {
        self.tables
            .lock()
            .map_err(|_| AppError::Database("In-memory store lock poisoned".to_string()))
    }

    // ─── Users ───────────────────────────────────────────────────

    pub async fn get_user(&self, uid: &str) -> Result<Option<UserProfile>, AppError> {
        Ok(self.lock()?.users.get(uid).cloned())
    }

    pub async fn create_user(&self, profile: &UserProfile) -> Result<(), AppError> {
        let mut tables = self.lock()?;
        if tables.users.contains_key(&profile.uid) {
            return Err(AppError::AlreadyExists(format!(
                "Profile {} already exists",
                profile.uid
            )));
        }
        tables.users.insert(profile.uid.clone(), profile.clone());
        Ok(())
    }

    pub async fn update_user<F>(&self, uid: &str, edit: &F) -> Result<UserProfile, AppError>
    where
        F: Fn(&mut UserProfile) -> Result<(), AppError>,
    {
        let mut tables = self.lock()?;
        let mut profile = tables
            .users
            .get(uid)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", uid)))?;
        edit(&mut profile)?;
        tables.users.insert(profile.uid.clone(), profile.clone());
        Ok(profile)
    }

    pub async fn list_users_by_role(&self, role: Role) -> Result<Vec<UserProfile>, AppError> {
        Ok(self
            .lock()?
            .users
            .values()
            .filter(|u| u.role() == role)
            .cloned()
            .collect())
    }

    // ─── Pickups ─────────────────────────────────────────────────

    pub async fn insert_pickup(&self, pickup: &PickupRequest) -> Result<(), AppError> {
        let mut tables = self.lock()?;
        if tables.pickups.contains_key(&pickup.id) {
            return Err(AppError::AlreadyExists(format!(
                "Pickup {} already exists",
                pickup.id
            )));
        }
        tables.pickups.insert(pickup.id.clone(), pickup.clone());
        Ok(())
    }

    pub async fn get_pickup(&self, pickup_id: &str) -> Result<Option<PickupRequest>, AppError> {
        Ok(self.lock()?.pickups.get(pickup_id).cloned())
    }

    pub async fn list_pickups(&self, filter: &PickupFilter) -> Result<Vec<PickupRequest>, AppError> {
        Ok(self
            .lock()?
            .pickups
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }

    pub async fn transition_pickup(
        &self,
        pickup_id: &str,
        caller_uid: &str,
        transition: Transition,
    ) -> Result<TransitionOutcome, AppError> {
        let now = chrono::Utc::now();
        let now_str = now.to_rfc3339();
        let mut tables = self.lock()?;

        let current = tables
            .pickups
            .get(pickup_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Pickup {} not found", pickup_id)))?;
        let caller = tables
            .users
            .get(caller_uid)
            .cloned()
            .ok_or_else(|| AppError::Unauthorized(format!("No profile for {}", caller_uid)))?;

        let next = current.apply(transition, &caller, now)?;

        let completion = if next.status == PickupStatus::Completed {
            Some(tables.apply_completion(&next, &now_str)?)
        } else {
            None
        };

        tables.pickups.insert(next.id.clone(), next.clone());

        Ok(TransitionOutcome {
            pickup: next,
            completion,
        })
    }

    pub async fn reconcile_completion(
        &self,
        pickup_id: &str,
    ) -> Result<CompletionOutcome, AppError> {
        let now = chrono::Utc::now().to_rfc3339();
        let mut tables = self.lock()?;

        let pickup = tables
            .pickups
            .get(pickup_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Pickup {} not found", pickup_id)))?;
        if pickup.status != PickupStatus::Completed {
            return Err(AppError::Conflict(format!(
                "Pickup {} is {}, not completed",
                pickup_id, pickup.status
            )));
        }

        tables.apply_completion(&pickup, &now)
    }

    // ─── Stats ───────────────────────────────────────────────────

    pub async fn get_citizen_stats(&self, uid: &str) -> Result<Option<CitizenStats>, AppError> {
        Ok(self.lock()?.citizen_stats.get(uid).cloned())
    }

    pub async fn get_community_stats(&self) -> Result<CommunityStats, AppError> {
        Ok(self.lock()?.community.clone())
    }

    // ─── Photos ──────────────────────────────────────────────────

    pub async fn put_photo(&self, photo: &StoredPhoto) -> Result<(), AppError> {
        self.photos.insert(photo.reference.clone(), photo.clone());
        Ok(())
    }

    pub async fn get_photo(&self, reference: &str) -> Result<Option<StoredPhoto>, AppError> {
        Ok(self.photos.get(reference).map(|p| p.value().clone()))
    }
}
