//! Database layer.
//!
//! `Db` is the single handle the rest of the crate uses. It is backed either
//! by Firestore (production, emulator) or by a process-local store (local
//! development and tests). Both backends implement the same transactional
//! guarantees for status transitions.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::AppError;
use crate::models::{
    CitizenStats, CommunityStats, PickupRequest, PickupStatus, Role, StoredPhoto, Transition,
    UserProfile,
};
use crate::services::aggregator::CompletionOutcome;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const PICKUPS: &str = "pickups";
    /// Citizen aggregates (keyed by uid)
    pub const CITIZEN_STATS: &str = "citizen_stats";
    /// Singleton aggregates
    pub const STATS: &str = "stats";
    pub const PHOTOS: &str = "photos";

    /// Document ID of the community totals inside `stats`.
    pub const COMMUNITY_DOC: &str = "community";
}

/// Result of a committed status transition.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub pickup: PickupRequest,
    /// Present when the transition completed the pickup
    pub completion: Option<CompletionOutcome>,
}

/// Equality filters for pickup listings. Empty filter lists everything.
#[derive(Debug, Clone, Default)]
pub struct PickupFilter {
    pub citizen_id: Option<String>,
    pub recycler_id: Option<String>,
    pub status: Option<PickupStatus>,
}

impl PickupFilter {
    pub fn matches(&self, pickup: &PickupRequest) -> bool {
        self.citizen_id
            .as_ref()
            .is_none_or(|id| *id == pickup.citizen_id)
            && self
                .recycler_id
                .as_ref()
                .is_none_or(|id| pickup.recycler_id.as_ref() == Some(id))
            && self.status.is_none_or(|s| s == pickup.status)
    }
}

#[derive(Clone)]
enum Backend {
    Firestore(FirestoreDb),
    Memory(MemoryDb),
}

/// Storage handle shared by all services.
#[derive(Clone)]
pub struct Db {
    backend: Backend,
}

macro_rules! dispatch {
    ($self:ident . $method:ident ( $($arg:expr),* )) => {
        match &$self.backend {
            Backend::Firestore(db) => db.$method($($arg),*).await,
            Backend::Memory(db) => db.$method($($arg),*).await,
        }
    };
}

impl Db {
    /// Connect to Firestore (or its emulator if FIRESTORE_EMULATOR_HOST is set).
    pub async fn firestore(project_id: &str) -> Result<Self, AppError> {
        Ok(Self {
            backend: Backend::Firestore(FirestoreDb::new(project_id).await?),
        })
    }

    /// Create an empty process-local store.
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(MemoryDb::new()),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            Backend::Firestore(_) => "firestore",
            Backend::Memory(_) => "memory",
        }
    }

    // ─── Users ───────────────────────────────────────────────────

    pub async fn get_user(&self, uid: &str) -> Result<Option<UserProfile>, AppError> {
        dispatch!(self.get_user(uid))
    }

    /// Create a profile; fails with `AlreadyExists` if one already exists.
    pub async fn create_user(&self, profile: &UserProfile) -> Result<(), AppError> {
        dispatch!(self.create_user(profile))
    }

    /// Atomically read-modify-write an existing profile.
    ///
    /// `edit` runs against the latest stored copy, so fields it leaves alone
    /// (credits and badges awarded by a concurrent completion) are never
    /// overwritten with stale values. It may run more than once under
    /// contention. Returns the stored result.
    pub async fn update_user<F>(&self, uid: &str, edit: F) -> Result<UserProfile, AppError>
    where
        F: Fn(&mut UserProfile) -> Result<(), AppError> + Send + Sync,
    {
        dispatch!(self.update_user(uid, &edit))
    }

    pub async fn list_users_by_role(&self, role: Role) -> Result<Vec<UserProfile>, AppError> {
        dispatch!(self.list_users_by_role(role))
    }

    // ─── Pickups ─────────────────────────────────────────────────

    pub async fn insert_pickup(&self, pickup: &PickupRequest) -> Result<(), AppError> {
        dispatch!(self.insert_pickup(pickup))
    }

    pub async fn get_pickup(&self, pickup_id: &str) -> Result<Option<PickupRequest>, AppError> {
        dispatch!(self.get_pickup(pickup_id))
    }

    /// List pickups matching `filter`, newest first.
    pub async fn list_pickups(&self, filter: &PickupFilter) -> Result<Vec<PickupRequest>, AppError> {
        let mut pickups = dispatch!(self.list_pickups(filter))?;
        pickups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pickups)
    }

    /// Atomically apply `transition` to a pickup on behalf of `caller_uid`.
    ///
    /// The status check and write are a compare-and-swap: of two racing
    /// callers, exactly one commits and the other gets `Conflict`. Completing
    /// a pickup applies its side effects in the same commit.
    pub async fn transition_pickup(
        &self,
        pickup_id: &str,
        caller_uid: &str,
        transition: Transition,
    ) -> Result<TransitionOutcome, AppError> {
        dispatch!(self.transition_pickup(pickup_id, caller_uid, transition))
    }

    /// Apply completion side effects for an already-completed pickup if they
    /// were never applied. Safe to call any number of times.
    pub async fn reconcile_completion(
        &self,
        pickup_id: &str,
    ) -> Result<CompletionOutcome, AppError> {
        dispatch!(self.reconcile_completion(pickup_id))
    }

    // ─── Stats ───────────────────────────────────────────────────

    pub async fn get_citizen_stats(&self, uid: &str) -> Result<Option<CitizenStats>, AppError> {
        dispatch!(self.get_citizen_stats(uid))
    }

    /// Community totals; zeroed if nothing has been completed yet.
    pub async fn get_community_stats(&self) -> Result<CommunityStats, AppError> {
        dispatch!(self.get_community_stats())
    }

    // ─── Photos ──────────────────────────────────────────────────

    pub async fn put_photo(&self, photo: &StoredPhoto) -> Result<(), AppError> {
        dispatch!(self.put_photo(photo))
    }

    pub async fn get_photo(&self, reference: &str) -> Result<Option<StoredPhoto>, AppError> {
        dispatch!(self.get_photo(reference))
    }
}
