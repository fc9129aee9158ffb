// SPDX-License-Identifier: MIT

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profiles and role-specific fields)
//! - Pickups (requests and their status)
//! - Citizen stats and the community singleton
//! - Photos (content-addressed image bytes)
//!
//! Status transitions read the pickup through the transaction's consistency
//! selector, so Firestore detects a concurrent writer and the loser either
//! re-reads the new status or fails to commit and is retried.

use crate::db::{collections, PickupFilter, TransitionOutcome};
use crate::error::AppError;
use crate::models::{
    CitizenStats, CommunityStats, PickupRequest, PickupStatus, Role, StoredPhoto, Transition,
    UserProfile,
};
use crate::services::aggregator::{apply_completion, CompletionOutcome};
use firestore::{FirestoreConsistencySelector, FirestoreTransaction};
use serde::{de::DeserializeOwned, Serialize};

/// Attempts before giving up on a contended transaction.
const MAX_TRANSACTION_ATTEMPTS: u32 = 5;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create an offline client. All operations return a database error.
    pub fn new_offline() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Generic Helpers ─────────────────────────────────────────

    async fn read_doc<T>(
        db: &firestore::FirestoreDb,
        collection: &str,
        id: &str,
    ) -> Result<Option<T>, AppError>
    where
        T: DeserializeOwned + Send,
    {
        db.fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn write_doc<T>(&self, collection: &str, id: &str, obj: &T) -> Result<(), AppError>
    where
        T: Serialize + DeserializeOwned + Sync + Send,
    {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collection)
            .document_id(id)
            .object(obj)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    fn stage_write<T>(
        db: &firestore::FirestoreDb,
        transaction: &mut FirestoreTransaction<'_>,
        collection: &str,
        id: &str,
        obj: &T,
    ) -> Result<(), AppError>
    where
        T: Serialize + DeserializeOwned + Sync + Send,
    {
        db.fluent()
            .update()
            .in_col(collection)
            .document_id(id)
            .object(obj)
            .add_to_transaction(transaction)
            .map_err(|e| {
                AppError::Database(format!(
                    "Failed to add {} write to transaction: {}",
                    collection, e
                ))
            })?;
        Ok(())
    }

    /// Client whose reads go through `transaction` (and are conflict-checked).
    fn transactional(
        client: &firestore::FirestoreDb,
        transaction: &FirestoreTransaction<'_>,
    ) -> firestore::FirestoreDb {
        client.clone_with_consistency_selector(FirestoreConsistencySelector::Transaction(
            transaction.transaction_id().clone(),
        ))
    }

    // ─── User Operations ─────────────────────────────────────────

    pub async fn get_user(&self, uid: &str) -> Result<Option<UserProfile>, AppError> {
        Self::read_doc(self.get_client()?, collections::USERS, uid).await
    }

    /// Create a profile inside a transaction so two sign-ins cannot both create it.
    pub async fn create_user(&self, profile: &UserProfile) -> Result<(), AppError> {
        let client = self.get_client()?;
        let mut last_error = String::new();

        for attempt in 1..=MAX_TRANSACTION_ATTEMPTS {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;
            let tx_db = Self::transactional(client, &transaction);

            let existing: Option<UserProfile> =
                match Self::read_doc(&tx_db, collections::USERS, &profile.uid).await {
                    Ok(existing) => existing,
                    Err(e) => {
                        let _ = transaction.rollback().await;
                        return Err(e);
                    }
                };
            if existing.is_some() {
                let _ = transaction.rollback().await;
                return Err(AppError::AlreadyExists(format!(
                    "Profile {} already exists",
                    profile.uid
                )));
            }
            Self::stage_write(
                &tx_db,
                &mut transaction,
                collections::USERS,
                &profile.uid,
                profile,
            )?;

            match transaction.commit().await {
                Ok(_) => return Ok(()),
                Err(e) => {
                    tracing::debug!(attempt, error = %e, "create_user commit failed, retrying");
                    last_error = e.to_string();
                }
            }
        }

        Err(AppError::Database(format!(
            "create_user failed after {} attempts: {}",
            MAX_TRANSACTION_ATTEMPTS, last_error
        )))
    }

    /// Edit a profile inside a transaction; a concurrent completion forces a
    /// retry against its committed credits and badges.
    pub async fn update_user<F>(&self, uid: &str, edit: &F) -> Result<UserProfile, AppError>
    where
        F: Fn(&mut UserProfile) -> Result<(), AppError> + Send + Sync,
    {
        let client = self.get_client()?;
        let mut last_error = String::new();

        for attempt in 1..=MAX_TRANSACTION_ATTEMPTS {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;
            let tx_db = Self::transactional(client, &transaction);

            let staged = stage_profile_edit(&tx_db, &mut transaction, uid, edit).await;
            let profile = match staged {
                Ok(profile) => profile,
                Err(e) => {
                    let _ = transaction.rollback().await;
                    return Err(e);
                }
            };

            match transaction.commit().await {
                Ok(_) => return Ok(profile),
                Err(e) => {
                    tracing::debug!(uid, attempt, error = %e, "update_user commit failed, retrying");
                    last_error = e.to_string();
                }
            }
        }

        Err(AppError::Database(format!(
            "update_user of {} failed after {} attempts: {}",
            uid, MAX_TRANSACTION_ATTEMPTS, last_error
        )))
    }

    pub async fn list_users_by_role(&self, role: Role) -> Result<Vec<UserProfile>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| q.for_all([q.field("role").eq(role.as_str())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Pickup Operations ───────────────────────────────────────

    pub async fn insert_pickup(&self, pickup: &PickupRequest) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::PICKUPS)
            .document_id(&pickup.id)
            .object(pickup)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn get_pickup(&self, pickup_id: &str) -> Result<Option<PickupRequest>, AppError> {
        Self::read_doc(self.get_client()?, collections::PICKUPS, pickup_id).await
    }

    pub async fn list_pickups(&self, filter: &PickupFilter) -> Result<Vec<PickupRequest>, AppError> {
        let query = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::PICKUPS);

        let citizen_id = filter.citizen_id.clone();
        let recycler_id = filter.recycler_id.clone();
        let status = filter.status;

        let query = if citizen_id.is_none() && recycler_id.is_none() && status.is_none() {
            query
        } else {
            query.filter(move |q| {
                q.for_all([
                    citizen_id
                        .clone()
                        .and_then(|id| q.field("citizen_id").eq(id)),
                    recycler_id
                        .clone()
                        .and_then(|id| q.field("recycler_id").eq(id)),
                    status.and_then(|s| q.field("status").eq(s.as_str())),
                ])
            })
        };

        query
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn transition_pickup(
        &self,
        pickup_id: &str,
        caller_uid: &str,
        transition: Transition,
    ) -> Result<TransitionOutcome, AppError> {
        let client = self.get_client()?;
        let mut last_error = String::new();

        for attempt in 1..=MAX_TRANSACTION_ATTEMPTS {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;
            let tx_db = Self::transactional(client, &transaction);

            let staged =
                stage_transition(&tx_db, &mut transaction, pickup_id, caller_uid, transition)
                    .await;
            let outcome = match staged {
                Ok(outcome) => outcome,
                Err(e) => {
                    let _ = transaction.rollback().await;
                    return Err(e);
                }
            };

            // A losing racer fails here and re-reads the winner's status next attempt.
            match transaction.commit().await {
                Ok(_) => {
                    tracing::info!(
                        pickup_id,
                        caller_uid,
                        status = %outcome.pickup.status,
                        attempt,
                        "Pickup transition committed"
                    );
                    return Ok(outcome);
                }
                Err(e) => {
                    tracing::debug!(pickup_id, attempt, error = %e, "Transition commit failed, retrying");
                    last_error = e.to_string();
                }
            }
        }

        Err(AppError::Database(format!(
            "Transition of {} failed after {} attempts: {}",
            pickup_id, MAX_TRANSACTION_ATTEMPTS, last_error
        )))
    }

    pub async fn reconcile_completion(
        &self,
        pickup_id: &str,
    ) -> Result<CompletionOutcome, AppError> {
        let client = self.get_client()?;
        let mut last_error = String::new();

        for attempt in 1..=MAX_TRANSACTION_ATTEMPTS {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;
            let tx_db = Self::transactional(client, &transaction);

            let staged = stage_reconcile(&tx_db, &mut transaction, pickup_id).await;
            let outcome = match staged {
                Ok(outcome) => outcome,
                Err(e) => {
                    let _ = transaction.rollback().await;
                    return Err(e);
                }
            };

            if !outcome.applied {
                let _ = transaction.rollback().await;
                return Ok(outcome);
            }

            match transaction.commit().await {
                Ok(_) => {
                    tracing::info!(pickup_id, "Completion effects reconciled");
                    return Ok(outcome);
                }
                Err(e) => {
                    tracing::debug!(pickup_id, attempt, error = %e, "Reconcile commit failed, retrying");
                    last_error = e.to_string();
                }
            }
        }

        Err(AppError::Database(format!(
            "Reconcile of {} failed after {} attempts: {}",
            pickup_id, MAX_TRANSACTION_ATTEMPTS, last_error
        )))
    }

    // ─── Stats Operations ────────────────────────────────────────

    pub async fn get_citizen_stats(&self, uid: &str) -> Result<Option<CitizenStats>, AppError> {
        Self::read_doc(self.get_client()?, collections::CITIZEN_STATS, uid).await
    }

    pub async fn get_community_stats(&self) -> Result<CommunityStats, AppError> {
        let stats: Option<CommunityStats> = Self::read_doc(
            self.get_client()?,
            collections::STATS,
            collections::COMMUNITY_DOC,
        )
        .await?;
        Ok(stats.unwrap_or_default())
    }

    // ─── Photo Operations ────────────────────────────────────────

    pub async fn put_photo(&self, photo: &StoredPhoto) -> Result<(), AppError> {
        self.write_doc(collections::PHOTOS, &photo.reference, photo)
            .await
    }

    pub async fn get_photo(&self, reference: &str) -> Result<Option<StoredPhoto>, AppError> {
        Self::read_doc(self.get_client()?, collections::PHOTOS, reference).await
    }
}

// ─── Transaction Bodies ──────────────────────────────────────────

/// Read pickup and caller, decide the transition, stage all writes.
async fn stage_transition(
    db: &firestore::FirestoreDb,
    transaction: &mut FirestoreTransaction<'_>,
    pickup_id: &str,
    caller_uid: &str,
    transition: Transition,
) -> Result<TransitionOutcome, AppError> {
    let now = chrono::Utc::now();

    let current: PickupRequest = FirestoreDb::read_doc(db, collections::PICKUPS, pickup_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Pickup {} not found", pickup_id)))?;
    let caller: UserProfile = FirestoreDb::read_doc(db, collections::USERS, caller_uid)
        .await?
        .ok_or_else(|| AppError::Unauthorized(format!("No profile for {}", caller_uid)))?;

    // Compare-and-swap: decided against the transactional read of the pickup.
    let next = current.apply(transition, &caller, now)?;

    let completion = if next.status == PickupStatus::Completed {
        Some(stage_completion(db, transaction, &next, &now.to_rfc3339()).await?)
    } else {
        None
    };

    FirestoreDb::stage_write(db, transaction, collections::PICKUPS, &next.id, &next)?;

    Ok(TransitionOutcome {
        pickup: next,
        completion,
    })
}

async fn stage_reconcile(
    db: &firestore::FirestoreDb,
    transaction: &mut FirestoreTransaction<'_>,
    pickup_id: &str,
) -> Result<CompletionOutcome, AppError> {
    let pickup: PickupRequest = FirestoreDb::read_doc(db, collections::PICKUPS, pickup_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Pickup {} not found", pickup_id)))?;
    if pickup.status != PickupStatus::Completed {
        return Err(AppError::Conflict(format!(
            "Pickup {} is {}, not completed",
            pickup_id, pickup.status
        )));
    }

    let now = chrono::Utc::now().to_rfc3339();
    stage_completion(db, transaction, &pickup, &now).await
}

async fn stage_profile_edit<F>(
    db: &firestore::FirestoreDb,
    transaction: &mut FirestoreTransaction<'_>,
    uid: &str,
    edit: &F,
) -> Result<UserProfile, AppError>
where
    F: Fn(&mut UserProfile) -> Result<(), AppError>,
{
    let mut profile: UserProfile = FirestoreDb::read_doc(db, collections::USERS, uid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", uid)))?;
    edit(&mut profile)?;
    FirestoreDb::stage_write(db, transaction, collections::USERS, uid, &profile)?;
    Ok(profile)
}

/// Read the citizen-side aggregates and stage their updated versions.
async fn stage_completion(
    db: &firestore::FirestoreDb,
    transaction: &mut FirestoreTransaction<'_>,
    pickup: &PickupRequest,
    now: &str,
) -> Result<CompletionOutcome, AppError> {
    let citizen_id = pickup.citizen_id.as_str();

    let mut citizen: UserProfile = FirestoreDb::read_doc(db, collections::USERS, citizen_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", citizen_id)))?;
    let mut stats: CitizenStats = FirestoreDb::read_doc(db, collections::CITIZEN_STATS, citizen_id)
        .await?
        .unwrap_or_default();
    let mut community: CommunityStats =
        FirestoreDb::read_doc(db, collections::STATS, collections::COMMUNITY_DOC)
            .await?
            .unwrap_or_default();

    let outcome = apply_completion(pickup, &mut citizen, &mut stats, &mut community, now);
    if !outcome.applied {
        return Ok(outcome);
    }

    FirestoreDb::stage_write(db, transaction, collections::USERS, citizen_id, &citizen)?;
    FirestoreDb::stage_write(
        db,
        transaction,
        collections::CITIZEN_STATS,
        citizen_id,
        &stats,
    )?;
    FirestoreDb::stage_write(
        db,
        transaction,
        collections::STATS,
        collections::COMMUNITY_DOC,
        &community,
    )?;

    tracing::info!(
        pickup_id = %pickup.id,
        citizen_id,
        credits_awarded = outcome.credits_awarded,
        "Completion effects staged"
    );
    Ok(outcome)
}
