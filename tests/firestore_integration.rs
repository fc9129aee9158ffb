// SPDX-License-Identifier: MIT

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running
//! (FIRESTORE_EMULATOR_HOST set); they are skipped otherwise.

use recircuit::config::Config;
use recircuit::db::PickupFilter;
use recircuit::error::AppError;
use recircuit::models::{Category, PickupStatus, RoleProfile, UserProfile};
use recircuit::AppState;
use std::sync::Arc;

mod common;
use common::{new_pickup, test_db};

/// Unique suffix for test isolation on a shared emulator.
fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::now_v7())
}

async fn emulator_state() -> Arc<AppState> {
    Arc::new(AppState::new(Config::test_default(), test_db().await))
}

async fn seed(state: &AppState, uid: &str, role: RoleProfile) {
    let profile = UserProfile::new(uid.to_string(), uid.to_string(), None, role, chrono::Utc::now());
    state.db.create_user(&profile).await.unwrap();
}

#[tokio::test]
async fn test_profile_created_once() {
    require_emulator!();

    let state = emulator_state().await;
    let uid = unique("citizen");
    seed(&state, &uid, RoleProfile::initial(recircuit::models::Role::Citizen)).await;

    let again = UserProfile::new(
        uid.clone(),
        "Again".to_string(),
        None,
        RoleProfile::Contractor,
        chrono::Utc::now(),
    );
    assert!(matches!(
        state.db.create_user(&again).await,
        Err(AppError::AlreadyExists(_))
    ));

    let stored = state.db.get_user(&uid).await.unwrap().unwrap();
    assert!(stored.is_citizen());
}

#[tokio::test]
async fn test_full_lifecycle_on_firestore() {
    require_emulator!();

    let state = emulator_state().await;
    let citizen = unique("citizen");
    let recycler = unique("recycler");
    seed(
        &state,
        &citizen,
        RoleProfile::Citizen {
            credits: 0,
            badges: Vec::new(),
        },
    )
    .await;
    seed(&state, &recycler, RoleProfile::Recycler { approved: true }).await;

    let photo = state
        .photos
        .upload(&citizen, &common::photo_data_url(&citizen))
        .await
        .unwrap();
    let pickup = state
        .pickups
        .create_pickup(&citizen, new_pickup(Category::Laptop, &photo))
        .await
        .unwrap();

    let before = state.pickups.get_community_stats().await.unwrap();

    state.pickups.accept_pickup(&pickup.id, &recycler).await.unwrap();
    let outcome = state
        .pickups
        .complete_pickup(&pickup.id, &recycler)
        .await
        .unwrap();
    assert_eq!(outcome.pickup.status, PickupStatus::Completed);
    assert!(outcome.completion.unwrap().applied);

    let stored_citizen = state.db.get_user(&citizen).await.unwrap().unwrap();
    assert_eq!(stored_citizen.credits(), 50);
    assert_eq!(stored_citizen.badges().len(), 2);

    let stats = state.pickups.get_citizen_stats(&citizen).await.unwrap();
    assert_eq!(stats.completed_pickups, 1);
    assert!(stats.processed_pickup_ids.contains(&pickup.id));

    let after = state.pickups.get_community_stats().await.unwrap();
    assert_eq!(
        after.totals.co2_reduced_grams - before.totals.co2_reduced_grams,
        22_000
    );

    // Replays change nothing
    let replay = state.pickups.reconcile_completion(&pickup.id).await.unwrap();
    assert!(!replay.applied);
    let stored_citizen = state.db.get_user(&citizen).await.unwrap().unwrap();
    assert_eq!(stored_citizen.credits(), 50);

    let listed = state
        .db
        .list_pickups(&PickupFilter {
            citizen_id: Some(citizen.clone()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn test_concurrent_accept_on_firestore() {
    require_emulator!();

    let state = emulator_state().await;
    let citizen = unique("citizen");
    seed(&state, &citizen, RoleProfile::initial(recircuit::models::Role::Citizen)).await;
    let photo = state
        .photos
        .upload(&citizen, &common::photo_data_url(&citizen))
        .await
        .unwrap();
    let pickup = state
        .pickups
        .create_pickup(&citizen, new_pickup(Category::Mobile, &photo))
        .await
        .unwrap();

    let mut recyclers = vec![];
    for _ in 0..4 {
        let uid = unique("recycler");
        seed(&state, &uid, RoleProfile::Recycler { approved: true }).await;
        recyclers.push(uid);
    }

    let mut handles = vec![];
    for uid in recyclers {
        let state = state.clone();
        let pickup_id = pickup.id.clone();
        handles.push(tokio::spawn(async move {
            state.pickups.accept_pickup(&pickup_id, &uid).await
        }));
    }

    let mut wins = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => wins += 1,
            Err(AppError::Conflict(_)) => {}
            // Contention beyond the retry budget is reported, never double-applied
            Err(AppError::Database(_)) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
    assert_eq!(wins, 1);
}
