// SPDX-License-Identifier: MIT

//! Racing handlers against the same pickup.
//!
//! The status check and write must be one compare-and-swap: exactly one
//! racer wins, the rest see `Conflict`, and completion effects are counted
//! exactly once.

use axum::http::StatusCode;
use recircuit::error::AppError;
use recircuit::models::{Badge, Category, PickupStatus, RoleProfile};
use recircuit::services::CREDITS_PER_PICKUP;
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::{
    authed, create_test_app, seed_citizen, seed_recycler, seed_user, submit_pickup, test_state,
};

const NUM_RACERS: usize = 8;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_accept_has_single_winner() {
    let state = test_state();
    seed_citizen(&state, "alice").await;
    for i in 0..NUM_RACERS {
        seed_recycler(&state, &format!("recycler-{}", i), true).await;
    }
    let pickup = submit_pickup(&state, "alice", Category::Laptop).await;

    let mut handles = vec![];
    for i in 0..NUM_RACERS {
        let state = state.clone();
        let pickup_id = pickup.id.clone();
        handles.push(tokio::spawn(async move {
            state
                .pickups
                .accept_pickup(&pickup_id, &format!("recycler-{}", i))
                .await
        }));
    }

    let mut winners = vec![];
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(accepted) => winners.push(accepted.recycler_id.unwrap()),
            Err(AppError::Conflict(_)) => conflicts += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(winners.len(), 1, "exactly one accept must win");
    assert_eq!(conflicts, NUM_RACERS - 1);

    let stored = state.db.get_pickup(&pickup.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PickupStatus::Accepted);
    assert_eq!(stored.recycler_id.as_ref(), Some(&winners[0]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_complete_counts_once() {
    let state = test_state();
    seed_citizen(&state, "alice").await;
    seed_recycler(&state, "rex", true).await;
    let pickup = submit_pickup(&state, "alice", Category::Laptop).await;
    state.pickups.accept_pickup(&pickup.id, "rex").await.unwrap();

    let mut handles = vec![];
    for _ in 0..NUM_RACERS {
        let state = state.clone();
        let pickup_id = pickup.id.clone();
        handles.push(tokio::spawn(async move {
            state.pickups.complete_pickup(&pickup_id, "rex").await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(AppError::Conflict(_)) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
    assert_eq!(successes, 1);

    let alice = state.db.get_user("alice").await.unwrap().unwrap();
    assert_eq!(alice.credits(), CREDITS_PER_PICKUP);
    let community = state.pickups.get_community_stats().await.unwrap();
    assert_eq!(community.completed_pickups, 1);
    assert_eq!(community.totals.co2_reduced_grams, 22_000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_completions_for_many_citizens() {
    let state = test_state();
    seed_recycler(&state, "rex", true).await;

    let mut pickup_ids = vec![];
    for i in 0..NUM_RACERS {
        let uid = format!("citizen-{}", i);
        seed_citizen(&state, &uid).await;
        let pickup = submit_pickup(&state, &uid, Category::Mobile).await;
        state.pickups.accept_pickup(&pickup.id, "rex").await.unwrap();
        pickup_ids.push(pickup.id);
    }

    let mut handles = vec![];
    for pickup_id in pickup_ids {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            state.pickups.complete_pickup(&pickup_id, "rex").await
        }));
    }
    for handle in handles {
        handle.await.unwrap().expect("completion should succeed");
    }

    // No lost community increments
    let community = state.pickups.get_community_stats().await.unwrap();
    assert_eq!(community.completed_pickups, NUM_RACERS as u64);
    assert_eq!(
        community.totals.co2_reduced_grams,
        NUM_RACERS as u64 * Category::Mobile.impact().co2_reduced_grams
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_profile_edits_keep_concurrent_awards() {
    const ROUNDS: usize = 40;
    let (app, state) = create_test_app();
    seed_citizen(&state, "alice").await;
    seed_recycler(&state, "rex", true).await;

    let mut pickup_ids = vec![];
    for _ in 0..ROUNDS {
        let pickup = submit_pickup(&state, "alice", Category::Mobile).await;
        state.pickups.accept_pickup(&pickup.id, "rex").await.unwrap();
        pickup_ids.push(pickup.id);
    }

    let mut completions = vec![];
    let mut edits = vec![];
    for (i, pickup_id) in pickup_ids.into_iter().enumerate() {
        let worker = state.clone();
        completions.push(tokio::spawn(async move {
            worker.pickups.complete_pickup(&pickup_id, "rex").await
        }));

        let request = authed(
            &state,
            "alice",
            "PUT",
            "/api/me",
            Some(json!({"name": format!("Alice {}", i)})),
        );
        let app = app.clone();
        edits.push(tokio::spawn(async move { app.oneshot(request).await }));
    }

    for handle in completions {
        handle.await.unwrap().expect("completion should succeed");
    }
    for handle in edits {
        assert_eq!(handle.await.unwrap().unwrap().status(), StatusCode::OK);
    }

    let alice = state.db.get_user("alice").await.unwrap().unwrap();
    let stats = state.pickups.get_citizen_stats("alice").await.unwrap();
    assert_eq!(stats.completed_pickups, ROUNDS as u32);
    assert_eq!(alice.credits(), ROUNDS as u32 * CREDITS_PER_PICKUP);
    assert!(alice.name.starts_with("Alice "));

    let recomputed = state.pickups.recompute_citizen_stats("alice").await.unwrap();
    let expected = Badge::newly_earned(&recomputed, alice.credits(), &[]);
    assert_eq!(alice.badges().len(), expected.len());
    for badge in expected {
        assert!(alice.badges().contains(&badge), "lost {:?}", badge);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_approval_survives_recycler_profile_edits() {
    let (app, state) = create_test_app();
    seed_user(&state, "root", RoleProfile::Admin).await;
    seed_recycler(&state, "rookie", false).await;

    let mut edits = vec![];
    for i in 0..NUM_RACERS {
        let request = authed(
            &state,
            "rookie",
            "PUT",
            "/api/me",
            Some(json!({"phone": format!("+4420790{:04}", i)})),
        );
        let app = app.clone();
        edits.push(tokio::spawn(async move { app.oneshot(request).await }));
    }
    let response = app
        .clone()
        .oneshot(authed(
            &state,
            "root",
            "PUT",
            "/api/admin/recyclers/rookie/approval",
            Some(json!({"approved": true})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    for handle in edits {
        assert_eq!(handle.await.unwrap().unwrap().status(), StatusCode::OK);
    }

    let rookie = state.db.get_user("rookie").await.unwrap().unwrap();
    assert_eq!(rookie.role, RoleProfile::Recycler { approved: true });
    assert!(rookie.phone.is_some());
}
