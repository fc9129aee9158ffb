// SPDX-License-Identifier: MIT

use axum::body::Body;
use axum::http::{header, Request};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use recircuit::config::Config;
use recircuit::db::Db;
use recircuit::middleware::auth::create_session_token;
use recircuit::models::{Category, NewPickup, PickupLocation, RoleProfile, UserProfile};
use recircuit::routes::create_router;
use recircuit::AppState;
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection (Firestore emulator).
#[allow(dead_code)]
pub async fn test_db() -> Db {
    Db::firestore("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// State over an empty in-memory store.
#[allow(dead_code)]
pub fn test_state() -> Arc<AppState> {
    Arc::new(AppState::new(Config::test_default(), Db::in_memory()))
}

/// Create a test app over an empty in-memory store.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let state = test_state();
    (create_router(state.clone()), state)
}

/// Session token for `uid` signed with the test key.
#[allow(dead_code)]
pub fn token_for(state: &AppState, uid: &str) -> String {
    create_session_token(uid, &state.config.jwt_signing_key).unwrap()
}

/// Authenticated request with an optional JSON body.
#[allow(dead_code)]
pub fn authed(
    state: &AppState,
    uid: &str,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token_for(state, uid)));
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[allow(dead_code)]
pub async fn seed_user(state: &AppState, uid: &str, role: RoleProfile) -> UserProfile {
    let profile = UserProfile::new(
        uid.to_string(),
        format!("User {}", uid),
        Some(format!("{}@example.com", uid)),
        role,
        chrono::Utc::now(),
    );
    state.db.create_user(&profile).await.unwrap();
    profile
}

#[allow(dead_code)]
pub async fn seed_citizen(state: &AppState, uid: &str) -> UserProfile {
    seed_user(
        state,
        uid,
        RoleProfile::Citizen {
            credits: 0,
            badges: Vec::new(),
        },
    )
    .await
}

#[allow(dead_code)]
pub async fn seed_recycler(state: &AppState, uid: &str, approved: bool) -> UserProfile {
    seed_user(state, uid, RoleProfile::Recycler { approved }).await
}

/// Small PNG-looking upload as a data URL.
#[allow(dead_code)]
pub fn photo_data_url(seed: &str) -> String {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
    bytes.extend_from_slice(seed.as_bytes());
    format!("data:image/png;base64,{}", STANDARD.encode(bytes))
}

/// Store a photo and return its reference.
#[allow(dead_code)]
pub async fn seed_photo(state: &AppState, uid: &str) -> String {
    state
        .photos
        .upload(uid, &photo_data_url(uid))
        .await
        .unwrap()
}

#[allow(dead_code)]
pub fn new_pickup(category: Category, photo_reference: &str) -> NewPickup {
    NewPickup {
        category: Some(category),
        description: format!("Old {} that no longer works", category),
        location: PickupLocation {
            display_address: "221B Baker Street, London".to_string(),
            lat: 51.5238,
            lon: -0.1586,
        },
        photo_reference: photo_reference.to_string(),
    }
}

/// Create a pending pickup for `citizen_uid` (uploads a photo first).
#[allow(dead_code)]
pub async fn submit_pickup(
    state: &AppState,
    citizen_uid: &str,
    category: Category,
) -> recircuit::models::PickupRequest {
    let photo = seed_photo(state, citizen_uid).await;
    state
        .pickups
        .create_pickup(citizen_uid, new_pickup(category, &photo))
        .await
        .unwrap()
}

/// Submit, accept and complete one pickup.
#[allow(dead_code)]
pub async fn complete_one(
    state: &AppState,
    citizen_uid: &str,
    recycler_uid: &str,
    category: Category,
) -> recircuit::db::TransitionOutcome {
    let pickup = submit_pickup(state, citizen_uid, category).await;
    state
        .pickups
        .accept_pickup(&pickup.id, recycler_uid)
        .await
        .unwrap();
    state
        .pickups
        .complete_pickup(&pickup.id, recycler_uid)
        .await
        .unwrap()
}
