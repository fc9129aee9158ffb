// SPDX-License-Identifier: MIT

//! Re-Circuit: e-waste pickup coordination backend
//!
//! Citizens request pickups of electronic waste, approved recyclers and
//! contractors accept and complete them, and every completion credits the
//! citizen, advances their badges and grows the community impact totals.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::Db;
use services::{AiGateway, PhotoStore, PickupService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Db,
    pub pickups: PickupService,
    pub photos: PhotoStore,
    pub ai: AiGateway,
}

impl AppState {
    /// Wire services over an opened database.
    pub fn new(config: Config, db: Db) -> Self {
        Self {
            pickups: PickupService::new(db.clone()),
            photos: PhotoStore::new(db.clone(), config.max_photo_bytes),
            ai: AiGateway::new(config.gemini_api_key.clone(), config.gemini_model.clone()),
            config,
            db,
        }
    }
}
