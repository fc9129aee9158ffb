// SPDX-License-Identifier: MIT

//! Data models for the application.

pub mod badge;
pub mod photo;
pub mod pickup;
pub mod stats;
pub mod user;

pub use badge::{Badge, BadgeInfo};
pub use photo::StoredPhoto;
pub use pickup::{
    Category, NewPickup, PickupLocation, PickupRequest, PickupStatus, Transition, TransitionError,
};
pub use stats::{CitizenStats, CommunityStats, ImpactKg, ImpactMetrics};
pub use user::{Role, RoleProfile, UserProfile};
