// SPDX-License-Identifier: MIT

//! Pickup request model and its status state machine.
//!
//! A pickup moves along exactly these paths:
//!
//! ```text
//! pending ──accept──▶ accepted ──complete──▶ completed
//!    │
//!    └────reject────▶ rejected
//! ```
//!
//! `completed` and `rejected` are terminal. Nothing ever returns to `pending`.

use crate::models::stats::ImpactMetrics;
use crate::models::user::UserProfile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// E-waste item category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum Category {
    Laptop,
    Mobile,
    Battery,
    Appliance,
    Other,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Laptop,
        Category::Mobile,
        Category::Battery,
        Category::Appliance,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Laptop => "Laptop",
            Category::Mobile => "Mobile",
            Category::Battery => "Battery",
            Category::Appliance => "Appliance",
            Category::Other => "Other",
        }
    }

    /// Environmental impact of recycling one item of this category.
    ///
    /// Stored in grams so that community totals are exact integer sums.
    pub fn impact(&self) -> ImpactMetrics {
        let (co2, materials, landfill) = match self {
            Category::Laptop => (22_000, 1_500, 2_500),
            Category::Mobile => (5_000, 200, 300),
            Category::Battery => (1_000, 100, 150),
            Category::Appliance => (8_000, 500, 1_000),
            Category::Other => (8_000, 500, 1_000),
        };
        ImpactMetrics {
            co2_reduced_grams: co2,
            materials_recovered_grams: materials,
            waste_diverted_grams: landfill,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pickup lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum PickupStatus {
    Pending,
    Accepted,
    Completed,
    Rejected,
}

impl PickupStatus {
    pub const ALL: [PickupStatus; 4] = [
        PickupStatus::Pending,
        PickupStatus::Accepted,
        PickupStatus::Completed,
        PickupStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PickupStatus::Pending => "pending",
            PickupStatus::Accepted => "accepted",
            PickupStatus::Completed => "completed",
            PickupStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PickupStatus::Completed | PickupStatus::Rejected)
    }

    /// Whether a pickup in this status must carry an assigned handler.
    pub fn requires_handler(&self) -> bool {
        matches!(self, PickupStatus::Accepted | PickupStatus::Completed)
    }
}

impl fmt::Display for PickupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the item should be collected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PickupLocation {
    #[validate(length(min = 5, message = "Address is required."))]
    pub display_address: String,
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude out of range."))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0, message = "Longitude out of range."))]
    pub lon: f64,
}

impl PickupLocation {
    pub fn point(&self) -> geo::Point<f64> {
        geo::Point::new(self.lon, self.lat)
    }
}

/// Stored pickup record in Firestore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PickupRequest {
    /// Pickup ID (also used as document ID)
    pub id: String,
    /// Owning citizen
    pub citizen_id: String,
    /// Citizen display name at submission time
    pub citizen_name: String,
    /// Recycler or contractor handling the pickup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recycler_id: Option<String>,
    pub category: Category,
    pub description: String,
    pub location: PickupLocation,
    /// Reference returned by the photo store
    pub photo_reference: String,
    pub status: PickupStatus,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Citizen input for a new pickup.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewPickup {
    #[validate(required(message = "Category is required"))]
    pub category: Option<Category>,
    #[validate(length(min = 10, message = "Please provide a more detailed description."))]
    pub description: String,
    #[validate(nested)]
    pub location: PickupLocation,
    #[validate(length(min = 1, message = "An image is required."))]
    pub photo_reference: String,
}

/// A requested status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Accept,
    Reject,
    Complete,
}

impl Transition {
    pub fn target(&self) -> PickupStatus {
        match self {
            Transition::Accept => PickupStatus::Accepted,
            Transition::Reject => PickupStatus::Rejected,
            Transition::Complete => PickupStatus::Completed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Accept => "accept",
            Transition::Reject => "reject",
            Transition::Complete => "complete",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a transition was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("not permitted to {0} this pickup")]
    Unauthorized(Transition),

    #[error("cannot {transition} a pickup that is {current}")]
    Conflict {
        current: PickupStatus,
        transition: Transition,
    },
}

impl PickupRequest {
    /// Build a new `pending` pickup from validated citizen input.
    pub fn new(
        id: String,
        citizen: &UserProfile,
        category: Category,
        input: NewPickup,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            citizen_id: citizen.uid.clone(),
            citizen_name: citizen.name.clone(),
            recycler_id: None,
            category,
            description: input.description.trim().to_string(),
            location: input.location,
            photo_reference: input.photo_reference,
            status: PickupStatus::Pending,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Compute the record that results from `caller` applying `transition`.
    ///
    /// Accept and reject need an entitled handler and a `pending` record.
    /// Complete needs an `accepted` record and the caller to be its assignee.
    pub fn apply(
        &self,
        transition: Transition,
        caller: &UserProfile,
        now: DateTime<Utc>,
    ) -> Result<PickupRequest, TransitionError> {
        let conflict = || TransitionError::Conflict {
            current: self.status,
            transition,
        };

        let mut next = self.clone();
        match transition {
            Transition::Accept | Transition::Reject => {
                if !caller.can_handle_pickups() {
                    return Err(TransitionError::Unauthorized(transition));
                }
                if self.status != PickupStatus::Pending {
                    return Err(conflict());
                }
                if transition == Transition::Accept {
                    next.recycler_id = Some(caller.uid.clone());
                }
            }
            Transition::Complete => {
                if self.status != PickupStatus::Accepted {
                    return Err(conflict());
                }
                if self.recycler_id.as_deref() != Some(caller.uid.as_str()) {
                    return Err(TransitionError::Unauthorized(transition));
                }
                next.completed_at = Some(now);
            }
        }

        next.status = transition.target();
        next.updated_at = now;
        debug_assert!(next.has_consistent_assignment());
        Ok(next)
    }

    /// `recycler_id` is set exactly when the status requires a handler.
    pub fn has_consistent_assignment(&self) -> bool {
        self.recycler_id.is_some() == self.status.requires_handler()
    }

    /// Whether `user` may view this pickup.
    pub fn is_visible_to(&self, user: &UserProfile) -> bool {
        user.is_admin()
            || self.citizen_id == user.uid
            || self.recycler_id.as_deref() == Some(user.uid.as_str())
            || (self.status == PickupStatus::Pending && user.can_handle_pickups())
    }
}
