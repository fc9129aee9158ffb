//! Impact aggregates for citizen dashboards and the community counter.
//!
//! Citizen aggregates are updated inside the completion transaction and keep
//! the set of pickup IDs already counted, so replaying a completion is a no-op.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::AddAssign;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::{Category, PickupRequest, PickupStatus};

const GRAMS_PER_KG: f64 = 1000.0;

/// Environmental impact, in grams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactMetrics {
    #[serde(default)]
    pub co2_reduced_grams: u64,
    #[serde(default)]
    pub materials_recovered_grams: u64,
    #[serde(default)]
    pub waste_diverted_grams: u64,
}

impl ImpactMetrics {
    pub fn co2_reduced_kg(&self) -> f64 {
        self.co2_reduced_grams as f64 / GRAMS_PER_KG
    }

    pub fn materials_recovered_kg(&self) -> f64 {
        self.materials_recovered_grams as f64 / GRAMS_PER_KG
    }

    pub fn waste_diverted_kg(&self) -> f64 {
        self.waste_diverted_grams as f64 / GRAMS_PER_KG
    }
}

impl AddAssign for ImpactMetrics {
    fn add_assign(&mut self, rhs: Self) {
        self.co2_reduced_grams += rhs.co2_reduced_grams;
        self.materials_recovered_grams += rhs.materials_recovered_grams;
        self.waste_diverted_grams += rhs.waste_diverted_grams;
    }
}

/// Impact expressed in kilograms for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ImpactKg {
    pub co2_reduced_kg: f64,
    pub materials_recovered_kg: f64,
    pub waste_diverted_kg: f64,
}

impl From<ImpactMetrics> for ImpactKg {
    fn from(m: ImpactMetrics) -> Self {
        Self {
            co2_reduced_kg: m.co2_reduced_kg(),
            materials_recovered_kg: m.materials_recovered_kg(),
            waste_diverted_kg: m.waste_diverted_kg(),
        }
    }
}

/// Pre-computed contribution totals for one citizen.
///
/// Stored at: `citizen_stats/{citizen_id}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CitizenStats {
    /// Completed pickups counted so far
    #[serde(default)]
    pub completed_pickups: u32,
    /// Completed pickups per category
    #[serde(default)]
    pub category_counts: BTreeMap<Category, u32>,
    /// Summed impact of all completed pickups
    #[serde(default)]
    pub impact: ImpactMetrics,

    // ─── Idempotency ─────────────────────────────────────────────
    /// Pickup IDs already folded into these totals
    #[serde(default)]
    pub processed_pickup_ids: BTreeSet<String>,

    /// Last update timestamp (ISO 8601)
    #[serde(default)]
    pub updated_at: String,
}

impl CitizenStats {
    /// Fold a completed pickup into the totals.
    ///
    /// Returns `false` without changing anything if the pickup was already counted.
    pub fn record_completion(&mut self, pickup: &PickupRequest, now: &str) -> bool {
        if pickup.status != PickupStatus::Completed {
            return false;
        }
        if !self.processed_pickup_ids.insert(pickup.id.clone()) {
            return false;
        }

        self.completed_pickups += 1;
        *self.category_counts.entry(pickup.category).or_insert(0) += 1;
        self.impact += pickup.category.impact();
        self.updated_at = now.to_string();
        true
    }

    /// Recompute totals from scratch over a citizen's pickups.
    ///
    /// Non-completed pickups are ignored.
    pub fn from_pickups<'a>(pickups: impl IntoIterator<Item = &'a PickupRequest>, now: &str) -> Self {
        let mut stats = Self::default();
        for pickup in pickups {
            stats.record_completion(pickup, now);
        }
        stats
    }

    pub fn category_count(&self, category: Category) -> u32 {
        self.category_counts.get(&category).copied().unwrap_or(0)
    }

    /// Human summary such as "2 Laptop(s), 1 Mobile(s)".
    ///
    /// `None` when nothing has been completed yet.
    pub fn contribution_summary(&self) -> Option<String> {
        let parts: Vec<String> = self
            .category_counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(category, count)| format!("{} {}(s)", count, category))
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

/// Platform-wide running totals.
///
/// Stored at: `stats/community`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommunityStats {
    #[serde(default)]
    pub totals: ImpactMetrics,
    #[serde(default)]
    pub completed_pickups: u64,
    #[serde(default)]
    pub updated_at: String,
}

impl CommunityStats {
    /// Add one completion's contribution.
    pub fn add_completion(&mut self, impact: ImpactMetrics, now: &str) {
        self.totals += impact;
        self.completed_pickups += 1;
        self.updated_at = now.to_string();
    }
}
