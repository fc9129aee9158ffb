// SPDX-License-Identifier: MIT

//! Completion side effects: credits, citizen stats, badges, community totals.
//!
//! Runs inside the same storage transaction that flips a pickup to
//! `completed`. The citizen's `processed_pickup_ids` is the idempotency key,
//! so replaying a completion (retry or reconcile) changes nothing.

use crate::models::{
    Badge, CitizenStats, CommunityStats, ImpactMetrics, PickupRequest, RoleProfile, UserProfile,
};

/// Credits a citizen earns per completed pickup.
pub const CREDITS_PER_PICKUP: u32 = 50;

/// What applying a completion did.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompletionOutcome {
    /// `false` if the pickup had already been counted
    pub applied: bool,
    pub credits_awarded: u32,
    pub new_badges: Vec<Badge>,
    pub impact: ImpactMetrics,
}

/// Apply the completion of `pickup` to the citizen and community aggregates.
///
/// The caller persists `citizen`, `stats` and `community` together with the
/// pickup when `applied` is true.
pub fn apply_completion(
    pickup: &PickupRequest,
    citizen: &mut UserProfile,
    stats: &mut CitizenStats,
    community: &mut CommunityStats,
    now: &str,
) -> CompletionOutcome {
    debug_assert_eq!(pickup.citizen_id, citizen.uid);

    if !stats.record_completion(pickup, now) {
        tracing::debug!(
            pickup_id = %pickup.id,
            citizen_id = %pickup.citizen_id,
            "Completion already applied (idempotent skip)"
        );
        return CompletionOutcome::default();
    }

    let impact = pickup.category.impact();
    community.add_completion(impact, now);

    let (credits_awarded, new_badges) = match &mut citizen.role {
        RoleProfile::Citizen { credits, badges } => {
            *credits = credits.saturating_add(CREDITS_PER_PICKUP);
            let earned = Badge::newly_earned(stats, *credits, badges);
            badges.extend(earned.iter().copied());
            (CREDITS_PER_PICKUP, earned)
        }
        other => {
            tracing::warn!(
                citizen_id = %citizen.uid,
                role = %other.role(),
                "Pickup owner is not a citizen; skipping credits and badges"
            );
            (0, Vec::new())
        }
    };

    if !new_badges.is_empty() {
        tracing::info!(
            citizen_id = %citizen.uid,
            badges = ?new_badges,
            "Awarding new badges"
        );
    }

    CompletionOutcome {
        applied: true,
        credits_awarded,
        new_badges,
        impact,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, PickupLocation, PickupStatus, Role};
    use chrono::Utc;

    fn citizen() -> UserProfile {
        UserProfile::new(
            "citizen-1".into(),
            "Alex".into(),
            None,
            RoleProfile::initial(Role::Citizen),
            Utc::now(),
        )
    }

    fn completed(id: &str, category: Category) -> PickupRequest {
        let now = Utc::now();
        PickupRequest {
            id: id.to_string(),
            citizen_id: "citizen-1".to_string(),
            citizen_name: "Alex".to_string(),
            recycler_id: Some("r1".to_string()),
            category,
            description: "Completed pickup".to_string(),
            location: PickupLocation {
                display_address: "1 Main Street".to_string(),
                lat: 0.0,
                lon: 0.0,
            },
            photo_reference: "photo_x".to_string(),
            status: PickupStatus::Completed,
            created_at: now,
            updated_at: now,
            completed_at: Some(now),
        }
    }

    #[test]
    fn test_first_laptop_completion() {
        let mut profile = citizen();
        let mut stats = CitizenStats::default();
        let mut community = CommunityStats::default();

        let outcome = apply_completion(
            &completed("p1", Category::Laptop),
            &mut profile,
            &mut stats,
            &mut community,
            "t",
        );

        assert!(outcome.applied);
        assert_eq!(outcome.credits_awarded, CREDITS_PER_PICKUP);
        assert_eq!(profile.credits(), CREDITS_PER_PICKUP);
        assert_eq!(
            profile.badges(),
            &[Badge::FirstContribution, Badge::LaptopRecycler]
        );
        assert_eq!(community.totals.co2_reduced_grams, 22_000);
    }

    #[test]
    fn test_replay_is_noop() {
        let pickup = completed("p1", Category::Mobile);
        let mut profile = citizen();
        let mut stats = CitizenStats::default();
        let mut community = CommunityStats::default();

        apply_completion(&pickup, &mut profile, &mut stats, &mut community, "t1");
        let snapshot = (profile.clone(), stats.clone(), community.clone());

        let outcome = apply_completion(&pickup, &mut profile, &mut stats, &mut community, "t2");

        assert!(!outcome.applied);
        assert_eq!((profile, stats, community), snapshot);
    }

    #[test]
    fn test_badges_only_grow() {
        let mut profile = citizen();
        let mut stats = CitizenStats::default();
        let mut community = CommunityStats::default();
        let mut previous: Vec<Badge> = Vec::new();

        let categories = [
            Category::Laptop,
            Category::Mobile,
            Category::Laptop,
            Category::Mobile,
            Category::Mobile,
            Category::Appliance,
            Category::Mobile,
            Category::Mobile,
            Category::Other,
            Category::Laptop,
        ];
        for (i, category) in categories.into_iter().enumerate() {
            apply_completion(
                &completed(&format!("p{}", i), category),
                &mut profile,
                &mut stats,
                &mut community,
                "t",
            );
            assert!(previous.iter().all(|b| profile.badges().contains(b)));
            assert!(profile.badges().starts_with(&previous));
            previous = profile.badges().to_vec();
        }

        assert_eq!(profile.credits(), 500);
        for badge in Badge::ALL {
            assert!(profile.badges().contains(&badge), "missing {:?}", badge);
        }
        assert_eq!(community.completed_pickups, 10);
    }

    #[test]
    fn test_non_citizen_owner_still_counts_community() {
        let mut profile = UserProfile::new(
            "citizen-1".into(),
            "Odd".into(),
            None,
            RoleProfile::Contractor,
            Utc::now(),
        );
        let mut stats = CitizenStats::default();
        let mut community = CommunityStats::default();

        let outcome = apply_completion(
            &completed("p1", Category::Battery),
            &mut profile,
            &mut stats,
            &mut community,
            "t",
        );

        assert!(outcome.applied);
        assert_eq!(outcome.credits_awarded, 0);
        assert_eq!(community.completed_pickups, 1);
    }
}
