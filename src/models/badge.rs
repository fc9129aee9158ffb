// SPDX-License-Identifier: MIT

//! Achievement badges and their unlock thresholds.

use crate::models::stats::CitizenStats;
use crate::models::Category;
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

const LANDFILL_HERO_GRAMS: u64 = 10_000;
const MOBILE_MASTER_COUNT: u32 = 5;
const ECO_VETERAN_COUNT: u32 = 10;
const TOP_CONTRIBUTOR_CREDITS: u32 = 500;

/// A badge a citizen can unlock. Once awarded, never removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum Badge {
    FirstContribution,
    LaptopRecycler,
    MobileMaster,
    #[serde(rename = "landfill-hero-10kg")]
    LandfillHero10kg,
    EcoVeteran,
    TopContributor,
}

impl Badge {
    pub const ALL: [Badge; 6] = [
        Badge::FirstContribution,
        Badge::LaptopRecycler,
        Badge::MobileMaster,
        Badge::LandfillHero10kg,
        Badge::EcoVeteran,
        Badge::TopContributor,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Badge::FirstContribution => "first-contribution",
            Badge::LaptopRecycler => "laptop-recycler",
            Badge::MobileMaster => "mobile-master",
            Badge::LandfillHero10kg => "landfill-hero-10kg",
            Badge::EcoVeteran => "eco-veteran",
            Badge::TopContributor => "top-contributor",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Badge::FirstContribution => "First Contribution",
            Badge::LaptopRecycler => "Laptop Recycler",
            Badge::MobileMaster => "Mobile Master",
            Badge::LandfillHero10kg => "Landfill Hero (10kg)",
            Badge::EcoVeteran => "Eco-Veteran",
            Badge::TopContributor => "Top Contributor",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Badge::FirstContribution => "Complete your first pickup.",
            Badge::LaptopRecycler => "Recycle your first laptop.",
            Badge::MobileMaster => "Recycle 5 mobile phones.",
            Badge::LandfillHero10kg => "Divert over 10kg of waste.",
            Badge::EcoVeteran => "Complete 10 pickups.",
            Badge::TopContributor => "Reach 500 credits.",
        }
    }

    /// Evaluate this badge against a citizen's up-to-date aggregate.
    pub fn is_earned(&self, stats: &CitizenStats, credits: u32) -> bool {
        match self {
            Badge::FirstContribution => stats.completed_pickups >= 1,
            Badge::LaptopRecycler => stats.category_count(Category::Laptop) >= 1,
            Badge::MobileMaster => stats.category_count(Category::Mobile) >= MOBILE_MASTER_COUNT,
            Badge::LandfillHero10kg => stats.impact.waste_diverted_grams >= LANDFILL_HERO_GRAMS,
            Badge::EcoVeteran => stats.completed_pickups >= ECO_VETERAN_COUNT,
            Badge::TopContributor => credits >= TOP_CONTRIBUTOR_CREDITS,
        }
    }

    /// Badges satisfied by `stats`/`credits` that are not yet in `existing`.
    pub fn newly_earned(stats: &CitizenStats, credits: u32, existing: &[Badge]) -> Vec<Badge> {
        Badge::ALL
            .into_iter()
            .filter(|badge| !existing.contains(badge))
            .filter(|badge| badge.is_earned(stats, credits))
            .collect()
    }
}

/// Badge catalog entry for API responses.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct BadgeInfo {
    pub id: Badge,
    pub name: String,
    pub description: String,
}

impl From<Badge> for BadgeInfo {
    fn from(badge: Badge) -> Self {
        Self {
            id: badge,
            name: badge.name().to_string(),
            description: badge.description().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats_with(counts: &[(Category, u32)]) -> CitizenStats {
        let mut stats = CitizenStats::default();
        for (category, count) in counts {
            stats.category_counts.insert(*category, *count);
            stats.completed_pickups += count;
            for _ in 0..*count {
                stats.impact += category.impact();
            }
        }
        stats
    }

    #[test]
    fn test_serialized_ids_match_catalog() {
        for badge in Badge::ALL {
            let json = serde_json::to_string(&badge).unwrap();
            assert_eq!(json, format!("\"{}\"", badge.id()));
        }
    }

    #[test]
    fn test_nothing_earned_initially() {
        assert!(Badge::newly_earned(&CitizenStats::default(), 0, &[]).is_empty());
    }

    #[test]
    fn test_first_laptop() {
        let earned = Badge::newly_earned(&stats_with(&[(Category::Laptop, 1)]), 50, &[]);
        assert_eq!(earned, vec![Badge::FirstContribution, Badge::LaptopRecycler]);
    }

    #[test]
    fn test_mobile_master_threshold() {
        assert!(!Badge::MobileMaster.is_earned(&stats_with(&[(Category::Mobile, 4)]), 0));
        assert!(Badge::MobileMaster.is_earned(&stats_with(&[(Category::Mobile, 5)]), 0));
    }

    #[test]
    fn test_landfill_hero_uses_cumulative_mass() {
        // 4 laptops divert exactly 10kg
        assert!(!Badge::LandfillHero10kg.is_earned(&stats_with(&[(Category::Laptop, 3)]), 0));
        assert!(Badge::LandfillHero10kg.is_earned(&stats_with(&[(Category::Laptop, 4)]), 0));
    }

    #[test]
    fn test_eco_veteran_and_top_contributor() {
        let stats = stats_with(&[(Category::Battery, 10)]);
        assert!(Badge::EcoVeteran.is_earned(&stats, 0));
        assert!(!Badge::TopContributor.is_earned(&stats, 499));
        assert!(Badge::TopContributor.is_earned(&stats, 500));
    }

    #[test]
    fn test_existing_badges_not_repeated() {
        let stats = stats_with(&[(Category::Laptop, 1)]);
        let earned = Badge::newly_earned(&stats, 0, &[Badge::FirstContribution]);
        assert_eq!(earned, vec![Badge::LaptopRecycler]);
    }
}
