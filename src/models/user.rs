//! User profile model for storage and API.

use crate::models::Badge;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Platform role, chosen once after sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum Role {
    Citizen,
    Recycler,
    Admin,
    Contractor,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Citizen, Role::Recycler, Role::Admin, Role::Contractor];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Citizen => "Citizen",
            Role::Recycler => "Recycler",
            Role::Admin => "Admin",
            Role::Contractor => "Contractor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role together with the fields only that role carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role")]
pub enum RoleProfile {
    Citizen {
        /// Awarded on each completed pickup
        #[serde(default)]
        credits: u32,
        /// Unlocked badges, in award order
        #[serde(default)]
        badges: Vec<Badge>,
    },
    Recycler {
        /// Set by an admin; unapproved recyclers cannot take pickups
        #[serde(default)]
        approved: bool,
    },
    Admin,
    Contractor,
}

impl RoleProfile {
    /// Fresh role-specific state for a newly chosen role.
    pub fn initial(role: Role) -> Self {
        match role {
            Role::Citizen => RoleProfile::Citizen {
                credits: 0,
                badges: Vec::new(),
            },
            Role::Recycler => RoleProfile::Recycler { approved: false },
            Role::Admin => RoleProfile::Admin,
            Role::Contractor => RoleProfile::Contractor,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            RoleProfile::Citizen { .. } => Role::Citizen,
            RoleProfile::Recycler { .. } => Role::Recycler,
            RoleProfile::Admin => Role::Admin,
            RoleProfile::Contractor => Role::Contractor,
        }
    }
}

/// User profile stored in Firestore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Identity provider UID (also used as document ID)
    pub uid: String,
    pub name: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub photo_reference: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(flatten)]
    pub role: RoleProfile,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(
        uid: String,
        name: String,
        email: Option<String>,
        role: RoleProfile,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            uid,
            name,
            username: None,
            email,
            photo_reference: None,
            phone: None,
            role,
            created_at: now,
        }
    }

    pub fn role(&self) -> Role {
        self.role.role()
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.role, RoleProfile::Admin)
    }

    pub fn is_citizen(&self) -> bool {
        matches!(self.role, RoleProfile::Citizen { .. })
    }

    /// Approved recyclers and all contractors may accept or reject pickups.
    pub fn can_handle_pickups(&self) -> bool {
        matches!(
            self.role,
            RoleProfile::Recycler { approved: true } | RoleProfile::Contractor
        )
    }

    pub fn credits(&self) -> u32 {
        match &self.role {
            RoleProfile::Citizen { credits, .. } => *credits,
            _ => 0,
        }
    }

    pub fn badges(&self) -> &[Badge] {
        match &self.role {
            RoleProfile::Citizen { badges, .. } => badges,
            _ => &[],
        }
    }

    /// Most recently awarded badge, if any.
    pub fn latest_badge(&self) -> Option<Badge> {
        self.badges().last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_entitlement() {
        let now = Utc::now();
        let make = |role| UserProfile::new("u".into(), "U".into(), None, role, now);

        assert!(make(RoleProfile::Contractor).can_handle_pickups());
        assert!(make(RoleProfile::Recycler { approved: true }).can_handle_pickups());
        assert!(!make(RoleProfile::Recycler { approved: false }).can_handle_pickups());
        assert!(!make(RoleProfile::initial(Role::Citizen)).can_handle_pickups());
        assert!(!make(RoleProfile::Admin).can_handle_pickups());
    }

    #[test]
    fn test_profile_json_is_flat() {
        let profile = UserProfile::new(
            "u1".into(),
            "Alex".into(),
            None,
            RoleProfile::Citizen {
                credits: 100,
                badges: vec![Badge::FirstContribution],
            },
            Utc::now(),
        );

        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["role"], "Citizen");
        assert_eq!(value["credits"], 100);
        assert_eq!(value["badges"][0], "first-contribution");

        let back: UserProfile = serde_json::from_value(value).unwrap();
        assert_eq!(back, profile);
    }

    #[test]
    fn test_recycler_defaults_unapproved() {
        let json = serde_json::json!({
            "uid": "r1",
            "name": "Recycler",
            "role": "Recycler",
            "created_at": "2024-01-15T10:00:00Z"
        });
        let profile: UserProfile = serde_json::from_value(json).unwrap();
        assert_eq!(profile.role, RoleProfile::Recycler { approved: false });
        assert_eq!(profile.credits(), 0);
        assert!(profile.badges().is_empty());
    }
}
