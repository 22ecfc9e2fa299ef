//! User profile types persisted by the auth service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Dashboard role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Manager,
    /// Default role for new accounts.
    #[default]
    Analyst,
    Viewer,
}

/// Dashboard colour scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    System,
}

/// Measurement unit system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

/// Per-channel notification opt-ins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    pub email: bool,
    pub push: bool,
    pub sms: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            email: true,
            push: true,
            sms: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub theme: Theme,
    pub notifications: NotificationPreferences,
    pub units: UnitSystem,
    pub language: String,
    pub timezone: String,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            notifications: NotificationPreferences::default(),
            units: UnitSystem::default(),
            language: "en".to_string(),
            timezone: "UTC".to_string(),
        }
    }
}

/// A signed-in user's profile, stored as JSON under `ecoguard_user`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub organization: String,
    pub role: UserRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub preferences: UserPreferences,
}

impl UserProfile {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_json_uses_camel_case() {
        let now = Utc::now();
        let profile = UserProfile {
            id: "u1".to_string(),
            email: "ada@example.com".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            organization: "EcoGuard".to_string(),
            role: UserRole::Admin,
            avatar: None,
            created_at: now,
            updated_at: now,
            preferences: UserPreferences::default(),
        };

        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["firstName"], "Ada");
        assert_eq!(json["role"], "admin");
        assert_eq!(json["preferences"]["theme"], "light");
        assert!(json.get("avatar").is_none());
        assert_eq!(profile.display_name(), "Ada Lovelace");
    }
}
