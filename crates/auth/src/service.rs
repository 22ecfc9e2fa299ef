//! Mock user-profile session management.
//!
//! There is no account backend: any well-formed email and password signs in
//! and yields a demo profile. The profile is persisted as JSON under
//! `ecoguard_user` so the dashboard stays signed in across restarts.

use ecoguard_core::config::AuthConfig;
use ecoguard_core::storage::USER_STORAGE_KEY;
use ecoguard_core::types::{UserPreferences, UserProfile, UserRole};
use ecoguard_core::{Clock, KeyValueStore};
use parking_lot::RwLock;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AuthError, Result};

/// Shortest password accepted by sign-in and sign-up.
pub const MIN_PASSWORD_LEN: usize = 6;

/// New account details.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub organization: Option<String>,
}

/// Partial profile update; `None` fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub organization: Option<String>,
    pub avatar: Option<String>,
}

/// User-profile session service.
pub struct AuthService {
    config: AuthConfig,
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    current: RwLock<Option<UserProfile>>,
}

impl AuthService {
    /// Create the service and restore any stored profile.
    pub fn new(config: AuthConfig, storage: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        let service = Self {
            config,
            storage,
            clock,
            current: RwLock::new(None),
        };
        service.restore();
        service
    }

    fn restore(&self) {
        let stored = match self.storage.get(USER_STORAGE_KEY) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Failed to read stored user profile");
                return;
            }
        };

        let Some(json) = stored else {
            return;
        };

        match serde_json::from_str::<UserProfile>(&json) {
            Ok(profile) => {
                debug!(user_id = %profile.id, "Restored user profile");
                *self.current.write() = Some(profile);
            }
            Err(e) => {
                warn!(error = %e, "Discarding unreadable user profile");
                if let Err(e) = self.storage.remove(USER_STORAGE_KEY) {
                    warn!(error = %e, "Failed to remove unreadable user profile");
                }
            }
        }
    }

    async fn simulate_latency(&self) {
        if !self.config.latency.is_zero() {
            tokio::time::sleep(self.config.latency).await;
        }
    }

    /// Sign in with any well-formed email and password.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<UserProfile> {
        let email = normalize_email(email)?;
        validate_password(password)?;

        self.simulate_latency().await;

        let (first_name, last_name) = names_from_email(&email);
        let role = if email.starts_with("admin@") {
            UserRole::Admin
        } else {
            UserRole::default()
        };
        let now = self.clock.now();

        let profile = UserProfile {
            id: Uuid::new_v4().to_string(),
            email,
            first_name,
            last_name,
            organization: self.config.default_organization.clone(),
            role,
            avatar: None,
            created_at: now,
            updated_at: now,
            preferences: UserPreferences::default(),
        };

        self.store(&profile)?;
        info!(user_id = %profile.id, email = %profile.email, "User signed in");
        Ok(profile)
    }

    /// Create a profile from explicit account details.
    pub async fn sign_up(&self, request: SignUpRequest) -> Result<UserProfile> {
        let email = normalize_email(&request.email)?;
        validate_password(&request.password)?;

        let first_name = request.first_name.trim().to_string();
        let last_name = request.last_name.trim().to_string();
        if first_name.is_empty() {
            return Err(AuthError::MissingField("firstName"));
        }
        if last_name.is_empty() {
            return Err(AuthError::MissingField("lastName"));
        }

        self.simulate_latency().await;

        let now = self.clock.now();
        let organization = request
            .organization
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .unwrap_or_else(|| self.config.default_organization.clone());

        let profile = UserProfile {
            id: Uuid::new_v4().to_string(),
            email,
            first_name,
            last_name,
            organization,
            role: UserRole::default(),
            avatar: None,
            created_at: now,
            updated_at: now,
            preferences: UserPreferences::default(),
        };

        self.store(&profile)?;
        info!(user_id = %profile.id, "User signed up");
        Ok(profile)
    }

    /// Forget the signed-in profile.
    pub fn sign_out(&self) -> Result<()> {
        self.storage.remove(USER_STORAGE_KEY)?;
        let previous = self.current.write().take();
        if let Some(profile) = previous {
            info!(user_id = %profile.id, "User signed out");
        }
        Ok(())
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.current.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.read().is_some()
    }

    /// Apply a partial update to the signed-in profile.
    pub fn update_profile(&self, update: ProfileUpdate) -> Result<UserProfile> {
        let mut profile = self.current_user().ok_or(AuthError::NotAuthenticated)?;

        if let Some(first_name) = non_blank(update.first_name) {
            profile.first_name = first_name;
        }
        if let Some(last_name) = non_blank(update.last_name) {
            profile.last_name = last_name;
        }
        if let Some(organization) = non_blank(update.organization) {
            profile.organization = organization;
        }
        if let Some(avatar) = update.avatar {
            profile.avatar = non_blank(Some(avatar));
        }
        profile.updated_at = self.clock.now();

        self.store(&profile)?;
        debug!(user_id = %profile.id, "Profile updated");
        Ok(profile)
    }

    /// Replace the signed-in user's preferences.
    pub fn update_preferences(&self, preferences: UserPreferences) -> Result<UserProfile> {
        let mut profile = self.current_user().ok_or(AuthError::NotAuthenticated)?;
        profile.preferences = preferences;
        profile.updated_at = self.clock.now();

        self.store(&profile)?;
        debug!(user_id = %profile.id, "Preferences updated");
        Ok(profile)
    }

    fn store(&self, profile: &UserProfile) -> Result<()> {
        let json = serde_json::to_string(profile)?;
        self.storage.set(USER_STORAGE_KEY, &json)?;
        *self.current.write() = Some(profile.clone());
        Ok(())
    }
}

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    let Some((local, domain)) = email.split_once('@') else {
        return Err(AuthError::InvalidEmail);
    };

    let valid = !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace);

    if valid {
        Ok(email)
    } else {
        Err(AuthError::InvalidEmail)
    }
}

fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword {
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

/// `jane.doe@x.org` → ("Jane", "Doe"); a single-part local name gets "User".
fn names_from_email(email: &str) -> (String, String) {
    let local = email.split('@').next().unwrap_or_default();
    let mut parts = local
        .split(['.', '_', '-', '+'])
        .filter(|p| !p.is_empty())
        .map(capitalize);

    let first = parts.next().unwrap_or_else(|| "Eco".to_string());
    let last = parts.next().unwrap_or_else(|| "User".to_string());
    (first, last)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
