use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{nullable, require_text, string_enum};
use crate::ValidationError;
use crate::ids::UserId;

/// Access role of a user account.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Full administrative access.
    Admin,
    /// Regular member.
    #[default]
    User,
    /// Project manager.
    Manager,
}

string_enum!(UserRole, "role", {
    Admin => "admin",
    User => "user",
    Manager => "manager",
});

/// A user account as exposed over the API.
///
/// The password hash lives only in the store and never appears here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique ID.
    pub id: UserId,
    /// Login email, unique across accounts.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Access role.
    pub role: UserRole,
    /// Optional avatar URL.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub avatar: Option<String>,
    /// Whether the account is enabled.
    pub is_active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// Registration input.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    /// Login email.
    pub email: String,
    /// Plain-text password, hashed before storage.
    pub password: String,
    /// Display name.
    pub name: String,
    /// Role, defaults to [`UserRole::User`].
    #[serde(default)]
    pub role: Option<UserRole>,
    /// Optional avatar URL.
    #[serde(default)]
    pub avatar: Option<String>,
}

impl NewUser {
    /// Check required fields and email shape.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_email(&self.email)?;
        require_text(&self.name, "name")?;
        if self.password.is_empty() {
            return Err(ValidationError::new("password is required"));
        }
        Ok(())
    }
}

/// Partial user update. Absent fields are left untouched.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    /// New email.
    #[serde(default)]
    pub email: Option<String>,
    /// New plain-text password; re-hashed on save.
    #[serde(default)]
    pub password: Option<String>,
    /// New display name.
    #[serde(default)]
    pub name: Option<String>,
    /// New role.
    #[serde(default)]
    pub role: Option<UserRole>,
    /// New avatar, or `null` to clear it.
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub avatar: Option<Option<String>>,
    /// Enable or disable the account.
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl UserPatch {
    /// Validate only the fields being changed.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        if let Some(name) = &self.name {
            require_text(name, "name")?;
        }
        if self.password.as_deref() == Some("") {
            return Err(ValidationError::new("password must not be empty"));
        }
        Ok(())
    }
}

impl User {
    /// Apply the non-credential fields of a patch.
    pub fn apply(&mut self, patch: &UserPatch) {
        if let Some(email) = &patch.email {
            self.email.clone_from(email);
        }
        if let Some(name) = &patch.name {
            self.name.clone_from(name);
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
        if let Some(avatar) = &patch.avatar {
            self.avatar.clone_from(avatar);
        }
        if let Some(active) = patch.is_active {
            self.is_active = active;
        }
    }
}

fn validate_email(email: &str) -> Result<(), ValidationError> {
    let trimmed = email.trim();
    match trimmed.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(ValidationError::new("a valid email is required")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> User {
        let now = Utc::now();
        User {
            id: UserId::from_raw("usr_1"),
            email: "a@example.com".into(),
            name: "Ada".into(),
            role: UserRole::User,
            avatar: Some("https://img/a.png".into()),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn role_parses_and_defaults() {
        assert_eq!("manager".parse::<UserRole>().unwrap(), UserRole::Manager);
        assert!("root".parse::<UserRole>().is_err());
        assert_eq!(UserRole::default(), UserRole::User);
    }

    #[test]
    fn user_serializes_camel_case_without_password() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["isActive"], true);
        assert!(json.get("createdAt").is_some());
        assert!(json.get("password").is_none());
    }

    #[test]
    fn new_user_validation() {
        let mut input: NewUser = serde_json::from_value(serde_json::json!({
            "email": "x@y.z", "password": "pw", "name": "X"
        }))
        .unwrap();
        assert!(input.validate().is_ok());
        assert!(input.role.is_none());

        input.email = "nope".into();
        assert!(input.validate().is_err());

        input.email = "x@y.z".into();
        input.password = String::new();
        assert!(input.validate().is_err());
    }

    #[test]
    fn patch_clears_avatar_with_null() {
        let patch: UserPatch = serde_json::from_value(serde_json::json!({"avatar": null})).unwrap();
        let mut user = sample();
        user.apply(&patch);
        assert!(user.avatar.is_none());
    }

    #[test]
    fn patch_without_avatar_keeps_it() {
        let patch: UserPatch = serde_json::from_value(serde_json::json!({"name": "Bea"})).unwrap();
        let mut user = sample();
        user.apply(&patch);
        assert_eq!(user.name, "Bea");
        assert!(user.avatar.is_some());
    }
}
