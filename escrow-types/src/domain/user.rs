//! User domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::id::UserId;
use crate::error::DomainError;

const PASSWORD_SPECIALS: &str = "!@#$%^&*";

/// A registered marketplace user.
///
/// `password_hash` never leaves the service; use [`UserSummary`] or
/// [`UserProfile`] for anything that is returned to clients.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Option<String>,
    pub phone: String,
    /// Short shareable code other users can use to address this user.
    pub user_code: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub is_blocked: bool,
    /// Expo push token of the user's device, if one was saved.
    pub push_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            user_code: self.user_code.clone(),
            is_admin: self.is_admin,
        }
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            summary: self.summary(),
            is_blocked: self.is_blocked,
            created_at: self.created_at,
        }
    }
}

/// Public view of a user embedded in other resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserSummary {
    pub id: UserId,
    #[schema(example = "Ama Mensah")]
    pub name: String,
    pub email: Option<String>,
    #[schema(example = "0241234567")]
    pub phone: String,
    #[schema(example = "7K2Q9A")]
    pub user_code: String,
    pub is_admin: bool,
}

/// Administrative view of a user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    #[serde(flatten)]
    pub summary: UserSummary,
    pub is_blocked: bool,
    pub created_at: DateTime<Utc>,
}

/// Checks the password policy: at least 6 characters with an uppercase letter,
/// a digit and one of `!@#$%^&*`.
pub fn validate_password(password: &str) -> Result<(), DomainError> {
    if password.chars().count() < 6 {
        return Err(DomainError::ValidationError(
            "Password must be at least 6 characters long".into(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(DomainError::ValidationError(
            "Password must contain at least one uppercase letter".into(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(DomainError::ValidationError(
            "Password must contain at least one number".into(),
        ));
    }
    if !password.chars().any(|c| PASSWORD_SPECIALS.contains(c)) {
        return Err(DomainError::ValidationError(
            "Password must contain at least one special character".into(),
        ));
    }
    Ok(())
}

/// Normalizes a phone number by dropping spaces and dashes.
///
/// Accepts an optional leading `+` followed by 9 to 15 digits.
pub fn normalize_phone(raw: &str) -> Result<String, DomainError> {
    let phone: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    let digits = phone.strip_prefix('+').unwrap_or(&phone);

    if digits.len() < 9 || digits.len() > 15 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(DomainError::ValidationError(format!(
            "Invalid phone number: {}",
            raw
        )));
    }
    Ok(phone)
}

/// Light sanity check; delivery is what really validates an address.
pub fn validate_email(email: &str) -> Result<(), DomainError> {
    let valid = email
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.starts_with('.'))
        .unwrap_or(false);

    if valid {
        Ok(())
    } else {
        Err(DomainError::ValidationError(format!(
            "Invalid email address: {}",
            email
        )))
    }
}
