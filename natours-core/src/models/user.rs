use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;
use crate::validation::{require_email, require_length, require_password_pair};

/// Access role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    #[sqlx(rename = "user")]
    User,
    #[sqlx(rename = "guide")]
    Guide,
    #[sqlx(rename = "lead-guide")]
    LeadGuide,
    #[sqlx(rename = "admin")]
    Admin,
}

/// User model representing an account in the system.
///
/// Maps to the `users` table. Credential and reset-token columns are never
/// serialized.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Lowercased, unique email address
    pub email: String,

    pub photo: Option<String>,

    pub role: Role,

    /// Bcrypt hashed password
    #[serde(skip_serializing)]
    pub password_hash: String,

    #[serde(skip_serializing)]
    pub password_changed_at: Option<DateTime<Utc>>,

    /// SHA-256 of the outstanding reset token
    #[serde(skip_serializing)]
    pub password_reset_token: Option<String>,

    #[serde(skip_serializing)]
    pub password_reset_expires: Option<DateTime<Utc>>,

    /// Soft-delete flag
    #[serde(skip_serializing)]
    pub active: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }
}

/// User response (public representation, excludes credentials)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub photo: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id,
            name: user.name,
            email: user.email,
            photo: user.photo,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// Self-service signup request
#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

impl SignupRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        require_length("Name", &self.name, 3, 40)?;
        require_email(self.email.trim())?;
        require_password_pair(&self.password, &self.password_confirm)
    }
}

/// Insert payload for a new user, password already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetPasswordRequest {
    pub password: String,
    pub password_confirm: String,
}

impl ResetPasswordRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        require_password_pair(&self.password, &self.password_confirm)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePasswordRequest {
    pub password_current: Option<String>,
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

/// Profile update by the account owner.
///
/// Password fields are captured only so they can be rejected.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateMeRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<Value>,
    pub password_confirm: Option<Value>,
}

impl UpdateMeRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.password.is_some() || self.password_confirm.is_some() {
            return Err(AppError::BadRequest(
                "This route is not for password updates. Please use /updateMyPassword".to_string(),
            ));
        }
        validate_profile(self.name.as_deref(), self.email.as_deref())
    }
}

/// Administrative user update
#[derive(Debug, Clone, Deserialize)]
pub struct AdminUpdateUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub photo: Option<String>,
    pub role: Option<Role>,
}

impl AdminUpdateUser {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_profile(self.name.as_deref(), self.email.as_deref())
    }
}

fn validate_profile(name: Option<&str>, email: Option<&str>) -> Result<(), AppError> {
    if let Some(name) = name {
        require_length("Name", name, 3, 40)?;
    }
    if let Some(email) = email {
        require_email(email.trim())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup(password_confirm: &str) -> SignupRequest {
        SignupRequest {
            name: "Laura Wilson".to_string(),
            email: "laura@example.com".to_string(),
            password: "test1234".to_string(),
            password_confirm: password_confirm.to_string(),
        }
    }

    #[test]
    fn test_signup_validation() {
        assert!(signup("test1234").validate().is_ok());
        assert!(matches!(signup("test12345").validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_update_me_rejects_password_fields() {
        let request = UpdateMeRequest {
            name: Some("Laura".to_string()),
            email: None,
            password: Some(Value::String("newpass123".to_string())),
            password_confirm: None,
        };
        assert!(matches!(request.validate(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_value(Role::LeadGuide).unwrap(), "lead-guide");
        let role: Role = serde_json::from_value(serde_json::json!("admin")).unwrap();
        assert_eq!(role, Role::Admin);
    }

    #[test]
    fn test_user_never_serializes_credentials() {
        let user = User {
            id: Uuid::new_v4(),
            name: "Laura Wilson".to_string(),
            email: "laura@example.com".to_string(),
            photo: None,
            role: Role::User,
            password_hash: "$2b$12$hash".to_string(),
            password_changed_at: None,
            password_reset_token: Some("digest".to_string()),
            password_reset_expires: None,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert_eq!(user.first_name(), "Laura");

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("password_reset_token").is_none());
        assert!(json.get("active").is_none());
    }
}
