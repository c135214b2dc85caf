use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{not_found, Resource};
use crate::error::AppError;
use crate::models::user::{AdminUpdateUser, NewUser};
use crate::models::{User, UserResponse};
use crate::query::{FieldKind, FieldSpec};

pub struct Users;

const USER_COLUMNS: &str = "id, name, email, photo, role, password_hash, password_changed_at, \
     password_reset_token, password_reset_expires, active, created_at, updated_at";

impl Resource for Users {
    type Row = UserResponse;
    const TABLE: &'static str = "users";
    const COLUMNS: &'static str = "id, name, email, photo, role, created_at";
    const SINGULAR: &'static str = "user";
    const BASE_PREDICATE: Option<&'static str> = Some("active = true");
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::new("id", FieldKind::Uuid).filterable(),
        FieldSpec::new("name", FieldKind::Text).filterable().sortable(),
        FieldSpec::new("email", FieldKind::Text).filterable().sortable(),
        FieldSpec::new("photo", FieldKind::Text),
        FieldSpec::new("role", FieldKind::Text).filterable().sortable(),
        FieldSpec::new("created_at", FieldKind::Timestamp).filterable().sortable(),
    ];
}

/// Emails are unique case-insensitively; they are stored lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub async fn find_active_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>, AppError> {
    let sql = format!("SELECT {} FROM users WHERE id = $1 AND active = true", USER_COLUMNS);
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

/// Active account with this email, credentials included.
pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, AppError> {
    let sql = format!("SELECT {} FROM users WHERE email = $1 AND active = true", USER_COLUMNS);
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(normalize_email(email))
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

#[instrument(skip(pool, new_user), fields(email = %new_user.email))]
pub async fn insert_user(pool: &PgPool, new_user: NewUser) -> Result<User, AppError> {
    let sql = format!(
        "INSERT INTO users (name, email, password_hash, role) VALUES ($1, $2, $3, $4) RETURNING {}",
        USER_COLUMNS
    );
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(new_user.name.trim())
        .bind(normalize_email(&new_user.email))
        .bind(&new_user.password_hash)
        .bind(new_user.role)
        .fetch_one(pool)
        .await?;

    info!("Created user {}", user.id);
    Ok(user)
}

/// Stores a new password hash and consumes any outstanding reset token.
///
/// `password_changed_at` is set one second in the past so a token issued
/// right after this write is not considered stale.
pub async fn set_password(pool: &PgPool, id: Uuid, password_hash: &str) -> Result<User, AppError> {
    let sql = format!(
        "UPDATE users SET password_hash = $1, password_changed_at = NOW() - INTERVAL '1 second', \
         password_reset_token = NULL, password_reset_expires = NULL, updated_at = NOW() \
         WHERE id = $2 RETURNING {}",
        USER_COLUMNS
    );
    sqlx::query_as::<_, User>(&sql)
        .bind(password_hash)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(not_found::<Users>)
}

/// Sets a new password if `digest` still names an unexpired reset token,
/// consuming the token in the same statement. `None` means the token was
/// invalid, expired or already redeemed.
pub async fn redeem_reset_token(
    pool: &PgPool,
    digest: &str,
    password_hash: &str,
) -> Result<Option<User>, AppError> {
    let sql = format!(
        "UPDATE users SET password_hash = $1, password_changed_at = NOW() - INTERVAL '1 second', \
         password_reset_token = NULL, password_reset_expires = NULL, updated_at = NOW() \
         WHERE password_reset_token = $2 AND password_reset_expires > NOW() AND active = true \
         RETURNING {}",
        USER_COLUMNS
    );
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(password_hash)
        .bind(digest)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

/// Records the digest of a reset token. Passing `None` clears it.
pub async fn store_reset_token(
    pool: &PgPool,
    id: Uuid,
    token: Option<(&str, DateTime<Utc>)>,
) -> Result<(), AppError> {
    let (digest, expires) = token.unzip();
    sqlx::query(
        "UPDATE users SET password_reset_token = $1, password_reset_expires = $2 WHERE id = $3",
    )
    .bind(digest)
    .bind(expires)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Active account holding an unexpired reset token with this digest.
pub async fn find_by_reset_token(pool: &PgPool, digest: &str) -> Result<Option<User>, AppError> {
    let sql = format!(
        "SELECT {} FROM users WHERE password_reset_token = $1 \
         AND password_reset_expires > NOW() AND active = true",
        USER_COLUMNS
    );
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(digest)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

/// Self-service profile update; only name and email are writable.
pub async fn update_profile(
    pool: &PgPool,
    id: Uuid,
    name: Option<&str>,
    email: Option<&str>,
) -> Result<UserResponse, AppError> {
    sqlx::query_as::<_, UserResponse>(
        "UPDATE users SET name = COALESCE($1, name), email = COALESCE($2, email), \
         updated_at = NOW() WHERE id = $3 AND active = true \
         RETURNING id, name, email, photo, role, created_at",
    )
    .bind(name.map(str::trim))
    .bind(email.map(normalize_email))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(not_found::<Users>)
}

#[instrument(skip(pool, update))]
pub async fn admin_update(
    pool: &PgPool,
    id: Uuid,
    update: AdminUpdateUser,
) -> Result<UserResponse, AppError> {
    update.validate()?;
    let user = sqlx::query_as::<_, UserResponse>(
        "UPDATE users SET name = COALESCE($1, name), email = COALESCE($2, email), \
         photo = COALESCE($3, photo), role = COALESCE($4, role), updated_at = NOW() \
         WHERE id = $5 AND active = true \
         RETURNING id, name, email, photo, role, created_at",
    )
    .bind(update.name.as_deref().map(str::trim))
    .bind(update.email.as_deref().map(normalize_email))
    .bind(update.photo)
    .bind(update.role)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(not_found::<Users>)?;

    info!("Admin updated user {}", id);
    Ok(user)
}

/// Soft delete. The account disappears from every standard read.
#[instrument(skip(pool))]
pub async fn deactivate(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE users SET active = false, updated_at = NOW() WHERE id = $1 AND active = true",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(not_found::<Users>());
    }
    info!("Deactivated user {}", id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Laura@Example.COM "), "laura@example.com");
    }

    #[test]
    fn test_credentials_are_not_queryable() {
        for hidden in ["password_hash", "password_reset_token", "active"] {
            assert!(Users::FIELDS.iter().all(|f| f.name != hidden));
        }
    }
}
