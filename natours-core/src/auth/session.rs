use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::error::AppError;

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User id
    pub sub: Uuid,
    /// Issued at, seconds since the epoch
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    /// Rejects tokens issued before the user's last password change.
    pub fn ensure_issued_after(
        &self,
        password_changed_at: Option<DateTime<Utc>>,
    ) -> Result<(), SessionError> {
        match password_changed_at {
            Some(changed) if self.iat < changed.timestamp() => Err(SessionError::Stale),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("invalid token")]
    Invalid,

    #[error("token expired")]
    Expired,

    #[error("token issued before the last password change")]
    Stale,
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        let message = match err {
            SessionError::Invalid => "Invalid token. Please log in again!",
            SessionError::Expired => "Your token has expired! Please log in again.",
            SessionError::Stale => "User recently changed password! Please log in again.",
        };
        AppError::Unauthenticated(message.to_string())
    }
}

/// Issues and decodes HS256 session tokens.
pub struct SessionIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SessionIssuer {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, user_id: Uuid) -> Result<String, AppError> {
        self.issue_at(user_id, Utc::now())
    }

    pub fn issue_at(&self, user_id: Uuid, issued_at: DateTime<Utc>) -> Result<String, AppError> {
        let claims = SessionClaims {
            sub: user_id,
            iat: issued_at.timestamp(),
            exp: (issued_at + self.ttl).timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(anyhow::Error::from)?;
        Ok(token)
    }

    /// Checks signature and expiry. Staleness needs the user record and is
    /// checked by the caller.
    pub fn decode(&self, token: &str) -> Result<SessionClaims, SessionError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<SessionClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => SessionError::Expired,
                _ => SessionError::Invalid,
            })
    }
}
