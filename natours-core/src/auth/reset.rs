use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Lifetime of a password reset token.
pub const RESET_TOKEN_TTL_MINUTES: i64 = 10;

/// A freshly generated reset token. Only `hash` and `expires_at` are stored;
/// `plain` goes out by email.
#[derive(Debug, Clone)]
pub struct PasswordResetToken {
    pub plain: String,
    pub hash: String,
    pub expires_at: DateTime<Utc>,
}

pub fn create_password_reset_token() -> PasswordResetToken {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let plain = hex::encode(bytes);

    PasswordResetToken {
        hash: hash_reset_token(&plain),
        plain,
        expires_at: Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES),
    }
}

/// Hex SHA-256 of a reset token, the form kept in the database.
pub fn hash_reset_token(plain: &str) -> String {
    hex::encode(Sha256::digest(plain.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_shape_and_digest() {
        let token = create_password_reset_token();
        assert_eq!(token.plain.len(), 64);
        assert_eq!(token.hash, hash_reset_token(&token.plain));
        assert_ne!(token.hash, token.plain);
    }

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(create_password_reset_token().plain, create_password_reset_token().plain);
    }

    #[test]
    fn test_expiry_is_ten_minutes_out() {
        let token = create_password_reset_token();
        let remaining = token.expires_at - Utc::now();
        assert!(remaining <= Duration::minutes(10));
        assert!(remaining > Duration::minutes(9));
    }
}
