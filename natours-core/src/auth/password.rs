use anyhow::Context;

use crate::error::AppError;

/// Hashes a password with bcrypt at the given cost.
///
/// Runs on the blocking pool; bcrypt is deliberately slow.
pub async fn hash_password(plain: &str, cost: u32) -> Result<String, AppError> {
    let plain = plain.to_string();
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(plain, cost))
        .await
        .context("password hashing task failed")?
        .context("password hashing failed")?;
    Ok(hash)
}

/// Checks a candidate password against a stored bcrypt hash.
///
/// A malformed hash verifies as `false` rather than erroring.
pub async fn verify_password(plain: &str, hash: &str) -> Result<bool, AppError> {
    let plain = plain.to_string();
    let hash = hash.to_string();
    let matches = tokio::task::spawn_blocking(move || bcrypt::verify(plain, &hash).unwrap_or(false))
        .await
        .context("password verification task failed")?;
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST: u32 = 4;

    #[tokio::test]
    async fn test_hash_then_verify() {
        let hash = hash_password("pass1234", TEST_COST).await.unwrap();
        assert_ne!(hash, "pass1234");
        assert!(verify_password("pass1234", &hash).await.unwrap());
        assert!(!verify_password("pass12345", &hash).await.unwrap());
        assert!(!verify_password("", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_hashes_are_salted() {
        let first = hash_password("pass1234", TEST_COST).await.unwrap();
        let second = hash_password("pass1234", TEST_COST).await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_malformed_hash_does_not_verify() {
        assert!(!verify_password("pass1234", "not-a-bcrypt-hash").await.unwrap());
    }
}
