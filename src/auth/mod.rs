//! Local password gate.
//!
//! One set of credentials per database: a password, stored as a SHA-256
//! hex digest, and a recovery email shown to whoever forgot it.

use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

use crate::db;
use crate::error::{Error, Result};

/// SHA-256 of the password as a lowercase hex string (64 characters).
pub fn hash_password(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

/// Whether credentials have been set.
pub async fn is_configured(pool: &SqlitePool) -> Result<bool> {
    Ok(db::get_auth_data(pool).await?.is_some())
}

/// Store credentials, replacing any existing ones.
pub async fn set_credentials(pool: &SqlitePool, password: &str, recovery_email: &str) -> Result<()> {
    db::upsert_auth_data(pool, &hash_password(password), recovery_email).await?;
    tracing::info!("Credentials saved");
    Ok(())
}

/// Change existing credentials.
pub async fn update_credentials(
    pool: &SqlitePool,
    password: &str,
    recovery_email: &str,
) -> Result<()> {
    if !db::update_auth_data(pool, &hash_password(password), recovery_email).await? {
        return Err(Error::AuthNotConfigured);
    }
    tracing::info!("Credentials updated");
    Ok(())
}

/// Check a password against the stored digest.
pub async fn verify(pool: &SqlitePool, password: &str) -> Result<bool> {
    let auth = db::get_auth_data(pool)
        .await?
        .ok_or(Error::AuthNotConfigured)?;
    let ok = auth.password == hash_password(password);
    if !ok {
        tracing::warn!("Password check failed");
    }
    Ok(ok)
}

pub async fn recovery_email(pool: &SqlitePool) -> Result<String> {
    db::get_auth_data(pool)
        .await?
        .map(|auth| auth.recovery_email)
        .ok_or(Error::AuthNotConfigured)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::temp_db;

    #[test]
    fn test_hash_password() {
        let digest = hash_password("hunter2");
        assert_eq!(digest.len(), 64);
        assert_eq!(
            digest,
            "f52fbd32b2b3b86ff88ef6c490628285f482af15ddcb29541f94bcf526a3f6c7"
        );
        assert_ne!(digest, hash_password("hunter3"));
    }

    #[tokio::test]
    async fn test_verify_accepts_only_the_right_password() {
        let (pool, _dir) = temp_db().await;
        set_credentials(&pool, "correct horse", "me@example.com").await.unwrap();

        assert!(verify(&pool, "correct horse").await.unwrap());
        assert!(!verify(&pool, "battery staple").await.unwrap());
        assert!(!verify(&pool, "").await.unwrap());
    }

    #[tokio::test]
    async fn test_password_is_not_stored_in_plaintext() {
        let (pool, _dir) = temp_db().await;
        set_credentials(&pool, "secret", "me@example.com").await.unwrap();

        let row = db::get_auth_data(&pool).await.unwrap().unwrap();
        assert_ne!(row.password, "secret");
        assert_eq!(row.password, hash_password("secret"));
    }

    #[tokio::test]
    async fn test_unconfigured_gate() {
        let (pool, _dir) = temp_db().await;

        assert!(!is_configured(&pool).await.unwrap());
        assert!(matches!(verify(&pool, "x").await, Err(Error::AuthNotConfigured)));
        assert!(matches!(recovery_email(&pool).await, Err(Error::AuthNotConfigured)));
        assert!(matches!(
            update_credentials(&pool, "x", "y").await,
            Err(Error::AuthNotConfigured)
        ));
    }

    #[tokio::test]
    async fn test_update_credentials() {
        let (pool, _dir) = temp_db().await;
        set_credentials(&pool, "old", "old@example.com").await.unwrap();

        update_credentials(&pool, "new", "new@example.com").await.unwrap();

        assert!(verify(&pool, "new").await.unwrap());
        assert!(!verify(&pool, "old").await.unwrap());
        assert_eq!(recovery_email(&pool).await.unwrap(), "new@example.com");
    }
}
