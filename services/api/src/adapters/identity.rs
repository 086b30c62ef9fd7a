//! services/api/src/adapters/identity.rs
//!
//! Email and password accounts backed by the `users` and `auth_sessions` tables.
//! Passwords and recovery answers are stored as argon2 hashes only.

use crate::adapters::db::db_err;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use kova_core::domain::{Identity, RecoveryQuestion};
use kova_core::ports::{
    AuthToken, IdentityEvent, IdentityListener, IdentityService, PortError, PortResult, SignedIn,
};
use sqlx::{FromRow, PgPool};
use std::sync::RwLock;
use tracing::{error, info};
use uuid::Uuid;

/// How long a sign-in stays valid.
pub const SESSION_TTL_DAYS: i64 = 30;

pub fn hash_secret(secret: &str) -> PortResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash secret: {:?}", e);
            PortError::Unexpected("Failed to hash secret".to_string())
        })
}

pub fn verify_secret(secret: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            error!("Failed to parse stored hash: {:?}", e);
            false
        }
    }
}

/// Recovery answers are compared case-insensitively.
fn normalize_answer(answer: &str) -> String {
    answer.trim().to_lowercase()
}

#[derive(FromRow)]
struct UserCredentials {
    id: Uuid,
    email: String,
    password_hash: String,
}

#[derive(FromRow)]
struct SessionRow {
    user_id: Uuid,
    email: String,
    expires_at: DateTime<Utc>,
}

pub struct PgIdentityAdapter {
    pool: PgPool,
    listeners: RwLock<Vec<IdentityListener>>,
}

impl PgIdentityAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            listeners: RwLock::new(Vec::new()),
        }
    }

    fn notify(&self, event: IdentityEvent) {
        match self.listeners.read() {
            Ok(listeners) => listeners.iter().for_each(|listener| listener(&event)),
            Err(e) => error!("Identity listeners unavailable: {}", e),
        }
    }

    async fn issue_session(&self, identity: Identity) -> PortResult<SignedIn> {
        let token = Uuid::new_v4().to_string();
        let expires_at = Utc::now() + Duration::days(SESSION_TTL_DAYS);
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(&token)
            .bind(identity.id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        self.notify(IdentityEvent::SignedIn(identity.clone()));
        Ok(SignedIn {
            identity,
            token: AuthToken(token),
        })
    }
}

#[async_trait]
impl IdentityService for PgIdentityAdapter {
    async fn sign_in(&self, email: &str, password: &str) -> PortResult<SignedIn> {
        let creds = sqlx::query_as::<_, UserCredentials>(
            "SELECT id, email, password_hash FROM users WHERE email = $1",
        )
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?
        .ok_or(PortError::Unauthorized)?;

        if !verify_secret(password, &creds.password_hash) {
            return Err(PortError::Unauthorized);
        }
        self.issue_session(Identity {
            id: creds.id,
            email: creds.email,
        })
        .await
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        recovery: Option<&RecoveryQuestion>,
    ) -> PortResult<SignedIn> {
        let email = email.trim().to_lowercase();
        let password_hash = hash_secret(password)?;
        let (question, answer_hash) = match recovery {
            Some(r) => (
                Some(r.question.clone()),
                Some(hash_secret(&normalize_answer(&r.answer))?),
            ),
            None => (None, None),
        };

        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO users (id, email, password_hash, security_question, security_answer_hash) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(&email)
        .bind(&password_hash)
        .bind(&question)
        .bind(&answer_hash)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err(e, || email.clone()))?;

        info!("Created account {}", id);
        self.issue_session(Identity { id, email }).await
    }

    async fn current_session(&self, token: &AuthToken) -> PortResult<Option<Identity>> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT s.user_id, u.email, s.expires_at FROM auth_sessions s \
             JOIN users u ON u.id = s.user_id WHERE s.id = $1",
        )
        .bind(&token.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(row
            .filter(|r| r.expires_at > Utc::now())
            .map(|r| Identity {
                id: r.user_id,
                email: r.email,
            }))
    }

    fn on_identity_change(&self, listener: IdentityListener) {
        match self.listeners.write() {
            Ok(mut listeners) => listeners.push(listener),
            Err(e) => error!("Could not register identity listener: {}", e),
        }
    }

    async fn sign_out(&self, token: &AuthToken) -> PortResult<()> {
        let user_id = sqlx::query_scalar::<_, Uuid>(
            "DELETE FROM auth_sessions WHERE id = $1 RETURNING user_id",
        )
        .bind(&token.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if let Some(user_id) = user_id {
            self.notify(IdentityEvent::SignedOut(user_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_verify_only_the_original_secret() {
        let hash = hash_secret("correct horse").unwrap();
        assert_ne!(hash, "correct horse");
        assert!(verify_secret("correct horse", &hash));
        assert!(!verify_secret("battery staple", &hash));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_secret("anything", "not-a-phc-string"));
    }

    #[test]
    fn recovery_answers_ignore_case_and_padding() {
        let hash = hash_secret(&normalize_answer("London")).unwrap();
        assert!(verify_secret(&normalize_answer("  london "), &hash));
    }
}
