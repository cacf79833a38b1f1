//! Credential storage and bearer tokens.

pub mod extractor;
pub mod token;

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult, AuthError};
use crate::ledger::models::User;
use crate::ledger::LedgerStore;

pub use extractor::AuthUser;
pub use token::TokenKeys;

pub struct AuthService {
    store: Arc<dyn LedgerStore>,
    keys: TokenKeys,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(store: Arc<dyn LedgerStore>, keys: TokenKeys, bcrypt_cost: u32) -> Self {
        Self { store, keys, bcrypt_cost }
    }

    /// Create an account and return it with a fresh token.
    pub async fn register(&self, login: &str, password: &str) -> AppResult<(User, String)> {
        let password_hash = hash_password(password, self.bcrypt_cost).await?;
        let user = self.store.create_user(login, &password_hash).await?;
        let token = self.keys.issue(user.id)?;

        info!("👤 Registered user {} ({})", user.login, user.id);
        Ok((user, token))
    }

    pub async fn login(&self, login: &str, password: &str) -> AppResult<(User, String)> {
        let user = self
            .store
            .get_user_by_login(login)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash).await? {
            warn!("Failed login for {}", login);
            return Err(AuthError::InvalidCredentials.into());
        }

        let token = self.keys.issue(user.id)?;
        Ok((user, token))
    }

    pub fn verify_token(&self, token: &str) -> Result<Uuid, AuthError> {
        self.keys.verify(token)
    }
}

/// bcrypt is CPU bound, so it runs off the async workers.
async fn hash_password(password: &str, cost: u32) -> AppResult<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::Internal(format!("Hashing task failed: {}", e)))?
        .map_err(AppError::from)
}

async fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("Hashing task failed: {}", e)))?
        .map_err(AppError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::memory::MemoryLedgerStore;

    fn service() -> AuthService {
        AuthService::new(
            Arc::new(MemoryLedgerStore::new()),
            TokenKeys::new("s3cret", None, chrono::Duration::hours(1)),
            crate::config::MIN_BCRYPT_COST,
        )
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let auth = service();

        let (user, token) = auth.register("alice", "hunter2").await.unwrap();
        assert_ne!(user.password_hash, "hunter2");
        assert_eq!(auth.verify_token(&token).unwrap(), user.id);

        let (same, token) = auth.login("alice", "hunter2").await.unwrap();
        assert_eq!(same.id, user.id);
        assert_eq!(auth.verify_token(&token).unwrap(), user.id);
    }

    #[tokio::test]
    async fn test_duplicate_login_rejected() {
        let auth = service();
        auth.register("alice", "hunter2").await.unwrap();

        let err = auth.register("alice", "other").await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::LoginTaken(_))));
    }

    #[tokio::test]
    async fn test_bad_credentials_rejected() {
        let auth = service();
        auth.register("alice", "hunter2").await.unwrap();

        for (login, password) in [("alice", "wrong"), ("bob", "hunter2")] {
            let err = auth.login(login, password).await.unwrap_err();
            assert!(matches!(err, AppError::Auth(AuthError::InvalidCredentials)));
        }
    }
}
