// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Registration, login and logout flows.

use crate::db::CredentialStore;
use crate::error::AppError;
use crate::models::{NewUser, User};
use crate::services::password::PasswordHasher;
use crate::services::session::{SessionManager, SessionToken};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Registration form / JSON body.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Registration {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(
        length(min = 3, max = 64, message = "must be between 3 and 64 characters"),
        custom(function = "validate_username")
    )]
    pub username: String,
    #[validate(length(min = 1, max = 1024, message = "must be between 1 and 1024 characters"))]
    pub password: String,
}

/// Login form / JSON body. `username` may also hold an email address.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Credentials {
    #[validate(length(min = 1, max = 320, message = "is required"))]
    pub username: String,
    #[validate(length(min = 1, max = 1024, message = "is required"))]
    pub password: String,
}

/// Usernames share a lookup with emails, so they must never look like one.
fn validate_username(username: &str) -> Result<(), ValidationError> {
    let ok = username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if ok {
        Ok(())
    } else {
        Err(ValidationError::new("username_charset")
            .with_message("may only contain letters, digits, '_', '-' and '.'".into()))
    }
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    sessions: SessionManager,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn CredentialStore>,
        hasher: PasswordHasher,
        sessions: SessionManager,
    ) -> Self {
        Self {
            users,
            hasher,
            sessions,
        }
    }

    /// Create an account. The password is hashed off the request path.
    pub async fn register(&self, registration: Registration) -> Result<User, AppError> {
        let registration = Registration {
            email: registration.email.trim().to_lowercase(),
            username: registration.username.trim().to_string(),
            password: registration.password,
        };
        registration.validate()?;

        let password_hash = self.hasher.hash_blocking(registration.password).await?;

        let user = self
            .users
            .create_user(NewUser {
                email: registration.email,
                username: registration.username,
                password_hash,
            })
            .await
            .map_err(|e| {
                if let AppError::Duplicate(field) = &e {
                    tracing::info!(field = %field, "Registration rejected: duplicate");
                }
                e
            })?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Check credentials and open a session.
    ///
    /// Unknown user and wrong password are indistinguishable to the caller,
    /// in both the error and the time taken.
    pub async fn login(&self, credentials: Credentials) -> Result<(User, SessionToken), AppError> {
        credentials.validate()?;

        let Some(user) = self.users.find_by_identifier(&credentials.username).await? else {
            self.hasher.verify_dummy_blocking(credentials.password).await;
            tracing::info!("Login failed");
            return Err(AppError::InvalidCredentials);
        };

        let matches = self
            .hasher
            .verify_blocking(credentials.password, user.password_hash.clone())
            .await;
        if !matches {
            tracing::info!(user_id = %user.id, "Login failed");
            return Err(AppError::InvalidCredentials);
        }

        let token = self.sessions.create(user.id)?;
        tracing::info!(user_id = %user.id, "Login succeeded");
        Ok((user, token))
    }

    /// End the session behind `token`. Unknown tokens are ignored.
    pub fn logout(&self, token: &str) {
        if self.sessions.invalidate(token) {
            tracing::info!("Logged out");
        }
    }

    /// The account behind an authenticated session.
    pub async fn current_user(&self, user_id: Uuid) -> Result<User, AppError> {
        self.users
            .find_user_by_id(user_id)
            .await?
            .ok_or(AppError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::MemoryDb;

    fn service() -> (AccountService, SessionManager) {
        let config = Config::default();
        let sessions = SessionManager::from_config(&config).unwrap();
        let hasher = PasswordHasher::new(config.password_work_factor).unwrap();
        (
            AccountService::new(Arc::new(MemoryDb::new()), hasher, sessions.clone()),
            sessions,
        )
    }

    fn registration(email: &str, username: &str, password: &str) -> Registration {
        Registration {
            email: email.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    fn credentials(username: &str, password: &str) -> Credentials {
        Credentials {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_stores_hash_not_plaintext() {
        let (accounts, _) = service();
        let user = accounts
            .register(registration(" Alice@Example.com ", "alice", "pw123"))
            .await
            .unwrap();

        assert_eq!(user.email, "alice@example.com");
        assert_ne!(user.password_hash, "pw123");
        assert!(user.password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let (accounts, _) = service();
        for bad in [
            registration("not-an-email", "alice", "pw123"),
            registration("a@example.com", "al", "pw123"),
            registration("a@example.com", "al@ice", "pw123"),
            registration("a@example.com", "alice", ""),
        ] {
            let err = accounts.register(bad).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "{err:?}");
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_yields_one_success() {
        let (accounts, _) = service();
        let first = accounts
            .register(registration("dup@example.com", "first", "pw"))
            .await;
        let second = accounts
            .register(registration("dup@example.com", "second", "pw"))
            .await;

        assert!(first.is_ok());
        assert!(matches!(second, Err(AppError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_login_by_username_or_email() {
        let (accounts, sessions) = service();
        let user = accounts
            .register(registration("alice@example.com", "alice", "pw123"))
            .await
            .unwrap();

        let (_, token) = accounts.login(credentials("alice", "pw123")).await.unwrap();
        assert_eq!(sessions.resolve(token.as_str()), Some(user.id));

        let (_, token) = accounts
            .login(credentials("alice@example.com", "pw123"))
            .await
            .unwrap();
        assert_eq!(sessions.resolve(token.as_str()), Some(user.id));
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let (accounts, sessions) = service();
        accounts
            .register(registration("alice@example.com", "alice", "pw123"))
            .await
            .unwrap();

        let wrong_password = accounts
            .login(credentials("alice", "wrongpw"))
            .await
            .unwrap_err();
        let unknown_user = accounts
            .login(credentials("mallory", "pw123"))
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, AppError::InvalidCredentials));
        assert!(matches!(unknown_user, AppError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
        assert!(sessions.is_empty(), "no session may be issued on failure");
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let (accounts, sessions) = service();
        accounts
            .register(registration("alice@example.com", "alice", "pw123"))
            .await
            .unwrap();
        let (_, token) = accounts.login(credentials("alice", "pw123")).await.unwrap();

        accounts.logout(token.as_str());
        accounts.logout(token.as_str());
        assert_eq!(sessions.resolve(token.as_str()), None);
    }
}
