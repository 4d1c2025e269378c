//! Sign-in, account creation and token refresh.

pub mod firebase;
pub mod keyring;
pub mod local;

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;

use crate::core::session::Identity;
use crate::store::{Collection, RemoteStore, StoreError, StorePath};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

/// The backend refuses shorter passwords.
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("wrong email or password")]
    InvalidCredentials,
    #[error("an account with this email already exists")]
    EmailExists,
    #[error("password must be at least 6 characters")]
    WeakPassword,
    #[error("not a valid email address")]
    InvalidEmail,
    #[error("too many attempts, try again later")]
    TooManyAttempts,
    #[error("network error: {0}")]
    Network(String),
    #[error("authentication service error: {0}")]
    Backend(String),
}

impl AuthError {
    /// Failures after which the login page offers to create the account.
    pub fn offers_account_creation(&self) -> bool {
        matches!(self, Self::InvalidCredentials)
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Network(msg) => Self::Network(msg),
            other => Self::Backend(other.to_string()),
        }
    }
}

/// Result of a successful sign-in, account creation or refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub identity: Identity,
    pub id_token: String,
    pub refresh_token: String,
    /// Seconds until `id_token` expires.
    pub expires_in: u64,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;

    async fn create_account(&self, email: &str, password: &str)
    -> Result<AuthSession, AuthError>;

    /// Exchange a refresh token for a fresh ID token. The token endpoint
    /// does not echo the email, so the caller passes the one it knows.
    async fn refresh(&self, email: &str, refresh_token: &str) -> Result<AuthSession, AuthError>;
}

/// Local shape check run before any request.
pub fn validate_credentials(email: &str, password: &str) -> Result<(), AuthError> {
    if !EMAIL_RE.is_match(email.trim()) {
        return Err(AuthError::InvalidEmail);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword);
    }
    Ok(())
}

/// Write the `users/{uid}` record kept for every account.
pub async fn register_user(store: &dyn RemoteStore, identity: &Identity) -> Result<(), StoreError> {
    let path = StorePath::collection(Collection::Users, &identity.uid)?;
    store.set(&path, json!({ "email": identity.email })).await?;
    log::info!("Registered user record for {}", identity.email);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::local::LocalStore;

    #[test]
    fn validates_before_any_request() {
        assert_eq!(validate_credentials("alice@example.com", "hunter22"), Ok(()));
        assert_eq!(
            validate_credentials("alice@", "hunter22"),
            Err(AuthError::InvalidEmail)
        );
        assert_eq!(
            validate_credentials("no spaces@x.io", "hunter22"),
            Err(AuthError::InvalidEmail)
        );
        assert_eq!(
            validate_credentials("alice@example.com", "12345"),
            Err(AuthError::WeakPassword)
        );
    }

    #[test]
    fn only_bad_credentials_offer_creation() {
        assert!(AuthError::InvalidCredentials.offers_account_creation());
        assert!(!AuthError::TooManyAttempts.offers_account_creation());
        assert!(!AuthError::Network("down".into()).offers_account_creation());
    }

    #[tokio::test]
    async fn register_writes_user_record() {
        let store = LocalStore::new();
        let identity = Identity {
            uid: "alice".into(),
            email: "alice@example.com".into(),
        };
        register_user(&store, &identity).await.unwrap();
        let path = StorePath::parse("users/alice").unwrap();
        assert_eq!(
            store.get(&path).await.unwrap(),
            json!({ "email": "alice@example.com" })
        );
    }
}
