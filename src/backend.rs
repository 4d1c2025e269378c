//! Picks the store and auth provider the configuration asks for.

use std::sync::Arc;

use crate::auth::AuthProvider;
use crate::auth::firebase::FirebaseAuth;
use crate::auth::local::LocalAuth;
use crate::config::KeepUpConfig;
use crate::store::RemoteStore;
use crate::store::firebase::FirebaseStore;
use crate::store::local::LocalStore;

#[derive(Clone)]
pub struct Backend {
    pub store: Arc<dyn RemoteStore>,
    pub auth: Arc<dyn AuthProvider>,
    /// Set when talking to the realtime database, which needs the ID token.
    remote: Option<FirebaseStore>,
}

impl Backend {
    /// Firebase when a database URL is configured, otherwise the local store
    /// and accounts under the user data directory.
    pub fn from_config(config: &KeepUpConfig) -> Result<Self, String> {
        if config.is_offline() {
            let store = LocalStore::open(LocalStore::default_path())
                .map_err(|e| format!("Failed to open local store: {}", e))?;
            let auth = LocalAuth::open(LocalAuth::default_path())
                .map_err(|e| format!("Failed to open local accounts: {}", e))?;
            log::info!("Using offline backend");
            return Ok(Self::local(store, auth));
        }

        if config.api_key.trim().is_empty() {
            return Err("An API key is required to sign in to the database".into());
        }
        let store = FirebaseStore::new(config.database_url.trim())
            .map_err(|e| format!("Failed to set up database client: {}", e))?;
        let auth = FirebaseAuth::new(&config.api_key)
            .map_err(|e| format!("Failed to set up sign-in client: {}", e))?;
        log::info!("Using realtime database at {}", config.database_url.trim());
        Ok(Self {
            store: Arc::new(store.clone()),
            auth: Arc::new(auth),
            remote: Some(store),
        })
    }

    pub fn local(store: LocalStore, auth: LocalAuth) -> Self {
        Self {
            store: Arc::new(store),
            auth: Arc::new(auth),
            remote: None,
        }
    }

    pub fn is_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Hand the current ID token to the store. `None` on sign-out.
    pub fn set_token(&self, token: Option<String>) {
        if let Some(remote) = &self.remote {
            remote.set_token(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::register_user;
    use crate::store::StorePath;
    use serde_json::json;

    #[test]
    fn online_needs_api_key() {
        let config = KeepUpConfig {
            database_url: "https://demo.firebasedatabase.app".into(),
            ..Default::default()
        };
        assert!(Backend::from_config(&config).is_err());

        let config = KeepUpConfig {
            api_key: "key".into(),
            ..config
        };
        let backend = Backend::from_config(&config).unwrap();
        assert!(backend.is_remote());
    }

    #[tokio::test]
    async fn create_account_and_register_offline() {
        let backend = Backend::local(LocalStore::new(), LocalAuth::new());
        assert!(!backend.is_remote());

        let session = backend
            .auth
            .create_account("erin@example.com", "secret1")
            .await
            .unwrap();
        backend.set_token(Some(session.id_token.clone()));
        register_user(backend.store.as_ref(), &session.identity)
            .await
            .unwrap();

        let path = StorePath::parse(&format!("users/{}", session.identity.uid)).unwrap();
        assert_eq!(
            backend.store.get(&path).await.unwrap(),
            json!({ "email": "erin@example.com" })
        );
    }
}
