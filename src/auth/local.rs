//! Offline accounts for use without a configured backend.
//!
//! Uids are derived from the email, so the same account always maps to the
//! same data in the local store. Passwords are kept only as a fingerprint.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use super::{AuthError, AuthProvider, AuthSession, validate_credentials};
use crate::core::session::Identity;

const LOCAL_NAMESPACE: Uuid = Uuid::from_bytes([
    0x3f, 0x1c, 0x6e, 0x52, 0x8a, 0x0d, 0x4b, 0x7e, 0x9c, 0x21, 0x5d, 0xe4, 0x70, 0xb3, 0x19,
    0xa8,
]);

const TOKEN_PREFIX: &str = "local:";

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn uid_for(email: &str) -> String {
    Uuid::new_v5(&LOCAL_NAMESPACE, normalize_email(email).as_bytes())
        .simple()
        .to_string()
}

fn fingerprint(email: &str, password: &str) -> String {
    let material = format!("{}\n{}", normalize_email(email), password);
    Uuid::new_v5(&LOCAL_NAMESPACE, material.as_bytes()).to_string()
}

#[derive(Default)]
pub struct LocalAuth {
    accounts: Mutex<HashMap<String, String>>,
    file: Option<PathBuf>,
}

impl LocalAuth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accounts persisted to `path` as `{email: fingerprint}`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AuthError> {
        let path = path.into();
        let accounts = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| AuthError::Backend(format!("{}: {}", path.display(), e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(AuthError::Backend(format!("{}: {}", path.display(), e))),
        };
        Ok(Self {
            accounts: Mutex::new(accounts),
            file: Some(path),
        })
    }

    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("keepup")
            .join("accounts.json")
    }

    fn session_for(email: &str) -> AuthSession {
        let uid = uid_for(email);
        let token = format!("{}{}", TOKEN_PREFIX, uid);
        AuthSession {
            identity: Identity {
                uid,
                email: normalize_email(email),
            },
            id_token: token.clone(),
            refresh_token: token,
            expires_in: u64::MAX,
        }
    }

    fn with_accounts<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, String>) -> Result<T, AuthError>,
    ) -> Result<T, AuthError> {
        let mut accounts = self
            .accounts
            .lock()
            .map_err(|_| AuthError::Backend("account table lock poisoned".into()))?;
        f(&mut accounts)
    }

    fn save(&self, accounts: &HashMap<String, String>) -> Result<(), AuthError> {
        let Some(file) = &self.file else {
            return Ok(());
        };
        let write = || -> std::io::Result<()> {
            if let Some(parent) = file.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(file, serde_json::to_string_pretty(accounts)?)
        };
        write().map_err(|e| {
            log::error!("Failed to save local accounts: {}", e);
            AuthError::Backend(e.to_string())
        })
    }
}

#[async_trait]
impl AuthProvider for LocalAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        validate_credentials(email, password)?;
        let key = normalize_email(email);
        self.with_accounts(|accounts| match accounts.get(&key) {
            Some(stored) if *stored == fingerprint(email, password) => Ok(()),
            _ => Err(AuthError::InvalidCredentials),
        })?;
        Ok(Self::session_for(email))
    }

    async fn create_account(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AuthError> {
        validate_credentials(email, password)?;
        let key = normalize_email(email);
        self.with_accounts(|accounts| {
            if accounts.contains_key(&key) {
                return Err(AuthError::EmailExists);
            }
            accounts.insert(key.clone(), fingerprint(email, password));
            self.save(accounts)
        })?;
        log::info!("Created local account {}", key);
        Ok(Self::session_for(email))
    }

    async fn refresh(&self, email: &str, refresh_token: &str) -> Result<AuthSession, AuthError> {
        let key = normalize_email(email);
        let known = self.with_accounts(|accounts| Ok(accounts.contains_key(&key)))?;
        let expected = format!("{}{}", TOKEN_PREFIX, uid_for(email));
        if !known || refresh_token != expected {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(Self::session_for(email))
    }
}
