use cosmic::cosmic_config::{self, CosmicConfigEntry, cosmic_config_derive::CosmicConfigEntry};
use serde::{Deserialize, Serialize};

use crate::core::tab::Tab;

pub const APP_ID: &str = "dev.keepup.app";
pub const CONFIG_VERSION: u64 = 1;

/// Key the keyring entry is filed under when no backend is configured.
pub const OFFLINE_BACKEND: &str = "offline";

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, CosmicConfigEntry)]
pub struct KeepUpConfig {
    /// Realtime database root, e.g. `https://<project>.firebasedatabase.app`.
    /// Empty means offline mode.
    pub database_url: String,
    /// Web API key for the authentication endpoints.
    pub api_key: String,
    /// Keep the refresh token in the keyring between runs.
    pub remember_session: bool,
    pub debug_logging: bool,
    /// Store tag of the tab shown after sign-in.
    pub start_tab: String,
}

impl Default for KeepUpConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            api_key: String::new(),
            remember_session: true,
            debug_logging: false,
            start_tab: Tab::default().as_tag().to_string(),
        }
    }
}

impl KeepUpConfig {
    pub fn is_offline(&self) -> bool {
        self.database_url.trim().is_empty()
    }

    /// Identifies the backend in the keyring so sessions for different
    /// databases do not mix.
    pub fn backend_key(&self) -> &str {
        if self.is_offline() {
            OFFLINE_BACKEND
        } else {
            self.database_url.trim()
        }
    }

    /// Unknown tags fall back to the default tab.
    pub fn start_tab(&self) -> Tab {
        Tab::from_tag(&self.start_tab).unwrap_or_default()
    }
}
