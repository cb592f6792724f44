//! Session configuration, passed in by the page as one JSON blob:
//!
//! ```json
//! {
//!   "identity": { "apiKey": "...", "authDomain": "...", "projectId": "...",
//!                 "storageBucket": "...", "messagingSenderId": "...", "appId": "..." },
//!   "sync": { "storagePrefix": "cto-simulator-game", "loadTimeoutMs": 4000,
//!             "saveDebounceMs": 1500, "logFilter": "info" }
//! }
//! ```
//!
//! Every field is optional. Without an `apiKey` the identity subsystem is
//! off and the game runs in guest mode.

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const DEFAULT_STORAGE_PREFIX: &str = "cto-simulator-game";
/// How long the remote load may take before local data is kept.
pub const DEFAULT_LOAD_TIMEOUT_MS: u64 = 4_000;
/// Quiet interval before a remote push goes out.
pub const DEFAULT_SAVE_DEBOUNCE_MS: u64 = 1_500;

/// Identity-provider settings (build-time environment values).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentityConfig {
    pub api_key: Option<String>,
    pub auth_domain: Option<String>,
    pub project_id: Option<String>,
    pub storage_bucket: Option<String>,
    pub messaging_sender_id: Option<String>,
    pub app_id: Option<String>,
}

impl IdentityConfig {
    /// Identity and remote sync are active only with a non-empty API key.
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    pub storage_prefix: String,
    pub load_timeout_ms: u64,
    pub save_debounce_ms: u64,
    /// `tracing_subscriber::EnvFilter` directive.
    pub log_filter: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            storage_prefix: DEFAULT_STORAGE_PREFIX.to_string(),
            load_timeout_ms: DEFAULT_LOAD_TIMEOUT_MS,
            save_debounce_ms: DEFAULT_SAVE_DEBOUNCE_MS,
            log_filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub identity: IdentityConfig,
    pub sync: SyncConfig,
}

impl AppConfig {
    /// Parse the page's config blob. An empty string means all defaults.
    pub fn from_json(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(raw)?)
    }

    pub fn guest_mode(&self) -> bool {
        !self.identity.is_configured()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_guest_mode_with_defaults() {
        let config = AppConfig::from_json("").unwrap();
        assert!(config.guest_mode());
        assert_eq!(config.sync.storage_prefix, "cto-simulator-game");
        assert_eq!(config.sync.load_timeout_ms, 4_000);
        assert_eq!(config.sync.save_debounce_ms, 1_500);
    }

    #[test]
    fn api_key_enables_identity() {
        let config = AppConfig::from_json(r#"{"identity": {"apiKey": "k", "projectId": "cto"}}"#).unwrap();
        assert!(!config.guest_mode());
        assert_eq!(config.identity.project_id.as_deref(), Some("cto"));
    }

    #[test]
    fn blank_api_key_stays_guest() {
        let config = AppConfig::from_json(r#"{"identity": {"apiKey": "  "}}"#).unwrap();
        assert!(config.guest_mode());
    }

    #[test]
    fn partial_sync_overrides_keep_other_defaults() {
        let config = AppConfig::from_json(r#"{"sync": {"loadTimeoutMs": 250}}"#).unwrap();
        assert_eq!(config.sync.load_timeout_ms, 250);
        assert_eq!(config.sync.save_debounce_ms, 1_500);
        assert_eq!(config.sync.log_filter, "info");
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(AppConfig::from_json("{nope").is_err());
    }
}
