//! Session storage for the hvault CLI
//!
//! Holds the bearer token and the signed-in user in one JSON file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::error::{Result, VaultError};
use handout_vault_protocol::common::SessionUser;

/// Stored session information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub user: SessionUser,
    pub id_token: String,
    /// Present when the session came from the identity provider
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredSession {
    pub fn new(user: SessionUser, id_token: String) -> Self {
        let now = Utc::now();
        Self {
            user,
            id_token,
            refresh_token: None,
            expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Token is expired or will expire within `skew_secs`
    pub fn is_expired(&self, skew_secs: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= Utc::now() + chrono::Duration::seconds(skew_secs),
            None => false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TokenStoreConfig {
    pub enabled: bool,
    pub storage_path: Option<PathBuf>,
}

/// Session storage manager
#[derive(Debug)]
pub struct TokenStore {
    config: TokenStoreConfig,
    session: Option<StoredSession>,
}

impl TokenStore {
    pub fn new(config: TokenStoreConfig) -> Result<Self> {
        let mut store = Self {
            config,
            session: None,
        };

        if store.config.enabled {
            store.load_session()?;
        }

        Ok(store)
    }

    pub fn from_config(config: &crate::config::Config) -> Result<Self> {
        Self::new(TokenStoreConfig {
            enabled: config.token_storage_enabled,
            storage_path: Some(config.session_path()),
        })
    }

    pub fn store_session(&mut self, mut session: StoredSession) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }

        session.updated_at = Utc::now();
        self.session = Some(session);
        self.save_session()
    }

    pub fn get_session(&self) -> Option<StoredSession> {
        if !self.config.enabled {
            return None;
        }
        self.session.clone()
    }

    pub fn has_session(&self) -> bool {
        self.config.enabled && self.session.is_some()
    }

    /// Forget the session and delete the file
    pub fn remove_session(&mut self) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }

        self.session = None;
        let path = self.get_storage_path()?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(VaultError::io_from_error("Failed to remove session", e)),
        }
    }

    fn get_storage_path(&self) -> Result<PathBuf> {
        self.config
            .storage_path
            .clone()
            .ok_or_else(|| VaultError::invalid_input("Session storage path not configured"))
    }

    fn load_session(&mut self) -> Result<()> {
        let path = self.get_storage_path()?;

        if !path.exists() {
            return Ok(());
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| VaultError::io_from_error("Failed to read session storage", e))?;

        if content.trim().is_empty() {
            return Ok(());
        }

        match serde_json::from_str(&content) {
            Ok(session) => self.session = Some(session),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable session file");
            }
        }

        Ok(())
    }

    fn save_session(&self) -> Result<()> {
        let path = self.get_storage_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| VaultError::io_from_error("Failed to create storage directory", e))?;
        }

        let content = serde_json::to_string_pretty(&self.session)?;
        fs::write(&path, content)
            .map_err(|e| VaultError::io_from_error("Failed to write session storage", e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))
                .map_err(|e| VaultError::io_from_error("Failed to restrict session file", e))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::utils::test_helpers::*;
    use handout_vault_protocol::common::Role;

    fn store_at(path: PathBuf) -> TokenStore {
        TokenStore::new(TokenStoreConfig {
            enabled: true,
            storage_path: Some(path),
        })
        .unwrap()
    }

    #[test]
    fn test_store_and_reload_session() {
        let temp_dir = create_temp_dir();
        let path = temp_dir.path().join("session.json");

        let mut store = store_at(path.clone());
        assert!(!store.has_session());
        store
            .store_session(sample_session("alice@example.edu", Role::Teacher))
            .unwrap();

        let reloaded = store_at(path);
        let session = reloaded.get_session().unwrap();
        assert_eq!(session.user.email.as_deref(), Some("alice@example.edu"));
        assert_eq!(session.user.role, Role::Teacher);
        assert_eq!(session.id_token, "token-alice@example.edu");
    }

    #[test]
    fn test_remove_session_deletes_file() {
        let temp_dir = create_temp_dir();
        let path = temp_dir.path().join("session.json");

        let mut store = store_at(path.clone());
        store
            .store_session(sample_session("bob@example.edu", Role::Student))
            .unwrap();
        assert!(path.exists());

        store.remove_session().unwrap();
        assert!(!path.exists());
        assert!(!store.has_session());
        // Second removal is a no-op
        store.remove_session().unwrap();
    }

    #[test]
    fn test_disabled_store_is_noop() {
        let temp_dir = create_temp_dir();
        let path = temp_dir.path().join("session.json");
        let mut store = TokenStore::new(TokenStoreConfig {
            enabled: false,
            storage_path: Some(path.clone()),
        })
        .unwrap();

        store
            .store_session(sample_session("carol@example.edu", Role::Student))
            .unwrap();
        assert!(!path.exists());
        assert!(store.get_session().is_none());
    }

    #[test]
    fn test_corrupted_file_is_ignored() {
        let temp_dir = create_temp_dir();
        let path = create_temp_file_with_content(&temp_dir, "session.json", b"garbage");
        let store = store_at(path);
        assert!(!store.has_session());
    }

    #[test]
    fn test_expiry() {
        let mut session = sample_session("dave@example.edu", Role::Student);
        assert!(!session.is_expired(60));

        session.expires_at = Some(Utc::now() + chrono::Duration::seconds(30));
        assert!(session.is_expired(60));

        session.expires_at = Some(Utc::now() + chrono::Duration::hours(1));
        assert!(!session.is_expired(60));
    }
}
