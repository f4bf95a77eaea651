//! Test utilities and helpers for unit tests
//!
//! This module provides common testing utilities including:
//! - Temporary files and directories
//! - Sample sessions and API payloads
//! - Configs pointed at a local mock server

#[cfg(test)]
pub mod test_helpers {
    use std::path::PathBuf;
    use tempfile::TempDir;

    use crate::config::{Config, IdentityConfig};
    use crate::store::StoredSession;
    use handout_vault_protocol::common::{Role, SessionUser};

    /// Create a temporary directory for testing
    pub fn create_temp_dir() -> TempDir {
        tempfile::tempdir().expect("Failed to create temp dir")
    }

    /// Create a temporary file with content
    pub fn create_temp_file_with_content(dir: &TempDir, filename: &str, content: &[u8]) -> PathBuf {
        let file_path = dir.path().join(filename);
        std::fs::write(&file_path, content).expect("Failed to write temp file");
        file_path
    }

    /// Config whose API and identity endpoints all point at `base_url`
    pub fn test_config(base_url: &str, dir: &TempDir) -> Config {
        Config {
            api_base: base_url.to_string(),
            storage_dir: dir.path().join("data"),
            download_dir: Some(dir.path().to_path_buf()),
            identity: IdentityConfig {
                api_key: Some("test-key".to_string()),
                sign_in_endpoint: base_url.to_string(),
                token_endpoint: base_url.to_string(),
            },
            ..Config::default()
        }
    }

    pub fn sample_user(email: &str, role: Role) -> SessionUser {
        SessionUser {
            uid: Some(format!("uid-{}", email)),
            email: Some(email.to_string()),
            role,
        }
    }

    /// Session with a non-expiring token `token-<email>`
    pub fn sample_session(email: &str, role: Role) -> StoredSession {
        StoredSession::new(sample_user(email, role), format!("token-{}", email))
    }

    /// Version list as returned by GET /handouts/{id}/versions
    pub fn sample_versions_json() -> serde_json::Value {
        serde_json::json!([
            {
                "id": "v2",
                "version": 2,
                "file_type": "application/pdf",
                "file_size": 2048,
                "checksum": "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
                "created_at": "2024-03-02T09:00:00",
                "downloads": 5,
                "previews": 9,
                "file_path": "uploads/physics/week1-v2.pdf"
            },
            {
                "id": "v1",
                "version": 1,
                "file_type": "application/pdf",
                "file_size": 1024,
                "created_at": "2024-03-01T09:00:00",
                "file_path": "uploads/physics/week1.pdf"
            }
        ])
    }
}
