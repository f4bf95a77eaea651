//! Authentication API DTOs
//!
//! This module contains data transfer objects for session lookup on the
//! Handout Vault API and for the managed identity provider used to sign in.

use serde::{Deserialize, Serialize};

pub use crate::common::{Role, SessionUser};

// ============================================================================
// Session Lookup DTOs
// ============================================================================

/// Response for GET /auth/me
///
/// The server echoes token claims; only the fields below are used.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeResponse {
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "user_id", alias = "sub")]
    pub uid: Option<String>,
}

impl MeResponse {
    /// Role claim, falling back to student when the server omits it
    pub fn role(&self) -> Role {
        self.role.clone().map(Role::from).unwrap_or_default()
    }
}

/// Response for GET /protected
#[derive(Debug, Clone, Deserialize)]
pub struct ProtectedResponse {
    #[serde(default)]
    pub message: Option<String>,
}

// ============================================================================
// Identity Provider DTOs
// ============================================================================

/// Email/password sign-in request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInWithPasswordRequest {
    pub email: String,
    pub password: String,
    pub return_secure_token: bool,
}

/// Email/password sign-in response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInWithPasswordResponse {
    pub id_token: String,
    pub refresh_token: String,
    /// Lifetime of `id_token` in seconds, encoded as a string
    pub expires_in: String,
    #[serde(default)]
    pub email: Option<String>,
    pub local_id: String,
}

/// Refresh token exchange request
#[derive(Debug, Clone, Serialize)]
pub struct SecureTokenRefreshRequest {
    pub grant_type: String,
    pub refresh_token: String,
}

impl SecureTokenRefreshRequest {
    pub fn new(refresh_token: impl Into<String>) -> Self {
        Self {
            grant_type: "refresh_token".to_string(),
            refresh_token: refresh_token.into(),
        }
    }
}

/// Refresh token exchange response
#[derive(Debug, Clone, Deserialize)]
pub struct SecureTokenRefreshResponse {
    pub id_token: String,
    pub refresh_token: String,
    pub expires_in: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Error envelope returned by the identity provider
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityErrorResponse {
    pub error: IdentityError,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityError {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
}
