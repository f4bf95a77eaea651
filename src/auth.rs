//! Sign-in, session lookup and logout

use chrono::{DateTime, Duration, Utc};
use dialoguer::{theme::ColorfulTheme, Input, Password};
use std::sync::Arc;

use crate::client::{ApiClient, BaseClient, HttpClient};
use crate::config::Config;
use crate::error::{Result, VaultError};
use crate::store::{StoredSession, TokenStore};
use crate::ui::UI;
use crate::version::format_version_info;
use crate::LoginArgs;
use handout_vault_protocol::api::{
    IdentityErrorResponse, MeResponse, ProtectedResponse, SecureTokenRefreshRequest,
    SecureTokenRefreshResponse, SignInWithPasswordRequest, SignInWithPasswordResponse,
};
use handout_vault_protocol::common::{Role, SessionUser};

/// Tokens issued by the identity provider
#[derive(Debug, Clone)]
pub struct IdentityTokens {
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub uid: Option<String>,
    pub email: Option<String>,
}

fn expiry_from(expires_in: &str) -> DateTime<Utc> {
    let seconds = expires_in.trim().parse::<i64>().unwrap_or(3600);
    Utc::now() + Duration::seconds(seconds)
}

/// Client for the managed identity provider
#[derive(Debug, Clone)]
pub struct IdentityClient {
    base_client: BaseClient,
}

impl IdentityClient {
    pub fn new(base_client: BaseClient) -> Self {
        Self { base_client }
    }

    fn api_key(&self) -> Result<&str> {
        self.base_client
            .config()
            .identity
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                VaultError::config(
                    "Identity provider key not configured. Run `hvault config set-identity-key <KEY>` or use `hvault login --token`.",
                )
            })
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<IdentityTokens> {
        let identity = &self.base_client.config().identity;
        let url = format!(
            "{}/accounts:signInWithPassword?key={}",
            identity.sign_in_endpoint.trim_end_matches('/'),
            urlencoding::encode(self.api_key()?)
        );
        let request = SignInWithPasswordRequest {
            email: email.to_string(),
            password: password.to_string(),
            return_secure_token: true,
        };

        tracing::debug!(email, "signing in with identity provider");
        let (status, body) = self.base_client.post_json_raw(&url, &request).await?;
        if status.is_server_error() {
            return Err(VaultError::api(status.as_u16(), "Identity provider unavailable"));
        }
        if !status.is_success() {
            return Err(map_identity_error(&body));
        }

        let response: SignInWithPasswordResponse = serde_json::from_str(&body).map_err(|e| {
            VaultError::invalid_response(format!("Invalid sign-in response: {}", e))
        })?;

        Ok(IdentityTokens {
            expires_at: expiry_from(&response.expires_in),
            id_token: response.id_token,
            refresh_token: response.refresh_token,
            uid: Some(response.local_id),
            email: response.email.or_else(|| Some(email.to_string())),
        })
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<IdentityTokens> {
        let identity = &self.base_client.config().identity;
        let url = format!(
            "{}/token?key={}",
            identity.token_endpoint.trim_end_matches('/'),
            urlencoding::encode(self.api_key()?)
        );
        let request = SecureTokenRefreshRequest::new(refresh_token);

        let (status, body) = self.base_client.post_json_raw(&url, &request).await?;
        if status.is_server_error() {
            return Err(VaultError::api(status.as_u16(), "Identity provider unavailable"));
        }
        if !status.is_success() {
            return Err(map_identity_error(&body));
        }

        let response: SecureTokenRefreshResponse = serde_json::from_str(&body).map_err(|e| {
            VaultError::invalid_response(format!("Invalid token refresh response: {}", e))
        })?;

        Ok(IdentityTokens {
            expires_at: expiry_from(&response.expires_in),
            id_token: response.id_token,
            refresh_token: response.refresh_token,
            uid: response.user_id,
            email: None,
        })
    }
}

/// Translate identity provider error codes into user-facing messages
fn map_identity_error(body: &str) -> VaultError {
    let message = serde_json::from_str::<IdentityErrorResponse>(body)
        .map(|r| r.error.message)
        .unwrap_or_default();
    // Provider messages look like "INVALID_PASSWORD : extra detail"
    let code = message.split(':').next().unwrap_or_default().trim();

    match code {
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
            VaultError::authentication("Invalid email or password")
        }
        "USER_DISABLED" => VaultError::authorization("This account has been disabled"),
        "TOO_MANY_ATTEMPTS_TRY_LATER" => {
            VaultError::authentication("Too many failed attempts, try again later")
        }
        "TOKEN_EXPIRED" | "INVALID_REFRESH_TOKEN" | "USER_NOT_FOUND" => {
            VaultError::token_expired("Session expired. Run `hvault login` again.")
        }
        "" => VaultError::authentication("Sign-in failed"),
        other => VaultError::authentication(format!("Sign-in failed: {}", other)),
    }
}

/// Result of `hvault status`
#[derive(Debug, Clone)]
pub struct StatusInfo {
    pub version: String,
    pub authenticated: bool,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub api_base: String,
    pub server_connected: bool,
    pub server_status_msg: String,
}

/// Authentication service for CLI commands
pub struct AuthService {
    config: Config,
    ui: UI,
}

impl AuthService {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            ui: UI::new(),
        }
    }

    /// Interactive login; prompts for whatever the arguments leave out
    pub async fn login(&self, args: LoginArgs) -> Result<(SessionUser, Arc<HttpClient>)> {
        let user = if let Some(token) = args.token {
            self.login_with_token(token.trim()).await?
        } else {
            let email = match args.email {
                Some(email) => email,
                None => Input::<String>::with_theme(&ColorfulTheme::default())
                    .with_prompt("Email")
                    .interact_text()?,
            };
            let password = Password::with_theme(&ColorfulTheme::default())
                .with_prompt("Password")
                .interact()?;
            self.login_with_password(email.trim(), &password).await?
        };

        self.ui.success(&format!(
            "Logged in as {} ({})",
            user.email.as_deref().unwrap_or("unknown user"),
            user.role
        ));

        let client = Arc::new(HttpClient::new(self.config.clone())?);
        Ok((user, client))
    }

    /// Sign in through the identity provider and persist the session
    pub async fn login_with_password(&self, email: &str, password: &str) -> Result<SessionUser> {
        if email.is_empty() || password.is_empty() {
            return Err(VaultError::validation("Fill all fields"));
        }

        let base_client = BaseClient::new(self.config.clone())?;
        let tokens = IdentityClient::new(base_client.clone())
            .sign_in_with_password(email, password)
            .await?;

        let user = self
            .resolve_user(&base_client, &tokens.id_token, tokens.uid, tokens.email)
            .await;

        let mut session = StoredSession::new(user.clone(), tokens.id_token);
        session.refresh_token = Some(tokens.refresh_token);
        session.expires_at = Some(tokens.expires_at);
        TokenStore::from_config(&self.config)?.store_session(session)?;

        tracing::info!(email, role = %user.role, "signed in");
        Ok(user)
    }

    /// Store an externally issued bearer token after the server accepts it
    pub async fn login_with_token(&self, token: &str) -> Result<SessionUser> {
        if token.is_empty() {
            return Err(VaultError::validation_field("Token cannot be empty", "token"));
        }

        let base_client = BaseClient::new(self.config.clone())?;
        let _: ProtectedResponse = base_client
            .get_with_bearer("/protected", Some(token))
            .await
            .map_err(|e| match e {
                VaultError::Authentication { .. } | VaultError::Authorization { .. } => {
                    VaultError::authentication("Token rejected by server")
                }
                other => other,
            })?;

        let user = self.resolve_user(&base_client, token, None, None).await;
        TokenStore::from_config(&self.config)?
            .store_session(StoredSession::new(user.clone(), token.to_string()))?;

        tracing::info!(role = %user.role, "stored bearer token");
        Ok(user)
    }

    /// Role and identity from GET /auth/me; any failure means student
    async fn resolve_user(
        &self,
        base_client: &BaseClient,
        token: &str,
        uid: Option<String>,
        email: Option<String>,
    ) -> SessionUser {
        match base_client
            .get_with_bearer::<MeResponse>("/auth/me", Some(token))
            .await
        {
            Ok(me) if me.authenticated => SessionUser {
                role: me.role(),
                uid: me.uid.or(uid),
                email: me.email.or(email),
            },
            Ok(_) => {
                tracing::warn!("role lookup did not accept the token, defaulting to student");
                SessionUser {
                    uid,
                    email,
                    role: Role::Student,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "role lookup failed, defaulting to student");
                SessionUser {
                    uid,
                    email,
                    role: Role::Student,
                }
            }
        }
    }

    pub async fn logout(&self) -> Result<()> {
        let mut store = TokenStore::from_config(&self.config)?;
        if !store.has_session() {
            self.ui.info("Not logged in");
            return Ok(());
        }

        store.remove_session()?;
        self.ui.success("Logged out");
        Ok(())
    }

    pub async fn get_status(&self) -> Result<StatusInfo> {
        let client = HttpClient::new(self.config.clone())?;

        let mut info = StatusInfo {
            version: format_version_info(),
            authenticated: client.is_authenticated(),
            email: None,
            role: None,
            api_base: self.config.api_base.clone(),
            server_connected: false,
            server_status_msg: String::new(),
        };

        let probe = if info.authenticated {
            client
                .get_json::<ProtectedResponse>("/protected")
                .await
                .map(|_| ())
        } else {
            client
                .base_client()
                .get_with_bearer::<serde_json::Value>("/protected", None)
                .await
                .map(|_| ())
        };

        match probe {
            Ok(()) => info.server_connected = true,
            Err(e) if e.is_network_error() => {
                info.server_status_msg = e.to_string();
            }
            Err(e) => {
                // The server answered; an auth failure here only concerns the session
                info.server_connected = true;
                if info.authenticated && e.is_auth_error() {
                    tracing::debug!(error = %e, "stored session rejected");
                    info.server_status_msg = "session rejected".to_string();
                }
            }
        }

        // A rejected session is cleared by the client
        info.authenticated = client.is_authenticated();
        if let Some(user) = client.current_user() {
            info.email = user.email;
            info.role = Some(user.role);
        }

        Ok(info)
    }

    /// Client bound to the stored session; fails when nobody is logged in
    pub async fn get_authenticated_client(&self) -> Result<Arc<HttpClient>> {
        let client = HttpClient::new(self.config.clone())?;
        if !client.is_authenticated() {
            return Err(VaultError::not_logged_in());
        }
        Ok(Arc::new(client))
    }
}
