//! HTTP client implementations for the Handout Vault API

use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use crate::auth::IdentityClient;
use crate::config::Config;
use crate::error::{Result, VaultError};
use crate::store::{StoredSession, TokenStore};
use crate::version::CURRENT_VERSION;
use handout_vault_protocol::api::ApiErrorBody;
use handout_vault_protocol::common::SessionUser;

/// Seconds before expiry at which a token is refreshed
const TOKEN_REFRESH_SKEW_SECS: i64 = 60;

/// Transfer progress callback, called with `(bytes_done, bytes_total)`
pub type Progress = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Progress callback that ignores updates
pub fn no_progress() -> Progress {
    Arc::new(|_: u64, _: u64| {})
}

/// Multipart upload form for POST /handouts/upload
#[derive(Debug, Clone)]
pub struct UploadForm {
    pub subject: String,
    pub title: String,
    pub file_path: PathBuf,
}

/// Operations the CLI services need from the API
#[allow(async_fn_in_trait)]
pub trait ApiClient {
    fn is_authenticated(&self) -> bool;

    fn current_user(&self) -> Option<SessionUser>;

    fn config(&self) -> &Config;

    /// Authenticated GET decoded as JSON
    async fn get_json<R>(&self, endpoint: &str) -> Result<R>
    where
        R: DeserializeOwned + Send + 'static;

    /// Authenticated GET streamed into `dest`; returns the number of bytes written
    async fn download_to(&self, endpoint: &str, dest: &Path, progress: Progress) -> Result<u64>;

    /// Authenticated multipart POST with the file part streamed from disk
    async fn upload_multipart<R>(
        &self,
        endpoint: &str,
        form: &UploadForm,
        progress: Progress,
    ) -> Result<R>
    where
        R: DeserializeOwned + Send + 'static;
}

/// Map a non-success response to an error, using the server's `detail` text when present
pub(crate) fn error_for_status(status: StatusCode, body: &str, resource: &str) -> VaultError {
    let detail = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(ApiErrorBody::into_message);

    match status {
        StatusCode::UNAUTHORIZED => VaultError::authentication(format!(
            "{}. Run `hvault login` again.",
            detail.unwrap_or_else(|| "Session rejected by server".to_string())
        )),
        StatusCode::FORBIDDEN => VaultError::authorization(
            detail.unwrap_or_else(|| "Insufficient permissions".to_string()),
        ),
        StatusCode::NOT_FOUND => VaultError::not_found(detail.unwrap_or_else(|| resource.to_string())),
        _ => VaultError::api(
            status.as_u16(),
            detail.unwrap_or_else(|| {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    "Unknown API error".to_string()
                } else {
                    trimmed.chars().take(200).collect()
                }
            }),
        ),
    }
}

fn decode_json<R: DeserializeOwned>(body: &str) -> Result<R> {
    serde_json::from_str(body)
        .map_err(|e| VaultError::invalid_response(format!("Invalid API response: {}", e)))
}

/// Base HTTP client for unauthenticated or explicitly authenticated calls
#[derive(Debug, Clone)]
pub struct BaseClient {
    pub(crate) client: Client,
    config: Config,
}

impl BaseClient {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .user_agent(format!("hvault/{}", CURRENT_VERSION))
            .build()?;

        Ok(Self { client, config })
    }

    /// GET an API path, optionally with a bearer token
    pub async fn get_with_bearer<R>(&self, endpoint: &str, bearer_token: Option<&str>) -> Result<R>
    where
        R: DeserializeOwned,
    {
        let url = self.config.endpoint_url(endpoint);
        tracing::debug!(%url, "GET");

        let mut request_builder = self.client.get(&url);
        if let Some(token) = bearer_token {
            request_builder = request_builder.bearer_auth(token);
        }

        let response = request_builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(error_for_status(status, &body, endpoint));
        }
        decode_json(&body)
    }

    /// POST JSON to an absolute URL and return the raw status and body
    pub async fn post_json_raw<T>(&self, url: &str, payload: &T) -> Result<(StatusCode, String)>
    where
        T: Serialize + ?Sized,
    {
        let response = self.client.post(url).json(payload).send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// HTTP client carrying the stored session
#[derive(Debug)]
pub struct HttpClient {
    base_client: BaseClient,
    identity: IdentityClient,
    store: Mutex<TokenStore>,
    session: Mutex<Option<StoredSession>>,
}

impl HttpClient {
    pub fn new(config: Config) -> Result<Self> {
        let store = TokenStore::from_config(&config)?;
        Self::with_store(config, store)
    }

    pub fn with_store(config: Config, store: TokenStore) -> Result<Self> {
        let base_client = BaseClient::new(config)?;
        let identity = IdentityClient::new(base_client.clone());
        let session = store.get_session();

        Ok(Self {
            base_client,
            identity,
            store: Mutex::new(store),
            session: Mutex::new(session),
        })
    }

    fn session_snapshot(&self) -> Option<StoredSession> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace_session(&self, session: StoredSession) -> Result<()> {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .store_session(session.clone())?;
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(session);
        Ok(())
    }

    /// Drop the session in memory and on disk
    pub fn clear_session(&self) {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = None;
        if let Err(e) = self
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove_session()
        {
            tracing::warn!(error = %e, "failed to remove stored session");
        }
    }

    /// Current bearer token, refreshed through the identity provider when close to expiry
    async fn access_token(&self) -> Result<String> {
        let session = self.session_snapshot().ok_or_else(VaultError::not_logged_in)?;

        if !session.is_expired(TOKEN_REFRESH_SKEW_SECS) {
            return Ok(session.id_token);
        }

        let Some(refresh_token) = session.refresh_token.clone() else {
            self.clear_session();
            return Err(VaultError::token_expired(
                "Session expired. Run `hvault login` again.",
            ));
        };

        tracing::debug!("refreshing expired id token");
        let refreshed = match self.identity.refresh(&refresh_token).await {
            Ok(refreshed) => refreshed,
            Err(e) => {
                // Only a rejected refresh token ends the session
                if e.is_auth_error() {
                    self.clear_session();
                }
                return Err(e);
            }
        };

        let mut updated = session;
        updated.id_token = refreshed.id_token.clone();
        updated.refresh_token = Some(refreshed.refresh_token);
        updated.expires_at = Some(refreshed.expires_at);
        self.replace_session(updated)?;

        Ok(refreshed.id_token)
    }

    /// Turn an error response into an error, clearing the session on 401
    fn reject(&self, status: StatusCode, body: &str, endpoint: &str) -> VaultError {
        if status == StatusCode::UNAUTHORIZED {
            tracing::debug!(endpoint, "server rejected session, clearing it");
            self.clear_session();
        }
        error_for_status(status, body, endpoint)
    }

    pub fn base_client(&self) -> &BaseClient {
        &self.base_client
    }
}

impl ApiClient for HttpClient {
    fn is_authenticated(&self) -> bool {
        self.session_snapshot().is_some()
    }

    fn current_user(&self) -> Option<SessionUser> {
        self.session_snapshot().map(|s| s.user)
    }

    fn config(&self) -> &Config {
        self.base_client.config()
    }

    async fn get_json<R>(&self, endpoint: &str) -> Result<R>
    where
        R: DeserializeOwned + Send + 'static,
    {
        let access_token = self.access_token().await?;
        let url = self.base_client.config().endpoint_url(endpoint);
        tracing::debug!(%url, "GET");

        let response = self
            .base_client
            .client
            .get(&url)
            .bearer_auth(&access_token)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(self.reject(status, &body, endpoint));
        }
        decode_json(&body)
    }

    async fn download_to(&self, endpoint: &str, dest: &Path, progress: Progress) -> Result<u64> {
        let access_token = self.access_token().await?;
        let url = self.base_client.config().endpoint_url(endpoint);
        tracing::debug!(%url, dest = %dest.display(), "download");

        let response = self
            .base_client
            .client
            .get(&url)
            .bearer_auth(&access_token)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.reject(status, &body, endpoint));
        }

        // The destination is only replaced once the whole body has arrived
        let partial = partial_path(dest);
        let result = write_body(response, &partial, progress).await;
        let written = match result {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(e);
            }
        };

        if let Err(e) = tokio::fs::rename(&partial, dest).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(VaultError::io_from_error("Failed to move download into place", e));
        }
        Ok(written)
    }

    async fn upload_multipart<R>(
        &self,
        endpoint: &str,
        form: &UploadForm,
        progress: Progress,
    ) -> Result<R>
    where
        R: DeserializeOwned + Send + 'static,
    {
        let access_token = self.access_token().await?;
        let url = self.base_client.config().endpoint_url(endpoint);

        let file = tokio::fs::File::open(&form.file_path)
            .await
            .map_err(|e| VaultError::io_from_error("Failed to open upload file", e))?;
        let total = file.metadata().await?.len();
        let file_name = crate::utils::file_name_from_path(&form.file_path.to_string_lossy())
            .unwrap_or_else(|| "upload".to_string());
        tracing::debug!(%url, file = %file_name, bytes = total, "upload");

        let mut sent = 0u64;
        let body_stream = ReaderStream::new(file).map(move |chunk| {
            if let Ok(bytes) = &chunk {
                sent += bytes.len() as u64;
                progress(sent, total);
            }
            chunk
        });

        let file_part = Part::stream_with_length(Body::wrap_stream(body_stream), total)
            .file_name(file_name)
            .mime_str(crate::utils::content_type_for(&form.file_path))?;

        let multipart = Form::new()
            .text("subject", form.subject.clone())
            .text("title", form.title.clone())
            .part("file", file_part);

        let response = self
            .base_client
            .client
            .post(&url)
            .bearer_auth(&access_token)
            .multipart(multipart)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(self.reject(status, &body, endpoint));
        }
        if body.trim().is_empty() {
            return decode_json("{}");
        }
        decode_json(&body)
    }
}

/// `<dest>.part`, next to the destination
fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

async fn write_body(response: reqwest::Response, path: &Path, progress: Progress) -> Result<u64> {
    let total = response.content_length().unwrap_or(0);
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| VaultError::io_from_error("Failed to create output file", e))?;

    let mut written = 0u64;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk =
            chunk.map_err(|e| VaultError::download(format!("Transfer interrupted: {}", e)))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| VaultError::io_from_error("Failed to write output file", e))?;
        written += chunk.len() as u64;
        progress(written, total.max(written));
    }
    file.flush().await?;

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::utils::test_helpers::*;
    use handout_vault_protocol::api::{ListSubjectsResponse, UploadHandoutResponse};
    use handout_vault_protocol::common::Role;
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_with_session(
        server: &MockServer,
        temp_dir: &tempfile::TempDir,
        session: Option<StoredSession>,
    ) -> HttpClient {
        let config = test_config(&server.uri(), temp_dir);
        let mut store = TokenStore::from_config(&config).unwrap();
        if let Some(session) = session {
            store.store_session(session).unwrap();
        }
        HttpClient::with_store(config, store).unwrap()
    }

    #[tokio::test]
    async fn test_get_json_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/handouts/subjects"))
            .and(header("Authorization", "Bearer token-alice@example.edu"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "Physics", "count": 3}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let temp_dir = create_temp_dir();
        let client = client_with_session(
            &server,
            &temp_dir,
            Some(sample_session("alice@example.edu", Role::Student)),
        );

        let subjects: ListSubjectsResponse = client.get_json("/handouts/subjects").await.unwrap();
        assert_eq!(subjects.len(), 1);
        assert_eq!(subjects[0].id, "Physics");
        assert_eq!(subjects[0].count, 3);
    }

    #[tokio::test]
    async fn test_missing_session_refuses_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let temp_dir = create_temp_dir();
        let client = client_with_session(&server, &temp_dir, None);

        assert!(!client.is_authenticated());
        let err = client
            .get_json::<ListSubjectsResponse>("/handouts/subjects")
            .await
            .unwrap_err();
        assert!(err.is_auth_error());
        assert!(err.to_string().contains("hvault login"));
    }

    #[tokio::test]
    async fn test_unauthorized_clears_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/handouts/subjects"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"detail": "Invalid token"})),
            )
            .mount(&server)
            .await;

        let temp_dir = create_temp_dir();
        let client = client_with_session(
            &server,
            &temp_dir,
            Some(sample_session("alice@example.edu", Role::Student)),
        );
        let session_file = client.config().session_path();
        assert!(session_file.exists());

        let err = client
            .get_json::<ListSubjectsResponse>("/handouts/subjects")
            .await
            .unwrap_err();
        assert!(err.is_auth_error());
        assert!(err.to_string().contains("Invalid token"));
        assert!(!client.is_authenticated());
        assert!(!session_file.exists());
    }

    #[tokio::test]
    async fn test_server_error_uses_detail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/handouts/h1/versions"))
            .respond_with(
                ResponseTemplate::new(403).set_body_json(json!({"detail": "Not authorized"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/handouts/h2/versions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let temp_dir = create_temp_dir();
        let client = client_with_session(
            &server,
            &temp_dir,
            Some(sample_session("alice@example.edu", Role::Student)),
        );

        let forbidden = client
            .get_json::<serde_json::Value>("/handouts/h1/versions")
            .await
            .unwrap_err();
        assert!(matches!(forbidden, VaultError::Authorization { .. }));
        assert!(forbidden.to_string().contains("Not authorized"));
        // 403 keeps the session
        assert!(client.is_authenticated());

        let failed = client
            .get_json::<serde_json::Value>("/handouts/h2/versions")
            .await
            .unwrap_err();
        assert!(matches!(failed, VaultError::Api { status: 500, .. }));
        assert!(failed.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_download_streams_to_file() {
        let server = MockServer::start().await;
        let payload = vec![7u8; 64 * 1024];
        Mock::given(method("GET"))
            .and(path("/handouts/h1/versions/v1/download"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.clone()))
            .mount(&server)
            .await;

        let temp_dir = create_temp_dir();
        let client = client_with_session(
            &server,
            &temp_dir,
            Some(sample_session("alice@example.edu", Role::Student)),
        );

        let last = Arc::new(AtomicU64::new(0));
        let seen = last.clone();
        let progress: Progress = Arc::new(move |done: u64, _total: u64| seen.store(done, Ordering::SeqCst));

        let dest = temp_dir.path().join("notes.pdf");
        let written = client
            .download_to("/handouts/h1/versions/v1/download", &dest, progress)
            .await
            .unwrap();

        assert_eq!(written, payload.len() as u64);
        assert_eq!(last.load(Ordering::SeqCst), payload.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), payload);
    }

    #[tokio::test]
    async fn test_download_replaces_existing_file_without_leftovers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/handouts/h1/versions/v2/download"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new copy".to_vec()))
            .mount(&server)
            .await;

        let temp_dir = create_temp_dir();
        let client = client_with_session(
            &server,
            &temp_dir,
            Some(sample_session("alice@example.edu", Role::Student)),
        );
        let dest = create_temp_file_with_content(&temp_dir, "notes.pdf", b"old copy");

        client
            .download_to("/handouts/h1/versions/v2/download", &dest, no_progress())
            .await
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"new copy");
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_failed_download_keeps_previous_copy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/handouts/h1/versions/v2/download"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new copy".to_vec()))
            .mount(&server)
            .await;

        let temp_dir = create_temp_dir();
        let client = client_with_session(
            &server,
            &temp_dir,
            Some(sample_session("alice@example.edu", Role::Student)),
        );
        let dest = create_temp_file_with_content(&temp_dir, "notes.pdf", b"old copy");
        // A directory in the way makes the partial file impossible to write
        std::fs::create_dir(partial_path(&dest)).unwrap();

        let err = client
            .download_to("/handouts/h1/versions/v2/download", &dest, no_progress())
            .await
            .unwrap_err();

        assert!(matches!(err, VaultError::Io { .. }));
        assert_eq!(std::fs::read(&dest).unwrap(), b"old copy");
    }

    #[test]
    fn test_partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/tmp/notes.pdf")),
            PathBuf::from("/tmp/notes.pdf.part")
        );
    }

    #[tokio::test]
    async fn test_download_not_found_leaves_no_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/handouts/h1/versions/v9/download"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"detail": "Version not found"})),
            )
            .mount(&server)
            .await;

        let temp_dir = create_temp_dir();
        let client = client_with_session(
            &server,
            &temp_dir,
            Some(sample_session("alice@example.edu", Role::Student)),
        );

        let dest = temp_dir.path().join("missing.pdf");
        let err = client
            .download_to("/handouts/h1/versions/v9/download", &dest, no_progress())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Version not found"));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_upload_multipart_reports_progress() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/handouts/upload"))
            .and(header("Authorization", "Bearer token-alice@example.edu"))
            .and(body_string_contains("name=\"subject\""))
            .and(body_string_contains("Physics"))
            .and(body_string_contains("name=\"title\""))
            .and(body_string_contains("filename=\"week1.pdf\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "h1",
                "title": "Week 1",
                "versions": [{"id": "v1", "version_number": 1, "size": 11}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let temp_dir = create_temp_dir();
        let file_path = create_temp_file_with_content(&temp_dir, "week1.pdf", b"hello world");
        let client = client_with_session(
            &server,
            &temp_dir,
            Some(sample_session("alice@example.edu", Role::Teacher)),
        );

        let last = Arc::new(AtomicU64::new(0));
        let seen = last.clone();
        let progress: Progress = Arc::new(move |sent: u64, total: u64| {
            assert_eq!(total, 11);
            seen.store(sent, Ordering::SeqCst);
        });

        let form = UploadForm {
            subject: "Physics".to_string(),
            title: "Week 1".to_string(),
            file_path,
        };
        let response: UploadHandoutResponse = client
            .upload_multipart("/handouts/upload", &form, progress)
            .await
            .unwrap();

        assert_eq!(response.id.as_deref(), Some("h1"));
        assert_eq!(response.latest_version(), Some(1));
        assert_eq!(last.load(Ordering::SeqCst), 11);
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id_token": "fresh-token",
                "refresh_token": "fresh-refresh",
                "expires_in": "3600",
                "user_id": "uid-1"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/handouts/subjects"))
            .and(header("Authorization", "Bearer fresh-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let temp_dir = create_temp_dir();
        let mut session = sample_session("alice@example.edu", Role::Student);
        session.refresh_token = Some("old-refresh".to_string());
        session.expires_at = Some(chrono::Utc::now() - chrono::Duration::minutes(5));

        let client = client_with_session(&server, &temp_dir, Some(session));
        let subjects: ListSubjectsResponse = client.get_json("/handouts/subjects").await.unwrap();
        assert!(subjects.is_empty());

        let stored = TokenStore::from_config(client.config())
            .unwrap()
            .get_session()
            .unwrap();
        assert_eq!(stored.id_token, "fresh-token");
        assert_eq!(stored.refresh_token.as_deref(), Some("fresh-refresh"));
    }

    #[tokio::test]
    async fn test_expired_token_without_refresh_clears_session() {
        let server = MockServer::start().await;
        let temp_dir = create_temp_dir();
        let mut session = sample_session("alice@example.edu", Role::Student);
        session.expires_at = Some(chrono::Utc::now() - chrono::Duration::minutes(5));

        let client = client_with_session(&server, &temp_dir, Some(session));
        let err = client
            .get_json::<ListSubjectsResponse>("/handouts/subjects")
            .await
            .unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::TokenExpired);
        assert!(!client.is_authenticated());
    }

    fn expired_session_with_refresh() -> StoredSession {
        let mut session = sample_session("alice@example.edu", Role::Student);
        session.refresh_token = Some("old-refresh".to_string());
        session.expires_at = Some(chrono::Utc::now() - chrono::Duration::minutes(5));
        session
    }

    #[tokio::test]
    async fn test_refresh_unreachable_keeps_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let temp_dir = create_temp_dir();
        let mut config = test_config(&server.uri(), &temp_dir);
        config.timeout = 2;
        // Nothing listens on the discard port
        config.identity.token_endpoint = "http://127.0.0.1:9".to_string();
        let mut store = TokenStore::from_config(&config).unwrap();
        store.store_session(expired_session_with_refresh()).unwrap();
        let client = HttpClient::with_store(config, store).unwrap();
        let session_file = client.config().session_path();

        let err = client
            .get_json::<ListSubjectsResponse>("/handouts/subjects")
            .await
            .unwrap_err();
        assert!(!err.is_auth_error());
        assert!(client.is_authenticated());
        assert!(session_file.exists());

        let stored = TokenStore::from_config(client.config())
            .unwrap()
            .get_session()
            .unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some("old-refresh"));
    }

    #[tokio::test]
    async fn test_refresh_provider_outage_keeps_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .expect(1)
            .mount(&server)
            .await;

        let temp_dir = create_temp_dir();
        let client = client_with_session(&server, &temp_dir, Some(expired_session_with_refresh()));

        let err = client
            .get_json::<ListSubjectsResponse>("/handouts/subjects")
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::Api { status: 503, .. }));
        assert!(client.is_authenticated());
        assert!(client.config().session_path().exists());
    }

    #[tokio::test]
    async fn test_rejected_refresh_token_clears_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"code": 400, "message": "INVALID_REFRESH_TOKEN"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let temp_dir = create_temp_dir();
        let client = client_with_session(&server, &temp_dir, Some(expired_session_with_refresh()));

        let err = client
            .get_json::<ListSubjectsResponse>("/handouts/subjects")
            .await
            .unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::TokenExpired);
        assert!(!client.is_authenticated());
        assert!(!client.config().session_path().exists());
    }
}
