//! Unified error handling for the Handout Vault CLI
//!
//! Every error carries a stable code in the format `HXXX`:
//! - H1XX: Authentication and authorization errors
//! - H2XX: Network and API errors
//! - H3XX: File and I/O errors
//! - H4XX: Configuration errors
//! - H5XX: Validation and input errors
//! - H7XX: Handout and transfer errors
//! - H8XX: UI and interaction errors
//! - H9XX: Internal errors

use std::fmt;
use thiserror::Error;

/// Unified Result type for all Handout Vault operations
pub type Result<T> = std::result::Result<T, VaultError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Authentication (H1XX)
    /// H101: Authentication failed
    AuthenticationFailed,
    /// H102: Authorization denied
    AuthorizationDenied,
    /// H103: Token expired
    TokenExpired,
    /// H104: No stored session
    SessionNotFound,

    // Network (H2XX)
    /// H201: HTTP request failed
    HttpError,
    /// H202: Connection timeout
    ConnectionTimeout,
    /// H203: Connection refused
    ConnectionRefused,
    /// H204: API returned error response
    ApiError,
    /// H205: Invalid API response format
    InvalidResponse,

    // File/IO (H3XX)
    /// H301: File not found
    FileNotFound,
    /// H302: File read error
    FileReadError,
    /// H303: File write error
    FileWriteError,
    /// H304: File already exists
    FileAlreadyExists,

    // Configuration (H4XX)
    /// H401: Configuration error
    ConfigError,
    /// H402: Invalid endpoint URL
    InvalidEndpoint,

    // Validation (H5XX)
    /// H501: Invalid input
    InvalidInput,
    /// H502: Validation failed
    ValidationFailed,

    // Handout/Transfer (H7XX)
    /// H701: Handout not found
    HandoutNotFound,
    /// H702: Version not found
    VersionNotFound,
    /// H703: Upload failed
    UploadFailed,
    /// H704: Download failed
    DownloadFailed,
    /// H705: Checksum mismatch
    ChecksumMismatch,
    /// H706: Resource not found
    ResourceNotFound,

    // UI (H8XX)
    /// H801: Dialog error
    DialogError,
    /// H802: User cancelled
    UserCancelled,

    // Internal (H9XX)
    /// H901: Serialization error
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code
    pub fn code(&self) -> u16 {
        match self {
            ErrorCode::AuthenticationFailed => 101,
            ErrorCode::AuthorizationDenied => 102,
            ErrorCode::TokenExpired => 103,
            ErrorCode::SessionNotFound => 104,

            ErrorCode::HttpError => 201,
            ErrorCode::ConnectionTimeout => 202,
            ErrorCode::ConnectionRefused => 203,
            ErrorCode::ApiError => 204,
            ErrorCode::InvalidResponse => 205,

            ErrorCode::FileNotFound => 301,
            ErrorCode::FileReadError => 302,
            ErrorCode::FileWriteError => 303,
            ErrorCode::FileAlreadyExists => 304,

            ErrorCode::ConfigError => 401,
            ErrorCode::InvalidEndpoint => 402,

            ErrorCode::InvalidInput => 501,
            ErrorCode::ValidationFailed => 502,

            ErrorCode::HandoutNotFound => 701,
            ErrorCode::VersionNotFound => 702,
            ErrorCode::UploadFailed => 703,
            ErrorCode::DownloadFailed => 704,
            ErrorCode::ChecksumMismatch => 705,
            ErrorCode::ResourceNotFound => 706,

            ErrorCode::DialogError => 801,
            ErrorCode::UserCancelled => 802,

            ErrorCode::SerializationError => 901,
        }
    }

    /// Get the string code (e.g., "H101")
    pub fn as_str(&self) -> String {
        format!("H{}", self.code())
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

/// Main error type for all Handout Vault operations
#[derive(Error, Debug)]
pub enum VaultError {
    // ==================== Authentication Errors (H1XX) ====================
    #[error("[{code}] Authentication failed: {message}")]
    Authentication { code: ErrorCode, message: String },

    #[error("[{code}] Authorization denied: {message}")]
    Authorization { code: ErrorCode, message: String },

    // ==================== Network Errors (H2XX) ====================
    #[error("[{code}] Network error: {message}")]
    Network {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("[{code}] API error ({status}): {message}")]
    Api {
        code: ErrorCode,
        status: u16,
        message: String,
    },

    // ==================== File/IO Errors (H3XX) ====================
    #[error("[{code}] {context}: {message}")]
    Io {
        code: ErrorCode,
        context: String,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    // ==================== Configuration Errors (H4XX) ====================
    #[error("[{code}] Configuration error: {message}")]
    Config {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<config::ConfigError>,
    },

    // ==================== Validation Errors (H5XX) ====================
    #[error("[{code}] Validation error: {message}")]
    Validation {
        code: ErrorCode,
        message: String,
        field: Option<String>,
    },

    #[error("[{code}] Invalid input: {message}")]
    InvalidInput { code: ErrorCode, message: String },

    // ==================== Handout/Transfer Errors (H7XX) ====================
    #[error("[{code}] Not found: {resource}")]
    NotFound { code: ErrorCode, resource: String },

    #[error("[{code}] Upload failed: {message}")]
    Upload { code: ErrorCode, message: String },

    #[error("[{code}] Download failed: {message}")]
    Download { code: ErrorCode, message: String },

    #[error("[{code}] Checksum mismatch for {file}: expected {expected}, got {actual}")]
    Checksum {
        code: ErrorCode,
        file: String,
        expected: String,
        actual: String,
    },

    // ==================== UI Errors (H8XX) ====================
    #[error("[{code}] UI error: {message}")]
    Ui { code: ErrorCode, message: String },

    // ==================== Internal Errors (H9XX) ====================
    #[error("[{code}] Serialization error: {message}")]
    Serialization {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },
}

// ==================== Constructor Methods ====================

impl VaultError {
    // --- Authentication ---

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            code: ErrorCode::AuthenticationFailed,
            message: message.into(),
        }
    }

    pub fn token_expired(message: impl Into<String>) -> Self {
        Self::Authentication {
            code: ErrorCode::TokenExpired,
            message: message.into(),
        }
    }

    /// No stored session; the user has to log in first
    pub fn not_logged_in() -> Self {
        Self::Authentication {
            code: ErrorCode::SessionNotFound,
            message: "Not logged in. Run `hvault login` first.".to_string(),
        }
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            code: ErrorCode::AuthorizationDenied,
            message: message.into(),
        }
    }

    // --- Network ---

    /// Create network error from reqwest error
    pub fn network_from_reqwest(err: reqwest::Error) -> Self {
        let code = if err.is_timeout() {
            ErrorCode::ConnectionTimeout
        } else if err.is_connect() {
            ErrorCode::ConnectionRefused
        } else {
            ErrorCode::HttpError
        };

        Self::Network {
            code,
            message: err.to_string(),
            source: Some(err),
        }
    }

    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            code: ErrorCode::ApiError,
            status,
            message: message.into(),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::Api {
            code: ErrorCode::InvalidResponse,
            status: 0,
            message: message.into(),
        }
    }

    // --- File/IO ---

    /// Create IO error from std::io::Error
    pub fn io_from_error(context: impl Into<String>, err: std::io::Error) -> Self {
        let code = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::FileNotFound,
            std::io::ErrorKind::PermissionDenied => ErrorCode::FileWriteError,
            std::io::ErrorKind::AlreadyExists => ErrorCode::FileAlreadyExists,
            _ => ErrorCode::FileReadError,
        };

        Self::Io {
            code,
            context: context.into(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::Io {
            code: ErrorCode::FileNotFound,
            context: "File not found".to_string(),
            message: path.into(),
            source: None,
        }
    }

    pub fn file_exists(path: impl Into<String>) -> Self {
        Self::Io {
            code: ErrorCode::FileAlreadyExists,
            context: "File already exists".to_string(),
            message: path.into(),
            source: None,
        }
    }

    // --- Configuration ---

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            code: ErrorCode::ConfigError,
            message: message.into(),
            source: None,
        }
    }

    pub fn config_from_error(err: config::ConfigError) -> Self {
        Self::Config {
            code: ErrorCode::ConfigError,
            message: err.to_string(),
            source: Some(err),
        }
    }

    pub fn invalid_endpoint(message: impl Into<String>) -> Self {
        Self::Config {
            code: ErrorCode::InvalidEndpoint,
            message: message.into(),
            source: None,
        }
    }

    // --- Validation ---

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            code: ErrorCode::ValidationFailed,
            message: message.into(),
            field: None,
        }
    }

    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            code: ErrorCode::ValidationFailed,
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            code: ErrorCode::InvalidInput,
            message: message.into(),
        }
    }

    // --- Handout/Transfer ---

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            code: ErrorCode::ResourceNotFound,
            resource: resource.into(),
        }
    }

    pub fn handout_not_found(handout_id: impl Into<String>) -> Self {
        Self::NotFound {
            code: ErrorCode::HandoutNotFound,
            resource: format!("handout {}", handout_id.into()),
        }
    }

    pub fn version_not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            code: ErrorCode::VersionNotFound,
            resource: message.into(),
        }
    }

    pub fn upload(message: impl Into<String>) -> Self {
        Self::Upload {
            code: ErrorCode::UploadFailed,
            message: message.into(),
        }
    }

    pub fn download(message: impl Into<String>) -> Self {
        Self::Download {
            code: ErrorCode::DownloadFailed,
            message: message.into(),
        }
    }

    pub fn checksum(
        file: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::Checksum {
            code: ErrorCode::ChecksumMismatch,
            file: file.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    // --- UI ---

    pub fn user_cancelled() -> Self {
        Self::Ui {
            code: ErrorCode::UserCancelled,
            message: "Operation cancelled by user".to_string(),
        }
    }

    // --- Utility Methods ---

    /// Get the error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Authentication { code, .. } => *code,
            Self::Authorization { code, .. } => *code,
            Self::Network { code, .. } => *code,
            Self::Api { code, .. } => *code,
            Self::Io { code, .. } => *code,
            Self::Config { code, .. } => *code,
            Self::Validation { code, .. } => *code,
            Self::InvalidInput { code, .. } => *code,
            Self::NotFound { code, .. } => *code,
            Self::Upload { code, .. } => *code,
            Self::Download { code, .. } => *code,
            Self::Checksum { code, .. } => *code,
            Self::Ui { code, .. } => *code,
            Self::Serialization { code, .. } => *code,
        }
    }

    /// Check if this is an authentication error
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Self::Authentication { .. } | Self::Authorization { .. }
        )
    }

    /// Request never got an HTTP response (timeout, refused connection, TLS)
    pub fn is_network_error(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

// ==================== From Implementations ====================

impl From<std::io::Error> for VaultError {
    fn from(err: std::io::Error) -> Self {
        Self::io_from_error("IO operation", err)
    }
}

impl From<reqwest::Error> for VaultError {
    fn from(err: reqwest::Error) -> Self {
        Self::network_from_reqwest(err)
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            code: ErrorCode::SerializationError,
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<config::ConfigError> for VaultError {
    fn from(err: config::ConfigError) -> Self {
        Self::config_from_error(err)
    }
}

impl From<dialoguer::Error> for VaultError {
    fn from(err: dialoguer::Error) -> Self {
        Self::Ui {
            code: ErrorCode::DialogError,
            message: format!("Dialog error: {}", err),
        }
    }
}

impl From<validator::ValidationErrors> for VaultError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let mut fields: Vec<String> = field_errors.keys().map(|k| k.to_string()).collect();
        fields.sort_unstable();

        let message = field_errors
            .values()
            .flat_map(|errs| errs.iter())
            .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
            .unwrap_or_else(|| "Invalid input".to_string());

        match fields.first() {
            Some(field) => Self::validation_field(message, field.clone()),
            None => Self::validation(message),
        }
    }
}

// Manual Clone implementation that drops non-cloneable sources
impl Clone for VaultError {
    fn clone(&self) -> Self {
        match self {
            Self::Authentication { code, message } => Self::Authentication {
                code: *code,
                message: message.clone(),
            },
            Self::Authorization { code, message } => Self::Authorization {
                code: *code,
                message: message.clone(),
            },
            Self::Network { code, message, .. } => Self::Network {
                code: *code,
                message: message.clone(),
                source: None,
            },
            Self::Api {
                code,
                status,
                message,
            } => Self::Api {
                code: *code,
                status: *status,
                message: message.clone(),
            },
            Self::Io {
                code,
                context,
                message,
                ..
            } => Self::Io {
                code: *code,
                context: context.clone(),
                message: message.clone(),
                source: None,
            },
            Self::Config { code, message, .. } => Self::Config {
                code: *code,
                message: message.clone(),
                source: None,
            },
            Self::Validation {
                code,
                message,
                field,
            } => Self::Validation {
                code: *code,
                message: message.clone(),
                field: field.clone(),
            },
            Self::InvalidInput { code, message } => Self::InvalidInput {
                code: *code,
                message: message.clone(),
            },
            Self::NotFound { code, resource } => Self::NotFound {
                code: *code,
                resource: resource.clone(),
            },
            Self::Upload { code, message } => Self::Upload {
                code: *code,
                message: message.clone(),
            },
            Self::Download { code, message } => Self::Download {
                code: *code,
                message: message.clone(),
            },
            Self::Checksum {
                code,
                file,
                expected,
                actual,
            } => Self::Checksum {
                code: *code,
                file: file.clone(),
                expected: expected.clone(),
                actual: actual.clone(),
            },
            Self::Ui { code, message } => Self::Ui {
                code: *code,
                message: message.clone(),
            },
            Self::Serialization { code, message, .. } => Self::Serialization {
                code: *code,
                message: message.clone(),
                source: None,
            },
        }
    }
}
