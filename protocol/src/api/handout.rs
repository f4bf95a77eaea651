//! Handout API DTOs
//!
//! Request and response bodies for the `/handouts` endpoints.

use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

pub use crate::common::{HandoutSummary, HandoutVersion, SubjectSummary};

// ============================================================================
// Listing DTOs
// ============================================================================

/// Response for GET /handouts/subjects
pub type ListSubjectsResponse = Vec<SubjectSummary>;

/// Response for GET /handouts/subject/{subject}
pub type ListHandoutsResponse = Vec<HandoutSummary>;

/// Response for GET /handouts/{id}/versions
///
/// Versions come back in server order; the first entry is the one shown by default.
pub type ListVersionsResponse = Vec<HandoutVersion>;

// ============================================================================
// Upload DTOs
// ============================================================================

/// Text fields of the multipart upload form
///
/// Used for POST /handouts/upload; the file itself travels as the `file` part.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UploadHandoutRequest {
    #[validate(length(min = 1, max = 255, message = "Fill all fields"))]
    pub subject: String,
    #[validate(length(min = 1, max = 255, message = "Fill all fields"))]
    pub title: String,
}

/// Handout returned after a successful upload
///
/// Every field is optional so that servers returning a bare acknowledgement
/// still decode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadHandoutResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub current_version_id: Option<String>,
    #[serde(default)]
    pub versions: Vec<HandoutVersion>,
}

impl UploadHandoutResponse {
    /// Highest version number in the response, if any versions were returned
    pub fn latest_version(&self) -> Option<u32> {
        self.versions.iter().map(|v| v.version).max()
    }
}

/// Error body returned by the API (`{"detail": "..."}`)
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub detail: Option<ApiErrorDetail>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiErrorBody {
    /// Best human-readable message in the body
    pub fn into_message(self) -> Option<String> {
        self.detail.map(|d| d.to_string()).or(self.message)
    }
}

/// `detail` is either a plain string or a list of request validation entries
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ApiErrorDetail {
    Text(String),
    Entries(Vec<ApiErrorEntry>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorEntry {
    #[serde(default)]
    pub msg: String,
}

impl fmt::Display for ApiErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiErrorDetail::Text(text) => f.write_str(text),
            ApiErrorDetail::Entries(entries) => {
                let joined: Vec<&str> = entries.iter().map(|e| e.msg.as_str()).collect();
                f.write_str(&joined.join("; "))
            }
        }
    }
}
